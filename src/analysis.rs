//! Append-only analysis log of completed training runs, and selection of the
//! best historical run per network name.
use crate::activations::Activation;
use anyhow::{anyhow, Result};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::Path;

/// One row of the analysis log: everything needed to identify, reload, and
/// rank a completed training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Activator")]
    pub activator: Activation,
    #[serde(rename = "Inputs")]
    pub inputs: usize,
    #[serde(rename = "Hiddens")]
    pub hiddens: usize,
    #[serde(rename = "Outputs")]
    pub outputs: usize,
    #[serde(rename = "Layers")]
    pub layers: usize,
    #[serde(rename = "Epochs")]
    pub epochs: usize,
    #[serde(rename = "Target Labels", with = "joined_labels")]
    pub target_labels: Vec<String>,
    #[serde(rename = "LR")]
    pub learning_rate: f64,
    /// Unix timestamp of training completion; keys the run's weight
    /// artifacts.
    #[serde(rename = "End Time")]
    pub end_time: i64,
    #[serde(rename = "SecondsToTrain")]
    pub seconds_to_train: i64,
    /// `None` means the run was never scored against a test set.
    #[serde(rename = "Accuracy", with = "accuracy_sentinel")]
    pub accuracy: Option<f64>,
}

/// Target labels are stored comma-joined in a single log field.
mod joined_labels {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(labels: &[String], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&labels.join(", "))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        let raw = String::deserialize(d)?;
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        Ok(raw.split(',').map(|s| s.trim().to_string()).collect())
    }
}

/// An unmeasured accuracy is written as `?` and compares below any real
/// percentage during run selection.
mod accuracy_sentinel {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    const UNMEASURED: &str = "?";

    pub fn serialize<S: Serializer>(accuracy: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
        match accuracy {
            Some(v) => v.serialize(s),
            None => s.serialize_str(UNMEASURED),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        let raw = String::deserialize(d)?;
        if raw == UNMEASURED || raw.is_empty() {
            return Ok(None);
        }
        raw.parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}

/// Append one run to the log at `path`, creating it (and its parent
/// directory) with a header row on first use. The header is written exactly
/// once per log file.
pub fn append_run(path: &Path, record: &RunRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| anyhow!("creating {}: {}", parent.display(), e))?;
    }
    let needs_headers = !path.exists();
    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .map_err(|e| anyhow!("opening analysis log {}: {}", path.display(), e))?;
    let mut writer = WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(file);
    writer
        .serialize(record)
        .map_err(|e| anyhow!("writing analysis record: {}", e))?;
    writer
        .flush()
        .map_err(|e| anyhow!("flushing analysis log: {}", e))?;
    Ok(())
}

fn measured(accuracy: Option<f64>) -> f64 {
    // below any real percentage, so untested runs lose to any tested one
    accuracy.unwrap_or(-1.0)
}

/// Scan the log for rows matching `name` and return the one with the
/// strictly highest accuracy. Ties keep the earliest recorded row, and rows
/// with an unmeasured accuracy are only chosen when no scored run exists for
/// the name.
pub fn best_run(path: &Path, name: &str) -> Result<RunRecord> {
    let file = File::open(path)
        .map_err(|e| anyhow!("opening analysis log {}: {}", path.display(), e))?;
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);
    let mut best: Option<RunRecord> = None;
    for (i, row) in reader.deserialize::<RunRecord>().enumerate() {
        let record = row.map_err(|e| anyhow!("reading analysis record {}: {}", i + 1, e))?;
        if record.name != name {
            continue;
        }
        let better = match &best {
            None => true,
            Some(current) => measured(record.accuracy) > measured(current.accuracy),
        };
        if better {
            best = Some(record);
        }
    }
    best.ok_or_else(|| anyhow!("no recorded runs for {}", name))
}
