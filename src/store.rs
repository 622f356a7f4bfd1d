//! Weight artifact persistence and best-run reload.
//!
//! Each run writes one binary artifact per weight matrix, named
//! `{name}-{end_timestamp}-{layer}.wgt`. Distinct runs never overwrite each
//! other only because their end timestamps differ; two runs of the same name
//! finishing within the same second will collide, which callers must avoid.
use crate::activations::Activation;
use crate::analysis;
use crate::matrix::Matrix;
use crate::network::Network;
use anyhow::{anyhow, Result};
use log::info;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

/// Stores weight artifacts and the analysis log under one output directory.
#[derive(Debug, Clone)]
pub struct Store {
    out_dir: PathBuf,
}

impl Store {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    /// Location of the analysis log inside this store.
    pub fn analysis_path(&self) -> PathBuf {
        self.out_dir.join("analysis.csv")
    }

    fn artifact_name(name: &str, end_time: i64, layer: usize) -> String {
        format!("{}-{}-{}.wgt", name, end_time, layer)
    }

    /// Write one weight artifact per layer for the network's current run,
    /// keyed by its name and training-end timestamp.
    pub fn save(&self, network: &Network) -> Result<()> {
        fs::create_dir_all(&self.out_dir)
            .map_err(|e| anyhow!("creating {}: {}", self.out_dir.display(), e))?;
        let name = &network.config.name;
        let end_time = network.training_end;
        info!("saving layer weight files for {}, run {}", name, end_time);
        for (layer, weight) in network.weights.iter().enumerate() {
            let path = self.out_dir.join(Self::artifact_name(name, end_time, layer));
            let file = File::create(&path)
                .map_err(|e| anyhow!("creating weight file for layer {}: {}", layer, e))?;
            let mut writer = BufWriter::new(file);
            weight
                .write_to(&mut writer)
                .map_err(|e| anyhow!("writing weights for layer {}: {}", layer, e))?;
            writer
                .flush()
                .map_err(|e| anyhow!("flushing weight file for layer {}: {}", layer, e))?;
        }
        Ok(())
    }

    /// Rediscover the weight artifacts for {name, end_time} and rebuild an
    /// inference-only network from them in layer order.
    ///
    /// The layer index is parsed out of each matching filename; an
    /// unparsable index or a gap in the layer sequence is a fatal load
    /// error.
    pub fn load(
        &self,
        name: &str,
        end_time: i64,
        activation: Activation,
        target_labels: Vec<String>,
    ) -> Result<Network> {
        let prefix = format!("{}-{}-", name, end_time);
        let mut found: Vec<(usize, PathBuf)> = Vec::new();
        let entries = fs::read_dir(&self.out_dir)
            .map_err(|e| anyhow!("reading {}: {}", self.out_dir.display(), e))?;
        for entry in entries {
            let entry = entry.map_err(|e| anyhow!("reading {}: {}", self.out_dir.display(), e))?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let rest = match file_name.strip_prefix(&prefix) {
                Some(rest) => rest,
                None => continue,
            };
            let layer_part = match rest.strip_suffix(".wgt") {
                Some(layer_part) => layer_part,
                None => continue,
            };
            let layer: usize = layer_part.parse().map_err(|e| {
                anyhow!("parsing layer portion of filename {}: {}", file_name, e)
            })?;
            found.push((layer, entry.path()));
        }
        if found.is_empty() {
            return Err(anyhow!("no weight artifacts for {} at {}", name, end_time));
        }
        found.sort_by_key(|(layer, _)| *layer);
        let mut weights = Vec::with_capacity(found.len());
        for (expected, (layer, path)) in found.iter().enumerate() {
            if *layer != expected {
                return Err(anyhow!(
                    "missing weight artifact for layer {} of {} at {}",
                    expected,
                    name,
                    end_time
                ));
            }
            let file = File::open(path)
                .map_err(|e| anyhow!("opening file for layer {}: {}", layer, e))?;
            let mut reader = BufReader::new(file);
            let matrix = Matrix::read_from(&mut reader)
                .map_err(|e| anyhow!("decoding weights for layer {}: {}", layer, e))?;
            weights.push(matrix);
        }
        info!("loaded {} weight layers for {}, run {}", weights.len(), name, end_time);
        Network::from_parts(name, weights, activation, target_labels)
    }

    /// Pick the best historical run for `name` from the analysis log and
    /// reload its weights, recovering the activation and target labels from
    /// the winning row.
    pub fn best_network_for(&self, name: &str) -> Result<Network> {
        let run = analysis::best_run(&self.analysis_path(), name)
            .map_err(|e| anyhow!("selecting best run for {}: {}", name, e))?;
        self.load(name, run.end_time, run.activator, run.target_labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Config;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::tempdir;

    fn trained_network(name: &str, end_time: i64) -> Network {
        let mut rng = StdRng::seed_from_u64(end_time as u64);
        let mut net = Network::with_rng(
            Config {
                name: name.to_string(),
                input_num: 3,
                hidden_num: 4,
                output_num: 2,
                layer_num: 4,
                epochs: 1,
                target_labels: vec!["up".to_string(), "down".to_string()],
                activation: Activation::Tanh,
                learning_rate: 0.2,
            },
            &mut rng,
        )
        .unwrap();
        net.training_start = end_time - 9;
        net.training_end = end_time;
        net
    }

    #[test]
    fn test_save_writes_one_artifact_per_layer() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());
        let net = trained_network("fish", 1000);
        store.save(&net).unwrap();
        for layer in 0..3 {
            assert!(dir.path().join(format!("fish-1000-{}.wgt", layer)).exists());
        }
        assert!(!dir.path().join("fish-1000-3.wgt").exists());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());
        let net = trained_network("fish", 1000);
        store.save(&net).unwrap();
        let loaded = store
            .load(
                "fish",
                1000,
                Activation::Tanh,
                vec!["up".to_string(), "down".to_string()],
            )
            .unwrap();
        assert_eq!(loaded.weights(), net.weights());
        assert_eq!(loaded.weight_shapes(), vec![(4, 3), (4, 4), (2, 4)]);
        assert_eq!(loaded.config().activation, Activation::Tanh);
    }

    #[test]
    fn test_load_ignores_other_runs() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());
        let old = trained_network("fish", 1000);
        let new = trained_network("fish", 2000);
        store.save(&old).unwrap();
        store.save(&new).unwrap();
        let loaded = store
            .load(
                "fish",
                2000,
                Activation::Tanh,
                vec!["up".to_string(), "down".to_string()],
            )
            .unwrap();
        assert_eq!(loaded.weights(), new.weights());
    }

    #[test]
    fn test_load_missing_run_fails() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());
        store.save(&trained_network("fish", 1000)).unwrap();
        assert!(store
            .load("fish", 2000, Activation::Tanh, vec![])
            .is_err());
    }

    #[test]
    fn test_load_with_gap_in_layers_fails() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());
        store.save(&trained_network("fish", 1000)).unwrap();
        fs::remove_file(dir.path().join("fish-1000-1.wgt")).unwrap();
        let err = store
            .load(
                "fish",
                1000,
                Activation::Tanh,
                vec!["up".to_string(), "down".to_string()],
            )
            .unwrap_err();
        assert!(err.to_string().contains("layer 1"));
    }

    #[test]
    fn test_load_with_unparsable_layer_index_fails() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());
        store.save(&trained_network("fish", 1000)).unwrap();
        fs::write(dir.path().join("fish-1000-x.wgt"), b"junk").unwrap();
        let err = store
            .load(
                "fish",
                1000,
                Activation::Tanh,
                vec!["up".to_string(), "down".to_string()],
            )
            .unwrap_err();
        assert!(err.to_string().contains("fish-1000-x.wgt"));
    }

    #[test]
    fn test_label_count_must_match_outputs() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());
        store.save(&trained_network("fish", 1000)).unwrap();
        assert!(store
            .load("fish", 1000, Activation::Tanh, vec!["up".to_string()])
            .is_err());
    }

    #[test]
    fn test_best_network_for_reloads_winning_run() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());
        let weak = trained_network("fish", 1000);
        let strong = trained_network("fish", 2000);
        store.save(&weak).unwrap();
        store.save(&strong).unwrap();
        analysis::append_run(&store.analysis_path(), &weak.run_record(Some(55.0))).unwrap();
        analysis::append_run(&store.analysis_path(), &strong.run_record(Some(88.0))).unwrap();
        let best = store.best_network_for("fish").unwrap();
        assert_eq!(best.weights(), strong.weights());
        assert_eq!(
            best.config().target_labels,
            vec!["up".to_string(), "down".to_string()]
        );
    }

    #[test]
    fn test_best_network_for_without_log_fails() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path());
        let err = store.best_network_for("fish").unwrap_err();
        assert!(err.to_string().contains("fish"));
    }
}
