//! Parsing of preprocessed training/test records.
use anyhow::{anyhow, Result};
use std::io::BufRead;

/// One training or test example: fixed-width input and target vectors.
///
/// Targets are normally one-hot for classification. Records are immutable
/// once parsed and consumed one at a time during training and scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub inputs: Vec<f64>,
    pub targets: Vec<f64>,
}

/// Read whitespace-separated numeric rows: `input_num` input fields followed
/// by `output_num` target fields per line. Field count is validated exactly
/// and errors carry the offending line number.
pub fn read_records(
    reader: impl BufRead,
    input_num: usize,
    output_num: usize,
) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line_num = idx + 1;
        let line = line.map_err(|e| anyhow!("reading line {}: {}", line_num, e))?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != input_num + output_num {
            return Err(anyhow!(
                "at line {}, expected {} values, got {}",
                line_num,
                input_num + output_num,
                fields.len()
            ));
        }
        let mut inputs = Vec::with_capacity(input_num);
        let mut targets = Vec::with_capacity(output_num);
        for (i, field) in fields.iter().enumerate() {
            let num: f64 = field.parse().map_err(|e| {
                anyhow!("at line {}, parsing field {:?}: {}", line_num, field, e)
            })?;
            if i < input_num {
                inputs.push(num);
            } else {
                targets.push(num);
            }
        }
        records.push(Record { inputs, targets });
    }
    Ok(records)
}
