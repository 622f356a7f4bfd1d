//! Feed-forward network engine: configuration, initialization, training,
//! prediction, and scoring.
use crate::activations::Activation;
use crate::analysis::RunRecord;
use crate::matrix::Matrix;
use crate::records::Record;
use crate::store::Store;
use anyhow::{anyhow, Result};
use log::info;
use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

/// Network construction parameters. Immutable once a network is built.
#[derive(Debug, Clone)]
pub struct Config {
    /// Identifies a dataset/run family; keys weight artifacts and log rows.
    pub name: String,
    pub input_num: usize,
    pub hidden_num: usize,
    pub output_num: usize,
    /// Total layer count including input and output; minimum 3.
    pub layer_num: usize,
    pub epochs: usize,
    /// Ordered output labels; length must equal `output_num`.
    pub target_labels: Vec<String>,
    pub activation: Activation,
    pub learning_rate: f64,
}

impl Config {
    /// Validate the configuration before any network is constructed.
    pub fn validate(&self) -> Result<()> {
        if self.layer_num < 3 {
            return Err(anyhow!("cannot have fewer than three layers"));
        }
        if self.input_num == 0 || self.hidden_num == 0 || self.output_num == 0 {
            return Err(anyhow!(
                "node counts must be positive, got {}/{}/{}",
                self.input_num,
                self.hidden_num,
                self.output_num
            ));
        }
        if self.target_labels.len() != self.output_num {
            return Err(anyhow!(
                "expected {} target labels, got {}",
                self.output_num,
                self.target_labels.len()
            ));
        }
        if self.learning_rate <= 0.0 {
            return Err(anyhow!(
                "learning rate must be positive, got {}",
                self.learning_rate
            ));
        }
        Ok(())
    }
}

/// Per-call forward-pass scratch state.
///
/// Layer 0 is the raw input column; weighted sum `i` feeds layer `i + 1`.
/// Keeping this out of the network lets `predict` take `&self` and makes a
/// trained network safe to share across concurrent readers.
struct Trace {
    layers: Vec<Matrix>,
}

/// A multi-layer feed-forward network.
///
/// Weight matrix `i` has dimensions (nodes in layer `i + 1`) x (nodes in
/// layer `i`) and is the only state that persists across samples and process
/// restarts.
#[derive(Debug, Clone)]
pub struct Network {
    pub(crate) config: Config,
    pub(crate) weights: Vec<Matrix>,
    pub(crate) training_start: i64,
    pub(crate) training_end: i64,
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl Network {
    /// Build a network with freshly initialized weights.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_rng(config, &mut rand::thread_rng())
    }

    /// Build a network drawing initial weights from the supplied source, so
    /// tests can fix a seed.
    ///
    /// Each transition's weights are drawn uniformly from
    /// (-1/sqrt(fan_in), 1/sqrt(fan_in)) where fan-in is the size of the
    /// transition's source layer.
    pub fn with_rng(config: Config, rng: &mut impl Rng) -> Result<Self> {
        config.validate()?;
        let total_weights = config.layer_num - 1;
        let last = total_weights - 1;
        let mut weights = Vec::with_capacity(total_weights);
        for i in 0..total_weights {
            let (rows, cols) = if i == 0 {
                (config.hidden_num, config.input_num)
            } else if i == last {
                (config.output_num, config.hidden_num)
            } else {
                (config.hidden_num, config.hidden_num)
            };
            // fan-in is the column count of the transition
            weights.push(Matrix::random(rows, cols, cols, rng));
        }
        Ok(Self {
            config,
            weights,
            training_start: 0,
            training_end: 0,
        })
    }

    /// Rebuild an inference-only network from recovered weight matrices.
    ///
    /// Node counts are derived from the weight shapes; epochs and learning
    /// rate are zeroed since the network will not train.
    pub(crate) fn from_parts(
        name: &str,
        weights: Vec<Matrix>,
        activation: Activation,
        target_labels: Vec<String>,
    ) -> Result<Self> {
        let first = weights
            .first()
            .ok_or_else(|| anyhow!("no weight matrices recovered for {}", name))?;
        let output_num = weights[weights.len() - 1].rows();
        if target_labels.len() != output_num {
            return Err(anyhow!(
                "{} target labels recovered for {}, but the network has {} outputs",
                target_labels.len(),
                name,
                output_num
            ));
        }
        let config = Config {
            name: name.to_string(),
            input_num: first.cols(),
            hidden_num: first.rows(),
            output_num,
            layer_num: weights.len() + 1,
            epochs: 0,
            target_labels,
            activation,
            learning_rate: 0.0,
        };
        Ok(Self {
            config,
            weights,
            training_start: 0,
            training_end: 0,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn weights(&self) -> &[Matrix] {
        &self.weights
    }

    /// (rows, cols) of each weight matrix in layer order.
    pub fn weight_shapes(&self) -> Vec<(usize, usize)> {
        self.weights.iter().map(|w| (w.rows(), w.cols())).collect()
    }

    /// Unix timestamp recorded when the last training run finished.
    pub fn training_end(&self) -> i64 {
        self.training_end
    }

    /// Forward propagation: layer 0 is the raw input column, then each
    /// transition computes a weighted sum and activates it into the next
    /// layer.
    fn feed_forward(&self, input: &[f64]) -> Trace {
        let mut layers = Vec::with_capacity(self.weights.len() + 1);
        layers.push(Matrix::column(input));
        let activation = self.config.activation;
        for weight in &self.weights {
            let weighted_sum = weight.dot(&layers[layers.len() - 1]);
            layers.push(weighted_sum.apply(|_, _, v| activation.activate(v)));
        }
        Trace { layers }
    }

    /// Error backpropagation and online weight update for one sample.
    ///
    /// Output error is `target - output`; hidden error at layer i is
    /// `weights[i]^T . error[i+1]`; weight i-1 moves by
    /// `learning_rate * (error[i] ⊙ deactivate(layer[i])) . layer[i-1]^T`.
    fn backpropagate(&mut self, trace: &Trace, targets: &[f64]) {
        let last = trace.layers.len() - 1;
        let mut error = Matrix::column(targets).subtract(&trace.layers[last]);
        for i in (1..=last).rev() {
            if i != last {
                error = self.weights[i].transpose().dot(&error);
            }
            let update = error
                .multiply(&self.config.activation.deactivate(&trace.layers[i]))
                .dot(&trace.layers[i - 1].transpose())
                .scale(self.config.learning_rate);
            self.weights[i - 1] = self.weights[i - 1].add(&update);
        }
    }

    /// Train over every record, in input order, for the configured number of
    /// epochs (pure online SGD, batch size 1, no shuffling), then persist the
    /// learned weights through `store`.
    pub fn train(&mut self, records: &[Record], store: &Store) -> Result<()> {
        self.training_start = unix_now();
        for epoch in 1..=self.config.epochs {
            for record in records {
                let trace = self.feed_forward(&record.inputs);
                self.backpropagate(&trace, &record.targets);
            }
            info!("epoch {} of {} complete", epoch, self.config.epochs);
        }
        self.training_end = unix_now();
        store
            .save(self)
            .map_err(|e| anyhow!("saving weights: {}", e))?;
        info!(
            "training took {} seconds",
            self.training_end - self.training_start
        );
        Ok(())
    }

    /// Index of the output node with the strictly greatest activation.
    ///
    /// The scan starts from an initial best of 0.0, so an output layer whose
    /// activations are all non-positive reports index 0.
    pub fn predict_index(&self, input: &[f64]) -> usize {
        let trace = self.feed_forward(input);
        let outputs = &trace.layers[trace.layers.len() - 1];
        let mut best_index = 0;
        let mut highest = 0.0;
        for i in 0..outputs.rows() {
            if outputs.at(i, 0) > highest {
                best_index = i;
                highest = outputs.at(i, 0);
            }
        }
        best_index
    }

    /// Label of the winning output node for a single input vector.
    pub fn predict(&self, input: &[f64]) -> Result<&str> {
        let index = self.predict_index(input);
        self.config
            .target_labels
            .get(index)
            .map(|label| label.as_str())
            .ok_or_else(|| anyhow!("no target label for output index {}", index))
    }

    /// Accuracy over a test set as a percentage.
    ///
    /// The true class is the index whose one-hot target component rounds to
    /// 1. An empty test set is rejected explicitly rather than dividing by
    /// zero.
    pub fn evaluate(&self, records: &[Record]) -> Result<f64> {
        if records.is_empty() {
            return Err(anyhow!("cannot score an empty test set"));
        }
        let mut correct = 0usize;
        for record in records {
            let predicted = self.predict_index(&record.inputs);
            let actual = record
                .targets
                .iter()
                .position(|&t| t.round() as i64 == 1);
            if actual == Some(predicted) {
                correct += 1;
            }
        }
        Ok(100.0 * correct as f64 / records.len() as f64)
    }

    /// Analysis-log row for the completed run; `accuracy` is `None` when no
    /// test set was available.
    pub fn run_record(&self, accuracy: Option<f64>) -> RunRecord {
        RunRecord {
            name: self.config.name.clone(),
            activator: self.config.activation,
            inputs: self.config.input_num,
            hiddens: self.config.hidden_num,
            outputs: self.config.output_num,
            layers: self.config.layer_num,
            epochs: self.config.epochs,
            target_labels: self.config.target_labels.clone(),
            learning_rate: self.config.learning_rate,
            end_time: self.training_end,
            seconds_to_train: self.training_end - self.training_start,
            accuracy,
        }
    }
}
