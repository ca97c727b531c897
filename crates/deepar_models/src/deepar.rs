//! DeepAR: an autoregressive recurrent network with a count distribution head.
//!
//! One [`DeepARConfig`] builds both variants. [`DeepARTrainingNetwork`]
//! unrolls over `context_length + prediction_length` steps with the observed
//! target fed back as input (teacher forcing). [`DeepARPredictionNetwork`]
//! encodes the context, then unrolls `prediction_length` steps feeding back
//! its own output. Both wrap the same [`DeepARNetwork`] module, so weights
//! trained in one load directly into the other.
//!
//! Per-step input: lagged scaled targets, calendar and age features, the
//! static category embeddings and `log(scale)`.

use burn::nn::{
    Dropout, DropoutConfig, Embedding, EmbeddingConfig, Initializer, Linear, LinearConfig, Lstm,
    LstmConfig, LstmState,
};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use deepar_core::{CoreError, Frequency, InputShapes, Result};
use deepar_data::WindowBatch;

use crate::distribution::{DistributionOutput, NegativeBinomial};
use crate::scaler::mean_scale;

/// Configuration shared by the training and prediction variants.
///
/// Validated once when a network is built from it.
///
/// # Example
///
/// ```rust
/// use deepar_core::Frequency;
/// use deepar_models::DeepARConfig;
///
/// let config = DeepARConfig::new(Frequency::Monthly, 12, vec![112]);
/// assert_eq!(config.context_length, 12);
/// assert_eq!(config.history_length(), 49);
/// assert_eq!(config.embedding_dims(), vec![50]);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepARConfig {
    /// Sampling frequency; decides lags and calendar features.
    pub frequency: Frequency,
    /// Steps forecast per window.
    pub prediction_length: usize,
    /// Steps the network conditions on before forecasting.
    pub context_length: usize,
    /// Cardinality of each static categorical feature.
    pub cardinality: Vec<usize>,
    /// Embedding size per categorical feature (derived when `None`).
    pub embedding_dimension: Option<Vec<usize>>,
    /// Feed the window's static category; otherwise category 0 is used.
    pub use_static_category: bool,
    /// Distribution parameterized by the head.
    pub distribution_output: DistributionOutput,
    /// LSTM hidden size.
    pub hidden_size: usize,
    /// Number of stacked LSTM layers.
    pub num_layers: usize,
    /// Dropout between LSTM layers and before the head.
    pub dropout: f64,
}

impl Default for DeepARConfig {
    fn default() -> Self {
        Self {
            frequency: Frequency::Monthly,
            prediction_length: 12,
            context_length: 12,
            cardinality: vec![1],
            embedding_dimension: None,
            use_static_category: false,
            distribution_output: DistributionOutput::NegativeBinomial,
            hidden_size: 40,
            num_layers: 2,
            dropout: 0.1,
        }
    }
}

impl DeepARConfig {
    /// Create a config with `context_length == prediction_length`.
    #[must_use]
    pub fn new(frequency: Frequency, prediction_length: usize, cardinality: Vec<usize>) -> Self {
        Self {
            frequency,
            prediction_length,
            context_length: prediction_length,
            cardinality,
            ..Default::default()
        }
    }

    /// Set the context length.
    #[must_use]
    pub fn with_context_length(mut self, context_length: usize) -> Self {
        self.context_length = context_length;
        self
    }

    /// Set whether the static category is fed.
    #[must_use]
    pub fn with_use_static_category(mut self, use_static_category: bool) -> Self {
        self.use_static_category = use_static_category;
        self
    }

    /// Set the LSTM hidden size.
    #[must_use]
    pub fn with_hidden_size(mut self, hidden_size: usize) -> Self {
        self.hidden_size = hidden_size;
        self
    }

    /// Set the number of LSTM layers.
    #[must_use]
    pub fn with_num_layers(mut self, num_layers: usize) -> Self {
        self.num_layers = num_layers;
        self
    }

    /// Set the dropout rate.
    #[must_use]
    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// Lag indices read from the history.
    #[must_use]
    pub fn lags_seq(&self) -> &'static [usize] {
        self.frequency.lags_seq()
    }

    /// `context_length + max_lag`.
    #[must_use]
    pub fn history_length(&self) -> usize {
        self.frequency.history_length(self.context_length)
    }

    /// Per-step features: calendar features plus age.
    #[must_use]
    pub fn num_time_features(&self) -> usize {
        self.frequency.num_time_features()
    }

    /// Embedding sizes, `min(50, (c + 1) / 2)` unless set explicitly.
    #[must_use]
    pub fn embedding_dims(&self) -> Vec<usize> {
        match &self.embedding_dimension {
            Some(dims) => dims.clone(),
            None => self
                .cardinality
                .iter()
                .map(|&c| ((c + 1) / 2).min(50))
                .collect(),
        }
    }

    /// Width of the per-step input vector.
    #[must_use]
    pub fn input_size(&self) -> usize {
        self.lags_seq().len()
            + self.num_time_features()
            + self.embedding_dims().iter().sum::<usize>()
            + 1
    }

    /// Shapes this network expects for a batch of `batch` windows.
    #[must_use]
    pub fn input_shapes(&self, batch: usize) -> InputShapes {
        InputShapes::declared(
            batch,
            self.cardinality.len(),
            self.history_length(),
            self.prediction_length,
            self.num_time_features(),
        )
    }

    /// Check declared input shapes against this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ShapeMismatch`] on the first disagreement.
    pub fn check_input_shapes(&self, declared: &InputShapes) -> Result<()> {
        declared.check_against(&self.input_shapes(declared.batch()))
    }

    /// Check that a static category fits the first cardinality.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an out-of-range category.
    pub fn check_static_category(&self, category: Option<usize>) -> Result<()> {
        match (category, self.cardinality.first()) {
            (Some(c), Some(&card)) if self.use_static_category && c >= card => {
                Err(CoreError::Configuration(format!(
                    "static category {c} out of range for cardinality {card}"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Validate every field.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(CoreError::Configuration(msg));
        if self.prediction_length == 0 {
            return fail("prediction_length must be positive".into());
        }
        if self.context_length == 0 {
            return fail("context_length must be positive".into());
        }
        if self.cardinality.is_empty() || self.cardinality.contains(&0) {
            return fail(format!(
                "cardinality must be non-empty with positive entries, got {:?}",
                self.cardinality
            ));
        }
        let dims = self.embedding_dims();
        if dims.len() != self.cardinality.len() || dims.contains(&0) {
            return fail(format!(
                "embedding dimensions {:?} do not match cardinality {:?}",
                dims, self.cardinality
            ));
        }
        if self.hidden_size == 0 || self.num_layers == 0 {
            return fail("hidden_size and num_layers must be positive".into());
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return fail(format!("dropout {} must lie in [0, 1)", self.dropout));
        }
        Ok(())
    }

    /// Build the shared module. LSTM and projection weights are Xavier-initialized.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the config is invalid.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<DeepARNetwork<B>> {
        self.validate()?;
        Ok(DeepARNetwork::new(self, device))
    }

    /// Build the teacher-forced training variant.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the config is invalid.
    pub fn build_training<B: Backend>(&self, device: &B::Device) -> Result<DeepARTrainingNetwork<B>> {
        Ok(DeepARTrainingNetwork::from_parts(self.clone(), self.init(device)?))
    }

    /// Build the autoregressive prediction variant.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the config is invalid.
    pub fn build_inference<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<DeepARPredictionNetwork<B>> {
        Ok(DeepARPredictionNetwork::from_parts(self.clone(), self.init(device)?))
    }

    fn check_batch<B: Backend>(&self, batch: &WindowBatch<B>) -> Result<()> {
        self.check_input_shapes(&batch.input_shapes())?;
        if !self.use_static_category {
            return Ok(());
        }
        let categories: Vec<i64> = batch.static_cat.clone().into_data().iter::<i64>().collect();
        let n_cat = self.cardinality.len();
        for (i, &c) in categories.iter().enumerate() {
            let card = self.cardinality[i % n_cat];
            if c < 0 || c as usize >= card {
                return Err(CoreError::Configuration(format!(
                    "static category {c} out of range for cardinality {card}"
                )));
            }
        }
        Ok(())
    }
}

/// Trainable layers shared by both variants.
#[derive(Module, Debug)]
pub struct DeepARNetwork<B: Backend> {
    /// One embedding per static categorical feature.
    embedders: Vec<Embedding<B>>,
    /// Stacked LSTM layers.
    rnn: Vec<Lstm<B>>,
    dropout: Dropout,
    /// Maps the hidden state to the distribution's raw arguments.
    proj: Linear<B>,
}

impl<B: Backend> DeepARNetwork<B> {
    fn new(config: &DeepARConfig, device: &B::Device) -> Self {
        let xavier = Initializer::XavierUniform { gain: 1.0 };

        let embedders = config
            .cardinality
            .iter()
            .zip(config.embedding_dims())
            .map(|(&card, dim)| EmbeddingConfig::new(card, dim).init(device))
            .collect();

        let rnn = (0..config.num_layers)
            .map(|layer| {
                let d_input = if layer == 0 {
                    config.input_size()
                } else {
                    config.hidden_size
                };
                LstmConfig::new(d_input, config.hidden_size, true)
                    .with_initializer(xavier.clone())
                    .init(device)
            })
            .collect();

        let proj = LinearConfig::new(config.hidden_size, config.distribution_output.args_dim())
            .with_initializer(xavier)
            .init(device);

        Self {
            embedders,
            rnn,
            dropout: DropoutConfig::new(config.dropout).init(),
            proj,
        }
    }

    /// Embeddings of the static categories followed by `log(scale)`, `[N, E + 1]`.
    fn static_features(
        &self,
        config: &DeepARConfig,
        static_cat: Tensor<B, 2, Int>,
        scale: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        let [n, _] = static_cat.dims();
        let static_cat = if config.use_static_category {
            static_cat
        } else {
            static_cat.zeros_like()
        };

        let mut parts: Vec<Tensor<B, 2>> = self
            .embedders
            .iter()
            .enumerate()
            .map(|(i, embedder)| {
                let column = static_cat.clone().slice([0..n, i..i + 1]);
                let embedded = embedder.forward(column);
                let [_, _, dim] = embedded.dims();
                embedded.reshape([n, dim])
            })
            .collect();
        parts.push(scale.log());
        Tensor::cat(parts, 1)
    }

    /// Run the LSTM stack over `inputs` `[N, S, I]`, continuing from `states`.
    fn unroll(
        &self,
        inputs: Tensor<B, 3>,
        states: Option<Vec<LstmState<B, 2>>>,
    ) -> (Tensor<B, 3>, Vec<LstmState<B, 2>>) {
        let initial: Vec<Option<LstmState<B, 2>>> = match states {
            Some(states) => states.into_iter().map(Some).collect(),
            None => self.rnn.iter().map(|_| None).collect(),
        };

        let mut x = inputs;
        let mut next_states = Vec::with_capacity(self.rnn.len());
        for (layer, (lstm, state)) in self.rnn.iter().zip(initial).enumerate() {
            if layer > 0 {
                x = self.dropout.forward(x);
            }
            let (output, state) = lstm.forward(x, state);
            x = output;
            next_states.push(state);
        }
        (x, next_states)
    }

    /// Raw distribution arguments for RNN outputs `[N, S, hidden]`.
    fn head(&self, outputs: Tensor<B, 3>) -> Tensor<B, 3> {
        self.proj.forward(self.dropout.forward(outputs))
    }
}

/// Lagged values of `sequence` `[N, L]` for `subsequence_length` steps ending
/// just before position `unrolled_end`, as `[N, subsequence_length, n_lags]`.
///
/// Step `s` of the result holds, for each lag `l`, the value at
/// `unrolled_end - subsequence_length + s - l`. Only positions before
/// `unrolled_end - 1` are read, so the sequence may stop one short of it.
pub fn lagged_subsequences<B: Backend>(
    sequence: Tensor<B, 2>,
    unrolled_end: usize,
    lags: &[usize],
    subsequence_length: usize,
) -> Tensor<B, 3> {
    let [n, _] = sequence.dims();
    let columns = lags
        .iter()
        .map(|&lag| {
            let begin = unrolled_end - subsequence_length - lag;
            sequence
                .clone()
                .slice([0..n, begin..begin + subsequence_length])
                .unsqueeze_dim::<3>(2)
        })
        .collect();
    Tensor::cat(columns, 2)
}

fn step_inputs<B: Backend>(
    lags: Tensor<B, 3>,
    time_feat: Tensor<B, 3>,
    static_feat: Tensor<B, 2>,
) -> Tensor<B, 3> {
    let [_, steps, _] = lags.dims();
    let static_feat = static_feat.unsqueeze_dim::<3>(1).repeat_dim(1, steps);
    Tensor::cat(vec![lags, time_feat, static_feat], 2)
}

/// Scale from the last `context_length` history steps, `[N, 1]`.
fn context_scale<B: Backend>(config: &DeepARConfig, batch: &WindowBatch<B>) -> Tensor<B, 2> {
    let [n, h] = batch.past_target.dims();
    let c = config.context_length;
    mean_scale(
        batch.past_target.clone().slice([0..n, h - c..h]),
        batch.past_observed.clone().slice([0..n, h - c..h]),
    )
}

/// Teacher-forced variant: per-step distributions over the horizon.
#[derive(Debug, Clone)]
pub struct DeepARTrainingNetwork<B: Backend> {
    config: DeepARConfig,
    network: DeepARNetwork<B>,
}

impl<B: Backend> DeepARTrainingNetwork<B> {
    /// Pair a configuration with a module built from it.
    #[must_use]
    pub fn from_parts(config: DeepARConfig, network: DeepARNetwork<B>) -> Self {
        Self { config, network }
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &DeepARConfig {
        &self.config
    }

    /// The trainable module.
    #[must_use]
    pub fn network(&self) -> &DeepARNetwork<B> {
        &self.network
    }

    /// Split into configuration and module.
    #[must_use]
    pub fn into_parts(self) -> (DeepARConfig, DeepARNetwork<B>) {
        (self.config, self.network)
    }

    /// Distributions of the `prediction_length` horizon steps, `[N, P]`.
    ///
    /// The unroll covers `context_length + prediction_length` steps; the
    /// observed horizon values are fed as lags for later horizon steps.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a batch whose shapes disagree with
    /// the config, and a numerical error for out-of-domain parameters.
    pub fn forward(&self, batch: &WindowBatch<B>) -> Result<NegativeBinomial<B, 2>> {
        let config = &self.config;
        config.check_batch(batch)?;

        let [n, h] = batch.past_target.dims();
        let [_, _, t] = batch.past_time_feat.dims();
        let c = config.context_length;
        let p = config.prediction_length;

        let scale = context_scale(config, batch);
        let sequence = Tensor::cat(
            vec![batch.past_target.clone(), batch.future_target.clone()],
            1,
        ) / scale.clone();
        let lags = lagged_subsequences(sequence, h + p, config.lags_seq(), c + p);

        let time_feat = Tensor::cat(
            vec![
                batch.past_time_feat.clone().slice([0..n, h - c..h, 0..t]),
                batch.future_time_feat.clone(),
            ],
            1,
        );
        let static_feat =
            self.network
                .static_features(config, batch.static_cat.clone(), scale.clone());

        let (outputs, _) = self
            .network
            .unroll(step_inputs(lags, time_feat, static_feat), None);
        let horizon = outputs.slice([0..n, c..c + p, 0..config.hidden_size]);
        config
            .distribution_output
            .distribution(self.network.head(horizon), scale)
    }
}

/// Output of an autoregressive rollout, each `[N, P]`.
#[derive(Debug, Clone)]
pub struct Rollout<B: Backend> {
    /// Values fed back at each step (means or samples).
    pub values: Tensor<B, 2>,
    /// Distribution mean at each step.
    pub mean: Tensor<B, 2>,
    /// Distribution dispersion at each step.
    pub dispersion: Tensor<B, 2>,
}

/// Autoregressive variant: encodes the context, then feeds back its own output.
#[derive(Debug, Clone)]
pub struct DeepARPredictionNetwork<B: Backend> {
    config: DeepARConfig,
    network: DeepARNetwork<B>,
}

impl<B: Backend> DeepARPredictionNetwork<B> {
    /// Pair a configuration with a module built from it.
    #[must_use]
    pub fn from_parts(config: DeepARConfig, network: DeepARNetwork<B>) -> Self {
        Self { config, network }
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &DeepARConfig {
        &self.config
    }

    /// The module holding the weights.
    #[must_use]
    pub fn network(&self) -> &DeepARNetwork<B> {
        &self.network
    }

    /// Unroll `prediction_length` steps past the context.
    ///
    /// At each step `next_value` picks the value fed back as the next input
    /// (for instance the mean, or a sample) from the step's distribution.
    /// Horizon targets in `batch` are ignored.
    ///
    /// # Errors
    ///
    /// Propagates shape, numerical and `next_value` errors.
    pub fn rollout<F>(&self, batch: &WindowBatch<B>, mut next_value: F) -> Result<Rollout<B>>
    where
        F: FnMut(&NegativeBinomial<B, 2>) -> Result<Tensor<B, 2>>,
    {
        let config = &self.config;
        config.check_batch(batch)?;

        let [n, h] = batch.past_target.dims();
        let [_, _, t] = batch.past_time_feat.dims();
        let c = config.context_length;
        let lags_seq = config.lags_seq();

        let scale = context_scale(config, batch);
        let static_feat =
            self.network
                .static_features(config, batch.static_cat.clone(), scale.clone());

        let mut sequence = batch.past_target.clone() / scale.clone();
        let context_inputs = step_inputs(
            lagged_subsequences(sequence.clone(), h, lags_seq, c),
            batch.past_time_feat.clone().slice([0..n, h - c..h, 0..t]),
            static_feat.clone(),
        );
        let (_, mut states) = self.network.unroll(context_inputs, None);

        let p = config.prediction_length;
        let mut values = Vec::with_capacity(p);
        let mut means = Vec::with_capacity(p);
        let mut dispersions = Vec::with_capacity(p);

        for step in 0..p {
            let inputs = step_inputs(
                lagged_subsequences(sequence.clone(), h + step + 1, lags_seq, 1),
                batch
                    .future_time_feat
                    .clone()
                    .slice([0..n, step..step + 1, 0..t]),
                static_feat.clone(),
            );
            let (outputs, next_states) = self.network.unroll(inputs, Some(states));
            states = next_states;

            let dist = config
                .distribution_output
                .distribution(self.network.head(outputs), scale.clone())?;
            let value = next_value(&dist)?;

            sequence = Tensor::cat(vec![sequence, value.clone() / scale.clone()], 1);
            values.push(value);
            means.push(dist.mean());
            dispersions.push(dist.dispersion());
        }

        Ok(Rollout {
            values: Tensor::cat(values, 1),
            mean: Tensor::cat(means, 1),
            dispersion: Tensor::cat(dispersions, 1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::TensorData;
    use burn_ndarray::NdArray;
    use deepar_core::Usage;
    use deepar_data::{
        forecast_window, Series, WindowConfig, WindowDataset, WindowedSeriesDataset, YearMonth,
    };
    use std::sync::Arc;

    type TestBackend = NdArray;

    fn small_config() -> DeepARConfig {
        DeepARConfig::new(Frequency::Monthly, 12, vec![112])
            .with_hidden_size(8)
            .with_num_layers(2)
    }

    fn series() -> Arc<Series> {
        let values = (0..144)
            .map(|i| 100.0 + i as f32 + 20.0 * ((i % 12) as f32 / 12.0 * std::f32::consts::TAU).sin())
            .collect();
        Arc::new(Series::new(YearMonth::new(1949, 1).unwrap(), values).unwrap())
    }

    fn batch(usage: Usage, indices: &[usize]) -> WindowBatch<TestBackend> {
        let ds = WindowedSeriesDataset::build(series(), usage, WindowConfig::new(Frequency::Monthly, 12, 12))
            .unwrap();
        let windows: Vec<_> = indices.iter().map(|&i| ds.get_window(i).unwrap()).collect();
        WindowBatch::from_windows(&windows, &Default::default()).unwrap()
    }

    #[test]
    fn test_config_derived_sizes() {
        let config = DeepARConfig::new(Frequency::Monthly, 12, vec![112]);
        assert_eq!(config.embedding_dims(), vec![50]);
        // 16 lags + 2 time features + 50 embedding + log scale
        assert_eq!(config.input_size(), 69);
        assert_eq!(DeepARConfig::new(Frequency::Monthly, 12, vec![5]).embedding_dims(), vec![3]);
    }

    #[test]
    fn test_config_validation() {
        assert!(small_config().validate().is_ok());
        assert!(small_config().with_context_length(0).validate().is_err());
        assert!(small_config().with_dropout(1.0).validate().is_err());
        let mut config = small_config();
        config.cardinality = vec![];
        assert!(config.validate().unwrap_err().is_configuration());
        let mut config = small_config();
        config.embedding_dimension = Some(vec![4, 4]);
        assert!(config.init::<TestBackend>(&Default::default()).is_err());
    }

    #[test]
    fn test_static_category_check() {
        let config = small_config().with_use_static_category(true);
        assert!(config.check_static_category(Some(111)).is_ok());
        assert!(config.check_static_category(Some(112)).is_err());
        assert!(small_config().check_static_category(Some(500)).is_ok());
    }

    #[test]
    fn test_lagged_subsequences() {
        let device = Default::default();
        let seq = Tensor::<TestBackend, 2>::from_data(
            TensorData::new((0..10).map(|v| v as f32).collect::<Vec<_>>(), [1, 10]),
            &device,
        );
        // Steps at positions 7, 8, 9 with lags 1 and 3.
        let lags = lagged_subsequences(seq.clone(), 10, &[1, 3], 3);
        assert_eq!(lags.dims(), [1, 3, 2]);
        let values: Vec<f32> = lags.into_data().iter::<f32>().collect();
        assert_eq!(values, vec![6.0, 4.0, 7.0, 5.0, 8.0, 6.0]);

        // A single step at position 10 reads a sequence that stops at 9.
        let lags = lagged_subsequences(seq, 11, &[1, 3], 1);
        let values: Vec<f32> = lags.into_data().iter::<f32>().collect();
        assert_eq!(values, vec![9.0, 7.0]);
    }

    #[test]
    fn test_static_embedding_materializes() {
        let device = Default::default();
        let config = small_config().with_use_static_category(true);
        let network = config.init::<TestBackend>(&device).unwrap().clone();

        let static_cat = Tensor::<TestBackend, 2, Int>::from_data(
            TensorData::new(vec![0i64, 111], [2, 1]),
            &device,
        );
        let scale = Tensor::<TestBackend, 2>::ones([2, 1], &device);
        let features = network.static_features(&config, static_cat, scale);
        assert_eq!(features.dims(), [2, 51]);

        let values: Vec<f32> = features.into_data().iter::<f32>().collect();
        assert!(values.iter().all(|v| v.is_finite()));
        // log(1.0) scale column
        assert_eq!(values[50], 0.0);
        assert_eq!(values[101], 0.0);
    }

    #[test]
    fn test_training_forward_shapes() {
        let device = Default::default();
        let net = small_config().build_training::<TestBackend>(&device).unwrap();
        let dist = net.forward(&batch(Usage::Train, &[0, 40, 90])).unwrap();
        assert_eq!(dist.mean().dims(), [3, 12]);

        let params = dist.to_params().unwrap();
        assert!(params.iter().all(|p| p.mean >= 0.0 && p.dispersion > 0.0));
    }

    #[test]
    fn test_shape_mismatch_is_configuration_error() {
        let device = Default::default();
        let net = small_config()
            .with_context_length(24)
            .build_training::<TestBackend>(&device)
            .unwrap();
        let err = net.forward(&batch(Usage::Train, &[0])).unwrap_err();
        assert!(matches!(err, CoreError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_rollout_mean_is_deterministic() {
        let device = Default::default();
        let net = small_config().build_inference::<TestBackend>(&device).unwrap();
        let window = forecast_window(&series(), &WindowConfig::new(Frequency::Monthly, 12, 12)).unwrap();
        let batch = WindowBatch::<TestBackend>::from_windows(&[window], &device).unwrap();

        let a = net.rollout(&batch, |d| Ok(d.mean())).unwrap();
        let b = net.rollout(&batch, |d| Ok(d.mean())).unwrap();
        assert_eq!(a.values.dims(), [1, 12]);

        let a: Vec<f32> = a.values.into_data().iter::<f32>().collect();
        let b: Vec<f32> = b.values.into_data().iter::<f32>().collect();
        assert_eq!(a, b);
        assert!(a.iter().all(|v| v.is_finite() && *v >= 0.0));
    }

    #[test]
    fn test_training_and_prediction_share_weights() {
        let device = Default::default();
        let training = small_config().build_training::<TestBackend>(&device).unwrap();
        let (config, network) = training.into_parts();
        let predictor = DeepARPredictionNetwork::from_parts(config, network);
        let rollout = predictor
            .rollout(&batch(Usage::Test, &[0, 1]), |d| Ok(d.mean()))
            .unwrap();
        assert_eq!(rollout.mean.dims(), [2, 12]);
        assert_eq!(rollout.dispersion.dims(), [2, 12]);
    }
}
