//! Callback system for training hooks.
//!
//! Callbacks are generic over the inference backend: after each epoch they
//! receive the prediction network built from the current weights, which is
//! what [`SaveModelCallback`] persists.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use burn::prelude::*;

use deepar_models::checkpoint::{save_checkpoint, ModelProperties};
use deepar_models::DeepARPredictionNetwork;

use crate::error::Result;

/// Property key of the validation RMSSE in a checkpoint.
pub const RMSSE_PROPERTY: &str = "RMSSE";
/// Property key of the loss in a checkpoint.
pub const LOSS_PROPERTY: &str = "Loss";

/// Quantity behind a monitored value, ordered from fallback to preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Monitor {
    /// Mean training loss.
    TrainLoss,
    /// Validation loss.
    ValidLoss,
    /// Validation RMSSE.
    Rmsse,
}

impl std::fmt::Display for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TrainLoss => write!(f, "train_loss"),
            Self::ValidLoss => write!(f, "valid_loss"),
            Self::Rmsse => write!(f, "rmsse"),
        }
    }
}

/// A monitored value tagged with the quantity it measures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Monitored {
    /// What the value measures.
    pub kind: Monitor,
    /// The value, lower is better.
    pub value: f32,
}

impl Monitored {
    /// Whether this value should replace `best`.
    ///
    /// Values of the same kind are compared directly. A preferred kind
    /// always replaces a fallback one and a fallback never replaces a
    /// preferred one. NaN never improves.
    pub fn improves_on(&self, best: Option<&Monitored>) -> bool {
        if self.value.is_nan() {
            return false;
        }
        match best {
            None => true,
            Some(best) => match self.kind.cmp(&best.kind) {
                Ordering::Equal => self.value < best.value,
                Ordering::Greater => true,
                Ordering::Less => false,
            },
        }
    }
}

/// Training state passed to callbacks.
#[derive(Debug, Clone)]
pub struct CallbackContext {
    /// Current epoch (0-indexed).
    pub epoch: usize,
    /// Total number of epochs.
    pub n_epochs: usize,
    /// Current batch (0-indexed).
    pub batch: usize,
    /// Total number of batches in an epoch.
    pub n_batches: usize,
    /// Current learning rate.
    pub lr: f64,
    /// Mean training loss of the epoch, or loss of the last batch.
    pub train_loss: Option<f32>,
    /// Validation loss of the epoch.
    pub valid_loss: Option<f32>,
    /// Validation RMSSE of the epoch.
    pub rmsse: Option<f32>,
    /// Whether the monitored value improved this epoch.
    pub improved: bool,
    /// Set by a callback to end training after the current epoch.
    pub stop_training: bool,
}

impl CallbackContext {
    /// Create a new callback context.
    pub fn new(n_epochs: usize, n_batches: usize) -> Self {
        Self {
            epoch: 0,
            n_epochs,
            batch: 0,
            n_batches,
            lr: 0.0,
            train_loss: None,
            valid_loss: None,
            rmsse: None,
            improved: false,
            stop_training: false,
        }
    }

    /// Get progress as a fraction (0.0 to 1.0).
    pub fn progress(&self) -> f32 {
        let total_batches = self.n_epochs * self.n_batches;
        if total_batches == 0 {
            return 0.0;
        }
        let current = self.epoch * self.n_batches + self.batch;
        current as f32 / total_batches as f32
    }

    /// Value that decides the best epoch, lower is better.
    ///
    /// RMSSE when it could be computed, otherwise the validation loss,
    /// otherwise the training loss.
    pub fn monitored(&self) -> Option<Monitored> {
        let tag = |kind: Monitor| move |value: f32| Monitored { kind, value };
        self.rmsse
            .map(tag(Monitor::Rmsse))
            .or_else(|| self.valid_loss.map(tag(Monitor::ValidLoss)))
            .or_else(|| self.train_loss.map(tag(Monitor::TrainLoss)))
    }

    /// Loss reported next to the RMSSE: validation loss if available.
    pub fn reported_loss(&self) -> Option<f32> {
        self.valid_loss.or(self.train_loss)
    }
}

/// Trait for training callbacks.
pub trait Callback<B: Backend>: Send {
    /// Called before training starts.
    fn before_fit(&mut self, _ctx: &mut CallbackContext) -> Result<()> {
        Ok(())
    }

    /// Called after training completes.
    fn after_fit(&mut self, _ctx: &mut CallbackContext) -> Result<()> {
        Ok(())
    }

    /// Called before each epoch.
    fn before_epoch(&mut self, _ctx: &mut CallbackContext) -> Result<()> {
        Ok(())
    }

    /// Called after each epoch's validation with the current weights.
    fn after_epoch(
        &mut self,
        _ctx: &mut CallbackContext,
        _network: &DeepARPredictionNetwork<B>,
    ) -> Result<()> {
        Ok(())
    }

    /// Called after each training batch.
    fn after_batch(&mut self, _ctx: &mut CallbackContext) -> Result<()> {
        Ok(())
    }

    /// Get the callback name.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A list of callbacks, called in insertion order.
pub struct CallbackList<B: Backend> {
    callbacks: Vec<Box<dyn Callback<B>>>,
}

impl<B: Backend> Default for CallbackList<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> CallbackList<B> {
    /// Create a new empty callback list.
    pub fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    /// Add a callback.
    pub fn add<C: Callback<B> + 'static>(&mut self, callback: C) {
        self.callbacks.push(Box::new(callback));
    }

    /// Number of callbacks.
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Check if there are no callbacks.
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Call before_fit on all callbacks.
    pub fn before_fit(&mut self, ctx: &mut CallbackContext) -> Result<()> {
        for cb in &mut self.callbacks {
            cb.before_fit(ctx)?;
        }
        Ok(())
    }

    /// Call after_fit on all callbacks.
    pub fn after_fit(&mut self, ctx: &mut CallbackContext) -> Result<()> {
        for cb in &mut self.callbacks {
            cb.after_fit(ctx)?;
        }
        Ok(())
    }

    /// Call before_epoch on all callbacks.
    pub fn before_epoch(&mut self, ctx: &mut CallbackContext) -> Result<()> {
        for cb in &mut self.callbacks {
            cb.before_epoch(ctx)?;
        }
        Ok(())
    }

    /// Call after_epoch on all callbacks.
    pub fn after_epoch(
        &mut self,
        ctx: &mut CallbackContext,
        network: &DeepARPredictionNetwork<B>,
    ) -> Result<()> {
        for cb in &mut self.callbacks {
            cb.after_epoch(ctx, network)?;
        }
        Ok(())
    }

    /// Call after_batch on all callbacks.
    pub fn after_batch(&mut self, ctx: &mut CallbackContext) -> Result<()> {
        for cb in &mut self.callbacks {
            cb.after_batch(ctx)?;
        }
        Ok(())
    }
}

/// Logs epoch summaries through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct ProgressCallback {
    show_batch: bool,
}

impl ProgressCallback {
    /// Create a new progress callback.
    pub fn new(show_batch: bool) -> Self {
        Self { show_batch }
    }
}

fn fmt_metric(value: Option<f32>) -> String {
    value.map(|v| format!("{:.5}", v)).unwrap_or_else(|| "n/a".to_string())
}

impl<B: Backend> Callback<B> for ProgressCallback {
    fn before_fit(&mut self, ctx: &mut CallbackContext) -> Result<()> {
        tracing::info!(
            "Starting training for {} epochs ({} batches per epoch)",
            ctx.n_epochs,
            ctx.n_batches
        );
        Ok(())
    }

    fn after_batch(&mut self, ctx: &mut CallbackContext) -> Result<()> {
        if self.show_batch {
            tracing::debug!(
                "Epoch {} batch {}/{}: loss={}, lr={:.6}",
                ctx.epoch + 1,
                ctx.batch + 1,
                ctx.n_batches,
                fmt_metric(ctx.train_loss),
                ctx.lr
            );
        }
        Ok(())
    }

    fn after_epoch(
        &mut self,
        ctx: &mut CallbackContext,
        _network: &DeepARPredictionNetwork<B>,
    ) -> Result<()> {
        let marker = if ctx.improved { " *" } else { "" };
        tracing::info!(
            "Epoch {:3}/{}: train_loss={}, valid_loss={}, rmsse={}, lr={:.6}{}",
            ctx.epoch + 1,
            ctx.n_epochs,
            fmt_metric(ctx.train_loss),
            fmt_metric(ctx.valid_loss),
            fmt_metric(ctx.rmsse),
            ctx.lr,
            marker
        );
        Ok(())
    }

    fn after_fit(&mut self, _ctx: &mut CallbackContext) -> Result<()> {
        tracing::info!("Training completed");
        Ok(())
    }

    fn name(&self) -> &str {
        "ProgressCallback"
    }
}

/// Persists the best network seen so far into a single checkpoint slot.
///
/// After every epoch whose monitored value (see
/// [`CallbackContext::monitored`] and [`Monitored::improves_on`]) improves
/// on the best so far, the
/// checkpoint in `save_dir` is overwritten with the current weights and the
/// `RMSSE` and `Loss` properties.
///
/// # Example
///
/// ```rust,ignore
/// use deepar_train::callback::SaveModelCallback;
///
/// trainer.add_callback(SaveModelCallback::new("output/model"));
/// ```
#[derive(Debug, Clone)]
pub struct SaveModelCallback {
    save_dir: PathBuf,
    best: Option<Monitored>,
    best_epoch: Option<usize>,
}

impl SaveModelCallback {
    /// Create a callback writing into `save_dir`.
    pub fn new<P: Into<PathBuf>>(save_dir: P) -> Self {
        Self {
            save_dir: save_dir.into(),
            best: None,
            best_epoch: None,
        }
    }

    /// Checkpoint directory.
    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Epoch of the saved checkpoint, if any.
    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    /// Monitored value of the saved checkpoint.
    pub fn best(&self) -> Option<Monitored> {
        self.best
    }

    fn properties(ctx: &CallbackContext) -> ModelProperties {
        let mut properties = ModelProperties::new().with_epoch(ctx.epoch);
        if let Some(rmsse) = ctx.rmsse {
            properties = properties.with_metric(RMSSE_PROPERTY, rmsse);
        }
        if let Some(loss) = ctx.reported_loss() {
            properties = properties.with_metric(LOSS_PROPERTY, loss);
        }
        properties
    }
}

impl<B: Backend> Callback<B> for SaveModelCallback {
    fn after_epoch(
        &mut self,
        ctx: &mut CallbackContext,
        network: &DeepARPredictionNetwork<B>,
    ) -> Result<()> {
        let Some(current) = ctx.monitored() else {
            return Ok(());
        };
        if !current.improves_on(self.best.as_ref()) {
            return Ok(());
        }

        save_checkpoint(
            &self.save_dir,
            network.config(),
            network.network(),
            &Self::properties(ctx),
        )?;
        tracing::info!(
            "Saved best model (epoch {}, {} {:.5}) to {}",
            ctx.epoch + 1,
            current.kind,
            current.value,
            self.save_dir.display()
        );
        self.best = Some(current);
        self.best_epoch = Some(ctx.epoch);
        Ok(())
    }

    fn name(&self) -> &str {
        "SaveModelCallback"
    }
}
