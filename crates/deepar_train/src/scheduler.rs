//! Learning rate schedulers.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainError};

/// Trait for learning rate schedulers.
pub trait Scheduler: Send + Sync {
    /// Get the learning rate for the current step.
    fn get_lr(&self, step: usize) -> f64;

    /// Get the scheduler name.
    fn name(&self) -> &str;
}

/// Learning rate schedule selected in a trainer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LrSchedule {
    /// The base learning rate at every step.
    #[default]
    Constant,
    /// One-cycle policy peaking at the base learning rate.
    OneCycle,
}

impl LrSchedule {
    /// Build the scheduler for `total_steps` optimizer steps.
    ///
    /// # Errors
    ///
    /// Returns [`TrainError::InvalidLearningRate`] for a non-positive or
    /// non-finite learning rate.
    pub fn build(&self, lr: f64, total_steps: usize) -> Result<Box<dyn Scheduler>> {
        if !lr.is_finite() || lr <= 0.0 {
            return Err(TrainError::InvalidLearningRate(format!(
                "learning rate must be positive and finite, got {lr}"
            )));
        }
        Ok(match self {
            Self::Constant => Box::new(ConstantLR::new(lr)),
            Self::OneCycle => Box::new(OneCycleLR::simple(lr, total_steps.max(1))),
        })
    }
}

/// Constant learning rate.
#[derive(Debug, Clone, Copy)]
pub struct ConstantLR {
    lr: f64,
}

impl ConstantLR {
    /// Create a constant scheduler.
    pub fn new(lr: f64) -> Self {
        Self { lr }
    }
}

impl Scheduler for ConstantLR {
    fn get_lr(&self, _step: usize) -> f64 {
        self.lr
    }

    fn name(&self) -> &str {
        "ConstantLR"
    }
}

/// Configuration for [`OneCycleLR`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneCycleLRConfig {
    /// Peak learning rate.
    pub max_lr: f64,
    /// Total number of steps.
    pub total_steps: usize,
    /// Fraction of steps spent warming up.
    pub pct_start: f64,
    /// Initial LR is `max_lr / div_factor`.
    pub div_factor: f64,
    /// Final LR is `max_lr / final_div_factor`.
    pub final_div_factor: f64,
}

impl Default for OneCycleLRConfig {
    fn default() -> Self {
        Self {
            max_lr: 1e-3,
            total_steps: 1000,
            pct_start: 0.3,
            div_factor: 25.0,
            final_div_factor: 10000.0,
        }
    }
}

/// One-cycle schedule: linear warmup to `max_lr`, then cosine decay.
#[derive(Debug, Clone)]
pub struct OneCycleLR {
    config: OneCycleLRConfig,
    initial_lr: f64,
    final_lr: f64,
    warmup_steps: usize,
}

impl OneCycleLR {
    /// Create a new one-cycle scheduler.
    pub fn new(config: OneCycleLRConfig) -> Self {
        let initial_lr = config.max_lr / config.div_factor;
        let final_lr = config.max_lr / config.final_div_factor;
        let warmup_steps = (config.total_steps as f64 * config.pct_start) as usize;
        Self {
            config,
            initial_lr,
            final_lr,
            warmup_steps,
        }
    }

    /// Create with default shape parameters.
    pub fn simple(max_lr: f64, total_steps: usize) -> Self {
        Self::new(OneCycleLRConfig {
            max_lr,
            total_steps,
            ..Default::default()
        })
    }
}

impl Scheduler for OneCycleLR {
    fn get_lr(&self, step: usize) -> f64 {
        let step = step.min(self.config.total_steps.saturating_sub(1));
        if step < self.warmup_steps {
            let progress = step as f64 / self.warmup_steps as f64;
            self.initial_lr + (self.config.max_lr - self.initial_lr) * progress
        } else {
            let annealing_steps = (self.config.total_steps - self.warmup_steps).max(1);
            let progress = (step - self.warmup_steps) as f64 / annealing_steps as f64;
            let cosine = (1.0 + (std::f64::consts::PI * progress).cos()) / 2.0;
            self.final_lr + (self.config.max_lr - self.final_lr) * cosine
        }
    }

    fn name(&self) -> &str {
        "OneCycleLR"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_constant() {
        let s = LrSchedule::Constant.build(1e-3, 10).unwrap();
        assert_eq!(s.get_lr(0), 1e-3);
        assert_eq!(s.get_lr(1_000), 1e-3);
        assert_eq!(s.name(), "ConstantLR");
    }

    #[test]
    fn test_one_cycle_shape() {
        let s = OneCycleLR::simple(1e-2, 100);
        assert_relative_eq!(s.get_lr(0), 1e-2 / 25.0);
        assert_relative_eq!(s.get_lr(30), 1e-2);
        assert!(s.get_lr(15) > s.get_lr(0));
        assert!(s.get_lr(99) < s.get_lr(60));
        assert!(s.get_lr(99) >= 1e-2 / 10000.0);
    }

    #[test]
    fn test_invalid_lr() {
        assert!(LrSchedule::OneCycle.build(0.0, 10).is_err());
        assert!(matches!(
            LrSchedule::Constant.build(f64::NAN, 10),
            Err(e) if e.is_configuration()
        ));
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&LrSchedule::OneCycle).unwrap();
        assert_eq!(json, "\"one_cycle\"");
    }
}
