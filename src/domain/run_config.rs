// ============================================================
// Layer 3 — Run Configuration
// ============================================================
// Every hyperparameter of one experiment run, gathered into a
// single immutable value. The CLI builds it once; every other
// component receives it (or the piece it needs) explicitly.
//
// Serialisable so the exact configuration can be dumped next
// to the run's logs and checkpoints.

use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration problems detected before any training happens.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown model variant '{0}' (expected one of: conv-small, vgg, resnet)")]
    UnknownModel(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("iteration range is empty: start at {start}, stop before {iters}")]
    EmptyRange { start: usize, iters: usize },

    #[error("{model} needs images of at least {min}x{min}, got {height}x{width}")]
    ImageTooSmall { model: ModelKind, min: usize, height: usize, width: usize },
}

// ─── ModelKind ────────────────────────────────────────────────────────────────
/// The closed set of classifier architectures a run can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    /// Two conv stages and an MLP head, sized for 28x28 greyscale input
    ConvSmall,
    /// VGG-11 with batch norm
    Vgg,
    /// CIFAR-style ResNet-18
    Resnet,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::ConvSmall => "conv-small",
            ModelKind::Vgg       => "vgg",
            ModelKind::Resnet    => "resnet",
        }
    }

    /// Smallest height and width the architecture can reduce without
    /// pooling a spatial dimension down to zero.
    pub fn min_image_side(&self) -> usize {
        match self {
            ModelKind::ConvSmall => 4,
            ModelKind::Vgg       => 32,
            ModelKind::Resnet    => 1,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "conv-small" | "convsmall" => Ok(ModelKind::ConvSmall),
            "vgg" | "vgg11"            => Ok(ModelKind::Vgg),
            "resnet" | "resnet18"      => Ok(ModelKind::Resnet),
            other                      => Err(ConfigError::UnknownModel(other.to_string())),
        }
    }
}

// ─── NoiseConfig ──────────────────────────────────────────────────────────────
/// Ghost-batch settings for the diagonal-Fisher noise variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseConfig {
    /// Samples per ghost batch
    pub ghost_size:      usize,
    /// Ghost batches averaged per estimate
    pub num_ghost:       usize,
    /// Re-estimate every this many iterations
    pub update_interval: usize,
}

// ─── RunConfig ────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub seed:             u64,
    /// Exclusive upper bound of the iteration index
    pub iters:            usize,
    pub batch_size:       usize,
    pub test_batch_size:  usize,
    pub learning_rate:    f64,
    /// Iterations at which the learning rate is multiplied by 0.1
    pub schedule:         Vec<usize>,
    /// `None` runs plain full-batch gradient descent
    pub noise:            Option<NoiseConfig>,
    pub momentum:         f64,
    pub weight_decay:     f64,
    pub model:            ModelKind,
    pub checkpoint_every: usize,
    pub data_dir:         PathBuf,
    pub log_dir:          PathBuf,
    pub resume:           Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed:             1234,
            iters:            10_001,
            batch_size:       1000,
            test_batch_size:  10_000,
            learning_rate:    0.01,
            schedule:         Vec::new(),
            noise:            None,
            momentum:         0.0,
            weight_decay:     0.0,
            model:            ModelKind::ConvSmall,
            checkpoint_every: 100,
            data_dir:         PathBuf::from("data/fashion-mnist"),
            log_dir:          PathBuf::from("logs/gd"),
            resume:           None,
        }
    }
}

impl RunConfig {
    /// Reject settings that would make the loop divide by zero or
    /// silently do nothing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("batch_size",       self.batch_size),
            ("test_batch_size",  self.test_batch_size),
            ("checkpoint_every", self.checkpoint_every),
            ("iters",            self.iters),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        if let Some(noise) = &self.noise {
            let positive = [
                ("ghost_size",      noise.ghost_size),
                ("num_ghost",       noise.num_ghost),
                ("update_interval", noise.update_interval),
            ];
            for (field, value) in positive {
                if value == 0 {
                    return Err(ConfigError::Zero { field });
                }
            }
        }
        Ok(())
    }

    /// Check that `[start, iters)` contains at least one iteration.
    pub fn check_range(&self, start: usize) -> Result<(), ConfigError> {
        if start >= self.iters {
            return Err(ConfigError::EmptyRange { start, iters: self.iters });
        }
        Ok(())
    }

    pub fn is_noisy(&self) -> bool {
        self.noise.is_some()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_kind_parses_aliases() {
        assert_eq!("vgg".parse::<ModelKind>().unwrap(), ModelKind::Vgg);
        assert_eq!("ResNet18".parse::<ModelKind>().unwrap(), ModelKind::Resnet);
        assert_eq!("conv-small".parse::<ModelKind>().unwrap(), ModelKind::ConvSmall);
    }

    #[test]
    fn test_unknown_model_is_config_error() {
        let err = "alexnet".parse::<ModelKind>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownModel(ref name) if name == "alexnet"));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(RunConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_ghost_size_rejected() {
        let cfg = RunConfig {
            noise: Some(NoiseConfig { ghost_size: 0, num_ghost: 4, update_interval: 10 }),
            ..RunConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Zero { field: "ghost_size" })
        ));
    }

    #[test]
    fn test_empty_range_rejected() {
        let cfg = RunConfig { iters: 10, ..RunConfig::default() };
        assert!(cfg.check_range(9).is_ok());
        assert!(cfg.check_range(10).is_err());
    }

    #[test]
    fn test_min_image_side_per_model() {
        assert_eq!(ModelKind::Vgg.min_image_side(), 32);
        assert_eq!(ModelKind::ConvSmall.min_image_side(), 4);
        assert_eq!(ModelKind::Resnet.min_image_side(), 1);
    }

    #[test]
    fn test_config_json_round_trip() {
        let cfg = RunConfig {
            schedule: vec![40_000, 60_000],
            noise:    Some(NoiseConfig { ghost_size: 100, num_ghost: 100, update_interval: 10 }),
            model:    ModelKind::Vgg,
            ..RunConfig::default()
        };
        let json = serde_json::to_string_pretty(&cfg).unwrap();
        assert!(json.contains("\"vgg\""));
        let back: RunConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
