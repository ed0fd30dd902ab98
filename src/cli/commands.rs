// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Three subcommands:
//
//   gd            full-batch gradient descent (FashionMNIST defaults)
//   fisher        gradient descent + diagonal-Fisher noise (SVHN defaults)
//   convert-svhn  raw .mat files → train.npz / test.npz
//
// The training subcommands are turned into a `RunConfig` here;
// nothing below this layer sees clap types.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::data::svhn::SvhnConverter;
use crate::domain::run_config::{ModelKind, NoiseConfig, RunConfig};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Full-batch gradient descent baseline
    Gd(GdArgs),

    /// Gradient descent with diagonal-Fisher gradient noise
    Fisher(FisherArgs),

    /// Convert the raw SVHN .mat files into npz splits
    ConvertSvhn(ConvertArgs),
}

/// Flags shared by both training subcommands.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Seeds the backend, the batch shuffle and the noise draws
    #[arg(long, default_value_t = 1234)]
    pub seed: u64,

    /// Checkpoint to resume from (iter-<i>.mpk.gz)
    #[arg(long)]
    pub resume: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct GdArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Number of iterations (exclusive upper bound of the index)
    #[arg(long, default_value_t = 10_001)]
    pub iters: usize,

    #[arg(long = "batchsize", default_value_t = 1000)]
    pub batch_size: usize,

    #[arg(long = "test-batchsize", default_value_t = 10_000)]
    pub test_batch_size: usize,

    #[arg(long, default_value_t = 0.01)]
    pub lr: f64,

    /// Iterations at which the learning rate is multiplied by 0.1
    #[arg(long, num_args = 0..)]
    pub schedule: Vec<usize>,

    #[arg(long, default_value = "conv-small")]
    pub model: ModelKind,

    #[arg(long, default_value_t = 100)]
    pub checkpoint_every: usize,

    #[arg(long = "datadir", default_value = "data/fashion-mnist")]
    pub data_dir: PathBuf,

    #[arg(long = "logdir", default_value = "logs/gd")]
    pub log_dir: PathBuf,
}

impl From<GdArgs> for RunConfig {
    fn from(a: GdArgs) -> Self {
        RunConfig {
            seed:             a.run.seed,
            iters:            a.iters,
            batch_size:       a.batch_size,
            test_batch_size:  a.test_batch_size,
            learning_rate:    a.lr,
            schedule:         a.schedule,
            noise:            None,
            momentum:         0.0,
            weight_decay:     0.0,
            model:            a.model,
            checkpoint_every: a.checkpoint_every,
            data_dir:         a.data_dir,
            log_dir:          a.log_dir,
            resume:           a.run.resume,
        }
    }
}

#[derive(Args, Debug)]
pub struct FisherArgs {
    #[command(flatten)]
    pub run: RunArgs,

    #[arg(long, default_value_t = 100_001)]
    pub iters: usize,

    /// Iterations at which the learning rate is multiplied by 0.1
    #[arg(long, num_args = 0.., default_values_t = [40_000, 60_000])]
    pub schedule: Vec<usize>,

    #[arg(long = "batchsize", default_value_t = 1000)]
    pub batch_size: usize,

    #[arg(long = "test-batchsize", default_value_t = 1000)]
    pub test_batch_size: usize,

    #[arg(long, default_value_t = 0.1)]
    pub lr: f64,

    /// Samples per ghost batch
    #[arg(long = "ghostsize", default_value_t = 100)]
    pub ghost_size: usize,

    /// Ghost batches per noise estimate
    #[arg(long = "numghost", default_value_t = 100)]
    pub num_ghost: usize,

    /// Re-estimate the noise every this many iterations
    #[arg(long = "update-noise", default_value_t = 10)]
    pub update_noise: usize,

    #[arg(long, default_value_t = 0.0)]
    pub momentum: f64,

    #[arg(long = "weightdecay", default_value_t = 0.0)]
    pub weight_decay: f64,

    #[arg(long, default_value = "vgg")]
    pub model: ModelKind,

    #[arg(long, default_value_t = 2000)]
    pub checkpoint_every: usize,

    #[arg(long = "datadir", default_value = "data/svhn")]
    pub data_dir: PathBuf,

    #[arg(long = "logdir", default_value = "logs/fisher")]
    pub log_dir: PathBuf,
}

impl From<FisherArgs> for RunConfig {
    fn from(a: FisherArgs) -> Self {
        RunConfig {
            seed:             a.run.seed,
            iters:            a.iters,
            batch_size:       a.batch_size,
            test_batch_size:  a.test_batch_size,
            learning_rate:    a.lr,
            schedule:         a.schedule,
            noise:            Some(NoiseConfig {
                ghost_size:      a.ghost_size,
                num_ghost:       a.num_ghost,
                update_interval: a.update_noise,
            }),
            momentum:         a.momentum,
            weight_decay:     a.weight_decay,
            model:            a.model,
            checkpoint_every: a.checkpoint_every,
            data_dir:         a.data_dir,
            log_dir:          a.log_dir,
            resume:           a.run.resume,
        }
    }
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Directory holding train_32x32.mat and test_32x32.mat
    #[arg(long, default_value = "data/svhn/raw")]
    pub raw_dir: PathBuf,

    /// Where train.npz and test.npz are written
    #[arg(long, default_value = "data/svhn")]
    pub out_dir: PathBuf,

    #[arg(long, default_value_t = 5000)]
    pub train_size: usize,

    #[arg(long, default_value_t = 5000)]
    pub test_size: usize,
}

impl From<ConvertArgs> for SvhnConverter {
    fn from(a: ConvertArgs) -> Self {
        SvhnConverter {
            raw_dir:    a.raw_dir,
            out_dir:    a.out_dir,
            train_size: a.train_size,
            test_size:  a.test_size,
        }
    }
}
