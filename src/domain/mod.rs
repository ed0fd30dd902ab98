// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types that describe an experiment run.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only configuration values and pure functions

/// Immutable hyperparameters of one run
pub mod run_config;

/// Learning-rate decay, evaluation and checkpoint cadences
pub mod schedule;

/// Per-evaluation scalars and the run-log status line
pub mod eval_summary;
