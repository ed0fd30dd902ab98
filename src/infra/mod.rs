// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything a run writes into its log directory:
//
//   checkpoint.rs — iter-<i>.mpk.gz snapshots of TrainingState
//                   (iteration, learning rate, model, optimizer)
//   metrics.rs    — scalars.csv time series (wall_time,step,tag,value)
//   run_log.rs    — log.txt, the human-readable status log
//
// config.json is written by the train use case with serde_json.

/// Checkpoint save / load with Burn's named MessagePack recorder
pub mod checkpoint;

/// Scalar metrics CSV writer
pub mod metrics;

/// Append-only plain-text run log
pub mod run_log;
