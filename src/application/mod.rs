// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Wires the other layers together for one user-level task.
// No tensor math and no argument parsing here; only the order
// in which things happen and the context attached to errors.

/// One training run: validate, load, build, resume, train
pub mod train_use_case;

/// Raw SVHN → npz conversion
pub mod convert_use_case;
