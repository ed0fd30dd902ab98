// ============================================================
// Layer 3 — Iteration Cadences
// ============================================================
// Pure functions deciding what happens at iteration `i`:
//   - learning-rate decay (exact-match schedule points)
//   - evaluation (every iteration up to 100, then every 100th)
//   - checkpointing (every `checkpoint_every`th iteration)

/// Factor applied to the learning rate at each schedule point.
pub const LR_DECAY: f64 = 0.1;

/// Evaluate every iteration in `0..=DENSE_EVAL_UNTIL`, then every
/// `EVAL_EVERY`th iteration.
pub const DENSE_EVAL_UNTIL: usize = 100;
pub const EVAL_EVERY: usize = 100;

/// True if the learning rate decays *at* iteration `i`.
/// Membership is exact; ranges are not expanded.
pub fn decays_at(schedule: &[usize], i: usize) -> bool {
    schedule.contains(&i)
}

/// Closed form of the learning rate in effect during iteration `i`:
/// `initial * 0.1^(number of schedule points <= i)`.
pub fn lr_at(initial: f64, schedule: &[usize], i: usize) -> f64 {
    let mut points: Vec<usize> = schedule.iter().copied().filter(|&p| p <= i).collect();
    points.sort_unstable();
    points.dedup();
    initial * LR_DECAY.powi(points.len() as i32)
}

pub fn is_eval_iteration(i: usize) -> bool {
    i % EVAL_EVERY == 0 || i <= DENSE_EVAL_UNTIL
}

pub fn is_checkpoint_iteration(i: usize, every: usize) -> bool {
    every > 0 && i % every == 0
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lr_closed_form() {
        let schedule = [40_000, 60_000];
        assert_eq!(lr_at(0.1, &schedule, 0), 0.1);
        assert_eq!(lr_at(0.1, &schedule, 39_999), 0.1);
        assert!((lr_at(0.1, &schedule, 40_000) - 0.01).abs() < 1e-15);
        assert!((lr_at(0.1, &schedule, 100_000) - 0.001).abs() < 1e-15);
    }

    #[test]
    fn test_lr_multiplicative_matches_closed_form() {
        // Decaying step by step must agree with the closed form.
        let schedule = [3, 7, 8];
        let mut lr = 0.5;
        for i in 0..12 {
            if decays_at(&schedule, i) {
                lr *= LR_DECAY;
            }
            assert!((lr - lr_at(0.5, &schedule, i)).abs() < 1e-12, "iteration {i}");
        }
    }

    #[test]
    fn test_schedule_is_exact_match() {
        assert!(decays_at(&[10], 10));
        assert!(!decays_at(&[10], 11));
        assert!(!decays_at(&[], 0));
    }

    #[test]
    fn test_eval_cadence() {
        let evaluated: Vec<usize> = (0..450).filter(|&i| is_eval_iteration(i)).collect();
        let mut expected: Vec<usize> = (0..=100).collect();
        expected.extend([200, 300, 400]);
        assert_eq!(evaluated, expected);
    }

    #[test]
    fn test_checkpoint_cadence() {
        assert!(is_checkpoint_iteration(0, 2000));
        assert!(is_checkpoint_iteration(4000, 2000));
        assert!(!is_checkpoint_iteration(100, 2000));
        assert!(!is_checkpoint_iteration(5, 0));
    }
}
