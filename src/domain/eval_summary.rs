// ============================================================
// Layer 3 — Evaluation Summary
// ============================================================
// What one evaluation event reports: the scalars written to the
// metrics series and the status line written to the run log.

/// Mean loss and accuracy over a list of batches.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BatchStats {
    pub loss:     f64,
    /// Fraction in [0, 1]
    pub accuracy: f64,
}

impl BatchStats {
    /// Average per-batch sums; zero batches give all-zero stats.
    pub fn from_sums(loss_sum: f64, accuracy_sum: f64, batches: usize) -> Self {
        if batches == 0 {
            return Self::default();
        }
        let n = batches as f64;
        Self { loss: loss_sum / n, accuracy: accuracy_sum / n }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvalSummary {
    pub iteration:     usize,
    pub learning_rate: f64,
    /// Present only for noise-injection runs
    pub noise_norm2:   Option<f64>,
    pub train:         BatchStats,
    pub test:          BatchStats,
}

impl EvalSummary {
    pub fn accuracy_gap(&self) -> f64 {
        self.train.accuracy - self.test.accuracy
    }

    /// `Iter:<i>, Test [acc: <.2>, loss: <.4>], Train [acc: <.2>, loss: <.4>]`
    pub fn status_line(&self) -> String {
        format!(
            "Iter:{}, Test [acc: {:.2}, loss: {:.4}], Train [acc: {:.2}, loss: {:.4}]",
            self.iteration,
            self.test.accuracy,
            self.test.loss,
            self.train.accuracy,
            self.train.loss,
        )
    }

    /// (tag, value) pairs in the order they are written.
    pub fn scalars(&self) -> Vec<(&'static str, f64)> {
        let mut out = vec![("lr", self.learning_rate)];
        if let Some(norm2) = self.noise_norm2 {
            out.push(("noise/norm2", norm2));
        }
        out.extend([
            ("acc/train",  self.train.accuracy),
            ("loss/train", self.train.loss),
            ("loss/test",  self.test.loss),
            ("acc/test",   self.test.accuracy),
            ("acc/diff",   self.accuracy_gap()),
        ]);
        out
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn summary(noise: Option<f64>) -> EvalSummary {
        EvalSummary {
            iteration:     42,
            learning_rate: 0.01,
            noise_norm2:   noise,
            train:         BatchStats { loss: 0.123456, accuracy: 0.8761 },
            test:          BatchStats { loss: 0.5, accuracy: 0.6149 },
        }
    }

    #[test]
    fn test_status_line_format() {
        assert_eq!(
            summary(None).status_line(),
            "Iter:42, Test [acc: 0.61, loss: 0.5000], Train [acc: 0.88, loss: 0.1235]"
        );
    }

    #[test]
    fn test_gap_matches_logged_value() {
        let s = summary(None);
        let logged = s
            .scalars()
            .into_iter()
            .find(|(tag, _)| *tag == "acc/diff")
            .map(|(_, v)| v)
            .unwrap();
        assert_eq!(logged, s.train.accuracy - s.test.accuracy);
    }

    #[test]
    fn test_noise_tag_only_for_noisy_runs() {
        let tags = |s: EvalSummary| s.scalars().into_iter().map(|(t, _)| t).collect::<Vec<_>>();
        assert!(!tags(summary(None)).contains(&"noise/norm2"));
        assert_eq!(
            tags(summary(Some(3.0))),
            ["lr", "noise/norm2", "acc/train", "loss/train", "loss/test", "acc/test", "acc/diff"]
        );
    }

    #[test]
    fn test_empty_batches_give_zero_stats() {
        assert_eq!(BatchStats::from_sums(5.0, 1.0, 0), BatchStats::default());
        let stats = BatchStats::from_sums(3.0, 1.5, 3);
        assert_eq!(stats, BatchStats { loss: 1.0, accuracy: 0.5 });
    }
}
