// ============================================================
// Layer 5 — Adversarial Ramp Schedule
// ============================================================
// Linear warm-up of the adversarial loss weight:
//
//   multiplier(step) = min(1, step / adv_grad_iter)
//
//   adv_grad_iter = 100:  0 → 0.0   50 → 0.5   100 → 1.0   250 → 1.0
//
// `step` is the orchestrator's adversarial step counter, which
// advances once per batch trained with the adversarial heads.

/// Deterministic ramp from 0 to 1 over `adv_grad_iter` adversarial steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampSchedule {
    adv_grad_iter: usize,
}

impl RampSchedule {
    /// A zero-length ramp applies the full weight from the first step.
    pub fn new(adv_grad_iter: usize) -> Self {
        Self { adv_grad_iter }
    }

    pub fn multiplier(&self, step: usize) -> f64 {
        if self.adv_grad_iter == 0 || step >= self.adv_grad_iter {
            return 1.0;
        }
        step as f64 / self.adv_grad_iter as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reference_points() {
        let ramp = RampSchedule::new(100);
        assert_eq!(ramp.multiplier(0), 0.0);
        assert_eq!(ramp.multiplier(50), 0.5);
        assert_eq!(ramp.multiplier(100), 1.0);
        assert_eq!(ramp.multiplier(250), 1.0);
    }

    #[test]
    fn test_zero_length_ramp_is_full_weight() {
        assert_eq!(RampSchedule::new(0).multiplier(0), 1.0);
    }

    proptest! {
        #[test]
        fn prop_monotone_and_bounded(len in 1usize..10_000, a in 0usize..20_000, b in 0usize..20_000) {
            let ramp = RampSchedule::new(len);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(ramp.multiplier(lo) <= ramp.multiplier(hi));
            prop_assert!((0.0..=1.0).contains(&ramp.multiplier(a)));
        }

        #[test]
        fn prop_linear_before_pinned_after(len in 1usize..10_000, step in 0usize..20_000) {
            let m = RampSchedule::new(len).multiplier(step);
            if step < len {
                prop_assert_eq!(m, step as f64 / len as f64);
            } else {
                prop_assert_eq!(m, 1.0);
            }
        }
    }
}
