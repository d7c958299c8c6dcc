// ============================================================
// Layer 3 — Training State
// ============================================================
// The counters the orchestrator advances while it runs.
//
//   epoch            → next epoch to run; continues across resumes
//   global_step      → one per training batch, keys per-step logs
//   adversarial_step → one per batch trained with the auxiliary heads,
//                      drives the ramp multiplier
//
// Only `epoch` is persisted (inside the checkpoint). Both step
// counters start from zero in every process, so a resumed run
// restarts step-indexed logging at 0.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrainingState {
    pub epoch:            usize,
    pub global_step:      usize,
    pub adversarial_step: usize,
}

impl TrainingState {
    /// Fresh state for a run that continues after `completed_epoch`.
    pub fn resumed_after(completed_epoch: usize) -> Self {
        Self {
            epoch: completed_epoch + 1,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_resets_step_counters() {
        let state = TrainingState::resumed_after(5);
        assert_eq!(state.epoch, 6);
        assert_eq!(state.global_step, 0);
        assert_eq!(state.adversarial_step, 0);
    }
}
