// Iteration budget for one run.
use crate::agent_engine::state::LoopState;

pub struct LoopController {
    max_iterations: u32,
}

impl LoopController {
    pub fn new(max_iterations: u32) -> Self {
        Self { max_iterations }
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// A zero budget stops before the first screenshot.
    pub fn initial_state(&self) -> LoopState {
        if self.max_iterations == 0 {
            LoopState::MaxIterationsReached { iterations: 0 }
        } else {
            LoopState::initial()
        }
    }

    /// Transition after an iteration that executed its commands.
    pub fn after_iteration(&self, iteration: u32) -> LoopState {
        if iteration >= self.max_iterations {
            LoopState::MaxIterationsReached {
                iterations: iteration,
            }
        } else {
            LoopState::Running {
                iteration: iteration + 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_until_budget_is_spent() {
        let ctrl = LoopController::new(3);
        assert_eq!(ctrl.initial_state(), LoopState::Running { iteration: 1 });
        assert_eq!(ctrl.after_iteration(1), LoopState::Running { iteration: 2 });
        assert_eq!(ctrl.after_iteration(2), LoopState::Running { iteration: 3 });
        assert_eq!(
            ctrl.after_iteration(3),
            LoopState::MaxIterationsReached { iterations: 3 }
        );
    }

    #[test]
    fn zero_budget_never_runs() {
        assert!(LoopController::new(0).initial_state().is_terminal());
    }
}
