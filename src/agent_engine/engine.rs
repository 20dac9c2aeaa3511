use std::time::Duration;

use crate::agent_engine::artifacts::Workspace;
use crate::agent_engine::history::ActionLedger;
use crate::agent_engine::loop_control::LoopController;
use crate::agent_engine::prompt::build_prompt;
use crate::agent_engine::state::{AbortReason, LoopState};
use crate::executor::safety::validate_commands;
use crate::executor::Executor;
use crate::llm::provider::ModelBackend;
use crate::llm::response_parser::extract_blocks;
use crate::perception::{Resolution, ScreenSource};
use crate::platform::PlatformProfile;

/// Knobs for one run of the loop.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub max_iterations: u32,
    /// Recent actions rendered into each prompt.
    pub context_actions: usize,
    /// Pause after each executed batch before the next screenshot.
    pub settle_delay: Duration,
}

/// Screenshot → model → validate → execute → record, until the model
/// reports the goal, the iteration budget runs out, or something fatal
/// happens.
pub struct AgentEngine<B: ModelBackend> {
    backend: B,
    screen: Box<dyn ScreenSource>,
    executor: Executor,
    ledger: ActionLedger,
    workspace: Workspace,
    profile: PlatformProfile,
    loop_ctrl: LoopController,
    context_actions: usize,
    settle_delay: Duration,
    /// Iterations already recorded by earlier runs of a resumed session.
    iteration_offset: u32,
    state: LoopState,
}

impl<B: ModelBackend> AgentEngine<B> {
    pub fn new(
        profile: PlatformProfile,
        backend: B,
        screen: Box<dyn ScreenSource>,
        executor: Executor,
        ledger: ActionLedger,
        workspace: Workspace,
        settings: LoopSettings,
    ) -> Self {
        let loop_ctrl = LoopController::new(settings.max_iterations);
        let state = loop_ctrl.initial_state();
        let iteration_offset = ledger.session().iterations;
        Self {
            backend,
            screen,
            executor,
            ledger,
            workspace,
            profile,
            loop_ctrl,
            context_actions: settings.context_actions,
            settle_delay: settings.settle_delay,
            iteration_offset,
            state,
        }
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn ledger(&self) -> &ActionLedger {
        &self.ledger
    }

    /// Drives the loop to a terminal state and returns it.
    pub async fn run(&mut self) -> LoopState {
        let resolution = self.screen.resolution().await;
        tracing::info!(
            backend = self.backend.name(),
            goal = %self.ledger.session().goal,
            max_iterations = self.loop_ctrl.max_iterations(),
            %resolution,
            "starting agent"
        );

        while let LoopState::Running { iteration } = self.state {
            tracing::info!("=== Iteration {iteration} ===");
            self.state = match self.step(iteration, resolution).await {
                Ok(next) => next,
                Err(reason) => LoopState::Aborted { iteration, reason },
            };
        }

        match &self.state {
            LoopState::GoalAchieved { iteration } => {
                tracing::info!(iteration, "GOAL ACHIEVED")
            }
            LoopState::MaxIterationsReached { iterations } => tracing::warn!(
                iterations,
                "reached maximum iterations without achieving goal"
            ),
            LoopState::Aborted { iteration, reason } => {
                tracing::error!(iteration, %reason, "agent stopped")
            }
            LoopState::Running { .. } => {}
        }
        tracing::info!(path = %self.workspace.history_json().display(), "agent finished; history saved");

        self.state.clone()
    }

    async fn step(&mut self, iteration: u32, resolution: Resolution) -> Result<LoopState, AbortReason> {
        let recorded = self.iteration_offset + iteration;

        self.workspace
            .rotate_previous()
            .map_err(|e| AbortReason::Capture(e.detail()))?;
        let screenshot = self.workspace.screenshot_path();
        tracing::debug!("taking screenshot");
        self.screen
            .capture(&screenshot)
            .await
            .map_err(|e| AbortReason::Capture(e.detail()))?;

        let context = self.ledger.context(self.context_actions);
        let prompt = build_prompt(&self.profile, &self.ledger.session().goal, &context, resolution);

        tracing::info!(backend = self.backend.name(), "analyzing screen");
        let raw = self
            .backend
            .call(&prompt, &screenshot)
            .await
            .map_err(|e| AbortReason::Backend(e.detail()))?;
        self.workspace.write_response(&raw).map_err(ledger_failure)?;

        let parsed = extract_blocks(&raw);
        tracing::info!("Observation: {}...", preview(&parsed.observation, 100));
        tracing::info!("Reasoning: {}...", preview(&parsed.reasoning, 100));
        tracing::info!(commands = ?parsed.commands, "Commands ({})", parsed.commands.len());

        if parsed.signals_goal_achieved() {
            self.ledger
                .append_goal_achieved(recorded, &parsed.observation, &parsed.reasoning, &parsed.commands)
                .map_err(ledger_failure)?;
            self.ledger.mark_completed().map_err(ledger_failure)?;
            return Ok(LoopState::GoalAchieved { iteration });
        }

        if let Err(rejection) = validate_commands(&parsed.commands, &self.profile) {
            let message = rejection.to_string();
            tracing::error!(%message, "invalid command");
            match self.workspace.archive_invalid_response() {
                Ok(path) => tracing::info!(path = %path.display(), "rejected response archived"),
                Err(e) => tracing::warn!(error = %e, "could not archive rejected response"),
            }
            self.ledger
                .append_rejected(recorded, &parsed.observation, &parsed.reasoning, &parsed.commands, &message)
                .map_err(ledger_failure)?;
            return Err(AbortReason::InvalidCommand(message));
        }

        tracing::info!("Executing {} command(s)...", parsed.commands.len());
        let results = self.executor.execute(&parsed.commands).await;
        if !results.iter().all(|r| r.succeeded) {
            tracing::warn!("command sequence had failures");
        }
        self.ledger
            .append(recorded, &parsed.observation, &parsed.reasoning, &parsed.commands, results)
            .map_err(ledger_failure)?;

        tokio::time::sleep(self.settle_delay).await;

        Ok(self.loop_ctrl.after_iteration(iteration))
    }
}

fn ledger_failure(e: crate::errors::AgentKvmError) -> AbortReason {
    AbortReason::Ledger(e.detail())
}

fn preview(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
