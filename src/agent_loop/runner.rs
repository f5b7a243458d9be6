//! The dispatch loop state machine.

use std::collections::VecDeque;

use crate::agent::session::Session;
use crate::error::OmniError;
use crate::provider::sanitize::{redact_for_display, redact_text};
use crate::provider::ProviderAdapter;
use crate::tools::registry::ToolRegistry;
use crate::types::{Message, ToolInvocationRequest, Turn, UserInput};
use crate::util::retry::RetryPolicy;

use super::commands::ControlCommand;
use super::types::{LoopState, RunOutcome};

/// Drives a session from one user input to a final answer.
///
/// Owns the adapter and the capability registry for its backend context. The
/// session is borrowed mutably for the whole run, so runs on one session are
/// strictly sequential.
pub struct DispatchLoop {
    adapter: Box<dyn ProviderAdapter>,
    registry: ToolRegistry,
    retry: RetryPolicy,
    show_tool_usage: bool,
}

impl DispatchLoop {
    pub fn new(adapter: Box<dyn ProviderAdapter>, registry: ToolRegistry) -> Self {
        Self {
            adapter,
            registry,
            retry: RetryPolicy::default(),
            show_tool_usage: false,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Log each invocation's (redacted) input and result.
    pub fn with_tool_usage_display(mut self, show: bool) -> Self {
        self.show_tool_usage = show;
        self
    }

    pub fn adapter(&self) -> &dyn ProviderAdapter {
        self.adapter.as_ref()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ToolRegistry {
        &mut self.registry
    }

    /// Process one user input.
    ///
    /// Control commands answer without any network call. Otherwise the input
    /// is appended and the backend is called until it gives a final answer.
    /// There is no cap on the number of tool rounds.
    pub async fn run(
        &mut self,
        session: &mut Session,
        input: UserInput,
    ) -> Result<RunOutcome, OmniError> {
        if let Some(command) = ControlCommand::parse(&input) {
            return self.handle_command(session, command).await;
        }

        let mut pending_input = Some(input);
        let mut rounds = 0u32;
        let mut state = LoopState::AwaitingSend;

        loop {
            state = match state {
                LoopState::AwaitingSend => {
                    if let Some(input) = pending_input.take() {
                        session.push(Message::from_input(&input));
                    }
                    rounds += 1;
                    LoopState::Sent(self.send(session).await?)
                }
                LoopState::Sent(mut turn) => {
                    Self::account(session, &turn);
                    match turn.error.take() {
                        Some(reason) => LoopState::Done(RunOutcome::failed(&reason, rounds)),
                        None if turn.done => LoopState::Final(turn),
                        None => LoopState::HasToolCalls(turn),
                    }
                }
                LoopState::HasToolCalls(turn) => {
                    tracing::debug!(count = turn.invocations.len(), rounds, "Tool calls requested");
                    LoopState::Executing {
                        text: Some(turn.assistant_text),
                        pending: VecDeque::from(turn.invocations),
                    }
                }
                LoopState::Executing { mut text, mut pending } => match pending.pop_front() {
                    Some(call) => {
                        self.invoke(session, text.take().unwrap_or_default(), call)
                            .await;
                        LoopState::Executing { text, pending }
                    }
                    None => LoopState::AwaitingSend,
                },
                LoopState::Final(turn) => {
                    session.push(Message::assistant(turn.assistant_text.clone()));
                    LoopState::Done(RunOutcome::completed(turn.assistant_text, rounds))
                }
                LoopState::Done(outcome) => return Ok(outcome),
            };
        }
    }

    async fn handle_command(
        &mut self,
        session: &mut Session,
        command: ControlCommand,
    ) -> Result<RunOutcome, OmniError> {
        tracing::info!(command = %command, "Control command");
        match command {
            ControlCommand::Reset => {
                session.reset();
                Ok(RunOutcome::command(command.confirmation()))
            }
            ControlCommand::Refresh => {
                let report = self.registry.refresh().await?;
                let mut response = command.confirmation().to_string();
                if !report.added.is_empty() {
                    response.push_str(&format!("\nNew tools: {}", report.added.join(", ")));
                }
                Ok(RunOutcome::command(response))
            }
            ControlCommand::Quit => Ok(RunOutcome::command(command.confirmation())),
        }
    }

    /// One retry-wrapped outbound call.
    async fn send(&self, session: &Session) -> Result<Turn, OmniError> {
        let descriptors = self.registry.descriptors();
        let adapter = self.adapter.as_ref();
        let capabilities = descriptors.as_slice();

        tracing::debug!(
            model = adapter.model(),
            family = %adapter.family(),
            messages = session.len(),
            "Sending to backend"
        );
        self.retry
            .execute(move || adapter.send(session, capabilities))
            .await
    }

    fn account(session: &mut Session, turn: &Turn) {
        let Some(usage) = turn.usage else {
            return;
        };
        session.record_usage(&usage);

        let accountant = session.accountant();
        tracing::debug!(
            used = accountant.used(),
            ceiling = accountant.ceiling(),
            percent = accountant.percent_used(),
            "Token usage"
        );
        if accountant.is_low() {
            tracing::warn!(
                remaining = accountant.remaining(),
                "Conversation is running low on tokens; consider resetting"
            );
        }
    }

    async fn invoke(&self, session: &mut Session, text: String, call: ToolInvocationRequest) {
        if self.show_tool_usage {
            let input = redact_for_display(&serde_json::Value::Object(call.arguments.clone()));
            tracing::info!(tool = %call.capability_name, input = %input, "Tool used");
        }

        let result = self.registry.execute(&call).await;

        if self.show_tool_usage {
            tracing::info!(
                tool = %result.capability_name,
                is_error = result.is_error,
                result = redact_text(&result.output),
                "Tool result"
            );
        }

        session.push(Message::assistant_tool_call(text, call));
        session.push(Message::tool_result(result));
    }
}

impl std::fmt::Debug for DispatchLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchLoop")
            .field("model", &self.adapter.model())
            .field("family", &self.adapter.family())
            .field("registry", &self.registry)
            .field("retry", &self.retry)
            .finish()
    }
}
