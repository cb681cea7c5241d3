//! Conversational follow-up flow against the agent service.
//!
//! Owns per-session state (thread identity, context versioning) and drives
//! the run lifecycle: ensure agent -> ensure thread -> refresh context if
//! stale -> post question -> run -> poll -> extract answer.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use roilens_core::config::AgentSettings;

use crate::poller::RunPoller;
use crate::providers::{AgentApi, RunStatus};
use crate::retry::{RetryError, RetryPolicy, is_rate_limited};
use crate::session_store::{ConversationSession, SessionStore};

/// Instructions given to the shared persistent agent.
pub const AGENT_INSTRUCTIONS: &str = "You are a change management specialist helping leaders \
interpret an ROI analysis for their project. Answer follow-up questions using the project \
context provided earlier in the conversation. Keep answers concise and grounded in the \
provided figures; never recommend reducing headcount as a cost-saving measure.";

/// User-facing answer when a run fails because of provider rate limiting.
const RATE_LIMIT_ANSWER: &str = "The service is handling a high volume of requests right now. \
Please ask your question again in a moment.";

/// User-facing answer when a run exceeds the polling deadline.
const TIMEOUT_ANSWER: &str =
    "This is taking longer than expected. Please try asking your question again.";

/// Errors surfaced by the conversational flow
#[derive(Debug, thiserror::Error)]
pub enum ChatFlowError {
    #[error("Agent call failed: {0}")]
    Agent(#[from] RetryError),

    #[error("Run failed: {0}")]
    RunFailed(String),

    #[error("No assistant answer found in thread")]
    NoAnswer,
}

/// One conversational question.
#[derive(Debug, Clone, Default)]
pub struct AskParams {
    pub question: String,
    /// Context summary to inject when the session's context is stale.
    pub context: Option<String>,
    pub session_id: Option<String>,
    /// Opaque token the caller bumps when the ROI context changes.
    pub context_version: Option<String>,
    /// Forces a context refresh regardless of version bookkeeping.
    pub is_new_session: bool,
}

/// Answer returned to the caller, echoing the (possibly generated) session id.
#[derive(Debug, Clone)]
pub struct Answer {
    pub answer: String,
    pub session_id: String,
}

/// Drives the conversational run lifecycle for all sessions.
pub struct ConversationManager {
    agent: Arc<dyn AgentApi>,
    settings: AgentSettings,
    retry: RetryPolicy,
    poller: RunPoller,
    sessions: SessionStore,
    /// Shared persistent agent id, created lazily. A run-start failure that
    /// indicates the id is gone clears it so the next request recreates the
    /// agent.
    agent_id: Mutex<Option<String>>,
    /// Serializes thread creation: a session gets exactly one thread even
    /// when its first requests arrive concurrently.
    thread_init: Mutex<()>,
}

impl ConversationManager {
    pub fn new(
        agent: Arc<dyn AgentApi>,
        settings: AgentSettings,
        retry: RetryPolicy,
        session_ttl: Duration,
    ) -> Self {
        let poller = RunPoller::new(
            retry.clone(),
            Duration::from_secs(settings.max_wait_seconds),
        );
        Self {
            agent,
            settings,
            retry,
            poller,
            sessions: SessionStore::new(session_ttl),
            agent_id: Mutex::new(None),
            thread_init: Mutex::new(()),
        }
    }

    /// Answer one question within a session, creating the session's thread
    /// and refreshing its context as needed.
    pub async fn ask(&self, params: AskParams) -> Result<Answer, ChatFlowError> {
        let session_id = params
            .session_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let agent_id = self.ensure_agent().await?;
        let mut session = self.ensure_session(&session_id).await?;

        if needs_context_refresh(
            &session,
            params.context_version.as_deref(),
            params.is_new_session,
        ) && let Some(context) = params.context.as_deref()
        {
            match self
                .inject_context(&session.thread_id, &agent_id, context)
                .await
            {
                Ok(()) => {
                    session.has_received_context = true;
                    session.context_version = params.context_version.clone();
                    self.sessions
                        .insert(session_id.clone(), session.clone())
                        .await;
                    info!("[session:{}] Context refreshed", session_id);
                }
                // Stale context is better than no answer.
                Err(e) => warn!(
                    "[session:{}] Context injection failed, continuing: {}",
                    session_id, e
                ),
            }
        }

        self.retry
            .execute(|| {
                self.agent
                    .create_message(&session.thread_id, "user", &params.question)
            })
            .await?;

        let run = match self
            .retry
            .execute(|| self.agent.create_run(&session.thread_id, &agent_id, None))
            .await
        {
            Ok(run) => run,
            Err(e) => {
                if indicates_stale_agent(&e) {
                    // The stored id is gone on the provider side; recreate
                    // the agent on the next request. Transient failures keep
                    // the slot so healthy agents are not duplicated.
                    self.agent_id.lock().await.take();
                }
                return Err(e.into());
            }
        };

        let (run_info, status) = self
            .poller
            .await_completion(self.agent.as_ref(), &session.thread_id, &run.id)
            .await;

        match status {
            RunStatus::Completed => {
                let answer = self.latest_assistant_text(&session.thread_id).await?;
                Ok(Answer { answer, session_id })
            }
            RunStatus::Failed => {
                let message = run_info
                    .and_then(|run| run.last_error)
                    .map(|error| error.message)
                    .unwrap_or_else(|| "unknown error".to_string());
                if is_rate_limited(&message) {
                    info!(
                        "[session:{}] Run rate limited, asking the user to retry",
                        session_id
                    );
                    Ok(Answer {
                        answer: RATE_LIMIT_ANSWER.to_string(),
                        session_id,
                    })
                } else {
                    Err(ChatFlowError::RunFailed(message))
                }
            }
            RunStatus::Cancelled => Err(ChatFlowError::RunFailed("run was cancelled".to_string())),
            RunStatus::Timeout => {
                warn!(
                    "[session:{}] Run {} status=timeout after {}s",
                    session_id, run.id, self.settings.max_wait_seconds
                );
                Ok(Answer {
                    answer: TIMEOUT_ANSWER.to_string(),
                    session_id,
                })
            }
            RunStatus::Queued | RunStatus::InProgress => Err(ChatFlowError::RunFailed(format!(
                "run ended in non-terminal status {}",
                status
            ))),
        }
    }

    /// Get the shared agent id, creating the agent on first use.
    ///
    /// The lock is held across creation so concurrent first requests do not
    /// create duplicate agents.
    async fn ensure_agent(&self) -> Result<String, ChatFlowError> {
        let mut slot = self.agent_id.lock().await;
        if let Some(id) = slot.as_ref() {
            return Ok(id.clone());
        }

        let agent = self
            .retry
            .execute(|| {
                self.agent.create_agent(
                    &self.settings.name,
                    AGENT_INSTRUCTIONS,
                    &self.settings.model,
                )
            })
            .await?;
        info!("Created persistent agent {}", agent.id);
        *slot = Some(agent.id.clone());
        Ok(agent.id)
    }

    /// Get the session for `session_id`, creating its thread on first use.
    ///
    /// Creation is double-checked under `thread_init`: concurrent first
    /// requests for one session must reuse the winner's thread instead of
    /// each creating their own.
    async fn ensure_session(&self, session_id: &str) -> Result<ConversationSession, ChatFlowError> {
        if let Some(session) = self.sessions.get(session_id).await {
            return Ok(session);
        }

        let _guard = self.thread_init.lock().await;
        if let Some(session) = self.sessions.get(session_id).await {
            return Ok(session);
        }

        let thread = self.retry.execute(|| self.agent.create_thread()).await?;
        info!("[session:{}] Created thread {}", session_id, thread.id);
        let session = ConversationSession::new(thread.id);
        self.sessions
            .insert(session_id.to_string(), session.clone())
            .await;
        Ok(session)
    }

    /// Post a context summary into the thread and run it to completion.
    async fn inject_context(
        &self,
        thread_id: &str,
        agent_id: &str,
        context: &str,
    ) -> Result<(), ChatFlowError> {
        let message = format!(
            "Project context update ({}):\n{}\n\nUse this context when answering subsequent \
             questions. Reply with a brief acknowledgement.",
            Utc::now().format("%Y-%m-%d"),
            context
        );

        self.retry
            .execute(|| self.agent.create_message(thread_id, "user", &message))
            .await?;
        let run = self
            .retry
            .execute(|| self.agent.create_run(thread_id, agent_id, None))
            .await?;

        let (_, status) = self
            .poller
            .await_completion(self.agent.as_ref(), thread_id, &run.id)
            .await;
        if status != RunStatus::Completed {
            return Err(ChatFlowError::RunFailed(format!(
                "context injection run ended with status {}",
                status
            )));
        }
        Ok(())
    }

    /// Text of the newest assistant message in the thread.
    async fn latest_assistant_text(&self, thread_id: &str) -> Result<String, ChatFlowError> {
        let messages = self
            .retry
            .execute(|| self.agent.list_messages(thread_id))
            .await?;

        messages
            .iter()
            .find(|message| message.role == "assistant")
            .map(|message| message.content.extract_text())
            .ok_or(ChatFlowError::NoAnswer)
    }
}

/// Whether a session's context must be (re-)injected.
///
/// True when the caller forces a new session, when the thread has never
/// received context, or when the supplied context version differs from the
/// recorded one.
pub fn needs_context_refresh(
    session: &ConversationSession,
    context_version: Option<&str>,
    is_new_session: bool,
) -> bool {
    if is_new_session || !session.has_received_context {
        return true;
    }
    session.context_version.as_deref() != context_version
}

/// Whether a run-start failure means the stored agent id no longer exists on
/// the provider side, as opposed to a transient failure.
fn indicates_stale_agent(error: &RetryError) -> bool {
    let text = error.to_string().to_lowercase();
    text.contains("404") || text.contains("not found") || text.contains("no assistant")
}
