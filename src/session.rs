//! One chat session: the conversation log plus the lifecycle of the single
//! question that may be in flight against it.
//!
//! All mutation of the log goes through the session's lock. The in-flight
//! marker and the animator that belongs to it are stored together, so there is
//! exactly one owner of the animation and it cannot outlive its request.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, info, warn};

use crate::api::{AskBackend, AskRequest};
use crate::conversation::{Conversation, MessageId, TurnBody};
use crate::error::ApiError;
use crate::history::{self, HistoryPolicy};
use crate::progress::{AnimationSettings, ProgressAnimator};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionOptions {
    pub policy: HistoryPolicy,
    /// `None` disables the thinking indicator.
    pub animation: Option<AnimationSettings>,
}

/// Why a submission was refused without touching the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Blank,
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Rejected(Rejection),
    Answered(MessageId),
    Failed(MessageId),
    /// The session was torn down before the answer could be recorded.
    Abandoned,
}

#[derive(Debug)]
struct InFlight {
    ticket: u64,
    animator: Option<ProgressAnimator>,
}

#[derive(Debug, Default)]
struct SessionState {
    conversation: Conversation,
    in_flight: Option<InFlight>,
    next_ticket: u64,
    closed: bool,
}

impl SessionState {
    fn is_current(&self, ticket: u64) -> bool {
        self.in_flight.as_ref().map(|f| f.ticket) == Some(ticket)
    }
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
pub struct ChatSession {
    backend: Arc<dyn AskBackend>,
    options: Arc<SessionOptions>,
    state: Arc<Mutex<SessionState>>,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn AskBackend>, options: SessionOptions) -> Self {
        Self {
            backend,
            options: Arc::new(options),
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        lock(&self.state)
    }

    /// A cheap copy of the log for rendering.
    pub fn snapshot(&self) -> Conversation {
        self.lock().conversation.clone()
    }

    pub fn is_in_flight(&self) -> bool {
        self.lock().in_flight.is_some()
    }

    pub fn toggle_details(&self, id: MessageId) -> bool {
        self.lock().conversation.toggle_details(id)
    }

    /// Accept a question: record the user turn and mark the session busy.
    ///
    /// History is projected before the new turn is appended. The returned
    /// request must be `run` to settle; dropping it instead releases the
    /// session without recording an answer.
    pub fn begin(&self, question: &str) -> Result<PendingRequest, Rejection> {
        let question = question.trim();
        if question.is_empty() {
            debug!("ignoring blank question");
            return Err(Rejection::Blank);
        }

        let mut state = self.lock();
        if state.in_flight.is_some() || state.closed {
            debug!("ignoring question while another is in flight");
            return Err(Rejection::Busy);
        }

        let history = history::project(&state.conversation, self.options.policy);
        state.next_ticket += 1;
        let ticket = state.next_ticket;
        state.in_flight = Some(InFlight {
            ticket,
            animator: None,
        });
        state.conversation.append(TurnBody::user(question));

        Ok(PendingRequest {
            session: self.clone(),
            ticket,
            request: AskRequest {
                question: question.to_string(),
                history,
            },
            settled: false,
        })
    }

    /// `begin` followed by `run`.
    pub async fn submit(&self, question: &str) -> Outcome {
        match self.begin(question) {
            Ok(pending) => pending.run().await,
            Err(rejection) => Outcome::Rejected(rejection),
        }
    }

    /// Tear the session down: stop any animation and refuse further
    /// questions. An outstanding request settles into nothing.
    pub fn shutdown(&self) {
        let mut state = self.lock();
        state.closed = true;
        if let Some(in_flight) = state.in_flight.take() {
            if let Some(animator) = in_flight.animator {
                animator.cancel();
            }
        }
        state.conversation.remove_transient();
    }

    /// Finish the submission identified by `ticket`: drop the indicator,
    /// append `body` if given, and clear the in-flight marker.
    fn settle(&self, ticket: u64, body: Option<TurnBody>) -> Option<MessageId> {
        let mut state = self.lock();
        if !state.is_current(ticket) {
            return None;
        }
        let in_flight = state.in_flight.take();
        if let Some(animator) = in_flight.and_then(|f| f.animator) {
            animator.cancel();
        }
        state.conversation.remove_transient();
        body.map(|body| state.conversation.append(body))
    }
}

/// A question that has been accepted and is waiting to be sent.
pub struct PendingRequest {
    session: ChatSession,
    ticket: u64,
    request: AskRequest,
    settled: bool,
}

impl PendingRequest {
    pub fn request(&self) -> &AskRequest {
        &self.request
    }

    /// Send the question and record its answer or failure.
    ///
    /// Never fails: every error becomes an error turn in the log.
    pub async fn run(mut self) -> Outcome {
        self.start_animator();

        let result = self.session.backend.ask(&self.request).await;
        let body = match result {
            Ok(response) => TurnBody::Answer(response.into_answer()),
            Err(e) => {
                match &e {
                    ApiError::Rejected { status, .. } => warn!(status, "question rejected: {}", e),
                    _ => warn!("question failed: {}", e),
                }
                TurnBody::error(format!("Error: {e}"))
            }
        };
        let answered = matches!(body, TurnBody::Answer(_));

        let animator = {
            let mut state = self.session.lock();
            if state.is_current(self.ticket) {
                state.in_flight.as_mut().and_then(|f| f.animator.take())
            } else {
                None
            }
        };
        if let Some(animator) = animator {
            animator.stop().await;
        }

        self.settled = true;
        match self.session.settle(self.ticket, Some(body)) {
            Some(id) if answered => {
                info!("question answered");
                Outcome::Answered(id)
            }
            Some(id) => Outcome::Failed(id),
            None => Outcome::Abandoned,
        }
    }

    fn start_animator(&self) {
        let Some(settings) = self.session.options.animation.clone() else {
            return;
        };

        let weak: Weak<Mutex<SessionState>> = Arc::downgrade(&self.session.state);
        let ticket = self.ticket;
        let animator = ProgressAnimator::spawn(settings, move |frame| {
            let Some(state) = weak.upgrade() else {
                return ControlFlow::Break(());
            };
            let mut state = lock(&state);
            if !state.is_current(ticket) {
                return ControlFlow::Break(());
            }
            state.conversation.show_thinking(frame);
            ControlFlow::Continue(())
        });

        let mut state = self.session.lock();
        match state.in_flight.as_mut() {
            Some(in_flight) if in_flight.ticket == ticket => in_flight.animator = Some(animator),
            _ => animator.cancel(),
        }
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        if !self.settled {
            debug!("pending question dropped before settling");
            self.session.settle(self.ticket, None);
        }
    }
}
