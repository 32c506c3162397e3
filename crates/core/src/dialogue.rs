//! Rebuttal dialogue between the student and the professor.
//!
//! The machine gates input so that at most one rebuttal is in flight: a turn
//! submitted while `Sending` is rejected outright, which is what gives the
//! transcript its total order.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Professor,
    User,
}

/// One turn in the transcript. Audio is present only on professor turns, and
/// even there only when voice synthesis succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub text: String,
    pub audio: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialogueState {
    /// No request in flight, input enabled.
    #[default]
    Idle,
    /// A rebuttal was submitted and its reply is pending; input disabled.
    Sending,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("rebuttal text is empty")]
    EmptyText,
    #[error("a rebuttal is already awaiting its reply")]
    InFlight,
}

/// Append-only transcript plus the in-flight gate. Messages are never edited
/// or removed once appended; a new session replaces the whole machine.
#[derive(Debug, Default)]
pub struct Dialogue {
    state: DialogueState,
    messages: Vec<Message>,
}

impl Dialogue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DialogueState {
        self.state
    }

    pub fn is_sending(&self) -> bool {
        self.state() == DialogueState::Sending
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Role/text snapshot of the turns so far, used as the history payload of
    /// a counter-critique request. Taken before `submit` so the optimistic
    /// user turn is not part of its own history.
    pub fn history(&self) -> Vec<(Role, String)> {
        self.messages
            .iter()
            .map(|m| (m.role, m.text.clone()))
            .collect()
    }

    /// Seeds the transcript with the professor's opening turn (the overall
    /// critique). Only meaningful on a fresh machine.
    pub fn seed_professor(&mut self, text: String, audio: Option<String>) {
        self.messages.push(Message {
            role: Role::Professor,
            text,
            audio,
        });
    }

    /// `Idle --submit--> Sending`. The user turn is appended optimistically,
    /// before the network call resolves; a later `fail` leaves it in the
    /// transcript without a paired reply, which is deliberate.
    pub fn submit(&mut self, text: &str) -> Result<(), SubmitError> {
        if text.trim().is_empty() {
            return Err(SubmitError::EmptyText);
        }
        if self.is_sending() {
            return Err(SubmitError::InFlight);
        }
        self.messages.push(Message {
            role: Role::User,
            text: text.to_string(),
            audio: None,
        });
        self.state = DialogueState::Sending;
        Ok(())
    }

    /// `Sending --resolved--> Idle`, appending the professor's reply.
    pub fn resolve(&mut self, text: String, audio: Option<String>) {
        if !self.is_sending() {
            tracing::warn!("Dialogue resolve while idle, dropping reply");
            return;
        }
        self.messages.push(Message {
            role: Role::Professor,
            text,
            audio,
        });
        self.state = DialogueState::Idle;
    }

    /// `Sending --failed--> Idle`. No message appended; the caller raises the
    /// user-visible notice.
    pub fn fail(&mut self) {
        self.state = DialogueState::Idle;
    }
}
