use crate::error::TransitionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which end of a link a state machine runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Broadcaster,
    Viewer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Broadcaster => "broadcaster-side",
            Self::Viewer => "viewer-side",
        })
    }
}

/// Lifecycle of one broadcaster/viewer relationship.
///
/// ```text
/// idle -> joining -> offer-sent     -> answer-applied -> connecting -> connected
///                 \-> offer-received -> answer-sent   -/              |     ^
///                                                                     v     |
///                                                              disconnected-/
/// any non-terminal state -> failed | closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkState {
    Idle,
    Joining,
    OfferSent,
    OfferReceived,
    AnswerSent,
    AnswerApplied,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Events that drive a [`LinkState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkInput {
    /// Join published (viewer) or received (broadcaster).
    Join,
    OfferSent,
    OfferReceived,
    AnswerSent,
    AnswerApplied,
    TransportConnecting,
    /// Inbound media observed (viewer) or transport ready (broadcaster).
    MediaReady,
    TransportDisconnected,
    TransportFailed,
    Close,
}

impl LinkState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }

    /// True once media has flowed at least once, even if the path is
    /// currently interrupted.
    pub fn is_established(self) -> bool {
        matches!(self, Self::Connected | Self::Disconnected)
    }

    /// Computes the state reached by applying `input`.
    ///
    /// Terminal states swallow everything with [`TransitionError::Terminal`];
    /// callers treat both error kinds as "ignore this message".
    pub fn next(self, role: Role, input: LinkInput) -> Result<LinkState, TransitionError> {
        use LinkInput as I;
        use LinkState as S;

        if self.is_terminal() {
            return Err(TransitionError::Terminal(self));
        }

        let next = match (self, input) {
            (_, I::TransportFailed) => S::Failed,
            (_, I::Close) => S::Closed,

            (S::Idle, I::Join) => S::Joining,

            (S::Joining, I::OfferSent) if role == Role::Broadcaster => S::OfferSent,
            (S::Joining, I::OfferReceived) if role == Role::Viewer => S::OfferReceived,

            (S::OfferSent, I::AnswerApplied) if role == Role::Broadcaster => S::AnswerApplied,
            (S::OfferReceived, I::AnswerSent) if role == Role::Viewer => S::AnswerSent,

            (S::AnswerSent | S::AnswerApplied | S::Connecting, I::TransportConnecting) => {
                S::Connecting
            }

            (
                S::AnswerSent | S::AnswerApplied | S::Connecting | S::Connected | S::Disconnected,
                I::MediaReady,
            ) => S::Connected,

            (S::Connecting | S::Connected | S::Disconnected, I::TransportDisconnected) => {
                S::Disconnected
            }

            (state, input) => {
                return Err(TransitionError::Illegal { role, state, input });
            }
        };

        Ok(next)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Joining => "joining",
            Self::OfferSent => "offer-sent",
            Self::OfferReceived => "offer-received",
            Self::AnswerSent => "answer-sent",
            Self::AnswerApplied => "answer-applied",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
            Self::Closed => "closed",
        })
    }
}
