use crate::link::{LinkInput, LinkState, Role};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid peer id `{0}`")]
    InvalidPeerId(String),

    #[error("malformed signal message: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Why a [`LinkState`] refused an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("link is already {0}")]
    Terminal(LinkState),

    #[error("{input:?} is not valid for a {role} link in state {state}")]
    Illegal {
        role: Role,
        state: LinkState,
        input: LinkInput,
    },
}
