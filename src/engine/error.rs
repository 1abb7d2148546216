use thiserror::Error;

/// Failures the Manager reports to its caller. Each one has already been
/// rendered on the card by the time it is returned.
#[derive(Debug, Clone, Error)]
pub enum ManagerError {
    /// Connect failure or mid-stream socket error.
    #[error("transport error on {card_id}: {reason}")]
    Transport { card_id: String, reason: String },

    /// Unparseable message body. The connection stays up.
    #[error("malformed message on {card_id}: {reason}")]
    Protocol { card_id: String, reason: String },

    /// The backend set `error` on an update. Terminal for that analysis.
    #[error("analysis {card_id} failed: {reason}")]
    Application { card_id: String, reason: String },

    #[error("no connection matches {0}")]
    UnknownCard(String),

    #[error("card is missing exchange or currency pair: {0}")]
    InvalidCard(String),
}

impl ManagerError {
    pub fn transport(card_id: &str, err: impl std::fmt::Display) -> Self {
        ManagerError::Transport {
            card_id: card_id.to_string(),
            reason: format!("{err:#}"),
        }
    }

    /// Text shown on the card.
    pub fn user_message(&self) -> String {
        match self {
            ManagerError::Transport { .. } => "Connection to the analysis server failed".to_string(),
            ManagerError::Protocol { .. } => "Received an unreadable update".to_string(),
            ManagerError::Application { reason, .. } => reason.clone(),
            ManagerError::UnknownCard(_) => "Analysis is not running".to_string(),
            ManagerError::InvalidCard(_) => "Select an exchange and currency pair".to_string(),
        }
    }
}
