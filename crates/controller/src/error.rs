use std::time::Duration;

use itg_remote_protocol::ProtocolError;
use thiserror::Error;

use crate::link::LinkState;

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Timed out after {timeout:?} waiting for response {response_id:#04x}")]
    Timeout { response_id: u8, timeout: Duration },

    /// The agent answered on the generic error id
    #[error("Agent reported {reason}{}", fmt_detail(.command, .detail))]
    Remote {
        reason: String,
        command: Option<u8>,
        detail: Option<String>,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Link did not reach {expected:?} within {timeout:?}")]
    LinkTimeout { expected: LinkState, timeout: Duration },

    #[error("Controller channel closed")]
    ChannelClosed,
}

fn fmt_detail(command: &Option<u8>, detail: &Option<String>) -> String {
    let mut out = String::new();
    if let Some(command) = command {
        out.push_str(&format!(" for command {:#04x}", command));
    }
    if let Some(detail) = detail {
        out.push_str(&format!(": {}", detail));
    }
    out
}

impl ControllerError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ControllerError::Timeout { .. })
    }

    pub fn is_link_timeout(&self) -> bool {
        matches!(self, ControllerError::LinkTimeout { .. })
    }

    /// Reason string of a remote failure
    pub fn remote_reason(&self) -> Option<&str> {
        match self {
            ControllerError::Remote { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ControllerError>;
