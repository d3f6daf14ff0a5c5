use thiserror::Error;

/// Errors raised while building a framed packet
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Payload too large: {len} bytes exceeds the maximum of {max}")]
    PayloadTooLarge { len: usize, max: usize },
}

/// Errors raised while reading a command payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Buffer too short: need {need} bytes at offset {offset}, have {have}")]
    Truncated {
        offset: usize,
        need: usize,
        have: usize,
    },

    #[error("Missing string terminator after offset {offset}")]
    MissingTerminator { offset: usize },
}

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("Codec error: {0}")]
    CodecError(String),

    #[error("Unknown command id: {0:#04x}")]
    UnknownCommand(u8),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
