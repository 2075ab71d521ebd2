// Error handling for the ISHNE reader

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IshneError>;

/// Every failure the pipeline can surface. Variants fall into three
/// families: malformed input (`InvalidMagic` through `EcgBlockOutOfBounds`),
/// calls made out of order (`HeaderNotParsed`), and source/sink failures
/// (`Io`). See [`IshneError::kind`].
#[derive(Error, Debug)]
pub enum IshneError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid magic bytes: expected {expected:?}, got {got:?}")]
    InvalidMagic { expected: Vec<u8>, got: Vec<u8> },

    #[error("file too short for fixed header: need {needed} bytes, got {got}")]
    HeaderTooShort { needed: usize, got: usize },

    #[error("invalid lead count {0}: must be between 1 and 12")]
    InvalidLeadCount(u16),

    #[error("invalid sampling rate {0}: must be greater than zero")]
    InvalidSamplingRate(u16),

    #[error("ECG block offset {offset} lies beyond the {len}-byte buffer")]
    EcgBlockOutOfBounds { offset: usize, len: usize },

    #[error("no header parsed yet: call parse_header first")]
    HeaderNotParsed,
}

/// Coarse error family, for callers that route on the class of failure
/// (the HTTP layer maps these to status codes) without matching every
/// variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; fatal to the call, never worth retrying.
    Format,
    /// Operation invoked before the header it depends on was parsed.
    State,
    /// The byte source or the export sink failed.
    Io,
}

impl IshneError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IshneError::Io(_) => ErrorKind::Io,
            IshneError::HeaderNotParsed => ErrorKind::State,
            IshneError::InvalidMagic { .. }
            | IshneError::HeaderTooShort { .. }
            | IshneError::InvalidLeadCount(_)
            | IshneError::InvalidSamplingRate(_)
            | IshneError::EcgBlockOutOfBounds { .. } => ErrorKind::Format,
        }
    }
}
