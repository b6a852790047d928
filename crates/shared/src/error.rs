use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Validation,
    Busy,
    RequestFailed,
    StreamReadFailed,
}

/// Failures a submission can end with. None of them is fatal to the session: the form is
/// always left unlocked and resubmittable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExcuseError {
    #[error("input needs at least {min} characters, got {actual}")]
    Validation { min: usize, actual: usize },
    #[error("a generation request is already in flight")]
    Busy,
    #[error("generation request failed: {status}")]
    RequestFailed { status: String },
    #[error("generation stream interrupted: {reason}")]
    StreamReadFailed { reason: String },
}

impl ExcuseError {
    pub fn request_failed(status: impl Into<String>) -> Self {
        Self::RequestFailed {
            status: status.into(),
        }
    }

    pub fn stream_read_failed(reason: impl Into<String>) -> Self {
        Self::StreamReadFailed {
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } => ErrorCode::Validation,
            Self::Busy => ErrorCode::Busy,
            Self::RequestFailed { .. } => ErrorCode::RequestFailed,
            Self::StreamReadFailed { .. } => ErrorCode::StreamReadFailed,
        }
    }
}
