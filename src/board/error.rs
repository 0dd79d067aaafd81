use crate::source::SourceError;

#[derive(Debug)]
pub enum ScheduleError {
    InvalidView(&'static str),
    LimitExceeded(&'static str),
    /// A collaborator read or write failed. Surfaced verbatim, never retried.
    Source(SourceError),
}

impl std::fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleError::InvalidView(msg) => write!(f, "invalid view: {msg}"),
            ScheduleError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            ScheduleError::Source(e) => write!(f, "source error: {e}"),
        }
    }
}

impl std::error::Error for ScheduleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScheduleError::Source(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SourceError> for ScheduleError {
    fn from(e: SourceError) -> Self {
        ScheduleError::Source(e)
    }
}
