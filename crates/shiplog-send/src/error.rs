use thiserror::Error;

/// Classified failures of a send attempt.
///
/// Propagation policy: interactive callers display these and exit non-zero;
/// silent/hook/background callers log and swallow every variant at the
/// outermost boundary. Lock contention is never represented here — failing
/// to win a lock means skipping the optional action, not erroring.
#[derive(Debug, Error)]
pub enum SendError {
    /// Zero sessions survived the duration filter. Informational during an
    /// onboarding sync, error-class on a routine sync — the caller decides.
    #[error("no sessions to send")]
    NoSessions { onboarding: bool },

    #[error("network error: {0}")]
    Network(String),

    #[error("upload rejected: HTTP {status}")]
    Rejected { status: u16 },

    /// Disk full, permission denied, and similar local resource failures.
    #[error("resource error: {0}")]
    Resource(String),

    /// Interactive caller declined at the confirm step. No side effects
    /// have been committed.
    #[error("send cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

const ENOSPC: i32 = 28;

impl From<std::io::Error> for SendError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::PermissionDenied || err.raw_os_error() == Some(ENOSPC)
        {
            SendError::Resource(err.to_string())
        } else {
            SendError::Other(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_classifies_as_resource() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(SendError::from(io), SendError::Resource(_)));
    }

    #[test]
    fn disk_full_classifies_as_resource() {
        let io = std::io::Error::from_raw_os_error(ENOSPC);
        assert!(matches!(SendError::from(io), SendError::Resource(_)));
    }

    #[test]
    fn other_io_errors_pass_through() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert!(matches!(SendError::from(io), SendError::Other(_)));
    }
}
