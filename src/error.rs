use std::io;
use thiserror::Error;

/// Result type alias using [`LogmapError`].
pub type Result<T> = std::result::Result<T, LogmapError>;

/// Errors raised by the generator, the analyses and the exporters.
#[derive(Error, Debug)]
pub enum LogmapError {
    /// A count or size argument cannot produce a meaningful result (zero generations, zero lag...).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The parameter file is inconsistent.
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TSV export error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unable to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl LogmapError {
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        LogmapError::InvalidArgument(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LogmapError::invalid("gens must be >= 1");
        assert_eq!(err.to_string(), "Invalid argument: gens must be >= 1");

        let err = LogmapError::Config("r_start > r_stop".to_string());
        assert_eq!(err.to_string(), "Invalid configuration: r_start > r_stop");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err: LogmapError = io_err.into();
        assert!(matches!(err, LogmapError::Io(_)));
        assert!(err.to_string().contains("missing"));
    }
}
