/// Load driver error types and classification helpers
use thiserror::Error;

/// Main error type for load driver operations
#[derive(Debug)]
pub enum LoadError {
    /// Missing or invalid configuration, correctable by the user
    Config { option: String, reason: String },
    /// A component was used outside of its lifecycle (e.g. `next()` before `start()`)
    IllegalState(String),
    /// A mandatory collaborator was not supplied to a constructor
    MissingDependency(&'static str),
    /// An argument violated a method contract
    InvalidArgument(String),
    /// A service call failed outside of the worker loop
    Service(ServiceError),
    /// I/O failure (output file, configuration file)
    Io(std::io::Error),
    /// Wrapped anyhow error for compatibility
    Other(anyhow::Error),
}

impl LoadError {
    pub fn config(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            option: option.into(),
            reason: reason.into(),
        }
    }

    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config { option, reason } => {
                write!(f, "Configuration error in '{}': {}", option, reason)
            }
            Self::IllegalState(message) => write!(f, "Illegal state: {}", message),
            Self::MissingDependency(name) => {
                write!(f, "Missing required dependency: {}", name)
            }
            Self::InvalidArgument(message) => write!(f, "Invalid argument: {}", message),
            Self::Service(e) => write!(f, "Service error: {}", e),
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Other(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Service(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for LoadError {
    fn from(err: anyhow::Error) -> Self {
        LoadError::Other(err)
    }
}

impl From<ServiceError> for LoadError {
    fn from(err: ServiceError) -> Self {
        LoadError::Service(err)
    }
}

impl From<std::io::Error> for LoadError {
    fn from(err: std::io::Error) -> Self {
        LoadError::Io(err)
    }
}

impl From<csv::Error> for LoadError {
    fn from(err: csv::Error) -> Self {
        LoadError::Other(err.into())
    }
}

/// Helper to determine whether the user can fix the error by changing the configuration
pub fn is_user_error(err: &LoadError) -> bool {
    match err {
        LoadError::Config { .. } => true,
        LoadError::IllegalState(_) => false,
        LoadError::MissingDependency(_) => false,
        LoadError::InvalidArgument(_) => false,
        LoadError::Service(_) => false,
        LoadError::Io(_) => true,
        LoadError::Other(_) => false,
    }
}

/// Process exit code for an error that aborted the run
pub fn exit_code(err: &LoadError) -> i32 {
    if is_user_error(err) {
        2
    } else {
        1
    }
}

/// Failure reported by a service while performing one operation
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("connection pool exhausted: {0}")]
    PoolExhausted(String),

    #[error("operation not supported by this service: {0}")]
    Unsupported(String),

    #[error("not started: {0}")]
    NotStarted(String),

    #[error("{message}")]
    Backend { message: String },
}

impl ServiceError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}
