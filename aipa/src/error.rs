use thiserror::Error;

/// Errors raised by the remote clients, the LLM layer and the conversation.
#[derive(Error, Debug)]
pub enum Error {
    /// A required credential or setting is missing. Raised at construction.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Rejected before any network I/O (unknown news category, unsupported model, ...)
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The request could not be sent or the body could not be read.
    #[error("{service} transport error: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// The provider answered with a non-2xx status.
    #[error("{service} API error {status}: {body}")]
    Status {
        service: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("{0} request timed out")]
    Timeout(&'static str),
    /// The provider payload could not be decoded into the expected shape.
    #[error("{service} parse error: {message}")]
    Parse {
        service: &'static str,
        message: String,
    },
}

impl Error {
    pub fn parse(service: &'static str, message: impl Into<String>) -> Self {
        Error::Parse {
            service,
            message: message.into(),
        }
    }

    /// True for failures of the remote call itself (as opposed to caller mistakes).
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Error::Transport { .. } | Error::Status { .. } | Error::Timeout(_) | Error::Parse { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Read a required credential from the environment.
///
/// Empty values count as missing.
pub fn require_env(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(Error::Configuration(format!(
            "{} environment variable is required",
            var
        ))),
    }
}

/// Validate a credential handed in directly.
pub fn require_key(service: &'static str, key: impl Into<String>) -> Result<String> {
    let key = key.into();
    if key.trim().is_empty() {
        return Err(Error::Configuration(format!("{} API key is empty", service)));
    }
    Ok(key)
}
