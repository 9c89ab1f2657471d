use thiserror::Error;

/// Everything that can go wrong between the console and its backend.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// The request never produced an HTTP response (offline, DNS, refused connection).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status. `body` is kept verbatim.
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid backend url '{0}'")]
    InvalidUrl(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to serialize configuration: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// A trigger fired while the same operation is still in flight.
    #[error("{0} is already in progress")]
    Busy(String),

    /// Local input the backend would reject anyway, caught before sending.
    #[error("{0}")]
    Validation(String),

    #[error("unknown route '{0}'")]
    UnknownRoute(String),
}

impl ConsoleError {
    /// Text shown to the operator when this error ends up in a notification.
    ///
    /// Backend bodies are pretty-printed when they are JSON so validation
    /// failures stay readable; anything else is passed through untouched.
    pub fn notification_message(&self) -> String {
        match self {
            ConsoleError::Status { body, .. } => pretty_body(body),
            ConsoleError::Transport(e) => format!("Connection error: {}", e),
            other => other.to_string(),
        }
    }
}

/// Pretty-prints a response body if it parses as JSON, otherwise returns it as is.
pub fn pretty_body(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| body.to_string()),
        Err(_) => body.to_string(),
    }
}
