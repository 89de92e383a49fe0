//! Error types for the debate engine

use thiserror::Error;

/// Result type alias for debate engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the debate engine
#[derive(Debug, Error)]
pub enum Error {
    /// Non-success reply from an LLM endpoint
    #[error("Provider error: {0}")]
    Provider(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Reply did not match any shape the normalizer understands
    #[error("Unexpected response shape: {0}")]
    UnexpectedResponse(String),

    /// Both the primary and the fallback endpoint failed
    #[error("Completion failed (primary: {primary}; fallback: {fallback})")]
    CompletionFailed { primary: String, fallback: String },

    /// Agent error
    #[error("Agent error: {0}")]
    Agent(String),

    /// Tool execution error
    #[error("Tool execution error: {tool}: {message}")]
    ToolExecution { tool: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// State manager error
    #[error("State error: {0}")]
    State(String),

    /// Debate not found
    #[error("Debate not found: {0}")]
    DebateNotFound(String),

    /// Mutation attempted before `begin_round`
    #[error("No active round for debate {0}")]
    NoActiveRound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON Schema validation error
    #[error("JSON Schema validation error: {0}")]
    JsonSchema(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a provider error
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create an unexpected-response error
    pub fn unexpected_response(msg: impl Into<String>) -> Self {
        Self::UnexpectedResponse(msg.into())
    }

    /// Create an agent error
    pub fn agent(msg: impl Into<String>) -> Self {
        Self::Agent(msg.into())
    }

    /// Create a tool execution error
    pub fn tool_execution(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a state error
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// Create an other error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(format!("Failed to parse config: {}", err))
    }
}
