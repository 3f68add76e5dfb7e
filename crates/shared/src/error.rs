use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Unauthenticated,
    Forbidden,
    BadUserInput,
    GraphqlValidationFailed,
    InternalServerError,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorExtensions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

/// One entry of a GraphQL `errors` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphqlError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<serde_json::Value>,
    #[serde(default)]
    pub extensions: ErrorExtensions,
}

impl GraphqlError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: Vec::new(),
            extensions: ErrorExtensions::default(),
        }
    }

    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.extensions.code = Some(code);
        self
    }
}

#[derive(Debug, Error)]
#[error("{code:?}: {message}")]
pub struct SearchException {
    pub code: ErrorCode,
    pub message: String,
}

impl SearchException {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<GraphqlError> for SearchException {
    fn from(value: GraphqlError) -> Self {
        Self {
            code: value.extensions.code.unwrap_or(ErrorCode::Unknown),
            message: value.message,
        }
    }
}
