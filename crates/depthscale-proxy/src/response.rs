use serde::{Deserialize, Serialize};

use crate::error::ProxyError;

/// Result of one invocation: `{statusCode, body}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub status_code: u16,
    pub body: ResponseBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Message { message: String },
    Error { error: String },
}

impl ProxyResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            body: ResponseBody::Message {
                message: message.into(),
            },
        }
    }

    pub fn error(status_code: u16, error: impl Into<String>) -> Self {
        Self {
            status_code,
            body: ResponseBody::Error {
                error: error.into(),
            },
        }
    }

    pub fn message(&self) -> Option<&str> {
        match &self.body {
            ResponseBody::Message { message } => Some(message),
            ResponseBody::Error { .. } => None,
        }
    }

    pub fn error_text(&self) -> Option<&str> {
        match &self.body {
            ResponseBody::Error { error } => Some(error),
            ResponseBody::Message { .. } => None,
        }
    }
}

impl From<&ProxyError> for ProxyResponse {
    fn from(err: &ProxyError) -> Self {
        ProxyResponse::error(err.status_code(), err.to_string())
    }
}
