//! Invocation payload and its validation into a [`Command`].

use serde::Deserialize;
use serde_json::Value;

use depthscale_core::CacheEntry;
use depthscale_core::config::SetFieldCheck;

use crate::error::ProxyError;

/// Raw invocation payload.
///
/// Fields are kept as loose JSON so that a wrongly typed field is reported
/// through the proxy's own errors rather than a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvokeRequest {
    #[serde(default)]
    pub params: Option<RawParams>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawParams {
    #[serde(default, rename = "type")]
    pub kind: Option<Value>,
    #[serde(default)]
    pub key: Option<Value>,
    #[serde(default)]
    pub value: Option<Value>,
}

/// A validated cache operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set(CacheEntry),
    Get { key: String },
}

impl InvokeRequest {
    /// Read a request from an arbitrary JSON event.
    ///
    /// An event whose `params` is not an object is treated as having no
    /// `params` at all.
    pub fn from_event(event: &Value) -> Self {
        serde_json::from_value(event.clone()).unwrap_or_default()
    }

    /// Validate into a command. Never touches the cache.
    pub fn into_command(self, set_fields: SetFieldCheck) -> Result<Command, ProxyError> {
        let params = self.params.ok_or(ProxyError::MissingParams)?;

        match params.kind.as_ref().and_then(Value::as_str) {
            Some("set") => {
                let key = field_text(params.key.as_ref());
                let value = field_text(params.value.as_ref());
                let rejected = match set_fields {
                    SetFieldCheck::Both => key.is_none() && value.is_none(),
                    SetFieldCheck::Either => key.is_none() || value.is_none(),
                };
                if rejected {
                    return Err(ProxyError::MissingKeyOrValue);
                }
                Ok(Command::Set(CacheEntry {
                    key: key.unwrap_or_default(),
                    value: value.unwrap_or_default(),
                }))
            }
            Some("get") => {
                let key = field_text(params.key.as_ref()).ok_or(ProxyError::MissingKey)?;
                Ok(Command::Get { key })
            }
            _ => Err(ProxyError::UnsupportedType(type_text(params.kind.as_ref()))),
        }
    }
}

/// Text of a `key`/`value` field.
///
/// Falsy JSON counts as absent: missing, `null`, `false`, `0` and `""`.
fn field_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null | Value::Bool(false) => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// How an offending `type` is named in the error message.
fn type_text(kind: Option<&Value>) -> String {
    match kind {
        None => "undefined".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
