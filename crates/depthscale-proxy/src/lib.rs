//! depthscale-proxy: the cache proxy.
//!
//! Accepts `{params: {type, key?, value?}}` invocations, validates them
//! into a [`Command`], and runs the command against the shared cache over a
//! connection scoped to the invocation. Every successful `get` publishes
//! the value read as a queue-depth sample on the metric channel.
//!
//! Responses mirror the invocation contract: `{statusCode, body}` where the
//! body holds either `message` (200) or `error` (401, 502, 503).

pub mod error;
pub mod proxy;
pub mod request;
pub mod response;

pub use error::ProxyError;
pub use proxy::{CacheProxy, ProxySettings, numeric_value};
pub use request::{Command, InvokeRequest, RawParams};
pub use response::{ProxyResponse, ResponseBody};
