//! Transport-level options carried in an operation's context.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Header map as sent on the wire.
pub type Headers = BTreeMap<String, String>;

/// Options applied to the HTTP request that carries an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOptions {
    /// Request headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Headers>,
    /// Any other option, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl FetchOptions {
    /// Options with only the given headers.
    #[must_use]
    pub fn with_headers(headers: Headers) -> Self {
        Self {
            headers: Some(headers),
            extra: serde_json::Map::new(),
        }
    }

    /// Looks up a header ignoring ASCII case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.as_ref().and_then(|headers| {
            headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        })
    }

    /// Returns true if a header with this name is set, ignoring ASCII case.
    #[must_use]
    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }
}

/// Fetch options as supplied by the caller: either a value or a function
/// producing one on demand.
#[derive(Clone)]
pub enum FetchOptionsSource {
    /// A plain options value.
    Static(Arc<FetchOptions>),
    /// Evaluated each time the options are needed.
    Deferred(Arc<dyn Fn() -> FetchOptions + Send + Sync>),
}

impl FetchOptionsSource {
    /// Wraps a plain value.
    #[must_use]
    pub fn value(options: FetchOptions) -> Self {
        Self::Static(Arc::new(options))
    }

    /// Wraps a producer function.
    #[must_use]
    pub fn deferred(producer: impl Fn() -> FetchOptions + Send + Sync + 'static) -> Self {
        Self::Deferred(Arc::new(producer))
    }

    /// Normalizes either form into a value.
    #[must_use]
    pub fn resolve(&self) -> FetchOptions {
        match self {
            Self::Static(options) => options.as_ref().clone(),
            Self::Deferred(producer) => producer(),
        }
    }
}

impl fmt::Debug for FetchOptionsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(options) => f.debug_tuple("Static").field(options).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl From<FetchOptions> for FetchOptionsSource {
    fn from(options: FetchOptions) -> Self {
        Self::value(options)
    }
}
