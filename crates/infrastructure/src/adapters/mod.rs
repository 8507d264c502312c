//! Infrastructure adapters

mod reqwest_transport;
mod session_provider;

pub use reqwest_transport::{DEFAULT_TIMEOUT, ReqwestGraphQLTransport};
pub use session_provider::{RefreshHandler, SessionIdentityProvider};
