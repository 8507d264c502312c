//! Authlink Infrastructure - Adapters and implementations
//!
//! This crate provides concrete implementations of the ports
//! defined in the application layer, and the binder that wires them into a
//! ready GraphQL client.

pub mod adapters;
pub mod binder;
pub mod persistence;
pub mod websocket;

pub use adapters::{ReqwestGraphQLTransport, SessionIdentityProvider};
pub use binder::{BindOptions, TransportBinder};
pub use persistence::{FileTokenStorage, MemoryTokenStorage};
pub use websocket::{SubscriptionClient, SubscriptionStream};
