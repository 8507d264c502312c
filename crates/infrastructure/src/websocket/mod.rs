//! Subscription transport over WebSocket.

mod client;
mod protocol;

pub use client::{SubscriptionClient, SubscriptionStream};
pub use protocol::{ClientMessage, ServerMessage};
