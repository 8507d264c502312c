//! Authentication domain types

mod types;

pub use types::{
    AUTHORIZATION_HEADER, AuthHeader, AuthenticationState, Credential, DEFAULT_PUBLIC_ROLE,
    PublicRole, ROLE_HEADER, token_preview,
};
