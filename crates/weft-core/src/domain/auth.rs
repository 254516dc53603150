//! Authenticated request identity
//!
//! The transport collaborator resolves the session/credential into an
//! [`AuthenticatedUser`] and passes it to every core operation explicitly.
//! The core never reads ambient or thread-local request state; an operation
//! invoked without an identity fails at the transport with
//! [`crate::Error::Unauthenticated`] before reaching this layer.

use serde::{Deserialize, Serialize};

/// The identity all graph operations are scoped to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// User node id (`urn:weft:user:{uuid}`)
    pub id: String,
    pub email: String,
    pub name: String,
}

impl AuthenticatedUser {
    pub fn new(id: impl Into<String>, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            name: name.into(),
        }
    }
}
