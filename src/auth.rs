//! Credential secrets and the access-token collaborator contract.

pub mod secret;
pub mod source;

pub use secret::*;
pub use source::*;
