//! Auth-domain identifiers, roles, scopes, claims, secrets, and digests.

pub mod claims;
pub mod hash;
pub mod id;
pub mod role;
pub mod scope;
pub mod secret;

pub use claims::*;
pub use hash::*;
pub use id::*;
pub use role::*;
pub use scope::*;
pub use secret::*;
