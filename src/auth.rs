//! Credentials, validated identifiers, redacted secrets, bearer headers, and the cached token
//! state.

pub mod credentials;
pub mod header;
pub mod id;
pub mod secret;
pub mod state;

pub use credentials::*;
pub use header::*;
pub use id::*;
pub use secret::*;
pub use state::*;
