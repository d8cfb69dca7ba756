//! Identity provider location (data) and token-error classification (behavior).
//!
//! `endpoints` describes where a Keycloak-style provider serves its OpenID Connect endpoints:
//! a base URL, a realm, and an ordered list of path layouts that the manager probes until one
//! answers. `grant` names the grants the manager issues, and `strategy` defines
//! [`ProviderStrategy`], an HTTP-client-agnostic hook that decorates token requests and maps
//! provider failures into the crate's error taxonomy.

pub mod endpoints;
pub mod grant;
pub mod strategy;

pub use endpoints::*;
pub use grant::*;
pub use strategy::*;
