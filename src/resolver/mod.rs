//! Resolution engine
//!
//! A [`Resolver`] sends each query to every configured name server at once.
//! Per server, a [`PendingQuery`] makes up to `1 + retries` attempts, each
//! with its own deadline, and follows a truncated UDP reply with one TCP
//! exchange. The first valid reply wins and the remaining work is
//! cancelled. When every server fails, [`ResolutionError`] reports what
//! happened at each of them.
//!
//! A `Resolver` is also a [`RequestHandler`](crate::server::RequestHandler),
//! so it can back any of the servers as a forwarding proxy.

pub mod config;
pub mod engine;
mod forward;
pub mod pending;

pub use config::ResolverConfig;
pub use engine::{answer_addresses, reverse_name, ResolutionError, ResolveOptions, Resolver};
pub use pending::{PendingQuery, ServerFailure};
