//! # chaos-repo
//!
//! Datastore adapters for db-chaos.
//!
//! Both adapters speak the Postgres wire protocol and share one
//! [`AccountStore`] for schema management, id sampling and transfers. They
//! differ only in what "ready" means:
//! - [`PostgresRepo`] - ready once the server has left recovery
//! - [`CockroachRepo`] - ready once no range is under-replicated

#![warn(missing_docs)]
#![warn(clippy::all)]

mod cockroach;
mod error;
mod postgres;
mod store;

pub use cockroach::{CockroachRepo, DEFAULT_MIN_REPLICAS};
pub use error::{is_serialization_failure, map_error};
pub use postgres::PostgresRepo;
pub use store::{AccountStore, StoreConfig};
