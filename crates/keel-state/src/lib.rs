//! keel-state - desired-state persistence for Keel.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for desired LRPs and tasks, plus the [`SpecGateway`] capability
//! trait the API layer is written against.
//!
//! # Architecture
//!
//! Every record is a JSON-serialized [`Versioned`] envelope in a redb
//! `&[u8]` value column, keyed by its client-supplied guid. The version
//! counter backs compare-and-set updates; create is create-if-absent.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod action;
pub mod error;
pub mod gateway;
pub mod store;
pub mod tables;
pub mod types;

pub use action::{ActionDecodeError, ExecutorAction};
pub use error::{StateError, StateResult};
pub use gateway::{GatewayFuture, SpecGateway};
pub use store::StateStore;
pub use types::*;
