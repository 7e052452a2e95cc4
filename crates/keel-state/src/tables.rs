//! redb table definitions for the Keel state store.
//!
//! Each table uses `&str` keys (the client-supplied guid) and `&[u8]` values
//! (JSON-serialized `Versioned` envelopes).

use redb::TableDefinition;

/// Desired LRPs keyed by `{process_guid}`.
pub const DESIRED_LRPS: TableDefinition<&str, &[u8]> = TableDefinition::new("desired_lrps");

/// Tasks keyed by `{task_guid}`.
pub const TASKS: TableDefinition<&str, &[u8]> = TableDefinition::new("tasks");
