//! Relational backend for the crosslock distributed mutex.
//!
//! Stores leases as rows in a PostgreSQL table and resolves every ownership
//! question with a single atomic statement, so any set of processes that can
//! reach the same database coordinates correctly. Abandoned leases heal via
//! the `expires_at` deadline: the next acquirer takes over the row once the
//! previous TTL has passed.

pub mod backend;
pub mod sql;

pub use backend::RelationalBackend;
pub use sql::validate_table_name;
