//! File-based backend for the crosslock distributed mutex.
//!
//! Locks are advisory exclusive file locks in a shared directory, which
//! makes this backend a good fit for processes on one host (or hosts
//! sharing a filesystem with sane lock semantics). Leases have no TTL;
//! abandoned locks are reclaimed by the operating system when the holding
//! process exits.

pub mod backend;
pub mod path;

pub use backend::FileBackend;
pub use path::lock_file_path;
