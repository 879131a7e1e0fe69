//! Read-only object store seam
//!
//! The [`ObjectStore`] trait is what the blob provider needs from a remote
//! store: fetch an object by key together with its content fingerprint
//! (ETag), and produce a time-limited presigned GET URL that carries
//! response header overrides.
//!
//! [`MemoryObjectStore`] is an in-process implementation for tests and
//! local wiring.

pub mod error;
pub mod memory;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::MemoryObjectStore;
pub use store::{ObjectBody, ObjectStore, RemoteObject, ResponseOverrides};
