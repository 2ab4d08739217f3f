//! Repository implementations.
//!
//! Currently only the in-memory `local` backend; a SQL-backed
//! implementation slots in behind the same trait.

pub mod local;

pub use local::LocalRepository;
