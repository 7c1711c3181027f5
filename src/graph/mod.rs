//! Shared-object storage for the serialization pass.
//!
//! Objects that can be reached from more than one place (pointer targets,
//! shared sub-structures, cycles) live in an [`ObjectArena`] and are addressed
//! by [`ObjectId`]. The [`WriteLedger`] records which of them one write pass
//! has already emitted.

/// Defines the `ObjectArena`.
pub mod core;
/// Defines the `ObjectId` type.
pub mod id;
/// Defines the `WriteLedger` dedup set.
pub mod ledger;

pub use self::core::ObjectArena;
pub use id::ObjectId;
pub use ledger::{Visit, WriteLedger};
