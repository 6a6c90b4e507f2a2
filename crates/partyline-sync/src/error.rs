use partyline_protocol::{EntityKind, NetId};

use crate::Authority;

/// Errors from the replication layer.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Net id 0 is never assigned to anything.
    #[error("net id 0 is reserved")]
    ReservedId,

    /// An entity with this id is already registered.
    #[error("{0} is already registered")]
    DuplicateEntity(NetId),

    /// No entity with this id is registered.
    #[error("{0} is not registered")]
    UnknownEntity(NetId),

    /// Client-owned and shared entities must name an owning peer.
    #[error("{0} entities require an owning peer")]
    OwnerRequired(Authority),

    /// The id range for this entity class has been used up.
    #[error("{0:?} id range exhausted")]
    RangeExhausted(EntityKind),
}
