//! # Types
//!
//! Outcomes and errors of a single synchronization.

use thiserror::Error;

use crate::cluster::{CacheError, ClusterError};
use crate::controller::key::{KeyError, ObjectKey};

/// What a successful sync did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// The Service no longer exists; its Ingress is left to garbage collection
    PrimaryGone,
    /// An Ingress was created for an annotated Service
    Created,
    /// The Ingress of a no longer annotated Service was deleted
    Deleted,
    /// The Ingress to delete was already gone
    AlreadyDeleted,
    /// Desired and observed state already agree
    NoOp,
}

impl SyncAction {
    /// Get human-readable string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::PrimaryGone => "primary-gone",
            SyncAction::Created => "created",
            SyncAction::Deleted => "deleted",
            SyncAction::AlreadyDeleted => "already-deleted",
            SyncAction::NoOp => "no-op",
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("invalid key: {0}")]
    InvalidKey(#[from] KeyError),
    #[error("cache read failed for {key}: {source}")]
    CacheRead {
        key: ObjectKey,
        #[source]
        source: CacheError,
    },
    #[error("failed to create Ingress {name} in namespace {namespace}: {source}")]
    Create {
        namespace: String,
        name: String,
        #[source]
        source: ClusterError,
    },
    #[error("failed to delete Ingress {name} in namespace {namespace}: {source}")]
    Delete {
        namespace: String,
        name: String,
        #[source]
        source: ClusterError,
    },
    #[error("Service {key} has no uid and cannot own an Ingress")]
    OwnerReference { key: ObjectKey },
}

impl ReconcilerError {
    /// Operation that failed, for logs and metrics
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            ReconcilerError::InvalidKey(_) => "parse-key",
            ReconcilerError::CacheRead { .. } => "cache-read",
            ReconcilerError::Create { .. } | ReconcilerError::OwnerReference { .. } => "create",
            ReconcilerError::Delete { .. } => "delete",
        }
    }
}
