// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use syncd_sai::{ObjectId, SaiStatus};
use thiserror::Error;

pub type SyncdResult<T> = Result<T, SyncdError>;

/// Engine errors.
///
/// Variants up to `Driver` are detected before any driver call and leave the
/// ASIC untouched; an APPLY failing with one of them is reported to the
/// producer and the process keeps running. `Driver` means the ASIC may be in
/// an inconsistent state and the process must exit.
#[derive(Error, Debug)]
pub enum SyncdError {
    #[error(transparent)]
    Model(#[from] syncd_sai::SaiError),

    #[error("no free switch index")]
    NoFreeSwitchIndex,

    #[error("{0} is not a switch object id")]
    InvalidSwitchVid(ObjectId),

    #[error("vid {0} is not tracked in the reference map")]
    UntrackedVid(ObjectId),

    #[error("vid {0} is already tracked in the reference map")]
    DuplicateVid(ObjectId),

    #[error("vid {0} reference count dropped below zero")]
    NegativeRefCount(ObjectId),

    #[error("unable to translate vid {0}")]
    UnresolvedVid(ObjectId),

    #[error("unable to translate rid {0}")]
    UnresolvedRid(ObjectId),

    #[error("entry {0} matched a current object that was already processed")]
    DuplicateNonOidMatch(String),

    #[error("object {0} not found in view")]
    ObjectNotFound(String),

    #[error("cannot remove {key}: reference count is {count}")]
    RemoveWhileReferenced { key: String, count: i64 },

    #[error("removing the switch mid-apply is not supported")]
    SwitchRemoval,

    #[error("no default value available for {0}")]
    NoDefaultAvailable(&'static str),

    #[error("switch sanity check failed: {0}")]
    SwitchMismatch(String),

    #[error("port {0} was not matched before reconciliation")]
    UnmatchedPort(ObjectId),

    #[error("{0} objects were left unprocessed after reconciliation")]
    UnprocessedObjects(usize),

    #[error("view size mismatch after reconciliation: current {current}, temporary {temporary}")]
    ViewSizeMismatch { current: usize, temporary: usize },

    #[error("inventory mismatch: {0}")]
    InventoryMismatch(String),

    #[error("corrupted view: {0}")]
    CorruptedView(String),

    #[error("driver returned {status} for {operation}; ASIC state is inconsistent")]
    Driver {
        operation: String,
        status: SaiStatus,
    },

    #[error("warm restart is not supported")]
    WarmRestartUnsupported,

    #[error("operation {0} is not supported on this channel")]
    UnknownOperation(String),
}

impl SyncdError {
    /// True when the failure happened while mutating the ASIC; the in-memory
    /// maps no longer match the hardware and the process must not continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncdError::Driver { .. })
    }
}
