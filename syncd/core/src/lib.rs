// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Control-plane bridge between a switch configuration producer and the
//! vendor switch abstraction driver.
//!
//! Producers operate on virtual object ids persisted in a key/value store;
//! this crate translates those operations into real ids bound to hardware
//! and executes them against the driver. The heart of the crate is the view
//! comparison engine: the reconciler computes a minimal ordered operation
//! sequence turning the programmed view into the desired one, and the
//! executor replays it.

mod allocator;
mod context;
mod error;
mod executor;
mod hard_reinit;
mod matcher;
mod parameters;
mod reconciler;
mod recorder;
mod service;
mod store;
mod switch;
mod translator;
mod view;

pub use allocator::{VidAllocator, MAX_SWITCHES};
pub use context::Context;
pub use error::{SyncdError, SyncdResult};
pub use executor::{hoisted_operations, persist_applied_view, Executor};
pub use hard_reinit::HardReiniter;
pub use parameters::Parameters;
pub use reconciler::{Reconciler, RecreateReason, TransitionOutcome};
pub use recorder::{RecordTag, Recorder};
pub use service::{
    parse_request_key, NotificationDispatcher, NotificationDispatcherHandle, NotificationEvent,
    RequestOp, RequestResponse, ShutdownRequest, Syncd, NOTIFY_APPLY_VIEW, NOTIFY_INIT_VIEW,
};
pub use store::{
    clear_table, object_key, read_object_map, split_object_key, MemStore, StateStore,
    ASIC_STATE_TABLE, HIDDEN, LANES, RIDTOVID, TEMP_PREFIX, VIDTORID, VID_COUNTER,
};
pub use switch::SaiSwitch;
pub use translator::RidVidTranslator;
pub use view::{AsicOp, AsicOpKind, AsicView, ObjIdx, ObjectStatus, ViewObject};

#[cfg(test)]
pub(crate) mod test_utils;

#[cfg(test)]
#[path = "tests/apply_view_tests.rs"]
mod apply_view_tests;

#[cfg(test)]
#[path = "tests/hard_reinit_tests.rs"]
mod hard_reinit_tests;

#[cfg(test)]
#[path = "tests/service_tests.rs"]
mod service_tests;
