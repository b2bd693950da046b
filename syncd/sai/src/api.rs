// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Driver-facing interface.
//!
//! The vendor driver is an external collaborator; the engine only sees this
//! trait. All ids crossing it are real ids, translation happens before the
//! call.

use strum_macros::{Display, EnumString};

use crate::attr::Attribute;
use crate::entry::ObjectKey;
use crate::object_id::ObjectId;
use crate::object_type::ObjectType;

/// Driver status codes observed by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString)]
pub enum SaiStatus {
    #[strum(serialize = "SAI_STATUS_SUCCESS")]
    Success,
    #[strum(serialize = "SAI_STATUS_FAILURE")]
    Failure,
    #[strum(serialize = "SAI_STATUS_NOT_SUPPORTED")]
    NotSupported,
    #[strum(serialize = "SAI_STATUS_NOT_IMPLEMENTED")]
    NotImplemented,
    #[strum(serialize = "SAI_STATUS_INSUFFICIENT_RESOURCES")]
    InsufficientResources,
    #[strum(serialize = "SAI_STATUS_INVALID_PARAMETER")]
    InvalidParameter,
    #[strum(serialize = "SAI_STATUS_ITEM_NOT_FOUND")]
    ItemNotFound,
    #[strum(serialize = "SAI_STATUS_ITEM_ALREADY_EXISTS")]
    ItemAlreadyExists,
    #[strum(serialize = "SAI_STATUS_BUFFER_OVERFLOW")]
    BufferOverflow,
    /// Engine-side status reported to the producer when the response channel
    /// times out; never returned by a driver.
    #[strum(serialize = "SAI_STATUS_NO_RESPONSE")]
    NoResponse,
}

pub type SaiResult<T> = Result<T, SaiStatus>;

/// The switch abstraction interface as consumed by the engine.
///
/// Object ids passed in and returned are real ids. Entry keys must arrive
/// with their embedded ids already translated to real space.
pub trait SaiApi: Send + Sync {
    /// Create an OID object. For the switch itself pass the null id as
    /// `switch_rid`.
    fn create_object(
        &self,
        object_type: ObjectType,
        switch_rid: ObjectId,
        attrs: &[Attribute],
    ) -> SaiResult<ObjectId>;

    fn remove_object(&self, object_type: ObjectType, rid: ObjectId) -> SaiResult<()>;

    fn set_object_attribute(
        &self,
        object_type: ObjectType,
        rid: ObjectId,
        attr: &Attribute,
    ) -> SaiResult<()>;

    /// Get current values for the named attributes.
    fn get_object_attributes(
        &self,
        object_type: ObjectType,
        rid: ObjectId,
        names: &[&str],
    ) -> SaiResult<Vec<Attribute>>;

    fn create_entry(&self, key: &ObjectKey, attrs: &[Attribute]) -> SaiResult<()>;

    fn remove_entry(&self, key: &ObjectKey) -> SaiResult<()>;

    fn set_entry_attribute(&self, key: &ObjectKey, attr: &Attribute) -> SaiResult<()>;
}
