// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Switch abstraction model layer: identifiers, object types, typed
//! attribute values with their textual wire format, attribute metadata and
//! the driver trait.

mod api;
mod attr;
mod entry;
pub mod metadata;
mod object_id;
mod object_type;

pub use api::{SaiApi, SaiResult, SaiStatus};
pub use attr::{
    AclAction, AclField, AttrValue, Attribute, IpPrefix, MacAddress, NotificationKind,
    PointerValue, QosMapEntry,
};
pub use entry::{FdbBridgeType, FdbEntry, NeighborEntry, ObjectKey, RouteEntry};
pub use metadata::{AttrFlags, AttrMetadata, AttrValueType, DefaultKind};
pub use object_id::ObjectId;
pub use object_type::ObjectType;

use thiserror::Error;

/// Errors produced by the model layer itself (parsing and id decoding).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SaiError {
    #[error("failed to deserialize: {0}")]
    Deserialize(String),

    #[error("object id {0} does not decode to a known object type")]
    UnknownObjectType(ObjectId),

    #[error("unknown attribute {1} on {0}")]
    UnknownAttribute(ObjectType, String),
}

impl Attribute {
    /// Parse an attribute from its wire form, resolving metadata by name.
    pub fn parse(
        object_type: ObjectType,
        name: &str,
        value: &str,
    ) -> Result<Attribute, SaiError> {
        let meta = metadata::get(object_type, name)
            .ok_or_else(|| SaiError::UnknownAttribute(object_type, name.to_string()))?;
        Ok(Attribute::new(meta, AttrValue::parse(meta.value_type, value)?))
    }
}
