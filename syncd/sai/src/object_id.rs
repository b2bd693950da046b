// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::object_type::ObjectType;
use crate::SaiError;

/// Opaque 64-bit object identifier.
///
/// The same representation is used for virtual ids (producer space) and real
/// ids (driver space); the executor boundary is where one space is exchanged
/// for the other. Virtual ids carry a fixed bit layout:
///
/// ```text
/// bits 63..56 - switch index
/// bits 55..48 - object type
/// bits 47..0  - sequence number
/// ```
///
/// Real ids are fully opaque and never decoded, except for the object type
/// field which vendors are required to preserve.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u64);

const SWITCH_INDEX_SHIFT: u64 = 56;
const OBJECT_TYPE_SHIFT: u64 = 48;
const SEQUENCE_MASK: u64 = (1 << OBJECT_TYPE_SHIFT) - 1;

impl ObjectId {
    /// The null id, representing absence of an object.
    pub const NULL: ObjectId = ObjectId(0);

    pub const fn from_raw(raw: u64) -> Self {
        ObjectId(raw)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Construct a virtual id from its fields. The sequence number is
    /// truncated to 48 bits.
    pub fn encode(object_type: ObjectType, switch_index: u8, sequence: u64) -> Self {
        ObjectId(
            ((switch_index as u64) << SWITCH_INDEX_SHIFT)
                | ((object_type as u64) << OBJECT_TYPE_SHIFT)
                | (sequence & SEQUENCE_MASK),
        )
    }

    /// Object type recovered from the id bit layout, without any map lookup.
    /// Returns `None` for the null id and for unknown type values.
    pub fn object_type(&self) -> Option<ObjectType> {
        if self.is_null() {
            return None;
        }

        match ObjectType::from_repr(((self.0 >> OBJECT_TYPE_SHIFT) & 0xFF) as u8) {
            Some(ObjectType::Null) | None => None,
            Some(ot) => Some(ot),
        }
    }

    pub fn switch_index(&self) -> u8 {
        ((self.0 >> SWITCH_INDEX_SHIFT) & 0xFF) as u8
    }

    pub fn sequence(&self) -> u64 {
        self.0 & SEQUENCE_MASK
    }

    /// The virtual id of the switch owning this id. Switch ids are
    /// deterministic, so the owning switch id is reconstructible from the
    /// switch index field alone.
    pub fn switch_id(&self) -> Result<ObjectId, SaiError> {
        if self.is_null() {
            return Ok(ObjectId::NULL);
        }

        match self.object_type() {
            None => Err(SaiError::UnknownObjectType(*self)),
            Some(ObjectType::Switch) => Ok(*self),
            Some(_) => {
                let index = self.switch_index();
                Ok(ObjectId::encode(ObjectType::Switch, index, index as u64))
            }
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "oid:0x{:016x}", self.0)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl FromStr for ObjectId {
    type Err = SaiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .strip_prefix("oid:0x")
            .ok_or_else(|| SaiError::Deserialize(format!("invalid object id: {s}")))?;
        let raw = u64::from_str_radix(hex, 16)
            .map_err(|_| SaiError::Deserialize(format!("invalid object id: {s}")))?;
        Ok(ObjectId(raw))
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
