// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Non object id entry keys.
//!
//! Routes, neighbors and FDB entries are identified by a composite struct
//! that embeds object ids instead of having one of their own. Their wire
//! form is JSON with a fixed field order.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use strum_macros::{Display as StrumDisplay, EnumString};

use crate::attr::{IpPrefix, MacAddress};
use crate::object_id::ObjectId;
use crate::object_type::ObjectType;
use crate::SaiError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteEntry {
    pub dest: IpPrefix,
    pub switch_id: ObjectId,
    pub vr: ObjectId,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NeighborEntry {
    pub ip: IpAddr,
    pub rif: ObjectId,
    pub switch_id: ObjectId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, StrumDisplay, EnumString)]
pub enum FdbBridgeType {
    #[strum(serialize = "SAI_FDB_ENTRY_BRIDGE_TYPE_1Q")]
    #[serde(rename = "SAI_FDB_ENTRY_BRIDGE_TYPE_1Q")]
    Dot1q,
    #[strum(serialize = "SAI_FDB_ENTRY_BRIDGE_TYPE_1D")]
    #[serde(rename = "SAI_FDB_ENTRY_BRIDGE_TYPE_1D")]
    Dot1d,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FdbEntry {
    pub mac: MacAddress,
    pub bridge_type: FdbBridgeType,
    pub bridge_id: ObjectId,
    pub switch_id: ObjectId,
}

/// Identity of an object in a view: either a virtual id or an entry struct.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKey {
    Oid(ObjectId),
    Route(RouteEntry),
    Neighbor(NeighborEntry),
    Fdb(FdbEntry),
}

impl ObjectKey {
    /// Serialized identity, exactly as stored in the database tables.
    pub fn serialize(&self) -> String {
        match self {
            ObjectKey::Oid(oid) => oid.to_string(),
            // Entry keys can always be encoded, field types are plain data.
            ObjectKey::Route(e) => serde_json::to_string(e).expect("route entry encodes"),
            ObjectKey::Neighbor(e) => serde_json::to_string(e).expect("neighbor entry encodes"),
            ObjectKey::Fdb(e) => serde_json::to_string(e).expect("fdb entry encodes"),
        }
    }

    pub fn parse(object_type: ObjectType, s: &str) -> Result<ObjectKey, SaiError> {
        let json_err = |e: serde_json::Error| SaiError::Deserialize(format!("{object_type}: {e}"));
        Ok(match object_type {
            ObjectType::RouteEntry => ObjectKey::Route(serde_json::from_str(s).map_err(json_err)?),
            ObjectType::NeighborEntry => {
                ObjectKey::Neighbor(serde_json::from_str(s).map_err(json_err)?)
            }
            ObjectType::FdbEntry => ObjectKey::Fdb(serde_json::from_str(s).map_err(json_err)?),
            _ => ObjectKey::Oid(s.parse()?),
        })
    }

    /// The object's own virtual id, when it has one.
    pub fn oid(&self) -> Option<ObjectId> {
        match self {
            ObjectKey::Oid(oid) => Some(*oid),
            _ => None,
        }
    }

    pub fn is_oid(&self) -> bool {
        matches!(self, ObjectKey::Oid(_))
    }

    /// Object ids embedded in the struct members of an entry key. An OID key
    /// contributes nothing; its id is the object itself, not a reference.
    pub fn member_oids(&self) -> Vec<ObjectId> {
        match self {
            ObjectKey::Oid(_) => Vec::new(),
            ObjectKey::Route(e) => vec![e.switch_id, e.vr],
            ObjectKey::Neighbor(e) => vec![e.rif, e.switch_id],
            ObjectKey::Fdb(e) => vec![e.bridge_id, e.switch_id],
        }
    }

    /// Rewrite embedded struct member ids through `f`. Fails on the first
    /// member `f` rejects, which matchers use to signal an unresolvable id.
    pub fn try_map_member_oids<E>(
        &self,
        f: &mut dyn FnMut(ObjectId) -> Result<ObjectId, E>,
    ) -> Result<ObjectKey, E> {
        Ok(match self {
            ObjectKey::Oid(oid) => ObjectKey::Oid(*oid),
            ObjectKey::Route(e) => ObjectKey::Route(RouteEntry {
                dest: e.dest,
                switch_id: f(e.switch_id)?,
                vr: f(e.vr)?,
            }),
            ObjectKey::Neighbor(e) => ObjectKey::Neighbor(NeighborEntry {
                ip: e.ip,
                rif: f(e.rif)?,
                switch_id: f(e.switch_id)?,
            }),
            ObjectKey::Fdb(e) => ObjectKey::Fdb(FdbEntry {
                mac: e.mac,
                bridge_type: e.bridge_type,
                bridge_id: f(e.bridge_id)?,
                switch_id: f(e.switch_id)?,
            }),
        })
    }

    /// Whether a route entry key is the default route of its address family.
    pub fn is_default_route(&self) -> bool {
        matches!(self, ObjectKey::Route(e) if e.dest.is_default_route())
    }
}
