// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, FromRepr};

/// Object types known to the engine.
///
/// Discriminants are stable because they are embedded in the virtual id bit
/// layout and persisted; never renumber an existing variant.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    FromRepr,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
pub enum ObjectType {
    #[strum(serialize = "SAI_OBJECT_TYPE_NULL")]
    Null = 0,
    #[strum(serialize = "SAI_OBJECT_TYPE_PORT")]
    Port = 1,
    #[strum(serialize = "SAI_OBJECT_TYPE_LAG")]
    Lag = 2,
    #[strum(serialize = "SAI_OBJECT_TYPE_VIRTUAL_ROUTER")]
    VirtualRouter = 3,
    #[strum(serialize = "SAI_OBJECT_TYPE_NEXT_HOP")]
    NextHop = 4,
    #[strum(serialize = "SAI_OBJECT_TYPE_NEXT_HOP_GROUP")]
    NextHopGroup = 5,
    #[strum(serialize = "SAI_OBJECT_TYPE_NEXT_HOP_GROUP_MEMBER")]
    NextHopGroupMember = 6,
    #[strum(serialize = "SAI_OBJECT_TYPE_ROUTER_INTERFACE")]
    RouterInterface = 7,
    #[strum(serialize = "SAI_OBJECT_TYPE_ACL_TABLE")]
    AclTable = 8,
    #[strum(serialize = "SAI_OBJECT_TYPE_ACL_ENTRY")]
    AclEntry = 9,
    #[strum(serialize = "SAI_OBJECT_TYPE_HOSTIF")]
    Hostif = 10,
    #[strum(serialize = "SAI_OBJECT_TYPE_HOSTIF_TRAP_GROUP")]
    HostifTrapGroup = 11,
    #[strum(serialize = "SAI_OBJECT_TYPE_HOSTIF_TRAP")]
    HostifTrap = 12,
    #[strum(serialize = "SAI_OBJECT_TYPE_VLAN")]
    Vlan = 13,
    #[strum(serialize = "SAI_OBJECT_TYPE_VLAN_MEMBER")]
    VlanMember = 14,
    #[strum(serialize = "SAI_OBJECT_TYPE_BRIDGE")]
    Bridge = 15,
    #[strum(serialize = "SAI_OBJECT_TYPE_BRIDGE_PORT")]
    BridgePort = 16,
    #[strum(serialize = "SAI_OBJECT_TYPE_STP")]
    Stp = 17,
    #[strum(serialize = "SAI_OBJECT_TYPE_STP_PORT")]
    StpPort = 18,
    #[strum(serialize = "SAI_OBJECT_TYPE_QUEUE")]
    Queue = 19,
    #[strum(serialize = "SAI_OBJECT_TYPE_SCHEDULER_GROUP")]
    SchedulerGroup = 20,
    #[strum(serialize = "SAI_OBJECT_TYPE_SCHEDULER")]
    Scheduler = 21,
    #[strum(serialize = "SAI_OBJECT_TYPE_INGRESS_PRIORITY_GROUP")]
    IngressPriorityGroup = 22,
    #[strum(serialize = "SAI_OBJECT_TYPE_BUFFER_POOL")]
    BufferPool = 23,
    #[strum(serialize = "SAI_OBJECT_TYPE_BUFFER_PROFILE")]
    BufferProfile = 24,
    #[strum(serialize = "SAI_OBJECT_TYPE_QOS_MAP")]
    QosMap = 25,
    #[strum(serialize = "SAI_OBJECT_TYPE_POLICER")]
    Policer = 26,
    #[strum(serialize = "SAI_OBJECT_TYPE_HASH")]
    Hash = 27,
    #[strum(serialize = "SAI_OBJECT_TYPE_SWITCH")]
    Switch = 28,
    #[strum(serialize = "SAI_OBJECT_TYPE_FDB_ENTRY")]
    FdbEntry = 29,
    #[strum(serialize = "SAI_OBJECT_TYPE_NEIGHBOR_ENTRY")]
    NeighborEntry = 30,
    #[strum(serialize = "SAI_OBJECT_TYPE_ROUTE_ENTRY")]
    RouteEntry = 31,
}

impl ObjectType {
    /// Non object id types are identified by a composite struct key instead
    /// of a virtual id.
    pub fn is_non_object_id(&self) -> bool {
        matches!(
            self,
            ObjectType::FdbEntry | ObjectType::NeighborEntry | ObjectType::RouteEntry
        )
    }

    pub fn is_object_id(&self) -> bool {
        !self.is_non_object_id() && *self != ObjectType::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn serialized_names_round_trip() {
        for ot in ObjectType::iter() {
            let name = ot.to_string();
            assert!(name.starts_with("SAI_OBJECT_TYPE_"), "{name}");
            assert_eq!(ObjectType::from_str(&name).unwrap(), ot);
        }
    }

    #[test]
    fn discriminants_fit_in_vid_type_field() {
        for ot in ObjectType::iter() {
            assert!((ot as u8) < u8::MAX);
            assert_eq!(ObjectType::from_repr(ot as u8), Some(ot));
        }
    }

    #[test]
    fn entry_types_are_non_object_id() {
        assert!(ObjectType::RouteEntry.is_non_object_id());
        assert!(ObjectType::NeighborEntry.is_non_object_id());
        assert!(ObjectType::FdbEntry.is_non_object_id());
        assert!(ObjectType::Port.is_object_id());
        assert!(!ObjectType::Null.is_object_id());
    }
}
