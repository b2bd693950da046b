// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Static attribute metadata.
//!
//! Everything the engine knows about an attribute beyond its value lives
//! here: mutability flags, value type, default-value descriptor and
//! conditionality. All attribute handling in the engine dispatches on this
//! table instead of per-object-type code.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::attr::{AclField, AttrValue, MacAddress, PointerValue};
use crate::object_id::ObjectId;
use crate::object_type::ObjectType;

/// Value types understood by the serializer. ACL variants carry their inner
/// payload type flattened, since only a handful of combinations occur.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttrValueType {
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    Mac,
    Ip,
    IpPrefix,
    Chars,
    U32List,
    I32List,
    Oid,
    OidList,
    AclFieldOid,
    AclFieldOidList,
    AclFieldU32,
    AclActionOid,
    AclActionOidList,
    QosMapList,
    Pointer,
}

impl AttrValueType {
    pub fn is_oid_bearing(&self) -> bool {
        matches!(
            self,
            AttrValueType::Oid
                | AttrValueType::OidList
                | AttrValueType::AclFieldOid
                | AttrValueType::AclFieldOidList
                | AttrValueType::AclActionOid
                | AttrValueType::AclActionOidList
        )
    }

    pub fn is_list(&self) -> bool {
        matches!(
            self,
            AttrValueType::U32List
                | AttrValueType::I32List
                | AttrValueType::OidList
                | AttrValueType::QosMapList
        )
    }

    /// The zero-length list value for list types, `None` otherwise.
    pub fn empty_list_value(&self) -> Option<AttrValue> {
        match self {
            AttrValueType::U32List => Some(AttrValue::U32List(Vec::new())),
            AttrValueType::I32List => Some(AttrValue::I32List(Vec::new())),
            AttrValueType::OidList => Some(AttrValue::OidList(Vec::new())),
            AttrValueType::QosMapList => Some(AttrValue::QosMapList(Vec::new())),
            _ => None,
        }
    }
}

/// Attribute mutability flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AttrFlags {
    pub mandatory_on_create: bool,
    pub create_only: bool,
    pub create_and_set: bool,
    pub read_only: bool,
    pub key: bool,
}

const fn create_only() -> AttrFlags {
    AttrFlags {
        mandatory_on_create: false,
        create_only: true,
        create_and_set: false,
        read_only: false,
        key: false,
    }
}

const fn mandatory_create_only() -> AttrFlags {
    AttrFlags {
        mandatory_on_create: true,
        ..create_only()
    }
}

const fn key_create_only() -> AttrFlags {
    AttrFlags {
        key: true,
        ..mandatory_create_only()
    }
}

const fn create_and_set() -> AttrFlags {
    AttrFlags {
        mandatory_on_create: false,
        create_only: false,
        create_and_set: true,
        read_only: false,
        key: false,
    }
}

const fn mandatory_create_and_set() -> AttrFlags {
    AttrFlags {
        mandatory_on_create: true,
        ..create_and_set()
    }
}

const fn read_only() -> AttrFlags {
    AttrFlags {
        mandatory_on_create: false,
        create_only: false,
        create_and_set: false,
        read_only: true,
        key: false,
    }
}

/// Default-value descriptor attached to attribute metadata.
#[derive(Clone, Debug, PartialEq)]
pub enum DefaultKind {
    /// No default; an attribute with this kind cannot be brought to default.
    None,
    /// Metadata-provided literal.
    Const(AttrValue),
    /// Zero-length list.
    EmptyList,
    /// Value of another object's attribute; in practice always a switch
    /// attribute (e.g. a trap's group defaults to the switch default group).
    AttrValue(ObjectType, &'static str),
    /// Assigned by the switch internally at create time; recoverable only
    /// from the discovery snapshot.
    SwitchInternal,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AttrMetadata {
    pub object_type: ObjectType,
    pub name: &'static str,
    pub value_type: AttrValueType,
    pub flags: AttrFlags,
    pub default: DefaultKind,
    pub is_conditional: bool,
}

// Canonical switch attribute names referenced from other metadata entries
// and from engine code.
pub const SWITCH_INIT_SWITCH: &str = "SAI_SWITCH_ATTR_INIT_SWITCH";
pub const SWITCH_HARDWARE_INFO: &str = "SAI_SWITCH_ATTR_SWITCH_HARDWARE_INFO";
pub const SWITCH_SRC_MAC_ADDRESS: &str = "SAI_SWITCH_ATTR_SRC_MAC_ADDRESS";
pub const SWITCH_PORT_NUMBER: &str = "SAI_SWITCH_ATTR_PORT_NUMBER";
pub const SWITCH_PORT_LIST: &str = "SAI_SWITCH_ATTR_PORT_LIST";
pub const SWITCH_CPU_PORT: &str = "SAI_SWITCH_ATTR_CPU_PORT";
pub const SWITCH_DEFAULT_VIRTUAL_ROUTER_ID: &str = "SAI_SWITCH_ATTR_DEFAULT_VIRTUAL_ROUTER_ID";
pub const SWITCH_DEFAULT_TRAP_GROUP: &str = "SAI_SWITCH_ATTR_DEFAULT_TRAP_GROUP";
pub const SWITCH_DEFAULT_VLAN_ID: &str = "SAI_SWITCH_ATTR_DEFAULT_VLAN_ID";
pub const SWITCH_DEFAULT_STP_INST_ID: &str = "SAI_SWITCH_ATTR_DEFAULT_STP_INST_ID";
pub const SWITCH_DEFAULT_1Q_BRIDGE_ID: &str = "SAI_SWITCH_ATTR_DEFAULT_1Q_BRIDGE_ID";
pub const SWITCH_ECMP_HASH: &str = "SAI_SWITCH_ATTR_ECMP_HASH";
pub const SWITCH_LAG_HASH: &str = "SAI_SWITCH_ATTR_LAG_HASH";

pub const PORT_HW_LANE_LIST: &str = "SAI_PORT_ATTR_HW_LANE_LIST";
pub const PORT_QOS_QUEUE_LIST: &str = "SAI_PORT_ATTR_QOS_QUEUE_LIST";
pub const PORT_QOS_SCHEDULER_GROUP_LIST: &str = "SAI_PORT_ATTR_QOS_SCHEDULER_GROUP_LIST";
pub const PORT_INGRESS_PRIORITY_GROUP_LIST: &str = "SAI_PORT_ATTR_INGRESS_PRIORITY_GROUP_LIST";

pub const SCHEDULER_GROUP_SCHEDULER_PROFILE_ID: &str =
    "SAI_SCHEDULER_GROUP_ATTR_SCHEDULER_PROFILE_ID";
pub const SCHEDULER_GROUP_PARENT_NODE: &str = "SAI_SCHEDULER_GROUP_ATTR_PARENT_NODE";
pub const QUEUE_PARENT_SCHEDULER_NODE: &str = "SAI_QUEUE_ATTR_PARENT_SCHEDULER_NODE";
pub const QUEUE_SCHEDULER_PROFILE_ID: &str = "SAI_QUEUE_ATTR_SCHEDULER_PROFILE_ID";

pub const HOSTIF_TRAP_GROUP_QUEUE: &str = "SAI_HOSTIF_TRAP_GROUP_ATTR_QUEUE";
pub const HOSTIF_TRAP_TRAP_GROUP: &str = "SAI_HOSTIF_TRAP_ATTR_TRAP_GROUP";

pub const STP_BRIDGE_ID: &str = "SAI_STP_ATTR_BRIDGE_ID";
pub const BRIDGE_PORT_BRIDGE_ID: &str = "SAI_BRIDGE_PORT_ATTR_BRIDGE_ID";
pub const BRIDGE_PORT_TUNNEL_ID: &str = "SAI_BRIDGE_PORT_ATTR_TUNNEL_ID";
pub const BRIDGE_PORT_RIF_ID: &str = "SAI_BRIDGE_PORT_ATTR_RIF_ID";

pub const ACL_TABLE_ACL_STAGE: &str = "SAI_ACL_TABLE_ATTR_ACL_STAGE";
pub const ROUTE_ENTRY_NEXT_HOP_ID: &str = "SAI_ROUTE_ENTRY_ATTR_NEXT_HOP_ID";

fn md(
    object_type: ObjectType,
    name: &'static str,
    value_type: AttrValueType,
    flags: AttrFlags,
    default: DefaultKind,
) -> AttrMetadata {
    AttrMetadata {
        object_type,
        name,
        value_type,
        flags,
        default,
        is_conditional: false,
    }
}

fn conditional(mut meta: AttrMetadata) -> AttrMetadata {
    meta.is_conditional = true;
    meta
}

fn disabled_acl_field() -> DefaultKind {
    DefaultKind::Const(AttrValue::AclField(AclField {
        enabled: false,
        data: Box::new(AttrValue::Oid(ObjectId::NULL)),
    }))
}

fn disabled_acl_action() -> DefaultKind {
    DefaultKind::Const(AttrValue::AclAction(crate::attr::AclAction {
        enabled: false,
        parameter: Box::new(AttrValue::Oid(ObjectId::NULL)),
    }))
}

#[rustfmt::skip]
fn build_registry() -> Vec<AttrMetadata> {
    use AttrValueType as T;
    use DefaultKind as D;
    use ObjectType as O;

    let null_oid = || D::Const(AttrValue::Oid(ObjectId::NULL));
    let disabled_pointer = || D::Const(AttrValue::Pointer(PointerValue::Disabled));

    vec![
        // SWITCH
        md(O::Switch, SWITCH_INIT_SWITCH, T::Bool, mandatory_create_only(), D::None),
        md(O::Switch, SWITCH_HARDWARE_INFO, T::Chars, create_only(), D::Const(AttrValue::Chars(String::new()))),
        md(O::Switch, SWITCH_SRC_MAC_ADDRESS, T::Mac, create_and_set(), D::SwitchInternal),
        md(O::Switch, SWITCH_PORT_NUMBER, T::U32, read_only(), D::None),
        md(O::Switch, SWITCH_PORT_LIST, T::OidList, read_only(), D::None),
        md(O::Switch, SWITCH_CPU_PORT, T::Oid, read_only(), D::SwitchInternal),
        md(O::Switch, SWITCH_DEFAULT_VIRTUAL_ROUTER_ID, T::Oid, read_only(), D::SwitchInternal),
        md(O::Switch, SWITCH_DEFAULT_TRAP_GROUP, T::Oid, read_only(), D::SwitchInternal),
        md(O::Switch, SWITCH_DEFAULT_VLAN_ID, T::Oid, read_only(), D::SwitchInternal),
        md(O::Switch, SWITCH_DEFAULT_STP_INST_ID, T::Oid, read_only(), D::SwitchInternal),
        md(O::Switch, SWITCH_DEFAULT_1Q_BRIDGE_ID, T::Oid, read_only(), D::SwitchInternal),
        md(O::Switch, SWITCH_ECMP_HASH, T::Oid, read_only(), D::SwitchInternal),
        md(O::Switch, SWITCH_LAG_HASH, T::Oid, read_only(), D::SwitchInternal),
        md(O::Switch, "SAI_SWITCH_ATTR_SWITCH_STATE_CHANGE_NOTIFY", T::Pointer, create_and_set(), disabled_pointer()),
        md(O::Switch, "SAI_SWITCH_ATTR_SHUTDOWN_REQUEST_NOTIFY", T::Pointer, create_and_set(), disabled_pointer()),
        md(O::Switch, "SAI_SWITCH_ATTR_FDB_EVENT_NOTIFY", T::Pointer, create_and_set(), disabled_pointer()),
        md(O::Switch, "SAI_SWITCH_ATTR_PORT_STATE_CHANGE_NOTIFY", T::Pointer, create_and_set(), disabled_pointer()),
        md(O::Switch, "SAI_SWITCH_ATTR_RESTART_WARM", T::Bool, create_and_set(), D::Const(AttrValue::Bool(false))),

        // PORT
        md(O::Port, PORT_HW_LANE_LIST, T::U32List, key_create_only(), D::None),
        md(O::Port, "SAI_PORT_ATTR_SPEED", T::U32, mandatory_create_and_set(), D::None),
        md(O::Port, "SAI_PORT_ATTR_ADMIN_STATE", T::Bool, create_and_set(), D::Const(AttrValue::Bool(false))),
        md(O::Port, "SAI_PORT_ATTR_MTU", T::U32, create_and_set(), D::Const(AttrValue::U32(1514))),
        md(O::Port, "SAI_PORT_ATTR_PORT_VLAN_ID", T::U16, create_and_set(), D::Const(AttrValue::U16(1))),
        md(O::Port, "SAI_PORT_ATTR_QOS_NUMBER_OF_QUEUES", T::U32, read_only(), D::None),
        md(O::Port, PORT_QOS_QUEUE_LIST, T::OidList, read_only(), D::None),
        md(O::Port, PORT_QOS_SCHEDULER_GROUP_LIST, T::OidList, read_only(), D::None),
        md(O::Port, PORT_INGRESS_PRIORITY_GROUP_LIST, T::OidList, read_only(), D::None),

        // VIRTUAL_ROUTER
        md(O::VirtualRouter, "SAI_VIRTUAL_ROUTER_ATTR_ADMIN_V4_STATE", T::Bool, create_and_set(), D::Const(AttrValue::Bool(true))),
        md(O::VirtualRouter, "SAI_VIRTUAL_ROUTER_ATTR_ADMIN_V6_STATE", T::Bool, create_and_set(), D::Const(AttrValue::Bool(true))),
        md(O::VirtualRouter, "SAI_VIRTUAL_ROUTER_ATTR_SRC_MAC_ADDRESS", T::Mac, create_and_set(), D::AttrValue(O::Switch, SWITCH_SRC_MAC_ADDRESS)),

        // ROUTER_INTERFACE
        md(O::RouterInterface, "SAI_ROUTER_INTERFACE_ATTR_VIRTUAL_ROUTER_ID", T::Oid, mandatory_create_only(), D::None),
        md(O::RouterInterface, "SAI_ROUTER_INTERFACE_ATTR_TYPE", T::I32, mandatory_create_only(), D::None),
        conditional(md(O::RouterInterface, "SAI_ROUTER_INTERFACE_ATTR_PORT_ID", T::Oid, create_only(), D::None)),
        conditional(md(O::RouterInterface, "SAI_ROUTER_INTERFACE_ATTR_VLAN_ID", T::Oid, create_only(), D::None)),
        md(O::RouterInterface, "SAI_ROUTER_INTERFACE_ATTR_SRC_MAC_ADDRESS", T::Mac, create_and_set(), D::AttrValue(O::Switch, SWITCH_SRC_MAC_ADDRESS)),
        md(O::RouterInterface, "SAI_ROUTER_INTERFACE_ATTR_ADMIN_V4_STATE", T::Bool, create_and_set(), D::Const(AttrValue::Bool(true))),

        // NEXT_HOP
        md(O::NextHop, "SAI_NEXT_HOP_ATTR_TYPE", T::I32, mandatory_create_only(), D::None),
        conditional(md(O::NextHop, "SAI_NEXT_HOP_ATTR_IP", T::Ip, mandatory_create_only(), D::None)),
        conditional(md(O::NextHop, "SAI_NEXT_HOP_ATTR_ROUTER_INTERFACE_ID", T::Oid, mandatory_create_only(), D::None)),

        // NEXT_HOP_GROUP
        md(O::NextHopGroup, "SAI_NEXT_HOP_GROUP_ATTR_TYPE", T::I32, mandatory_create_only(), D::None),
        md(O::NextHopGroupMember, "SAI_NEXT_HOP_GROUP_MEMBER_ATTR_NEXT_HOP_GROUP_ID", T::Oid, mandatory_create_only(), D::None),
        md(O::NextHopGroupMember, "SAI_NEXT_HOP_GROUP_MEMBER_ATTR_NEXT_HOP_ID", T::Oid, mandatory_create_only(), D::None),

        // ROUTE_ENTRY
        md(O::RouteEntry, "SAI_ROUTE_ENTRY_ATTR_PACKET_ACTION", T::I32, create_and_set(), D::Const(AttrValue::I32(0))),
        md(O::RouteEntry, ROUTE_ENTRY_NEXT_HOP_ID, T::Oid, create_and_set(), null_oid()),

        // NEIGHBOR_ENTRY
        md(O::NeighborEntry, "SAI_NEIGHBOR_ENTRY_ATTR_DST_MAC_ADDRESS", T::Mac, mandatory_create_and_set(), D::None),

        // FDB_ENTRY
        md(O::FdbEntry, "SAI_FDB_ENTRY_ATTR_TYPE", T::I32, mandatory_create_and_set(), D::None),
        md(O::FdbEntry, "SAI_FDB_ENTRY_ATTR_BRIDGE_PORT_ID", T::Oid, mandatory_create_and_set(), D::None),
        md(O::FdbEntry, "SAI_FDB_ENTRY_ATTR_PACKET_ACTION", T::I32, create_and_set(), D::Const(AttrValue::I32(0))),

        // VLAN
        md(O::Vlan, "SAI_VLAN_ATTR_VLAN_ID", T::U16, key_create_only(), D::None),
        md(O::VlanMember, "SAI_VLAN_MEMBER_ATTR_VLAN_ID", T::Oid, mandatory_create_only(), D::None),
        md(O::VlanMember, "SAI_VLAN_MEMBER_ATTR_BRIDGE_PORT_ID", T::Oid, mandatory_create_only(), D::None),
        md(O::VlanMember, "SAI_VLAN_MEMBER_ATTR_VLAN_TAGGING_MODE", T::I32, create_and_set(), D::Const(AttrValue::I32(0))),

        // BRIDGE
        md(O::Bridge, "SAI_BRIDGE_ATTR_TYPE", T::I32, mandatory_create_only(), D::None),
        md(O::BridgePort, "SAI_BRIDGE_PORT_ATTR_TYPE", T::I32, mandatory_create_only(), D::None),
        conditional(md(O::BridgePort, "SAI_BRIDGE_PORT_ATTR_PORT_ID", T::Oid, create_only(), D::None)),
        conditional(md(O::BridgePort, BRIDGE_PORT_TUNNEL_ID, T::Oid, create_only(), D::None)),
        conditional(md(O::BridgePort, BRIDGE_PORT_RIF_ID, T::Oid, create_only(), D::None)),
        md(O::BridgePort, BRIDGE_PORT_BRIDGE_ID, T::Oid, create_and_set(), D::AttrValue(O::Switch, SWITCH_DEFAULT_1Q_BRIDGE_ID)),
        md(O::BridgePort, "SAI_BRIDGE_PORT_ATTR_ADMIN_STATE", T::Bool, create_and_set(), D::Const(AttrValue::Bool(true))),

        // STP
        md(O::Stp, STP_BRIDGE_ID, T::Oid, read_only(), D::None),
        md(O::StpPort, "SAI_STP_PORT_ATTR_STP", T::Oid, mandatory_create_only(), D::None),
        md(O::StpPort, "SAI_STP_PORT_ATTR_BRIDGE_PORT", T::Oid, mandatory_create_only(), D::None),
        md(O::StpPort, "SAI_STP_PORT_ATTR_STATE", T::I32, mandatory_create_and_set(), D::None),

        // QUEUE
        md(O::Queue, "SAI_QUEUE_ATTR_TYPE", T::I32, key_create_only(), D::None),
        md(O::Queue, "SAI_QUEUE_ATTR_PORT", T::Oid, key_create_only(), D::None),
        md(O::Queue, "SAI_QUEUE_ATTR_INDEX", T::U8, key_create_only(), D::None),
        md(O::Queue, QUEUE_PARENT_SCHEDULER_NODE, T::Oid, mandatory_create_and_set(), D::None),
        md(O::Queue, "SAI_QUEUE_ATTR_WRED_PROFILE_ID", T::Oid, create_and_set(), null_oid()),
        md(O::Queue, "SAI_QUEUE_ATTR_BUFFER_PROFILE_ID", T::Oid, create_and_set(), null_oid()),
        md(O::Queue, QUEUE_SCHEDULER_PROFILE_ID, T::Oid, create_and_set(), null_oid()),

        // SCHEDULER_GROUP
        md(O::SchedulerGroup, "SAI_SCHEDULER_GROUP_ATTR_PORT_ID", T::Oid, mandatory_create_only(), D::None),
        md(O::SchedulerGroup, "SAI_SCHEDULER_GROUP_ATTR_LEVEL", T::U8, mandatory_create_only(), D::None),
        md(O::SchedulerGroup, "SAI_SCHEDULER_GROUP_ATTR_MAX_CHILDS", T::U8, mandatory_create_only(), D::None),
        md(O::SchedulerGroup, SCHEDULER_GROUP_SCHEDULER_PROFILE_ID, T::Oid, mandatory_create_and_set(), D::None),
        md(O::SchedulerGroup, SCHEDULER_GROUP_PARENT_NODE, T::Oid, mandatory_create_and_set(), D::None),
        md(O::SchedulerGroup, "SAI_SCHEDULER_GROUP_ATTR_CHILD_COUNT", T::U32, read_only(), D::None),
        md(O::SchedulerGroup, "SAI_SCHEDULER_GROUP_ATTR_CHILD_LIST", T::OidList, read_only(), D::None),

        // SCHEDULER
        md(O::Scheduler, "SAI_SCHEDULER_ATTR_SCHEDULING_TYPE", T::I32, create_and_set(), D::Const(AttrValue::I32(0))),
        md(O::Scheduler, "SAI_SCHEDULER_ATTR_SCHEDULING_WEIGHT", T::U8, create_and_set(), D::Const(AttrValue::U8(1))),

        // INGRESS_PRIORITY_GROUP
        md(O::IngressPriorityGroup, "SAI_INGRESS_PRIORITY_GROUP_ATTR_PORT", T::Oid, key_create_only(), D::None),
        md(O::IngressPriorityGroup, "SAI_INGRESS_PRIORITY_GROUP_ATTR_INDEX", T::U8, key_create_only(), D::None),
        md(O::IngressPriorityGroup, "SAI_INGRESS_PRIORITY_GROUP_ATTR_BUFFER_PROFILE", T::Oid, create_and_set(), null_oid()),

        // BUFFER
        md(O::BufferPool, "SAI_BUFFER_POOL_ATTR_TYPE", T::I32, mandatory_create_only(), D::None),
        md(O::BufferPool, "SAI_BUFFER_POOL_ATTR_SIZE", T::U64, mandatory_create_and_set(), D::None),
        md(O::BufferProfile, "SAI_BUFFER_PROFILE_ATTR_POOL_ID", T::Oid, mandatory_create_only(), D::None),
        md(O::BufferProfile, "SAI_BUFFER_PROFILE_ATTR_RESERVED_BUFFER_SIZE", T::U64, mandatory_create_and_set(), D::None),

        // HOSTIF TRAPS
        md(O::HostifTrapGroup, "SAI_HOSTIF_TRAP_GROUP_ATTR_ADMIN_STATE", T::Bool, create_and_set(), D::Const(AttrValue::Bool(true))),
        md(O::HostifTrapGroup, HOSTIF_TRAP_GROUP_QUEUE, T::U32, create_and_set(), D::Const(AttrValue::U32(0))),
        md(O::HostifTrapGroup, "SAI_HOSTIF_TRAP_GROUP_ATTR_POLICER", T::Oid, create_and_set(), null_oid()),
        md(O::HostifTrap, "SAI_HOSTIF_TRAP_ATTR_TRAP_TYPE", T::I32, key_create_only(), D::None),
        md(O::HostifTrap, "SAI_HOSTIF_TRAP_ATTR_PACKET_ACTION", T::I32, mandatory_create_and_set(), D::None),
        md(O::HostifTrap, "SAI_HOSTIF_TRAP_ATTR_TRAP_PRIORITY", T::U32, create_and_set(), D::Const(AttrValue::U32(0))),
        md(O::HostifTrap, HOSTIF_TRAP_TRAP_GROUP, T::Oid, create_and_set(), D::AttrValue(O::Switch, SWITCH_DEFAULT_TRAP_GROUP)),

        // ACL
        md(O::AclTable, ACL_TABLE_ACL_STAGE, T::I32, mandatory_create_only(), D::None),
        md(O::AclTable, "SAI_ACL_TABLE_ATTR_ACL_BIND_POINT_TYPE_LIST", T::I32List, create_only(), D::EmptyList),
        md(O::AclTable, "SAI_ACL_TABLE_ATTR_FIELD_SRC_IP", T::Bool, create_only(), D::Const(AttrValue::Bool(false))),
        md(O::AclTable, "SAI_ACL_TABLE_ATTR_FIELD_DST_IP", T::Bool, create_only(), D::Const(AttrValue::Bool(false))),
        md(O::AclEntry, "SAI_ACL_ENTRY_ATTR_TABLE_ID", T::Oid, mandatory_create_only(), D::None),
        md(O::AclEntry, "SAI_ACL_ENTRY_ATTR_PRIORITY", T::U32, create_and_set(), D::Const(AttrValue::U32(0))),
        md(O::AclEntry, "SAI_ACL_ENTRY_ATTR_ADMIN_STATE", T::Bool, create_and_set(), D::Const(AttrValue::Bool(true))),
        md(O::AclEntry, "SAI_ACL_ENTRY_ATTR_FIELD_IN_PORT", T::AclFieldOid, create_and_set(), disabled_acl_field()),
        md(O::AclEntry, "SAI_ACL_ENTRY_ATTR_FIELD_IN_PORTS", T::AclFieldOidList, create_and_set(), disabled_acl_field()),
        md(O::AclEntry, "SAI_ACL_ENTRY_ATTR_ACTION_REDIRECT", T::AclActionOid, create_and_set(), disabled_acl_action()),
        md(O::AclEntry, "SAI_ACL_ENTRY_ATTR_ACTION_COUNTER", T::AclActionOid, create_and_set(), disabled_acl_action()),

        // POLICER
        md(O::Policer, "SAI_POLICER_ATTR_METER_TYPE", T::I32, mandatory_create_only(), D::None),
        md(O::Policer, "SAI_POLICER_ATTR_MODE", T::I32, mandatory_create_only(), D::None),
        md(O::Policer, "SAI_POLICER_ATTR_CBS", T::U64, create_and_set(), D::Const(AttrValue::U64(0))),

        // HASH
        md(O::Hash, "SAI_HASH_ATTR_NATIVE_HASH_FIELD_LIST", T::I32List, create_and_set(), D::EmptyList),

        // QOS_MAP
        md(O::QosMap, "SAI_QOS_MAP_ATTR_TYPE", T::I32, mandatory_create_only(), D::None),
        md(O::QosMap, "SAI_QOS_MAP_ATTR_MAP_TO_VALUE_LIST", T::QosMapList, mandatory_create_and_set(), D::None),
    ]
}

static REGISTRY: Lazy<HashMap<ObjectType, HashMap<&'static str, AttrMetadata>>> =
    Lazy::new(|| {
        let mut map: HashMap<ObjectType, HashMap<&'static str, AttrMetadata>> = HashMap::new();
        for meta in build_registry() {
            let prev = map
                .entry(meta.object_type)
                .or_default()
                .insert(meta.name, meta);
            assert!(prev.is_none(), "duplicate attribute metadata");
        }
        map
    });

/// Look up metadata by object type and canonical attribute name.
pub fn get(object_type: ObjectType, name: &str) -> Option<&'static AttrMetadata> {
    REGISTRY.get(&object_type)?.get(name)
}

/// All attributes of one object type, in registry order is not guaranteed;
/// callers that need determinism must sort by name.
pub fn attributes_of(object_type: ObjectType) -> impl Iterator<Item = &'static AttrMetadata> {
    REGISTRY
        .get(&object_type)
        .into_iter()
        .flat_map(|attrs| attrs.values())
}

/// The default mac placeholder used when the discovery snapshot is missing.
pub fn zero_mac() -> MacAddress {
    MacAddress([0; 6])
}
