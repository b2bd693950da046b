// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use strum_macros::{Display as StrumDisplay, EnumString};

use crate::metadata::{AttrMetadata, AttrValueType};
use crate::object_id::ObjectId;
use crate::SaiError;

/// Ethernet MAC address.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl FromStr for MacAddress {
    type Err = SaiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mac = [0u8; 6];
        let mut parts = s.split(':');
        for byte in mac.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| SaiError::Deserialize(format!("invalid mac: {s}")))?;
            *byte = u8::from_str_radix(part, 16)
                .map_err(|_| SaiError::Deserialize(format!("invalid mac: {s}")))?;
        }
        if parts.next().is_some() {
            return Err(SaiError::Deserialize(format!("invalid mac: {s}")));
        }
        Ok(MacAddress(mac))
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// IP prefix, `addr/len`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IpPrefix {
    pub addr: IpAddr,
    pub mask_len: u8,
}

impl IpPrefix {
    /// Default routes (`0.0.0.0/0`, `::/0`) must reach the driver before any
    /// other route.
    pub fn is_default_route(&self) -> bool {
        self.mask_len == 0
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.mask_len)
    }
}

impl fmt::Debug for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl FromStr for IpPrefix {
    type Err = SaiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = s
            .split_once('/')
            .ok_or_else(|| SaiError::Deserialize(format!("invalid prefix: {s}")))?;
        let addr: IpAddr = addr
            .parse()
            .map_err(|_| SaiError::Deserialize(format!("invalid prefix: {s}")))?;
        let mask_len: u8 = len
            .parse()
            .map_err(|_| SaiError::Deserialize(format!("invalid prefix: {s}")))?;
        let max = if addr.is_ipv4() { 32 } else { 128 };
        if mask_len > max {
            return Err(SaiError::Deserialize(format!("invalid prefix: {s}")));
        }
        Ok(IpPrefix { addr, mask_len })
    }
}

impl Serialize for IpPrefix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for IpPrefix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Notification callbacks the producer can install on the switch object.
///
/// The engine never stores raw callback addresses; a producer write is
/// reduced to the intended notification kind and the engine substitutes its
/// own sink when the attribute reaches the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, StrumDisplay, EnumString)]
pub enum NotificationKind {
    #[strum(serialize = "switch_state_change")]
    SwitchStateChange,
    #[strum(serialize = "switch_shutdown_request")]
    SwitchShutdownRequest,
    #[strum(serialize = "fdb_event")]
    FdbEvent,
    #[strum(serialize = "port_state_change")]
    PortStateChange,
    #[strum(serialize = "packet_event")]
    PacketEvent,
    #[strum(serialize = "queue_pfc_deadlock")]
    QueuePfcDeadlock,
}

/// Callback attribute payload: either disabled or carrying the notification
/// kind the producer intends to receive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerValue {
    Disabled,
    Enabled(NotificationKind),
}

/// ACL field payload. A disabled field carries no usable data; its payload
/// must be ignored, including any object ids inside.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AclField {
    pub enabled: bool,
    pub data: Box<AttrValue>,
}

/// ACL action payload, same enable semantics as [`AclField`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AclAction {
    pub enabled: bool,
    pub parameter: Box<AttrValue>,
}

/// One `from -> to` mapping inside a QoS map attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QosMapEntry {
    pub from: u32,
    pub to: u32,
}

/// Typed attribute value.
///
/// Equality is structural; since the textual serialization is injective this
/// is also the canonical definition of attribute value equality.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AttrValue {
    Bool(bool),
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    Mac(MacAddress),
    Ip(IpAddr),
    IpPrefix(IpPrefix),
    /// Character data (hardware info and friends).
    Chars(String),
    U32List(Vec<u32>),
    I32List(Vec<i32>),
    Oid(ObjectId),
    OidList(Vec<ObjectId>),
    AclField(AclField),
    AclAction(AclAction),
    QosMapList(Vec<QosMapEntry>),
    Pointer(PointerValue),
}

impl AttrValue {
    /// All object ids carried by this value, honoring ACL enable flags: a
    /// disabled field or action contributes nothing, whatever its payload.
    pub fn oids(&self) -> Vec<ObjectId> {
        match self {
            AttrValue::Oid(oid) => vec![*oid],
            AttrValue::OidList(list) => list.clone(),
            AttrValue::AclField(f) if f.enabled => f.data.oids(),
            AttrValue::AclAction(a) if a.enabled => a.parameter.oids(),
            _ => Vec::new(),
        }
    }

    /// Rewrite every embedded object id through `f`, preserving structure.
    /// Disabled ACL payloads are passed through untouched.
    pub fn try_map_oids<E>(
        &self,
        f: &mut dyn FnMut(ObjectId) -> Result<ObjectId, E>,
    ) -> Result<AttrValue, E> {
        Ok(match self {
            AttrValue::Oid(oid) => AttrValue::Oid(f(*oid)?),
            AttrValue::OidList(list) => {
                AttrValue::OidList(list.iter().copied().map(&mut *f).collect::<Result<_, E>>()?)
            }
            AttrValue::AclField(field) if field.enabled => AttrValue::AclField(AclField {
                enabled: true,
                data: Box::new(field.data.try_map_oids(f)?),
            }),
            AttrValue::AclAction(action) if action.enabled => AttrValue::AclAction(AclAction {
                enabled: true,
                parameter: Box::new(action.parameter.try_map_oids(f)?),
            }),
            other => other.clone(),
        })
    }

    pub fn is_oid_bearing_type(&self) -> bool {
        matches!(
            self,
            AttrValue::Oid(_)
                | AttrValue::OidList(_)
                | AttrValue::AclField(_)
                | AttrValue::AclAction(_)
        )
    }

    /// Canonical textual form.
    pub fn serialize(&self) -> String {
        match self {
            AttrValue::Bool(v) => v.to_string(),
            AttrValue::U8(v) => v.to_string(),
            AttrValue::I8(v) => v.to_string(),
            AttrValue::U16(v) => v.to_string(),
            AttrValue::I16(v) => v.to_string(),
            AttrValue::U32(v) => v.to_string(),
            AttrValue::I32(v) => v.to_string(),
            AttrValue::U64(v) => v.to_string(),
            AttrValue::I64(v) => v.to_string(),
            AttrValue::Mac(v) => v.to_string(),
            AttrValue::Ip(v) => v.to_string(),
            AttrValue::IpPrefix(v) => v.to_string(),
            AttrValue::Chars(v) => v.clone(),
            AttrValue::U32List(list) => serialize_list(list.iter()),
            AttrValue::I32List(list) => serialize_list(list.iter()),
            AttrValue::Oid(v) => v.to_string(),
            AttrValue::OidList(list) => serialize_list(list.iter()),
            AttrValue::AclField(f) => {
                if f.enabled {
                    format!("enabled:{}", f.data.serialize())
                } else {
                    "disabled".to_string()
                }
            }
            AttrValue::AclAction(a) => {
                if a.enabled {
                    format!("enabled:{}", a.parameter.serialize())
                } else {
                    "disabled".to_string()
                }
            }
            AttrValue::QosMapList(list) => {
                serialize_list(list.iter().map(|e| format!("{}->{}", e.from, e.to)))
            }
            AttrValue::Pointer(PointerValue::Disabled) => "none".to_string(),
            AttrValue::Pointer(PointerValue::Enabled(kind)) => kind.to_string(),
        }
    }

    /// Parse the canonical textual form for a given value type.
    pub fn parse(value_type: AttrValueType, s: &str) -> Result<AttrValue, SaiError> {
        let bad = || SaiError::Deserialize(format!("invalid {value_type:?} value: {s}"));

        Ok(match value_type {
            AttrValueType::Bool => AttrValue::Bool(s.parse().map_err(|_| bad())?),
            AttrValueType::U8 => AttrValue::U8(s.parse().map_err(|_| bad())?),
            AttrValueType::I8 => AttrValue::I8(s.parse().map_err(|_| bad())?),
            AttrValueType::U16 => AttrValue::U16(s.parse().map_err(|_| bad())?),
            AttrValueType::I16 => AttrValue::I16(s.parse().map_err(|_| bad())?),
            AttrValueType::U32 => AttrValue::U32(s.parse().map_err(|_| bad())?),
            AttrValueType::I32 => AttrValue::I32(s.parse().map_err(|_| bad())?),
            AttrValueType::U64 => AttrValue::U64(s.parse().map_err(|_| bad())?),
            AttrValueType::I64 => AttrValue::I64(s.parse().map_err(|_| bad())?),
            AttrValueType::Mac => AttrValue::Mac(s.parse()?),
            AttrValueType::Ip => AttrValue::Ip(s.parse().map_err(|_| bad())?),
            AttrValueType::IpPrefix => AttrValue::IpPrefix(s.parse()?),
            AttrValueType::Chars => AttrValue::Chars(s.to_string()),
            AttrValueType::U32List => AttrValue::U32List(parse_list(s, |item| {
                item.parse().map_err(|_| bad())
            })?),
            AttrValueType::I32List => AttrValue::I32List(parse_list(s, |item| {
                item.parse().map_err(|_| bad())
            })?),
            AttrValueType::Oid => AttrValue::Oid(s.parse()?),
            AttrValueType::OidList => AttrValue::OidList(parse_list(s, |item| item.parse())?),
            AttrValueType::AclFieldOid => {
                parse_acl(s, AttrValueType::Oid, |enabled, data| {
                    AttrValue::AclField(AclField {
                        enabled,
                        data: Box::new(data),
                    })
                })?
            }
            AttrValueType::AclFieldOidList => {
                parse_acl(s, AttrValueType::OidList, |enabled, data| {
                    AttrValue::AclField(AclField {
                        enabled,
                        data: Box::new(data),
                    })
                })?
            }
            AttrValueType::AclFieldU32 => {
                parse_acl(s, AttrValueType::U32, |enabled, data| {
                    AttrValue::AclField(AclField {
                        enabled,
                        data: Box::new(data),
                    })
                })?
            }
            AttrValueType::AclActionOid => {
                parse_acl(s, AttrValueType::Oid, |enabled, parameter| {
                    AttrValue::AclAction(AclAction {
                        enabled,
                        parameter: Box::new(parameter),
                    })
                })?
            }
            AttrValueType::AclActionOidList => {
                parse_acl(s, AttrValueType::OidList, |enabled, parameter| {
                    AttrValue::AclAction(AclAction {
                        enabled,
                        parameter: Box::new(parameter),
                    })
                })?
            }
            AttrValueType::QosMapList => AttrValue::QosMapList(parse_list(s, |item| {
                let (from, to) = item.split_once("->").ok_or_else(|| bad())?;
                Ok(QosMapEntry {
                    from: from.parse().map_err(|_| bad())?,
                    to: to.parse().map_err(|_| bad())?,
                })
            })?),
            AttrValueType::Pointer => match s {
                "none" => AttrValue::Pointer(PointerValue::Disabled),
                kind => AttrValue::Pointer(PointerValue::Enabled(
                    kind.parse().map_err(|_| bad())?,
                )),
            },
        })
    }
}

/// Lists render as `count:item,item,...`; the empty list is `0:`.
fn serialize_list<T: ToString>(items: impl ExactSizeIterator<Item = T>) -> String {
    let count = items.len();
    let body = items.map(|i| i.to_string()).collect::<Vec<_>>().join(",");
    format!("{count}:{body}")
}

fn parse_list<T>(
    s: &str,
    parse_item: impl Fn(&str) -> Result<T, SaiError>,
) -> Result<Vec<T>, SaiError> {
    let (count, body) = s
        .split_once(':')
        .ok_or_else(|| SaiError::Deserialize(format!("invalid list: {s}")))?;
    let count: usize = count
        .parse()
        .map_err(|_| SaiError::Deserialize(format!("invalid list count: {s}")))?;

    let items = if body.is_empty() {
        Vec::new()
    } else {
        body.split(',').map(parse_item).collect::<Result<_, _>>()?
    };

    if items.len() != count {
        return Err(SaiError::Deserialize(format!(
            "list count mismatch, declared {count}: {s}"
        )));
    }

    Ok(items)
}

fn parse_acl(
    s: &str,
    inner: AttrValueType,
    build: impl Fn(bool, AttrValue) -> AttrValue,
) -> Result<AttrValue, SaiError> {
    if s == "disabled" {
        // Payload of a disabled field/action is unspecified; keep a null oid
        // placeholder so the representation stays uniform.
        return Ok(build(false, AttrValue::Oid(ObjectId::NULL)));
    }

    let data = s
        .strip_prefix("enabled:")
        .ok_or_else(|| SaiError::Deserialize(format!("invalid acl value: {s}")))?;
    Ok(build(true, AttrValue::parse(inner, data)?))
}

/// Attribute instance: static metadata plus a typed value.
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    pub meta: &'static AttrMetadata,
    pub value: AttrValue,
}

impl Attribute {
    pub fn new(meta: &'static AttrMetadata, value: AttrValue) -> Self {
        Attribute { meta, value }
    }

    pub fn name(&self) -> &'static str {
        self.meta.name
    }

    /// True when the value type can carry object ids (the enable flag may
    /// still yield an empty oid set at runtime).
    pub fn is_oid_attr(&self) -> bool {
        self.meta.value_type.is_oid_bearing()
    }

    pub fn oids(&self) -> Vec<ObjectId> {
        self.value.oids()
    }

    pub fn serialized_value(&self) -> String {
        self.value.serialize()
    }
}
