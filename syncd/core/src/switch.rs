// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-switch inventory.
//!
//! Right after the switch is created in the driver the inventory walks every
//! reachable object id, recording which real ids the driver created
//! implicitly and what value every oid attribute held at that moment. Those
//! snapshots later tell the reconciler which objects cannot be removed and
//! what "default" means for attributes the vendor assigned internally.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use syncd_sai::{
    metadata, AttrValue, Attribute, MacAddress, ObjectId, ObjectType, SaiApi,
};
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::error::{SyncdError, SyncdResult};
use crate::store::{self, StateStore, ASIC_STATE_TABLE, HIDDEN, LANES};
use crate::translator::RidVidTranslator;

/// Below this many rows the database is considered freshly initialized and
/// the discovered objects are written out as placeholder rows.
const OBJECTS_THRESHOLD: usize = 32;

pub struct SaiSwitch {
    switch_vid: ObjectId,
    switch_rid: ObjectId,
    hardware_info: String,
    default_mac: MacAddress,
    /// Real ids created implicitly by the driver at switch create.
    discovered: BTreeSet<ObjectId>,
    /// rid -> attribute name -> oid value observed right after discovery.
    default_oid_map: BTreeMap<ObjectId, BTreeMap<&'static str, ObjectId>>,
    /// Switch-internal default rids keyed by switch attribute name.
    default_rid_map: BTreeMap<&'static str, ObjectId>,
}

impl SaiSwitch {
    pub fn new(
        ctx: &Arc<Context>,
        store: &dyn StateStore,
        api: &dyn SaiApi,
        translator: &RidVidTranslator,
        switch_vid: ObjectId,
        switch_rid: ObjectId,
    ) -> SyncdResult<Self> {
        let mut sw = Self {
            switch_vid,
            switch_rid,
            hardware_info: String::new(),
            default_mac: metadata::zero_mac(),
            discovered: BTreeSet::new(),
            default_oid_map: BTreeMap::new(),
            default_rid_map: BTreeMap::new(),
        };

        sw.hardware_info = sw.read_hardware_info(api);

        sw.discover(ctx, api)?;
        sw.put_discovered_to_store(store, translator)?;
        sw.read_internal_oids(store, api, translator)?;
        sw.check_lane_map(store, api)?;

        sw.default_mac = sw.read_mac_address(api);

        Ok(sw)
    }

    pub fn vid(&self) -> ObjectId {
        self.switch_vid
    }

    pub fn rid(&self) -> ObjectId {
        self.switch_rid
    }

    /// Create-only, so constant for the entire life of the switch.
    pub fn hardware_info(&self) -> &str {
        &self.hardware_info
    }

    pub fn default_mac(&self) -> MacAddress {
        self.default_mac
    }

    pub fn is_default_created_rid(&self, rid: ObjectId) -> bool {
        self.discovered.contains(&rid)
    }

    pub fn existing_objects(&self) -> &BTreeSet<ObjectId> {
        &self.discovered
    }

    /// Value the given oid attribute held right after switch create, when
    /// the snapshot has one.
    pub fn snapshot_oid(&self, rid: ObjectId, attr_name: &str) -> Option<ObjectId> {
        self.default_oid_map.get(&rid)?.get(attr_name).copied()
    }

    /// Switch-internal default rid (default virtual router, trap group, CPU
    /// port and friends) by canonical attribute name.
    pub fn switch_default_attr_oid(&self, attr_name: &str) -> Option<ObjectId> {
        self.default_rid_map.get(attr_name).copied()
    }

    /// A discovered rid cannot be removed when it is one of the switch
    /// internal defaults or its type is created once per switch lifetime.
    /// Bridge ports, VLAN members and STP ports are discovered yet
    /// removable.
    pub fn is_non_removable_rid(&self, rid: ObjectId) -> bool {
        if !self.is_default_created_rid(rid) {
            return false;
        }

        if self.default_rid_map.values().any(|default| *default == rid) {
            return true;
        }

        match rid.object_type() {
            Some(
                ObjectType::VlanMember | ObjectType::StpPort | ObjectType::BridgePort,
            ) => false,
            Some(
                ObjectType::Port
                | ObjectType::Queue
                | ObjectType::IngressPriorityGroup
                | ObjectType::SchedulerGroup
                | ObjectType::Hash
                | ObjectType::Switch,
            ) => true,
            _ => {
                warn!("cannot determine whether rid {rid} is removable, keeping it");
                true
            }
        }
    }

    /// Drop a removed object from the discovered set, so it will not be
    /// resurrected as an existing object by the next APPLY.
    pub fn remove_existing_object_reference(&mut self, rid: ObjectId) -> SyncdResult<()> {
        if !self.discovered.remove(&rid) {
            return Err(SyncdError::InventoryMismatch(format!(
                "rid {rid} is not a discovered object"
            )));
        }
        debug!("dropped discovered rid {rid}");
        Ok(())
    }

    /// Remove a discovered object from the ASIC as well as from the set.
    pub fn remove_existing_object(&mut self, api: &dyn SaiApi, rid: ObjectId) -> SyncdResult<()> {
        let object_type = rid
            .object_type()
            .ok_or(SyncdError::Model(syncd_sai::SaiError::UnknownObjectType(rid)))?;

        match api.remove_object(object_type, rid) {
            Ok(()) => {
                self.discovered.remove(&rid);
                Ok(())
            }
            Err(status) => {
                warn!("failed to remove discovered {object_type} rid {rid}: {status}");
                Ok(())
            }
        }
    }

    fn read_hardware_info(&self, api: &dyn SaiApi) -> String {
        match api.get_object_attributes(
            ObjectType::Switch,
            self.switch_rid,
            &[metadata::SWITCH_HARDWARE_INFO],
        ) {
            Ok(attrs) => match attrs.into_iter().next().map(|a| a.value) {
                Some(AttrValue::Chars(info)) => info,
                _ => String::new(),
            },
            Err(status) => {
                // some vendors cannot report hardware info, treat as unset
                warn!("failed to get switch hardware info: {status}");
                String::new()
            }
        }
    }

    fn read_mac_address(&self, api: &dyn SaiApi) -> MacAddress {
        match api.get_object_attributes(
            ObjectType::Switch,
            self.switch_rid,
            &[metadata::SWITCH_SRC_MAC_ADDRESS],
        ) {
            Ok(attrs) => match attrs.into_iter().next().map(|a| a.value) {
                Some(AttrValue::Mac(mac)) => mac,
                _ => metadata::zero_mac(),
            },
            Err(status) => {
                warn!("failed to get switch mac address: {status}");
                metadata::zero_mac()
            }
        }
    }

    /// Recursive walk over every oid and oid-list attribute starting at the
    /// switch. Revisits are cut by the visited set; known-bad reads are cut
    /// by the context's skip set.
    fn discover(&mut self, ctx: &Arc<Context>, api: &dyn SaiApi) -> SyncdResult<()> {
        let mut visited = HashSet::new();
        self.discover_rid(ctx, api, self.switch_rid, &mut visited)?;

        info!("discovered {} objects", self.discovered.len());

        let mut per_type: BTreeMap<ObjectType, usize> = BTreeMap::new();
        for rid in &self.discovered {
            if let Some(ot) = rid.object_type() {
                *per_type.entry(ot).or_insert(0) += 1;
            }
        }
        for (ot, count) in per_type {
            debug!("{ot}: {count}");
        }

        Ok(())
    }

    fn discover_rid(
        &mut self,
        ctx: &Arc<Context>,
        api: &dyn SaiApi,
        rid: ObjectId,
        visited: &mut HashSet<ObjectId>,
    ) -> SyncdResult<()> {
        if rid.is_null() || !visited.insert(rid) {
            return Ok(());
        }

        let object_type = rid
            .object_type()
            .ok_or(SyncdError::Model(syncd_sai::SaiError::UnknownObjectType(rid)))?;

        // STP ports vanish together with their bridge port, tracking them as
        // existing objects would desynchronize the view from the ASIC
        if object_type != ObjectType::StpPort {
            self.discovered.insert(rid);
        }

        let mut attr_names: Vec<&'static str> = metadata::attributes_of(object_type)
            .filter(|meta| {
                matches!(
                    meta.value_type,
                    syncd_sai::AttrValueType::Oid | syncd_sai::AttrValueType::OidList
                )
            })
            .map(|meta| meta.name)
            .collect();
        attr_names.sort_unstable();

        for name in attr_names {
            if ctx.discovery_skips.contains(&(object_type, name)) {
                debug!("skipping known-bad read {object_type}:{name}");
                continue;
            }

            let attrs = match api.get_object_attributes(object_type, rid, &[name]) {
                Ok(attrs) => attrs,
                Err(status) => {
                    debug!("{name}: {status} on {rid}");
                    continue;
                }
            };
            let Some(attr) = attrs.into_iter().next() else {
                continue;
            };

            match attr.value {
                AttrValue::Oid(oid) => {
                    self.default_oid_map
                        .entry(rid)
                        .or_default()
                        .insert(name, oid);
                    self.discover_rid(ctx, api, oid, visited)?;
                }
                AttrValue::OidList(list) => {
                    let capacity = ctx.parameters.discovery_list_capacity;
                    if list.len() > capacity {
                        warn!(
                            "{name} on {rid} returned {} elements, walking first {capacity}",
                            list.len()
                        );
                    }
                    for oid in list.into_iter().take(capacity) {
                        self.discover_rid(ctx, api, oid, visited)?;
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// On a fresh database write a placeholder row for every discovered
    /// object so that the applied view contains the default-created objects.
    /// A populated database already reflects user intent, including
    /// deletions, so nothing is written then.
    fn put_discovered_to_store(
        &self,
        store: &dyn StateStore,
        translator: &RidVidTranslator,
    ) -> SyncdResult<()> {
        let present = store.keys(&format!("{ASIC_STATE_TABLE}:")).len();

        if present > OBJECTS_THRESHOLD {
            info!("{present} objects in state table, not writing discovered objects");
            return Ok(());
        }

        info!("writing all discovered objects to the state table");

        for &rid in &self.discovered {
            self.write_placeholder_row(store, translator, rid)?;
        }

        Ok(())
    }

    fn write_placeholder_row(
        &self,
        store: &dyn StateStore,
        translator: &RidVidTranslator,
        rid: ObjectId,
    ) -> SyncdResult<()> {
        let vid = translator.rid_to_vid(rid, self.switch_vid)?;
        let object_type = vid
            .object_type()
            .ok_or(SyncdError::Model(syncd_sai::SaiError::UnknownObjectType(vid)))?;

        let key = store::object_key(ASIC_STATE_TABLE, object_type, &vid.to_string());
        store.hset(&key, "NULL", "NULL");
        Ok(())
    }

    /// Cache the switch-internal default oids and cross-check them against
    /// the persisted copies. A default changing across restarts would
    /// invalidate every persisted id map.
    fn read_internal_oids(
        &mut self,
        store: &dyn StateStore,
        api: &dyn SaiApi,
        translator: &RidVidTranslator,
    ) -> SyncdResult<()> {
        let mut names: Vec<&'static str> = metadata::attributes_of(ObjectType::Switch)
            .filter(|meta| {
                meta.value_type == syncd_sai::AttrValueType::Oid
                    && meta.default == syncd_sai::DefaultKind::SwitchInternal
            })
            .map(|meta| meta.name)
            .collect();
        names.sort_unstable();

        for name in names {
            let attrs = match api.get_object_attributes(ObjectType::Switch, self.switch_rid, &[name])
            {
                Ok(attrs) => attrs,
                Err(status) => {
                    warn!("failed to get {name}: {status}");
                    continue;
                }
            };
            let Some(Attribute {
                value: AttrValue::Oid(rid),
                ..
            }) = attrs.into_iter().next()
            else {
                continue;
            };

            if rid.is_null() {
                continue;
            }

            match store.hget(HIDDEN, name) {
                None => {
                    // first discovery of this default, persist it
                    self.write_placeholder_row(store, translator, rid)?;
                    store.hset(HIDDEN, name, &rid.to_string());
                }
                Some(persisted) if persisted == rid.to_string() => {}
                Some(persisted) => {
                    return Err(SyncdError::InventoryMismatch(format!(
                        "{name} rid differs: {rid} (asic) vs {persisted} (persisted)"
                    )));
                }
            }

            self.default_rid_map.insert(name, rid);
        }

        Ok(())
    }

    /// Ports are identified by their hardware lanes; the persisted lane map
    /// must agree with the freshly read one or every port id mapping is
    /// suspect.
    fn check_lane_map(&self, store: &dyn StateStore, api: &dyn SaiApi) -> SyncdResult<()> {
        let fresh = self.read_lane_map(api)?;

        let mut persisted: BTreeMap<u32, ObjectId> = BTreeMap::new();
        for (lane, port) in store.hgetall(LANES) {
            let lane: u32 = lane.parse().map_err(|_| {
                SyncdError::InventoryMismatch(format!("bad lane key: {lane}"))
            })?;
            let port: ObjectId = port
                .parse()
                .map_err(|_| SyncdError::InventoryMismatch(format!("bad lane port: {port}")))?;
            persisted.insert(lane, port);
        }

        if persisted.is_empty() {
            info!("no lanes persisted, first start, saving lane map");
            for (lane, port) in &fresh {
                store.hset(LANES, &lane.to_string(), &port.to_string());
            }
            return Ok(());
        }

        if persisted.len() != fresh.len() {
            return Err(SyncdError::InventoryMismatch(format!(
                "lane map size differs: {} vs {}",
                fresh.len(),
                persisted.len()
            )));
        }

        for (lane, port) in &fresh {
            match persisted.get(lane) {
                Some(p) if p == port => {}
                Some(p) => {
                    return Err(SyncdError::InventoryMismatch(format!(
                        "lane {lane} port differs: {port} vs {p}, ids must be remapped"
                    )));
                }
                None => {
                    return Err(SyncdError::InventoryMismatch(format!(
                        "lane {lane} not persisted"
                    )));
                }
            }
        }

        Ok(())
    }

    fn read_lane_map(&self, api: &dyn SaiApi) -> SyncdResult<BTreeMap<u32, ObjectId>> {
        let mut map = BTreeMap::new();

        let ports = match api.get_object_attributes(
            ObjectType::Switch,
            self.switch_rid,
            &[metadata::SWITCH_PORT_LIST],
        ) {
            Ok(attrs) => match attrs.into_iter().next().map(|a| a.value) {
                Some(AttrValue::OidList(list)) => list,
                _ => Vec::new(),
            },
            Err(status) => {
                warn!("failed to get port list: {status}");
                Vec::new()
            }
        };

        for port_rid in ports {
            let lanes = match api.get_object_attributes(
                ObjectType::Port,
                port_rid,
                &[metadata::PORT_HW_LANE_LIST],
            ) {
                Ok(attrs) => match attrs.into_iter().next().map(|a| a.value) {
                    Some(AttrValue::U32List(lanes)) => lanes,
                    _ => Vec::new(),
                },
                Err(status) => {
                    return Err(SyncdError::InventoryMismatch(format!(
                        "failed to get hardware lanes of port {port_rid}: {status}"
                    )));
                }
            };

            for lane in lanes {
                map.insert(lane, port_rid);
            }
        }

        Ok(map)
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(
        switch_vid: ObjectId,
        switch_rid: ObjectId,
        discovered: BTreeSet<ObjectId>,
        default_rid_map: BTreeMap<&'static str, ObjectId>,
        default_oid_map: BTreeMap<ObjectId, BTreeMap<&'static str, ObjectId>>,
    ) -> Self {
        Self {
            switch_vid,
            switch_rid,
            hardware_info: String::new(),
            default_mac: MacAddress([0x52, 0x54, 0, 0, 0, 0x01]),
            discovered,
            default_oid_map,
            default_rid_map,
        }
    }
}
