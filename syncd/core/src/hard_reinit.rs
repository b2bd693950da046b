// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Cold-start replay.
//!
//! When the process starts and the database already holds a desired view,
//! that view is replayed into the driver instead of waiting for an APPLY:
//! the switch is created first, default-created objects are matched to
//! their previous real ids, everything else is created fresh, and entries
//! go last with default routes ahead of the rest.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use syncd_sai::{
    metadata, Attribute, ObjectId, ObjectKey, ObjectType, SaiApi,
};
use tracing::{debug, info, warn};

use crate::allocator::VidAllocator;
use crate::context::Context;
use crate::error::{SyncdError, SyncdResult};
use crate::store::{
    self, StateStore, ASIC_STATE_TABLE, RIDTOVID, VIDTORID,
};
use crate::switch::SaiSwitch;
use crate::translator::RidVidTranslator;

pub struct HardReiniter<'a> {
    ctx: &'a Arc<Context>,
    store: &'a dyn StateStore,
    api: &'a dyn SaiApi,
    allocator: &'a VidAllocator,
    translator: &'a RidVidTranslator,

    old_vid_to_rid: BTreeMap<ObjectId, ObjectId>,

    /// serialized id -> state-table key, per category
    switches: BTreeMap<String, String>,
    oids: BTreeMap<String, String>,
    fdbs: BTreeMap<String, String>,
    neighbors: BTreeMap<String, String>,
    routes: BTreeMap<String, String>,
    /// state-table key -> parsed attributes
    attributes: HashMap<String, Vec<Attribute>>,

    translated_vid_to_rid: BTreeMap<ObjectId, ObjectId>,
    translated_rid_to_vid: BTreeMap<ObjectId, ObjectId>,

    switch: Option<SaiSwitch>,
    switch_rid: ObjectId,
}

impl<'a> HardReiniter<'a> {
    pub fn new(
        ctx: &'a Arc<Context>,
        store: &'a dyn StateStore,
        api: &'a dyn SaiApi,
        allocator: &'a VidAllocator,
        translator: &'a RidVidTranslator,
    ) -> Self {
        Self {
            ctx,
            store,
            api,
            allocator,
            translator,
            old_vid_to_rid: BTreeMap::new(),
            switches: BTreeMap::new(),
            oids: BTreeMap::new(),
            fdbs: BTreeMap::new(),
            neighbors: BTreeMap::new(),
            routes: BTreeMap::new(),
            attributes: HashMap::new(),
            translated_vid_to_rid: BTreeMap::new(),
            translated_rid_to_vid: BTreeMap::new(),
            switch: None,
            switch_rid: ObjectId::NULL,
        }
    }

    /// Replay the persisted desired view. Returns the freshly built switch
    /// inventory, or `None` when the database held no switch.
    pub fn run(mut self) -> SyncdResult<Option<SaiSwitch>> {
        self.read_asic_state()?;

        if self.switches.is_empty() {
            info!("no switch in persisted state, nothing to replay");
            return Ok(None);
        }

        self.process_switch()?;

        self.process_fdbs()?;
        self.process_neighbors()?;
        self.process_oids()?;
        self.process_routes(true)?;
        self.process_routes(false)?;

        self.check_all_ids()?;

        Ok(self.switch)
    }

    fn read_asic_state(&mut self) -> SyncdResult<()> {
        self.old_vid_to_rid = store::read_object_map(self.store, VIDTORID);

        for key in self.store.keys(&format!("{ASIC_STATE_TABLE}:")) {
            let (str_type, str_id) = store::split_object_key(ASIC_STATE_TABLE, &key)
                .ok_or_else(|| SyncdError::CorruptedView(format!("bad state key: {key}")))?;

            let object_type: ObjectType = str_type
                .parse()
                .map_err(|_| SyncdError::CorruptedView(format!("bad object type in {key}")))?;

            match object_type {
                ObjectType::Switch => {
                    self.switches.insert(str_id.clone(), key.clone());
                    self.oids.insert(str_id, key.clone());
                }
                ObjectType::FdbEntry => {
                    self.fdbs.insert(str_id, key.clone());
                }
                ObjectType::NeighborEntry => {
                    self.neighbors.insert(str_id, key.clone());
                }
                ObjectType::RouteEntry => {
                    self.routes.insert(str_id, key.clone());
                }
                _ => {
                    self.oids.insert(str_id, key.clone());
                }
            }

            let mut attrs = Vec::new();
            for (field, value) in self.store.hgetall(&key) {
                if field == "NULL" {
                    continue;
                }
                attrs.push(Attribute::parse(object_type, &field, &value)?);
            }
            self.attributes.insert(key, attrs);
        }

        info!(
            "read asic state: {} oids, {} fdbs, {} neighbors, {} routes",
            self.oids.len(),
            self.fdbs.len(),
            self.neighbors.len(),
            self.routes.len()
        );

        Ok(())
    }

    /// The switch is created from its mandatory-on-create and create-only
    /// attributes, none of which carry object ids; everything else becomes
    /// a set once the switch exists.
    fn process_switch(&mut self) -> SyncdResult<()> {
        if self.switches.len() > 1 {
            return Err(SyncdError::SwitchMismatch(format!(
                "{} switches in persisted state",
                self.switches.len()
            )));
        }

        let (str_vid, state_key) = self.switches.iter().next().expect("checked non-empty");
        let switch_vid: ObjectId = str_vid
            .parse()
            .map_err(|_| SyncdError::CorruptedView(format!("bad switch vid {str_vid}")))?;
        let attrs = self.attributes.get(state_key).cloned().unwrap_or_default();

        let (create_attrs, set_attrs): (Vec<Attribute>, Vec<Attribute>) =
            attrs.into_iter().partition(|attr| {
                attr.meta.flags.mandatory_on_create || attr.meta.flags.create_only
            });

        info!("creating switch vid {switch_vid}");

        let switch_rid = self
            .api
            .create_object(ObjectType::Switch, ObjectId::NULL, &create_attrs)
            .map_err(|status| SyncdError::Driver {
                operation: "create switch".to_string(),
                status,
            })?;

        self.switch_rid = switch_rid;
        self.translated_vid_to_rid.insert(switch_vid, switch_rid);
        self.translated_rid_to_vid.insert(switch_rid, switch_vid);
        self.allocator.reserve_switch_index(switch_vid.switch_index());

        let sw = SaiSwitch::new(
            self.ctx,
            self.store,
            self.api,
            self.translator,
            switch_vid,
            switch_rid,
        )?;
        self.switch = Some(sw);

        for attr in set_attrs {
            let attr = self.translate_attr(&attr)?;
            if let Err(status) = self.api.set_object_attribute(ObjectType::Switch, switch_rid, &attr)
            {
                if attr.name() == metadata::SWITCH_SRC_MAC_ADDRESS {
                    warn!("ignoring {status} setting switch mac, known driver limitation");
                    continue;
                }
                return Err(SyncdError::Driver {
                    operation: format!("set {} on switch", attr.name()),
                    status,
                });
            }
        }

        Ok(())
    }

    /// Materialize one virtual id: create the object in the driver, or
    /// match it to its previous real id when the driver created it
    /// implicitly at switch create.
    fn process_single_vid(&mut self, vid: ObjectId) -> SyncdResult<ObjectId> {
        if vid.is_null() {
            return Ok(ObjectId::NULL);
        }

        if let Some(rid) = self.translated_vid_to_rid.get(&vid) {
            return Ok(*rid);
        }

        let object_type = vid
            .object_type()
            .ok_or(SyncdError::Model(syncd_sai::SaiError::UnknownObjectType(vid)))?;

        let state_key = self
            .oids
            .get(&vid.to_string())
            .ok_or_else(|| SyncdError::CorruptedView(format!("vid {vid} has no state row")))?
            .clone();

        let attrs = self.attributes.get(&state_key).cloned().unwrap_or_default();
        let attrs = self.translate_attrs(&attrs)?;

        let old_rid = self.old_vid_to_rid.get(&vid).copied().ok_or_else(|| {
            SyncdError::CorruptedView(format!("vid {vid} missing from the persisted id map"))
        })?;

        let default_created = self
            .switch
            .as_ref()
            .is_some_and(|sw| sw.is_default_created_rid(old_rid));

        let rid = if default_created {
            debug!("matching {object_type} vid {vid} to existing rid {old_rid}");
            self.set_attributes_on_existing(object_type, old_rid, &attrs)?;
            old_rid
        } else if object_type == ObjectType::HostifTrapGroup {
            self.create_trap_group(&attrs)?
        } else {
            self.create_object(object_type, &attrs)?
        };

        self.translated_vid_to_rid.insert(vid, rid);
        self.translated_rid_to_vid.insert(rid, vid);

        Ok(rid)
    }

    fn create_object(
        &mut self,
        object_type: ObjectType,
        attrs: &[Attribute],
    ) -> SyncdResult<ObjectId> {
        self.api
            .create_object(object_type, self.switch_rid, attrs)
            .map_err(|status| SyncdError::Driver {
                operation: format!("create {object_type}"),
                status,
            })
    }

    /// Some vendors reject creating a trap group together with its queue
    /// attribute; create with the queue only, set the rest afterwards.
    fn create_trap_group(&mut self, attrs: &[Attribute]) -> SyncdResult<ObjectId> {
        let queue: Vec<Attribute> = attrs
            .iter()
            .filter(|attr| attr.name() == metadata::HOSTIF_TRAP_GROUP_QUEUE)
            .cloned()
            .collect();

        let rid = self
            .api
            .create_object(ObjectType::HostifTrapGroup, self.switch_rid, &queue)
            .map_err(|status| SyncdError::Driver {
                operation: "create trap group".to_string(),
                status,
            })?;

        self.set_attributes_on_existing(ObjectType::HostifTrapGroup, rid, attrs)?;
        Ok(rid)
    }

    fn set_attributes_on_existing(
        &mut self,
        object_type: ObjectType,
        rid: ObjectId,
        attrs: &[Attribute],
    ) -> SyncdResult<()> {
        for attr in attrs {
            if attr.meta.flags.create_only {
                // snooped create-only values cannot be set again; on a
                // default-created object they describe what is already there
                debug!("skipping create-only {} on existing object", attr.name());
                continue;
            }

            self.api
                .set_object_attribute(object_type, rid, attr)
                .map_err(|status| SyncdError::Driver {
                    operation: format!("set {} on {object_type}", attr.name()),
                    status,
                })?;
        }
        Ok(())
    }

    /// Rewrite the vids inside each attribute, materializing every
    /// referenced object first.
    fn translate_attrs(&mut self, attrs: &[Attribute]) -> SyncdResult<Vec<Attribute>> {
        attrs.iter().map(|attr| self.translate_attr(attr)).collect()
    }

    fn translate_attr(&mut self, attr: &Attribute) -> SyncdResult<Attribute> {
        let mut mapping: HashMap<ObjectId, ObjectId> = HashMap::new();
        for vid in attr.oids() {
            if !vid.is_null() {
                let rid = self.process_single_vid(vid)?;
                mapping.insert(vid, rid);
            }
        }

        Ok(Attribute::new(
            attr.meta,
            attr.value.try_map_oids(&mut |vid| {
                if vid.is_null() {
                    Ok::<_, SyncdError>(vid)
                } else {
                    Ok(mapping[&vid])
                }
            })?,
        ))
    }

    fn translate_entry_key(&mut self, key: &ObjectKey) -> SyncdResult<ObjectKey> {
        let mut mapping: HashMap<ObjectId, ObjectId> = HashMap::new();
        for vid in key.member_oids() {
            if !vid.is_null() {
                let rid = self.process_single_vid(vid)?;
                mapping.insert(vid, rid);
            }
        }

        key.try_map_member_oids(&mut |vid| {
            if vid.is_null() {
                Ok::<_, SyncdError>(vid)
            } else {
                Ok(mapping[&vid])
            }
        })
    }

    fn process_oids(&mut self) -> SyncdResult<()> {
        let vids: Vec<ObjectId> = self
            .oids
            .keys()
            .map(|s| {
                s.parse().map_err(|_| {
                    SyncdError::CorruptedView(format!("bad vid in state table: {s}"))
                })
            })
            .collect::<SyncdResult<_>>()?;

        for vid in vids {
            self.process_single_vid(vid)?;
        }
        Ok(())
    }

    fn process_entries(
        &mut self,
        object_type: ObjectType,
        entries: BTreeMap<String, String>,
    ) -> SyncdResult<()> {
        for (str_id, state_key) in entries {
            let key = ObjectKey::parse(object_type, &str_id)?;
            let key = self.translate_entry_key(&key)?;

            let attrs = self.attributes.get(&state_key).cloned().unwrap_or_default();
            let attrs = self.translate_attrs(&attrs)?;

            self.api
                .create_entry(&key, &attrs)
                .map_err(|status| SyncdError::Driver {
                    operation: format!("create {object_type} {str_id}"),
                    status,
                })?;
        }
        Ok(())
    }

    fn process_fdbs(&mut self) -> SyncdResult<()> {
        let fdbs = std::mem::take(&mut self.fdbs);
        self.process_entries(ObjectType::FdbEntry, fdbs)
    }

    fn process_neighbors(&mut self) -> SyncdResult<()> {
        let neighbors = std::mem::take(&mut self.neighbors);
        self.process_entries(ObjectType::NeighborEntry, neighbors)
    }

    /// Two passes: the driver requires the default route before any other
    /// route.
    fn process_routes(&mut self, default_only: bool) -> SyncdResult<()> {
        let routes: BTreeMap<String, String> = self
            .routes
            .iter()
            .filter(|(str_id, _)| {
                let is_default = ObjectKey::parse(ObjectType::RouteEntry, str_id)
                    .map(|k| k.is_default_route())
                    .unwrap_or(false);
                is_default == default_only
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        self.process_entries(ObjectType::RouteEntry, routes)
    }

    /// Every previously mapped vid must have been materialized; rewrite the
    /// persistent maps from the translation and drop discovered objects the
    /// user had removed from the desired state.
    fn check_all_ids(&mut self) -> SyncdResult<()> {
        let mut missing = Vec::new();
        for vid in self.old_vid_to_rid.keys() {
            if !self.translated_vid_to_rid.contains_key(vid) {
                missing.push(*vid);
            }
        }

        if !missing.is_empty() {
            for vid in &missing {
                tracing::error!("vid not translated: {vid}");
            }
            return Err(SyncdError::CorruptedView(format!(
                "{} vids were not translated during replay",
                missing.len()
            )));
        }

        self.store.del(VIDTORID);
        self.store.del(RIDTOVID);
        for (vid, rid) in &self.translated_vid_to_rid {
            self.store.hset(VIDTORID, &vid.to_string(), &rid.to_string());
            self.store.hset(RIDTOVID, &rid.to_string(), &vid.to_string());
        }
        self.translator.clear_local();

        // discovered objects absent from the replayed state were removed by
        // the user; take them out of the ASIC too, members before their
        // containers
        let Some(sw) = self.switch.as_mut() else {
            return Ok(());
        };

        let passes = [
            Some(ObjectType::VlanMember),
            Some(ObjectType::StpPort),
            Some(ObjectType::BridgePort),
            None,
        ];

        for pass in passes {
            let stale: Vec<ObjectId> = sw
                .existing_objects()
                .iter()
                .copied()
                .filter(|rid| !self.translated_rid_to_vid.contains_key(rid))
                .filter(|rid| match pass {
                    Some(ot) => rid.object_type() == Some(ot),
                    None => true,
                })
                .collect();

            for rid in stale {
                info!("removing stale discovered object {rid}");
                sw.remove_existing_object(self.api, rid)?;
            }
        }

        Ok(())
    }
}
