// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The view transition algorithm.
//!
//! Given the currently programmed view and the desired temporary view, the
//! reconciler classifies every object, decides update-in-place versus
//! remove-and-recreate versus bring-to-default, and emits the ordered ASIC
//! operations into the current view. Everything here runs dry: no driver
//! call happens until the executor replays the emitted operations.

use std::collections::HashSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use syncd_sai::{
    metadata, AttrMetadata, AttrValue, Attribute, DefaultKind, ObjectId, ObjectType,
};
use tracing::{debug, info};

use crate::context::Context;
use crate::error::{SyncdError, SyncdResult};
use crate::matcher;
use crate::switch::SaiSwitch;
use crate::view::{AsicView, ObjIdx, ObjectStatus, ViewObject};

/// Why a current object cannot be updated in place to its temporary
/// counterpart. Not an error: it routes processing to the remove-and-create
/// path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecreateReason {
    /// A create-only attribute differs between the views.
    CreateOnlyMismatch(&'static str),
    /// The temporary object carries an attribute that cannot be set on the
    /// current one.
    MissingAttrNotSettable(&'static str),
    /// A mandatory-on-create or conditional attribute is present on the
    /// current object only.
    MandatoryAttrPresent(&'static str),
    /// The current object has an extra attribute with no computable
    /// default.
    NoDefaultAvailable(&'static str),
    /// The extra attribute is create-only and differs from its default.
    CreateOnlyDefaultMismatch(&'static str),
}

/// Outcome of the dry transition pass.
pub type TransitionOutcome = Result<(), RecreateReason>;

/// Object types the producer habitually leaves unreferenced; they are
/// removed eagerly, in this order, before the generic removal loop.
const DESTRUCTIVE_REMOVE_ORDER: [ObjectType; 3] = [
    ObjectType::VlanMember,
    ObjectType::StpPort,
    ObjectType::BridgePort,
];

pub struct Reconciler<'a> {
    current: &'a mut AsicView,
    temp: &'a mut AsicView,
    inventory: &'a SaiSwitch,
    rng: StdRng,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        ctx: &Arc<Context>,
        current: &'a mut AsicView,
        temp: &'a mut AsicView,
        inventory: &'a SaiSwitch,
    ) -> Self {
        Self {
            current,
            temp,
            inventory,
            rng: StdRng::seed_from_u64(ctx.parameters.compare_seed),
        }
    }

    /// Run the full reconciliation. On success every object in both views is
    /// `Final` and the current view holds the operations to execute.
    ///
    /// `init_view_removed` carries vids the producer removed while the
    /// temporary view was being collected; the populate step must not
    /// resurrect them.
    pub fn reconcile(&mut self, init_view_removed: &HashSet<ObjectId>) -> SyncdResult<()> {
        matcher::match_oids(self.current, self.temp);
        self.populate_existing_objects(init_view_removed)?;

        self.check_switch()?;
        self.check_matched_ports()?;

        self.process_all()?;

        self.bring_default_trap_group_to_final()?;
        self.destructive_removes()?;
        self.remove_until_fixed_point()?;

        self.check_all_final()?;
        self.check_map_sizes()?;

        info!(
            "reconciliation done, {} operations emitted",
            self.current.operation_count()
        );

        Ok(())
    }

    /// Default-created objects absent from the temporary view are injected
    /// into it as empty matched objects: the id maps of both views must
    /// describe the same objects after APPLY, and the daemon keeps relying
    /// on the defaults existing.
    fn populate_existing_objects(
        &mut self,
        init_view_removed: &HashSet<ObjectId>,
    ) -> SyncdResult<()> {
        if self.temp.objects_by_type(ObjectType::Switch).is_empty() {
            info!("no switch in temporary view, skipping populate");
            return Ok(());
        }

        for &rid in self.inventory.existing_objects() {
            if rid.is_null() || self.temp.has_rid(rid) {
                continue;
            }

            let vid = *self.current.rid_to_vid.get(&rid).ok_or_else(|| {
                SyncdError::CorruptedView(format!("existing rid {rid} unknown to current view"))
            })?;

            if init_view_removed.contains(&vid) {
                // removed while collecting the view; the removal loop will
                // take it out of the current view as well
                continue;
            }

            let temp_idx = self.temp.create_dummy_existing_object(rid, vid)?;
            self.temp.obj_mut(temp_idx).status = ObjectStatus::Matched;

            let current_idx = self.current.lookup_oid(vid).ok_or_else(|| {
                SyncdError::CorruptedView(format!("existing vid {vid} not in current view"))
            })?;
            self.current.obj_mut(current_idx).status = ObjectStatus::Matched;

            debug!("populated existing rid {rid} vid {vid}");
        }

        Ok(())
    }

    fn check_switch(&self) -> SyncdResult<()> {
        let current = self.current.objects_by_type(ObjectType::Switch);
        let temp = self.temp.objects_by_type(ObjectType::Switch);

        match (current.as_slice(), temp.as_slice()) {
            ([], []) => Ok(()),
            ([c], [t]) => {
                let c = self.current.obj(*c);
                let t = self.temp.obj(*t);

                if c.vid() != t.vid() {
                    return Err(SyncdError::SwitchMismatch(format!(
                        "vid differs: current {} vs temporary {}",
                        c.vid(),
                        t.vid()
                    )));
                }

                let hw = |obj: &ViewObject| match obj.attr(metadata::SWITCH_HARDWARE_INFO) {
                    Some(attr) => attr.serialized_value(),
                    None => String::new(),
                };
                if hw(c) != hw(t) {
                    return Err(SyncdError::SwitchMismatch(format!(
                        "hardware info differs: '{}' vs '{}'",
                        hw(c),
                        hw(t)
                    )));
                }

                Ok(())
            }
            (c, t) => Err(SyncdError::SwitchMismatch(format!(
                "unsupported switch count: current {}, temporary {}",
                c.len(),
                t.len()
            ))),
        }
    }

    /// Ports are the anchor of the whole comparison; an unmatched port means
    /// id maps were lost or the port layout changed, neither of which can be
    /// reconciled here.
    fn check_matched_ports(&self) -> SyncdResult<()> {
        for idx in self.temp.objects_by_type(ObjectType::Port) {
            if self.temp.obj(idx).status != ObjectStatus::Matched {
                return Err(SyncdError::UnmatchedPort(self.temp.obj(idx).vid()));
            }
        }
        Ok(())
    }

    /// Process every temporary object. Routes go last, default routes
    /// before the rest: the driver requires the default route to exist
    /// before any other route.
    fn process_all(&mut self) -> SyncdResult<()> {
        let all = self.temp.all_objects();

        for &idx in &all {
            if self.temp.obj(idx).object_type != ObjectType::RouteEntry {
                self.process_object(idx)?;
            }
        }
        for &idx in &all {
            let obj = self.temp.obj(idx);
            if obj.object_type == ObjectType::RouteEntry && obj.key.is_default_route() {
                self.process_object(idx)?;
            }
        }
        for &idx in &all {
            let obj = self.temp.obj(idx);
            if obj.object_type == ObjectType::RouteEntry && !obj.key.is_default_route() {
                self.process_object(idx)?;
            }
        }
        Ok(())
    }

    /// Process one temporary object: settle every object it references,
    /// find its best current counterpart and either update it in place or
    /// recreate it.
    fn process_object(&mut self, temp_idx: ObjIdx) -> SyncdResult<()> {
        if self.temp.obj(temp_idx).status == ObjectStatus::Final {
            return Ok(());
        }

        // dependencies first: attribute references, then struct members
        let mut referenced: Vec<ObjectId> = self
            .temp
            .obj(temp_idx)
            .attrs
            .values()
            .flat_map(|attr| attr.oids())
            .collect();
        referenced.extend(self.temp.obj(temp_idx).key.member_oids());

        for vid in referenced {
            if vid.is_null() {
                continue;
            }
            let dep_idx = self
                .temp
                .lookup_oid(vid)
                .ok_or_else(|| SyncdError::ObjectNotFound(vid.to_string()))?;
            self.process_object(dep_idx)?;
        }

        let best = matcher::find_best_match(self.current, self.temp, temp_idx, &mut self.rng)?;

        let Some(current_idx) = best else {
            debug!(
                "no best match for {}, creating",
                self.temp.obj(temp_idx).serialized_key()
            );
            self.create_new_from_temp(temp_idx)?;
            return Ok(());
        };

        match self.transition(current_idx, temp_idx, false)? {
            Ok(()) => {
                let temp_obj = self.temp.obj(temp_idx);
                if temp_obj.is_oid_object() && temp_obj.status != ObjectStatus::Matched {
                    // the update below may reference this vid from the
                    // current view, start tracking it
                    let vid = temp_obj.vid();
                    self.current.insert_new_vid(vid)?;
                }

                self.transition(current_idx, temp_idx, true)?
                    .map_err(|reason| {
                        SyncdError::CorruptedView(format!(
                            "commit pass failed after dry pass passed: {reason:?}"
                        ))
                    })?;

                self.finalize_match(current_idx, temp_idx)
            }
            Err(reason) => {
                debug!(
                    "cannot update {} in place ({reason:?}), recreating",
                    self.temp.obj(temp_idx).serialized_key()
                );

                if self.temp.obj(temp_idx).object_type == ObjectType::Switch {
                    return Err(SyncdError::SwitchMismatch(
                        "switch cannot be recreated mid-apply".to_string(),
                    ));
                }

                // entries match by their struct key; two identical keys
                // cannot coexist, so the old one goes first
                if !self.temp.obj(temp_idx).is_oid_object() {
                    self.remove_or_default(current_idx)?;
                }

                self.create_new_from_temp(temp_idx)?;
                Ok(())
            }
        }
    }

    /// Both objects settled on a matched/updated disposition: make it final
    /// and record the shared real id in the temporary view's maps.
    fn finalize_match(&mut self, current_idx: ObjIdx, temp_idx: ObjIdx) -> SyncdResult<()> {
        let current_status = self.current.obj(current_idx).status;
        let temp_status = self.temp.obj(temp_idx).status;

        let both_not_processed = current_status == ObjectStatus::NotProcessed
            && temp_status == ObjectStatus::NotProcessed;
        let both_matched =
            current_status == ObjectStatus::Matched && temp_status == ObjectStatus::Matched;

        if !(both_not_processed || both_matched) {
            return Err(SyncdError::CorruptedView(format!(
                "unexpected status combination: current {current_status:?}, temporary {temp_status:?}"
            )));
        }

        self.current.obj_mut(current_idx).status = ObjectStatus::Final;
        self.temp.obj_mut(temp_idx).status = ObjectStatus::Final;

        if self.temp.obj(temp_idx).is_oid_object() {
            let temp_vid = self.temp.obj(temp_idx).vid();
            let current_vid = self.current.obj(current_idx).vid();

            let rid = *self.current.vid_to_rid.get(&current_vid).ok_or_else(|| {
                SyncdError::CorruptedView(format!("matched vid {current_vid} has no rid"))
            })?;

            debug!("remapped current vid {current_vid} to temporary vid {temp_vid} via {rid}");

            self.temp.rid_to_vid.insert(rid, temp_vid);
            self.temp.vid_to_rid.insert(temp_vid, rid);
        }

        Ok(())
    }

    /// Decide (and on the second pass perform) the attribute updates that
    /// turn `current_idx` into `temp_idx`.
    ///
    /// Two passes over the same logic: the dry pass proves every needed
    /// update is expressible as a set; only then does the commit pass emit
    /// them, so a half-updatable object is never half-updated.
    fn transition(
        &mut self,
        current_idx: ObjIdx,
        temp_idx: ObjIdx,
        commit: bool,
    ) -> SyncdResult<TransitionOutcome> {
        let mut processed: HashSet<&'static str> = HashSet::new();

        let temp_attrs: Vec<Attribute> =
            self.temp.obj(temp_idx).attrs.values().cloned().collect();
        let current_status = self.current.obj(current_idx).status;

        for temp_attr in temp_attrs {
            let meta = temp_attr.meta;
            processed.insert(meta.name);

            if self.current.obj(current_idx).has_attr(meta.name) {
                if matcher::equal_attribute(
                    self.current,
                    self.temp,
                    current_idx,
                    temp_idx,
                    meta.name,
                ) {
                    continue;
                }

                if meta.flags.create_and_set {
                    if commit {
                        self.set_attr_on_current(current_idx, temp_attr)?;
                    }
                    continue;
                }

                if current_status == ObjectStatus::Matched {
                    // matched objects share the real id, a differing
                    // create-only value means the database lies
                    return Err(SyncdError::CorruptedView(format!(
                        "create-only {} differs on matched object {}",
                        meta.name,
                        self.temp.obj(temp_idx).serialized_key()
                    )));
                }

                return Ok(Err(RecreateReason::CreateOnlyMismatch(meta.name)));
            }

            // attribute exists only on the temporary object
            if meta.flags.create_and_set && !meta.is_conditional {
                if commit {
                    self.set_attr_on_current(current_idx, temp_attr)?;
                }
                continue;
            }

            if current_status == ObjectStatus::Matched && meta.flags.create_only {
                // snooped create-only attribute; it cannot be set on a
                // matched object and its value is already the object's
                debug!("skipping create-only {} on matched object", meta.name);
                continue;
            }

            return Ok(Err(RecreateReason::MissingAttrNotSettable(meta.name)));
        }

        // current object may carry extra attributes; bring each to its
        // default or give up on in-place update
        let current_attrs: Vec<Attribute> = self
            .current
            .obj(current_idx)
            .attrs
            .values()
            .cloned()
            .collect();

        for current_attr in current_attrs {
            let meta = current_attr.meta;
            if processed.contains(meta.name) {
                continue;
            }

            if meta.is_conditional || meta.flags.mandatory_on_create {
                if current_status == ObjectStatus::Matched && meta.flags.create_and_set {
                    // recoverable only from the discovery snapshot
                    if let Some(default) = self.snapshot_default(current_idx, meta)? {
                        if commit {
                            self.set_attr_on_current(current_idx, default)?;
                        }
                        continue;
                    }
                    return Ok(Err(RecreateReason::NoDefaultAvailable(meta.name)));
                }

                if current_status == ObjectStatus::Matched && meta.flags.create_only {
                    debug!("skipping create-only {} on matched object", meta.name);
                    continue;
                }

                return Ok(Err(RecreateReason::MandatoryAttrPresent(meta.name)));
            }

            if meta.flags.create_and_set || meta.flags.create_only {
                let Some(default) = self.default_value_for(meta)? else {
                    return Ok(Err(RecreateReason::NoDefaultAvailable(meta.name)));
                };

                if current_attr.value == default.value {
                    continue;
                }

                if meta.flags.create_only {
                    return Ok(Err(RecreateReason::CreateOnlyDefaultMismatch(meta.name)));
                }

                if commit {
                    self.set_attr_on_current(current_idx, default)?;
                }
                continue;
            }

            return Err(SyncdError::CorruptedView(format!(
                "attribute {} with unexpected flags in view",
                meta.name
            )));
        }

        Ok(Ok(()))
    }

    /// Clone the temporary object into the current view, rewriting ids into
    /// current space, and emit the create.
    fn create_new_from_temp(&mut self, temp_idx: ObjIdx) -> SyncdResult<()> {
        // mark the temporary object first so self references translate as
        // created-object passthrough
        self.temp.obj_mut(temp_idx).created = true;
        let temp_obj = self.temp.obj(temp_idx).clone();

        let key = temp_obj
            .key
            .try_map_member_oids(&mut |vid| self.translate_temp_vid_to_current(vid))?;

        let mut new_obj = ViewObject::new(temp_obj.object_type, key);
        for attr in temp_obj.attrs.values() {
            let translated = Attribute::new(
                attr.meta,
                attr.value
                    .try_map_oids(&mut |vid| self.translate_temp_vid_to_current(vid))?,
            );
            new_obj.attrs.insert(translated.name(), translated);
        }

        // no real id yet; the shared vid is how executor translation finds
        // this object across views until the create returns one
        new_obj.created = true;
        new_obj.status = ObjectStatus::Final;

        self.temp.obj_mut(temp_idx).status = ObjectStatus::Final;

        self.current.asic_create_object(new_obj)?;
        Ok(())
    }

    /// Current object has no place in the desired view: remove it, or bring
    /// it back to defaults when the hardware will not let go of it.
    pub(crate) fn remove_or_default(&mut self, current_idx: ObjIdx) -> SyncdResult<()> {
        let obj = self.current.obj(current_idx);

        if obj.is_oid_object() {
            let count = self.current.reference_count(obj.vid()).unwrap_or(0);
            if count != 0 {
                // dependency removal order was violated, engine bug
                return Err(SyncdError::RemoveWhileReferenced {
                    key: obj.serialized_key(),
                    count,
                });
            }
        }

        if obj.object_type == ObjectType::Switch {
            return Err(SyncdError::SwitchRemoval);
        }

        if self.is_non_removable(current_idx)? {
            self.bring_to_default(current_idx)?;
        } else {
            self.current.asic_remove_object(current_idx)?;
            self.current.obj_mut(current_idx).status = ObjectStatus::Removed;
        }

        Ok(())
    }

    fn is_non_removable(&self, current_idx: ObjIdx) -> SyncdResult<bool> {
        let obj = self.current.obj(current_idx);

        if !obj.is_oid_object() {
            // entries are leaves, always removable
            return Ok(false);
        }

        let vid = obj.vid();
        let rid = self
            .current
            .vid_to_rid
            .get(&vid)
            .ok_or(SyncdError::UnresolvedVid(vid))?;

        Ok(self.inventory.is_non_removable_rid(*rid))
    }

    /// Reset every attribute of a non-removable object whose value differs
    /// from its default.
    fn bring_to_default(&mut self, current_idx: ObjIdx) -> SyncdResult<()> {
        let attrs: Vec<Attribute> = self
            .current
            .obj(current_idx)
            .attrs
            .values()
            .cloned()
            .collect();

        for attr in attrs {
            let meta = attr.meta;

            if !meta.flags.create_and_set {
                return Err(SyncdError::CorruptedView(format!(
                    "non-settable {} present on object being defaulted",
                    meta.name
                )));
            }
            if meta.default == DefaultKind::None {
                return Err(SyncdError::CorruptedView(format!(
                    "{} has no default value descriptor",
                    meta.name
                )));
            }

            let default = self
                .default_value_for(meta)?
                .ok_or(SyncdError::NoDefaultAvailable(meta.name))?;

            if attr.value == default.value {
                continue;
            }

            self.current.asic_set_attribute(current_idx, default)?;
        }

        self.current.obj_mut(current_idx).status = ObjectStatus::Final;
        Ok(())
    }

    /// Compute the default value of an attribute against the current view.
    pub(crate) fn default_value_for(
        &self,
        meta: &'static AttrMetadata,
    ) -> SyncdResult<Option<Attribute>> {
        if meta.object_type == ObjectType::Switch && meta.name == metadata::SWITCH_SRC_MAC_ADDRESS
        {
            // assigned by the vendor, captured at discovery
            return Ok(Some(Attribute::new(
                meta,
                AttrValue::Mac(self.inventory.default_mac()),
            )));
        }

        match &meta.default {
            DefaultKind::EmptyList => {
                Ok(meta.value_type.empty_list_value().map(|v| Attribute::new(meta, v)))
            }
            DefaultKind::Const(value) => Ok(Some(Attribute::new(meta, value.clone()))),
            DefaultKind::AttrValue(ObjectType::Switch, attr_name) => {
                if *attr_name == metadata::SWITCH_SRC_MAC_ADDRESS {
                    return Ok(Some(Attribute::new(
                        meta,
                        AttrValue::Mac(self.inventory.default_mac()),
                    )));
                }

                let Some(rid) = self.inventory.switch_default_attr_oid(attr_name) else {
                    debug!("no internal default recorded for {attr_name}");
                    return Ok(None);
                };
                let vid = self.current.rid_to_vid.get(&rid).ok_or_else(|| {
                    SyncdError::CorruptedView(format!(
                        "default rid {rid} of {attr_name} not in current view"
                    ))
                })?;
                Ok(Some(Attribute::new(meta, AttrValue::Oid(*vid))))
            }
            DefaultKind::AttrValue(..) | DefaultKind::SwitchInternal | DefaultKind::None => {
                Ok(None)
            }
        }
    }

    /// Default recovered from the inventory's discovery-time snapshot, for
    /// mandatory-on-create attributes that are still settable (scheduler
    /// profile of a scheduler group and friends). `None` when the snapshot
    /// has no entry for this (object, attribute).
    fn snapshot_default(
        &self,
        current_idx: ObjIdx,
        meta: &'static AttrMetadata,
    ) -> SyncdResult<Option<Attribute>> {
        if meta.value_type != syncd_sai::AttrValueType::Oid {
            return Ok(None);
        }

        let vid = self.current.obj(current_idx).vid();
        let Some(rid) = self.current.vid_to_rid.get(&vid) else {
            return Ok(None);
        };

        let Some(snapshot_rid) = self.inventory.snapshot_oid(*rid, meta.name) else {
            return Ok(None);
        };

        // the snapshotted target may itself have been removed by now; null
        // is the only value left to set then
        let default_vid = if !snapshot_rid.is_null() && self.current.has_rid(snapshot_rid) {
            *self
                .current
                .rid_to_vid
                .get(&snapshot_rid)
                .expect("has_rid implies mapping")
        } else {
            ObjectId::NULL
        };

        Ok(Some(Attribute::new(meta, AttrValue::Oid(default_vid))))
    }

    /// Set an attribute on a current object, first rewriting any temporary
    /// vids it carries into current space so reference tracking stays in one
    /// id space.
    fn set_attr_on_current(&mut self, current_idx: ObjIdx, attr: Attribute) -> SyncdResult<()> {
        if !attr.meta.flags.create_and_set {
            return Err(SyncdError::CorruptedView(format!(
                "attempted set of non-settable {}",
                attr.meta.name
            )));
        }

        let translated = Attribute::new(
            attr.meta,
            attr.value
                .try_map_oids(&mut |vid| self.translate_temp_vid_to_current(vid))?,
        );

        self.current.asic_set_attribute(current_idx, translated)
    }

    /// Translate a temporary vid to the corresponding current vid through
    /// the shared real id. Vids of created objects pass through unchanged:
    /// both views use the same vid for them until a real id exists.
    fn translate_temp_vid_to_current(&self, temp_vid: ObjectId) -> SyncdResult<ObjectId> {
        if temp_vid.is_null() {
            return Ok(ObjectId::NULL);
        }

        match self.temp.vid_to_rid.get(&temp_vid) {
            Some(rid) => self
                .current
                .rid_to_vid
                .get(rid)
                .copied()
                .ok_or(SyncdError::UnresolvedRid(*rid)),
            None => {
                let idx = self
                    .temp
                    .lookup_oid(temp_vid)
                    .ok_or_else(|| SyncdError::ObjectNotFound(temp_vid.to_string()))?;
                if self.temp.obj(idx).created {
                    Ok(temp_vid)
                } else {
                    Err(SyncdError::UnresolvedVid(temp_vid))
                }
            }
        }
    }

    /// The default trap group cannot be removed, and traps being reset to it
    /// keep its reference count up, so the removal loop never touches it.
    /// When the desired view does not mention it, reset it explicitly.
    fn bring_default_trap_group_to_final(&mut self) -> SyncdResult<()> {
        let Some(rid) = self
            .inventory
            .switch_default_attr_oid(metadata::SWITCH_DEFAULT_TRAP_GROUP)
        else {
            return Ok(());
        };

        if self.temp.has_rid(rid) {
            // defined in the temporary view, matched by rid, nothing to do
            return Ok(());
        }

        let vid = *self.current.rid_to_vid.get(&rid).ok_or_else(|| {
            SyncdError::CorruptedView(format!("default trap group rid {rid} not in current view"))
        })?;
        let idx = self.current.lookup_oid(vid).ok_or_else(|| {
            SyncdError::CorruptedView(format!("default trap group vid {vid} not in current view"))
        })?;

        if self.current.obj(idx).status != ObjectStatus::NotProcessed {
            return Ok(());
        }

        self.bring_to_default(idx)
    }

    fn destructive_removes(&mut self) -> SyncdResult<()> {
        for object_type in DESTRUCTIVE_REMOVE_ORDER {
            for idx in self.current.not_processed_by_type(object_type) {
                if self.current.reference_count(self.current.obj(idx).vid()) == Some(0) {
                    self.remove_or_default(idx)?;
                }
            }
        }
        Ok(())
    }

    /// Removal has to start at leaves; each pass can free references for the
    /// next one, so iterate until a pass removes nothing.
    fn remove_until_fixed_point(&mut self) -> SyncdResult<()> {
        loop {
            let mut removed = 0usize;

            for idx in self.current.all_not_processed() {
                let obj = self.current.obj(idx);

                if obj.is_oid_object() {
                    if self.current.reference_count(obj.vid()) == Some(0) {
                        self.remove_or_default(idx)?;
                        removed += 1;
                    }
                } else {
                    // entries hold references, nothing references them
                    self.remove_or_default(idx)?;
                    removed += 1;
                }
            }

            if removed == 0 {
                return Ok(());
            }
            debug!("removal pass removed {removed} objects");
        }
    }

    fn check_all_final(&self) -> SyncdResult<()> {
        let mut unprocessed = 0usize;

        for view in [&self.current, &self.temp] {
            for idx in view.all_objects() {
                let obj = view.obj(idx);
                if obj.status != ObjectStatus::Final {
                    tracing::error!(
                        "object was not processed: {} (status {:?})",
                        obj.serialized_key(),
                        obj.status
                    );
                    unprocessed += 1;
                }
            }
        }

        if unprocessed > 0 {
            return Err(SyncdError::UnprocessedObjects(unprocessed));
        }
        Ok(())
    }

    /// Both views now describe the same set of objects; their id maps and
    /// object counts must agree exactly.
    fn check_map_sizes(&self) -> SyncdResult<()> {
        if self.current.rid_to_vid.len() != self.temp.rid_to_vid.len()
            || self.current.vid_to_rid.len() != self.temp.vid_to_rid.len()
        {
            return Err(SyncdError::ViewSizeMismatch {
                current: self.current.rid_to_vid.len(),
                temporary: self.temp.rid_to_vid.len(),
            });
        }

        if self.current.len() != self.temp.len() {
            return Err(SyncdError::ViewSizeMismatch {
                current: self.current.len(),
                temporary: self.temp.len(),
            });
        }

        Ok(())
    }
}
