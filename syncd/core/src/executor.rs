// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Replays the reconciler's emitted operations against the driver.
//!
//! Creating before removing keeps data-plane disruption minimal, but ASIC
//! resources are finite; the remove-hoist pass moves each remove as early
//! as its dependencies allow, right after the operation that dropped the
//! target's reference count to zero.

use syncd_sai::{metadata, Attribute, ObjectId, ObjectKey, ObjectType, SaiApi, SaiStatus};
use tracing::{debug, info, warn};

use crate::error::{SyncdError, SyncdResult};
use crate::store::{self, StateStore, ASIC_STATE_TABLE, RIDTOVID, TEMP_PREFIX, VIDTORID};
use crate::switch::SaiSwitch;
use crate::view::{AsicOp, AsicOpKind, AsicView};

/// (object type, attribute) sets whose driver failure is tolerated. Some
/// vendors cannot program the switch source MAC yet accept the rest of the
/// configuration.
const SET_FAILURE_WORKAROUNDS: [(ObjectType, &str); 1] =
    [(ObjectType::Switch, metadata::SWITCH_SRC_MAC_ADDRESS)];

fn is_set_workaround(object_type: ObjectType, attr_name: &str) -> bool {
    SET_FAILURE_WORKAROUNDS
        .iter()
        .any(|(ot, name)| *ot == object_type && *name == attr_name)
}

/// Reorder the current view's operations so that removes run as early as
/// their dependencies allow.
///
/// Entry removes stay first in their original relative order. Other
/// operations keep their order; each OID remove is inserted either at the
/// earliest open slot (nothing ever referenced it) or right after the
/// operation that last dropped its target's reference count to zero.
pub fn hoisted_operations(view: &AsicView) -> SyncdResult<Vec<AsicOp>> {
    let (entry_removes, ops) = view.operations();

    let mut out: Vec<AsicOp> = entry_removes.to_vec();
    // end of the front region: entry removes plus removes of never
    // referenced vids
    let mut cursor = out.len();
    let mut moved = 0usize;

    for op in ops {
        if !op.is_remove() {
            out.push(op.clone());
            continue;
        }

        let vid = op.vid().ok_or_else(|| {
            SyncdError::CorruptedView("entry remove on the generic operation list".to_string())
        })?;

        let Some(decref_id) = view.last_decref_op(vid) else {
            // nothing ever dropped a reference to this vid, the remove can
            // go all the way up
            out.insert(cursor, op.clone());
            cursor += 1;
            moved += 1;
            continue;
        };

        // the operation that freed the target always precedes this remove
        // in emission order, so it is already placed
        let position = out
            .iter()
            .position(|candidate| candidate.id == decref_id)
            .ok_or_else(|| {
                SyncdError::CorruptedView(format!(
                    "operation {decref_id} that freed vid {vid} is missing from the schedule"
                ))
            })?;

        out.insert(position + 1, op.clone());
        moved += 1;
    }

    info!("hoisted {moved} remove operations of {} total", out.len());

    Ok(out)
}

pub struct Executor<'a> {
    api: &'a dyn SaiApi,
    current: &'a mut AsicView,
    temp: &'a mut AsicView,
    inventory: &'a mut SaiSwitch,
}

impl<'a> Executor<'a> {
    pub fn new(
        api: &'a dyn SaiApi,
        current: &'a mut AsicView,
        temp: &'a mut AsicView,
        inventory: &'a mut SaiSwitch,
    ) -> Self {
        Self {
            api,
            current,
            temp,
            inventory,
        }
    }

    /// Execute every emitted operation in hoisted order. Any driver failure
    /// other than the whitelisted set workarounds is fatal: the maps no
    /// longer match the hardware and the caller must terminate the process.
    pub fn execute(&mut self) -> SyncdResult<usize> {
        let ops = hoisted_operations(self.current)?;

        info!("operations to execute on ASIC: {}", ops.len());

        for op in &ops {
            self.execute_one(op)?;
        }

        Ok(ops.len())
    }

    fn execute_one(&mut self, op: &AsicOp) -> SyncdResult<()> {
        debug!("executing {:?} {}", op.kind, op.key.serialize());

        match (&op.kind, &op.key) {
            (AsicOpKind::Create { attrs }, ObjectKey::Oid(vid)) => {
                self.create_oid_object(op, *vid, attrs)
            }
            (AsicOpKind::Create { attrs }, _) => {
                let key = self.translate_entry_key(&op.key)?;
                let attrs = self.translate_attrs(attrs)?;
                self.api
                    .create_entry(&key, &attrs)
                    .map_err(|status| self.fatal(op, status))
            }
            (AsicOpKind::Set { attr }, ObjectKey::Oid(vid)) => {
                let rid = self.translate_vid(*vid)?;
                let attr = self.translate_attr(attr)?;
                match self.api.set_object_attribute(op.object_type, rid, &attr) {
                    Ok(()) => Ok(()),
                    Err(status) if is_set_workaround(op.object_type, attr.name()) => {
                        warn!(
                            "ignoring {status} setting {} on {}, known driver limitation",
                            attr.name(),
                            op.object_type
                        );
                        Ok(())
                    }
                    Err(status) => Err(self.fatal(op, status)),
                }
            }
            (AsicOpKind::Set { attr }, _) => {
                let key = self.translate_entry_key(&op.key)?;
                let attr = self.translate_attr(attr)?;
                self.api
                    .set_entry_attribute(&key, &attr)
                    .map_err(|status| self.fatal(op, status))
            }
            (AsicOpKind::Remove, ObjectKey::Oid(vid)) => {
                let rid = self.translate_vid(*vid)?;

                // the pair served its last translation just now
                self.current.removed_vid_to_rid.remove(vid);

                self.api
                    .remove_object(op.object_type, rid)
                    .map_err(|status| self.fatal(op, status))?;

                if self.inventory.is_default_created_rid(rid) {
                    // gone from the ASIC, must not resurface as an existing
                    // object on the next apply
                    self.inventory.remove_existing_object_reference(rid)?;
                }

                Ok(())
            }
            (AsicOpKind::Remove, _) => {
                let key = self.translate_entry_key(&op.key)?;
                self.api
                    .remove_entry(&key)
                    .map_err(|status| self.fatal(op, status))
            }
        }
    }

    fn create_oid_object(
        &mut self,
        op: &AsicOp,
        vid: ObjectId,
        attrs: &[Attribute],
    ) -> SyncdResult<()> {
        let switch_rid = if op.object_type == ObjectType::Switch {
            ObjectId::NULL
        } else {
            let switch_vid = vid.switch_id()?;
            self.translate_vid(switch_vid)?
        };

        let attrs = self.translate_attrs(attrs)?;

        let rid = self
            .api
            .create_object(op.object_type, switch_rid, &attrs)
            .map_err(|status| self.fatal(op, status))?;

        debug!("created {} vid {vid} rid {rid}", op.object_type);

        // record the fresh pair in both views so later operations and the
        // final persist see it
        self.current.rid_to_vid.insert(rid, vid);
        self.current.vid_to_rid.insert(vid, rid);
        self.temp.rid_to_vid.insert(rid, vid);
        self.temp.vid_to_rid.insert(vid, rid);

        Ok(())
    }

    /// Executor-phase translation: live map first, then the removed shadow,
    /// since a remove's target left the live map when the reconciler
    /// processed it.
    fn translate_vid(&self, vid: ObjectId) -> SyncdResult<ObjectId> {
        if vid.is_null() {
            return Ok(ObjectId::NULL);
        }

        self.current
            .vid_to_rid
            .get(&vid)
            .or_else(|| self.current.removed_vid_to_rid.get(&vid))
            .copied()
            .ok_or(SyncdError::UnresolvedVid(vid))
    }

    fn translate_attr(&self, attr: &Attribute) -> SyncdResult<Attribute> {
        Ok(Attribute::new(
            attr.meta,
            attr.value.try_map_oids(&mut |vid| self.translate_vid(vid))?,
        ))
    }

    fn translate_attrs(&self, attrs: &[Attribute]) -> SyncdResult<Vec<Attribute>> {
        attrs.iter().map(|attr| self.translate_attr(attr)).collect()
    }

    fn translate_entry_key(&self, key: &ObjectKey) -> SyncdResult<ObjectKey> {
        key.try_map_member_oids(&mut |vid| self.translate_vid(vid))
    }

    fn fatal(&self, op: &AsicOp, status: SaiStatus) -> SyncdError {
        SyncdError::Driver {
            operation: format!("{:?} {}", op.kind, op.key.serialize()),
            status,
        }
    }
}

/// After a successful execution the persistent state is rewritten: the
/// applied-view table becomes the serialized temporary view, the temporary
/// table is cleared, and the id maps are rebuilt from the temporary view's
/// final maps.
pub fn persist_applied_view(store: &dyn StateStore, temp: &AsicView) {
    store::clear_table(store, ASIC_STATE_TABLE);
    store::clear_table(store, &format!("{TEMP_PREFIX}{ASIC_STATE_TABLE}"));

    for idx in temp.all_objects() {
        let obj = temp.obj(idx);
        let key = store::object_key(ASIC_STATE_TABLE, obj.object_type, &obj.serialized_key());

        if obj.attrs.is_empty() {
            store.hset(&key, "NULL", "NULL");
        } else {
            for attr in obj.attrs.values() {
                store.hset(&key, attr.name(), &attr.serialized_value());
            }
        }
    }

    store.del(VIDTORID);
    store.del(RIDTOVID);
    for (rid, vid) in &temp.rid_to_vid {
        store.hset(VIDTORID, &vid.to_string(), &rid.to_string());
        store.hset(RIDTOVID, &rid.to_string(), &vid.to_string());
    }

    info!("persisted applied view: {} objects", temp.len());
}
