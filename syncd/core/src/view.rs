// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! In-memory view of the programmed (or desired) ASIC state.
//!
//! A view is a graph of objects and the attribute links between them, plus
//! the ordered list of ASIC operations produced while reconciling it.
//! Objects live in an arena and are addressed by index; the hash indexes
//! only track live objects.

use std::collections::{BTreeMap, HashMap};

use syncd_sai::{Attribute, ObjectId, ObjectKey, ObjectType};
use tracing::debug;

use crate::error::{SyncdError, SyncdResult};
use crate::store::{self, StateStore};

/// Index of an object inside its view's arena. Never reused within one
/// view's lifetime.
pub type ObjIdx = usize;

/// Object status during view comparison.
///
/// Transitions form a DAG: `NotProcessed -> {Matched, Final, Removed}` and
/// `Matched -> Final`; `Final` and `Removed` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectStatus {
    /// Not looked at yet; the load state.
    NotProcessed,
    /// Paired with the other view's object carrying the same virtual id.
    /// Attributes may still differ and need processing.
    Matched,
    /// Removed by the reconciler; only current-view objects get here.
    Removed,
    /// Disposition committed; nothing further will happen to this object.
    Final,
}

/// One object inside a view.
#[derive(Clone, Debug)]
pub struct ViewObject {
    pub object_type: ObjectType,
    pub key: ObjectKey,
    pub attrs: BTreeMap<&'static str, Attribute>,
    pub status: ObjectStatus,
    /// Object was produced by reconciliation and has no real id yet.
    pub created: bool,
}

impl ViewObject {
    pub fn new(object_type: ObjectType, key: ObjectKey) -> Self {
        Self {
            object_type,
            key,
            attrs: BTreeMap::new(),
            status: ObjectStatus::NotProcessed,
            created: false,
        }
    }

    pub fn is_oid_object(&self) -> bool {
        self.key.is_oid()
    }

    /// The object's own virtual id; panics on entry objects, callers check
    /// `is_oid_object` first the same way the view indexes do.
    pub fn vid(&self) -> ObjectId {
        self.key.oid().expect("oid object")
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    pub fn attr(&self, name: &str) -> Option<&Attribute> {
        self.attrs.get(name)
    }

    pub fn serialized_key(&self) -> String {
        self.key.serialize()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AsicOpKind {
    Create { attrs: Vec<Attribute> },
    Set { attr: Attribute },
    Remove,
}

/// One emitted ASIC operation, in virtual id space.
#[derive(Clone, Debug)]
pub struct AsicOp {
    pub id: u64,
    pub object_type: ObjectType,
    pub key: ObjectKey,
    pub kind: AsicOpKind,
}

impl AsicOp {
    pub fn is_remove(&self) -> bool {
        matches!(self.kind, AsicOpKind::Remove)
    }

    /// Virtual id of the target for OID objects.
    pub fn vid(&self) -> Option<ObjectId> {
        self.key.oid()
    }
}

#[derive(Default)]
pub struct AsicView {
    objects: Vec<ViewObject>,
    /// serialized key -> index, live objects only
    by_key: HashMap<String, ObjIdx>,
    /// per-type key index, live objects only; BTreeMap keeps processing
    /// order deterministic
    by_type: BTreeMap<ObjectType, BTreeMap<String, ObjIdx>>,
    /// own-vid -> index for live OID objects
    by_oid: HashMap<ObjectId, ObjIdx>,

    /// vid -> reference count from attributes and entry struct members
    refs: BTreeMap<ObjectId, i64>,

    pub rid_to_vid: BTreeMap<ObjectId, ObjectId>,
    pub vid_to_rid: BTreeMap<ObjectId, ObjectId>,
    /// Pairs of removed objects, still consulted by executor translation.
    pub removed_vid_to_rid: BTreeMap<ObjectId, ObjectId>,

    op_id: u64,
    /// vid -> id of the last operation that dropped its refcount to zero
    last_decref_op: BTreeMap<ObjectId, u64>,

    ops: Vec<AsicOp>,
    /// Entry removes go to a front queue: removing e.g. the last group
    /// member fails while a route still uses the group, so entry removes
    /// must run before everything else.
    entry_remove_ops: Vec<AsicOp>,
}

impl AsicView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate the view from a dump of a view table: rows of
    /// (`TYPE:serialized_id`, fields).
    pub fn from_dump(rows: Vec<(String, Vec<(String, String)>)>) -> SyncdResult<Self> {
        let mut view = AsicView::new();

        for (key, fields) in rows {
            let (str_type, str_id) = key
                .split_once(':')
                .ok_or_else(|| SyncdError::ObjectNotFound(key.clone()))?;

            let object_type: ObjectType = str_type
                .parse()
                .map_err(|_| SyncdError::ObjectNotFound(key.clone()))?;
            let object_key = ObjectKey::parse(object_type, str_id)?;

            let mut obj = ViewObject::new(object_type, object_key);
            for (field, value) in &fields {
                if field == "NULL" {
                    // placeholder row for an object with no attributes
                    continue;
                }
                let attr = Attribute::parse(object_type, field, value)?;
                obj.attrs.insert(attr.name(), attr);
            }

            view.insert_loaded_object(obj)?;
        }

        Ok(view)
    }

    /// Load a view from a persisted table.
    pub fn load(store: &dyn StateStore, table: &str) -> SyncdResult<Self> {
        let mut rows = Vec::new();
        for key in store.keys(&format!("{table}:")) {
            let (object_type, id) = store::split_object_key(table, &key)
                .ok_or_else(|| SyncdError::ObjectNotFound(key.clone()))?;
            rows.push((format!("{object_type}:{id}"), store.hgetall(&key)));
        }

        let view = Self::from_dump(rows)?;
        debug!("loaded {} objects from {table}", view.len());
        Ok(view)
    }

    fn insert_loaded_object(&mut self, obj: ViewObject) -> SyncdResult<ObjIdx> {
        // loaded attributes reference other vids, account for every link
        for attr in obj.attrs.values() {
            for vid in attr.oids() {
                if !vid.is_null() {
                    *self.refs.entry(vid).or_insert(0) += 1;
                }
            }
        }

        if obj.is_oid_object() {
            // declare the vid itself; attributes elsewhere may already have
            // pushed the count above zero
            self.refs.entry(obj.vid()).or_insert(0);
        } else {
            for vid in obj.key.member_oids() {
                *self.refs.entry(vid).or_insert(0) += 1;
            }
        }

        Ok(self.index_object(obj))
    }

    fn index_object(&mut self, obj: ViewObject) -> ObjIdx {
        let idx = self.objects.len();
        let serialized = obj.serialized_key();

        if let Some(vid) = obj.key.oid() {
            self.by_oid.insert(vid, idx);
        }
        self.by_type
            .entry(obj.object_type)
            .or_default()
            .insert(serialized.clone(), idx);
        self.by_key.insert(serialized, idx);
        self.objects.push(obj);
        idx
    }

    fn unindex_object(&mut self, idx: ObjIdx) {
        let serialized = self.objects[idx].serialized_key();
        let object_type = self.objects[idx].object_type;

        if let Some(vid) = self.objects[idx].key.oid() {
            self.by_oid.remove(&vid);
        }
        if let Some(per_type) = self.by_type.get_mut(&object_type) {
            per_type.remove(&serialized);
        }
        self.by_key.remove(&serialized);
    }

    pub fn obj(&self, idx: ObjIdx) -> &ViewObject {
        &self.objects[idx]
    }

    pub fn obj_mut(&mut self, idx: ObjIdx) -> &mut ViewObject {
        &mut self.objects[idx]
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn lookup_key(&self, serialized: &str) -> Option<ObjIdx> {
        self.by_key.get(serialized).copied()
    }

    pub fn lookup_oid(&self, vid: ObjectId) -> Option<ObjIdx> {
        self.by_oid.get(&vid).copied()
    }

    /// Live objects of one type, in deterministic key order.
    pub fn objects_by_type(&self, object_type: ObjectType) -> Vec<ObjIdx> {
        self.by_type
            .get(&object_type)
            .map(|m| m.values().copied().collect())
            .unwrap_or_default()
    }

    pub fn not_processed_by_type(&self, object_type: ObjectType) -> Vec<ObjIdx> {
        self.objects_by_type(object_type)
            .into_iter()
            .filter(|idx| self.objects[*idx].status == ObjectStatus::NotProcessed)
            .collect()
    }

    /// All live objects in deterministic (type, key) order.
    pub fn all_objects(&self) -> Vec<ObjIdx> {
        self.by_type
            .values()
            .flat_map(|m| m.values().copied())
            .collect()
    }

    pub fn all_not_processed(&self) -> Vec<ObjIdx> {
        self.all_objects()
            .into_iter()
            .filter(|idx| self.objects[*idx].status == ObjectStatus::NotProcessed)
            .collect()
    }

    pub fn has_rid(&self, rid: ObjectId) -> bool {
        self.rid_to_vid.contains_key(&rid)
    }

    pub fn has_vid(&self, vid: ObjectId) -> bool {
        self.vid_to_rid.contains_key(&vid)
    }

    pub fn reference_count(&self, vid: ObjectId) -> Option<i64> {
        self.refs.get(&vid).copied()
    }

    /// Track a new vid with zero references. Inserting a vid twice means a
    /// bookkeeping bug somewhere above.
    pub fn insert_new_vid(&mut self, vid: ObjectId) -> SyncdResult<()> {
        if self.refs.contains_key(&vid) {
            return Err(SyncdError::DuplicateVid(vid));
        }
        self.refs.insert(vid, 0);
        Ok(())
    }

    fn release_vid(&mut self, vid: ObjectId) -> SyncdResult<()> {
        if vid.is_null() {
            return Ok(());
        }
        let count = self
            .refs
            .get_mut(&vid)
            .ok_or(SyncdError::UntrackedVid(vid))?;
        *count -= 1;
        if *count < 0 {
            return Err(SyncdError::NegativeRefCount(vid));
        }
        if *count == 0 {
            self.last_decref_op.insert(vid, self.op_id);
        }
        Ok(())
    }

    fn bind_vid(&mut self, vid: ObjectId) -> SyncdResult<()> {
        if vid.is_null() {
            return Ok(());
        }
        let count = self
            .refs
            .get_mut(&vid)
            .ok_or(SyncdError::UntrackedVid(vid))?;
        *count += 1;
        Ok(())
    }

    fn release_links(&mut self, attr: &Attribute) -> SyncdResult<()> {
        for vid in attr.oids() {
            self.release_vid(vid)?;
        }
        Ok(())
    }

    fn bind_links(&mut self, attr: &Attribute) -> SyncdResult<()> {
        for vid in attr.oids() {
            self.bind_vid(vid)?;
        }
        Ok(())
    }

    /// Set `attr` on an existing object, emitting an ASIC set operation and
    /// exchanging the attribute's old reference links for the new ones.
    pub fn asic_set_attribute(&mut self, idx: ObjIdx, attr: Attribute) -> SyncdResult<()> {
        self.op_id += 1;

        if attr.is_oid_attr() {
            if let Some(old) = self.objects[idx].attrs.get(attr.name()).cloned() {
                self.release_links(&old)?;
            }
            self.bind_links(&attr)?;
        }

        let op = AsicOp {
            id: self.op_id,
            object_type: self.objects[idx].object_type,
            key: self.objects[idx].key.clone(),
            kind: AsicOpKind::Set { attr: attr.clone() },
        };

        self.objects[idx].attrs.insert(attr.name(), attr);
        self.ops.push(op);
        Ok(())
    }

    /// Insert a freshly built object, emitting an ASIC create operation and
    /// binding the links its attributes (and struct members) carry.
    pub fn asic_create_object(&mut self, obj: ViewObject) -> SyncdResult<ObjIdx> {
        self.op_id += 1;

        if obj.is_oid_object() {
            self.refs.entry(obj.vid()).or_insert(0);
        } else {
            for vid in obj.key.member_oids() {
                self.bind_vid(vid)?;
            }
        }

        for attr in obj.attrs.values() {
            for vid in attr.oids() {
                self.bind_vid(vid)?;
            }
        }

        let op = AsicOp {
            id: self.op_id,
            object_type: obj.object_type,
            key: obj.key.clone(),
            kind: AsicOpKind::Create {
                attrs: obj.attrs.values().cloned().collect(),
            },
        };

        let idx = self.index_object(obj);
        self.ops.push(op);
        Ok(idx)
    }

    /// Remove a live object, emitting an ASIC remove operation, releasing
    /// its links and moving its id pair to the removed shadow.
    ///
    /// For OID objects the caller has already verified the reference count
    /// is zero.
    pub fn asic_remove_object(&mut self, idx: ObjIdx) -> SyncdResult<()> {
        self.op_id += 1;

        self.unindex_object(idx);

        if self.objects[idx].is_oid_object() {
            let vid = self.objects[idx].vid();
            // the object is gone, its own vid is no longer tracked
            self.refs.remove(&vid);

            let rid = self
                .vid_to_rid
                .remove(&vid)
                .ok_or(SyncdError::UnresolvedVid(vid))?;
            self.rid_to_vid.remove(&rid);
            self.removed_vid_to_rid.insert(vid, rid);
        } else {
            let member_oids = self.objects[idx].key.member_oids();
            for vid in member_oids {
                self.release_vid(vid)?;
            }
        }

        let attrs: Vec<Attribute> = self.objects[idx].attrs.values().cloned().collect();
        for attr in attrs {
            self.release_links(&attr)?;
        }

        let op = AsicOp {
            id: self.op_id,
            object_type: self.objects[idx].object_type,
            key: self.objects[idx].key.clone(),
            kind: AsicOpKind::Remove,
        };

        if self.objects[idx].is_oid_object() {
            self.ops.push(op);
        } else {
            self.entry_remove_ops.push(op);
        }
        Ok(())
    }

    /// Inject a default-created object into this view so that id matching
    /// succeeds for objects the driver created implicitly (CPU port,
    /// default trap group and friends).
    pub fn create_dummy_existing_object(
        &mut self,
        rid: ObjectId,
        vid: ObjectId,
    ) -> SyncdResult<ObjIdx> {
        let object_type = vid
            .object_type()
            .ok_or(SyncdError::Model(syncd_sai::SaiError::UnknownObjectType(vid)))?;

        let obj = ViewObject::new(object_type, ObjectKey::Oid(vid));
        self.refs.entry(vid).or_insert(0);
        self.rid_to_vid.insert(rid, vid);
        self.vid_to_rid.insert(vid, rid);
        Ok(self.index_object(obj))
    }

    pub fn operations(&self) -> (&[AsicOp], &[AsicOp]) {
        (&self.entry_remove_ops, &self.ops)
    }

    pub fn operation_count(&self) -> usize {
        self.entry_remove_ops.len() + self.ops.len()
    }

    pub fn last_decref_op(&self, vid: ObjectId) -> Option<u64> {
        self.last_decref_op.get(&vid).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncd_sai::{metadata, AttrValue};

    fn vid(object_type: ObjectType, seq: u64) -> ObjectId {
        ObjectId::encode(object_type, 0, seq)
    }

    fn oid_attr(
        object_type: ObjectType,
        name: &str,
        target: ObjectId,
    ) -> Attribute {
        Attribute::new(
            metadata::get(object_type, name).unwrap(),
            AttrValue::Oid(target),
        )
    }

    fn view_with_trap_and_group() -> (AsicView, ObjectId, ObjectId, ObjIdx, ObjIdx) {
        let group = vid(ObjectType::HostifTrapGroup, 1);
        let trap = vid(ObjectType::HostifTrap, 2);

        let rows = vec![
            (
                format!("{}:{group}", ObjectType::HostifTrapGroup),
                vec![("SAI_HOSTIF_TRAP_GROUP_ATTR_QUEUE".to_string(), "5".to_string())],
            ),
            (
                format!("{}:{trap}", ObjectType::HostifTrap),
                vec![(
                    metadata::HOSTIF_TRAP_TRAP_GROUP.to_string(),
                    group.to_string(),
                )],
            ),
        ];

        let view = AsicView::from_dump(rows).unwrap();
        let group_idx = view.lookup_oid(group).unwrap();
        let trap_idx = view.lookup_oid(trap).unwrap();
        (view, group, trap, group_idx, trap_idx)
    }

    #[test]
    fn dump_load_counts_references() {
        let (view, group, trap, _, _) = view_with_trap_and_group();

        assert_eq!(view.len(), 2);
        assert_eq!(view.reference_count(group), Some(1));
        assert_eq!(view.reference_count(trap), Some(0));
    }

    #[test]
    fn set_rebinds_oid_links() {
        let (mut view, group, _, _, trap_idx) = view_with_trap_and_group();

        // introduce a second group and move the trap's link to it
        let group2 = vid(ObjectType::HostifTrapGroup, 9);
        view.insert_new_vid(group2).unwrap();

        let attr = oid_attr(
            ObjectType::HostifTrap,
            metadata::HOSTIF_TRAP_TRAP_GROUP,
            group2,
        );
        view.asic_set_attribute(trap_idx, attr).unwrap();

        assert_eq!(view.reference_count(group), Some(0));
        assert_eq!(view.reference_count(group2), Some(1));
        // the set that dropped the old group to zero is remembered
        let (_, ops) = view.operations();
        assert_eq!(view.last_decref_op(group), Some(ops[0].id));
    }

    #[test]
    fn remove_requires_no_dangling_links() {
        let (mut view, group, trap, _, trap_idx) = view_with_trap_and_group();

        view.vid_to_rid.insert(trap, ObjectId::from_raw(0xAA));
        view.rid_to_vid.insert(ObjectId::from_raw(0xAA), trap);

        view.asic_remove_object(trap_idx).unwrap();

        assert_eq!(view.len(), 1);
        assert_eq!(view.reference_count(group), Some(0));
        assert_eq!(view.reference_count(trap), None);
        // removed pair moved to the shadow map
        assert_eq!(
            view.removed_vid_to_rid.get(&trap),
            Some(&ObjectId::from_raw(0xAA))
        );
        assert!(!view.has_vid(trap));
    }

    #[test]
    fn refcount_cannot_go_negative() {
        let mut view = AsicView::new();
        let target = vid(ObjectType::HostifTrapGroup, 1);
        view.insert_new_vid(target).unwrap();

        let obj_vid = vid(ObjectType::HostifTrap, 2);
        let mut obj = ViewObject::new(ObjectType::HostifTrap, ObjectKey::Oid(obj_vid));
        let attr = oid_attr(
            ObjectType::HostifTrap,
            metadata::HOSTIF_TRAP_TRAP_GROUP,
            target,
        );
        obj.attrs.insert(attr.name(), attr);

        let idx = view.asic_create_object(obj).unwrap();
        assert_eq!(view.reference_count(target), Some(1));

        view.vid_to_rid.insert(obj_vid, ObjectId::from_raw(1));
        view.rid_to_vid.insert(ObjectId::from_raw(1), obj_vid);
        view.asic_remove_object(idx).unwrap();
        assert_eq!(view.reference_count(target), Some(0));

        // releasing again would go below zero and must fail
        let attr2 = oid_attr(
            ObjectType::HostifTrap,
            metadata::HOSTIF_TRAP_TRAP_GROUP,
            target,
        );
        assert!(matches!(
            view.release_links(&attr2),
            Err(SyncdError::NegativeRefCount(_))
        ));
    }

    #[test]
    fn duplicate_vid_insert_is_rejected() {
        let mut view = AsicView::new();
        let id = vid(ObjectType::Port, 1);
        view.insert_new_vid(id).unwrap();
        assert!(matches!(
            view.insert_new_vid(id),
            Err(SyncdError::DuplicateVid(id2)) if id2 == id
        ));
    }

    #[test]
    fn entry_removes_are_queued_in_front() {
        let vr = vid(ObjectType::VirtualRouter, 1);
        let switch = vid(ObjectType::Switch, 0);
        let rows = vec![
            (format!("{}:{switch}", ObjectType::Switch), vec![]),
            (format!("{}:{vr}", ObjectType::VirtualRouter), vec![]),
        ];
        let mut view = AsicView::from_dump(rows).unwrap();

        let route = ObjectKey::Route(syncd_sai::RouteEntry {
            dest: "10.0.0.0/24".parse().unwrap(),
            switch_id: switch,
            vr,
        });
        let obj = ViewObject::new(ObjectType::RouteEntry, route.clone());
        let idx = view.asic_create_object(obj).unwrap();
        assert_eq!(view.reference_count(vr), Some(1));

        view.asic_remove_object(idx).unwrap();
        assert_eq!(view.reference_count(vr), Some(0));

        let (entry_removes, ops) = view.operations();
        assert_eq!(entry_removes.len(), 1);
        assert!(entry_removes[0].is_remove());
        assert_eq!(ops.len(), 1); // the create
    }
}
