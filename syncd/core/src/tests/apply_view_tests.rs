// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! End-to-end view transition scenarios: reconcile hand-built current and
//! temporary views, then replay the emitted operations against the fake
//! driver and check the resulting state.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use syncd_sai::{metadata, AttrValue, ObjectId, ObjectKey, ObjectType, RouteEntry};

use crate::context::Context;
use crate::error::SyncdError;
use crate::executor::{persist_applied_view, Executor};
use crate::reconciler::Reconciler;
use crate::store::{MemStore, StateStore, VIDTORID};
use crate::switch::SaiSwitch;
use crate::test_utils::FakeSai;
use crate::view::{AsicOpKind, AsicView, ObjectStatus};

fn vid(object_type: ObjectType, seq: u64) -> ObjectId {
    ObjectId::encode(object_type, 0, seq)
}

fn rid(object_type: ObjectType, seq: u64) -> ObjectId {
    ObjectId::encode(object_type, 0x7, seq)
}

// fixture ids shared by all scenarios
fn switch_vid() -> ObjectId {
    ObjectId::encode(ObjectType::Switch, 0, 0)
}
fn switch_rid() -> ObjectId {
    rid(ObjectType::Switch, 0x100)
}
fn vr_vid() -> ObjectId {
    vid(ObjectType::VirtualRouter, 1)
}
fn vr_rid() -> ObjectId {
    rid(ObjectType::VirtualRouter, 0x101)
}

struct ViewBuilder {
    rows: Vec<(String, Vec<(String, String)>)>,
    pairs: Vec<(ObjectId, ObjectId)>,
}

impl ViewBuilder {
    fn new() -> Self {
        Self {
            rows: Vec::new(),
            pairs: Vec::new(),
        }
    }

    fn object(mut self, object_type: ObjectType, key: &str, attrs: &[(&str, String)]) -> Self {
        self.rows.push((
            format!("{object_type}:{key}"),
            attrs
                .iter()
                .map(|(field, value)| (field.to_string(), value.clone()))
                .collect(),
        ));
        self
    }

    fn mapped(mut self, vid: ObjectId, rid: ObjectId) -> Self {
        self.pairs.push((vid, rid));
        self
    }

    fn build(self) -> AsicView {
        let mut view = AsicView::from_dump(self.rows).unwrap();
        for (vid, rid) in self.pairs {
            view.vid_to_rid.insert(vid, rid);
            view.rid_to_vid.insert(rid, vid);
        }
        view
    }
}

/// Base inventory: switch and default virtual router are default-created,
/// the virtual router is the switch's internal default.
fn base_inventory() -> SaiSwitch {
    SaiSwitch::new_for_test(
        switch_vid(),
        switch_rid(),
        BTreeSet::from([switch_rid(), vr_rid()]),
        BTreeMap::from([(metadata::SWITCH_DEFAULT_VIRTUAL_ROUTER_ID, vr_rid())]),
        BTreeMap::new(),
    )
}

fn base_current() -> ViewBuilder {
    ViewBuilder::new()
        .object(ObjectType::Switch, &switch_vid().to_string(), &[])
        .object(ObjectType::VirtualRouter, &vr_vid().to_string(), &[])
        .mapped(switch_vid(), switch_rid())
        .mapped(vr_vid(), vr_rid())
}

fn base_temp() -> ViewBuilder {
    ViewBuilder::new()
        .object(ObjectType::Switch, &switch_vid().to_string(), &[])
        .object(ObjectType::VirtualRouter, &vr_vid().to_string(), &[])
}

fn reconcile(
    current: &mut AsicView,
    temp: &mut AsicView,
    inventory: &SaiSwitch,
) -> Result<(), SyncdError> {
    let ctx = Context::new_for_test();
    Reconciler::new(&ctx, current, temp, inventory).reconcile(&HashSet::new())
}

fn seed_base_objects(api: &FakeSai) {
    api.seed_object(ObjectType::Switch, switch_rid(), vec![]);
    api.seed_object(ObjectType::VirtualRouter, vr_rid(), vec![]);
}

fn assert_all_final(view: &AsicView) {
    for idx in view.all_objects() {
        assert_eq!(
            view.obj(idx).status,
            ObjectStatus::Final,
            "{} not final",
            view.obj(idx).serialized_key()
        );
    }
}

fn assert_maps_are_inverse(view: &AsicView) {
    assert_eq!(view.rid_to_vid.len(), view.vid_to_rid.len());
    for (rid, vid) in &view.rid_to_vid {
        assert_eq!(view.vid_to_rid.get(vid), Some(rid));
    }
}

fn op_summary(view: &AsicView) -> (usize, usize, usize) {
    let (entry_removes, ops) = view.operations();
    let mut creates = 0;
    let mut sets = 0;
    let mut removes = entry_removes.len();
    for op in ops {
        match op.kind {
            AsicOpKind::Create { .. } => creates += 1,
            AsicOpKind::Set { .. } => sets += 1,
            AsicOpKind::Remove => removes += 1,
        }
    }
    (creates, sets, removes)
}

/// Fresh create of a router interface, next hop and route on top of a
/// matched switch and default virtual router.
#[test]
fn fresh_create_of_one_route() {
    let rif = vid(ObjectType::RouterInterface, 2);
    let nh = vid(ObjectType::NextHop, 3);
    let route = ObjectKey::Route(RouteEntry {
        dest: "10.0.0.0/24".parse().unwrap(),
        switch_id: switch_vid(),
        vr: vr_vid(),
    });

    let mut current = base_current().build();
    let mut temp = base_temp()
        .object(
            ObjectType::RouterInterface,
            &rif.to_string(),
            &[
                (
                    "SAI_ROUTER_INTERFACE_ATTR_VIRTUAL_ROUTER_ID",
                    vr_vid().to_string(),
                ),
                ("SAI_ROUTER_INTERFACE_ATTR_TYPE", "1".to_string()),
            ],
        )
        .object(
            ObjectType::NextHop,
            &nh.to_string(),
            &[
                ("SAI_NEXT_HOP_ATTR_TYPE", "0".to_string()),
                ("SAI_NEXT_HOP_ATTR_IP", "10.0.0.1".to_string()),
                ("SAI_NEXT_HOP_ATTR_ROUTER_INTERFACE_ID", rif.to_string()),
            ],
        )
        .object(
            ObjectType::RouteEntry,
            &route.serialize(),
            &[(metadata::ROUTE_ENTRY_NEXT_HOP_ID, nh.to_string())],
        )
        .build();

    let mut inventory = base_inventory();
    reconcile(&mut current, &mut temp, &inventory).unwrap();

    let (creates, sets, removes) = op_summary(&current);
    assert_eq!((creates, sets, removes), (3, 0, 0));

    assert_all_final(&current);
    assert_all_final(&temp);

    // execute against the driver and check the persistent map
    let api = FakeSai::new();
    seed_base_objects(&api);
    let store = MemStore::new();

    Executor::new(&api, &mut current, &mut temp, &mut inventory)
        .execute()
        .unwrap();
    persist_applied_view(&store, &temp);

    let calls = api.calls();
    let rif_call = calls.iter().position(|c| c.contains("ROUTER_INTERFACE")).unwrap();
    let nh_call = calls
        .iter()
        .position(|c| c.starts_with("create SAI_OBJECT_TYPE_NEXT_HOP "))
        .unwrap();
    let route_call = calls.iter().position(|c| c.starts_with("create entry")).unwrap();
    assert!(rif_call < nh_call && nh_call < route_call);

    // all four oid objects have persisted rids
    let persisted = store.hgetall(VIDTORID);
    assert_eq!(persisted.len(), 4);
    assert!(persisted.iter().any(|(v, _)| *v == rif.to_string()));
    assert!(persisted.iter().any(|(v, _)| *v == nh.to_string()));

    assert_maps_are_inverse(&temp);
    assert_maps_are_inverse(&current);
}

/// Changing a route's next hop updates the route in place; the old next hop
/// is removed once the set drops its reference count to zero.
#[test]
fn route_next_hop_change_sets_in_place() {
    let rif = vid(ObjectType::RouterInterface, 2);
    let nh_a = vid(ObjectType::NextHop, 3);
    let nh_b = vid(ObjectType::NextHop, 4);
    let rif_rid = rid(ObjectType::RouterInterface, 0x102);
    let nh_a_rid = rid(ObjectType::NextHop, 0x103);

    let route = ObjectKey::Route(RouteEntry {
        dest: "10.0.0.0/24".parse().unwrap(),
        switch_id: switch_vid(),
        vr: vr_vid(),
    });

    let rif_attrs = [
        (
            "SAI_ROUTER_INTERFACE_ATTR_VIRTUAL_ROUTER_ID",
            vr_vid().to_string(),
        ),
        ("SAI_ROUTER_INTERFACE_ATTR_TYPE", "1".to_string()),
    ];

    let mut current = base_current()
        .object(ObjectType::RouterInterface, &rif.to_string(), &rif_attrs)
        .object(
            ObjectType::NextHop,
            &nh_a.to_string(),
            &[
                ("SAI_NEXT_HOP_ATTR_TYPE", "0".to_string()),
                ("SAI_NEXT_HOP_ATTR_IP", "10.0.0.1".to_string()),
                ("SAI_NEXT_HOP_ATTR_ROUTER_INTERFACE_ID", rif.to_string()),
            ],
        )
        .object(
            ObjectType::RouteEntry,
            &route.serialize(),
            &[(metadata::ROUTE_ENTRY_NEXT_HOP_ID, nh_a.to_string())],
        )
        .mapped(rif, rif_rid)
        .mapped(nh_a, nh_a_rid)
        .build();

    let mut temp = base_temp()
        .object(ObjectType::RouterInterface, &rif.to_string(), &rif_attrs)
        .object(
            ObjectType::NextHop,
            &nh_b.to_string(),
            &[
                ("SAI_NEXT_HOP_ATTR_TYPE", "0".to_string()),
                ("SAI_NEXT_HOP_ATTR_IP", "10.0.0.2".to_string()),
                ("SAI_NEXT_HOP_ATTR_ROUTER_INTERFACE_ID", rif.to_string()),
            ],
        )
        .object(
            ObjectType::RouteEntry,
            &route.serialize(),
            &[(metadata::ROUTE_ENTRY_NEXT_HOP_ID, nh_b.to_string())],
        )
        .build();

    let mut inventory = base_inventory();
    reconcile(&mut current, &mut temp, &inventory).unwrap();

    // one create (new next hop), one set (route next hop), one remove (old
    // next hop); the route itself is neither created nor removed
    let (creates, sets, removes) = op_summary(&current);
    assert_eq!((creates, sets, removes), (1, 1, 1));

    let api = FakeSai::new();
    seed_base_objects(&api);
    api.seed_object(ObjectType::RouterInterface, rif_rid, vec![]);
    api.seed_object(ObjectType::NextHop, nh_a_rid, vec![]);
    let route_rid_space = ObjectKey::Route(RouteEntry {
        dest: "10.0.0.0/24".parse().unwrap(),
        switch_id: switch_rid(),
        vr: vr_rid(),
    });
    api.seed_entry(&route_rid_space, vec![]);

    Executor::new(&api, &mut current, &mut temp, &mut inventory)
        .execute()
        .unwrap();

    let calls = api.calls();
    let set_pos = calls.iter().position(|c| c.starts_with("set entry")).unwrap();
    let remove_pos = calls
        .iter()
        .position(|c| c.starts_with("remove SAI_OBJECT_TYPE_NEXT_HOP "))
        .unwrap();
    // the removal of the old next hop happens only after the set released it
    assert!(remove_pos > set_pos);
    assert!(!api.has_object(nh_a_rid));
}

/// A differing create-only attribute cannot be fixed with a set; the old
/// object is removed and the new one created, with the remove hoisted ahead
/// since nothing ever referenced the old table.
#[test]
fn create_only_attribute_change_forces_recreate() {
    let old_table = vid(ObjectType::AclTable, 2);
    let new_table = vid(ObjectType::AclTable, 3);
    let old_rid = rid(ObjectType::AclTable, 0x110);

    let mut current = base_current()
        .object(
            ObjectType::AclTable,
            &old_table.to_string(),
            &[(metadata::ACL_TABLE_ACL_STAGE, "1".to_string())],
        )
        .mapped(old_table, old_rid)
        .build();

    let mut temp = base_temp()
        .object(
            ObjectType::AclTable,
            &new_table.to_string(),
            &[
                (metadata::ACL_TABLE_ACL_STAGE, "1".to_string()),
                ("SAI_ACL_TABLE_ATTR_FIELD_SRC_IP", "true".to_string()),
            ],
        )
        .build();

    let mut inventory = base_inventory();
    reconcile(&mut current, &mut temp, &inventory).unwrap();

    let (creates, sets, removes) = op_summary(&current);
    assert_eq!((creates, sets, removes), (1, 0, 1));

    let api = FakeSai::new();
    seed_base_objects(&api);
    api.seed_object(ObjectType::AclTable, old_rid, vec![]);

    Executor::new(&api, &mut current, &mut temp, &mut inventory)
        .execute()
        .unwrap();

    let calls = api.calls();
    let remove_pos = calls
        .iter()
        .position(|c| c.starts_with("remove SAI_OBJECT_TYPE_ACL_TABLE"))
        .unwrap();
    let create_pos = calls
        .iter()
        .position(|c| c.starts_with("create SAI_OBJECT_TYPE_ACL_TABLE"))
        .unwrap();
    assert!(remove_pos < create_pos);
    assert!(!api.has_object(old_rid));
}

/// The default trap group cannot be removed; when the desired view does not
/// mention it, its modified attributes are set back to their defaults.
#[test]
fn default_trap_group_brought_to_default() {
    let tg = vid(ObjectType::HostifTrapGroup, 2);
    let tg_rid = rid(ObjectType::HostifTrapGroup, 0x120);

    let mut current = base_current()
        .object(
            ObjectType::HostifTrapGroup,
            &tg.to_string(),
            &[(metadata::HOSTIF_TRAP_GROUP_QUEUE, "5".to_string())],
        )
        .mapped(tg, tg_rid)
        .build();

    let mut temp = base_temp().build();

    let inventory = SaiSwitch::new_for_test(
        switch_vid(),
        switch_rid(),
        BTreeSet::from([switch_rid(), vr_rid(), tg_rid]),
        BTreeMap::from([
            (metadata::SWITCH_DEFAULT_VIRTUAL_ROUTER_ID, vr_rid()),
            (metadata::SWITCH_DEFAULT_TRAP_GROUP, tg_rid),
        ]),
        BTreeMap::new(),
    );

    reconcile(&mut current, &mut temp, &inventory).unwrap();

    // exactly one set bringing the queue back to its default, no removes
    let (creates, sets, removes) = op_summary(&current);
    assert_eq!((creates, sets, removes), (0, 1, 0));

    let (_, ops) = current.operations();
    let AsicOpKind::Set { attr } = &ops[0].kind else {
        panic!("expected a set operation");
    };
    assert_eq!(attr.name(), metadata::HOSTIF_TRAP_GROUP_QUEUE);
    assert_eq!(attr.value, AttrValue::U32(0));

    let idx = current.lookup_oid(tg).unwrap();
    assert_eq!(current.obj(idx).status, ObjectStatus::Final);
}

/// Identical views produce zero operations and leave the maps untouched.
#[test]
fn empty_apply_is_a_noop() {
    let tg = vid(ObjectType::HostifTrapGroup, 2);
    let tg_rid = rid(ObjectType::HostifTrapGroup, 0x120);
    let tg_attrs = [(metadata::HOSTIF_TRAP_GROUP_QUEUE, "5".to_string())];

    let mut current = base_current()
        .object(ObjectType::HostifTrapGroup, &tg.to_string(), &tg_attrs)
        .mapped(tg, tg_rid)
        .build();
    let mut temp = base_temp()
        .object(ObjectType::HostifTrapGroup, &tg.to_string(), &tg_attrs)
        .build();

    let inventory = base_inventory();
    let maps_before = current.rid_to_vid.clone();

    reconcile(&mut current, &mut temp, &inventory).unwrap();

    assert_eq!(current.operation_count(), 0);
    assert_eq!(current.rid_to_vid, maps_before);
    assert_eq!(temp.rid_to_vid, maps_before);
    assert_all_final(&current);
    assert_all_final(&temp);
}

/// Applying the same desired view right after a successful apply emits no
/// creates and no removes the second time.
#[test]
fn apply_is_idempotent() {
    let rif = vid(ObjectType::RouterInterface, 2);

    let temp_rows = |builder: ViewBuilder| {
        builder.object(
            ObjectType::RouterInterface,
            &rif.to_string(),
            &[
                (
                    "SAI_ROUTER_INTERFACE_ATTR_VIRTUAL_ROUTER_ID",
                    vr_vid().to_string(),
                ),
                ("SAI_ROUTER_INTERFACE_ATTR_TYPE", "1".to_string()),
            ],
        )
    };

    let mut current = base_current().build();
    let mut temp = temp_rows(base_temp()).build();

    let mut inventory = base_inventory();
    reconcile(&mut current, &mut temp, &inventory).unwrap();

    let api = FakeSai::new();
    seed_base_objects(&api);
    let store = MemStore::new();
    Executor::new(&api, &mut current, &mut temp, &mut inventory)
        .execute()
        .unwrap();
    persist_applied_view(&store, &temp);

    // second apply: reload the applied view as current, desired view is the
    // same again
    let mut current2 = AsicView::load(&store, crate::store::ASIC_STATE_TABLE).unwrap();
    current2.rid_to_vid = crate::store::read_object_map(&store, crate::store::RIDTOVID);
    current2.vid_to_rid = crate::store::read_object_map(&store, VIDTORID);
    let mut temp2 = temp_rows(base_temp()).build();

    reconcile(&mut current2, &mut temp2, &inventory).unwrap();

    assert_eq!(current2.operation_count(), 0);
}

/// Two identical runs emit identical operation sequences (fixed rng seed,
/// deterministic iteration everywhere).
#[test]
fn apply_is_deterministic() {
    let run = || {
        let nh_group_a = vid(ObjectType::NextHopGroup, 10);
        let nh_group_b = vid(ObjectType::NextHopGroup, 11);
        let temp_group = vid(ObjectType::NextHopGroup, 12);

        let mut current = base_current()
            .object(
                ObjectType::NextHopGroup,
                &nh_group_a.to_string(),
                &[("SAI_NEXT_HOP_GROUP_ATTR_TYPE", "0".to_string())],
            )
            .object(
                ObjectType::NextHopGroup,
                &nh_group_b.to_string(),
                &[("SAI_NEXT_HOP_GROUP_ATTR_TYPE", "0".to_string())],
            )
            .mapped(nh_group_a, rid(ObjectType::NextHopGroup, 0x130))
            .mapped(nh_group_b, rid(ObjectType::NextHopGroup, 0x131))
            .build();

        // one temporary group ties between the two current candidates
        let mut temp = base_temp()
            .object(
                ObjectType::NextHopGroup,
                &temp_group.to_string(),
                &[("SAI_NEXT_HOP_GROUP_ATTR_TYPE", "0".to_string())],
            )
            .build();

        let inventory = base_inventory();
        reconcile(&mut current, &mut temp, &inventory).unwrap();

        let (entry_removes, ops) = current.operations();
        let mut trace: Vec<String> = entry_removes
            .iter()
            .map(|op| format!("{:?} {}", op.kind, op.key.serialize()))
            .collect();
        trace.extend(
            ops.iter()
                .map(|op| format!("{:?} {}", op.kind, op.key.serialize())),
        );
        trace
    };

    assert_eq!(run(), run());
}

/// Reference counts always mirror the actual links between live objects.
#[test]
fn refcounts_stay_consistent_after_reconciliation() {
    let rif = vid(ObjectType::RouterInterface, 2);
    let nh = vid(ObjectType::NextHop, 3);

    let mut current = base_current().build();
    let mut temp = base_temp()
        .object(
            ObjectType::RouterInterface,
            &rif.to_string(),
            &[
                (
                    "SAI_ROUTER_INTERFACE_ATTR_VIRTUAL_ROUTER_ID",
                    vr_vid().to_string(),
                ),
                ("SAI_ROUTER_INTERFACE_ATTR_TYPE", "1".to_string()),
            ],
        )
        .object(
            ObjectType::NextHop,
            &nh.to_string(),
            &[
                ("SAI_NEXT_HOP_ATTR_TYPE", "0".to_string()),
                ("SAI_NEXT_HOP_ATTR_ROUTER_INTERFACE_ID", rif.to_string()),
            ],
        )
        .build();

    let inventory = base_inventory();
    reconcile(&mut current, &mut temp, &inventory).unwrap();

    // recount links by hand and compare with the view's bookkeeping
    let mut expected: std::collections::HashMap<ObjectId, i64> = Default::default();
    for idx in current.all_objects() {
        for attr in current.obj(idx).attrs.values() {
            for target in attr.oids() {
                if !target.is_null() {
                    *expected.entry(target).or_insert(0) += 1;
                }
            }
        }
        for member in current.obj(idx).key.member_oids() {
            *expected.entry(member).or_insert(0) += 1;
        }
    }

    for idx in current.all_objects() {
        if let Some(v) = current.obj(idx).key.oid() {
            let actual = current.reference_count(v).unwrap();
            assert_eq!(actual, expected.get(&v).copied().unwrap_or(0), "{v}");
        }
    }
}
