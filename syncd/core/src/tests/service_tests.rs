// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Producer-facing request handling: the view handshake, direct writes on
//! the very first run, collected writes afterwards, gets with snooping, and
//! the shutdown channel.

use std::sync::Arc;

use syncd_sai::{metadata, AttrValue, ObjectId, ObjectType, SaiStatus};

use crate::context::Context;
use crate::error::SyncdError;
use crate::parameters::Parameters;
use crate::service::{ShutdownRequest, Syncd, NOTIFY_APPLY_VIEW, NOTIFY_INIT_VIEW};
use crate::store::{self, MemStore, StateStore, ASIC_STATE_TABLE, TEMP_PREFIX};
use crate::test_utils::FakeSai;

fn switch_vid() -> ObjectId {
    ObjectId::encode(ObjectType::Switch, 0, 0)
}

fn vid(object_type: ObjectType, seq: u64) -> ObjectId {
    ObjectId::encode(object_type, 0, seq)
}

fn setup() -> (Arc<Syncd>, Arc<MemStore>, Arc<FakeSai>) {
    let ctx = Arc::new(Context::new(Parameters::default()));
    let store = Arc::new(MemStore::new());
    let api = Arc::new(FakeSai::new());
    let syncd = Arc::new(Syncd::new(ctx, store.clone(), api.clone()));
    syncd.start().unwrap();
    (syncd, store, api)
}

fn notify(syncd: &Syncd, payload: &str) -> SaiStatus {
    syncd
        .process_request(payload, "notify", &[])
        .unwrap()
        .status
}

fn request(
    syncd: &Syncd,
    object_type: ObjectType,
    id: &str,
    op: &str,
    fields: &[(&str, &str)],
) -> SaiStatus {
    let fields: Vec<(String, String)> = fields
        .iter()
        .map(|(f, v)| (f.to_string(), v.to_string()))
        .collect();
    syncd
        .process_request(&format!("{object_type}:{id}"), op, &fields)
        .unwrap()
        .status
}

/// First cycle after a fresh database: writes are applied directly; second
/// cycle collects into the temporary view and APPLY_VIEW reconciles it.
#[test]
fn view_handshake_full_cycle() {
    let (syncd, store, api) = setup();
    let vr = vid(ObjectType::VirtualRouter, 1);

    // very first run: INIT_VIEW acknowledged, writes go straight down
    assert_eq!(notify(&syncd, NOTIFY_INIT_VIEW), SaiStatus::Success);
    assert_eq!(
        request(
            &syncd,
            ObjectType::Switch,
            &switch_vid().to_string(),
            "create",
            &[(metadata::SWITCH_INIT_SWITCH, "true")],
        ),
        SaiStatus::Success
    );
    assert_eq!(
        request(
            &syncd,
            ObjectType::VirtualRouter,
            &vr.to_string(),
            "create",
            &[],
        ),
        SaiStatus::Success
    );
    assert_eq!(notify(&syncd, NOTIFY_APPLY_VIEW), SaiStatus::Success);

    // the driver saw both creates already
    assert!(api
        .calls()
        .iter()
        .any(|c| c.starts_with("create SAI_OBJECT_TYPE_VIRTUAL_ROUTER")));

    // second cycle: the same view plus a trap group, collected then applied
    assert_eq!(notify(&syncd, NOTIFY_INIT_VIEW), SaiStatus::Success);

    let tg = vid(ObjectType::HostifTrapGroup, 2);
    assert_eq!(
        request(
            &syncd,
            ObjectType::Switch,
            &switch_vid().to_string(),
            "create",
            &[(metadata::SWITCH_INIT_SWITCH, "true")],
        ),
        SaiStatus::Success
    );
    assert_eq!(
        request(
            &syncd,
            ObjectType::VirtualRouter,
            &vr.to_string(),
            "create",
            &[],
        ),
        SaiStatus::Success
    );
    assert_eq!(
        request(
            &syncd,
            ObjectType::HostifTrapGroup,
            &tg.to_string(),
            "create",
            &[(metadata::HOSTIF_TRAP_GROUP_QUEUE, "4")],
        ),
        SaiStatus::Success
    );

    // collected writes are in the temporary table, not yet in the driver
    let temp_keys = store.keys(&format!("{TEMP_PREFIX}{ASIC_STATE_TABLE}:"));
    assert_eq!(temp_keys.len(), 3);
    assert!(!api
        .calls()
        .iter()
        .any(|c| c.starts_with("create SAI_OBJECT_TYPE_HOSTIF_TRAP_GROUP")));

    assert_eq!(notify(&syncd, NOTIFY_APPLY_VIEW), SaiStatus::Success);

    // the reconciler created the trap group with its queue value
    let tg_create = api
        .calls()
        .iter()
        .any(|c| c.starts_with("create SAI_OBJECT_TYPE_HOSTIF_TRAP_GROUP"));
    assert!(tg_create);

    // applied view persisted, temporary table cleared
    let applied = store.keys(&format!("{ASIC_STATE_TABLE}:"));
    assert!(applied
        .iter()
        .any(|k| k.contains("SAI_OBJECT_TYPE_HOSTIF_TRAP_GROUP")));
    assert!(store
        .keys(&format!("{TEMP_PREFIX}{ASIC_STATE_TABLE}:"))
        .is_empty());
}

/// Removing an object while collecting takes it out of the temporary table
/// and remembers its vid so the populate step will not resurrect it.
#[test]
fn init_view_remove_clears_collected_row() {
    let (syncd, store, _api) = setup();
    let vr = vid(ObjectType::VirtualRouter, 1);

    assert_eq!(notify(&syncd, NOTIFY_INIT_VIEW), SaiStatus::Success);
    request(
        &syncd,
        ObjectType::Switch,
        &switch_vid().to_string(),
        "create",
        &[(metadata::SWITCH_INIT_SWITCH, "true")],
    );
    assert_eq!(notify(&syncd, NOTIFY_APPLY_VIEW), SaiStatus::Success);

    assert_eq!(notify(&syncd, NOTIFY_INIT_VIEW), SaiStatus::Success);
    request(
        &syncd,
        ObjectType::VirtualRouter,
        &vr.to_string(),
        "create",
        &[],
    );
    let key = store::object_key(
        &format!("{TEMP_PREFIX}{ASIC_STATE_TABLE}"),
        ObjectType::VirtualRouter,
        &vr.to_string(),
    );
    assert!(!store.hgetall(&key).is_empty());

    request(&syncd, ObjectType::VirtualRouter, &vr.to_string(), "remove", &[]);
    assert!(store.hgetall(&key).is_empty());
}

/// Gets are served live from the driver; unknown real ids in the response
/// get fresh virtual ids and the values land in the view being collected.
#[test]
fn get_snoops_response_values() {
    let (syncd, store, api) = setup();

    assert_eq!(notify(&syncd, NOTIFY_INIT_VIEW), SaiStatus::Success);
    request(
        &syncd,
        ObjectType::Switch,
        &switch_vid().to_string(),
        "create",
        &[(metadata::SWITCH_INIT_SWITCH, "true")],
    );

    // the driver reports a queue value on the trap group
    let response = syncd
        .process_request(
            &format!("{}:{}", ObjectType::Switch, switch_vid()),
            "get",
            &[(metadata::SWITCH_INIT_SWITCH.to_string(), "".to_string())],
        )
        .unwrap();

    // INIT_SWITCH was stored at create and comes back unchanged
    assert_eq!(response.status, SaiStatus::Success);
    assert_eq!(
        response.fields,
        vec![(metadata::SWITCH_INIT_SWITCH.to_string(), "true".to_string())]
    );

    // a get of an unseeded attribute reports the driver status
    let response = syncd
        .process_request(
            &format!("{}:{}", ObjectType::Switch, switch_vid()),
            "get",
            &[(metadata::SWITCH_PORT_NUMBER.to_string(), "".to_string())],
        )
        .unwrap();
    assert_eq!(response.status, SaiStatus::NotSupported);

    // seed an oid-valued response and check the rid was snooped into a vid
    let tg_rid = ObjectId::encode(ObjectType::HostifTrapGroup, 0x7, 0x700);
    api.seed_get(
        syncd_rid_of_switch(&api),
        metadata::SWITCH_DEFAULT_TRAP_GROUP,
        AttrValue::Oid(tg_rid),
    );
    let response = syncd
        .process_request(
            &format!("{}:{}", ObjectType::Switch, switch_vid()),
            "get",
            &[(metadata::SWITCH_DEFAULT_TRAP_GROUP.to_string(), "".to_string())],
        )
        .unwrap();
    assert_eq!(response.status, SaiStatus::Success);

    let (_, value) = &response.fields[0];
    let snooped_vid: ObjectId = value.parse().unwrap();
    assert_eq!(snooped_vid.object_type(), Some(ObjectType::HostifTrapGroup));
    // persisted in the id maps
    assert_eq!(
        store.hget(store::RIDTOVID, &tg_rid.to_string()).unwrap(),
        snooped_vid.to_string()
    );
}

/// The switch create rid is deterministic in the fake driver: first object.
fn syncd_rid_of_switch(_api: &FakeSai) -> ObjectId {
    ObjectId::encode(ObjectType::Switch, 0x7, 0x1001)
}

#[test]
fn bulk_remove_and_get_are_not_implemented() {
    let (syncd, _store, _api) = setup();
    for op in ["bulkremove", "bulkget"] {
        let response = syncd
            .process_request("SAI_OBJECT_TYPE_ROUTE_ENTRY:0", op, &[])
            .unwrap();
        assert_eq!(response.status, SaiStatus::NotImplemented);
    }
}

#[test]
fn unknown_operation_is_rejected() {
    let (syncd, _store, _api) = setup();
    assert!(matches!(
        syncd.process_request("SAI_OBJECT_TYPE_PORT:oid:0x1", "flush", &[]),
        Err(SyncdError::UnknownOperation(_))
    ));
}

#[test]
fn shutdown_requests() {
    let (syncd, _store, _api) = setup();

    assert_eq!(ShutdownRequest::parse("COLD"), ShutdownRequest::Cold);
    assert_eq!(ShutdownRequest::parse("WARM"), ShutdownRequest::Warm);
    // unknown payloads degrade to a cold shutdown
    assert_eq!(ShutdownRequest::parse("FROZEN"), ShutdownRequest::Cold);

    assert!(syncd.handle_shutdown_request(ShutdownRequest::Cold).is_ok());
    assert!(matches!(
        syncd.handle_shutdown_request(ShutdownRequest::Warm),
        Err(SyncdError::WarmRestartUnsupported)
    ));
}
