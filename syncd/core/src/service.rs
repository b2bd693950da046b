// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Daemon assembly and producer-facing request processing.
//!
//! A single coarse mutex serializes every producer request and the view
//! handshake; the notification thread dispatches driver events under the
//! same mutex so all metadata mutations stay serialized.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use syncd_sai::{
    metadata, Attribute, NotificationKind, ObjectId, ObjectKey, ObjectType, SaiApi, SaiStatus,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::allocator::VidAllocator;
use crate::context::Context;
use crate::error::{SyncdError, SyncdResult};
use crate::executor::{persist_applied_view, Executor};
use crate::hard_reinit::HardReiniter;
use crate::reconciler::Reconciler;
use crate::recorder::{RecordTag, Recorder};
use crate::store::{
    self, StateStore, ASIC_STATE_TABLE, HIDDEN, RIDTOVID, TEMP_PREFIX, VIDTORID,
};
use crate::switch::SaiSwitch;
use crate::translator::RidVidTranslator;
use crate::view::AsicView;

/// Payloads of the `notify` request driving the temporary-view lifecycle.
pub const NOTIFY_INIT_VIEW: &str = "INIT_VIEW";
pub const NOTIFY_APPLY_VIEW: &str = "APPLY_VIEW";

/// Operations accepted on the request channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestOp {
    Create,
    Remove,
    Set,
    Get,
    Notify,
    BulkCreate,
    BulkSet,
    BulkRemove,
    BulkGet,
}

impl RequestOp {
    pub fn parse(op: &str) -> SyncdResult<RequestOp> {
        Ok(match op {
            "create" => RequestOp::Create,
            "remove" => RequestOp::Remove,
            "set" => RequestOp::Set,
            "get" => RequestOp::Get,
            "notify" => RequestOp::Notify,
            "bulkcreate" => RequestOp::BulkCreate,
            "bulkset" => RequestOp::BulkSet,
            "bulkremove" => RequestOp::BulkRemove,
            "bulkget" => RequestOp::BulkGet,
            other => return Err(SyncdError::UnknownOperation(other.to_string())),
        })
    }
}

/// Reply emitted on the response channel: a status plus attribute fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestResponse {
    pub status: SaiStatus,
    pub fields: Vec<(String, String)>,
}

impl RequestResponse {
    pub fn status(status: SaiStatus) -> Self {
        Self {
            status,
            fields: Vec::new(),
        }
    }
}

/// Requests on the switch shutdown channel. Anything unrecognized is
/// treated as a cold shutdown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownRequest {
    Cold,
    Warm,
}

impl ShutdownRequest {
    pub fn parse(payload: &str) -> ShutdownRequest {
        match payload {
            "COLD" => ShutdownRequest::Cold,
            "WARM" => ShutdownRequest::Warm,
            other => {
                warn!("unknown shutdown request '{other}', assuming COLD");
                ShutdownRequest::Cold
            }
        }
    }
}

struct DaemonState {
    /// Between INIT_VIEW and APPLY_VIEW writes land in the temporary table.
    init_view_mode: bool,
    /// True until the first INIT_VIEW/APPLY_VIEW cycle: on a fresh start
    /// the collected view is applied directly, there is nothing to diff
    /// against.
    very_first_run: bool,
    first_init_performed: bool,
    /// Vids removed while collecting the view; the populate step of the
    /// reconciler must not resurrect them.
    init_view_removed_vids: HashSet<ObjectId>,
    switch: Option<SaiSwitch>,
}

pub struct Syncd {
    ctx: Arc<Context>,
    store: Arc<dyn StateStore>,
    api: Arc<dyn SaiApi>,
    allocator: Arc<VidAllocator>,
    translator: RidVidTranslator,
    recorder: Recorder,
    state: Mutex<DaemonState>,
}

impl Syncd {
    pub fn new(ctx: Arc<Context>, store: Arc<dyn StateStore>, api: Arc<dyn SaiApi>) -> Self {
        let allocator = Arc::new(VidAllocator::new(store.clone()));
        let translator = RidVidTranslator::new(store.clone(), allocator.clone());

        let recorder = match &ctx.parameters.recording_dir {
            Some(dir) => Recorder::new(dir),
            None => Recorder::disabled(),
        };

        // the hidden hash is written on first switch discovery; its absence
        // means this database never saw a switch
        let very_first_run = store.hgetall(HIDDEN).is_empty();

        Self {
            ctx,
            store,
            api,
            allocator,
            translator,
            recorder,
            state: Mutex::new(DaemonState {
                init_view_mode: false,
                very_first_run,
                first_init_performed: false,
                init_view_removed_vids: HashSet::new(),
                switch: None,
            }),
        }
    }

    /// Cold start: replay any persisted desired view into the driver.
    pub fn start(&self) -> SyncdResult<()> {
        let mut state = self.state.lock();

        let reiniter = HardReiniter::new(
            &self.ctx,
            self.store.as_ref(),
            self.api.as_ref(),
            &self.allocator,
            &self.translator,
        );

        state.switch = reiniter.run()?;

        if let Some(sw) = &state.switch {
            self.allocator.reserve_switch_index(sw.vid().switch_index());
            info!("cold start replayed state for switch {}", sw.vid());
        }

        Ok(())
    }

    /// Entry point for one producer request.
    pub fn process_request(
        &self,
        key: &str,
        op: &str,
        fields: &[(String, String)],
    ) -> SyncdResult<RequestResponse> {
        let op = RequestOp::parse(op)?;
        let mut state = self.state.lock();

        self.record_request(op, key, fields);

        let response = match op {
            RequestOp::Notify => self.handle_notify(&mut state, key),
            RequestOp::Create => self.handle_create(&mut state, key, fields),
            RequestOp::Remove => self.handle_remove(&mut state, key),
            RequestOp::Set => self.handle_set(&mut state, key, fields),
            RequestOp::Get => self.handle_get(&mut state, key, fields),
            RequestOp::BulkCreate => self.handle_bulk(&mut state, key, fields, RequestOp::Create),
            RequestOp::BulkSet => self.handle_bulk(&mut state, key, fields, RequestOp::Set),
            RequestOp::BulkRemove | RequestOp::BulkGet => {
                Ok(RequestResponse::status(SaiStatus::NotImplemented))
            }
        };

        if let Ok(response) = &response {
            if op == RequestOp::Get {
                self.recorder.record(
                    RecordTag::GetResponse,
                    &format!(
                        "{}|{}",
                        response.status,
                        Recorder::join_fields(&response.fields)
                    ),
                );
            } else if op == RequestOp::Notify {
                self.recorder
                    .record(RecordTag::NotifyResponse, &response.status.to_string());
            }
        }

        response
    }

    fn record_request(&self, op: RequestOp, key: &str, fields: &[(String, String)]) {
        let tag = match op {
            RequestOp::Create => RecordTag::Create,
            RequestOp::Remove => RecordTag::Remove,
            RequestOp::Set => RecordTag::Set,
            RequestOp::Get => RecordTag::Get,
            RequestOp::Notify => RecordTag::NotifyRequest,
            RequestOp::BulkCreate => RecordTag::BulkCreate,
            RequestOp::BulkSet | RequestOp::BulkRemove | RequestOp::BulkGet => RecordTag::BulkSet,
        };

        if fields.is_empty() {
            self.recorder.record(tag, key);
        } else {
            self.recorder
                .record(tag, &format!("{key}|{}", Recorder::join_fields(fields)));
        }
    }

    /// INIT_VIEW / APPLY_VIEW handshake.
    fn handle_notify(
        &self,
        state: &mut DaemonState,
        payload: &str,
    ) -> SyncdResult<RequestResponse> {
        if !self.ctx.parameters.use_temp_view {
            info!("{payload} ignored, temporary view is disabled");
            return Ok(RequestResponse::status(SaiStatus::Success));
        }

        if state.very_first_run && state.first_init_performed && payload == NOTIFY_INIT_VIEW {
            // second INIT_VIEW of the first cycle: the producer restarted
            // before applying; fall through to the regular handling
            state.very_first_run = false;
        }

        if state.very_first_run {
            return match payload {
                NOTIFY_INIT_VIEW => {
                    // nothing exists yet, apply writes directly on the ASIC
                    state.init_view_mode = false;
                    state.first_init_performed = true;
                    self.clear_temp_view(state);
                    Ok(RequestResponse::status(SaiStatus::Success))
                }
                NOTIFY_APPLY_VIEW => {
                    state.very_first_run = false;
                    state.init_view_mode = false;
                    Ok(RequestResponse::status(SaiStatus::Success))
                }
                other => Err(SyncdError::UnknownOperation(other.to_string())),
            };
        }

        match payload {
            NOTIFY_INIT_VIEW => {
                if state.init_view_mode {
                    warn!("received INIT_VIEW while already collecting, producer restarted?");
                }
                state.init_view_mode = true;
                self.clear_temp_view(state);
                info!("switched to init view mode, writes go to the temporary view");
                Ok(RequestResponse::status(SaiStatus::Success))
            }
            NOTIFY_APPLY_VIEW => {
                state.init_view_mode = false;
                let status = self.apply_view(state)?;
                Ok(RequestResponse::status(status))
            }
            other => Err(SyncdError::UnknownOperation(other.to_string())),
        }
    }

    fn clear_temp_view(&self, state: &mut DaemonState) {
        store::clear_table(self.store.as_ref(), &temp_table());
        state.init_view_removed_vids.clear();
    }

    /// Run the APPLY: load both views, reconcile, execute, persist.
    ///
    /// A failure before execution is recoverable: the temporary view is
    /// discarded and a failure status returned. A failure during execution
    /// propagates as a fatal error; the caller must exit the process.
    fn apply_view(&self, state: &mut DaemonState) -> SyncdResult<SaiStatus> {
        let Some(sw) = state.switch.as_mut() else {
            error!("APPLY_VIEW without a switch");
            return Ok(SaiStatus::Failure);
        };

        let staged = || -> SyncdResult<(AsicView, AsicView)> {
            let mut current = AsicView::load(self.store.as_ref(), ASIC_STATE_TABLE)?;
            current.rid_to_vid = store::read_object_map(self.store.as_ref(), RIDTOVID);
            current.vid_to_rid = store::read_object_map(self.store.as_ref(), VIDTORID);

            let mut temp = AsicView::load(self.store.as_ref(), &temp_table())?;

            let mut reconciler = Reconciler::new(&self.ctx, &mut current, &mut temp, sw);
            reconciler.reconcile(&state.init_view_removed_vids)?;

            Ok((current, temp))
        }();

        let (mut current, mut temp) = match staged {
            Ok(views) => views,
            Err(err) => {
                // stage one is non destructive, the current state stays
                // authoritative and the daemon keeps running
                error!("apply view failed before execution: {err}");
                return Ok(SaiStatus::Failure);
            }
        };

        let mut executor = Executor::new(self.api.as_ref(), &mut current, &mut temp, sw);
        executor.execute()?;

        persist_applied_view(self.store.as_ref(), &temp);

        // vid mappings may have changed under the applied view
        self.translator.clear_local();
        state.init_view_removed_vids.clear();

        Ok(SaiStatus::Success)
    }

    fn handle_create(
        &self,
        state: &mut DaemonState,
        key: &str,
        fields: &[(String, String)],
    ) -> SyncdResult<RequestResponse> {
        let (object_type, object_key) = parse_request_key(key)?;
        let attrs = parse_attrs(object_type, fields)?;

        if object_type == ObjectType::Switch {
            let vid = object_key.oid().ok_or_else(|| {
                SyncdError::CorruptedView("switch create without an oid".to_string())
            })?;
            self.create_switch(state, vid, &attrs)?;
            self.write_request_row(state, object_type, &object_key, fields);
            return Ok(RequestResponse::status(SaiStatus::Success));
        }

        if state.init_view_mode {
            self.write_request_row(state, object_type, &object_key, fields);
            return Ok(RequestResponse::status(SaiStatus::Success));
        }

        match &object_key {
            ObjectKey::Oid(vid) => {
                let switch_rid = self.translator.vid_to_rid(vid.switch_id()?)?;
                let attrs = self.translate_request_attrs(&attrs)?;

                let rid = self
                    .api
                    .create_object(object_type, switch_rid, &attrs)
                    .map_err(|status| SyncdError::Driver {
                        operation: format!("create {object_type}"),
                        status,
                    })?;

                self.translator.save(rid, *vid);
            }
            entry_key => {
                let translated = self.translator.entry_vids_to_rids(entry_key)?;
                let attrs = self.translate_request_attrs(&attrs)?;

                self.api
                    .create_entry(&translated, &attrs)
                    .map_err(|status| SyncdError::Driver {
                        operation: format!("create {object_type}"),
                        status,
                    })?;
            }
        }

        self.write_request_row(state, object_type, &object_key, fields);
        Ok(RequestResponse::status(SaiStatus::Success))
    }

    /// The switch is special even in init view mode: it must exist for the
    /// producer to query port and capability attributes while collecting.
    fn create_switch(
        &self,
        state: &mut DaemonState,
        vid: ObjectId,
        attrs: &[Attribute],
    ) -> SyncdResult<()> {
        if let Some(sw) = &state.switch {
            if sw.vid() != vid {
                return Err(SyncdError::SwitchMismatch(format!(
                    "created switch vid {vid} does not match existing {}",
                    sw.vid()
                )));
            }

            let requested = attrs
                .iter()
                .find(|attr| attr.name() == metadata::SWITCH_HARDWARE_INFO)
                .map(|attr| attr.serialized_value())
                .unwrap_or_default();
            if sw.hardware_info() != requested {
                return Err(SyncdError::SwitchMismatch(format!(
                    "hardware info mismatch: '{}' vs '{requested}'",
                    sw.hardware_info()
                )));
            }

            return Ok(());
        }

        let rid = self
            .api
            .create_object(ObjectType::Switch, ObjectId::NULL, attrs)
            .map_err(|status| SyncdError::Driver {
                operation: "create switch".to_string(),
                status,
            })?;

        info!("created switch vid {vid} rid {rid}");

        self.translator.save(rid, vid);
        self.allocator.reserve_switch_index(vid.switch_index());

        state.switch = Some(SaiSwitch::new(
            &self.ctx,
            self.store.as_ref(),
            self.api.as_ref(),
            &self.translator,
            vid,
            rid,
        )?);

        Ok(())
    }

    fn handle_remove(
        &self,
        state: &mut DaemonState,
        key: &str,
    ) -> SyncdResult<RequestResponse> {
        let (object_type, object_key) = parse_request_key(key)?;

        if state.init_view_mode {
            let table_key = store::object_key(&temp_table(), object_type, &object_key.serialize());
            self.store.del(&table_key);

            if let Some(vid) = object_key.oid() {
                state.init_view_removed_vids.insert(vid);
            }
            return Ok(RequestResponse::status(SaiStatus::Success));
        }

        match &object_key {
            ObjectKey::Oid(vid) => {
                let rid = self.translator.vid_to_rid(*vid)?;

                self.api
                    .remove_object(object_type, rid)
                    .map_err(|status| SyncdError::Driver {
                        operation: format!("remove {object_type}"),
                        status,
                    })?;

                if let Some(sw) = state.switch.as_mut() {
                    if sw.is_default_created_rid(rid) {
                        sw.remove_existing_object_reference(rid)?;
                    }
                }

                self.forget_pair(rid, *vid);
            }
            entry_key => {
                let translated = self.translator.entry_vids_to_rids(entry_key)?;
                self.api
                    .remove_entry(&translated)
                    .map_err(|status| SyncdError::Driver {
                        operation: format!("remove {object_type}"),
                        status,
                    })?;
            }
        }

        let table_key = store::object_key(ASIC_STATE_TABLE, object_type, &object_key.serialize());
        self.store.del(&table_key);
        Ok(RequestResponse::status(SaiStatus::Success))
    }

    fn forget_pair(&self, rid: ObjectId, vid: ObjectId) {
        // the persisted hashes have no field-level delete in this store
        // abstraction; rewrite both without the pair
        for (table, drop_key) in [(VIDTORID, vid.to_string()), (RIDTOVID, rid.to_string())] {
            let rows = self.store.hgetall(table);
            self.store.del(table);
            for (field, value) in rows {
                if field != drop_key {
                    self.store.hset(table, &field, &value);
                }
            }
        }
        self.translator.clear_local();
    }

    fn handle_set(
        &self,
        state: &mut DaemonState,
        key: &str,
        fields: &[(String, String)],
    ) -> SyncdResult<RequestResponse> {
        let (object_type, object_key) = parse_request_key(key)?;
        let attrs = parse_attrs(object_type, fields)?;

        if state.init_view_mode {
            self.write_request_row(state, object_type, &object_key, fields);
            return Ok(RequestResponse::status(SaiStatus::Success));
        }

        for attr in &attrs {
            let attr = self.translate_request_attrs(std::slice::from_ref(attr))?;
            let attr = &attr[0];

            let result = match &object_key {
                ObjectKey::Oid(vid) => {
                    let rid = self.translator.vid_to_rid(*vid)?;
                    self.api.set_object_attribute(object_type, rid, attr)
                }
                entry_key => {
                    let translated = self.translator.entry_vids_to_rids(entry_key)?;
                    self.api.set_entry_attribute(&translated, attr)
                }
            };

            if let Err(status) = result {
                if object_type == ObjectType::Switch
                    && attr.name() == metadata::SWITCH_SRC_MAC_ADDRESS
                {
                    warn!("ignoring {status} setting switch mac, known driver limitation");
                } else {
                    return Err(SyncdError::Driver {
                        operation: format!("set {} on {object_type}", attr.name()),
                        status,
                    });
                }
            }
        }

        self.write_request_row(state, object_type, &object_key, fields);
        Ok(RequestResponse::status(SaiStatus::Success))
    }

    /// Gets always hit the driver. Any real id surfacing for the first time
    /// in the response is assigned a virtual id on the spot, and the
    /// returned values are written back into the active view table so the
    /// comparison logic later knows about them.
    fn handle_get(
        &self,
        state: &mut DaemonState,
        key: &str,
        fields: &[(String, String)],
    ) -> SyncdResult<RequestResponse> {
        let (object_type, object_key) = parse_request_key(key)?;

        let names: Vec<&str> = fields.iter().map(|(name, _)| name.as_str()).collect();

        let result = match &object_key {
            ObjectKey::Oid(vid) => {
                let rid = self.translator.vid_to_rid(*vid)?;
                self.api.get_object_attributes(object_type, rid, &names)
            }
            _ => return Ok(RequestResponse::status(SaiStatus::NotSupported)),
        };

        match result {
            Ok(attrs) => {
                let switch_vid = object_key.oid().expect("oid checked above").switch_id()?;

                let mut out = Vec::new();
                for attr in &attrs {
                    let translated = self.translator.attr_rids_to_vids(attr, switch_vid)?;
                    self.snoop_response_attr(state, object_type, &object_key, &translated);
                    out.push((translated.name().to_string(), translated.serialized_value()));
                }

                Ok(RequestResponse {
                    status: SaiStatus::Success,
                    fields: out,
                })
            }
            Err(SaiStatus::BufferOverflow) => Ok(RequestResponse {
                status: SaiStatus::BufferOverflow,
                fields: vec![("COUNT".to_string(), names.len().to_string())],
            }),
            Err(status) => Ok(RequestResponse::status(status)),
        }
    }

    /// Record a get response value into the view the producer is building.
    /// Read-only values are skipped: they can never be created or set, so
    /// the comparison logic must not see them.
    fn snoop_response_attr(
        &self,
        state: &DaemonState,
        object_type: ObjectType,
        object_key: &ObjectKey,
        attr: &Attribute,
    ) {
        if attr.meta.flags.read_only {
            return;
        }

        let table = if state.init_view_mode {
            temp_table()
        } else {
            ASIC_STATE_TABLE.to_string()
        };

        let table_key = store::object_key(&table, object_type, &object_key.serialize());
        self.store
            .hset(&table_key, attr.name(), &attr.serialized_value());
    }

    /// Bulk requests: `key` is `TYPE:count`, each field is one serialized
    /// object id with its joined attributes.
    fn handle_bulk(
        &self,
        state: &mut DaemonState,
        key: &str,
        fields: &[(String, String)],
        each: RequestOp,
    ) -> SyncdResult<RequestResponse> {
        let object_type: ObjectType = key
            .split(':')
            .next()
            .unwrap_or_default()
            .parse()
            .map_err(|_| SyncdError::UnknownOperation(format!("bad bulk key {key}")))?;

        for (object_id, joined) in fields {
            let member_key = format!("{object_type}:{object_id}");
            let member_fields = split_joined_fields(joined);

            match each {
                RequestOp::Create => {
                    self.handle_create(state, &member_key, &member_fields)?;
                }
                RequestOp::Set => {
                    self.handle_set(state, &member_key, &member_fields)?;
                }
                _ => return Ok(RequestResponse::status(SaiStatus::NotImplemented)),
            }
        }

        Ok(RequestResponse::status(SaiStatus::Success))
    }

    /// Mirror a producer write into the table backing the view it belongs
    /// to (temporary while collecting, active otherwise).
    fn write_request_row(
        &self,
        state: &DaemonState,
        object_type: ObjectType,
        object_key: &ObjectKey,
        fields: &[(String, String)],
    ) {
        let table = if state.init_view_mode {
            temp_table()
        } else {
            ASIC_STATE_TABLE.to_string()
        };

        let table_key = store::object_key(&table, object_type, &object_key.serialize());

        if fields.is_empty() {
            self.store.hset(&table_key, "NULL", "NULL");
        } else {
            for (field, value) in fields {
                self.store.hset(&table_key, field, value);
            }
        }
    }

    fn translate_request_attrs(&self, attrs: &[Attribute]) -> SyncdResult<Vec<Attribute>> {
        attrs
            .iter()
            .map(|attr| self.translator.attr_vids_to_rids(attr))
            .collect()
    }

    /// Driver events are serialized under the same mutex as requests.
    pub fn process_notification(&self, event: &NotificationEvent) -> SyncdResult<()> {
        let state = self.state.lock();

        self.recorder.record(
            RecordTag::Notification,
            &format!(
                "{}|{}|{}",
                event.kind,
                event.payload,
                Recorder::join_fields(&event.fields)
            ),
        );

        match event.kind {
            NotificationKind::FdbEvent => {
                // learned entries carry bridge port rids the producer has
                // never seen; mint vids before anything downstream reads
                // the event
                if let Some(sw) = &state.switch {
                    for (field, value) in &event.fields {
                        if field.ends_with("BRIDGE_PORT_ID") {
                            if let Ok(rid) = value.parse::<ObjectId>() {
                                self.translator.rid_to_vid(rid, sw.vid())?;
                            }
                        }
                    }
                }
            }
            NotificationKind::SwitchStateChange
            | NotificationKind::PortStateChange
            | NotificationKind::QueuePfcDeadlock
            | NotificationKind::PacketEvent
            | NotificationKind::SwitchShutdownRequest => {
                debug!("notification {}: {}", event.kind, event.payload);
            }
        }

        Ok(())
    }

    /// Shutdown channel handling. WARM is recognized but unsupported; the
    /// caller exits either way, WARM just reports the error first.
    pub fn handle_shutdown_request(&self, request: ShutdownRequest) -> SyncdResult<()> {
        match request {
            ShutdownRequest::Cold => {
                info!("cold shutdown requested");
                Ok(())
            }
            ShutdownRequest::Warm => {
                error!("warm shutdown requested, not supported, shutting down cold");
                Err(SyncdError::WarmRestartUnsupported)
            }
        }
    }

    /// Signal-safe hook for external log rotation.
    pub fn request_recording_rotate(&self) {
        self.recorder.request_rotate();
    }
}

fn temp_table() -> String {
    format!("{TEMP_PREFIX}{ASIC_STATE_TABLE}")
}

/// Parse a `TYPE:serialized_id` request key.
pub fn parse_request_key(key: &str) -> SyncdResult<(ObjectType, ObjectKey)> {
    let (str_type, str_id) = key
        .split_once(':')
        .ok_or_else(|| SyncdError::UnknownOperation(format!("bad request key {key}")))?;

    let object_type: ObjectType = str_type
        .parse()
        .map_err(|_| SyncdError::UnknownOperation(format!("bad object type in {key}")))?;

    Ok((object_type, ObjectKey::parse(object_type, str_id)?))
}

fn parse_attrs(
    object_type: ObjectType,
    fields: &[(String, String)],
) -> SyncdResult<Vec<Attribute>> {
    fields
        .iter()
        .filter(|(name, _)| name != "NULL")
        .map(|(name, value)| Ok(Attribute::parse(object_type, name, value)?))
        .collect()
}

fn split_joined_fields(joined: &str) -> Vec<(String, String)> {
    joined
        .split('|')
        .filter_map(|part| {
            part.split_once('=')
                .map(|(f, v)| (f.to_string(), v.to_string()))
        })
        .collect()
}

/// One driver event as consumed by the notification thread.
#[derive(Clone, Debug)]
pub struct NotificationEvent {
    pub kind: NotificationKind,
    pub payload: String,
    pub fields: Vec<(String, String)>,
}

/// Dedicated thread draining a bounded event channel; the processing itself
/// happens under the daemon mutex.
pub struct NotificationDispatcher {
    sender: mpsc::Sender<NotificationEvent>,
}

pub struct NotificationDispatcherHandle {
    join_handle: thread::JoinHandle<()>,
}

impl NotificationDispatcherHandle {
    pub fn join(self) {
        self.join_handle.join().ok();
    }
}

impl NotificationDispatcher {
    pub fn start(syncd: Arc<Syncd>) -> (Self, NotificationDispatcherHandle) {
        let (sender, mut receiver) =
            mpsc::channel::<NotificationEvent>(syncd.ctx.parameters.notification_queue_size);

        let join_handle = thread::Builder::new()
            .name("syncd-notifications".to_string())
            .spawn(move || {
                while let Some(event) = receiver.blocking_recv() {
                    if let Err(err) = syncd.process_notification(&event) {
                        error!("failed to process notification: {err}");
                    }
                }
                debug!("notification channel closed");
            })
            .expect("spawning notification thread");

        (Self { sender }, NotificationDispatcherHandle { join_handle })
    }

    /// Called from the driver callback context; drops the event with a log
    /// line when the queue is saturated rather than blocking the driver.
    pub fn enqueue(&self, event: NotificationEvent) {
        if let Err(err) = self.sender.try_send(event) {
            warn!("notification queue full, dropping event: {err}");
        }
    }
}
