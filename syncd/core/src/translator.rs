// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Runtime RID/VID translation.
//!
//! Used on the direct request path (outside APPLY). Backed by the persisted
//! map hashes with a local cache in front; a real id seen for the first time
//! (snooped from a get response or a notification) is assigned a fresh
//! virtual id on the spot and both hashes are updated.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use syncd_sai::{Attribute, ObjectId, ObjectKey, ObjectType};
use tracing::debug;

use crate::allocator::VidAllocator;
use crate::error::{SyncdError, SyncdResult};
use crate::store::{StateStore, RIDTOVID, VIDTORID};

pub struct RidVidTranslator {
    store: Arc<dyn StateStore>,
    allocator: Arc<VidAllocator>,
    local: Mutex<LocalMaps>,
}

#[derive(Default)]
struct LocalMaps {
    rid_to_vid: HashMap<ObjectId, ObjectId>,
    vid_to_rid: HashMap<ObjectId, ObjectId>,
}

impl RidVidTranslator {
    pub fn new(store: Arc<dyn StateStore>, allocator: Arc<VidAllocator>) -> Self {
        Self {
            store,
            allocator,
            local: Mutex::new(LocalMaps::default()),
        }
    }

    /// Record a known pair in the persistent hashes and the local cache.
    pub fn save(&self, rid: ObjectId, vid: ObjectId) {
        self.store
            .hset(VIDTORID, &vid.to_string(), &rid.to_string());
        self.store
            .hset(RIDTOVID, &rid.to_string(), &vid.to_string());

        let mut local = self.local.lock();
        local.rid_to_vid.insert(rid, vid);
        local.vid_to_rid.insert(vid, rid);
    }

    /// The local cache is only valid for one applied view; APPLY success
    /// invalidates it.
    pub fn clear_local(&self) {
        let mut local = self.local.lock();
        local.rid_to_vid.clear();
        local.vid_to_rid.clear();
    }

    pub fn vid_to_rid(&self, vid: ObjectId) -> SyncdResult<ObjectId> {
        if vid.is_null() {
            return Ok(ObjectId::NULL);
        }

        if let Some(rid) = self.local.lock().vid_to_rid.get(&vid) {
            return Ok(*rid);
        }

        let rid: ObjectId = self
            .store
            .hget(VIDTORID, &vid.to_string())
            .and_then(|s| s.parse().ok())
            .ok_or(SyncdError::UnresolvedVid(vid))?;

        self.local.lock().vid_to_rid.insert(vid, rid);

        Ok(rid)
    }

    /// Translate a real id to its virtual id, minting a fresh one when the
    /// id was never seen before. `switch_vid` owns any minted id.
    pub fn rid_to_vid(&self, rid: ObjectId, switch_vid: ObjectId) -> SyncdResult<ObjectId> {
        if rid.is_null() {
            return Ok(ObjectId::NULL);
        }

        if let Some(vid) = self.local.lock().rid_to_vid.get(&rid) {
            return Ok(*vid);
        }

        if let Some(vid) = self
            .store
            .hget(RIDTOVID, &rid.to_string())
            .and_then(|s| s.parse().ok())
        {
            self.local.lock().rid_to_vid.insert(rid, vid);
            return Ok(vid);
        }

        let object_type = rid
            .object_type()
            .ok_or(SyncdError::Model(syncd_sai::SaiError::UnknownObjectType(rid)))?;

        if object_type == ObjectType::Switch {
            // switch pairs are recorded at creation, a miss means the maps
            // are corrupted
            return Err(SyncdError::UnresolvedRid(rid));
        }

        let vid = self.allocator.allocate_object_vid(object_type, switch_vid)?;

        debug!("spotted new rid {rid}, assigned vid {vid}");

        self.save(rid, vid);

        Ok(vid)
    }

    /// Rewrite every virtual id in `attr` to its real id.
    pub fn attr_vids_to_rids(&self, attr: &Attribute) -> SyncdResult<Attribute> {
        Ok(Attribute::new(
            attr.meta,
            attr.value.try_map_oids(&mut |vid| self.vid_to_rid(vid))?,
        ))
    }

    /// Rewrite every real id in `attr` to a virtual id, minting as needed.
    pub fn attr_rids_to_vids(
        &self,
        attr: &Attribute,
        switch_vid: ObjectId,
    ) -> SyncdResult<Attribute> {
        Ok(Attribute::new(
            attr.meta,
            attr.value
                .try_map_oids(&mut |rid| self.rid_to_vid(rid, switch_vid))?,
        ))
    }

    /// Rewrite an entry key's struct members from virtual to real space.
    pub fn entry_vids_to_rids(&self, key: &ObjectKey) -> SyncdResult<ObjectKey> {
        key.try_map_member_oids(&mut |vid| self.vid_to_rid(vid))
    }
}
