// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use parking_lot::Mutex;
use syncd_sai::{ObjectId, ObjectType};
use tracing::debug;

use crate::error::{SyncdError, SyncdResult};
use crate::store::{StateStore, VID_COUNTER};

pub const MAX_SWITCHES: usize = 256;

/// Mints virtual ids.
///
/// Switch ids are deterministic: the sequence number equals the switch
/// index, so a switch created again after restart receives the same id.
/// All other ids draw their sequence number from a persistent monotonic
/// counter and are never recycled (48 bits do not run out).
pub struct VidAllocator {
    store: Arc<dyn StateStore>,
    switch_slots: Mutex<[bool; MAX_SWITCHES]>,
}

impl VidAllocator {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            switch_slots: Mutex::new([false; MAX_SWITCHES]),
        }
    }

    pub fn allocate_switch_vid(&self) -> SyncdResult<ObjectId> {
        let mut slots = self.switch_slots.lock();

        let index = slots
            .iter()
            .position(|used| !used)
            .ok_or(SyncdError::NoFreeSwitchIndex)?;
        slots[index] = true;

        debug!("allocated switch index {index:#x}");

        Ok(ObjectId::encode(
            ObjectType::Switch,
            index as u8,
            index as u64,
        ))
    }

    /// Mint a fresh virtual id for an object living on `switch_vid`.
    pub fn allocate_object_vid(
        &self,
        object_type: ObjectType,
        switch_vid: ObjectId,
    ) -> SyncdResult<ObjectId> {
        if object_type == ObjectType::Switch {
            return self.allocate_switch_vid();
        }

        if switch_vid.object_type() != Some(ObjectType::Switch) {
            return Err(SyncdError::InvalidSwitchVid(switch_vid));
        }

        let sequence = self.store.incr(VID_COUNTER);
        let vid = ObjectId::encode(object_type, switch_vid.switch_index(), sequence);

        debug!("allocated vid {vid}");

        Ok(vid)
    }

    /// Release a switch index. Non-switch ids are not recycled.
    pub fn free_vid(&self, vid: ObjectId) {
        if vid.object_type() == Some(ObjectType::Switch) {
            self.switch_slots.lock()[vid.switch_index() as usize] = false;

            debug!("freed switch index {:#x}", vid.switch_index());
        }
    }

    /// Mark a switch index as occupied, used when adopting a switch that
    /// already exists in the database.
    pub fn reserve_switch_index(&self, index: u8) {
        self.switch_slots.lock()[index as usize] = true;
    }
}
