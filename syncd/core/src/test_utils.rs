// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Shared test fixtures: a scripted fake driver and view builders.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use syncd_sai::{
    AttrValue, Attribute, ObjectId, ObjectKey, ObjectType, SaiApi, SaiResult, SaiStatus,
};

/// Scripted in-memory driver.
///
/// Objects and get results are seeded up front; every mutating call is
/// appended to a call log that tests assert on.
#[derive(Default)]
pub struct FakeSai {
    inner: Mutex<FakeSaiInner>,
}

#[derive(Default)]
struct FakeSaiInner {
    next_rid: u64,
    objects: HashMap<ObjectId, (ObjectType, BTreeMap<&'static str, Attribute>)>,
    entries: BTreeMap<String, BTreeMap<&'static str, Attribute>>,
    gets: HashMap<(ObjectId, String), AttrValue>,
    fail_set: Vec<(ObjectType, String)>,
    calls: Vec<String>,
}

impl FakeSai {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_object(&self, object_type: ObjectType, rid: ObjectId, attrs: Vec<Attribute>) {
        let mut inner = self.inner.lock();
        let attrs = attrs.into_iter().map(|a| (a.name(), a)).collect();
        inner.objects.insert(rid, (object_type, attrs));
    }

    pub fn seed_get(&self, rid: ObjectId, name: &str, value: AttrValue) {
        self.inner.lock().gets.insert((rid, name.to_string()), value);
    }

    pub fn seed_entry(&self, key: &ObjectKey, attrs: Vec<Attribute>) {
        let mut inner = self.inner.lock();
        let attrs = attrs.into_iter().map(|a| (a.name(), a)).collect();
        inner.entries.insert(key.serialize(), attrs);
    }

    /// Make every set of `(object_type, attr)` fail with FAILURE.
    pub fn fail_set(&self, object_type: ObjectType, name: &str) {
        self.inner
            .lock()
            .fail_set
            .push((object_type, name.to_string()));
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().calls.clone()
    }

    pub fn has_object(&self, rid: ObjectId) -> bool {
        self.inner.lock().objects.contains_key(&rid)
    }

    pub fn has_entry(&self, key: &ObjectKey) -> bool {
        self.inner.lock().entries.contains_key(&key.serialize())
    }

    pub fn object_attr(&self, rid: ObjectId, name: &str) -> Option<AttrValue> {
        self.inner
            .lock()
            .objects
            .get(&rid)?
            .1
            .get(name)
            .map(|a| a.value.clone())
    }

    pub fn entry_attr(&self, key: &ObjectKey, name: &str) -> Option<AttrValue> {
        self.inner
            .lock()
            .entries
            .get(&key.serialize())?
            .get(name)
            .map(|a| a.value.clone())
    }
}

impl SaiApi for FakeSai {
    fn create_object(
        &self,
        object_type: ObjectType,
        _switch_rid: ObjectId,
        attrs: &[Attribute],
    ) -> SaiResult<ObjectId> {
        let mut inner = self.inner.lock();
        inner.next_rid += 1;
        // fake rids keep a decodable object type in the virtual layout,
        // vendors guarantee no more than that
        let rid = ObjectId::encode(object_type, 0x7, 0x1000 + inner.next_rid);

        let attr_map = attrs.iter().map(|a| (a.name(), a.clone())).collect();
        inner.objects.insert(rid, (object_type, attr_map));
        inner.calls.push(format!("create {object_type} -> {rid}"));
        Ok(rid)
    }

    fn remove_object(&self, object_type: ObjectType, rid: ObjectId) -> SaiResult<()> {
        let mut inner = self.inner.lock();
        if inner.objects.remove(&rid).is_none() {
            return Err(SaiStatus::ItemNotFound);
        }
        inner.calls.push(format!("remove {object_type} {rid}"));
        Ok(())
    }

    fn set_object_attribute(
        &self,
        object_type: ObjectType,
        rid: ObjectId,
        attr: &Attribute,
    ) -> SaiResult<()> {
        let mut inner = self.inner.lock();

        if inner
            .fail_set
            .iter()
            .any(|(ot, name)| *ot == object_type && name == attr.name())
        {
            return Err(SaiStatus::Failure);
        }

        let Some((_, attrs)) = inner.objects.get_mut(&rid) else {
            return Err(SaiStatus::ItemNotFound);
        };
        attrs.insert(attr.name(), attr.clone());
        inner.calls.push(format!(
            "set {object_type} {rid} {}={}",
            attr.name(),
            attr.serialized_value()
        ));
        Ok(())
    }

    fn get_object_attributes(
        &self,
        object_type: ObjectType,
        rid: ObjectId,
        names: &[&str],
    ) -> SaiResult<Vec<Attribute>> {
        let inner = self.inner.lock();
        let mut out = Vec::new();

        for name in names {
            if let Some(value) = inner.gets.get(&(rid, name.to_string())) {
                let meta = syncd_sai::metadata::get(object_type, name)
                    .ok_or(SaiStatus::InvalidParameter)?;
                out.push(Attribute::new(meta, value.clone()));
                continue;
            }

            match inner.objects.get(&rid) {
                Some((_, attrs)) => match attrs.get(*name) {
                    Some(attr) => out.push(attr.clone()),
                    None => return Err(SaiStatus::NotSupported),
                },
                None => return Err(SaiStatus::ItemNotFound),
            }
        }

        Ok(out)
    }

    fn create_entry(&self, key: &ObjectKey, attrs: &[Attribute]) -> SaiResult<()> {
        let mut inner = self.inner.lock();
        let serialized = key.serialize();
        let attr_map = attrs.iter().map(|a| (a.name(), a.clone())).collect();
        inner.entries.insert(serialized.clone(), attr_map);
        inner.calls.push(format!("create entry {serialized}"));
        Ok(())
    }

    fn remove_entry(&self, key: &ObjectKey) -> SaiResult<()> {
        let mut inner = self.inner.lock();
        let serialized = key.serialize();
        if inner.entries.remove(&serialized).is_none() {
            return Err(SaiStatus::ItemNotFound);
        }
        inner.calls.push(format!("remove entry {serialized}"));
        Ok(())
    }

    fn set_entry_attribute(&self, key: &ObjectKey, attr: &Attribute) -> SaiResult<()> {
        let mut inner = self.inner.lock();
        let serialized = key.serialize();
        let Some(attrs) = inner.entries.get_mut(&serialized) else {
            return Err(SaiStatus::ItemNotFound);
        };
        attrs.insert(attr.name(), attr.clone());
        inner.calls.push(format!(
            "set entry {serialized} {}={}",
            attr.name(),
            attr.serialized_value()
        ));
        Ok(())
    }
}
