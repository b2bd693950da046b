// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Pairing of temporary-view objects with current-view objects.
//!
//! Identity matching by shared virtual id happens up front in
//! [`match_oids`]; everything else goes through [`find_best_match`], which
//! compares attributes across views through real-id translation.

use rand::rngs::StdRng;
use rand::Rng;
use syncd_sai::{ObjectId, ObjectKey, ObjectType};
use tracing::{debug, info, warn};

use crate::error::{SyncdError, SyncdResult};
use crate::view::{AsicView, ObjIdx, ObjectStatus};

/// Pair objects that carry the same virtual id in both views. Their real
/// ids are necessarily the same, so both sides are marked `Matched` and the
/// id pair is copied into the temporary view's maps.
pub fn match_oids(current: &mut AsicView, temp: &mut AsicView) {
    let temp_vids: Vec<ObjectId> = temp
        .all_objects()
        .into_iter()
        .filter_map(|idx| temp.obj(idx).key.oid())
        .collect();

    let mut matched = 0usize;
    for vid in temp_vids {
        let Some(current_idx) = current.lookup_oid(vid) else {
            continue;
        };
        let temp_idx = temp.lookup_oid(vid).expect("vid taken from temp view");

        let rid = *current
            .vid_to_rid
            .get(&vid)
            .expect("current view object has a real id");

        temp.rid_to_vid.insert(rid, vid);
        temp.vid_to_rid.insert(vid, rid);

        current.obj_mut(current_idx).status = ObjectStatus::Matched;
        temp.obj_mut(temp_idx).status = ObjectStatus::Matched;

        matched += 1;
        debug!("matched {} rid {rid} vid {vid}", temp.obj(temp_idx).object_type);
    }

    info!("matched {matched} objects by virtual id");
}

/// Compare one attribute across views.
///
/// Returns true only when the attribute is present on both objects and the
/// values are equal; object id values are equal when they resolve to the
/// same real id.
pub fn equal_attribute(
    current: &AsicView,
    temp: &AsicView,
    current_idx: ObjIdx,
    temp_idx: ObjIdx,
    name: &str,
) -> bool {
    let (Some(current_attr), Some(temp_attr)) =
        (current.obj(current_idx).attr(name), temp.obj(temp_idx).attr(name))
    else {
        return false;
    };

    if current_attr.value == temp_attr.value {
        // equal values; for oid attributes equal vids imply equal rids
        return true;
    }

    if !current_attr.is_oid_attr() {
        return false;
    }

    equal_oid_lists(
        current,
        temp,
        &current_attr.oids(),
        &temp_attr.oids(),
    )
}

/// Element-wise comparison of oid lists across views, order significant.
pub fn equal_oid_lists(
    current: &AsicView,
    temp: &AsicView,
    current_oids: &[ObjectId],
    temp_oids: &[ObjectId],
) -> bool {
    if current_oids.len() != temp_oids.len() {
        return false;
    }

    for (&current_vid, &temp_vid) in current_oids.iter().zip(temp_oids) {
        if current_vid.is_null() && temp_vid.is_null() {
            continue;
        }
        if current_vid.is_null() || temp_vid.is_null() {
            return false;
        }

        if current_vid.object_type() != temp_vid.object_type() {
            return false;
        }

        // A temporary vid with no real id yet belongs to an object that will
        // be created later; it cannot equal anything that already exists.
        let Some(&temp_rid) = temp.vid_to_rid.get(&temp_vid) else {
            debug!("temporary vid {temp_vid} has no rid yet, values differ");
            return false;
        };

        let Some(&current_rid) = current.vid_to_rid.get(&current_vid) else {
            warn!("current vid {current_vid} has no rid, treating as different");
            return false;
        };

        if temp_rid != current_rid {
            return false;
        }
    }

    true
}

/// Rewrite an entry key's embedded vids from temporary space to current
/// space through the shared real ids. `None` when some member has no real
/// id yet (its object was not matched), in which case the entry will be
/// recreated after its dependencies settle.
fn rewrite_entry_key_to_current(
    current: &AsicView,
    temp: &AsicView,
    key: &ObjectKey,
) -> Option<ObjectKey> {
    key.try_map_member_oids(&mut |temp_vid| {
        let rid = temp.vid_to_rid.get(&temp_vid).ok_or(())?;
        current.rid_to_vid.get(rid).copied().ok_or(())
    })
    .ok()
}

/// Find the best current-view counterpart for a temporary object.
pub fn find_best_match(
    current: &AsicView,
    temp: &AsicView,
    temp_idx: ObjIdx,
    rng: &mut StdRng,
) -> SyncdResult<Option<ObjIdx>> {
    let temp_obj = temp.obj(temp_idx);

    if temp_obj.is_oid_object() && temp_obj.status == ObjectStatus::Matched {
        // same vid in both views, the counterpart is a direct lookup
        return Ok(current.lookup_oid(temp_obj.vid()));
    }

    match temp_obj.object_type {
        ObjectType::RouteEntry | ObjectType::NeighborEntry | ObjectType::FdbEntry => {
            find_best_match_for_entry(current, temp, temp_idx)
        }
        ObjectType::Switch => find_best_match_for_switch(current),
        _ => find_best_match_for_generic(current, temp, temp_idx, rng),
    }
}

fn find_best_match_for_entry(
    current: &AsicView,
    temp: &AsicView,
    temp_idx: ObjIdx,
) -> SyncdResult<Option<ObjIdx>> {
    let key = &temp.obj(temp_idx).key;

    let Some(rewritten) = rewrite_entry_key_to_current(current, temp, key) else {
        return Ok(None);
    };

    let serialized = rewritten.serialize();
    let Some(current_idx) = current.lookup_key(&serialized) else {
        debug!("no current entry for {serialized}");
        return Ok(None);
    };

    if current.obj(current_idx).status != ObjectStatus::NotProcessed {
        // the same entry cannot correspond to two temporary objects
        return Err(SyncdError::DuplicateNonOidMatch(serialized));
    }

    Ok(Some(current_idx))
}

fn find_best_match_for_switch(current: &AsicView) -> SyncdResult<Option<ObjIdx>> {
    let switches = current.objects_by_type(ObjectType::Switch);

    match switches.as_slice() {
        [] => Ok(None),
        [idx] => {
            if current.obj(*idx).status == ObjectStatus::NotProcessed {
                Ok(Some(*idx))
            } else {
                Err(SyncdError::DuplicateNonOidMatch(
                    current.obj(*idx).serialized_key(),
                ))
            }
        }
        _ => Err(SyncdError::SwitchMismatch(format!(
            "{} switches in current view",
            switches.len()
        ))),
    }
}

fn find_best_match_for_generic(
    current: &AsicView,
    temp: &AsicView,
    temp_idx: ObjIdx,
    rng: &mut StdRng,
) -> SyncdResult<Option<ObjIdx>> {
    let temp_obj = temp.obj(temp_idx);
    let candidates = current.not_processed_by_type(temp_obj.object_type);
    let attr_names: Vec<&'static str> = temp_obj.attrs.keys().copied().collect();

    // score candidates by how many attributes already agree; a differing
    // create-only attribute disqualifies outright since no set can fix it
    let mut scored: Vec<(usize, ObjIdx)> = Vec::new();

    'candidates: for current_idx in candidates {
        let mut equal_attrs = 0usize;

        for name in &attr_names {
            if equal_attribute(current, temp, current_idx, temp_idx, name) {
                equal_attrs += 1;
                continue;
            }

            let meta = temp.obj(temp_idx).attr(name).expect("own attribute").meta;
            if meta.flags.create_only && current.obj(current_idx).has_attr(name) {
                continue 'candidates;
            }
        }

        scored.push((equal_attrs, current_idx));
    }

    if scored.is_empty() {
        return Ok(None);
    }
    if scored.len() == 1 {
        return Ok(Some(scored[0].1));
    }

    scored.sort_by(|a, b| b.0.cmp(&a.0));

    if scored[0].0 > scored[1].0 {
        return Ok(Some(scored[0].1));
    }

    // several candidates tie on attribute score, fall back to comparing the
    // dependency trees hanging off each candidate
    let best_score = scored[0].0;
    let tied: Vec<ObjIdx> = scored
        .into_iter()
        .filter(|(score, _)| *score == best_score)
        .map(|(_, idx)| idx)
        .collect();

    info!(
        "multiple candidates ({}) for {}, using heuristic",
        tied.len(),
        temp.obj(temp_idx).serialized_key()
    );

    Ok(Some(select_by_dependency_heuristic(
        current, temp, temp_idx, &tied, rng,
    )))
}

/// Pick the candidate whose downstream dependency tree has exactly the same
/// size as the temporary object's; when that is not unique, pick at random.
fn select_by_dependency_heuristic(
    current: &AsicView,
    temp: &AsicView,
    temp_idx: ObjIdx,
    tied: &[ObjIdx],
    rng: &mut StdRng,
) -> ObjIdx {
    let temp_count = dependency_tree_size(temp, temp_idx);

    let mut exact = Vec::new();
    for &candidate in tied {
        if dependency_tree_size(current, candidate) == temp_count {
            exact.push(candidate);
        }
    }

    if exact.len() == 1 {
        return exact[0];
    }

    warn!(
        "heuristic failed for {}, selecting at random from {} candidates",
        temp.obj(temp_idx).object_type,
        tied.len()
    );

    tied[rng.gen_range(0..tied.len())]
}

/// Count objects whose plain-oid attributes point (transitively) at `idx`.
/// Same-type references are counted but not recursed into, and port/switch
/// users stop the walk, both to bound traversal on dense graphs.
fn dependency_tree_size(view: &AsicView, idx: ObjIdx) -> usize {
    let Some(vid) = view.obj(idx).key.oid() else {
        return 0;
    };
    let own_type = view.obj(idx).object_type;

    let mut count = 0;
    for user_idx in view.all_objects() {
        if user_idx == idx {
            continue;
        }
        let user = view.obj(user_idx);

        let points_at_target = user.attrs.values().any(|attr| {
            !attr.meta.flags.read_only
                && matches!(attr.value, syncd_sai::AttrValue::Oid(o) if o == vid)
        });
        if !points_at_target {
            continue;
        }

        count += 1;

        if user.object_type == own_type
            || user.object_type == ObjectType::Port
            || user.object_type == ObjectType::Switch
        {
            continue;
        }

        count += dependency_tree_size(view, user_idx);
    }

    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use syncd_sai::{metadata, RouteEntry};

    fn vid(object_type: ObjectType, seq: u64) -> ObjectId {
        ObjectId::encode(object_type, 0, seq)
    }

    fn rid(raw: u64) -> ObjectId {
        ObjectId::from_raw(raw)
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn dump_row(object_type: ObjectType, key: &str, attrs: &[(&str, String)]) -> (String, Vec<(String, String)>) {
        (
            format!("{object_type}:{key}"),
            attrs
                .iter()
                .map(|(f, v)| (f.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn match_oids_pairs_shared_vids() {
        let port = vid(ObjectType::Port, 1);
        let mut current =
            AsicView::from_dump(vec![dump_row(ObjectType::Port, &port.to_string(), &[])])
                .unwrap();
        current.vid_to_rid.insert(port, rid(0xAA));
        current.rid_to_vid.insert(rid(0xAA), port);

        let mut temp =
            AsicView::from_dump(vec![dump_row(ObjectType::Port, &port.to_string(), &[])])
                .unwrap();

        match_oids(&mut current, &mut temp);

        let cur_idx = current.lookup_oid(port).unwrap();
        let temp_idx = temp.lookup_oid(port).unwrap();
        assert_eq!(current.obj(cur_idx).status, ObjectStatus::Matched);
        assert_eq!(temp.obj(temp_idx).status, ObjectStatus::Matched);
        assert_eq!(temp.vid_to_rid.get(&port), Some(&rid(0xAA)));
    }

    #[test]
    fn entry_match_rewrites_members_through_rids() {
        let current_vr = vid(ObjectType::VirtualRouter, 1);
        let temp_vr = vid(ObjectType::VirtualRouter, 5);
        let switch = vid(ObjectType::Switch, 0);
        let vr_rid = rid(0xBB);
        let switch_rid = rid(0x5);

        let current_route = ObjectKey::Route(RouteEntry {
            dest: "10.0.0.0/24".parse().unwrap(),
            switch_id: switch,
            vr: current_vr,
        });
        let mut current = AsicView::from_dump(vec![
            dump_row(ObjectType::Switch, &switch.to_string(), &[]),
            dump_row(ObjectType::VirtualRouter, &current_vr.to_string(), &[]),
            dump_row(ObjectType::RouteEntry, &current_route.serialize(), &[]),
        ])
        .unwrap();
        current.vid_to_rid.insert(current_vr, vr_rid);
        current.rid_to_vid.insert(vr_rid, current_vr);
        current.vid_to_rid.insert(switch, switch_rid);
        current.rid_to_vid.insert(switch_rid, switch);

        let temp_route = ObjectKey::Route(RouteEntry {
            dest: "10.0.0.0/24".parse().unwrap(),
            switch_id: switch,
            vr: temp_vr,
        });
        let mut temp = AsicView::from_dump(vec![
            dump_row(ObjectType::Switch, &switch.to_string(), &[]),
            dump_row(ObjectType::VirtualRouter, &temp_vr.to_string(), &[]),
            dump_row(ObjectType::RouteEntry, &temp_route.serialize(), &[]),
        ])
        .unwrap();
        // the temporary vr was matched to the current one: same rid
        temp.vid_to_rid.insert(temp_vr, vr_rid);
        temp.rid_to_vid.insert(vr_rid, temp_vr);
        temp.vid_to_rid.insert(switch, switch_rid);
        temp.rid_to_vid.insert(switch_rid, switch);

        let temp_idx = temp.lookup_key(&temp_route.serialize()).unwrap();
        let found = find_best_match(&current, &temp, temp_idx, &mut rng()).unwrap();

        let expected = current.lookup_key(&current_route.serialize()).unwrap();
        assert_eq!(found, Some(expected));
    }

    #[test]
    fn entry_match_fails_without_member_rid() {
        let temp_vr = vid(ObjectType::VirtualRouter, 5);
        let switch = vid(ObjectType::Switch, 0);

        let temp_route = ObjectKey::Route(RouteEntry {
            dest: "10.0.0.0/24".parse().unwrap(),
            switch_id: switch,
            vr: temp_vr,
        });
        let temp = AsicView::from_dump(vec![
            dump_row(ObjectType::Switch, &switch.to_string(), &[]),
            dump_row(ObjectType::VirtualRouter, &temp_vr.to_string(), &[]),
            dump_row(ObjectType::RouteEntry, &temp_route.serialize(), &[]),
        ])
        .unwrap();
        let current = AsicView::new();

        let temp_idx = temp.lookup_key(&temp_route.serialize()).unwrap();
        // vr has no rid assigned: the route cannot match anything yet
        assert_eq!(
            find_best_match(&current, &temp, temp_idx, &mut rng()).unwrap(),
            None
        );
    }

    #[test]
    fn different_create_only_attr_disqualifies_candidate() {
        let current_table = vid(ObjectType::AclTable, 1);
        let temp_table = vid(ObjectType::AclTable, 2);

        let current = AsicView::from_dump(vec![dump_row(
            ObjectType::AclTable,
            &current_table.to_string(),
            &[(metadata::ACL_TABLE_ACL_STAGE, "0".to_string())],
        )])
        .unwrap();

        let temp = AsicView::from_dump(vec![dump_row(
            ObjectType::AclTable,
            &temp_table.to_string(),
            &[(metadata::ACL_TABLE_ACL_STAGE, "1".to_string())],
        )])
        .unwrap();

        let temp_idx = temp.lookup_oid(temp_table).unwrap();
        assert_eq!(
            find_best_match(&current, &temp, temp_idx, &mut rng()).unwrap(),
            None
        );
    }

    #[test]
    fn highest_scoring_candidate_wins() {
        let a = vid(ObjectType::HostifTrapGroup, 1);
        let b = vid(ObjectType::HostifTrapGroup, 2);
        let t = vid(ObjectType::HostifTrapGroup, 9);

        let current = AsicView::from_dump(vec![
            dump_row(
                ObjectType::HostifTrapGroup,
                &a.to_string(),
                &[(metadata::HOSTIF_TRAP_GROUP_QUEUE, "3".to_string())],
            ),
            dump_row(
                ObjectType::HostifTrapGroup,
                &b.to_string(),
                &[(metadata::HOSTIF_TRAP_GROUP_QUEUE, "7".to_string())],
            ),
        ])
        .unwrap();

        let temp = AsicView::from_dump(vec![dump_row(
            ObjectType::HostifTrapGroup,
            &t.to_string(),
            &[(metadata::HOSTIF_TRAP_GROUP_QUEUE, "7".to_string())],
        )])
        .unwrap();

        let temp_idx = temp.lookup_oid(t).unwrap();
        let found = find_best_match(&current, &temp, temp_idx, &mut rng())
            .unwrap()
            .unwrap();
        assert_eq!(current.obj(found).vid(), b);
    }

    #[test]
    fn tied_candidates_resolve_deterministically_with_seed() {
        let a = vid(ObjectType::HostifTrapGroup, 1);
        let b = vid(ObjectType::HostifTrapGroup, 2);
        let t = vid(ObjectType::HostifTrapGroup, 9);

        let rows = vec![
            dump_row(ObjectType::HostifTrapGroup, &a.to_string(), &[]),
            dump_row(ObjectType::HostifTrapGroup, &b.to_string(), &[]),
        ];
        let temp_rows = vec![dump_row(ObjectType::HostifTrapGroup, &t.to_string(), &[])];

        let pick = |seed: u64| {
            let current = AsicView::from_dump(rows.clone()).unwrap();
            let temp = AsicView::from_dump(temp_rows.clone()).unwrap();
            let temp_idx = temp.lookup_oid(t).unwrap();
            let mut rng = StdRng::seed_from_u64(seed);
            let idx = find_best_match(&current, &temp, temp_idx, &mut rng)
                .unwrap()
                .unwrap();
            current.obj(idx).vid()
        };

        // same seed, same choice, every time
        assert_eq!(pick(42), pick(42));
        assert_eq!(pick(7), pick(7));
    }

    #[test]
    fn dependency_heuristic_prefers_exact_tree_size() {
        // two candidate trap groups with equal attributes; one is referenced
        // by a trap, as is the temporary one, the other is unreferenced
        let used = vid(ObjectType::HostifTrapGroup, 1);
        let unused = vid(ObjectType::HostifTrapGroup, 2);
        let trap = vid(ObjectType::HostifTrap, 3);

        let current = AsicView::from_dump(vec![
            dump_row(ObjectType::HostifTrapGroup, &used.to_string(), &[]),
            dump_row(ObjectType::HostifTrapGroup, &unused.to_string(), &[]),
            dump_row(
                ObjectType::HostifTrap,
                &trap.to_string(),
                &[(metadata::HOSTIF_TRAP_TRAP_GROUP, used.to_string())],
            ),
        ])
        .unwrap();

        let temp_group = vid(ObjectType::HostifTrapGroup, 9);
        let temp_trap = vid(ObjectType::HostifTrap, 10);
        let temp = AsicView::from_dump(vec![
            dump_row(ObjectType::HostifTrapGroup, &temp_group.to_string(), &[]),
            dump_row(
                ObjectType::HostifTrap,
                &temp_trap.to_string(),
                &[(metadata::HOSTIF_TRAP_TRAP_GROUP, temp_group.to_string())],
            ),
        ])
        .unwrap();

        let temp_idx = temp.lookup_oid(temp_group).unwrap();
        let found = find_best_match(&current, &temp, temp_idx, &mut rng())
            .unwrap()
            .unwrap();
        assert_eq!(current.obj(found).vid(), used);
    }
}
