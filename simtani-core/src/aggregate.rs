//! Derived group aggregates.
//!
//! `member_count` and `total_land_area` are persisted on the group row but
//! are always recomputed from the full member set, never adjusted
//! incrementally. [`recompute`] is the only function that produces them and
//! [`groups_to_recompute`] decides which groups a farmer mutation touches.

use crate::model::{Farmer, GroupId};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GroupAggregates {
    pub member_count: u32,
    pub total_land_area: f64,
}

impl GroupAggregates {
    pub const EMPTY: GroupAggregates = GroupAggregates {
        member_count: 0,
        total_land_area: 0.0,
    };
}

/// Recompute a group's aggregates from its current members.
///
/// Land areas are summed in farmer-id order, so the result does not depend on
/// the order the store returned the rows in.
pub fn recompute<'a, I>(members: I) -> GroupAggregates
where
    I: IntoIterator<Item = &'a Farmer>,
{
    let mut members: Vec<&Farmer> = members.into_iter().collect();
    members.sort_by(|a, b| a.id.cmp(&b.id));

    let total_land_area = members.iter().map(|f| f.land_area).sum::<f64>().max(0.0);

    GroupAggregates {
        member_count: u32::try_from(members.len()).unwrap_or(u32::MAX),
        total_land_area,
    }
}

/// A farmer mutation, as seen by the aggregate maintainer.
#[derive(Debug, Clone, Copy)]
pub enum FarmerChange<'a> {
    Created(&'a Farmer),
    Updated { old: &'a Farmer, new: &'a Farmer },
    Deleted(&'a Farmer),
}

/// Groups whose aggregates must be recomputed after `change`.
///
/// A reassignment touches both the old and the new group, in that order. An
/// edit that changes neither the group nor the land area touches nothing.
pub fn groups_to_recompute(change: FarmerChange<'_>) -> Vec<GroupId> {
    match change {
        FarmerChange::Created(farmer) | FarmerChange::Deleted(farmer) => {
            farmer.group_id.iter().cloned().collect()
        }
        FarmerChange::Updated { old, new } => {
            if old.group_id != new.group_id {
                old.group_id
                    .iter()
                    .chain(new.group_id.iter())
                    .cloned()
                    .collect()
            } else if old.land_area != new.land_area {
                new.group_id.iter().cloned().collect()
            } else {
                Vec::new()
            }
        }
    }
}
