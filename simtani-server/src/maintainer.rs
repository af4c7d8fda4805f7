//! Aggregate maintenance hooks.
//!
//! Every farmer write path calls exactly one of these hooks on the same
//! [`RegistryTx`] as the write itself, so the farmer change and the
//! recomputed aggregates commit or roll back together. [`recompute_group`]
//! is the only caller of `RegistryTx::write_group_aggregates`.

use chrono::{DateTime, Utc};
use simtani_core::aggregate::{groups_to_recompute, recompute, FarmerChange, GroupAggregates};
use simtani_core::{Farmer, GroupId, RegistryError};
use tracing::debug;

use crate::events::GroupEventType;
use crate::repository::RegistryTx;

/// Recompute a group's aggregates from its current members and persist them.
///
/// Records an `AggregatesRecomputed` event when the stored values change.
pub fn recompute_group(
    tx: &mut dyn RegistryTx,
    group_id: &GroupId,
    now: DateTime<Utc>,
) -> Result<GroupAggregates, RegistryError> {
    let group = tx
        .group(group_id)?
        .ok_or_else(|| RegistryError::not_found("farmer group", group_id))?;

    let members = tx.farmers_in_group(group_id)?;
    let aggregates = recompute(&members);
    tx.write_group_aggregates(group_id, aggregates)?;

    let changed = group.member_count != aggregates.member_count
        || group.total_land_area != aggregates.total_land_area;
    if changed {
        debug!(
            group_id = %group_id,
            member_count = aggregates.member_count,
            total_land_area = aggregates.total_land_area,
            "Recomputed group aggregates"
        );
        tx.append_event(
            group_id,
            &GroupEventType::AggregatesRecomputed {
                previous_member_count: group.member_count,
                member_count: aggregates.member_count,
                previous_total_land_area: group.total_land_area,
                total_land_area: aggregates.total_land_area,
            },
            now,
        )?;
    }

    Ok(aggregates)
}

fn recompute_affected(
    tx: &mut dyn RegistryTx,
    change: FarmerChange<'_>,
    now: DateTime<Utc>,
) -> Result<(), RegistryError> {
    for group_id in groups_to_recompute(change) {
        recompute_group(tx, &group_id, now)?;
    }
    Ok(())
}

pub fn on_farmer_created(
    tx: &mut dyn RegistryTx,
    farmer: &Farmer,
    now: DateTime<Utc>,
) -> Result<(), RegistryError> {
    recompute_affected(tx, FarmerChange::Created(farmer), now)
}

pub fn on_farmer_updated(
    tx: &mut dyn RegistryTx,
    old: &Farmer,
    new: &Farmer,
    now: DateTime<Utc>,
) -> Result<(), RegistryError> {
    recompute_affected(tx, FarmerChange::Updated { old, new }, now)
}

pub fn on_farmer_deleted(
    tx: &mut dyn RegistryTx,
    farmer: &Farmer,
    now: DateTime<Utc>,
) -> Result<(), RegistryError> {
    recompute_affected(tx, FarmerChange::Deleted(farmer), now)
}

/// Rows released by deleting a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detached {
    pub farmers: usize,
    pub commodities: usize,
}

/// Detach every farmer and commodity from a group that is about to be deleted.
pub fn on_group_deleted(
    tx: &mut dyn RegistryTx,
    group_id: &GroupId,
) -> Result<Detached, RegistryError> {
    let farmers = tx.detach_farmers(group_id)?;
    let commodities = tx.detach_commodities(group_id)?;
    Ok(Detached {
        farmers,
        commodities,
    })
}
