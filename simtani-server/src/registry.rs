//! The registry service.
//!
//! Every public operation is one unit of work: the clock is read once, the
//! work runs on a blocking thread inside [`RegistryStore::atomically`], and
//! the caller gets the result only after commit. Farmer writes always go
//! through the aggregate maintainer hooks.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use simtani_core::input::{
    CommodityPatch, FarmerPatch, GroupPatch, NewCommodity, NewDistrict, NewFarmer, NewGroup,
};
use simtani_core::report::{
    commodity_report, farmer_report, group_report, CommodityReportEntry, DashboardStats,
    FarmerReportEntry, GroupDetail, RegistrySnapshot, VerificationStats,
};
use simtani_core::verification::transition;
use simtani_core::{
    Commodity, CommodityId, District, DistrictId, ErrorKind, Farmer, FarmerGroup, FarmerId,
    GroupId, RegistryError, VerificationPolicy, VerifyCommand,
};
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::events::{GroupEvent, GroupEventType};
use crate::maintainer;
use crate::repository::{with_tx, RegistryStore, RegistryTx};

/// Upper bound on events returned by one timeline query.
pub const MAX_EVENT_LIMIT: usize = 500;

pub struct Registry {
    store: Arc<dyn RegistryStore>,
    clock: Arc<dyn Clock>,
    policy: VerificationPolicy,
}

impl Registry {
    pub fn new(
        store: Arc<dyn RegistryStore>,
        clock: Arc<dyn Clock>,
        policy: VerificationPolicy,
    ) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> VerificationPolicy {
        self.policy
    }

    /// Run `work` as one unit of work on a blocking thread.
    async fn run<T, F>(&self, operation: &'static str, work: F) -> Result<T, RegistryError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn RegistryTx, DateTime<Utc>) -> Result<T, RegistryError>
            + Send
            + 'static,
    {
        let store = self.store.clone();
        let now = self.clock.now();

        let result = tokio::task::spawn_blocking(move || {
            with_tx(store.as_ref(), |tx| work(tx, now))
        })
        .await
        .map_err(|e| RegistryError::storage(operation, e.to_string()))?;

        if let Err(e) = &result {
            match e.kind() {
                ErrorKind::StorageFailure => {
                    error!(operation, error = %e, "Registry operation failed")
                }
                _ => warn!(operation, error = %e, "Registry operation rejected"),
            }
        }
        result
    }

    // =========================================================================
    // Districts
    // =========================================================================

    pub async fn create_district(&self, input: NewDistrict) -> Result<District, RegistryError> {
        self.run("create district", move |tx, now| {
            let district = input.into_district(now)?;
            if tx.district_by_name(&district.name)?.is_some() {
                return Err(RegistryError::conflict(format!(
                    "district '{}' already exists",
                    district.name
                )));
            }
            tx.insert_district(&district)?;
            info!(district_id = %district.id, name = %district.name, "Registered district");
            Ok(district)
        })
        .await
    }

    pub async fn list_districts(&self) -> Result<Vec<District>, RegistryError> {
        self.run("list districts", |tx, _| tx.districts()).await
    }

    // =========================================================================
    // Farmers
    // =========================================================================

    pub async fn create_farmer(&self, input: NewFarmer) -> Result<Farmer, RegistryError> {
        self.run("create farmer", move |tx, now| {
            let farmer = input.into_farmer(now)?;
            require_district(tx, &farmer.district_id)?;
            if let Some(group_id) = &farmer.group_id {
                require_group(tx, group_id)?;
            }
            require_unique_nik(tx, &farmer.nik, None)?;

            tx.insert_farmer(&farmer)?;
            maintainer::on_farmer_created(tx, &farmer, now)?;

            info!(
                farmer_id = %farmer.id,
                group_id = ?farmer.group_id.as_ref().map(|g| g.as_str()),
                "Registered farmer"
            );
            Ok(farmer)
        })
        .await
    }

    pub async fn update_farmer(
        &self,
        id: FarmerId,
        patch: FarmerPatch,
    ) -> Result<Farmer, RegistryError> {
        self.run("update farmer", move |tx, now| {
            let old = require_farmer(tx, &id)?;
            let new = patch.apply(&old)?;

            if new.district_id != old.district_id {
                require_district(tx, &new.district_id)?;
            }
            if new.group_id != old.group_id {
                if let Some(group_id) = &new.group_id {
                    require_group(tx, group_id)?;
                }
            }
            if new.nik != old.nik {
                require_unique_nik(tx, &new.nik, Some(&new.id))?;
            }

            tx.update_farmer(&new)?;
            maintainer::on_farmer_updated(tx, &old, &new, now)?;

            info!(farmer_id = %new.id, "Updated farmer");
            Ok(new)
        })
        .await
    }

    pub async fn delete_farmer(&self, id: FarmerId) -> Result<(), RegistryError> {
        self.run("delete farmer", move |tx, now| {
            let farmer = require_farmer(tx, &id)?;
            tx.delete_farmer(&farmer.id)?;
            maintainer::on_farmer_deleted(tx, &farmer, now)?;
            info!(farmer_id = %farmer.id, "Deleted farmer");
            Ok(())
        })
        .await
    }

    pub async fn get_farmer(&self, id: FarmerId) -> Result<Farmer, RegistryError> {
        self.run("get farmer", move |tx, _| require_farmer(tx, &id))
            .await
    }

    pub async fn list_farmers(&self) -> Result<Vec<Farmer>, RegistryError> {
        self.run("list farmers", |tx, _| tx.farmers()).await
    }

    // =========================================================================
    // Farmer groups
    // =========================================================================

    pub async fn create_group(&self, input: NewGroup) -> Result<FarmerGroup, RegistryError> {
        self.run("create group", move |tx, now| {
            let group = input.into_group(now)?;
            require_district(tx, &group.district_id)?;
            tx.insert_group(&group)?;
            tx.append_event(
                &group.id,
                &GroupEventType::GroupRegistered {
                    name: group.name.clone(),
                    district_id: group.district_id.to_string(),
                },
                now,
            )?;
            info!(group_id = %group.id, name = %group.name, "Registered farmer group");
            Ok(group)
        })
        .await
    }

    /// Edit a group's profile. The aggregates are recomputed as part of the edit.
    pub async fn update_group(
        &self,
        id: GroupId,
        patch: GroupPatch,
    ) -> Result<FarmerGroup, RegistryError> {
        self.run("update group", move |tx, now| {
            let current = require_group(tx, &id)?;
            let next = patch.apply(&current)?;
            if next.district_id != current.district_id {
                require_district(tx, &next.district_id)?;
            }
            tx.update_group_profile(&next)?;
            maintainer::recompute_group(tx, &id, now)?;

            info!(group_id = %id, "Updated farmer group");
            require_group(tx, &id)
        })
        .await
    }

    /// Delete a group. Its farmers and commodities stay, detached.
    pub async fn delete_group(&self, id: GroupId) -> Result<(), RegistryError> {
        self.run("delete group", move |tx, now| {
            require_group(tx, &id)?;
            let detached = maintainer::on_group_deleted(tx, &id)?;
            tx.delete_group(&id)?;
            tx.append_event(
                &id,
                &GroupEventType::GroupDeleted {
                    detached_farmers: detached.farmers,
                    detached_commodities: detached.commodities,
                },
                now,
            )?;
            info!(
                group_id = %id,
                detached_farmers = detached.farmers,
                detached_commodities = detached.commodities,
                "Deleted farmer group"
            );
            Ok(())
        })
        .await
    }

    /// A group with its members and commodities, whatever its status.
    pub async fn get_group(&self, id: GroupId) -> Result<GroupDetail, RegistryError> {
        self.run("get group", move |tx, _| {
            let group = require_group(tx, &id)?;
            let district = tx.district(&group.district_id)?;
            let members = tx.farmers_in_group(&id)?;
            let commodities = tx.commodities_of_group(&id)?;
            Ok(GroupDetail::assemble(
                group,
                district.as_ref(),
                members,
                commodities,
            ))
        })
        .await
    }

    pub async fn list_groups(&self) -> Result<Vec<FarmerGroup>, RegistryError> {
        self.run("list groups", |tx, _| tx.groups()).await
    }

    /// Most recent events of a group first. A deleted group's timeline stays
    /// readable; an id that never had a group is NotFound.
    pub async fn group_events(
        &self,
        id: GroupId,
        limit: usize,
    ) -> Result<Vec<GroupEvent>, RegistryError> {
        let limit = limit.min(MAX_EVENT_LIMIT);
        self.run("group events", move |tx, _| {
            // Events outlive their group, so a deleted group keeps its timeline.
            let events = tx.group_events(&id, limit)?;
            if events.is_empty() && tx.group(&id)?.is_none() {
                return Err(RegistryError::not_found("farmer group", &id));
            }
            Ok(events)
        })
        .await
    }

    // =========================================================================
    // Commodities
    // =========================================================================

    pub async fn create_commodity(&self, input: NewCommodity) -> Result<Commodity, RegistryError> {
        self.run("create commodity", move |tx, now| {
            let commodity = input.into_commodity(now)?;
            if let Some(group_id) = &commodity.group_id {
                require_group(tx, group_id)?;
            }
            tx.insert_commodity(&commodity)?;
            info!(commodity_id = %commodity.id, crop_type = %commodity.crop_type, "Registered commodity");
            Ok(commodity)
        })
        .await
    }

    pub async fn update_commodity(
        &self,
        id: CommodityId,
        patch: CommodityPatch,
    ) -> Result<Commodity, RegistryError> {
        self.run("update commodity", move |tx, _| {
            let current = require_commodity(tx, &id)?;
            let next = patch.apply(&current)?;
            if next.group_id != current.group_id {
                if let Some(group_id) = &next.group_id {
                    require_group(tx, group_id)?;
                }
            }
            tx.update_commodity(&next)?;
            info!(commodity_id = %id, "Updated commodity");
            Ok(next)
        })
        .await
    }

    pub async fn delete_commodity(&self, id: CommodityId) -> Result<(), RegistryError> {
        self.run("delete commodity", move |tx, _| {
            require_commodity(tx, &id)?;
            tx.delete_commodity(&id)?;
            info!(commodity_id = %id, "Deleted commodity");
            Ok(())
        })
        .await
    }

    pub async fn get_commodity(&self, id: CommodityId) -> Result<Commodity, RegistryError> {
        self.run("get commodity", move |tx, _| require_commodity(tx, &id))
            .await
    }

    pub async fn list_commodities(&self) -> Result<Vec<Commodity>, RegistryError> {
        self.run("list commodities", |tx, _| tx.commodities()).await
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Decide a group's verification. Aggregates are not touched.
    pub async fn verify(
        &self,
        id: GroupId,
        command: VerifyCommand,
    ) -> Result<FarmerGroup, RegistryError> {
        let policy = self.policy;
        self.run("verify group", move |tx, now| {
            let mut group = require_group(tx, &id)?;
            let from_status = group.status();
            let actor = command.actor.clone();

            let next = transition(&group.verification, command, policy, now)?;
            tx.write_verification(&id, &next)?;
            tx.append_event(
                &id,
                &GroupEventType::VerificationDecided {
                    from_status,
                    to_status: next.status(),
                    verified_by: actor.to_string(),
                    note: next.note().map(str::to_string),
                },
                now,
            )?;

            info!(
                group_id = %id,
                from = %from_status,
                to = %next.status(),
                verified_by = %actor,
                "Verified farmer group"
            );
            group.verification = next;
            Ok(group)
        })
        .await
    }

    /// Groups waiting for a decision, newest first.
    pub async fn pending_groups(&self) -> Result<Vec<FarmerGroup>, RegistryError> {
        self.run("list pending groups", |tx, _| {
            Ok(tx
                .groups()?
                .into_iter()
                .filter(|g| g.verification.is_pending())
                .collect())
        })
        .await
    }

    pub async fn verification_stats(&self) -> Result<VerificationStats, RegistryError> {
        self.run("verification stats", |tx, _| {
            Ok(VerificationStats::build(&tx.groups()?))
        })
        .await
    }

    // =========================================================================
    // Reports
    // =========================================================================

    pub async fn dashboard(&self) -> Result<DashboardStats, RegistryError> {
        self.run("dashboard", |tx, _| Ok(DashboardStats::build(&snapshot(tx)?)))
            .await
    }

    pub async fn group_report(&self) -> Result<Vec<GroupDetail>, RegistryError> {
        self.run("group report", |tx, _| Ok(group_report(&snapshot(tx)?)))
            .await
    }

    pub async fn commodity_report(&self) -> Result<Vec<CommodityReportEntry>, RegistryError> {
        self.run("commodity report", |tx, _| {
            Ok(commodity_report(&snapshot(tx)?))
        })
        .await
    }

    pub async fn farmer_report(&self) -> Result<Vec<FarmerReportEntry>, RegistryError> {
        self.run("farmer report", |tx, _| Ok(farmer_report(&snapshot(tx)?)))
            .await
    }
}

fn snapshot(tx: &mut dyn RegistryTx) -> Result<RegistrySnapshot, RegistryError> {
    Ok(RegistrySnapshot {
        districts: tx.districts()?,
        groups: tx.groups()?,
        farmers: tx.farmers()?,
        commodities: tx.commodities()?,
    })
}

/// A referenced district must exist; a dangling reference is bad input.
fn require_district(tx: &mut dyn RegistryTx, id: &DistrictId) -> Result<District, RegistryError> {
    tx.district(id)?
        .ok_or_else(|| RegistryError::invalid(format!("district {} does not exist", id)))
}

fn require_group(tx: &mut dyn RegistryTx, id: &GroupId) -> Result<FarmerGroup, RegistryError> {
    tx.group(id)?
        .ok_or_else(|| RegistryError::not_found("farmer group", id))
}

fn require_farmer(tx: &mut dyn RegistryTx, id: &FarmerId) -> Result<Farmer, RegistryError> {
    tx.farmer(id)?
        .ok_or_else(|| RegistryError::not_found("farmer", id))
}

fn require_commodity(
    tx: &mut dyn RegistryTx,
    id: &CommodityId,
) -> Result<Commodity, RegistryError> {
    tx.commodity(id)?
        .ok_or_else(|| RegistryError::not_found("commodity", id))
}

fn require_unique_nik(
    tx: &mut dyn RegistryTx,
    nik: &str,
    owner: Option<&FarmerId>,
) -> Result<(), RegistryError> {
    match tx.farmer_by_nik(nik)? {
        Some(existing) if Some(&existing.id) != owner => {
            Err(RegistryError::conflict("NIK is already registered"))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests;
