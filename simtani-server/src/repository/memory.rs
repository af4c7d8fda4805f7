//! In-memory implementation of `RegistryStore`.
//!
//! All rows live in a set of tables behind a mutex. A unit of work runs
//! against a copy of the tables which replaces the live copy only when the
//! work succeeds. All data is lost on restart.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use simtani_core::{
    Commodity, CommodityId, District, DistrictId, Farmer, FarmerGroup, FarmerId, GroupAggregates,
    GroupId, RegistryError, VerificationState,
};

use super::{RegistryStore, RegistryTx};
use crate::events::{GroupEvent, GroupEventType};

/// Rows in insertion order.
#[derive(Debug, Clone, Default)]
struct Tables {
    districts: Vec<District>,
    farmers: Vec<Farmer>,
    groups: Vec<FarmerGroup>,
    commodities: Vec<Commodity>,
    events: Vec<GroupEvent>,
    next_event_id: i64,
}

/// Newest first; ties keep reverse insertion order.
fn newest_first<T: Clone>(rows: &[T], created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    let mut out: Vec<T> = rows.iter().rev().cloned().collect();
    out.sort_by_key(|row| std::cmp::Reverse(created_at(row)));
    out
}

fn missing(operation: &'static str, id: impl std::fmt::Display) -> RegistryError {
    RegistryError::storage(operation, format!("no row with id {}", id))
}

/// Volatile store for development and tests.
///
/// Every unit of work, reads included, runs against a full copy of the
/// tables that replaces the live copy on success. Cost grows with the size
/// of the registry, so this backend is not meant for production data.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegistryStore for InMemoryStore {
    fn atomically(
        &self,
        work: &mut dyn FnMut(&mut dyn RegistryTx) -> Result<(), RegistryError>,
    ) -> Result<(), RegistryError> {
        let mut live = self
            .tables
            .lock()
            .map_err(|_| RegistryError::storage("lock tables", "mutex poisoned"))?;

        let mut tx = MemoryTx {
            tables: live.clone(),
        };
        work(&mut tx)?;
        *live = tx.tables;
        Ok(())
    }
}

struct MemoryTx {
    tables: Tables,
}

impl RegistryTx for MemoryTx {
    fn insert_district(&mut self, district: &District) -> Result<(), RegistryError> {
        if self.tables.districts.iter().any(|d| d.name == district.name) {
            return Err(RegistryError::conflict(format!(
                "district '{}' already exists",
                district.name
            )));
        }
        self.tables.districts.push(district.clone());
        Ok(())
    }

    fn district(&mut self, id: &DistrictId) -> Result<Option<District>, RegistryError> {
        Ok(self.tables.districts.iter().find(|d| &d.id == id).cloned())
    }

    fn district_by_name(&mut self, name: &str) -> Result<Option<District>, RegistryError> {
        Ok(self
            .tables
            .districts
            .iter()
            .find(|d| d.name == name)
            .cloned())
    }

    fn districts(&mut self) -> Result<Vec<District>, RegistryError> {
        let mut districts = self.tables.districts.clone();
        districts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(districts)
    }

    fn insert_farmer(&mut self, farmer: &Farmer) -> Result<(), RegistryError> {
        if self.tables.farmers.iter().any(|f| f.nik == farmer.nik) {
            return Err(RegistryError::conflict("NIK is already registered"));
        }
        self.tables.farmers.push(farmer.clone());
        Ok(())
    }

    fn update_farmer(&mut self, farmer: &Farmer) -> Result<(), RegistryError> {
        if self
            .tables
            .farmers
            .iter()
            .any(|f| f.nik == farmer.nik && f.id != farmer.id)
        {
            return Err(RegistryError::conflict("NIK is already registered"));
        }
        let row = self
            .tables
            .farmers
            .iter_mut()
            .find(|f| f.id == farmer.id)
            .ok_or_else(|| missing("update farmer", &farmer.id))?;
        *row = farmer.clone();
        Ok(())
    }

    fn delete_farmer(&mut self, id: &FarmerId) -> Result<(), RegistryError> {
        let before = self.tables.farmers.len();
        self.tables.farmers.retain(|f| &f.id != id);
        if self.tables.farmers.len() == before {
            return Err(missing("delete farmer", id));
        }
        Ok(())
    }

    fn farmer(&mut self, id: &FarmerId) -> Result<Option<Farmer>, RegistryError> {
        Ok(self.tables.farmers.iter().find(|f| &f.id == id).cloned())
    }

    fn farmer_by_nik(&mut self, nik: &str) -> Result<Option<Farmer>, RegistryError> {
        Ok(self.tables.farmers.iter().find(|f| f.nik == nik).cloned())
    }

    fn farmers(&mut self) -> Result<Vec<Farmer>, RegistryError> {
        Ok(newest_first(&self.tables.farmers, |f| f.created_at))
    }

    fn farmers_in_group(&mut self, group_id: &GroupId) -> Result<Vec<Farmer>, RegistryError> {
        Ok(self
            .tables
            .farmers
            .iter()
            .filter(|f| f.group_id.as_ref() == Some(group_id))
            .cloned()
            .collect())
    }

    fn detach_farmers(&mut self, group_id: &GroupId) -> Result<usize, RegistryError> {
        let mut detached = 0;
        for farmer in &mut self.tables.farmers {
            if farmer.group_id.as_ref() == Some(group_id) {
                farmer.group_id = None;
                detached += 1;
            }
        }
        Ok(detached)
    }

    fn insert_group(&mut self, group: &FarmerGroup) -> Result<(), RegistryError> {
        self.tables.groups.push(group.clone());
        Ok(())
    }

    fn update_group_profile(&mut self, group: &FarmerGroup) -> Result<(), RegistryError> {
        let row = self
            .tables
            .groups
            .iter_mut()
            .find(|g| g.id == group.id)
            .ok_or_else(|| missing("update group", &group.id))?;
        row.name = group.name.clone();
        row.leader = group.leader.clone();
        row.district_id = group.district_id.clone();
        row.address = group.address.clone();
        row.contact = group.contact.clone();
        Ok(())
    }

    fn write_group_aggregates(
        &mut self,
        id: &GroupId,
        aggregates: GroupAggregates,
    ) -> Result<(), RegistryError> {
        let row = self
            .tables
            .groups
            .iter_mut()
            .find(|g| &g.id == id)
            .ok_or_else(|| missing("write group aggregates", id))?;
        row.member_count = aggregates.member_count;
        row.total_land_area = aggregates.total_land_area;
        Ok(())
    }

    fn write_verification(
        &mut self,
        id: &GroupId,
        state: &VerificationState,
    ) -> Result<(), RegistryError> {
        let row = self
            .tables
            .groups
            .iter_mut()
            .find(|g| &g.id == id)
            .ok_or_else(|| missing("write verification", id))?;
        row.verification = state.clone();
        Ok(())
    }

    fn delete_group(&mut self, id: &GroupId) -> Result<(), RegistryError> {
        if self
            .tables
            .farmers
            .iter()
            .any(|f| f.group_id.as_ref() == Some(id))
        {
            return Err(RegistryError::storage(
                "delete group",
                format!("group {} still has members", id),
            ));
        }
        let before = self.tables.groups.len();
        self.tables.groups.retain(|g| &g.id != id);
        if self.tables.groups.len() == before {
            return Err(missing("delete group", id));
        }
        Ok(())
    }

    fn group(&mut self, id: &GroupId) -> Result<Option<FarmerGroup>, RegistryError> {
        Ok(self.tables.groups.iter().find(|g| &g.id == id).cloned())
    }

    fn groups(&mut self) -> Result<Vec<FarmerGroup>, RegistryError> {
        Ok(newest_first(&self.tables.groups, |g| g.created_at))
    }

    fn insert_commodity(&mut self, commodity: &Commodity) -> Result<(), RegistryError> {
        self.tables.commodities.push(commodity.clone());
        Ok(())
    }

    fn update_commodity(&mut self, commodity: &Commodity) -> Result<(), RegistryError> {
        let row = self
            .tables
            .commodities
            .iter_mut()
            .find(|c| c.id == commodity.id)
            .ok_or_else(|| missing("update commodity", &commodity.id))?;
        *row = commodity.clone();
        Ok(())
    }

    fn delete_commodity(&mut self, id: &CommodityId) -> Result<(), RegistryError> {
        let before = self.tables.commodities.len();
        self.tables.commodities.retain(|c| &c.id != id);
        if self.tables.commodities.len() == before {
            return Err(missing("delete commodity", id));
        }
        Ok(())
    }

    fn commodity(&mut self, id: &CommodityId) -> Result<Option<Commodity>, RegistryError> {
        Ok(self.tables.commodities.iter().find(|c| &c.id == id).cloned())
    }

    fn commodities(&mut self) -> Result<Vec<Commodity>, RegistryError> {
        Ok(newest_first(&self.tables.commodities, |c| c.created_at))
    }

    fn commodities_of_group(
        &mut self,
        group_id: &GroupId,
    ) -> Result<Vec<Commodity>, RegistryError> {
        Ok(self
            .tables
            .commodities
            .iter()
            .filter(|c| c.group_id.as_ref() == Some(group_id))
            .cloned()
            .collect())
    }

    fn detach_commodities(&mut self, group_id: &GroupId) -> Result<usize, RegistryError> {
        let mut detached = 0;
        for commodity in &mut self.tables.commodities {
            if commodity.group_id.as_ref() == Some(group_id) {
                commodity.group_id = None;
                detached += 1;
            }
        }
        Ok(detached)
    }

    fn append_event(
        &mut self,
        group_id: &GroupId,
        event: &GroupEventType,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        self.tables.next_event_id += 1;
        self.tables.events.push(GroupEvent {
            id: self.tables.next_event_id,
            group_id: group_id.clone(),
            event: event.clone(),
            recorded_at,
        });
        Ok(())
    }

    fn group_events(
        &mut self,
        group_id: &GroupId,
        limit: usize,
    ) -> Result<Vec<GroupEvent>, RegistryError> {
        let mut events: Vec<GroupEvent> = self
            .tables
            .events
            .iter()
            .filter(|e| &e.group_id == group_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| {
            b.recorded_at
                .cmp(&a.recorded_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        events.truncate(limit);
        Ok(events)
    }
}
