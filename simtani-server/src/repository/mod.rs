//! Persistence abstraction for the registry.
//!
//! A [`RegistryStore`] runs units of work. Inside a unit the caller gets a
//! [`RegistryTx`] exposing row-level operations; everything done through it
//! is committed together when the work returns `Ok` and discarded otherwise.
//! Implementations provide the actual backend (in-memory, SQLite).

mod memory;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use simtani_core::{
    Commodity, CommodityId, District, DistrictId, Farmer, FarmerGroup, FarmerId, GroupAggregates,
    GroupId, RegistryError, VerificationState,
};

use crate::events::{GroupEvent, GroupEventType};

/// Row-level operations available inside a unit of work.
///
/// Lookups return `Ok(None)` for missing rows; updates and deletes of a
/// missing row are a storage error, so callers look rows up first.
pub trait RegistryTx {
    fn insert_district(&mut self, district: &District) -> Result<(), RegistryError>;
    fn district(&mut self, id: &DistrictId) -> Result<Option<District>, RegistryError>;
    fn district_by_name(&mut self, name: &str) -> Result<Option<District>, RegistryError>;
    /// All districts ordered by name.
    fn districts(&mut self) -> Result<Vec<District>, RegistryError>;

    fn insert_farmer(&mut self, farmer: &Farmer) -> Result<(), RegistryError>;
    fn update_farmer(&mut self, farmer: &Farmer) -> Result<(), RegistryError>;
    fn delete_farmer(&mut self, id: &FarmerId) -> Result<(), RegistryError>;
    fn farmer(&mut self, id: &FarmerId) -> Result<Option<Farmer>, RegistryError>;
    fn farmer_by_nik(&mut self, nik: &str) -> Result<Option<Farmer>, RegistryError>;
    /// All farmers, newest first.
    fn farmers(&mut self) -> Result<Vec<Farmer>, RegistryError>;
    /// Farmers whose group is `group_id`.
    fn farmers_in_group(&mut self, group_id: &GroupId) -> Result<Vec<Farmer>, RegistryError>;
    /// Clear the group of every member of `group_id`. Returns how many were detached.
    fn detach_farmers(&mut self, group_id: &GroupId) -> Result<usize, RegistryError>;

    fn insert_group(&mut self, group: &FarmerGroup) -> Result<(), RegistryError>;
    /// Write the profile columns only. Aggregates and verification are untouched.
    fn update_group_profile(&mut self, group: &FarmerGroup) -> Result<(), RegistryError>;
    fn write_group_aggregates(
        &mut self,
        id: &GroupId,
        aggregates: GroupAggregates,
    ) -> Result<(), RegistryError>;
    fn write_verification(
        &mut self,
        id: &GroupId,
        state: &VerificationState,
    ) -> Result<(), RegistryError>;
    fn delete_group(&mut self, id: &GroupId) -> Result<(), RegistryError>;
    fn group(&mut self, id: &GroupId) -> Result<Option<FarmerGroup>, RegistryError>;
    /// All groups, newest first.
    fn groups(&mut self) -> Result<Vec<FarmerGroup>, RegistryError>;

    fn insert_commodity(&mut self, commodity: &Commodity) -> Result<(), RegistryError>;
    fn update_commodity(&mut self, commodity: &Commodity) -> Result<(), RegistryError>;
    fn delete_commodity(&mut self, id: &CommodityId) -> Result<(), RegistryError>;
    fn commodity(&mut self, id: &CommodityId) -> Result<Option<Commodity>, RegistryError>;
    /// All commodities, newest first.
    fn commodities(&mut self) -> Result<Vec<Commodity>, RegistryError>;
    fn commodities_of_group(&mut self, group_id: &GroupId)
        -> Result<Vec<Commodity>, RegistryError>;
    fn detach_commodities(&mut self, group_id: &GroupId) -> Result<usize, RegistryError>;

    fn append_event(
        &mut self,
        group_id: &GroupId,
        event: &GroupEventType,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), RegistryError>;
    /// Most recent events of a group first.
    fn group_events(
        &mut self,
        group_id: &GroupId,
        limit: usize,
    ) -> Result<Vec<GroupEvent>, RegistryError>;
}

/// A backend that can run atomic units of work.
///
/// Implementations are synchronous; the service calls them from
/// `tokio::task::spawn_blocking`.
pub trait RegistryStore: Send + Sync {
    /// Run `work` atomically. Either every change it made is committed or none is.
    fn atomically(
        &self,
        work: &mut dyn FnMut(&mut dyn RegistryTx) -> Result<(), RegistryError>,
    ) -> Result<(), RegistryError>;
}

/// Run a value-returning closure as one unit of work on `store`.
pub fn with_tx<T, F>(store: &dyn RegistryStore, work: F) -> Result<T, RegistryError>
where
    F: FnOnce(&mut dyn RegistryTx) -> Result<T, RegistryError>,
{
    let mut work = Some(work);
    let mut output = None;
    store.atomically(&mut |tx| {
        let work = work
            .take()
            .ok_or_else(|| RegistryError::storage("unit of work", "work ran more than once"))?;
        output = Some(work(tx)?);
        Ok(())
    })?;
    output.ok_or_else(|| RegistryError::storage("unit of work", "work did not run"))
}
