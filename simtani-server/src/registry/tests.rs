//! Tests for the registry service.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use simtani_core::input::{FarmerPatch, GroupPatch, NewCommodity, NewDistrict, NewFarmer, NewGroup};
use simtani_core::{
    Commodity, CommodityId, District, DistrictId, ErrorKind, Farmer, FarmerGroup, FarmerId,
    GroupAggregates, GroupId, RegistryError, UserId, VerificationPolicy, VerificationState,
    VerificationStatus, VerifyCommand,
};

use super::Registry;
use crate::clock::FixedClock;
use crate::events::{GroupEvent, GroupEventType};
use crate::repository::{InMemoryStore, RegistryStore, RegistryTx, SqliteStore};

use proptest::prelude::*;

// =============================================================================
// Fault injection
// =============================================================================

/// Store wrapper whose transactions fail on aggregate writes while armed.
struct FailingStore<S> {
    inner: S,
    fail_aggregate_writes: AtomicBool,
}

impl<S: RegistryStore> FailingStore<S> {
    fn new(inner: S) -> Self {
        Self {
            inner,
            fail_aggregate_writes: AtomicBool::new(false),
        }
    }

    fn arm(&self) {
        self.fail_aggregate_writes.store(true, Ordering::SeqCst);
    }
}

impl<S: RegistryStore> RegistryStore for FailingStore<S> {
    fn atomically(
        &self,
        work: &mut dyn FnMut(&mut dyn RegistryTx) -> Result<(), RegistryError>,
    ) -> Result<(), RegistryError> {
        let fail = self.fail_aggregate_writes.load(Ordering::SeqCst);
        self.inner.atomically(&mut |tx| {
            let mut failing = FailingTx { inner: tx, fail };
            work(&mut failing)
        })
    }
}

struct FailingTx<'a> {
    inner: &'a mut dyn RegistryTx,
    fail: bool,
}

impl RegistryTx for FailingTx<'_> {
    fn insert_district(&mut self, district: &District) -> Result<(), RegistryError> {
        self.inner.insert_district(district)
    }
    fn district(&mut self, id: &DistrictId) -> Result<Option<District>, RegistryError> {
        self.inner.district(id)
    }
    fn district_by_name(&mut self, name: &str) -> Result<Option<District>, RegistryError> {
        self.inner.district_by_name(name)
    }
    fn districts(&mut self) -> Result<Vec<District>, RegistryError> {
        self.inner.districts()
    }
    fn insert_farmer(&mut self, farmer: &Farmer) -> Result<(), RegistryError> {
        self.inner.insert_farmer(farmer)
    }
    fn update_farmer(&mut self, farmer: &Farmer) -> Result<(), RegistryError> {
        self.inner.update_farmer(farmer)
    }
    fn delete_farmer(&mut self, id: &FarmerId) -> Result<(), RegistryError> {
        self.inner.delete_farmer(id)
    }
    fn farmer(&mut self, id: &FarmerId) -> Result<Option<Farmer>, RegistryError> {
        self.inner.farmer(id)
    }
    fn farmer_by_nik(&mut self, nik: &str) -> Result<Option<Farmer>, RegistryError> {
        self.inner.farmer_by_nik(nik)
    }
    fn farmers(&mut self) -> Result<Vec<Farmer>, RegistryError> {
        self.inner.farmers()
    }
    fn farmers_in_group(&mut self, group_id: &GroupId) -> Result<Vec<Farmer>, RegistryError> {
        self.inner.farmers_in_group(group_id)
    }
    fn detach_farmers(&mut self, group_id: &GroupId) -> Result<usize, RegistryError> {
        self.inner.detach_farmers(group_id)
    }
    fn insert_group(&mut self, group: &FarmerGroup) -> Result<(), RegistryError> {
        self.inner.insert_group(group)
    }
    fn update_group_profile(&mut self, group: &FarmerGroup) -> Result<(), RegistryError> {
        self.inner.update_group_profile(group)
    }
    fn write_group_aggregates(
        &mut self,
        id: &GroupId,
        aggregates: GroupAggregates,
    ) -> Result<(), RegistryError> {
        if self.fail {
            return Err(RegistryError::storage(
                "write group aggregates",
                "injected failure",
            ));
        }
        self.inner.write_group_aggregates(id, aggregates)
    }
    fn write_verification(
        &mut self,
        id: &GroupId,
        state: &VerificationState,
    ) -> Result<(), RegistryError> {
        self.inner.write_verification(id, state)
    }
    fn delete_group(&mut self, id: &GroupId) -> Result<(), RegistryError> {
        self.inner.delete_group(id)
    }
    fn group(&mut self, id: &GroupId) -> Result<Option<FarmerGroup>, RegistryError> {
        self.inner.group(id)
    }
    fn groups(&mut self) -> Result<Vec<FarmerGroup>, RegistryError> {
        self.inner.groups()
    }
    fn insert_commodity(&mut self, commodity: &Commodity) -> Result<(), RegistryError> {
        self.inner.insert_commodity(commodity)
    }
    fn update_commodity(&mut self, commodity: &Commodity) -> Result<(), RegistryError> {
        self.inner.update_commodity(commodity)
    }
    fn delete_commodity(&mut self, id: &CommodityId) -> Result<(), RegistryError> {
        self.inner.delete_commodity(id)
    }
    fn commodity(&mut self, id: &CommodityId) -> Result<Option<Commodity>, RegistryError> {
        self.inner.commodity(id)
    }
    fn commodities(&mut self) -> Result<Vec<Commodity>, RegistryError> {
        self.inner.commodities()
    }
    fn commodities_of_group(
        &mut self,
        group_id: &GroupId,
    ) -> Result<Vec<Commodity>, RegistryError> {
        self.inner.commodities_of_group(group_id)
    }
    fn detach_commodities(&mut self, group_id: &GroupId) -> Result<usize, RegistryError> {
        self.inner.detach_commodities(group_id)
    }
    fn append_event(
        &mut self,
        group_id: &GroupId,
        event: &GroupEventType,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        self.inner.append_event(group_id, event, recorded_at)
    }
    fn group_events(
        &mut self,
        group_id: &GroupId,
        limit: usize,
    ) -> Result<Vec<GroupEvent>, RegistryError> {
        self.inner.group_events(group_id, limit)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 2, 8, 0, 0).unwrap()
}

fn registry_on(store: Arc<dyn RegistryStore>, policy: VerificationPolicy) -> (Registry, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(start()));
    (Registry::new(store, clock.clone(), policy), clock)
}

fn memory_registry() -> (Registry, Arc<FixedClock>) {
    registry_on(Arc::new(InMemoryStore::new()), VerificationPolicy::default())
}

fn sqlite_registry() -> (Registry, Arc<FixedClock>) {
    registry_on(
        Arc::new(SqliteStore::new_in_memory().unwrap()),
        VerificationPolicy::default(),
    )
}

async fn district(registry: &Registry, name: &str) -> District {
    registry
        .create_district(NewDistrict {
            name: name.to_string(),
        })
        .await
        .unwrap()
}

async fn group(registry: &Registry, district: &District, name: &str) -> FarmerGroup {
    registry
        .create_group(NewGroup {
            name: name.to_string(),
            leader: "Pak Ketua".to_string(),
            district_id: district.id.clone(),
            address: None,
            contact: None,
        })
        .await
        .unwrap()
}

fn new_farmer(nik: &str, land_area: f64, district: &District, group: Option<&FarmerGroup>) -> NewFarmer {
    NewFarmer {
        name: format!("Petani {}", nik),
        nik: nik.to_string(),
        address: "Jl. Sam Ratulangi".to_string(),
        contact: None,
        land_area,
        crop_type: "Padi".to_string(),
        district_id: district.id.clone(),
        group_id: group.map(|g| g.id.clone()),
    }
}

fn decide(status: &str, note: Option<&str>) -> VerifyCommand {
    VerifyCommand::parse(status, note.map(str::to_string), UserId::from("admin-1")).unwrap()
}

async fn stored_group(registry: &Registry, id: &GroupId) -> FarmerGroup {
    registry.get_group(id.clone()).await.unwrap().group
}

// =============================================================================
// Aggregate maintenance
// =============================================================================

#[tokio::test]
async fn test_wenang_scenario() {
    for (registry, _clock) in [memory_registry(), sqlite_registry()] {
        let wenang = district(&registry, "Wenang").await;
        let g = group(&registry, &wenang, "Tani Jaya").await;

        let a = registry
            .create_farmer(new_farmer("A", 2.5, &wenang, Some(&g)))
            .await
            .unwrap();
        registry
            .create_farmer(new_farmer("B", 1.0, &wenang, Some(&g)))
            .await
            .unwrap();

        let stored = stored_group(&registry, &g.id).await;
        assert_eq!(stored.member_count, 2);
        assert_eq!(stored.total_land_area, 3.5);

        let verified = registry.verify(g.id.clone(), decide("DITERIMA", None)).await.unwrap();
        assert_eq!(verified.status(), VerificationStatus::Accepted);
        assert_eq!(verified.member_count, 2);

        let dashboard = registry.dashboard().await.unwrap();
        assert_eq!(dashboard.total_groups, 1);
        assert_eq!(dashboard.total_land_area, 3.5);

        registry.delete_farmer(a.id).await.unwrap();
        let stored = stored_group(&registry, &g.id).await;
        assert_eq!(stored.member_count, 1);
        assert_eq!(stored.total_land_area, 1.0);
        assert_eq!(registry.dashboard().await.unwrap().total_land_area, 1.0);
    }
}

#[tokio::test]
async fn test_reassignment_moves_aggregates() {
    let (registry, _clock) = memory_registry();
    let d = district(&registry, "Tikala").await;
    let g = group(&registry, &d, "G").await;
    let h = group(&registry, &d, "H").await;

    let f = registry
        .create_farmer(new_farmer("F", 4.0, &d, Some(&g)))
        .await
        .unwrap();
    registry
        .update_farmer(
            f.id.clone(),
            FarmerPatch {
                group_id: Some(Some(h.id.clone())),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let g = stored_group(&registry, &g.id).await;
    let h = stored_group(&registry, &h.id).await;
    assert_eq!((g.member_count, g.total_land_area), (0, 0.0));
    assert_eq!((h.member_count, h.total_land_area), (1, 4.0));
}

#[tokio::test]
async fn test_land_area_edit_recomputes_group() {
    let (registry, _clock) = memory_registry();
    let d = district(&registry, "Wanea").await;
    let g = group(&registry, &d, "G").await;
    let f = registry
        .create_farmer(new_farmer("F", 1.0, &d, Some(&g)))
        .await
        .unwrap();

    registry
        .update_farmer(
            f.id,
            FarmerPatch {
                land_area: Some(6.5),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(stored_group(&registry, &g.id).await.total_land_area, 6.5);
}

#[tokio::test]
async fn test_clearing_group_detaches_farmer() {
    let (registry, _clock) = memory_registry();
    let d = district(&registry, "Wanea").await;
    let g = group(&registry, &d, "G").await;
    let f = registry
        .create_farmer(new_farmer("F", 1.0, &d, Some(&g)))
        .await
        .unwrap();

    let updated = registry
        .update_farmer(
            f.id,
            FarmerPatch {
                group_id: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.group_id, None);
    assert_eq!(stored_group(&registry, &g.id).await.member_count, 0);
}

#[tokio::test]
async fn test_detach_on_group_delete() {
    for (registry, _clock) in [memory_registry(), sqlite_registry()] {
        let d = district(&registry, "Sario").await;
        let g = group(&registry, &d, "G").await;
        let mut before = Vec::new();
        for (i, area) in [1.0, 2.0, 3.5].into_iter().enumerate() {
            before.push(
                registry
                    .create_farmer(new_farmer(&format!("N{}", i), area, &d, Some(&g)))
                    .await
                    .unwrap(),
            );
        }
        let commodity = registry
            .create_commodity(NewCommodity {
                crop_type: "Jagung".to_string(),
                area_planted: 2.0,
                estimated_yield: None,
                fertilizer: None,
                pesticide: None,
                group_id: Some(g.id.clone()),
            })
            .await
            .unwrap();

        registry.delete_group(g.id.clone()).await.unwrap();

        let err = registry.get_group(g.id.clone()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        for farmer in before {
            let after = registry.get_farmer(farmer.id.clone()).await.unwrap();
            let mut expected = farmer.clone();
            expected.group_id = None;
            assert_eq!(after, expected);
        }
        let commodity = registry.get_commodity(commodity.id).await.unwrap();
        assert_eq!(commodity.group_id, None);
    }
}

#[tokio::test]
async fn test_update_group_heals_drifted_aggregates() {
    let store = Arc::new(InMemoryStore::new());
    let (registry, _clock) = registry_on(store.clone(), VerificationPolicy::default());
    let d = district(&registry, "Wenang").await;
    let g = group(&registry, &d, "G").await;
    registry
        .create_farmer(new_farmer("A", 2.0, &d, Some(&g)))
        .await
        .unwrap();

    crate::repository::with_tx(store.as_ref(), |tx| {
        tx.write_group_aggregates(
            &g.id,
            GroupAggregates {
                member_count: 9,
                total_land_area: 42.0,
            },
        )
    })
    .unwrap();

    let updated = registry
        .update_group(
            g.id.clone(),
            GroupPatch {
                leader: Some("Ibu Ketua".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.leader, "Ibu Ketua");
    assert_eq!(updated.member_count, 1);
    assert_eq!(updated.total_land_area, 2.0);
}

// =============================================================================
// Atomicity
// =============================================================================

#[tokio::test]
async fn test_failed_recompute_rolls_back_farmer_writes() {
    let memory: Arc<FailingStore<InMemoryStore>> =
        Arc::new(FailingStore::new(InMemoryStore::new()));
    let sqlite: Arc<FailingStore<SqliteStore>> =
        Arc::new(FailingStore::new(SqliteStore::new_in_memory().unwrap()));
    let memory_store: Arc<dyn RegistryStore> = memory.clone();
    let sqlite_store: Arc<dyn RegistryStore> = sqlite.clone();
    let arm_memory: Box<dyn Fn()> = Box::new(move || memory.arm());
    let arm_sqlite: Box<dyn Fn()> = Box::new(move || sqlite.arm());
    let cases = vec![(memory_store, arm_memory), (sqlite_store, arm_sqlite)];

    for (store, arm) in cases {
        let (registry, _clock) = registry_on(store, VerificationPolicy::default());
        let d = district(&registry, "Wenang").await;
        let g = group(&registry, &d, "G").await;
        let h = group(&registry, &d, "H").await;
        let f = registry
            .create_farmer(new_farmer("A", 2.0, &d, Some(&g)))
            .await
            .unwrap();

        arm();

        let err = registry
            .create_farmer(new_farmer("B", 3.0, &d, Some(&g)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageFailure);

        let err = registry
            .update_farmer(
                f.id.clone(),
                FarmerPatch {
                    land_area: Some(10.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageFailure);

        let err = registry.delete_farmer(f.id.clone()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageFailure);

        // Reassignment recomputes both groups; neither write may land.
        let err = registry
            .update_farmer(
                f.id.clone(),
                FarmerPatch {
                    group_id: Some(Some(h.id.clone())),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageFailure);

        let farmers = registry.list_farmers().await.unwrap();
        assert_eq!(farmers.len(), 1);
        assert_eq!(farmers[0].land_area, 2.0);
        assert_eq!(farmers[0].group_id.as_ref(), Some(&g.id));

        let stored = stored_group(&registry, &g.id).await;
        assert_eq!((stored.member_count, stored.total_land_area), (1, 2.0));
        let stored = stored_group(&registry, &h.id).await;
        assert_eq!((stored.member_count, stored.total_land_area), (0, 0.0));
    }
}

// =============================================================================
// Verification
// =============================================================================

#[tokio::test]
async fn test_verify_records_actor_time_and_note() {
    let (registry, clock) = memory_registry();
    let d = district(&registry, "Wenang").await;
    let g = group(&registry, &d, "G").await;
    clock.advance(Duration::hours(3));

    let verified = registry
        .verify(g.id.clone(), decide("DITOLAK", Some("  missing documents ")))
        .await
        .unwrap();
    assert_eq!(
        verified.verification,
        VerificationState::Decided {
            decision: simtani_core::Decision::Rejected,
            verified_by: UserId::from("admin-1"),
            verified_at: start() + Duration::hours(3),
            note: Some("missing documents".to_string()),
        }
    );
    assert_eq!(stored_group(&registry, &g.id).await, verified);
}

#[tokio::test]
async fn test_verify_missing_group_is_not_found() {
    let (registry, _clock) = memory_registry();
    let err = registry
        .verify(GroupId::from("nope"), decide("DITERIMA", None))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_strict_policy_refuses_second_decision() {
    let (registry, _clock) = sqlite_registry();
    let d = district(&registry, "Wenang").await;
    let g = group(&registry, &d, "G").await;
    registry.verify(g.id.clone(), decide("DITERIMA", None)).await.unwrap();

    let err = registry
        .verify(g.id.clone(), decide("DITOLAK", None))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(
        stored_group(&registry, &g.id).await.status(),
        VerificationStatus::Accepted
    );
}

#[tokio::test]
async fn test_permissive_policy_allows_second_decision() {
    let (registry, _clock) = registry_on(
        Arc::new(InMemoryStore::new()),
        VerificationPolicy {
            allow_reverification: true,
        },
    );
    let d = district(&registry, "Wenang").await;
    let g = group(&registry, &d, "G").await;
    registry.verify(g.id.clone(), decide("DITERIMA", None)).await.unwrap();
    let again = registry
        .verify(g.id.clone(), decide("DITOLAK", None))
        .await
        .unwrap();
    assert_eq!(again.status(), VerificationStatus::Rejected);
}

#[tokio::test]
async fn test_verification_does_not_touch_aggregates() {
    let (registry, _clock) = memory_registry();
    let d = district(&registry, "Wenang").await;
    let g = group(&registry, &d, "G").await;
    registry
        .create_farmer(new_farmer("A", 2.5, &d, Some(&g)))
        .await
        .unwrap();
    let before = stored_group(&registry, &g.id).await;
    let after = registry.verify(g.id.clone(), decide("DITERIMA", None)).await.unwrap();
    assert_eq!(before.member_count, after.member_count);
    assert_eq!(before.total_land_area, after.total_land_area);
}

#[tokio::test]
async fn test_pending_queue_and_stats() {
    let (registry, _clock) = memory_registry();
    let d = district(&registry, "Wenang").await;
    let a = group(&registry, &d, "A").await;
    let b = group(&registry, &d, "B").await;
    group(&registry, &d, "C").await;
    registry.verify(a.id.clone(), decide("DITERIMA", None)).await.unwrap();
    registry.verify(b.id.clone(), decide("DITOLAK", None)).await.unwrap();

    let pending = registry.pending_groups().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].name, "C");

    let stats = registry.verification_stats().await.unwrap();
    assert_eq!((stats.pending, stats.accepted, stats.rejected), (1, 1, 1));
}

#[tokio::test]
async fn test_group_timeline() {
    let (registry, clock) = sqlite_registry();
    let d = district(&registry, "Wenang").await;
    let g = group(&registry, &d, "G").await;
    clock.advance(Duration::minutes(1));
    registry
        .create_farmer(new_farmer("A", 2.5, &d, Some(&g)))
        .await
        .unwrap();
    clock.advance(Duration::minutes(1));
    registry.verify(g.id.clone(), decide("DITERIMA", None)).await.unwrap();

    let events = registry.group_events(g.id.clone(), 10).await.unwrap();
    let names: Vec<&str> = events.iter().map(|e| e.event.name()).collect();
    assert_eq!(
        names,
        vec!["VerificationDecided", "AggregatesRecomputed", "GroupRegistered"]
    );
}

#[tokio::test]
async fn test_timeline_outlives_deleted_group() {
    for (registry, clock) in [memory_registry(), sqlite_registry()] {
        let d = district(&registry, "Wenang").await;
        let g = group(&registry, &d, "G").await;
        registry
            .create_farmer(new_farmer("A", 1.0, &d, Some(&g)))
            .await
            .unwrap();
        clock.advance(Duration::minutes(1));
        registry.delete_group(g.id.clone()).await.unwrap();

        let events = registry.group_events(g.id.clone(), 50).await.unwrap();
        let names: Vec<&str> = events.iter().map(|e| e.event.name()).collect();
        assert_eq!(
            names,
            vec!["GroupDeleted", "AggregatesRecomputed", "GroupRegistered"]
        );
        match &events[0].event {
            GroupEventType::GroupDeleted {
                detached_farmers,
                detached_commodities,
            } => assert_eq!((*detached_farmers, *detached_commodities), (1, 0)),
            other => panic!("unexpected event {:?}", other),
        }

        let err = registry
            .group_events(GroupId::from("never-existed"), 50)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_farmer_with_unknown_district_is_invalid() {
    let (registry, _clock) = memory_registry();
    let ghost = District {
        id: DistrictId::from("ghost"),
        name: "Ghost".to_string(),
        created_at: start(),
    };
    let err = registry
        .create_farmer(new_farmer("A", 1.0, &ghost, None))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn test_farmer_with_unknown_group_is_not_found() {
    let (registry, _clock) = memory_registry();
    let d = district(&registry, "Wenang").await;
    let mut input = new_farmer("A", 1.0, &d, None);
    input.group_id = Some(GroupId::from("missing"));
    let err = registry.create_farmer(input).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(registry.list_farmers().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_nik_is_conflict() {
    let (registry, _clock) = sqlite_registry();
    let d = district(&registry, "Wenang").await;
    registry.create_farmer(new_farmer("7171", 1.0, &d, None)).await.unwrap();
    let err = registry
        .create_farmer(new_farmer("7171", 2.0, &d, None))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_nik_change_to_taken_value_is_conflict() {
    let (registry, _clock) = memory_registry();
    let d = district(&registry, "Wenang").await;
    registry.create_farmer(new_farmer("1", 1.0, &d, None)).await.unwrap();
    let second = registry.create_farmer(new_farmer("2", 1.0, &d, None)).await.unwrap();
    let err = registry
        .update_farmer(
            second.id,
            FarmerPatch {
                nik: Some("1".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_duplicate_district_is_conflict() {
    let (registry, _clock) = memory_registry();
    district(&registry, "Wenang").await;
    let err = registry
        .create_district(NewDistrict {
            name: " Wenang ".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

// =============================================================================
// Reporting
// =============================================================================

#[tokio::test]
async fn test_reports_only_count_accepted_groups() {
    let (registry, _clock) = memory_registry();
    let d = district(&registry, "Wenang").await;
    let accepted = group(&registry, &d, "Accepted").await;
    let rejected = group(&registry, &d, "Rejected").await;
    let pending = group(&registry, &d, "Pending").await;
    for (nik, g) in [("1", &accepted), ("2", &rejected), ("3", &pending)] {
        registry
            .create_farmer(new_farmer(nik, 5.0, &d, Some(g)))
            .await
            .unwrap();
        registry
            .create_commodity(NewCommodity {
                crop_type: "Cabai".to_string(),
                area_planted: 1.5,
                estimated_yield: Some(3.0),
                fertilizer: None,
                pesticide: None,
                group_id: Some(g.id.clone()),
            })
            .await
            .unwrap();
    }
    registry.verify(accepted.id.clone(), decide("DITERIMA", None)).await.unwrap();
    registry.verify(rejected.id.clone(), decide("DITOLAK", None)).await.unwrap();

    let dashboard = registry.dashboard().await.unwrap();
    assert_eq!(dashboard.total_farmers, 3);
    assert_eq!(dashboard.total_groups, 1);
    assert_eq!(dashboard.total_land_area, 5.0);
    assert_eq!(dashboard.commodity_distribution.get("Cabai"), Some(&1.5));
    assert_eq!(dashboard.groups_per_district.get("Wenang"), Some(&1));

    let groups = registry.group_report().await.unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].group.id, accepted.id);

    let commodities = registry.commodity_report().await.unwrap();
    assert_eq!(commodities.len(), 1);
    assert_eq!(commodities[0].group_name.as_deref(), Some("Accepted"));

    assert_eq!(registry.farmer_report().await.unwrap().len(), 3);
    assert_eq!(registry.list_groups().await.unwrap().len(), 3);
}

// =============================================================================
// Properties
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Create { group: Option<usize>, area: f64 },
    Move { farmer: usize, group: Option<usize> },
    Resize { farmer: usize, area: f64 },
    Delete { farmer: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let group = proptest::option::of(0usize..3);
    prop_oneof![
        (group.clone(), 0.1f64..50.0).prop_map(|(group, area)| Op::Create { group, area }),
        (0usize..16, group).prop_map(|(farmer, group)| Op::Move { farmer, group }),
        (0usize..16, 0.1f64..50.0).prop_map(|(farmer, area)| Op::Resize { farmer, area }),
        (0usize..16).prop_map(|farmer| Op::Delete { farmer }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Property: after every farmer mutation in a sequence, each group's
    /// stored aggregates equal a fresh recomputation over its members.
    #[test]
    fn aggregates_stay_consistent(ops in proptest::collection::vec(op_strategy(), 1..30)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let (registry, _clock) = memory_registry();
            let d = district(&registry, "Wenang").await;
            let mut groups = Vec::new();
            for name in ["G0", "G1", "G2"] {
                groups.push(group(&registry, &d, name).await);
            }

            let mut farmers: Vec<FarmerId> = Vec::new();
            let mut next_nik = 0;
            for op in ops {
                match op {
                    Op::Create { group, area } => {
                        next_nik += 1;
                        let g = group.map(|i| &groups[i]);
                        let f = registry
                            .create_farmer(new_farmer(&next_nik.to_string(), area, &d, g))
                            .await
                            .unwrap();
                        farmers.push(f.id);
                    }
                    Op::Move { farmer, group } if !farmers.is_empty() => {
                        let id = farmers[farmer % farmers.len()].clone();
                        registry
                            .update_farmer(id, FarmerPatch {
                                group_id: Some(group.map(|i| groups[i].id.clone())),
                                ..Default::default()
                            })
                            .await
                            .unwrap();
                    }
                    Op::Resize { farmer, area } if !farmers.is_empty() => {
                        let id = farmers[farmer % farmers.len()].clone();
                        registry
                            .update_farmer(id, FarmerPatch {
                                land_area: Some(area),
                                ..Default::default()
                            })
                            .await
                            .unwrap();
                    }
                    Op::Delete { farmer } if !farmers.is_empty() => {
                        let id = farmers.remove(farmer % farmers.len());
                        registry.delete_farmer(id).await.unwrap();
                    }
                    _ => {}
                }

                for g in &groups {
                    let detail = registry.get_group(g.id.clone()).await.unwrap();
                    let expected = simtani_core::recompute(&detail.members);
                    assert_eq!(detail.group.member_count, expected.member_count);
                    assert_eq!(detail.group.total_land_area, expected.total_land_area);
                }
            }
        });
    }
}
