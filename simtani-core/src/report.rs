//! Dashboard and report builders.
//!
//! Builders work on a [`RegistrySnapshot`] read inside a single unit of work,
//! so every figure in one response comes from the same committed state.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::eligibility::{eligible_commodities, eligible_group_ids, eligible_groups};
use crate::model::{Commodity, District, DistrictId, Farmer, FarmerGroup, GroupId};
use crate::verification::VerificationStatus;

#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    pub districts: Vec<District>,
    pub groups: Vec<FarmerGroup>,
    pub farmers: Vec<Farmer>,
    pub commodities: Vec<Commodity>,
}

impl RegistrySnapshot {
    fn district_names(&self) -> HashMap<&DistrictId, &str> {
        self.districts
            .iter()
            .map(|d| (&d.id, d.name.as_str()))
            .collect()
    }

    fn group_names(&self) -> HashMap<&GroupId, &str> {
        self.groups
            .iter()
            .map(|g| (&g.id, g.name.as_str()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Every registered farmer.
    pub total_farmers: usize,
    /// Accepted groups only.
    pub total_groups: usize,
    pub total_districts: usize,
    /// Every commodity record.
    pub total_commodities: usize,
    /// Sum of the accepted groups' stored `total_land_area`.
    pub total_land_area: f64,
    /// Crop type to planted area, over commodities of accepted groups.
    pub commodity_distribution: BTreeMap<String, f64>,
    /// District name to number of accepted groups.
    pub groups_per_district: BTreeMap<String, usize>,
    /// District name to land area of accepted groups.
    pub land_area_per_district: BTreeMap<String, f64>,
}

impl DashboardStats {
    pub fn build(snapshot: &RegistrySnapshot) -> Self {
        let district_names = snapshot.district_names();
        let district_label = |id: &DistrictId| -> String {
            district_names
                .get(id)
                .map(|name| name.to_string())
                .unwrap_or_else(|| id.to_string())
        };

        let mut total_groups = 0;
        let mut total_land_area = 0.0;
        let mut groups_per_district = BTreeMap::new();
        let mut land_area_per_district = BTreeMap::new();
        for group in eligible_groups(&snapshot.groups) {
            total_groups += 1;
            total_land_area += group.total_land_area;
            let label = district_label(&group.district_id);
            *groups_per_district.entry(label.clone()).or_insert(0) += 1;
            *land_area_per_district.entry(label).or_insert(0.0) += group.total_land_area;
        }

        let eligible = eligible_group_ids(&snapshot.groups);
        let mut commodity_distribution = BTreeMap::new();
        for commodity in eligible_commodities(&snapshot.commodities, &eligible) {
            *commodity_distribution
                .entry(commodity.crop_type.clone())
                .or_insert(0.0) += commodity.area_planted;
        }

        Self {
            total_farmers: snapshot.farmers.len(),
            total_groups,
            total_districts: snapshot.districts.len(),
            total_commodities: snapshot.commodities.len(),
            total_land_area,
            commodity_distribution,
            groups_per_district,
            land_area_per_district,
        }
    }
}

/// Group counts per verification status. Absent statuses count as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct VerificationStats {
    #[serde(rename = "PENDING")]
    pub pending: usize,
    #[serde(rename = "DITERIMA")]
    pub accepted: usize,
    #[serde(rename = "DITOLAK")]
    pub rejected: usize,
}

impl VerificationStats {
    pub fn build(groups: &[FarmerGroup]) -> Self {
        let mut stats = Self::default();
        for group in groups {
            match group.status() {
                VerificationStatus::Pending => stats.pending += 1,
                VerificationStatus::Accepted => stats.accepted += 1,
                VerificationStatus::Rejected => stats.rejected += 1,
            }
        }
        stats
    }
}

/// A group with its members and commodities.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDetail {
    #[serde(flatten)]
    pub group: FarmerGroup,
    pub district_name: Option<String>,
    pub members: Vec<Farmer>,
    pub commodities: Vec<Commodity>,
}

impl GroupDetail {
    pub fn assemble(
        group: FarmerGroup,
        district: Option<&District>,
        members: Vec<Farmer>,
        commodities: Vec<Commodity>,
    ) -> Self {
        Self {
            district_name: district.map(|d| d.name.clone()),
            group,
            members,
            commodities,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommodityReportEntry {
    #[serde(flatten)]
    pub commodity: Commodity,
    pub group_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerReportEntry {
    #[serde(flatten)]
    pub farmer: Farmer,
    pub district_name: Option<String>,
    pub group_name: Option<String>,
}

/// Accepted groups with their members and commodities.
pub fn group_report(snapshot: &RegistrySnapshot) -> Vec<GroupDetail> {
    eligible_groups(&snapshot.groups)
        .map(|group| {
            let district = snapshot.districts.iter().find(|d| d.id == group.district_id);
            let members = snapshot
                .farmers
                .iter()
                .filter(|f| f.group_id.as_ref() == Some(&group.id))
                .cloned()
                .collect();
            let commodities = snapshot
                .commodities
                .iter()
                .filter(|c| c.group_id.as_ref() == Some(&group.id))
                .cloned()
                .collect();
            GroupDetail::assemble(group.clone(), district, members, commodities)
        })
        .collect()
}

/// Commodities of accepted groups.
pub fn commodity_report(snapshot: &RegistrySnapshot) -> Vec<CommodityReportEntry> {
    let eligible = eligible_group_ids(&snapshot.groups);
    let group_names = snapshot.group_names();
    eligible_commodities(&snapshot.commodities, &eligible)
        .map(|commodity| CommodityReportEntry {
            group_name: commodity
                .group_id
                .as_ref()
                .and_then(|id| group_names.get(id))
                .map(|name| name.to_string()),
            commodity: commodity.clone(),
        })
        .collect()
}

/// Every farmer, with district and group names resolved. Not filtered.
pub fn farmer_report(snapshot: &RegistrySnapshot) -> Vec<FarmerReportEntry> {
    let district_names = snapshot.district_names();
    let group_names = snapshot.group_names();
    snapshot
        .farmers
        .iter()
        .map(|farmer| FarmerReportEntry {
            district_name: district_names
                .get(&farmer.district_id)
                .map(|name| name.to_string()),
            group_name: farmer
                .group_id
                .as_ref()
                .and_then(|id| group_names.get(id))
                .map(|name| name.to_string()),
            farmer: farmer.clone(),
        })
        .collect()
}
