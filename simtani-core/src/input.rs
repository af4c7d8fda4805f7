//! Create and update requests, with their validation rules.
//!
//! Creation requests are checked in isolation here; checks that need the
//! store (district exists, NIK unique, group exists) happen in the service.
//! Patches leave absent fields untouched. For nullable references the
//! field is tri-state: absent keeps the value, `null` clears it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::error::RegistryError;
use crate::model::{
    Commodity, CommodityId, District, DistrictId, Farmer, FarmerGroup, FarmerId, GroupId,
};
use crate::verification::VerificationState;

/// Deserialize a present-but-possibly-null group reference. Blank strings clear it.
fn nullable_group<'de, D>(deserializer: D) -> Result<Option<Option<GroupId>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(Some(
        value
            .filter(|s| !s.trim().is_empty())
            .map(GroupId::from),
    ))
}

/// Deserialize an optional group reference, treating a blank string as none.
fn optional_group<'de, D>(deserializer: D) -> Result<Option<GroupId>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()).map(GroupId::from))
}

fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn required(field: &str, value: &str) -> Result<String, RegistryError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RegistryError::invalid(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn positive_area(field: &str, value: f64) -> Result<f64, RegistryError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(RegistryError::invalid(format!(
            "{} must be a positive number of hectares",
            field
        )));
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewDistrict {
    pub name: String,
}

impl NewDistrict {
    pub fn into_district(self, now: DateTime<Utc>) -> Result<District, RegistryError> {
        Ok(District {
            id: DistrictId::generate(),
            name: required("name", &self.name)?,
            created_at: now,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFarmer {
    pub name: String,
    pub nik: String,
    pub address: String,
    #[serde(default)]
    pub contact: Option<String>,
    pub land_area: f64,
    pub crop_type: String,
    pub district_id: DistrictId,
    #[serde(default, deserialize_with = "optional_group")]
    pub group_id: Option<GroupId>,
}

impl NewFarmer {
    pub fn into_farmer(self, now: DateTime<Utc>) -> Result<Farmer, RegistryError> {
        Ok(Farmer {
            id: FarmerId::generate(),
            name: required("name", &self.name)?,
            nik: required("nik", &self.nik)?,
            address: required("address", &self.address)?,
            contact: optional_text(self.contact),
            land_area: positive_area("landArea", self.land_area)?,
            crop_type: required("cropType", &self.crop_type)?,
            district_id: DistrictId::from(required("districtId", self.district_id.as_str())?),
            group_id: self.group_id,
            created_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub nik: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub contact: Option<Option<String>>,
    #[serde(default)]
    pub land_area: Option<f64>,
    #[serde(default)]
    pub crop_type: Option<String>,
    #[serde(default)]
    pub district_id: Option<DistrictId>,
    #[serde(default, deserialize_with = "nullable_group")]
    pub group_id: Option<Option<GroupId>>,
}

impl FarmerPatch {
    /// Produce the updated farmer. The identity and creation time never change.
    pub fn apply(self, current: &Farmer) -> Result<Farmer, RegistryError> {
        let mut next = current.clone();
        if let Some(name) = self.name {
            next.name = required("name", &name)?;
        }
        if let Some(nik) = self.nik {
            next.nik = required("nik", &nik)?;
        }
        if let Some(address) = self.address {
            next.address = required("address", &address)?;
        }
        if let Some(contact) = self.contact {
            next.contact = optional_text(contact);
        }
        if let Some(land_area) = self.land_area {
            next.land_area = positive_area("landArea", land_area)?;
        }
        if let Some(crop_type) = self.crop_type {
            next.crop_type = required("cropType", &crop_type)?;
        }
        if let Some(district_id) = self.district_id {
            next.district_id = DistrictId::from(required("districtId", district_id.as_str())?);
        }
        if let Some(group_id) = self.group_id {
            next.group_id = group_id;
        }
        Ok(next)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGroup {
    pub name: String,
    pub leader: String,
    pub district_id: DistrictId,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
}

impl NewGroup {
    /// A new group is pending with empty aggregates.
    pub fn into_group(self, now: DateTime<Utc>) -> Result<FarmerGroup, RegistryError> {
        Ok(FarmerGroup {
            id: GroupId::generate(),
            name: required("name", &self.name)?,
            leader: required("leader", &self.leader)?,
            district_id: DistrictId::from(required("districtId", self.district_id.as_str())?),
            address: optional_text(self.address),
            contact: optional_text(self.contact),
            member_count: 0,
            total_land_area: 0.0,
            verification: VerificationState::Pending,
            created_at: now,
        })
    }
}

/// Profile edit for a group. Aggregates and verification are not editable.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub leader: Option<String>,
    #[serde(default)]
    pub district_id: Option<DistrictId>,
    #[serde(default, deserialize_with = "nullable")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub contact: Option<Option<String>>,
}

impl GroupPatch {
    pub fn apply(self, current: &FarmerGroup) -> Result<FarmerGroup, RegistryError> {
        let mut next = current.clone();
        if let Some(name) = self.name {
            next.name = required("name", &name)?;
        }
        if let Some(leader) = self.leader {
            next.leader = required("leader", &leader)?;
        }
        if let Some(district_id) = self.district_id {
            next.district_id = DistrictId::from(required("districtId", district_id.as_str())?);
        }
        if let Some(address) = self.address {
            next.address = optional_text(address);
        }
        if let Some(contact) = self.contact {
            next.contact = optional_text(contact);
        }
        Ok(next)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCommodity {
    pub crop_type: String,
    pub area_planted: f64,
    #[serde(default)]
    pub estimated_yield: Option<f64>,
    #[serde(default)]
    pub fertilizer: Option<String>,
    #[serde(default)]
    pub pesticide: Option<String>,
    #[serde(default, deserialize_with = "optional_group")]
    pub group_id: Option<GroupId>,
}

fn non_negative_yield(value: Option<f64>) -> Result<Option<f64>, RegistryError> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(RegistryError::invalid(
            "estimatedYield must not be negative",
        )),
        other => Ok(other),
    }
}

impl NewCommodity {
    pub fn into_commodity(self, now: DateTime<Utc>) -> Result<Commodity, RegistryError> {
        Ok(Commodity {
            id: CommodityId::generate(),
            crop_type: required("cropType", &self.crop_type)?,
            area_planted: positive_area("areaPlanted", self.area_planted)?,
            estimated_yield: non_negative_yield(self.estimated_yield)?,
            fertilizer: optional_text(self.fertilizer),
            pesticide: optional_text(self.pesticide),
            group_id: self.group_id,
            created_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommodityPatch {
    #[serde(default)]
    pub crop_type: Option<String>,
    #[serde(default)]
    pub area_planted: Option<f64>,
    #[serde(default, deserialize_with = "nullable")]
    pub estimated_yield: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub fertilizer: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub pesticide: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable_group")]
    pub group_id: Option<Option<GroupId>>,
}

impl CommodityPatch {
    pub fn apply(self, current: &Commodity) -> Result<Commodity, RegistryError> {
        let mut next = current.clone();
        if let Some(crop_type) = self.crop_type {
            next.crop_type = required("cropType", &crop_type)?;
        }
        if let Some(area) = self.area_planted {
            next.area_planted = positive_area("areaPlanted", area)?;
        }
        if let Some(estimated_yield) = self.estimated_yield {
            next.estimated_yield = non_negative_yield(estimated_yield)?;
        }
        if let Some(fertilizer) = self.fertilizer {
            next.fertilizer = optional_text(fertilizer);
        }
        if let Some(pesticide) = self.pesticide {
            next.pesticide = optional_text(pesticide);
        }
        if let Some(group_id) = self.group_id {
            next.group_id = group_id;
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn new_farmer_json() -> serde_json::Value {
        serde_json::json!({
            "name": "Andi",
            "nik": "7171010101010001",
            "address": "Jl. Piere Tendean",
            "landArea": 2.5,
            "cropType": "Padi",
            "districtId": "d-1",
            "groupId": "g-1"
        })
    }

    #[test]
    fn test_new_farmer_from_json() {
        let input: NewFarmer = serde_json::from_value(new_farmer_json()).unwrap();
        let farmer = input.into_farmer(Utc::now()).unwrap();
        assert_eq!(farmer.land_area, 2.5);
        assert_eq!(farmer.group_id, Some(GroupId::from("g-1")));
        assert_eq!(farmer.contact, None);
    }

    #[test]
    fn test_new_farmer_blank_group_is_unaffiliated() {
        let mut json = new_farmer_json();
        json["groupId"] = serde_json::json!("");
        let input: NewFarmer = serde_json::from_value(json).unwrap();
        assert_eq!(input.group_id, None);
    }

    #[test]
    fn test_new_farmer_rejects_non_positive_land_area() {
        for area in [0.0, -1.0, f64::NAN] {
            let mut json = new_farmer_json();
            json["landArea"] = serde_json::json!(area);
            // NaN serializes to null, which fails deserialization outright.
            if let Ok(input) = serde_json::from_value::<NewFarmer>(json) {
                let err = input.into_farmer(Utc::now()).unwrap_err();
                assert_eq!(err.kind(), ErrorKind::InvalidInput);
            }
        }
    }

    #[test]
    fn test_new_farmer_rejects_blank_required_field() {
        let mut json = new_farmer_json();
        json["name"] = serde_json::json!("   ");
        let input: NewFarmer = serde_json::from_value(json).unwrap();
        let err = input.into_farmer(Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_farmer_patch_tri_state_group() {
        let farmer: Farmer = serde_json::from_value::<NewFarmer>(new_farmer_json())
            .unwrap()
            .into_farmer(Utc::now())
            .unwrap();

        let absent: FarmerPatch = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(absent.apply(&farmer).unwrap().group_id, farmer.group_id);

        let cleared: FarmerPatch =
            serde_json::from_value(serde_json::json!({ "groupId": null })).unwrap();
        assert_eq!(cleared.apply(&farmer).unwrap().group_id, None);

        let blank: FarmerPatch =
            serde_json::from_value(serde_json::json!({ "groupId": "" })).unwrap();
        assert_eq!(blank.apply(&farmer).unwrap().group_id, None);

        let moved: FarmerPatch =
            serde_json::from_value(serde_json::json!({ "groupId": "g-2" })).unwrap();
        assert_eq!(
            moved.apply(&farmer).unwrap().group_id,
            Some(GroupId::from("g-2"))
        );
    }

    #[test]
    fn test_farmer_patch_keeps_identity() {
        let farmer = serde_json::from_value::<NewFarmer>(new_farmer_json())
            .unwrap()
            .into_farmer(Utc::now())
            .unwrap();
        let patch = FarmerPatch {
            name: Some("Andi Wijaya".to_string()),
            land_area: Some(3.0),
            ..Default::default()
        };
        let next = patch.apply(&farmer).unwrap();
        assert_eq!(next.id, farmer.id);
        assert_eq!(next.created_at, farmer.created_at);
        assert_eq!(next.name, "Andi Wijaya");
        assert_eq!(next.land_area, 3.0);
    }

    #[test]
    fn test_new_group_starts_pending_and_empty() {
        let group = NewGroup {
            name: "Tani Jaya".to_string(),
            leader: "Pak Ruddy".to_string(),
            district_id: DistrictId::from("d-1"),
            address: Some("  ".to_string()),
            contact: None,
        }
        .into_group(Utc::now())
        .unwrap();

        assert!(group.verification.is_pending());
        assert_eq!(group.member_count, 0);
        assert_eq!(group.total_land_area, 0.0);
        assert_eq!(group.address, None);
    }

    #[test]
    fn test_commodity_patch_clears_yield() {
        let commodity = NewCommodity {
            crop_type: "Jagung".to_string(),
            area_planted: 4.0,
            estimated_yield: Some(12.0),
            fertilizer: Some("Urea".to_string()),
            pesticide: None,
            group_id: None,
        }
        .into_commodity(Utc::now())
        .unwrap();

        let patch: CommodityPatch =
            serde_json::from_value(serde_json::json!({ "estimatedYield": null })).unwrap();
        let next = patch.apply(&commodity).unwrap();
        assert_eq!(next.estimated_yield, None);
        assert_eq!(next.fertilizer.as_deref(), Some("Urea"));
    }

    #[test]
    fn test_new_district_requires_name() {
        let err = NewDistrict {
            name: " ".to_string(),
        }
        .into_district(Utc::now())
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
