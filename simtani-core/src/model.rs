//! Registry entities.
//!
//! Districts (kecamatan) are reference data; farmers (petani) may belong to a
//! farmer group (kelompok tani); commodities (komoditas) may be owned by a
//! group. A group's `member_count` and `total_land_area` are derived from its
//! farmers and are only ever written by the aggregate maintainer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::verification::{VerificationState, VerificationStatus};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

entity_id!(
    /// Identifier of a district (kecamatan).
    DistrictId
);
entity_id!(
    /// Identifier of a farmer group (kelompok tani).
    GroupId
);
entity_id!(
    /// Identifier of a farmer (petani).
    FarmerId
);
entity_id!(
    /// Identifier of a commodity record (komoditas).
    CommodityId
);
entity_id!(
    /// Identifier of an authenticated user, as supplied by the gateway.
    UserId
);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct District {
    pub id: DistrictId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Farmer {
    pub id: FarmerId,
    pub name: String,
    /// National identity number (NIK). Unique across all farmers.
    pub nik: String,
    pub address: String,
    pub contact: Option<String>,
    /// Cultivated land in hectares. Always > 0.
    pub land_area: f64,
    pub crop_type: String,
    pub district_id: DistrictId,
    pub group_id: Option<GroupId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Commodity {
    pub id: CommodityId,
    pub crop_type: String,
    /// Planted area in hectares.
    pub area_planted: f64,
    /// Estimated yield in tonnes.
    pub estimated_yield: Option<f64>,
    pub fertilizer: Option<String>,
    pub pesticide: Option<String>,
    pub group_id: Option<GroupId>,
    pub created_at: DateTime<Utc>,
}

/// A farmer group and its persisted derived aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct FarmerGroup {
    pub id: GroupId,
    pub name: String,
    pub leader: String,
    pub district_id: DistrictId,
    pub address: Option<String>,
    pub contact: Option<String>,
    pub member_count: u32,
    pub total_land_area: f64,
    pub verification: VerificationState,
    pub created_at: DateTime<Utc>,
}

impl FarmerGroup {
    pub fn status(&self) -> VerificationStatus {
        self.verification.status()
    }
}

/// Flat wire shape of a group: the verification state is spread into the
/// `verificationStatus`/`verifiedBy`/`verifiedAt`/`note` columns.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FarmerGroupWire<'a> {
    id: &'a GroupId,
    name: &'a str,
    leader: &'a str,
    district_id: &'a DistrictId,
    address: Option<&'a str>,
    contact: Option<&'a str>,
    member_count: u32,
    total_land_area: f64,
    verification_status: VerificationStatus,
    verified_by: Option<&'a UserId>,
    verified_at: Option<DateTime<Utc>>,
    note: Option<&'a str>,
    created_at: DateTime<Utc>,
}

impl Serialize for FarmerGroup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        FarmerGroupWire {
            id: &self.id,
            name: &self.name,
            leader: &self.leader,
            district_id: &self.district_id,
            address: self.address.as_deref(),
            contact: self.contact.as_deref(),
            member_count: self.member_count,
            total_land_area: self.total_land_area,
            verification_status: self.verification.status(),
            verified_by: self.verification.verified_by(),
            verified_at: self.verification.verified_at(),
            note: self.verification.note(),
            created_at: self.created_at,
        }
        .serialize(serializer)
    }
}
