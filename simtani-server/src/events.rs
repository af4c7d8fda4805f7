//! Audit timeline for farmer groups.
//!
//! Events are appended inside the same unit of work as the change they
//! describe, so a rolled-back change never leaves an event behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use simtani_core::{GroupId, VerificationStatus};

/// What happened to a group.
///
/// Stored as JSON in the tagged representation:
/// ```json
/// { "type": "VerificationDecided", "data": { "fromStatus": "PENDING", ... } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GroupEventType {
    /// The group was created.
    #[serde(rename_all = "camelCase")]
    GroupRegistered { name: String, district_id: String },

    /// An administrator decided the group's verification.
    #[serde(rename_all = "camelCase")]
    VerificationDecided {
        from_status: VerificationStatus,
        to_status: VerificationStatus,
        verified_by: String,
        note: Option<String>,
    },

    /// A recomputation changed the stored aggregates.
    #[serde(rename_all = "camelCase")]
    AggregatesRecomputed {
        previous_member_count: u32,
        member_count: u32,
        previous_total_land_area: f64,
        total_land_area: f64,
    },

    /// The group was deleted and its members detached.
    #[serde(rename_all = "camelCase")]
    GroupDeleted {
        detached_farmers: usize,
        detached_commodities: usize,
    },
}

impl GroupEventType {
    /// Variant name, stored in its own column for querying.
    pub fn name(&self) -> &'static str {
        match self {
            Self::GroupRegistered { .. } => "GroupRegistered",
            Self::VerificationDecided { .. } => "VerificationDecided",
            Self::AggregatesRecomputed { .. } => "AggregatesRecomputed",
            Self::GroupDeleted { .. } => "GroupDeleted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupEvent {
    /// Row id; increases with insertion order.
    pub id: i64,
    pub group_id: GroupId,
    pub event: GroupEventType,
    pub recorded_at: DateTime<Utc>,
}
