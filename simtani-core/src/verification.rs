//! Verification state machine for farmer groups.
//!
//! A group starts `Pending` and is moved to `Decided` by an administrator.
//! The verifier, timestamp and note only exist inside `Decided`, so they can
//! never be set while a group is still pending.
//!
//! [`transition`] is pure: the caller supplies the clock reading and persists
//! the returned state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RegistryError;
use crate::model::UserId;

/// Stored verification status of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VerificationStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "DITERIMA")]
    Accepted,
    #[serde(rename = "DITOLAK")]
    Rejected,
}

impl VerificationStatus {
    pub const ALL: [VerificationStatus; 3] = [
        VerificationStatus::Pending,
        VerificationStatus::Accepted,
        VerificationStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "DITERIMA",
            Self::Rejected => "DITOLAK",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationStatus {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "DITERIMA" => Ok(Self::Accepted),
            "DITOLAK" => Ok(Self::Rejected),
            other => Err(RegistryError::invalid(format!(
                "unknown verification status '{}'",
                other
            ))),
        }
    }
}

/// Outcome an administrator may choose. `PENDING` is not a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Accepted,
    Rejected,
}

impl Decision {
    /// Parse a decision from its wire value. Exactly `DITERIMA` or `DITOLAK`.
    pub fn parse(value: &str) -> Result<Self, RegistryError> {
        match value {
            "DITERIMA" => Ok(Self::Accepted),
            "DITOLAK" => Ok(Self::Rejected),
            other => Err(RegistryError::invalid(format!(
                "status must be DITERIMA or DITOLAK, got '{}'",
                other
            ))),
        }
    }

    pub fn status(&self) -> VerificationStatus {
        match self {
            Self::Accepted => VerificationStatus::Accepted,
            Self::Rejected => VerificationStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VerificationState {
    #[default]
    Pending,
    Decided {
        decision: Decision,
        verified_by: UserId,
        verified_at: DateTime<Utc>,
        note: Option<String>,
    },
}

impl VerificationState {
    pub fn status(&self) -> VerificationStatus {
        match self {
            Self::Pending => VerificationStatus::Pending,
            Self::Decided { decision, .. } => decision.status(),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn verified_by(&self) -> Option<&UserId> {
        match self {
            Self::Pending => None,
            Self::Decided { verified_by, .. } => Some(verified_by),
        }
    }

    pub fn verified_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Pending => None,
            Self::Decided { verified_at, .. } => Some(*verified_at),
        }
    }

    pub fn note(&self) -> Option<&str> {
        match self {
            Self::Pending => None,
            Self::Decided { note, .. } => note.as_deref(),
        }
    }

    /// Rebuild a state from its persisted columns.
    ///
    /// Rejects column combinations the state machine can never produce, such
    /// as a pending group with a verifier.
    pub fn from_columns(
        status: VerificationStatus,
        verified_by: Option<UserId>,
        verified_at: Option<DateTime<Utc>>,
        note: Option<String>,
    ) -> Result<Self, RegistryError> {
        let decision = match status {
            VerificationStatus::Pending => {
                if verified_by.is_some() || verified_at.is_some() || note.is_some() {
                    return Err(RegistryError::corruption("pending group verification columns"));
                }
                return Ok(Self::Pending);
            }
            VerificationStatus::Accepted => Decision::Accepted,
            VerificationStatus::Rejected => Decision::Rejected,
        };

        match (verified_by, verified_at) {
            (Some(verified_by), Some(verified_at)) => Ok(Self::Decided {
                decision,
                verified_by,
                verified_at,
                note,
            }),
            _ => Err(RegistryError::corruption("decided group verification columns")),
        }
    }
}

/// Whether a decided group may be decided again.
///
/// The legacy behaviour silently overwrote earlier decisions; with
/// `allow_reverification = false` a decision is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VerificationPolicy {
    pub allow_reverification: bool,
}

/// An administrator's request to decide a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyCommand {
    pub decision: Decision,
    pub note: Option<String>,
    pub actor: UserId,
}

impl VerifyCommand {
    /// Build a command from raw request values, rejecting unknown decisions.
    pub fn parse(status: &str, note: Option<String>, actor: UserId) -> Result<Self, RegistryError> {
        Ok(Self {
            decision: Decision::parse(status)?,
            note,
            actor,
        })
    }
}

/// Compute the state that results from applying `command` to `current`.
pub fn transition(
    current: &VerificationState,
    command: VerifyCommand,
    policy: VerificationPolicy,
    now: DateTime<Utc>,
) -> Result<VerificationState, RegistryError> {
    if !current.is_pending() && !policy.allow_reverification {
        return Err(RegistryError::conflict(format!(
            "group has already been verified as {}",
            current.status()
        )));
    }

    let note = command
        .note
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    Ok(VerificationState::Decided {
        decision: command.decision,
        verified_by: command.actor,
        verified_at: now,
        note,
    })
}
