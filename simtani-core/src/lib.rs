//! Domain core of the farmer group registry.
//!
//! Everything here is pure: no storage, no clocks, no I/O. The server crate
//! feeds these functions with rows read inside a unit of work and persists
//! what they return.

pub mod aggregate;
pub mod eligibility;
pub mod error;
pub mod input;
pub mod model;
pub mod report;
pub mod verification;

pub use aggregate::{groups_to_recompute, recompute, FarmerChange, GroupAggregates};
pub use eligibility::is_eligible_for_reporting;
pub use error::{ErrorKind, RegistryError};
pub use model::{
    Commodity, CommodityId, District, DistrictId, Farmer, FarmerGroup, FarmerId, GroupId, UserId,
};
pub use verification::{
    Decision, VerificationPolicy, VerificationState, VerificationStatus, VerifyCommand,
};
