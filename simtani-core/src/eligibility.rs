//! Which groups count toward official statistics.
//!
//! Only accepted (DITERIMA) groups, and the commodities they own, are
//! counted by dashboards and reports. Plain listings and detail views show
//! every group regardless of status. Every aggregate read path goes through
//! [`is_eligible_for_reporting`].

use std::collections::HashSet;

use crate::model::{Commodity, FarmerGroup, GroupId};
use crate::verification::VerificationStatus;

pub fn is_eligible_for_reporting(group: &FarmerGroup) -> bool {
    group.status() == VerificationStatus::Accepted
}

/// The groups that count toward reporting, in their original order.
pub fn eligible_groups<'a>(
    groups: &'a [FarmerGroup],
) -> impl Iterator<Item = &'a FarmerGroup> + 'a {
    groups.iter().filter(|g| is_eligible_for_reporting(g))
}

/// Identifiers of the eligible groups, for filtering records that reference a group.
pub fn eligible_group_ids(groups: &[FarmerGroup]) -> HashSet<GroupId> {
    eligible_groups(groups).map(|g| g.id.clone()).collect()
}

/// Commodities owned by an eligible group. Unowned commodities never count.
pub fn eligible_commodities<'a>(
    commodities: &'a [Commodity],
    eligible: &'a HashSet<GroupId>,
) -> impl Iterator<Item = &'a Commodity> + 'a {
    commodities.iter().filter(move |c| {
        c.group_id
            .as_ref()
            .is_some_and(|group_id| eligible.contains(group_id))
    })
}
