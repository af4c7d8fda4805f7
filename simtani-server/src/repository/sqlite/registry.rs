//! Row-level registry operations inside a SQLite transaction.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use simtani_core::{
    Commodity, CommodityId, District, DistrictId, Farmer, FarmerGroup, FarmerId, GroupAggregates,
    GroupId, RegistryError, UserId, VerificationState, VerificationStatus,
};

use super::events::{append_event_sync, group_events_sync};
use super::{expect_one_row, i64_to_member_count, write_error};
use crate::events::{GroupEvent, GroupEventType};
use crate::repository::RegistryTx;

const DISTRICT_COLUMNS: &str = "id, name, created_at";
const FARMER_COLUMNS: &str =
    "id, name, nik, address, contact, land_area, crop_type, district_id, group_id, created_at";
const GROUP_COLUMNS: &str = "id, name, leader, district_id, address, contact, member_count, \
     total_land_area, verification_status, verified_by, verified_at, note, created_at";
const COMMODITY_COLUMNS: &str =
    "id, crop_type, area_planted, estimated_yield, fertilizer, pesticide, group_id, created_at";

/// A transaction viewed through `RegistryTx`.
pub(super) struct SqliteTx<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteTx<'a> {
    pub(super) fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn query_all<T, R>(
        &self,
        operation: &'static str,
        sql: &str,
        params: impl rusqlite::Params,
        read: fn(&Row<'_>) -> rusqlite::Result<R>,
        decode: fn(R) -> Result<T, RegistryError>,
    ) -> Result<Vec<T>, RegistryError> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| RegistryError::storage(operation, e.to_string()))?;
        let rows = stmt
            .query_map(params, read)
            .map_err(|e| RegistryError::storage(operation, e.to_string()))?;

        let mut out = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| RegistryError::storage(operation, e.to_string()))?;
            out.push(decode(raw)?);
        }
        Ok(out)
    }

    fn query_one<T, R>(
        &self,
        operation: &'static str,
        sql: &str,
        params: impl rusqlite::Params,
        read: fn(&Row<'_>) -> rusqlite::Result<R>,
        decode: fn(R) -> Result<T, RegistryError>,
    ) -> Result<Option<T>, RegistryError> {
        self.conn
            .query_row(sql, params, read)
            .optional()
            .map_err(|e| RegistryError::storage(operation, e.to_string()))?
            .map(decode)
            .transpose()
    }
}

// =============================================================================
// Row decoding
// =============================================================================

fn read_district(row: &Row<'_>) -> rusqlite::Result<District> {
    Ok(District {
        id: DistrictId::from(row.get::<_, String>(0)?),
        name: row.get(1)?,
        created_at: row.get(2)?,
    })
}

fn read_farmer(row: &Row<'_>) -> rusqlite::Result<Farmer> {
    Ok(Farmer {
        id: FarmerId::from(row.get::<_, String>(0)?),
        name: row.get(1)?,
        nik: row.get(2)?,
        address: row.get(3)?,
        contact: row.get(4)?,
        land_area: row.get(5)?,
        crop_type: row.get(6)?,
        district_id: DistrictId::from(row.get::<_, String>(7)?),
        group_id: row.get::<_, Option<String>>(8)?.map(GroupId::from),
        created_at: row.get(9)?,
    })
}

fn read_commodity(row: &Row<'_>) -> rusqlite::Result<Commodity> {
    Ok(Commodity {
        id: CommodityId::from(row.get::<_, String>(0)?),
        crop_type: row.get(1)?,
        area_planted: row.get(2)?,
        estimated_yield: row.get(3)?,
        fertilizer: row.get(4)?,
        pesticide: row.get(5)?,
        group_id: row.get::<_, Option<String>>(6)?.map(GroupId::from),
        created_at: row.get(7)?,
    })
}

/// Group columns as stored, before the verification columns are validated.
struct GroupRow {
    id: String,
    name: String,
    leader: String,
    district_id: String,
    address: Option<String>,
    contact: Option<String>,
    member_count: i64,
    total_land_area: f64,
    verification_status: String,
    verified_by: Option<String>,
    verified_at: Option<DateTime<Utc>>,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

fn read_group(row: &Row<'_>) -> rusqlite::Result<GroupRow> {
    Ok(GroupRow {
        id: row.get(0)?,
        name: row.get(1)?,
        leader: row.get(2)?,
        district_id: row.get(3)?,
        address: row.get(4)?,
        contact: row.get(5)?,
        member_count: row.get(6)?,
        total_land_area: row.get(7)?,
        verification_status: row.get(8)?,
        verified_by: row.get(9)?,
        verified_at: row.get(10)?,
        note: row.get(11)?,
        created_at: row.get(12)?,
    })
}

fn decode_group(row: GroupRow) -> Result<FarmerGroup, RegistryError> {
    let status: VerificationStatus = row
        .verification_status
        .parse()
        .map_err(|_| RegistryError::corruption("group verification_status"))?;
    let verification = VerificationState::from_columns(
        status,
        row.verified_by.map(UserId::from),
        row.verified_at,
        row.note,
    )?;

    if !row.total_land_area.is_finite() || row.total_land_area < 0.0 {
        return Err(RegistryError::corruption("group total_land_area"));
    }

    Ok(FarmerGroup {
        id: GroupId::from(row.id),
        name: row.name,
        leader: row.leader,
        district_id: DistrictId::from(row.district_id),
        address: row.address,
        contact: row.contact,
        member_count: i64_to_member_count(row.member_count)?,
        total_land_area: row.total_land_area,
        verification,
        created_at: row.created_at,
    })
}

fn keep<T>(value: T) -> Result<T, RegistryError> {
    Ok(value)
}

/// Stored columns of a verification state.
fn verification_columns(
    state: &VerificationState,
) -> (
    &'static str,
    Option<&str>,
    Option<DateTime<Utc>>,
    Option<&str>,
) {
    (
        state.status().as_str(),
        state.verified_by().map(|u| u.as_str()),
        state.verified_at(),
        state.note(),
    )
}

// =============================================================================
// RegistryTx implementation
// =============================================================================

impl RegistryTx for SqliteTx<'_> {
    fn insert_district(&mut self, district: &District) -> Result<(), RegistryError> {
        self.conn
            .execute(
                "INSERT INTO districts (id, name, created_at) VALUES (?1, ?2, ?3)",
                params![district.id.as_str(), district.name, district.created_at],
            )
            .map_err(write_error("insert district", "district already exists"))?;
        Ok(())
    }

    fn district(&mut self, id: &DistrictId) -> Result<Option<District>, RegistryError> {
        self.query_one(
            "get district",
            &format!("SELECT {} FROM districts WHERE id = ?1", DISTRICT_COLUMNS),
            params![id.as_str()],
            read_district,
            keep,
        )
    }

    fn district_by_name(&mut self, name: &str) -> Result<Option<District>, RegistryError> {
        self.query_one(
            "get district by name",
            &format!("SELECT {} FROM districts WHERE name = ?1", DISTRICT_COLUMNS),
            params![name],
            read_district,
            keep,
        )
    }

    fn districts(&mut self) -> Result<Vec<District>, RegistryError> {
        self.query_all(
            "list districts",
            &format!("SELECT {} FROM districts ORDER BY name ASC", DISTRICT_COLUMNS),
            [],
            read_district,
            keep,
        )
    }

    fn insert_farmer(&mut self, farmer: &Farmer) -> Result<(), RegistryError> {
        self.conn
            .execute(
                "INSERT INTO farmers (id, name, nik, address, contact, land_area, crop_type,
                                      district_id, group_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    farmer.id.as_str(),
                    farmer.name,
                    farmer.nik,
                    farmer.address,
                    farmer.contact,
                    farmer.land_area,
                    farmer.crop_type,
                    farmer.district_id.as_str(),
                    farmer.group_id.as_ref().map(|g| g.as_str()),
                    farmer.created_at,
                ],
            )
            .map_err(write_error("insert farmer", "NIK is already registered"))?;
        Ok(())
    }

    fn update_farmer(&mut self, farmer: &Farmer) -> Result<(), RegistryError> {
        let changed = self
            .conn
            .execute(
                "UPDATE farmers SET name = ?2, nik = ?3, address = ?4, contact = ?5,
                        land_area = ?6, crop_type = ?7, district_id = ?8, group_id = ?9
                 WHERE id = ?1",
                params![
                    farmer.id.as_str(),
                    farmer.name,
                    farmer.nik,
                    farmer.address,
                    farmer.contact,
                    farmer.land_area,
                    farmer.crop_type,
                    farmer.district_id.as_str(),
                    farmer.group_id.as_ref().map(|g| g.as_str()),
                ],
            )
            .map_err(write_error("update farmer", "NIK is already registered"))?;
        expect_one_row(changed, "update farmer", farmer.id.as_str())
    }

    fn delete_farmer(&mut self, id: &FarmerId) -> Result<(), RegistryError> {
        let changed = self
            .conn
            .execute("DELETE FROM farmers WHERE id = ?1", params![id.as_str()])
            .map_err(|e| RegistryError::storage("delete farmer", e.to_string()))?;
        expect_one_row(changed, "delete farmer", id.as_str())
    }

    fn farmer(&mut self, id: &FarmerId) -> Result<Option<Farmer>, RegistryError> {
        self.query_one(
            "get farmer",
            &format!("SELECT {} FROM farmers WHERE id = ?1", FARMER_COLUMNS),
            params![id.as_str()],
            read_farmer,
            keep,
        )
    }

    fn farmer_by_nik(&mut self, nik: &str) -> Result<Option<Farmer>, RegistryError> {
        self.query_one(
            "get farmer by nik",
            &format!("SELECT {} FROM farmers WHERE nik = ?1", FARMER_COLUMNS),
            params![nik],
            read_farmer,
            keep,
        )
    }

    fn farmers(&mut self) -> Result<Vec<Farmer>, RegistryError> {
        self.query_all(
            "list farmers",
            &format!(
                "SELECT {} FROM farmers ORDER BY created_at DESC, rowid DESC",
                FARMER_COLUMNS
            ),
            [],
            read_farmer,
            keep,
        )
    }

    fn farmers_in_group(&mut self, group_id: &GroupId) -> Result<Vec<Farmer>, RegistryError> {
        self.query_all(
            "list group members",
            &format!(
                "SELECT {} FROM farmers WHERE group_id = ?1 ORDER BY id",
                FARMER_COLUMNS
            ),
            params![group_id.as_str()],
            read_farmer,
            keep,
        )
    }

    fn detach_farmers(&mut self, group_id: &GroupId) -> Result<usize, RegistryError> {
        self.conn
            .execute(
                "UPDATE farmers SET group_id = NULL WHERE group_id = ?1",
                params![group_id.as_str()],
            )
            .map_err(|e| RegistryError::storage("detach farmers", e.to_string()))
    }

    fn insert_group(&mut self, group: &FarmerGroup) -> Result<(), RegistryError> {
        let (status, verified_by, verified_at, note) = verification_columns(&group.verification);
        self.conn
            .execute(
                "INSERT INTO farmer_groups (id, name, leader, district_id, address, contact,
                                            member_count, total_land_area, verification_status,
                                            verified_by, verified_at, note, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    group.id.as_str(),
                    group.name,
                    group.leader,
                    group.district_id.as_str(),
                    group.address,
                    group.contact,
                    group.member_count,
                    group.total_land_area,
                    status,
                    verified_by,
                    verified_at,
                    note,
                    group.created_at,
                ],
            )
            .map_err(|e| RegistryError::storage("insert group", e.to_string()))?;
        Ok(())
    }

    fn update_group_profile(&mut self, group: &FarmerGroup) -> Result<(), RegistryError> {
        let changed = self
            .conn
            .execute(
                "UPDATE farmer_groups SET name = ?2, leader = ?3, district_id = ?4,
                        address = ?5, contact = ?6
                 WHERE id = ?1",
                params![
                    group.id.as_str(),
                    group.name,
                    group.leader,
                    group.district_id.as_str(),
                    group.address,
                    group.contact,
                ],
            )
            .map_err(|e| RegistryError::storage("update group", e.to_string()))?;
        expect_one_row(changed, "update group", group.id.as_str())
    }

    fn write_group_aggregates(
        &mut self,
        id: &GroupId,
        aggregates: GroupAggregates,
    ) -> Result<(), RegistryError> {
        let changed = self
            .conn
            .execute(
                "UPDATE farmer_groups SET member_count = ?2, total_land_area = ?3 WHERE id = ?1",
                params![
                    id.as_str(),
                    aggregates.member_count,
                    aggregates.total_land_area
                ],
            )
            .map_err(|e| RegistryError::storage("write group aggregates", e.to_string()))?;
        expect_one_row(changed, "write group aggregates", id.as_str())
    }

    fn write_verification(
        &mut self,
        id: &GroupId,
        state: &VerificationState,
    ) -> Result<(), RegistryError> {
        let (status, verified_by, verified_at, note) = verification_columns(state);
        let changed = self
            .conn
            .execute(
                "UPDATE farmer_groups SET verification_status = ?2, verified_by = ?3,
                        verified_at = ?4, note = ?5
                 WHERE id = ?1",
                params![id.as_str(), status, verified_by, verified_at, note],
            )
            .map_err(|e| RegistryError::storage("write verification", e.to_string()))?;
        expect_one_row(changed, "write verification", id.as_str())
    }

    fn delete_group(&mut self, id: &GroupId) -> Result<(), RegistryError> {
        let changed = self
            .conn
            .execute(
                "DELETE FROM farmer_groups WHERE id = ?1",
                params![id.as_str()],
            )
            .map_err(|e| RegistryError::storage("delete group", e.to_string()))?;
        expect_one_row(changed, "delete group", id.as_str())
    }

    fn group(&mut self, id: &GroupId) -> Result<Option<FarmerGroup>, RegistryError> {
        self.query_one(
            "get group",
            &format!("SELECT {} FROM farmer_groups WHERE id = ?1", GROUP_COLUMNS),
            params![id.as_str()],
            read_group,
            decode_group,
        )
    }

    fn groups(&mut self) -> Result<Vec<FarmerGroup>, RegistryError> {
        self.query_all(
            "list groups",
            &format!(
                "SELECT {} FROM farmer_groups ORDER BY created_at DESC, rowid DESC",
                GROUP_COLUMNS
            ),
            [],
            read_group,
            decode_group,
        )
    }

    fn insert_commodity(&mut self, commodity: &Commodity) -> Result<(), RegistryError> {
        self.conn
            .execute(
                "INSERT INTO commodities (id, crop_type, area_planted, estimated_yield,
                                          fertilizer, pesticide, group_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    commodity.id.as_str(),
                    commodity.crop_type,
                    commodity.area_planted,
                    commodity.estimated_yield,
                    commodity.fertilizer,
                    commodity.pesticide,
                    commodity.group_id.as_ref().map(|g| g.as_str()),
                    commodity.created_at,
                ],
            )
            .map_err(|e| RegistryError::storage("insert commodity", e.to_string()))?;
        Ok(())
    }

    fn update_commodity(&mut self, commodity: &Commodity) -> Result<(), RegistryError> {
        let changed = self
            .conn
            .execute(
                "UPDATE commodities SET crop_type = ?2, area_planted = ?3, estimated_yield = ?4,
                        fertilizer = ?5, pesticide = ?6, group_id = ?7
                 WHERE id = ?1",
                params![
                    commodity.id.as_str(),
                    commodity.crop_type,
                    commodity.area_planted,
                    commodity.estimated_yield,
                    commodity.fertilizer,
                    commodity.pesticide,
                    commodity.group_id.as_ref().map(|g| g.as_str()),
                ],
            )
            .map_err(|e| RegistryError::storage("update commodity", e.to_string()))?;
        expect_one_row(changed, "update commodity", commodity.id.as_str())
    }

    fn delete_commodity(&mut self, id: &CommodityId) -> Result<(), RegistryError> {
        let changed = self
            .conn
            .execute("DELETE FROM commodities WHERE id = ?1", params![id.as_str()])
            .map_err(|e| RegistryError::storage("delete commodity", e.to_string()))?;
        expect_one_row(changed, "delete commodity", id.as_str())
    }

    fn commodity(&mut self, id: &CommodityId) -> Result<Option<Commodity>, RegistryError> {
        self.query_one(
            "get commodity",
            &format!("SELECT {} FROM commodities WHERE id = ?1", COMMODITY_COLUMNS),
            params![id.as_str()],
            read_commodity,
            keep,
        )
    }

    fn commodities(&mut self) -> Result<Vec<Commodity>, RegistryError> {
        self.query_all(
            "list commodities",
            &format!(
                "SELECT {} FROM commodities ORDER BY created_at DESC, rowid DESC",
                COMMODITY_COLUMNS
            ),
            [],
            read_commodity,
            keep,
        )
    }

    fn commodities_of_group(
        &mut self,
        group_id: &GroupId,
    ) -> Result<Vec<Commodity>, RegistryError> {
        self.query_all(
            "list group commodities",
            &format!(
                "SELECT {} FROM commodities WHERE group_id = ?1 ORDER BY created_at, rowid",
                COMMODITY_COLUMNS
            ),
            params![group_id.as_str()],
            read_commodity,
            keep,
        )
    }

    fn detach_commodities(&mut self, group_id: &GroupId) -> Result<usize, RegistryError> {
        self.conn
            .execute(
                "UPDATE commodities SET group_id = NULL WHERE group_id = ?1",
                params![group_id.as_str()],
            )
            .map_err(|e| RegistryError::storage("detach commodities", e.to_string()))
    }

    fn append_event(
        &mut self,
        group_id: &GroupId,
        event: &GroupEventType,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        append_event_sync(self.conn, group_id, event, recorded_at)
    }

    fn group_events(
        &mut self,
        group_id: &GroupId,
        limit: usize,
    ) -> Result<Vec<GroupEvent>, RegistryError> {
        group_events_sync(self.conn, group_id, limit)
    }
}
