//! Builds a [`Snapshot`] from a `DuckDB` database.
//!
//! Expects the tables `incidents`, `incident_tags`, `tags`, `cases`,
//! `persons`, and `case_persons`. Timestamps are read as epoch
//! milliseconds and dates as `YYYY-MM-DD` text so no `DuckDB` temporal
//! types leak into the record types.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use crime_intel_crime_models::{CaseStatus, PersonRole};
use crime_intel_database_models::{
    CasePersonLink, CaseRecord, IncidentRecord, PersonRecord, TagRecord,
};
use duckdb::Connection;

use crate::{ProviderError, Snapshot, SnapshotData};

fn timestamp(ms: i64, what: &str) -> Result<DateTime<Utc>, ProviderError> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| ProviderError::Conversion {
        message: format!("{what}: timestamp {ms} is out of range"),
    })
}

fn parse_status(raw: &str, case_id: i64) -> Result<CaseStatus, ProviderError> {
    raw.parse().map_err(|_| ProviderError::Conversion {
        message: format!("Case {case_id}: unknown status '{raw}'"),
    })
}

fn parse_role(raw: &str, case_id: i64) -> Result<PersonRole, ProviderError> {
    raw.parse().map_err(|_| ProviderError::Conversion {
        message: format!("Case {case_id}: unknown person role '{raw}'"),
    })
}

fn load_tags(conn: &Connection) -> Result<Vec<TagRecord>, ProviderError> {
    let mut stmt = conn.prepare("SELECT id, name FROM tags ORDER BY id")?;
    let mut rows = stmt.query([])?;
    let mut tags = Vec::new();
    while let Some(row) = rows.next()? {
        tags.push(TagRecord {
            id: row.get(0)?,
            name: row.get(1)?,
        });
    }
    Ok(tags)
}

fn load_incident_tags(conn: &Connection) -> Result<BTreeMap<i64, BTreeSet<i64>>, ProviderError> {
    let mut stmt = conn.prepare("SELECT incident_id, tag_id FROM incident_tags")?;
    let mut rows = stmt.query([])?;
    let mut by_incident: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
    while let Some(row) = rows.next()? {
        let incident_id: i64 = row.get(0)?;
        let tag_id: i64 = row.get(1)?;
        by_incident.entry(incident_id).or_default().insert(tag_id);
    }
    Ok(by_incident)
}

fn load_incidents(conn: &Connection) -> Result<Vec<IncidentRecord>, ProviderError> {
    let mut tag_ids = load_incident_tags(conn)?;
    let mut stmt = conn.prepare(
        "SELECT id, incident_type, description, epoch_ms(occurred_at), latitude, longitude, district
         FROM incidents ORDER BY id",
    )?;
    let mut rows = stmt.query([])?;
    let mut incidents = Vec::new();
    while let Some(row) = rows.next()? {
        let id: i64 = row.get(0)?;
        let occurred_ms: i64 = row.get(3)?;
        incidents.push(IncidentRecord {
            id,
            incident_type: row.get(1)?,
            description: row.get(2)?,
            occurred_at: timestamp(occurred_ms, &format!("Incident {id}"))?,
            latitude: row.get(4)?,
            longitude: row.get(5)?,
            district: row.get(6)?,
            tag_ids: tag_ids.remove(&id).unwrap_or_default(),
        });
    }

    if let Some(orphan) = tag_ids.keys().next() {
        return Err(ProviderError::Integrity {
            message: format!("incident_tags references unknown incident {orphan}"),
        });
    }

    Ok(incidents)
}

fn load_cases(conn: &Connection) -> Result<Vec<CaseRecord>, ProviderError> {
    let mut stmt = conn.prepare(
        "SELECT id, title, status, primary_incident_id, assigned_officer_id, epoch_ms(created_at), notes
         FROM cases ORDER BY id",
    )?;
    let mut rows = stmt.query([])?;
    let mut cases = Vec::new();
    while let Some(row) = rows.next()? {
        let id: i64 = row.get(0)?;
        let status: String = row.get(2)?;
        let created_ms: i64 = row.get(5)?;
        cases.push(CaseRecord {
            id,
            title: row.get(1)?,
            status: parse_status(&status, id)?,
            primary_incident_id: row.get(3)?,
            assigned_officer_id: row.get(4)?,
            created_at: timestamp(created_ms, &format!("Case {id}"))?,
            notes: row.get(6)?,
        });
    }
    Ok(cases)
}

fn load_persons(conn: &Connection) -> Result<Vec<PersonRecord>, ProviderError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, CAST(date_of_birth AS VARCHAR), phone, address FROM persons ORDER BY id",
    )?;
    let mut rows = stmt.query([])?;
    let mut persons = Vec::new();
    while let Some(row) = rows.next()? {
        let id: i64 = row.get(0)?;
        let dob: Option<String> = row.get(2)?;
        let date_of_birth = dob
            .map(|raw| {
                NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| {
                    ProviderError::Conversion {
                        message: format!("Person {id}: invalid date of birth '{raw}': {e}"),
                    }
                })
            })
            .transpose()?;
        persons.push(PersonRecord {
            id,
            name: row.get(1)?,
            date_of_birth,
            phone: row.get(3)?,
            address: row.get(4)?,
        });
    }
    Ok(persons)
}

fn load_case_persons(conn: &Connection) -> Result<Vec<CasePersonLink>, ProviderError> {
    let mut stmt = conn.prepare("SELECT case_id, person_id, role FROM case_persons")?;
    let mut rows = stmt.query([])?;
    let mut links = Vec::new();
    while let Some(row) = rows.next()? {
        let case_id: i64 = row.get(0)?;
        let role: String = row.get(2)?;
        links.push(CasePersonLink {
            case_id,
            person_id: row.get(1)?,
            role: parse_role(&role, case_id)?,
        });
    }
    Ok(links)
}

impl Snapshot {
    /// Reads every table from `conn` and builds a validated snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if a query fails, a stored value cannot be
    /// converted, or the data fails validation.
    pub fn load_duckdb(conn: &Connection) -> Result<Self, ProviderError> {
        let data = SnapshotData {
            tags: load_tags(conn)?,
            incidents: load_incidents(conn)?,
            cases: load_cases(conn)?,
            persons: load_persons(conn)?,
            case_persons: load_case_persons(conn)?,
        };
        log::debug!(
            "Read {} incidents and {} cases from DuckDB",
            data.incidents.len(),
            data.cases.len()
        );
        Self::from_data(data)
    }
}
