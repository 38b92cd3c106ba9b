use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use edonations_common::{Error, Result, SponsorId};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::migrations::{MigrationPlan, MigrationRunner};
use crate::organization::OrganizationSet;

/// Persistent storage for sponsor records.
///
/// Writes validate `organization` against the set injected at open time.
/// Reads never validate: a row carrying a code the enumeration has since
/// dropped stays readable, only future writes are constrained.
pub struct SponsorStore {
    conn: Mutex<Connection>,
    organizations: OrganizationSet,
}

/// A persisted sponsor record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sponsor {
    pub id: SponsorId,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub organization: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Write payload for creating or replacing a sponsor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSponsor {
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
}

impl SponsorStore {
    pub fn open(db_path: &Path, plan: &MigrationPlan, organizations: OrganizationSet) -> Result<Self> {
        info!("opening sponsor store at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;
        Self::init(conn, plan, organizations)
    }

    pub fn in_memory(plan: &MigrationPlan, organizations: OrganizationSet) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;
        Self::init(conn, plan, organizations)
    }

    fn init(mut conn: Connection, plan: &MigrationPlan, organizations: OrganizationSet) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        MigrationRunner::apply(&mut conn, plan)?;

        Ok(Self {
            conn: Mutex::new(conn),
            organizations,
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("sponsor store lock poisoned".into()))
    }

    /// The enumeration snapshot this store validates against.
    pub fn organizations(&self) -> &OrganizationSet {
        &self.organizations
    }

    fn validate(&self, new: &NewSponsor) -> Result<()> {
        if let Some(org) = &new.organization {
            self.organizations.validate(org)?;
        }
        Ok(())
    }

    pub fn create(&self, new: &NewSponsor) -> Result<Sponsor> {
        self.validate(new)?;
        let id = SponsorId::new();
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO sponsors (id, full_name, email, phone, organization) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id.as_str(),
                new.full_name,
                new.email,
                new.phone,
                new.organization
            ],
        )
        .map_err(|e| Error::Database(format!("failed to create sponsor: {e}")))?;
        drop(conn);

        self.get(&id)?
            .ok_or_else(|| Error::Database("created sponsor row not found".into()))
    }

    pub fn get(&self, id: &SponsorId) -> Result<Option<Sponsor>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, full_name, email, phone, organization, created_at, updated_at
                 FROM sponsors WHERE id = ?1",
            )
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        stmt.query_row(params![id.as_str()], row_to_sponsor)
            .optional()
            .map_err(|e| Error::Database(format!("failed to read sponsor: {e}")))
    }

    /// Replace a sponsor's fields. Fails with `NotFound` for unknown ids.
    pub fn update(&self, id: &SponsorId, new: &NewSponsor) -> Result<Sponsor> {
        self.validate(new)?;
        let conn = self.connection()?;
        let changed = conn
            .execute(
                "UPDATE sponsors
                 SET full_name = ?2, email = ?3, phone = ?4, organization = ?5,
                     updated_at = datetime('now')
                 WHERE id = ?1",
                params![
                    id.as_str(),
                    new.full_name,
                    new.email,
                    new.phone,
                    new.organization
                ],
            )
            .map_err(|e| Error::Database(format!("failed to update sponsor: {e}")))?;
        drop(conn);

        if changed == 0 {
            return Err(Error::NotFound(format!("sponsor {id}")));
        }
        self.get(id)?
            .ok_or_else(|| Error::Database("updated sponsor row not found".into()))
    }

    pub fn list(&self, limit: usize) -> Result<Vec<Sponsor>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, full_name, email, phone, organization, created_at, updated_at
                 FROM sponsors ORDER BY created_at, id LIMIT ?1",
            )
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map(params![limit as i64], row_to_sponsor)
            .map_err(|e| Error::Database(format!("failed to query sponsors: {e}")))?;

        let mut sponsors = Vec::new();
        for row in rows {
            sponsors
                .push(row.map_err(|e| Error::Database(format!("failed to read sponsor row: {e}")))?);
        }
        Ok(sponsors)
    }

    pub fn delete(&self, id: &SponsorId) -> Result<()> {
        let conn = self.connection()?;
        let changed = conn
            .execute("DELETE FROM sponsors WHERE id = ?1", params![id.as_str()])
            .map_err(|e| Error::Database(format!("failed to delete sponsor: {e}")))?;
        if changed == 0 {
            return Err(Error::NotFound(format!("sponsor {id}")));
        }
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.connection()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sponsors", [], |row| row.get(0))
            .map_err(|e| Error::Database(format!("failed to count sponsors: {e}")))?;
        Ok(count as usize)
    }
}

fn row_to_sponsor(row: &rusqlite::Row<'_>) -> rusqlite::Result<Sponsor> {
    Ok(Sponsor {
        id: SponsorId::from_string(row.get::<_, String>(0)?),
        full_name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        organization: row.get(4)?,
        created_at: parse_datetime(row.get::<_, String>(5)?),
        updated_at: parse_datetime(row.get::<_, String>(6)?),
    })
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            // SQLite datetime('now') produces "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                .map(|naive| naive.and_utc())
                .unwrap_or_else(|_| Utc::now())
        })
}
