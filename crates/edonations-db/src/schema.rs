//! Schema history for the donations app.
//!
//! The chain is linear: each step names the step it builds on. History is
//! append-only; fixing a shipped step means authoring a new one.

use edonations_common::Result;

use crate::migrations::{Migration, MigrationPlan};

/// The sponsors table as first shipped. `organization` was mandatory then.
const INITIAL: Migration = Migration {
    name: "0001_initial",
    depends_on: None,
    sql: "CREATE TABLE sponsors (
        id TEXT PRIMARY KEY,
        full_name TEXT NOT NULL,
        organization TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    )",
};

const CONTACT_FIELDS: Migration = Migration {
    name: "0002_sponsor_contact_fields",
    depends_on: Some("0001_initial"),
    sql: "ALTER TABLE sponsors ADD COLUMN email TEXT;
          ALTER TABLE sponsors ADD COLUMN phone TEXT;",
};

/// Relax `organization` to nullable/blank. SQLite cannot drop NOT NULL in
/// place, so the table is rebuilt and rows copied across, mapping the old
/// blank default to NULL. From this step on, writes are validated against
/// the organization snapshot of the same name; the column itself accepts
/// any text, so rows predating the snapshot stay readable.
const ORGANIZATION_CHOICES: Migration = Migration {
    name: "0003_organization_choices",
    depends_on: Some("0002_sponsor_contact_fields"),
    sql: "CREATE TABLE sponsors_new (
        id TEXT PRIMARY KEY,
        full_name TEXT NOT NULL,
        email TEXT,
        phone TEXT,
        organization TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    INSERT INTO sponsors_new (id, full_name, email, phone, organization, created_at, updated_at)
        SELECT id, full_name, email, phone, NULLIF(organization, ''), created_at, updated_at
        FROM sponsors;
    DROP TABLE sponsors;
    ALTER TABLE sponsors_new RENAME TO sponsors;",
};

pub const SPONSOR_MIGRATIONS: &[Migration] = &[INITIAL, CONTACT_FIELDS, ORGANIZATION_CHOICES];

/// The donations app's full migration plan.
pub fn plan() -> Result<MigrationPlan> {
    MigrationPlan::new(SPONSOR_MIGRATIONS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::MigrationRunner;
    use rusqlite::Connection;

    #[test]
    fn history_applies_cleanly_from_empty() {
        let mut conn = Connection::open_in_memory().unwrap();
        let applied = MigrationRunner::apply(&mut conn, &plan().unwrap()).unwrap();
        assert_eq!(
            applied,
            vec![
                "0001_initial",
                "0002_sponsor_contact_fields",
                "0003_organization_choices"
            ]
        );
    }

    #[test]
    fn rebuild_step_preserves_rows_and_nulls_blank_organizations() {
        let mut conn = Connection::open_in_memory().unwrap();
        let history = MigrationPlan::new(&[INITIAL, CONTACT_FIELDS]).unwrap();
        MigrationRunner::apply(&mut conn, &history).unwrap();

        conn.execute(
            "INSERT INTO sponsors (id, full_name, organization) VALUES ('s1', 'Abebe', 'MAKEDONIA')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO sponsors (id, full_name, organization) VALUES ('s2', 'Sara', '')",
            [],
        )
        .unwrap();

        MigrationRunner::apply_step(&mut conn, &ORGANIZATION_CHOICES).unwrap();

        let org: Option<String> = conn
            .query_row("SELECT organization FROM sponsors WHERE id = 's1'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(org.as_deref(), Some("MAKEDONIA"));

        let org: Option<String> = conn
            .query_row("SELECT organization FROM sponsors WHERE id = 's2'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert!(org.is_none());
    }

    #[test]
    fn organization_column_is_nullable_after_the_rebuild() {
        let mut conn = Connection::open_in_memory().unwrap();
        MigrationRunner::apply(&mut conn, &plan().unwrap()).unwrap();

        conn.execute(
            "INSERT INTO sponsors (id, full_name, organization) VALUES ('s3', 'Lensa', NULL)",
            [],
        )
        .unwrap();
    }
}
