use edonations_common::{Error, Result};
use rusqlite::{Connection, TransactionBehavior, params};
use tracing::{debug, info};

/// Applied-steps ledger. Lives next to the tables it describes.
const LEDGER_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS schema_ledger (
    name TEXT PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
)";

/// One schema evolution step.
///
/// Steps name their dependency explicitly; ordering is derived from these
/// references, never from declaration order or naming conventions. A step is
/// authored once and never edited after it has been applied to a shared
/// database; amending history means authoring a new forward step.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub name: &'static str,
    /// The step that must already be applied, or `None` for the first step.
    pub depends_on: Option<&'static str>,
    pub sql: &'static str,
}

/// A validated, topologically ordered sequence of migration steps.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    steps: Vec<Migration>,
}

impl MigrationPlan {
    /// Validate descriptors and sort them into dependency order.
    ///
    /// Rejects duplicate names, references to steps outside the plan, and
    /// dependency cycles. Steps may be declared in any order; among steps
    /// whose dependencies are satisfied, declaration order is preserved.
    pub fn new(migrations: &[Migration]) -> Result<Self> {
        let mut seen = Vec::with_capacity(migrations.len());
        for m in migrations {
            if seen.contains(&m.name) {
                return Err(Error::Database(format!(
                    "migration plan invalid: duplicate step name {}",
                    m.name
                )));
            }
            seen.push(m.name);
        }
        for m in migrations {
            if let Some(dep) = m.depends_on
                && !seen.contains(&dep)
            {
                return Err(Error::Database(format!(
                    "migration plan invalid: {} depends on unknown step {dep}",
                    m.name
                )));
            }
        }

        // Kahn's algorithm over the explicit dependency references.
        let mut ordered = Vec::with_capacity(migrations.len());
        let mut remaining: Vec<Migration> = migrations.to_vec();
        while !remaining.is_empty() {
            let ready = remaining.iter().position(|m| match m.depends_on {
                None => true,
                Some(dep) => ordered.iter().any(|o: &Migration| o.name == dep),
            });
            match ready {
                Some(idx) => ordered.push(remaining.remove(idx)),
                None => {
                    let names: Vec<&str> = remaining.iter().map(|m| m.name).collect();
                    return Err(Error::Database(format!(
                        "migration plan invalid: dependency cycle involving {names:?}"
                    )));
                }
            }
        }

        Ok(Self { steps: ordered })
    }

    pub fn steps(&self) -> &[Migration] {
        &self.steps
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|m| m.name).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Merge another plan after this one's steps. Re-validates the union.
    pub fn chain(&self, other: &MigrationPlan) -> Result<MigrationPlan> {
        let mut all = self.steps.clone();
        all.extend(other.steps.iter().copied());
        MigrationPlan::new(&all)
    }
}

/// Applies migration plans against a live connection.
pub struct MigrationRunner;

impl MigrationRunner {
    /// Apply every step of `plan` in order. Returns the names of the steps
    /// applied by this run; steps already in the ledger are skipped.
    ///
    /// A failing step aborts the run. Its SQL and its ledger mark share one
    /// transaction, so nothing of the failed step persists and a retry is
    /// safe once the conflict is resolved.
    pub fn apply(conn: &mut Connection, plan: &MigrationPlan) -> Result<Vec<&'static str>> {
        Self::ensure_ledger(conn)?;
        let mut applied = Vec::new();
        for step in plan.steps() {
            if Self::apply_step(conn, step)? {
                applied.push(step.name);
            }
        }
        if applied.is_empty() {
            debug!("schema is up to date");
        } else {
            info!("applied {} migration step(s): {:?}", applied.len(), applied);
        }
        Ok(applied)
    }

    /// Apply a single step. Returns `false` when the ledger already records
    /// it (a repeat application is a no-op).
    pub fn apply_step(conn: &mut Connection, step: &Migration) -> Result<bool> {
        Self::ensure_ledger(conn)?;

        if Self::is_applied(conn, step.name)? {
            debug!("migration {} already applied, skipping", step.name);
            return Ok(false);
        }

        if let Some(dep) = step.depends_on
            && !Self::is_applied(conn, dep)?
        {
            return Err(Error::DependencyOrder {
                name: step.name.to_string(),
                dependency: dep.to_string(),
            });
        }

        // Immediate transaction: takes the database write lock for the whole
        // step, so no second runner can interleave.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| Error::Database(format!("failed to begin migration {}: {e}", step.name)))?;

        tx.execute_batch(step.sql).map_err(|e| Error::SchemaConflict {
            name: step.name.to_string(),
            reason: e.to_string(),
        })?;

        tx.execute(
            "INSERT INTO schema_ledger (name) VALUES (?1)",
            params![step.name],
        )
        .map_err(|e| Error::Database(format!("failed to record migration {}: {e}", step.name)))?;

        tx.commit()
            .map_err(|e| Error::Database(format!("failed to commit migration {}: {e}", step.name)))?;

        info!("applied migration {}", step.name);
        Ok(true)
    }

    /// Names in the ledger, in application order.
    pub fn applied(conn: &Connection) -> Result<Vec<String>> {
        Self::ensure_ledger_ref(conn)?;
        let mut stmt = conn
            .prepare("SELECT name FROM schema_ledger ORDER BY applied_at, name")
            .map_err(|e| Error::Database(format!("failed to read ledger: {e}")))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| Error::Database(format!("failed to read ledger: {e}")))?;
        let mut names = Vec::new();
        for row in rows {
            names.push(row.map_err(|e| Error::Database(format!("failed to read ledger row: {e}")))?);
        }
        Ok(names)
    }

    fn is_applied(conn: &Connection, name: &str) -> Result<bool> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM schema_ledger WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("failed to query ledger: {e}")))?;
        Ok(count > 0)
    }

    fn ensure_ledger(conn: &mut Connection) -> Result<()> {
        Self::ensure_ledger_ref(conn)
    }

    fn ensure_ledger_ref(conn: &Connection) -> Result<()> {
        conn.execute(LEDGER_TABLE_SQL, [])
            .map_err(|e| Error::Database(format!("failed to create schema ledger: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edonations_common::Error;

    const FIRST: Migration = Migration {
        name: "0001_initial",
        depends_on: None,
        sql: "CREATE TABLE widgets (id TEXT PRIMARY KEY, label TEXT NOT NULL)",
    };
    const SECOND: Migration = Migration {
        name: "0002_add_color",
        depends_on: Some("0001_initial"),
        sql: "ALTER TABLE widgets ADD COLUMN color TEXT",
    };
    const THIRD: Migration = Migration {
        name: "0003_add_index",
        depends_on: Some("0002_add_color"),
        sql: "CREATE INDEX idx_widgets_color ON widgets(color)",
    };

    fn table_exists(conn: &Connection, name: &str) -> bool {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![name],
                |row| row.get(0),
            )
            .unwrap();
        count > 0
    }

    #[test]
    fn plan_orders_steps_by_dependency() {
        // Declared backwards on purpose.
        let plan = MigrationPlan::new(&[THIRD, SECOND, FIRST]).unwrap();
        assert_eq!(
            plan.names(),
            vec!["0001_initial", "0002_add_color", "0003_add_index"]
        );
    }

    #[test]
    fn plan_rejects_duplicate_names() {
        let err = MigrationPlan::new(&[FIRST, FIRST]).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn plan_rejects_unknown_dependency() {
        let err = MigrationPlan::new(&[FIRST, THIRD]).unwrap_err();
        assert!(err.to_string().contains("unknown step"));
    }

    #[test]
    fn plan_rejects_dependency_cycles() {
        let a = Migration {
            name: "a",
            depends_on: Some("b"),
            sql: "SELECT 1",
        };
        let b = Migration {
            name: "b",
            depends_on: Some("a"),
            sql: "SELECT 1",
        };
        let err = MigrationPlan::new(&[a, b]).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn apply_runs_all_steps_and_records_them() {
        let mut conn = Connection::open_in_memory().unwrap();
        let plan = MigrationPlan::new(&[FIRST, SECOND, THIRD]).unwrap();

        let applied = MigrationRunner::apply(&mut conn, &plan).unwrap();
        assert_eq!(applied.len(), 3);
        assert!(table_exists(&conn, "widgets"));
        assert_eq!(
            MigrationRunner::applied(&conn).unwrap(),
            vec!["0001_initial", "0002_add_color", "0003_add_index"]
        );
    }

    #[test]
    fn applying_the_plan_twice_is_a_noop() {
        let mut conn = Connection::open_in_memory().unwrap();
        let plan = MigrationPlan::new(&[FIRST, SECOND]).unwrap();

        let first_run = MigrationRunner::apply(&mut conn, &plan).unwrap();
        assert_eq!(first_run.len(), 2);

        let second_run = MigrationRunner::apply(&mut conn, &plan).unwrap();
        assert!(second_run.is_empty());
        assert_eq!(MigrationRunner::applied(&conn).unwrap().len(), 2);
    }

    #[test]
    fn step_with_unapplied_dependency_fails_and_changes_nothing() {
        let mut conn = Connection::open_in_memory().unwrap();

        let err = MigrationRunner::apply_step(&mut conn, &SECOND).unwrap_err();
        match err {
            Error::DependencyOrder { name, dependency } => {
                assert_eq!(name, "0002_add_color");
                assert_eq!(dependency, "0001_initial");
            }
            other => panic!("expected dependency order error, got: {other}"),
        }
        assert!(!table_exists(&conn, "widgets"));
        assert!(MigrationRunner::applied(&conn).unwrap().is_empty());
    }

    #[test]
    fn failing_step_leaves_ledger_unmarked_and_is_retryable() {
        let mut conn = Connection::open_in_memory().unwrap();
        MigrationRunner::apply_step(&mut conn, &FIRST).unwrap();

        let broken = Migration {
            name: "0002_add_color",
            depends_on: Some("0001_initial"),
            sql: "ALTER TABLE no_such_table ADD COLUMN color TEXT",
        };
        let err = MigrationRunner::apply_step(&mut conn, &broken).unwrap_err();
        assert!(matches!(err, Error::SchemaConflict { .. }));
        assert_eq!(MigrationRunner::applied(&conn).unwrap(), vec!["0001_initial"]);

        // Conflict resolved: the same step name applies cleanly on retry.
        assert!(MigrationRunner::apply_step(&mut conn, &SECOND).unwrap());
        assert_eq!(MigrationRunner::applied(&conn).unwrap().len(), 2);
    }

    #[test]
    fn failed_run_keeps_earlier_steps_but_not_the_failing_one() {
        let mut conn = Connection::open_in_memory().unwrap();
        let broken_third = Migration {
            name: "0003_add_index",
            depends_on: Some("0002_add_color"),
            sql: "CREATE INDEX idx ON no_such_table(color)",
        };
        let plan = MigrationPlan::new(&[FIRST, SECOND, broken_third]).unwrap();

        let err = MigrationRunner::apply(&mut conn, &plan).unwrap_err();
        assert!(matches!(err, Error::SchemaConflict { .. }));
        assert_eq!(
            MigrationRunner::applied(&conn).unwrap(),
            vec!["0001_initial", "0002_add_color"]
        );
    }

    #[test]
    fn chain_merges_two_plans() {
        let other = Migration {
            name: "0001_other_app",
            depends_on: None,
            sql: "CREATE TABLE gadgets (id TEXT PRIMARY KEY)",
        };
        let base = MigrationPlan::new(&[FIRST, SECOND]).unwrap();
        let extra = MigrationPlan::new(&[other]).unwrap();

        let combined = base.chain(&extra).unwrap();
        assert_eq!(combined.steps().len(), 3);

        let mut conn = Connection::open_in_memory().unwrap();
        MigrationRunner::apply(&mut conn, &combined).unwrap();
        assert!(table_exists(&conn, "widgets"));
        assert!(table_exists(&conn, "gadgets"));
    }
}
