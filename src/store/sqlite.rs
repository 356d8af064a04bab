use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params, params_from_iter};

use super::schema::SCHEMA;
use super::{Catalog, Filter, Persistable};
use crate::error::{Error, Result};
use crate::types::{SyncRun, SyncStatus};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn select_sql<T: Persistable>(filter: &Filter) -> Result<(String, Vec<Value>)> {
    let (where_sql, params) = filter.where_clause(T::TABLE, T::COLUMNS)?;
    let tail = filter.tail_clause(T::TABLE, T::COLUMNS)?;
    let sql = format!(
        "SELECT {} FROM {}{}{}",
        T::COLUMNS.join(", "),
        T::TABLE,
        where_sql,
        tail
    );
    Ok((sql, params))
}

fn insert_sql<T: Persistable>() -> String {
    let marks = (1..=T::COLUMNS.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        T::TABLE,
        T::COLUMNS.join(", "),
        marks
    )
}

/// `UPDATE` statement binding the non-key columns first and the key last.
fn update_sql<T: Persistable>() -> String {
    let sets = T::COLUMNS[1..]
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{column} = ?{}", i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE {} SET {} WHERE {} = ?{}",
        T::TABLE,
        sets,
        T::COLUMNS[0],
        T::COLUMNS.len()
    )
}

fn update_params<T: Persistable>(entity: &T) -> Vec<Value> {
    let mut values = entity.to_values();
    let id = values.remove(0);
    values.push(id);
    values
}

fn sync_run_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncRun> {
    let status: String = row.get(2)?;
    Ok(SyncRun {
        id: row.get(0)?,
        scope: row.get(1)?,
        status: SyncStatus::parse(&status).unwrap_or(SyncStatus::Failed),
        started_at: parse_datetime(&row.get::<_, String>(3)?),
        finished_at: row.get::<_, Option<String>>(4)?.map(|s| parse_datetime(&s)),
        apps_seen: row.get(5)?,
        warning_count: row.get(6)?,
        error: row.get(7)?,
    })
}

impl Catalog for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Entity operations

    fn find<T: Persistable>(&self, filter: &Filter) -> Result<Option<T>> {
        let (sql, params) = select_sql::<T>(&filter.clone().limit(1))?;
        let conn = self.conn();
        conn.query_row(&sql, params_from_iter(params), |row| T::from_row(row))
            .optional()
            .map_err(Error::from)
    }

    fn filter<T: Persistable>(&self, filter: &Filter) -> Result<Vec<T>> {
        let (sql, params) = select_sql::<T>(filter)?;
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map(params_from_iter(params), |row| T::from_row(row))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count<T: Persistable>(&self, filter: &Filter) -> Result<i64> {
        let (where_sql, params) = filter.where_clause(T::TABLE, T::COLUMNS)?;
        let sql = format!("SELECT COUNT(*) FROM {}{}", T::TABLE, where_sql);
        let count = self
            .conn()
            .query_row(&sql, params_from_iter(params), |row| row.get(0))?;
        Ok(count)
    }

    fn distinct<T: Persistable>(
        &self,
        filter: &Filter,
        columns: &[&str],
    ) -> Result<Vec<Vec<Value>>> {
        if let Some(column) = columns.iter().find(|c| !T::COLUMNS.contains(c)) {
            return Err(Error::UnknownColumn {
                table: T::TABLE,
                column: (*column).to_string(),
            });
        }

        let (where_sql, params) = filter.where_clause(T::TABLE, T::COLUMNS)?;
        let sql = format!(
            "SELECT DISTINCT {} FROM {}{}",
            columns.join(", "),
            T::TABLE,
            where_sql
        );
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map(params_from_iter(params), |row| {
            (0..columns.len())
                .map(|i| row.get::<_, Value>(i))
                .collect::<rusqlite::Result<Vec<_>>>()
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn create<T: Persistable>(&self, entity: &T) -> Result<()> {
        self.conn()
            .execute(&insert_sql::<T>(), params_from_iter(entity.to_values()))
            .map_err(|e| Error::from_write(e, &format!("create {}", T::TABLE)))?;
        Ok(())
    }

    fn bulk_create<T: Persistable>(&self, entities: &[T]) -> Result<usize> {
        if entities.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&insert_sql::<T>())?;
            for entity in entities {
                stmt.execute(params_from_iter(entity.to_values()))
                    .map_err(|e| Error::from_write(e, &format!("bulk create {}", T::TABLE)))?;
            }
        }
        tx.commit()?;
        Ok(entities.len())
    }

    fn update<T: Persistable>(&self, entity: &T) -> Result<()> {
        let rows = self
            .conn()
            .execute(&update_sql::<T>(), params_from_iter(update_params(entity)))
            .map_err(|e| Error::from_write(e, &format!("update {}", T::TABLE)))?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn bulk_update<T: Persistable>(&self, entities: &[T]) -> Result<usize> {
        if entities.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut updated = 0;
        {
            let mut stmt = tx.prepare(&update_sql::<T>())?;
            for entity in entities {
                updated += stmt
                    .execute(params_from_iter(update_params(entity)))
                    .map_err(|e| Error::from_write(e, &format!("bulk update {}", T::TABLE)))?;
            }
        }
        tx.commit()?;
        Ok(updated)
    }

    fn delete<T: Persistable>(&self, filter: &Filter) -> Result<usize> {
        let (where_sql, params) = filter.where_clause(T::TABLE, T::COLUMNS)?;
        let sql = format!("DELETE FROM {}{}", T::TABLE, where_sql);
        let rows = self
            .conn()
            .execute(&sql, params_from_iter(params))
            .map_err(|e| Error::from_write(e, &format!("delete {}", T::TABLE)))?;
        Ok(rows)
    }

    // Sync run history

    fn create_sync_run(&self, run: &SyncRun) -> Result<()> {
        self.conn().execute(
            "INSERT INTO sync_runs (id, scope, status, started_at, finished_at, apps_seen, warning_count, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                run.id,
                run.scope,
                run.status.as_str(),
                format_datetime(&run.started_at),
                run.finished_at.as_ref().map(format_datetime),
                run.apps_seen,
                run.warning_count,
                run.error,
            ],
        )?;
        Ok(())
    }

    fn finish_sync_run(&self, run: &SyncRun) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE sync_runs SET status = ?1, finished_at = ?2, apps_seen = ?3, warning_count = ?4, error = ?5
             WHERE id = ?6",
            params![
                run.status.as_str(),
                run.finished_at.as_ref().map(format_datetime),
                run.apps_seen,
                run.warning_count,
                run.error,
                run.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn list_sync_runs(&self, limit: i64) -> Result<Vec<SyncRun>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, scope, status, started_at, finished_at, apps_seen, warning_count, error
             FROM sync_runs ORDER BY started_at DESC, rowid DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit], sync_run_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Advisory lock

    fn try_acquire_lock(
        &self,
        name: &str,
        owner: &str,
        stale_after: chrono::Duration,
    ) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let holder: Option<(String, String)> = tx
            .query_row(
                "SELECT owner, acquired_at FROM sync_lock WHERE name = ?1",
                params![name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let now = Utc::now();
        if let Some((holder, acquired_at)) = holder {
            let age = now - parse_datetime(&acquired_at);
            if age < stale_after {
                return Ok(false);
            }
            tracing::warn!(
                "Taking over stale '{}' lock held by {} since {}",
                name,
                holder,
                acquired_at
            );
        }

        tx.execute(
            "INSERT OR REPLACE INTO sync_lock (name, owner, acquired_at) VALUES (?1, ?2, ?3)",
            params![name, owner, format_datetime(&now)],
        )?;
        tx.commit()?;
        Ok(true)
    }

    fn release_lock(&self, name: &str, owner: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM sync_lock WHERE name = ?1 AND owner = ?2",
            params![name, owner],
        )?;
        Ok(rows > 0)
    }
}
