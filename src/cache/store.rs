//! Cache Store Module
//!
//! Durable, named key->response mapping with multiple coexisting generations.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension};

use crate::cache::{CacheEntry, CacheGeneration, GenerationKind, ResponsePayload};
use crate::db::Database;
use crate::error::{Error, Result};

// == Cache Store ==
/// Generation-scoped response storage.
///
/// Reads and writes always name the generation explicitly; there is no
/// lookup that spans generations.
#[derive(Debug, Clone)]
pub struct CacheStore {
    db: Arc<Database>,
}

impl CacheStore {
    // == Constructor ==
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    // == Open Generation ==
    /// Creates the generation if missing and returns it.
    pub fn open_generation(&self, name: &str, kind: GenerationKind) -> Result<CacheGeneration> {
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO generations (name, kind, created_at) VALUES (?, ?, ?)",
            params![name, kind.as_str(), timestamp(Utc::now())],
        )?;
        drop(conn);

        self.generation(name)?
            .ok_or_else(|| Error::Internal(format!("Generation {} vanished after create", name)))
    }

    // == Generation ==
    pub fn generation(&self, name: &str) -> Result<Option<CacheGeneration>> {
        let conn = self.db.lock()?;
        let row: Option<(String, String, String)> = conn
            .query_row(
                "SELECT name, kind, created_at FROM generations WHERE name = ?",
                params![name],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        row.map(|(name, kind, created_at)| -> Result<CacheGeneration> {
            Ok(CacheGeneration {
                name,
                kind: kind.parse()?,
                created_at: parse_timestamp(&created_at)?,
            })
        })
        .transpose()
    }

    // == List Generations ==
    /// Returns every existing generation name, oldest first.
    pub fn list_generations(&self) -> Result<Vec<String>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY created_at, name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    // == Delete Generation ==
    /// Removes a generation and all of its entries.
    ///
    /// Returns false if the generation did not exist.
    pub fn delete_generation(&self, name: &str) -> Result<bool> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM cache_entries WHERE generation = ?", params![name])?;
        let removed = tx.execute("DELETE FROM generations WHERE name = ?", params![name])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    // == Put ==
    /// Stores a response under `key`. Last writer wins.
    pub fn put(&self, generation: &str, key: &str, payload: &ResponsePayload) -> Result<()> {
        let conn = self.db.lock()?;
        let exists = conn
            .query_row(
                "SELECT 1 FROM generations WHERE name = ?",
                params![generation],
                |_| Ok(()),
            )
            .optional()?
            .is_some();

        if !exists {
            return Err(Error::NotFound(format!("Generation {}", generation)));
        }

        insert_entry(&conn, generation, key, payload)
    }

    // == Populate Generation ==
    /// Creates a generation and writes every entry in one transaction.
    ///
    /// Either all entries become visible or none do.
    pub fn populate_generation(
        &self,
        name: &str,
        kind: GenerationKind,
        entries: &[(String, ResponsePayload)],
    ) -> Result<CacheGeneration> {
        {
            let mut conn = self.db.lock()?;
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR IGNORE INTO generations (name, kind, created_at) VALUES (?, ?, ?)",
                params![name, kind.as_str(), timestamp(Utc::now())],
            )?;
            for (key, payload) in entries {
                insert_entry(&tx, name, key, payload)?;
            }
            tx.commit()?;
        }

        self.generation(name)?
            .ok_or_else(|| Error::Internal(format!("Generation {} vanished after populate", name)))
    }

    // == Match ==
    /// Looks up `key` within a single generation.
    pub fn match_entry(&self, generation: &str, key: &str) -> Result<Option<CacheEntry>> {
        let conn = self.db.lock()?;
        let row: Option<(u16, String, Vec<u8>, String)> = conn
            .query_row(
                "SELECT status, headers, body, stored_at FROM cache_entries
                 WHERE generation = ? AND request_key = ?",
                params![generation, key],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        match row {
            Some((status, headers, body, stored_at)) => Ok(Some(CacheEntry {
                key: key.to_string(),
                payload: ResponsePayload {
                    status,
                    headers: serde_json::from_str(&headers)?,
                    body,
                },
                stored_at: parse_timestamp(&stored_at)?,
                generation: generation.to_string(),
            })),
            None => Ok(None),
        }
    }

    // == Entry Count ==
    pub fn entry_count(&self, generation: &str) -> Result<usize> {
        let conn = self.db.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cache_entries WHERE generation = ?",
            params![generation],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // == Current Pointers ==
    /// Reads the persisted current generation for `kind`.
    pub fn load_current(&self, kind: GenerationKind) -> Result<Option<String>> {
        let conn = self.db.lock()?;
        let name = conn
            .query_row(
                "SELECT name FROM current_generations WHERE kind = ?",
                params![kind.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name)
    }

    // == Promote ==
    /// Makes the given generations current and deletes every other one.
    ///
    /// Pointer swap and sweep share one transaction: if any delete fails,
    /// the previous pointers and generations are left exactly as they were.
    /// Returns the deleted generation names.
    pub fn promote(&self, static_name: &str, dynamic_name: &str) -> Result<Vec<String>> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT OR IGNORE INTO generations (name, kind, created_at) VALUES (?, ?, ?)",
            params![
                dynamic_name,
                GenerationKind::Dynamic.as_str(),
                timestamp(Utc::now())
            ],
        )?;
        for (kind, name) in [
            (GenerationKind::Static, static_name),
            (GenerationKind::Dynamic, dynamic_name),
        ] {
            tx.execute(
                "INSERT OR REPLACE INTO current_generations (kind, name) VALUES (?, ?)",
                params![kind.as_str(), name],
            )?;
        }

        let superseded = {
            let mut stmt = tx.prepare(
                "SELECT name FROM generations WHERE name NOT IN (?, ?) ORDER BY created_at, name",
            )?;
            let names = stmt
                .query_map(params![static_name, dynamic_name], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            names
        };
        for name in &superseded {
            tx.execute("DELETE FROM cache_entries WHERE generation = ?", params![name])?;
            tx.execute("DELETE FROM generations WHERE name = ?", params![name])?;
        }

        tx.commit()?;
        Ok(superseded)
    }
}

// == Utility Functions ==
fn insert_entry(
    conn: &rusqlite::Connection,
    generation: &str,
    key: &str,
    payload: &ResponsePayload,
) -> Result<()> {
    let headers = serde_json::to_string(&payload.headers)?;
    conn.execute(
        "INSERT OR REPLACE INTO cache_entries
            (generation, request_key, status, headers, body, stored_at)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
            generation,
            key,
            payload.status,
            headers,
            payload.body,
            timestamp(Utc::now())
        ],
    )?;
    Ok(())
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Bad timestamp {:?}: {}", value, e)))
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> CacheStore {
        CacheStore::new(Arc::new(Database::in_memory().unwrap()))
    }

    #[test]
    fn test_put_and_match() {
        let store = test_store();
        store.open_generation("app-static-v1", GenerationKind::Static).unwrap();

        let payload = ResponsePayload::text(200, "<h1>Menu</h1>");
        store.put("app-static-v1", "GET /menu.html", &payload).unwrap();

        let entry = store.match_entry("app-static-v1", "GET /menu.html").unwrap().unwrap();
        assert_eq!(entry.payload, payload);
        assert_eq!(entry.generation, "app-static-v1");
    }

    #[test]
    fn test_put_into_missing_generation_fails() {
        let store = test_store();
        let result = store.put("nope", "GET /", &ResponsePayload::new(200, ""));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_reads_are_scoped_to_generation() {
        let store = test_store();
        store.open_generation("static-v1", GenerationKind::Static).unwrap();
        store.open_generation("dynamic-v1", GenerationKind::Dynamic).unwrap();
        store
            .put("dynamic-v1", "GET /api/menu", &ResponsePayload::new(200, "[]"))
            .unwrap();

        assert!(store.match_entry("static-v1", "GET /api/menu").unwrap().is_none());
        assert!(store.match_entry("dynamic-v1", "GET /api/menu").unwrap().is_some());
    }

    #[test]
    fn test_put_is_last_writer_wins() {
        let store = test_store();
        store.open_generation("g", GenerationKind::Dynamic).unwrap();
        store.put("g", "GET /a", &ResponsePayload::new(200, "one")).unwrap();
        store.put("g", "GET /a", &ResponsePayload::new(200, "two")).unwrap();

        assert_eq!(store.entry_count("g").unwrap(), 1);
        let entry = store.match_entry("g", "GET /a").unwrap().unwrap();
        assert_eq!(entry.payload.body_text(), "two");
    }

    #[test]
    fn test_delete_generation_removes_entries() {
        let store = test_store();
        store.open_generation("old", GenerationKind::Static).unwrap();
        store.put("old", "GET /", &ResponsePayload::new(200, "x")).unwrap();

        assert!(store.delete_generation("old").unwrap());
        assert!(!store.delete_generation("old").unwrap());
        assert!(store.list_generations().unwrap().is_empty());
        assert_eq!(store.entry_count("old").unwrap(), 0);
    }

    #[test]
    fn test_populate_generation_writes_all() {
        let store = test_store();
        let entries = vec![
            ("GET /".to_string(), ResponsePayload::new(200, "root")),
            ("GET /menu.html".to_string(), ResponsePayload::new(200, "menu")),
        ];

        let generation = store
            .populate_generation("static-v2", GenerationKind::Static, &entries)
            .unwrap();

        assert_eq!(generation.kind, GenerationKind::Static);
        assert_eq!(store.entry_count("static-v2").unwrap(), 2);
    }

    #[test]
    fn test_open_generation_is_idempotent() {
        let store = test_store();
        let first = store.open_generation("g", GenerationKind::Static).unwrap();
        let second = store.open_generation("g", GenerationKind::Static).unwrap();
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(store.list_generations().unwrap(), vec!["g".to_string()]);
    }

    #[test]
    fn test_promote_swaps_pointers_and_sweeps() {
        let store = test_store();
        assert!(store.load_current(GenerationKind::Static).unwrap().is_none());
        store.open_generation("s-v1", GenerationKind::Static).unwrap();
        store.open_generation("s-v2", GenerationKind::Static).unwrap();
        store.put("s-v1", "GET /", &ResponsePayload::new(200, "old")).unwrap();

        let deleted = store.promote("s-v2", "d-v2").unwrap();

        assert_eq!(deleted, vec!["s-v1".to_string()]);
        assert_eq!(store.load_current(GenerationKind::Static).unwrap().as_deref(), Some("s-v2"));
        assert_eq!(store.load_current(GenerationKind::Dynamic).unwrap().as_deref(), Some("d-v2"));
        assert_eq!(store.entry_count("s-v1").unwrap(), 0);
        assert!(store.generation("d-v2").unwrap().is_some());
    }

    #[test]
    fn test_promote_rolls_back_when_sweep_fails() {
        let db = Arc::new(Database::in_memory().unwrap());
        let store = CacheStore::new(db.clone());
        store.open_generation("s-v1", GenerationKind::Static).unwrap();
        store.promote("s-v1", "d-v1").unwrap();
        store.open_generation("pinned", GenerationKind::Static).unwrap();
        store.open_generation("s-v2", GenerationKind::Static).unwrap();
        db.lock()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER keep_pinned BEFORE DELETE ON generations
                 WHEN OLD.name = 'pinned'
                 BEGIN SELECT RAISE(ABORT, 'pinned'); END;",
            )
            .unwrap();

        assert!(store.promote("s-v2", "d-v2").is_err());

        assert_eq!(store.load_current(GenerationKind::Static).unwrap().as_deref(), Some("s-v1"));
        assert_eq!(store.load_current(GenerationKind::Dynamic).unwrap().as_deref(), Some("d-v1"));
        assert!(store.generation("s-v1").unwrap().is_some());
        assert!(store.generation("d-v1").unwrap().is_some());
        assert!(store.generation("d-v2").unwrap().is_none());
    }
}
