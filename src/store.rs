use anyhow::{bail, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;

use crate::aggregate::venture::VentureEvent;
use crate::aggregate::{state_hash, Aggregate, AggregateId};
use crate::logging::{log, obj, v_str, Domain, Level};
use crate::state::EconomicSystemState;

/// SQLite persistence for snapshots, aggregate state and the venture event log.
pub struct SnapshotStore {
    conn: Connection,
}

impl SnapshotStore {
    pub fn new(path: &str) -> Result<Self> {
        Ok(Self { conn: Connection::open(path)? })
    }

    pub fn init(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS economic_snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ts_ms INTEGER NOT NULL,
                body TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS aggregates (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                status TEXT NOT NULL,
                state_hash TEXT NOT NULL,
                body TEXT NOT NULL,
                updated_ms INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS venture_events (
                aggregate_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                kind TEXT NOT NULL,
                body TEXT NOT NULL,
                PRIMARY KEY (aggregate_id, seq)
            );
            CREATE INDEX IF NOT EXISTS idx_snapshots_ts ON economic_snapshots (ts_ms);
            COMMIT;",
        )?;
        Ok(())
    }

    pub fn save_snapshot(&mut self, snapshot: &EconomicSystemState) -> Result<()> {
        let body = serde_json::to_string(snapshot)?;
        self.conn.execute(
            "INSERT INTO economic_snapshots (ts_ms, body) VALUES (?1, ?2)",
            params![snapshot.timestamp.timestamp_millis(), body],
        )?;
        Ok(())
    }

    /// All snapshots in timestamp order, insertion order within a timestamp.
    pub fn load_snapshots(&self) -> Result<Vec<EconomicSystemState>> {
        let mut stmt = self
            .conn
            .prepare("SELECT body FROM economic_snapshots ORDER BY ts_ms, id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for body in rows {
            out.push(serde_json::from_str(&body?)?);
        }
        Ok(out)
    }

    /// Insert or replace the current state of an aggregate.
    pub fn save_aggregate<A: Aggregate>(&mut self, aggregate: &A) -> Result<String> {
        aggregate.check_invariants()?;
        let body = serde_json::to_string(aggregate)?;
        let hash = state_hash(aggregate)?;
        self.conn.execute(
            "INSERT INTO aggregates (id, kind, status, state_hash, body, updated_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                status = excluded.status,
                state_hash = excluded.state_hash,
                body = excluded.body,
                updated_ms = excluded.updated_ms",
            params![
                aggregate.id().to_string(),
                A::KIND,
                aggregate.status_str(),
                hash,
                body,
                chrono::Utc::now().timestamp_millis()
            ],
        )?;
        log(
            Level::Debug,
            Domain::Store,
            "aggregate_saved",
            obj(&[
                ("aggregate_id", v_str(&aggregate.id().to_string())),
                ("kind", v_str(A::KIND)),
                ("status", v_str(aggregate.status_str())),
                ("state_hash", v_str(&hash)),
            ]),
        );
        Ok(hash)
    }

    /// Load an aggregate and check it against its stored hash.
    pub fn load_aggregate<A: Aggregate + DeserializeOwned>(&self, id: AggregateId) -> Result<Option<A>> {
        let row: Option<(String, String, String)> = self
            .conn
            .query_row(
                "SELECT kind, state_hash, body FROM aggregates WHERE id = ?1",
                params![id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let Some((kind, stored_hash, body)) = row else {
            return Ok(None);
        };
        if kind != A::KIND {
            bail!("aggregate {} is a {}, not a {}", id, kind, A::KIND);
        }
        let aggregate: A = serde_json::from_str(&body)?;
        let hash = state_hash(&aggregate)?;
        if hash != stored_hash {
            log(
                Level::Error,
                Domain::Audit,
                "hash_mismatch",
                obj(&[
                    ("aggregate_id", v_str(&id.to_string())),
                    ("stored", v_str(&stored_hash)),
                    ("loaded", v_str(&hash)),
                ]),
            );
            bail!("aggregate {} hash mismatch: stored {} loaded {}", id, stored_hash, hash);
        }
        Ok(Some(aggregate))
    }

    pub fn aggregate_status(&self, id: AggregateId) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT status FROM aggregates WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Append events; a seq that is already stored is left untouched.
    /// Returns how many rows were new.
    pub fn append_venture_events(&mut self, aggregate_id: AggregateId, events: &[VentureEvent]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        for e in events {
            let kind = serde_json::to_value(e.kind)?;
            inserted += tx.execute(
                "INSERT OR IGNORE INTO venture_events (aggregate_id, seq, kind, body)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    aggregate_id.to_string(),
                    e.seq as i64,
                    kind.as_str().unwrap_or_default(),
                    serde_json::to_string(e)?
                ],
            )?;
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn load_venture_events(&self, aggregate_id: AggregateId) -> Result<Vec<VentureEvent>> {
        let mut stmt = self
            .conn
            .prepare("SELECT body FROM venture_events WHERE aggregate_id = ?1 ORDER BY seq")?;
        let rows = stmt.query_map(params![aggregate_id.to_string()], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for body in rows {
            out.push(serde_json::from_str(&body?)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::issuance::{EbitInputs, IssuanceAggregate};
    use crate::aggregate::Gate;
    use crate::state::sample_state;

    fn store() -> (tempfile::TempDir, SnapshotStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("econ.sqlite");
        let mut s = SnapshotStore::new(path.to_str().unwrap()).unwrap();
        s.init().unwrap();
        (dir, s)
    }

    fn issuance() -> IssuanceAggregate {
        IssuanceAggregate::create(EbitInputs {
            expected_revenue: 1_000_000.0,
            cost_of_goods_sold: 400_000.0,
            sga: 100_000.0,
            tax: 50_000.0,
            interest: 10_000.0,
        })
        .unwrap()
    }

    #[test]
    fn test_init_is_idempotent() {
        let (_dir, mut s) = store();
        s.init().unwrap();
    }

    #[test]
    fn test_snapshot_round_trip() {
        let (_dir, mut s) = store();
        let snap = EconomicSystemState { price_volatility: 0.1 + 0.2, ..sample_state() };
        s.save_snapshot(&snap).unwrap();
        assert_eq!(s.load_snapshots().unwrap(), vec![snap]);
    }

    #[test]
    fn test_aggregate_upsert_and_load() {
        let (_dir, mut s) = store();
        let agg = issuance();
        let first = s.save_aggregate(&agg).unwrap();
        let active = agg.activate(&Gate::Open).unwrap();
        let second = s.save_aggregate(&active).unwrap();
        assert_ne!(first, second);
        assert_eq!(s.aggregate_status(agg.id()).unwrap().as_deref(), Some("active"));
        let loaded: IssuanceAggregate = s.load_aggregate(agg.id()).unwrap().unwrap();
        assert_eq!(loaded, active);
    }

    #[test]
    fn test_load_missing_aggregate() {
        let (_dir, s) = store();
        let missing: Option<IssuanceAggregate> = s.load_aggregate(AggregateId::new()).unwrap();
        assert!(missing.is_none());
    }
}
