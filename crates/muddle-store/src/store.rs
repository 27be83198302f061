//! A single tag/rule database file (§4.3).
//!
//! One `Store` wraps one `rusqlite::Connection` onto one `.muddle/tag_db`.
//! A root tree's store owns all seven tables; a subdomain's store owns
//! only `labels` — table presence is probed on open and missing tables
//! are created, matching the "probe, don't assume" contract in §4.3.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use muddle_errors::muddle_bug;
use muddle_label::Label;
use rusqlite::{Connection, OptionalExtension, params};

use crate::RuleStatus;

pub const TAG_DB_FILE: &str = "tag_db";
pub const SUBDOMAIN_MARKER_FILE: &str = "am_subdomain";

/// Whether a store's `.muddle` owns the full schema (root) or just the
/// per-domain `labels` table (subdomain), per §4.3.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Root,
    Subdomain,
}

pub struct Store {
    conn: Connection,
    kind: StoreKind,
    path: PathBuf,
}

impl Store {
    /// Open (creating if necessary) the tag database under `tree_root`,
    /// auto-detecting root-vs-subdomain from the `am_subdomain` marker.
    pub fn open(tree_root: &Path) -> Result<Store> {
        let kind = if tree_root.join(".muddle").join(SUBDOMAIN_MARKER_FILE).exists() {
            StoreKind::Subdomain
        } else {
            StoreKind::Root
        };
        Store::open_as(tree_root, kind)
    }

    pub fn open_as(tree_root: &Path, kind: StoreKind) -> Result<Store> {
        let muddle_dir = tree_root.join(".muddle");
        std::fs::create_dir_all(&muddle_dir)
            .with_context(|| format!("failed to create {}", muddle_dir.display()))?;
        let path = muddle_dir.join(TAG_DB_FILE);
        let conn = Connection::open(&path)
            .with_context(|| format!("failed to open tag store {}", path.display()))?;
        let mut store = Store { conn, kind, path };
        store.ensure_schema()?;
        Ok(store)
    }

    /// An in-memory store, for tests that don't need a filesystem tree.
    pub fn open_in_memory(kind: StoreKind) -> Result<Store> {
        let conn = Connection::open_in_memory().context("failed to open in-memory tag store")?;
        let mut store = Store {
            conn,
            kind,
            path: PathBuf::from(":memory:"),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn kind(&self) -> StoreKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS labels (
                label TEXT PRIMARY KEY,
                done INTEGER NOT NULL
            );",
        )?;
        if self.kind == StoreKind::Root {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS rules (
                    target TEXT PRIMARY KEY,
                    req_master INTEGER NOT NULL,
                    transient INTEGER NOT NULL,
                    status INTEGER NOT NULL,
                    owner_pid INTEGER,
                    owner_uuid TEXT,
                    updated_at TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS rule_deps (
                    rule_target TEXT NOT NULL,
                    dep TEXT NOT NULL,
                    PRIMARY KEY (rule_target, dep)
                );
                CREATE TABLE IF NOT EXISTS rules_to_build (
                    target TEXT PRIMARY KEY,
                    req_master INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS processes (
                    uuid TEXT PRIMARY KEY,
                    pid INTEGER NOT NULL,
                    master INTEGER NOT NULL,
                    pause_requested_by TEXT,
                    paused INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS just_pulled (
                    label TEXT PRIMARY KEY,
                    committed INTEGER NOT NULL
                );",
            )?;
        }
        Ok(())
    }

    fn require_root(&self) -> Result<()> {
        if self.kind != StoreKind::Root {
            muddle_bug!("operation requires the root tag store, got a subdomain store at {}", self.path.display());
        }
        Ok(())
    }

    // -- Tag operations (§4.3 "Tag operations") -----------------------

    pub fn set_tag(&mut self, label: &Label) -> Result<()> {
        self.conn.execute(
            "INSERT INTO labels (label, done) VALUES (?1, 1)
             ON CONFLICT(label) DO UPDATE SET done = 1",
            params![label.to_string()],
        )?;
        Ok(())
    }

    pub fn clear_tag(&mut self, label: &Label) -> Result<()> {
        self.conn
            .execute("DELETE FROM labels WHERE label = ?1", params![label.to_string()])?;
        Ok(())
    }

    pub fn is_tag_done(&self, label: &Label) -> Result<bool> {
        let done: Option<i64> = self
            .conn
            .query_row(
                "SELECT done FROM labels WHERE label = ?1",
                params![label.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(done == Some(1))
    }

    /// Delete every tag of `label_type` in this domain's `labels` table
    /// (used when retracting a whole sub-tree, §4.3).
    pub fn clear_tags_type(&mut self, label_type: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM labels WHERE label LIKE ?1",
            params![format!("{label_type}:%")],
        )?;
        Ok(())
    }

    pub fn done_labels(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT label FROM labels WHERE done = 1 ORDER BY label")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    // -- Rule bookkeeping (root-only) -----------------------------------

    pub fn upsert_rule(
        &mut self,
        target: &Label,
        req_master: bool,
        transient: bool,
    ) -> Result<()> {
        self.require_root()?;
        self.conn.execute(
            "INSERT INTO rules (target, req_master, transient, status, owner_pid, owner_uuid, updated_at)
             VALUES (?1, ?2, ?3, 0, NULL, NULL, datetime('now'))
             ON CONFLICT(target) DO NOTHING",
            params![target.to_string(), req_master as i64, transient as i64],
        )?;
        Ok(())
    }

    pub fn replace_rule_deps(&mut self, target: &Label, deps: &[Label]) -> Result<()> {
        self.require_root()?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM rule_deps WHERE rule_target = ?1",
            params![target.to_string()],
        )?;
        for dep in deps {
            tx.execute(
                "INSERT OR IGNORE INTO rule_deps (rule_target, dep) VALUES (?1, ?2)",
                params![target.to_string(), dep.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn rule_deps(&self, target: &Label) -> Result<Vec<String>> {
        self.require_root()?;
        let mut stmt = self
            .conn
            .prepare("SELECT dep FROM rule_deps WHERE rule_target = ?1")?;
        let rows = stmt.query_map(params![target.to_string()], |row| row.get::<_, String>(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn add_to_frontier(&mut self, target: &Label, req_master: bool) -> Result<()> {
        self.require_root()?;
        self.conn.execute(
            "INSERT INTO rules_to_build (target, req_master) VALUES (?1, ?2)
             ON CONFLICT(target) DO NOTHING",
            params![target.to_string(), req_master as i64],
        )?;
        Ok(())
    }

    pub fn remove_from_frontier(&mut self, target: &Label) -> Result<()> {
        self.require_root()?;
        self.conn
            .execute("DELETE FROM rules_to_build WHERE target = ?1", params![target.to_string()])?;
        Ok(())
    }

    pub fn frontier(&self) -> Result<Vec<(String, bool)>> {
        self.require_root()?;
        let mut stmt = self
            .conn
            .prepare("SELECT target, req_master FROM rules_to_build ORDER BY target")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? != 0))
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn rule_status(&self, target: &Label) -> Result<Option<RuleStatus>> {
        self.require_root()?;
        let status: Option<i64> = self
            .conn
            .query_row(
                "SELECT status FROM rules WHERE target = ?1",
                params![target.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        status.map(RuleStatus::from_i64).transpose()
    }

    /// The atomic claim: succeeds iff the row was `Clear` immediately
    /// before this call (§4.3 "Claiming a rule").
    pub fn try_claim(&mut self, target: &Label, uuid: &str, pid: u32) -> Result<bool> {
        self.require_root()?;
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE rules SET status = 1, owner_uuid = ?2, owner_pid = ?3, updated_at = datetime('now')
             WHERE target = ?1 AND status = 0",
            params![target.to_string(), uuid, pid],
        )?;
        tx.commit()?;
        Ok(changed == 1)
    }

    pub fn mark_done(&mut self, target: &Label) -> Result<()> {
        self.require_root()?;
        self.conn.execute(
            "UPDATE rules SET status = 2, updated_at = datetime('now') WHERE target = ?1",
            params![target.to_string()],
        )?;
        self.remove_from_frontier(target)?;
        self.set_tag(target)
    }

    /// Return a transient rule to `clear` without ever recording `done`
    /// in the database (I3) — completion for a transient target lives
    /// only in the caller's process-local set.
    pub fn mark_clear(&mut self, target: &Label) -> Result<()> {
        self.require_root()?;
        self.conn.execute(
            "UPDATE rules SET status = 0, owner_uuid = NULL, owner_pid = NULL, updated_at = datetime('now')
             WHERE target = ?1",
            params![target.to_string()],
        )?;
        Ok(())
    }

    // -- Process roster & pause protocol (root-only, §4.3) ---------------

    pub fn register_process(&mut self, uuid: &str, pid: u32) -> Result<()> {
        self.require_root()?;
        self.conn.execute(
            "INSERT INTO processes (uuid, pid, master, pause_requested_by, paused)
             VALUES (?1, ?2, 0, NULL, 0)",
            params![uuid, pid],
        )?;
        Ok(())
    }

    pub fn unregister_process(&mut self, uuid: &str) -> Result<()> {
        self.require_root()?;
        self.conn
            .execute("DELETE FROM processes WHERE uuid = ?1", params![uuid])?;
        Ok(())
    }

    pub fn attempt_set_master(&mut self, uuid: &str) -> Result<bool> {
        self.require_root()?;
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let existing: i64 = tx.query_row("SELECT COUNT(*) FROM processes WHERE master = 1", [], |r| r.get(0))?;
        let became_master = if existing == 0 {
            tx.execute("UPDATE processes SET master = 1 WHERE uuid = ?1", params![uuid])?;
            true
        } else {
            false
        };
        tx.commit()?;
        Ok(became_master)
    }

    pub fn is_master(&self, uuid: &str) -> Result<bool> {
        self.require_root()?;
        let master: Option<i64> = self
            .conn
            .query_row(
                "SELECT master FROM processes WHERE uuid = ?1",
                params![uuid],
                |row| row.get(0),
            )
            .optional()?;
        Ok(master == Some(1))
    }

    pub fn request_pause(&mut self, master_uuid: &str) -> Result<()> {
        self.require_root()?;
        self.conn.execute(
            "UPDATE processes SET pause_requested_by = ?1 WHERE uuid != ?1",
            params![master_uuid],
        )?;
        Ok(())
    }

    pub fn release_pause(&mut self) -> Result<()> {
        self.require_root()?;
        self.conn
            .execute("UPDATE processes SET pause_requested_by = NULL", [])?;
        Ok(())
    }

    pub fn is_pause_requested(&self, uuid: &str) -> Result<bool> {
        self.require_root()?;
        let requested: Option<String> = self
            .conn
            .query_row(
                "SELECT pause_requested_by FROM processes WHERE uuid = ?1",
                params![uuid],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(requested.is_some())
    }

    pub fn set_paused(&mut self, uuid: &str, paused: bool) -> Result<()> {
        self.require_root()?;
        self.conn.execute(
            "UPDATE processes SET paused = ?2 WHERE uuid = ?1",
            params![uuid, paused as i64],
        )?;
        Ok(())
    }

    pub fn are_others_paused(&self, master_uuid: &str) -> Result<bool> {
        self.require_root()?;
        let unpaused: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM processes
             WHERE uuid != ?1 AND pause_requested_by IS NOT NULL AND paused = 0",
            params![master_uuid],
            |row| row.get(0),
        )?;
        Ok(unpaused == 0)
    }

    pub fn process_count(&self) -> Result<i64> {
        self.require_root()?;
        self.conn
            .query_row("SELECT COUNT(*) FROM processes", [], |row| row.get(0))
            .map_err(Into::into)
    }

    /// How many rules are currently claimed (`status = processing`) by
    /// some worker — used by the scheduler's exit check (§4.4 step 5).
    pub fn processing_count(&self) -> Result<i64> {
        self.require_root()?;
        self.conn
            .query_row("SELECT COUNT(*) FROM rules WHERE status = 1", [], |row| row.get(0))
            .map_err(Into::into)
    }

    // -- Just-pulled set (root-only, §4.3) -------------------------------

    pub fn mark_just_pulled(&mut self, label: &Label) -> Result<()> {
        self.require_root()?;
        self.conn.execute(
            "INSERT INTO just_pulled (label, committed) VALUES (?1, 0)
             ON CONFLICT(label) DO UPDATE SET committed = 0",
            params![label.to_string()],
        )?;
        Ok(())
    }

    pub fn just_pulled(&self) -> Result<Vec<String>> {
        self.require_root()?;
        let mut stmt = self
            .conn
            .prepare("SELECT label FROM just_pulled WHERE committed = 0 ORDER BY label")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Cleared by the next top-level command (§4.3).
    pub fn clear_just_pulled(&mut self) -> Result<()> {
        self.require_root()?;
        self.conn.execute("DELETE FROM just_pulled", [])?;
        Ok(())
    }
}
