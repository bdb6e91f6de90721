//! SQLite-backed document store
//!
//! Each row keeps the record as a JSON document next to the columns used
//! for lookups. The UNIQUE constraints enforce the duplicate policy; the
//! named indexes are added by `ensure_indexes`.

use super::{variant_key_string, Store, GENES, VARIANTS};
use crate::core::{StoreError, StoreResult};
use crate::formats::{Gene, Variant};
use log::debug;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde::de::DeserializeOwned;
use std::path::Path;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS variants (
        id INTEGER PRIMARY KEY,
        xpos INTEGER NOT NULL,
        ref TEXT NOT NULL,
        alt TEXT NOT NULL,
        doc TEXT NOT NULL,
        UNIQUE (xpos, ref, alt)
    );
    CREATE TABLE IF NOT EXISTS genes (
        id INTEGER PRIMARY KEY,
        gene_id TEXT NOT NULL UNIQUE,
        gene_name TEXT,
        doc TEXT NOT NULL
    );
";

const INDEXES: &str = "
    CREATE INDEX IF NOT EXISTS idx_variants_xpos ON variants (xpos);
    CREATE INDEX IF NOT EXISTS idx_genes_gene_id ON genes (gene_id);
    CREATE INDEX IF NOT EXISTS idx_genes_gene_name ON genes (gene_name);
";

/// A database connection
///
/// One connection per thread; SQLite serialises writers on its own.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        debug!("Opened database {}", path.as_ref().display());
        Self::with_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Names of the secondary indexes present in the database
    pub fn index_names(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    fn query_docs<T: DeserializeOwned, P: rusqlite::Params>(&self, sql: &str, params: P) -> StoreResult<Vec<T>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let docs = stmt
            .query_map(params, |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        docs.iter()
            .map(|doc| serde_json::from_str(doc).map_err(StoreError::from))
            .collect()
    }

    fn query_doc<T: DeserializeOwned, P: rusqlite::Params>(&self, sql: &str, params: P) -> StoreResult<Option<T>> {
        let doc: Option<String> = self
            .conn
            .prepare_cached(sql)?
            .query_row(params, |row| row.get(0))
            .optional()?;
        doc.map(|doc| serde_json::from_str(&doc).map_err(StoreError::from))
            .transpose()
    }

    fn count(&self, sql: &str) -> StoreResult<usize> {
        let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation)
}

impl Store for SqliteStore {
    fn reset(&mut self) -> StoreResult<()> {
        self.conn.execute_batch("DELETE FROM variants; DELETE FROM genes;")?;
        Ok(())
    }

    fn begin(&mut self) -> StoreResult<()> {
        if !self.conn.is_autocommit() {
            return Err(StoreError::Transaction("transaction already open".to_string()));
        }
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        if self.conn.is_autocommit() {
            return Err(StoreError::Transaction("commit without transaction".to_string()));
        }
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        if self.conn.is_autocommit() {
            return Err(StoreError::Transaction("rollback without transaction".to_string()));
        }
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn insert_variant(&mut self, variant: &Variant) -> StoreResult<()> {
        let doc = serde_json::to_string(variant)?;
        let result = self
            .conn
            .prepare_cached("INSERT INTO variants (xpos, ref, alt, doc) VALUES (?1, ?2, ?3, ?4)")?
            .execute(params![variant.xpos, variant.ref_allele, variant.alt, doc]);
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(StoreError::Duplicate {
                collection: VARIANTS,
                key: variant_key_string(variant.xpos, &variant.ref_allele, &variant.alt),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn insert_gene(&mut self, gene: &Gene) -> StoreResult<()> {
        let doc = serde_json::to_string(gene)?;
        let result = self
            .conn
            .prepare_cached("INSERT INTO genes (gene_id, gene_name, doc) VALUES (?1, ?2, ?3)")?
            .execute(params![gene.gene_id, gene.gene_name, doc]);
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(StoreError::Duplicate {
                collection: GENES,
                key: gene.gene_id.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn ensure_indexes(&mut self) -> StoreResult<()> {
        self.conn.execute_batch(INDEXES)?;
        debug!("Secondary indexes present");
        Ok(())
    }

    fn find_variant(&self, xpos: u64, ref_allele: &str, alt: &str) -> StoreResult<Option<Variant>> {
        // SQLite integers are signed; larger keys cannot have been stored
        let Ok(xpos) = i64::try_from(xpos) else {
            return Ok(None);
        };
        self.query_doc(
            "SELECT doc FROM variants WHERE xpos = ?1 AND ref = ?2 AND alt = ?3",
            params![xpos, ref_allele, alt],
        )
    }

    fn find_gene(&self, gene_id: &str) -> StoreResult<Option<Gene>> {
        self.query_doc("SELECT doc FROM genes WHERE gene_id = ?1", params![gene_id])
    }

    fn find_genes_by_name(&self, gene_name: &str) -> StoreResult<Vec<Gene>> {
        self.query_docs(
            "SELECT doc FROM genes WHERE gene_name = ?1 ORDER BY gene_id",
            params![gene_name],
        )
    }

    fn find_variants_in_range(&self, xstart: u64, xstop: u64) -> StoreResult<Vec<Variant>> {
        self.query_docs(
            "SELECT doc FROM variants WHERE xpos BETWEEN ?1 AND ?2 ORDER BY xpos, id",
            params![clamp_xpos(xstart), clamp_xpos(xstop)],
        )
    }

    fn count_variants(&self) -> StoreResult<usize> {
        self.count("SELECT COUNT(*) FROM variants")
    }

    fn count_genes(&self) -> StoreResult<usize> {
        self.count("SELECT COUNT(*) FROM genes")
    }
}

/// Range bound as a SQLite integer, saturating at `i64::MAX`
fn clamp_xpos(xpos: u64) -> i64 {
    i64::try_from(xpos).unwrap_or(i64::MAX)
}
