use super::backend::BlobStore;
use super::DataStore;
use crate::document::default_block;
use crate::error::StorageError;
use crate::model::{
    now, Block, BlockId, BlockMetadata, BlockType, LinkKind, LinkMetadata, Page, PageId, Schedule,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Key the relational snapshot is stored under in the blob backend.
pub const BLOB_KEY: &str = "workspace.sqlite";

const SCHEMA_VERSION: i64 = 1;

/// Relational page store.
///
/// Works on an SQLite database in a private scratch directory and publishes a
/// serialized copy of it to the blob backend after every committed save.
pub struct PageStore<B: BlobStore> {
    conn: Connection,
    backend: B,
    scratch: TempDir,
}

impl<B: BlobStore> PageStore<B> {
    /// Restores the last snapshot from `backend`, or starts an empty schema.
    ///
    /// A blob that cannot be read or cannot be opened as a database falls back to
    /// an empty schema. Fails only when the scratch database cannot be created.
    pub fn open(backend: B) -> Result<Self, StorageError> {
        let scratch = tempfile::tempdir()?;
        let db_path = scratch.path().join(BLOB_KEY);

        let restored = match backend.get(BLOB_KEY) {
            Ok(None) => {
                info!("no saved workspace found, initializing empty schema");
                false
            }
            Err(e) => {
                warn!(error = %e, "saved workspace could not be read, initializing empty schema");
                false
            }
            Ok(Some(bytes)) => match restore_snapshot(&db_path, &bytes) {
                Ok(()) => {
                    info!(bytes = bytes.len(), "restored workspace snapshot");
                    true
                }
                Err(e) => {
                    warn!(error = %e, "saved workspace is unreadable, initializing empty schema");
                    discard_database(&db_path);
                    false
                }
            },
        };

        let conn = Connection::open(&db_path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        if !restored {
            install_schema(&conn)?;
        }

        Ok(Self {
            conn,
            backend,
            scratch,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn save(&mut self, pages: &[Page]) -> Result<(), StorageError> {
        let mut block_count = 0usize;

        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM blocks", [])?;
        tx.execute("DELETE FROM pages", [])?;
        {
            let mut insert_page = tx.prepare(
                "INSERT INTO pages (id, title, updated_at, is_deleted, deleted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            let mut insert_block = tx.prepare(
                "INSERT INTO blocks (
                   page_id, id, type, content, checked, schedule, last_edited_at, metadata,
                   link_page_id, link_block_id, link_kind, link_created_at, link_updated_at,
                   sort_order
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            )?;

            for page in pages {
                insert_page.execute(params![
                    page.id.as_str(),
                    page.title,
                    page.updated_at.timestamp_millis(),
                    page.is_deleted,
                    page.deleted_at.map(|t| t.timestamp_millis()),
                ])?;

                for (order, block) in page.blocks.iter().enumerate() {
                    let metadata = serde_json::to_string(&block.metadata_bag())?;
                    let link = block.link_metadata.as_ref();
                    insert_block.execute(params![
                        page.id.as_str(),
                        block.id.as_str(),
                        block.block_type.as_str(),
                        block.content,
                        block.checked,
                        block.schedule.map(Schedule::as_str),
                        block.last_edited_at.map(|t| t.timestamp_millis()),
                        metadata,
                        link.map(|l| l.source_page_id.as_str()),
                        link.and_then(|l| l.source_block_id.as_ref().map(BlockId::as_str)),
                        link.map(|l| l.kind.as_str()),
                        link.map(|l| l.created_at.timestamp_millis()),
                        link.map(|l| l.updated_at.timestamp_millis()),
                        order as i64,
                    ])?;
                    block_count += 1;
                }
            }
        }
        tx.commit()?;

        let bytes = self.snapshot()?;
        self.backend.put(BLOB_KEY, &bytes)?;
        debug!(
            pages = pages.len(),
            blocks = block_count,
            bytes = bytes.len(),
            "workspace saved"
        );
        Ok(())
    }

    pub fn load(&self) -> Result<Vec<Page>, StorageError> {
        let mut blocks_by_page: HashMap<String, Vec<Block>> = HashMap::new();
        {
            let mut stmt = self.conn.prepare(
                "SELECT page_id, id, type, content, checked, schedule, last_edited_at, metadata,
                        link_page_id, link_block_id, link_kind, link_created_at, link_updated_at
                 FROM blocks
                 ORDER BY page_id ASC, sort_order ASC",
            )?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let page_id: String = row.get(0)?;
                let block = block_from_row(row)?;
                blocks_by_page.entry(page_id).or_default().push(block);
            }
        }

        let mut pages = Vec::new();
        let mut stmt = self.conn.prepare(
            "SELECT id, title, updated_at, is_deleted, deleted_at
             FROM pages
             ORDER BY updated_at DESC, id ASC",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let deleted_at: Option<i64> = row.get(4)?;
            let mut blocks = blocks_by_page.remove(&id).unwrap_or_default();
            if blocks.is_empty() {
                blocks.push(default_block());
            }
            pages.push(Page {
                id: PageId::from(id),
                title: row.get(1)?,
                blocks,
                updated_at: from_millis(row.get(2)?)?,
                is_deleted: row.get(3)?,
                deleted_at: deleted_at.map(from_millis).transpose()?,
            });
        }

        debug!(pages = pages.len(), "workspace loaded");
        Ok(pages)
    }

    /// Serialized copy of the committed database, as published to the backend.
    pub fn export_blob(&self) -> Result<Vec<u8>, StorageError> {
        self.snapshot()
    }

    fn snapshot(&self) -> Result<Vec<u8>, StorageError> {
        let path = self.scratch.path().join("snapshot.sqlite");
        discard_database(&path);

        let target = path.to_string_lossy().into_owned();
        self.conn.execute("VACUUM INTO ?1", params![target])?;
        let bytes = fs::read(&path)?;
        fs::remove_file(&path)?;
        Ok(bytes)
    }
}

impl<B: BlobStore> DataStore for PageStore<B> {
    fn save(&mut self, pages: &[Page]) -> Result<(), StorageError> {
        PageStore::save(self, pages)
    }

    fn load(&mut self) -> Result<Vec<Page>, StorageError> {
        PageStore::load(self)
    }

    fn export_blob(&mut self) -> Result<Vec<u8>, StorageError> {
        PageStore::export_blob(self)
    }
}

fn install_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS pages (
          id TEXT PRIMARY KEY,
          title TEXT NOT NULL,
          updated_at INTEGER NOT NULL,
          is_deleted INTEGER NOT NULL DEFAULT 0,
          deleted_at INTEGER
        );

        CREATE TABLE IF NOT EXISTS blocks (
          page_id TEXT NOT NULL,
          id TEXT NOT NULL,
          type TEXT NOT NULL,
          content TEXT NOT NULL,
          checked INTEGER,
          schedule TEXT,
          last_edited_at INTEGER,
          metadata TEXT NOT NULL DEFAULT '{}',
          link_page_id TEXT,
          link_block_id TEXT,
          link_kind TEXT,
          link_created_at INTEGER,
          link_updated_at INTEGER,
          sort_order INTEGER NOT NULL,
          PRIMARY KEY(page_id, id),
          FOREIGN KEY(page_id) REFERENCES pages(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_blocks_page_order
          ON blocks(page_id, sort_order);
        "#,
    )?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

/// Writes `bytes` to `path` and checks it is a database this version can read.
fn restore_snapshot(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    fs::write(path, bytes)?;

    let conn = Connection::open(path)?;
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version != SCHEMA_VERSION {
        return Err(StorageError::Backend(format!(
            "unsupported schema version {}",
            version
        )));
    }

    let check: String = conn.query_row("PRAGMA quick_check", [], |row| row.get(0))?;
    if check != "ok" {
        return Err(StorageError::Backend(format!(
            "integrity check failed: {}",
            check
        )));
    }

    conn.query_row("SELECT COUNT(*) FROM pages", [], |row| row.get::<_, i64>(0))?;
    conn.query_row("SELECT COUNT(*) FROM blocks", [], |row| row.get::<_, i64>(0))?;
    Ok(())
}

fn discard_database(path: &Path) {
    for candidate in [path.to_path_buf(), journal_path(path)] {
        if candidate.exists() {
            let _ = fs::remove_file(candidate);
        }
    }
}

fn journal_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push("-journal");
    PathBuf::from(name)
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StorageError::Backend(format!("timestamp out of range: {}", ms)))
}

fn block_from_row(row: &Row<'_>) -> Result<Block, StorageError> {
    let id: String = row.get(1)?;
    let raw_type: String = row.get(2)?;
    let block_type = raw_type.parse::<BlockType>().unwrap_or_else(|_| {
        warn!(block = %id, block_type = %raw_type, "unknown block type, reading as text");
        BlockType::Text
    });

    let schedule = row
        .get::<_, Option<String>>(5)?
        .and_then(|raw| match raw.parse::<Schedule>() {
            Ok(schedule) => Some(schedule),
            Err(e) => {
                warn!(block = %id, "{}", e);
                None
            }
        });

    let raw_metadata: String = row.get(7)?;
    let metadata = match serde_json::from_str::<Map<String, Value>>(&raw_metadata) {
        Ok(bag) => BlockMetadata::from_bag(block_type, bag),
        Err(e) => {
            warn!(block = %id, error = %e, "unreadable block metadata dropped");
            None
        }
    };

    let link_page: Option<String> = row.get(8)?;
    let link_metadata = match link_page {
        Some(page) => {
            let kind = row
                .get::<_, Option<String>>(10)?
                .and_then(|raw| raw.parse::<LinkKind>().ok())
                .unwrap_or(LinkKind::Live);
            let created_at = row
                .get::<_, Option<i64>>(11)?
                .map(from_millis)
                .transpose()?
                .unwrap_or_else(now);
            let updated_at = row
                .get::<_, Option<i64>>(12)?
                .map(from_millis)
                .transpose()?
                .unwrap_or(created_at);
            Some(LinkMetadata {
                source_page_id: PageId::from(page),
                source_block_id: row.get::<_, Option<String>>(9)?.map(BlockId::from),
                kind,
                created_at,
                updated_at,
            })
        }
        None => None,
    };

    Ok(Block {
        id: BlockId::from(id),
        block_type,
        content: row.get(3)?,
        checked: row.get(4)?,
        schedule,
        last_edited_at: row.get::<_, Option<i64>>(6)?.map(from_millis).transpose()?,
        metadata,
        link_metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CodeMetadata, TimerMetadata, TimerState};
    use crate::store::mem_backend::MemBackend;
    use chrono::Duration;

    fn page(title: &str, blocks: Vec<Block>, age_secs: i64) -> Page {
        Page {
            id: PageId::new(),
            title: title.to_string(),
            blocks,
            updated_at: now() - Duration::seconds(age_secs),
            is_deleted: false,
            deleted_at: None,
        }
    }

    #[test]
    fn empty_backend_loads_nothing() {
        let store = PageStore::open(MemBackend::new()).unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    struct UnreadableBackend;

    impl BlobStore for UnreadableBackend {
        fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StorageError> {
            Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "blob is not readable",
            )))
        }

        fn put(&self, _key: &str, _bytes: &[u8]) -> Result<(), StorageError> {
            Ok(())
        }
    }

    #[test]
    fn unreadable_backend_opens_empty_schema() {
        let mut store = PageStore::open(UnreadableBackend).unwrap();
        assert!(store.load().unwrap().is_empty());

        store.save(&[page("A", vec![Block::text("a")], 0)]).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn save_publishes_blob_under_fixed_key() {
        let backend = MemBackend::new();
        let mut store = PageStore::open(backend.clone()).unwrap();
        store.save(&[page("A", vec![Block::text("a")], 0)]).unwrap();
        assert!(backend.contains(BLOB_KEY));
    }

    #[test]
    fn round_trip_through_blob_preserves_pages_and_order() {
        let backend = MemBackend::new();
        let first = page(
            "Older",
            vec![
                Block::new(BlockType::Heading, "H"),
                Block::text("one"),
                Block::text("two"),
            ],
            60,
        );
        let second = page("Newer", vec![Block::text("only")], 0);

        {
            let mut store = PageStore::open(backend.clone()).unwrap();
            store.save(&[first.clone(), second.clone()]).unwrap();
        }

        let reopened = PageStore::open(backend).unwrap();
        let loaded = reopened.load().unwrap();
        assert_eq!(loaded, vec![second, first]);
    }

    #[test]
    fn save_is_a_full_rewrite() {
        let backend = MemBackend::new();
        let mut store = PageStore::open(backend).unwrap();
        let a = page("A", vec![Block::text("a")], 0);
        let b = page("B", vec![Block::text("b")], 0);

        store.save(&[a.clone(), b]).unwrap();
        store.save(&[a.clone()]).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, a.id);
    }

    #[test]
    fn metadata_link_and_schedule_survive() {
        let target = PageId::new();
        let mut todo = Block::new(BlockType::Todo, "ship");
        todo.checked = Some(true);
        todo.schedule = Some(Schedule::Week);
        let code = Block::new(BlockType::Code, "fn main() {}").with_metadata(BlockMetadata::Code(
            CodeMetadata {
                language: "rust".into(),
            },
        ));
        let timer = Block::new(BlockType::Timer, "").with_metadata(BlockMetadata::Timer(
            TimerMetadata {
                state: TimerState::Stopped,
                last_start: None,
            },
        ));
        let embed = Block::new(BlockType::Embed, "Ref: Other").with_link(LinkMetadata::new(
            target,
            Some(BlockId::from("b9")),
            LinkKind::Live,
        ));
        let original = page("Mixed", vec![todo, code, timer, embed], 0);

        let mut store = PageStore::open(MemBackend::new()).unwrap();
        store.save(std::slice::from_ref(&original)).unwrap();
        assert_eq!(store.load().unwrap(), vec![original]);
    }

    #[test]
    fn structured_content_is_preserved_byte_for_byte() {
        let payload = "{\"columns\":[ {\"id\":\"c1\"} ],\n\"rows\":[]}\t";
        let original = page("Board", vec![Block::new(BlockType::Kanban, payload)], 0);

        let mut store = PageStore::open(MemBackend::new()).unwrap();
        store.save(std::slice::from_ref(&original)).unwrap();
        assert_eq!(store.load().unwrap()[0].blocks[0].content, payload);
    }

    #[test]
    fn missing_metadata_is_stored_as_empty_object() {
        let mut store = PageStore::open(MemBackend::new()).unwrap();
        store.save(&[page("A", vec![Block::text("a")], 0)]).unwrap();

        let raw: String = store
            .conn
            .query_row("SELECT metadata FROM blocks", [], |row| row.get(0))
            .unwrap();
        assert_eq!(raw, "{}");
    }

    #[test]
    fn sort_order_column_decides_block_order() {
        let mut store = PageStore::open(MemBackend::new()).unwrap();
        let original = page(
            "A",
            vec![Block::text("x").with_id("z"), Block::text("y").with_id("a")],
            0,
        );
        store.save(&[original]).unwrap();

        let orders: Vec<(String, i64)> = {
            let mut stmt = store
                .conn
                .prepare("SELECT id, sort_order FROM blocks ORDER BY sort_order")
                .unwrap();
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
                .unwrap();
            let collected: Vec<(String, i64)> = rows.map(|r| r.unwrap()).collect();
            collected
        };
        assert_eq!(orders, vec![("z".to_string(), 0), ("a".to_string(), 1)]);
        let ids: Vec<_> = store.load().unwrap()[0]
            .blocks
            .iter()
            .map(|b| b.id.to_string())
            .collect();
        assert_eq!(ids, vec!["z", "a"]);
    }

    #[test]
    fn corrupt_blob_falls_back_to_empty_schema() {
        let backend = MemBackend::new();
        backend.insert_raw(BLOB_KEY, b"definitely not sqlite".to_vec());

        let mut store = PageStore::open(backend).unwrap();
        assert!(store.load().unwrap().is_empty());
        store.save(&[page("A", vec![Block::text("a")], 0)]).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn failed_put_is_reported() {
        let backend = MemBackend::new();
        let mut store = PageStore::open(backend.clone()).unwrap();
        backend.set_simulate_write_error(true);

        let err = store.save(&[page("A", vec![Block::text("a")], 0)]);
        assert!(matches!(err, Err(StorageError::Backend(_))));

        backend.set_simulate_write_error(false);
        store.save(&[page("A", vec![Block::text("a")], 0)]).unwrap();
        assert!(backend.contains(BLOB_KEY));
    }

    #[test]
    fn deletion_flags_round_trip() {
        let mut deleted = page("Gone", vec![Block::text("x")], 0);
        deleted.is_deleted = true;
        deleted.deleted_at = Some(now());

        let mut store = PageStore::open(MemBackend::new()).unwrap();
        store.save(std::slice::from_ref(&deleted)).unwrap();
        assert_eq!(store.load().unwrap(), vec![deleted]);
    }

    #[test]
    fn export_matches_published_blob() {
        let backend = MemBackend::new();
        let mut store = PageStore::open(backend.clone()).unwrap();
        store.save(&[page("A", vec![Block::text("a")], 0)]).unwrap();

        let exported = store.export_blob().unwrap();
        let other = MemBackend::new();
        other.insert_raw(BLOB_KEY, exported);
        assert_eq!(PageStore::open(other).unwrap().load().unwrap().len(), 1);
    }
}
