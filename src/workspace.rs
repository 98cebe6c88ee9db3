//! # Workspace Facade
//!
//! [`Workspace`] is the single entry point for folio operations, whatever the UI.
//! It owns the active page list, the store and the recovery buffer, and routes
//! every change through the pure functions in [`document`](crate::document).
//!
//! ## Control Flow
//!
//! ```text
//!  caller ──mutation──▶ Workspace ──document::*──▶ new Page ──commit──▶ DataStore::save(all pages)
//!     │                     │
//!     └──query──▶ links::* / tabular::query (read-only, never persists)
//! ```
//!
//! Every mutation:
//! 1. drops the recovery slot if its deadline has passed,
//! 2. applies the change,
//! 3. bumps the workspace version (invalidating the memoized link index),
//! 4. saves the complete model.
//!
//! ## Save Failures
//!
//! A failed save never undoes the change. It is logged, kept in
//! [`Workspace::last_save_error`], and the next mutation saves everything again.
//!
//! ## Page Order
//!
//! `pages()` is the working order: new pages go first, restored pages go back
//! to where they were. [`Workspace::pages_by_recency`] orders by `updated_at`,
//! which is also the order a reopened workspace starts in.
//!
//! ## Generic Over DataStore
//!
//! - Production: `Workspace<Autosaver>` or `Workspace<PageStore<FsBackend>>`
//! - Testing: `Workspace<PageStore<MemBackend>>`

use crate::clock::{Clock, SystemClock};
use crate::config::FolioConfig;
use crate::document::{self, BlockPatch, PagePatch};
use crate::error::{FolioError, Result, StorageError};
use crate::links::{self, DanglingLink, LinkIndex, LinkTarget};
use crate::model::{
    Block, BlockId, BlockType, LinkKind, LinkMetadata, Page, PageId,
};
use crate::recovery::{PendingDeletion, RecoveryBuffer};
use crate::store::DataStore;
use crate::tabular::{export, Column, TabularData, ViewConfig};
use chrono::{DateTime, Utc};
use std::cell::RefCell;
use tracing::{debug, info, warn};

pub const WELCOME_HEADING: &str = "Begin your journey";
pub const WELCOME_TEXT: &str = "Focus your thoughts here.";

/// What deleting a page would affect, for a confirmation prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletePreview {
    pub page_id: PageId,
    pub title: String,
    pub block_count: usize,
    /// Blocks in other pages that will be left pointing at nothing.
    pub linked_block_count: usize,
    pub linking_pages: Vec<PageId>,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOutcome {
    pub deleted: PageId,
    pub linked_block_count: usize,
    /// A page that was waiting for undo and is now gone for good.
    pub evicted: Option<PageId>,
    /// Set when the deleted page was the last one and a fresh page replaced it.
    pub replacement: Option<PageId>,
}

pub struct Workspace<S: DataStore> {
    pages: Vec<Page>,
    store: S,
    recovery: RecoveryBuffer,
    clock: Box<dyn Clock>,
    config: FolioConfig,
    version: u64,
    link_index: RefCell<Option<LinkIndex>>,
    save_error: Option<StorageError>,
}

impl<S: DataStore> Workspace<S> {
    /// Loads the workspace from `store`.
    ///
    /// An unreadable store or an empty one yields a single welcome page. Pages
    /// left flagged deleted by an earlier session are dropped: their recovery
    /// window cannot outlive that session.
    pub fn open(store: S, config: FolioConfig) -> Self {
        Self::open_with_clock(store, config, Box::new(SystemClock))
    }

    pub fn open_with_clock(mut store: S, config: FolioConfig, clock: Box<dyn Clock>) -> Self {
        let loaded = match store.load() {
            Ok(pages) => pages,
            Err(e) => {
                warn!(error = %e, "failed to load workspace, starting empty");
                Vec::new()
            }
        };

        let total = loaded.len();
        let pages: Vec<Page> = loaded.into_iter().filter(|p| !p.is_deleted).collect();
        let mut dirty = pages.len() != total;
        if dirty {
            info!(dropped = total - pages.len(), "discarded pages deleted in an earlier session");
        }

        let mut workspace = Self {
            pages,
            store,
            recovery: RecoveryBuffer::new(config.recovery_window()),
            clock,
            config,
            version: 0,
            link_index: RefCell::new(None),
            save_error: None,
        };

        if workspace.pages.is_empty() {
            let page = workspace.welcome_page();
            info!(page = %page.id, "bootstrapped first page");
            workspace.pages.push(page);
            dirty = true;
        }
        if dirty {
            workspace.commit();
        }
        workspace
    }

    pub fn config(&self) -> &FolioConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Bumped by every mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    // --- Queries ---

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, id: &PageId) -> Result<&Page> {
        self.pages
            .iter()
            .find(|p| &p.id == id)
            .ok_or_else(|| FolioError::PageNotFound(id.clone()))
    }

    pub fn block(&self, page_id: &PageId, block_id: &BlockId) -> Result<&Block> {
        self.page(page_id)?
            .block(block_id)
            .ok_or_else(|| FolioError::BlockNotFound {
                page: page_id.clone(),
                block: block_id.clone(),
            })
    }

    /// Pages ordered by `updated_at`, newest first.
    pub fn pages_by_recency(&self) -> Vec<&Page> {
        let mut pages: Vec<&Page> = self.pages.iter().collect();
        pages.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        pages
    }

    pub fn most_recent(&self) -> Option<&Page> {
        self.pages.iter().max_by_key(|p| p.updated_at)
    }

    /// Resolves a user-facing page reference: a 1-based position in
    /// [`pages_by_recency`](Self::pages_by_recency), or a page id.
    pub fn select_page(&self, selector: &str) -> Result<PageId> {
        let selector = selector.trim();
        if let Ok(n) = selector.parse::<usize>() {
            return n
                .checked_sub(1)
                .and_then(|i| self.pages_by_recency().get(i).map(|p| p.id.clone()))
                .ok_or_else(|| FolioError::PageNotFound(PageId::from(selector)));
        }
        let id = PageId::from(selector);
        self.page(&id).map(|p| p.id.clone())
    }

    /// Resolves a block reference within a page: a 1-based position or a
    /// block id.
    pub fn select_block(&self, page_id: &PageId, selector: &str) -> Result<BlockId> {
        let page = self.page(page_id)?;
        let selector = selector.trim();
        let found = match selector.parse::<usize>() {
            Ok(n) => n.checked_sub(1).and_then(|i| page.blocks.get(i)),
            Err(_) => page.block(&BlockId::from(selector)),
        };
        found
            .map(|b| b.id.clone())
            .ok_or_else(|| FolioError::BlockNotFound {
                page: page_id.clone(),
                block: BlockId::from(selector),
            })
    }

    // --- Pages and blocks ---

    pub fn create_page(&mut self, title: impl Into<String>) -> PageId {
        self.create_page_with(title, None)
    }

    /// Adds a page at the top of the working order.
    pub fn create_page_with(
        &mut self,
        title: impl Into<String>,
        blocks: Option<Vec<Block>>,
    ) -> PageId {
        self.reap();
        let page = document::create_page(title, blocks);
        let id = page.id.clone();
        debug!(page = %id, "page created");
        self.pages.insert(0, page);
        self.commit();
        id
    }

    pub fn rename_page(&mut self, id: &PageId, title: impl Into<String>) -> Result<()> {
        self.update_page(id, PagePatch::title(title))
    }

    pub fn update_page(&mut self, id: &PageId, patch: PagePatch) -> Result<()> {
        self.apply(id, |page| document::update_page(page, patch))
    }

    /// Inserts `block` after `after` (`None`: at the top) and returns the id it
    /// ended up with.
    pub fn insert_block(
        &mut self,
        page_id: &PageId,
        after: Option<&BlockId>,
        mut block: Block,
    ) -> Result<BlockId> {
        if self.page(page_id)?.block(&block.id).is_some() {
            block.id = BlockId::new();
        }
        let id = block.id.clone();
        self.apply(page_id, |page| document::insert_block(page, after, block))?;
        Ok(id)
    }

    /// Appends `block` at the end of the page and returns its id.
    pub fn append_block(&mut self, page_id: &PageId, block: Block) -> Result<BlockId> {
        let last = self.page(page_id)?.blocks.last().map(|b| b.id.clone());
        self.insert_block(page_id, last.as_ref(), block)
    }

    pub fn update_block(
        &mut self,
        page_id: &PageId,
        block_id: &BlockId,
        patch: BlockPatch,
    ) -> Result<()> {
        self.block(page_id, block_id)?;
        self.apply(page_id, |page| document::update_block(page, block_id, patch))
    }

    pub fn remove_block(&mut self, page_id: &PageId, block_id: &BlockId) -> Result<()> {
        self.block(page_id, block_id)?;
        self.apply(page_id, |page| document::remove_block(page, block_id))
    }

    pub fn reorder_block(
        &mut self,
        page_id: &PageId,
        block_id: &BlockId,
        before: Option<&BlockId>,
    ) -> Result<()> {
        self.block(page_id, block_id)?;
        self.apply(page_id, |page| document::reorder_block(page, block_id, before))
    }

    /// Moves a block to another page (or elsewhere on the same page). Returns
    /// the id it has on the target page.
    pub fn move_block(
        &mut self,
        from: &PageId,
        block_id: &BlockId,
        to: &PageId,
        after: Option<&BlockId>,
    ) -> Result<BlockId> {
        let mut block = self.block(from, block_id)?.clone();
        let target = self.page(to)?;
        if from != to && target.block(&block.id).is_some() {
            block.id = BlockId::new();
        }
        let new_id = block.id.clone();

        self.reap();
        let from_index = self.index_of(from)?;
        let to_index = self.index_of(to)?;
        if from_index == to_index {
            let removed = document::remove_block(&self.pages[from_index], block_id);
            self.pages[from_index] = document::insert_block(&removed, after, block);
        } else {
            let (source, target) = document::move_block(
                &self.pages[from_index],
                block_id,
                &self.pages[to_index],
                after,
            );
            self.pages[from_index] = source;
            self.pages[to_index] = target;
        }
        self.commit();
        Ok(new_id)
    }

    // --- Links ---

    /// Marks an existing block as referencing `target` (or one of its blocks).
    pub fn link_block(
        &mut self,
        page_id: &PageId,
        block_id: &BlockId,
        target: &PageId,
        target_block: Option<&BlockId>,
        kind: LinkKind,
    ) -> Result<()> {
        self.check_link_target(target, target_block)?;
        let link = LinkMetadata::new(target.clone(), target_block.cloned(), kind);
        self.update_block(page_id, block_id, BlockPatch::default().with_link(Some(link)))
    }

    /// Appends a block referencing `target` and returns its id.
    ///
    /// A live link becomes an embed block titled after the target. A snapshot
    /// copies the target block (or the target page's text) once.
    pub fn insert_link(
        &mut self,
        page_id: &PageId,
        target: &PageId,
        target_block: Option<&BlockId>,
        kind: LinkKind,
    ) -> Result<BlockId> {
        self.page(page_id)?;
        let source = self.check_link_target(target, target_block)?;
        let link = LinkMetadata::new(target.clone(), target_block.cloned(), kind);

        let block = match (kind, source) {
            (LinkKind::Live, _) => {
                let title = self.page(target)?.display_title().to_string();
                Block::new(BlockType::Embed, format!("Ref: {}", title))
            }
            (LinkKind::Snapshot, Some(original)) => {
                let mut copy = original;
                copy.id = BlockId::new();
                copy.link_metadata = None;
                copy
            }
            (LinkKind::Snapshot, None) => {
                let page = self.page(target)?;
                let text = page.plain_text();
                if text.is_empty() {
                    Block::text(format!("Ref: {}", page.display_title()))
                } else {
                    Block::text(text)
                }
            }
        };

        self.append_block(page_id, block.with_link(link))
    }

    pub fn unlink_block(&mut self, page_id: &PageId, block_id: &BlockId) -> Result<()> {
        self.update_block(page_id, block_id, BlockPatch::default().with_link(None))
    }

    pub fn outbound_links(&self, page_id: &PageId) -> Result<Vec<&Page>> {
        let page = self.page(page_id)?;
        Ok(links::outbound_links(&self.pages, page))
    }

    /// Other pages linking to `page_id`. The page itself need not exist.
    pub fn inbound_links(&self, page_id: &PageId) -> Vec<&Page> {
        let ids = self.with_link_index(|index| index.inbound_page_ids(page_id));
        ids.iter()
            .filter_map(|id| self.pages.iter().find(|p| &p.id == id))
            .collect()
    }

    pub fn linked_block_count(&self, page_id: &PageId) -> usize {
        self.with_link_index(|index| index.linked_block_count(page_id))
    }

    pub fn resolve_link<'a>(&'a self, link: &LinkMetadata) -> LinkTarget<'a> {
        links::resolve(&self.pages, link)
    }

    pub fn dangling_links(&self) -> Vec<DanglingLink> {
        links::dangling_links(&self.pages)
    }

    // --- Tables ---

    /// Inserts an empty database block with `columns` and returns its id.
    pub fn insert_table(
        &mut self,
        page_id: &PageId,
        after: Option<&BlockId>,
        columns: Vec<Column>,
    ) -> Result<BlockId> {
        let mut data = TabularData {
            view_config: ViewConfig::with_page_size(self.config.table_page_size),
            ..Default::default()
        };
        for column in columns {
            data.add_column(column);
        }
        let block = Block::new(BlockType::Database, data.to_content()?);
        self.insert_block(page_id, after, block)
    }

    /// Parsed payload of a database block.
    pub fn table(&self, page_id: &PageId, block_id: &BlockId) -> Result<TabularData> {
        let block = self.block(page_id, block_id)?;
        if block.block_type != BlockType::Database {
            return Err(FolioError::Validation(format!(
                "block {} is a {} block, not a database",
                block_id, block.block_type
            )));
        }
        Ok(TabularData::from_content(&block.content)?)
    }

    /// Runs `edit` on a database block's payload and writes the result back.
    pub fn edit_table<R>(
        &mut self,
        page_id: &PageId,
        block_id: &BlockId,
        edit: impl FnOnce(&mut TabularData) -> R,
    ) -> Result<R> {
        let mut data = self.table(page_id, block_id)?;
        let result = edit(&mut data);
        let content = data.to_content()?;
        self.update_block(page_id, block_id, BlockPatch::content(content))?;
        Ok(result)
    }

    pub fn export_table_csv(&self, page_id: &PageId, block_id: &BlockId) -> Result<String> {
        Ok(export::to_csv(&self.table(page_id, block_id)?))
    }

    // --- Deletion and recovery ---

    pub fn delete_preview(&self, page_id: &PageId) -> Result<DeletePreview> {
        let page = self.page(page_id)?;
        Ok(DeletePreview {
            page_id: page.id.clone(),
            title: page.display_title().to_string(),
            block_count: page.blocks.len(),
            linked_block_count: self.linked_block_count(page_id),
            linking_pages: self
                .inbound_links(page_id)
                .into_iter()
                .map(|p| p.id.clone())
                .collect(),
            last_modified: document::last_modified(page),
        })
    }

    /// Moves a page into the recovery buffer.
    ///
    /// Blocks elsewhere that link to it are left alone and become dangling. If
    /// it was the last page a fresh one takes its place.
    pub fn delete_page(&mut self, page_id: &PageId) -> Result<DeleteOutcome> {
        self.reap();
        let index = self.index_of(page_id)?;
        let linked_block_count = self.linked_block_count(page_id);

        let page = self.pages.remove(index);
        let now = self.clock.now();
        let evicted = self.recovery.hold(page, index, now).map(|p| p.id);

        let replacement = if self.pages.is_empty() {
            let page = document::create_page(self.config.default_page_title.clone(), None);
            let id = page.id.clone();
            self.pages.push(page);
            Some(id)
        } else {
            None
        };

        info!(
            page = %page_id,
            index,
            linked_blocks = linked_block_count,
            "page deleted"
        );
        self.commit();

        Ok(DeleteOutcome {
            deleted: page_id.clone(),
            linked_block_count,
            evicted,
            replacement,
        })
    }

    /// Restores the page held for recovery, if its window is still open.
    /// It goes back to its original position, or the end if the list shrank.
    pub fn undo_delete(&mut self) -> Option<PageId> {
        let was_holding = !self.recovery.is_empty();
        let Some((page, index)) = self.recovery.undo(self.clock.now()) else {
            if was_holding {
                // expired and reaped by the undo attempt
                self.commit();
            }
            return None;
        };
        let id = page.id.clone();
        let index = index.min(self.pages.len());
        self.pages.insert(index, page);
        self.commit();
        Some(id)
    }

    /// Drops the held page if its window has elapsed. Returns its id if so.
    pub fn expire_pending(&mut self) -> Option<PageId> {
        let expired = self.recovery.expire(self.clock.now())?;
        self.commit();
        Some(expired.id)
    }

    /// Drops the held page immediately.
    pub fn purge_pending(&mut self) -> Option<PageId> {
        let purged = self.recovery.discard()?;
        self.commit();
        Some(purged.id)
    }

    pub fn pending_deletion(&self) -> Option<&PendingDeletion> {
        self.recovery.pending()
    }

    // --- Persistence ---

    /// Saves now and waits for the store to finish.
    pub fn save(&mut self) -> Result<()> {
        let snapshot = self.snapshot();
        let result = self
            .store
            .save(&snapshot)
            .and_then(|()| self.store.flush());
        match result {
            Ok(()) => {
                self.save_error = None;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn last_save_error(&self) -> Option<&StorageError> {
        self.save_error.as_ref()
    }

    pub fn take_save_error(&mut self) -> Option<StorageError> {
        self.save_error.take()
    }

    /// The durable snapshot bytes, after writing anything still pending.
    pub fn export_blob(&mut self) -> Result<Vec<u8>> {
        self.store.flush()?;
        Ok(self.store.export_blob()?)
    }

    // --- Internals ---

    fn welcome_page(&self) -> Page {
        document::create_page(
            self.config.default_page_title.clone(),
            Some(vec![
                Block::new(BlockType::Heading, WELCOME_HEADING),
                Block::text(WELCOME_TEXT),
            ]),
        )
    }

    fn index_of(&self, id: &PageId) -> Result<usize> {
        self.pages
            .iter()
            .position(|p| &p.id == id)
            .ok_or_else(|| FolioError::PageNotFound(id.clone()))
    }

    fn apply(&mut self, id: &PageId, change: impl FnOnce(&Page) -> Page) -> Result<()> {
        self.reap();
        let index = self.index_of(id)?;
        self.pages[index] = change(&self.pages[index]);
        self.commit();
        Ok(())
    }

    /// Target of a new link: must be an active page. Returns the target block
    /// when one is named.
    fn check_link_target(
        &self,
        target: &PageId,
        target_block: Option<&BlockId>,
    ) -> Result<Option<Block>> {
        let page = self.page(target).map_err(|_| {
            FolioError::Validation(format!("cannot link to missing page {}", target))
        })?;
        match target_block {
            None => Ok(None),
            Some(block_id) => page.block(block_id).cloned().map(Some).ok_or_else(|| {
                FolioError::Validation(format!(
                    "cannot link to missing block {} of page {}",
                    block_id, target
                ))
            }),
        }
    }

    fn with_link_index<R>(&self, f: impl FnOnce(&LinkIndex) -> R) -> R {
        let mut cache = self.link_index.borrow_mut();
        let index = match cache.take() {
            Some(index) if index.version() == self.version => index,
            _ => LinkIndex::build(&self.pages, self.version),
        };
        let result = f(&index);
        *cache = Some(index);
        result
    }

    fn reap(&mut self) {
        if let Some(expired) = self.recovery.expire(self.clock.now()) {
            debug!(page = %expired.id, "expired deletion reaped");
        }
    }

    /// Active pages plus the page awaiting undo, flagged deleted.
    fn snapshot(&self) -> Vec<Page> {
        let mut pages = self.pages.clone();
        if let Some(pending) = self.recovery.pending() {
            pages.push(pending.page.clone());
        }
        pages
    }

    fn commit(&mut self) {
        self.version += 1;
        let snapshot = self.snapshot();
        match self.store.save(&snapshot) {
            Ok(()) => self.save_error = None,
            Err(e) => {
                warn!(error = %e, "save failed, keeping in-memory changes");
                self.save_error = Some(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::model::Schedule;
    use crate::store::{MemBackend, PageStore};
    use crate::tabular::{query::query, CellValue, ChecklistItem, ColumnType};
    use chrono::Duration;

    type TestWorkspace = Workspace<PageStore<MemBackend>>;

    fn workspace() -> (TestWorkspace, ManualClock, MemBackend) {
        let backend = MemBackend::new();
        let clock = ManualClock::default();
        let store = PageStore::open(backend.clone()).unwrap();
        let ws = Workspace::open_with_clock(store, FolioConfig::default(), Box::new(clock.clone()));
        (ws, clock, backend)
    }

    fn reopen(backend: &MemBackend) -> TestWorkspace {
        let store = PageStore::open(backend.clone()).unwrap();
        Workspace::open(store, FolioConfig::default())
    }

    #[test]
    fn empty_store_bootstraps_welcome_page() {
        let (ws, _, backend) = workspace();
        assert_eq!(ws.pages().len(), 1);
        let page = &ws.pages()[0];
        assert_eq!(page.title, "Workspace");
        assert_eq!(page.blocks[0].content, WELCOME_HEADING);
        assert_eq!(page.blocks[0].block_type, BlockType::Heading);

        let again = reopen(&backend);
        assert_eq!(again.pages().len(), 1);
        assert_eq!(again.pages()[0].id, page.id);
    }

    #[test]
    fn new_pages_go_first_and_persist() {
        let (mut ws, _, backend) = workspace();
        let id = ws.create_page("Ideas");
        assert_eq!(ws.pages()[0].id, id);
        assert_eq!(ws.most_recent().unwrap().id, id);

        let again = reopen(&backend);
        assert_eq!(again.pages().len(), 2);
        assert_eq!(again.pages()[0].title, "Ideas");
    }

    #[test]
    fn block_edits_round_trip_through_store() {
        let (mut ws, _, backend) = workspace();
        let page = ws.create_page("Tasks");
        let first = ws.pages()[0].blocks[0].id.clone();

        let todo = ws
            .insert_block(&page, Some(&first), Block::new(BlockType::Todo, "write"))
            .unwrap();
        ws.update_block(
            &page,
            &todo,
            BlockPatch::default()
                .with_checked(Some(true))
                .with_schedule(Some(Schedule::Today)),
        )
        .unwrap();
        ws.reorder_block(&page, &todo, Some(&first)).unwrap();

        let again = reopen(&backend);
        let loaded = again.page(&page).unwrap();
        assert_eq!(loaded.blocks[0].id, todo);
        assert_eq!(loaded.blocks[0].checked, Some(true));
        assert_eq!(loaded.blocks[0].schedule, Some(Schedule::Today));
        assert_eq!(loaded.blocks[1].id, first);
    }

    #[test]
    fn unknown_ids_are_reported() {
        let (mut ws, _, _) = workspace();
        let ghost = PageId::from("ghost");
        assert!(matches!(
            ws.rename_page(&ghost, "x"),
            Err(FolioError::PageNotFound(_))
        ));

        let page = ws.pages()[0].id.clone();
        assert!(matches!(
            ws.remove_block(&page, &BlockId::from("ghost")),
            Err(FolioError::BlockNotFound { .. })
        ));
    }

    #[test]
    fn select_page_by_position_or_id() {
        let (mut ws, clock, _) = workspace();
        clock.advance(Duration::seconds(1));
        let newer = ws.create_page("Newer");

        assert_eq!(ws.select_page("1").unwrap(), newer);
        assert_eq!(ws.select_page(newer.as_str()).unwrap(), newer);
        assert!(ws.select_page("0").is_err());
        assert!(ws.select_page("9").is_err());
    }

    #[test]
    fn select_block_by_position_or_id() {
        let (mut ws, _, _) = workspace();
        let page = ws.create_page_with(
            "P",
            Some(vec![Block::text("a").with_id("a"), Block::text("b").with_id("b")]),
        );
        assert_eq!(ws.select_block(&page, "2").unwrap().as_str(), "b");
        assert_eq!(ws.select_block(&page, "a").unwrap().as_str(), "a");
        assert!(matches!(
            ws.select_block(&page, "3"),
            Err(FolioError::BlockNotFound { .. })
        ));
    }

    #[test]
    fn delete_then_undo_restores_original_index() {
        let (mut ws, clock, _) = workspace();
        ws.create_page("B");
        ws.create_page("A");
        let order: Vec<PageId> = ws.pages().iter().map(|p| p.id.clone()).collect();

        let outcome = ws.delete_page(&order[1]).unwrap();
        assert_eq!(outcome.deleted, order[1]);
        assert!(ws.page(&order[1]).is_err());
        assert!(ws.pending_deletion().is_some());

        clock.advance(Duration::seconds(9));
        assert_eq!(ws.undo_delete(), Some(order[1].clone()));
        let restored: Vec<PageId> = ws.pages().iter().map(|p| p.id.clone()).collect();
        assert_eq!(restored, order);
        assert!(!ws.page(&order[1]).unwrap().is_deleted);
    }

    #[test]
    fn undo_after_window_is_a_no_op() {
        let (mut ws, clock, _) = workspace();
        let id = ws.create_page("Doomed");
        ws.delete_page(&id).unwrap();

        clock.advance(Duration::seconds(10));
        assert_eq!(ws.undo_delete(), None);
        assert!(ws.page(&id).is_err());
        assert!(ws.pending_deletion().is_none());
    }

    #[test]
    fn second_delete_discards_first_for_good() {
        let (mut ws, _, _) = workspace();
        let a = ws.create_page("A");
        let b = ws.create_page("B");

        ws.delete_page(&a).unwrap();
        let outcome = ws.delete_page(&b).unwrap();
        assert_eq!(outcome.evicted, Some(a.clone()));

        assert_eq!(ws.undo_delete(), Some(b));
        assert_eq!(ws.undo_delete(), None);
        assert!(ws.page(&a).is_err());
    }

    #[test]
    fn deleting_only_page_leaves_exactly_one() {
        let (mut ws, _, _) = workspace();
        let only = ws.pages()[0].id.clone();

        let outcome = ws.delete_page(&only).unwrap();
        assert_eq!(ws.pages().len(), 1);
        let replacement = outcome.replacement.unwrap();
        assert_eq!(ws.pages()[0].id, replacement);
        assert_eq!(ws.pages()[0].title, "Workspace");

        assert_eq!(ws.undo_delete(), Some(only.clone()));
        assert_eq!(ws.pages().len(), 2);
        assert_eq!(ws.pages()[0].id, only);
    }

    #[test]
    fn pending_page_is_persisted_flagged_and_dropped_on_reopen() {
        let (mut ws, _, backend) = workspace();
        let id = ws.create_page("Doomed");
        ws.delete_page(&id).unwrap();

        let raw = PageStore::open(backend.clone()).unwrap().load().unwrap();
        assert!(raw.iter().any(|p| p.id == id && p.is_deleted && p.deleted_at.is_some()));

        let again = reopen(&backend);
        assert!(again.page(&id).is_err());
        let raw = PageStore::open(backend).unwrap().load().unwrap();
        assert!(raw.iter().all(|p| p.id != id));
    }

    #[test]
    fn live_link_lifecycle_and_dangling_target() {
        let (mut ws, _, _) = workspace();
        let target = ws.create_page("Target");
        let source = ws.create_page("Source");

        let block = ws.insert_link(&source, &target, None, LinkKind::Live).unwrap();
        let inserted = ws.block(&source, &block).unwrap().clone();
        assert_eq!(inserted.block_type, BlockType::Embed);
        assert_eq!(inserted.content, "Ref: Target");

        let inbound: Vec<_> = ws.inbound_links(&target).iter().map(|p| p.id.clone()).collect();
        assert_eq!(inbound, vec![source.clone()]);
        assert_eq!(ws.linked_block_count(&target), 1);

        let preview = ws.delete_preview(&target).unwrap();
        assert_eq!(preview.linked_block_count, 1);
        assert_eq!(preview.linking_pages, vec![source.clone()]);

        let outcome = ws.delete_page(&target).unwrap();
        assert_eq!(outcome.linked_block_count, 1);
        let still_there = ws.block(&source, &block).unwrap();
        let link = still_there.link_metadata.clone().unwrap();
        assert_eq!(ws.resolve_link(&link), LinkTarget::Missing);
        assert_eq!(ws.dangling_links().len(), 1);

        ws.undo_delete();
        assert!(ws.dangling_links().is_empty());
    }

    #[test]
    fn unlinking_removes_inbound_immediately() {
        let (mut ws, _, _) = workspace();
        let target = ws.create_page("Target");
        let source = ws.create_page("Source");
        let block = ws.pages()[0].blocks[0].id.clone();

        ws.link_block(&source, &block, &target, None, LinkKind::Live)
            .unwrap();
        assert_eq!(ws.inbound_links(&target).len(), 1);

        ws.unlink_block(&source, &block).unwrap();
        assert!(ws.inbound_links(&target).is_empty());

        ws.link_block(&source, &block, &target, None, LinkKind::Live)
            .unwrap();
        ws.remove_block(&source, &block).unwrap();
        assert!(ws.inbound_links(&target).is_empty());
    }

    #[test]
    fn snapshot_link_copies_target_block() {
        let (mut ws, _, _) = workspace();
        let target = ws.create_page_with(
            "Target",
            Some(vec![Block::new(BlockType::Quote, "original").with_id("q")]),
        );
        let source = ws.create_page("Source");

        let copy = ws
            .insert_link(&source, &target, Some(&BlockId::from("q")), LinkKind::Snapshot)
            .unwrap();
        ws.update_block(&target, &BlockId::from("q"), BlockPatch::content("changed"))
            .unwrap();

        let block = ws.block(&source, &copy).unwrap();
        assert_eq!(block.block_type, BlockType::Quote);
        assert_eq!(block.content, "original");
        assert_eq!(block.link_metadata.as_ref().unwrap().kind, LinkKind::Snapshot);
    }

    #[test]
    fn links_to_missing_targets_are_rejected() {
        let (mut ws, _, _) = workspace();
        let source = ws.pages()[0].id.clone();
        let ghost = PageId::from("ghost");

        assert!(matches!(
            ws.insert_link(&source, &ghost, None, LinkKind::Live),
            Err(FolioError::Validation(_))
        ));

        let target = ws.create_page("Target");
        assert!(matches!(
            ws.insert_link(&source, &target, Some(&BlockId::from("nope")), LinkKind::Live),
            Err(FolioError::Validation(_))
        ));

        ws.delete_page(&target).unwrap();
        assert!(matches!(
            ws.insert_link(&source, &target, None, LinkKind::Live),
            Err(FolioError::Validation(_))
        ));
    }

    #[test]
    fn move_block_between_pages_keeps_id() {
        let (mut ws, _, _) = workspace();
        let from = ws.create_page_with("From", Some(vec![Block::text("m").with_id("m")]));
        let to = ws.create_page("To");

        let id = ws.move_block(&from, &BlockId::from("m"), &to, None).unwrap();
        assert_eq!(id.as_str(), "m");
        assert_eq!(ws.page(&to).unwrap().blocks[0].id, id);
        assert!(ws.page(&from).unwrap().block(&id).is_none());
        assert_eq!(ws.page(&from).unwrap().blocks.len(), 1);
    }

    #[test]
    fn table_edits_persist_and_derive_progress() {
        let (mut ws, _, backend) = workspace();
        let page = ws.create_page("Tracker");
        let table = ws
            .insert_table(
                &page,
                None,
                vec![
                    Column::new("title", "Title", ColumnType::Text),
                    Column::new("done", "Done", ColumnType::Checklist),
                ],
            )
            .unwrap();

        let row = ws.edit_table(&page, &table, |t| t.add_row()).unwrap();
        let items = CellValue::Checklist(vec![
            ChecklistItem::new("a", "one", true),
            ChecklistItem::new("b", "two", false),
        ]);
        ws.edit_table(&page, &table, |t| t.set_cell(&row, "done", items))
            .unwrap();
        ws.edit_table(&page, &table, |t| {
            t.add_column(Column::new("progress", "Progress", ColumnType::Progress))
        })
        .unwrap();

        let again = reopen(&backend);
        let data = again.table(&page, &table).unwrap();
        let view = query(&data);
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].get("progress").and_then(CellValue::as_f64), Some(50.0));
    }

    #[test]
    fn table_ops_on_other_blocks_are_rejected() {
        let (mut ws, _, _) = workspace();
        let page = ws.pages()[0].id.clone();
        let heading = ws.pages()[0].blocks[0].id.clone();
        assert!(matches!(
            ws.edit_table(&page, &heading, |t| t.add_row()),
            Err(FolioError::Validation(_))
        ));
    }

    #[test]
    fn failed_save_keeps_state_and_retries() {
        let (mut ws, _, backend) = workspace();
        backend.set_simulate_write_error(true);

        let id = ws.create_page("Unsaved");
        assert!(ws.last_save_error().is_some());
        assert!(ws.page(&id).is_ok());

        backend.set_simulate_write_error(false);
        ws.rename_page(&id, "Saved").unwrap();
        assert!(ws.last_save_error().is_none());

        let again = reopen(&backend);
        assert_eq!(again.page(&id).unwrap().title, "Saved");
    }

    #[test]
    fn link_index_follows_version() {
        let (mut ws, _, _) = workspace();
        let target = ws.create_page("Target");
        let source = ws.create_page("Source");
        assert_eq!(ws.linked_block_count(&target), 0);

        let v = ws.version();
        ws.insert_link(&source, &target, None, LinkKind::Live).unwrap();
        assert!(ws.version() > v);
        assert_eq!(ws.linked_block_count(&target), 1);
    }
}
