//! # Document Operations
//!
//! Pure transformations over [`Page`]s. Every function takes the current value
//! and returns a new one; committing the result and persisting it is the
//! caller's job (see [`Workspace`](crate::workspace::Workspace)).
//!
//! ## Invariants Kept By Construction
//!
//! - A page always has at least one block. Removing the last block synthesizes
//!   an empty text block.
//! - Block ids are unique within a page. A block inserted with an id already
//!   present on the page is given a fresh id.
//! - Every structural or content change stamps the page's `updated_at`.
//!
//! None of these functions fail. Operations naming a block that is not on the
//! page leave the blocks untouched.

use crate::model::{
    now, Block, BlockId, BlockMetadata, BlockType, LinkMetadata, Page, PageId, Schedule,
};
use chrono::{DateTime, Utc};

/// The empty text block a page falls back to.
pub fn default_block() -> Block {
    Block::text("")
}

pub fn create_page(title: impl Into<String>, initial_blocks: Option<Vec<Block>>) -> Page {
    let mut blocks = initial_blocks.unwrap_or_default();
    if blocks.is_empty() {
        blocks.push(default_block());
    }
    Page {
        id: PageId::new(),
        title: title.into(),
        blocks: dedupe_ids(blocks),
        updated_at: now(),
        is_deleted: false,
        deleted_at: None,
    }
}

pub fn create_block(block_type: BlockType, content: impl Into<String>) -> Block {
    Block::new(block_type, content)
}

/// Inserts `block` right after `after`.
///
/// `None` inserts at the top of the page. An `after` id that is not on the page
/// appends at the end.
pub fn insert_block(page: &Page, after: Option<&BlockId>, block: Block) -> Page {
    let mut next = page.clone();
    let block = with_unique_id(&next, block);

    let index = match after {
        None => 0,
        Some(id) => next
            .block_position(id)
            .map(|pos| pos + 1)
            .unwrap_or(next.blocks.len()),
    };
    next.blocks.insert(index, block);
    touch(next)
}

pub fn remove_block(page: &Page, block_id: &BlockId) -> Page {
    let mut next = page.clone();
    let before = next.blocks.len();
    next.blocks.retain(|b| &b.id != block_id);
    if next.blocks.len() == before {
        return next;
    }
    if next.blocks.is_empty() {
        next.blocks.push(default_block());
    }
    touch(next)
}

/// Moves `block_id` so it sits directly before `before`; `None` moves it to the end.
pub fn reorder_block(page: &Page, block_id: &BlockId, before: Option<&BlockId>) -> Page {
    if before == Some(block_id) {
        return page.clone();
    }
    let mut next = page.clone();
    let Some(from) = next.block_position(block_id) else {
        return next;
    };
    let block = next.blocks.remove(from);

    let index = before
        .and_then(|id| next.block_position(id))
        .unwrap_or(next.blocks.len());
    next.blocks.insert(index, block);
    touch(next)
}

/// Changes to page-level fields. Unset fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct PagePatch {
    pub title: Option<String>,
    pub blocks: Option<Vec<Block>>,
}

impl PagePatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn blocks(blocks: Vec<Block>) -> Self {
        Self {
            blocks: Some(blocks),
            ..Default::default()
        }
    }
}

pub fn update_page(page: &Page, patch: PagePatch) -> Page {
    let mut next = page.clone();
    if let Some(title) = patch.title {
        next.title = title;
    }
    if let Some(blocks) = patch.blocks {
        next.blocks = if blocks.is_empty() {
            vec![default_block()]
        } else {
            dedupe_ids(blocks)
        };
    }
    touch(next)
}

/// Changes to one block. Outer `Option` means "leave alone"; for nullable
/// fields the inner `Option` is the new value.
#[derive(Debug, Clone, Default)]
pub struct BlockPatch {
    pub block_type: Option<BlockType>,
    pub content: Option<String>,
    pub checked: Option<Option<bool>>,
    pub schedule: Option<Option<Schedule>>,
    pub metadata: Option<Option<BlockMetadata>>,
    pub link_metadata: Option<Option<LinkMetadata>>,
}

impl BlockPatch {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, block_type: BlockType) -> Self {
        self.block_type = Some(block_type);
        self
    }

    pub fn with_checked(mut self, checked: Option<bool>) -> Self {
        self.checked = Some(checked);
        self
    }

    pub fn with_schedule(mut self, schedule: Option<Schedule>) -> Self {
        self.schedule = Some(schedule);
        self
    }

    pub fn with_metadata(mut self, metadata: Option<BlockMetadata>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_link(mut self, link: Option<LinkMetadata>) -> Self {
        self.link_metadata = Some(link);
        self
    }
}

pub fn update_block(page: &Page, block_id: &BlockId, patch: BlockPatch) -> Page {
    let mut next = page.clone();
    let Some(block) = next.blocks.iter_mut().find(|b| &b.id == block_id) else {
        return next;
    };

    let stamp = now();
    if let Some(block_type) = patch.block_type {
        block.block_type = block_type;
    }
    if let Some(content) = patch.content {
        block.content = content;
    }
    if let Some(checked) = patch.checked {
        block.checked = checked;
    }
    if let Some(schedule) = patch.schedule {
        block.schedule = schedule;
    }
    if let Some(metadata) = patch.metadata {
        block.metadata = metadata;
    }
    if let Some(link) = patch.link_metadata {
        block.link_metadata = link;
    }
    block.last_edited_at = Some(stamp);

    next.updated_at = stamp;
    next
}

/// Moves a block between pages: removal from `from`, insertion into `to` after
/// `after`. Returns the new `(from, to)` pair, unchanged if the block is not on
/// `from`.
pub fn move_block(
    from: &Page,
    block_id: &BlockId,
    to: &Page,
    after: Option<&BlockId>,
) -> (Page, Page) {
    let Some(block) = from.block(block_id).cloned() else {
        return (from.clone(), to.clone());
    };
    (remove_block(from, block_id), insert_block(to, after, block))
}

fn touch(mut page: Page) -> Page {
    page.updated_at = now();
    page
}

fn with_unique_id(page: &Page, mut block: Block) -> Block {
    if page.block(&block.id).is_some() {
        block.id = BlockId::new();
    }
    block
}

fn dedupe_ids(blocks: Vec<Block>) -> Vec<Block> {
    let mut seen = std::collections::HashSet::new();
    blocks
        .into_iter()
        .map(|mut block| {
            if !seen.insert(block.id.clone()) {
                block.id = BlockId::new();
                seen.insert(block.id.clone());
            }
            block
        })
        .collect()
}

/// Most recent of a page's own timestamp and its blocks' edit times.
pub fn last_modified(page: &Page) -> DateTime<Utc> {
    page.blocks
        .iter()
        .filter_map(|b| b.last_edited_at)
        .fold(page.updated_at, |latest, t| latest.max(t))
}
