//! # Domain Model: Pages, Blocks and Links
//!
//! This module defines the core data structures for folio: [`Page`], [`Block`],
//! [`LinkMetadata`] and the per-type [`BlockMetadata`] union.
//!
//! ## Pages and Blocks
//!
//! A [`Page`] is an ordered list of [`Block`]s. The order is meaningful (it is the
//! render order) and survives persistence untouched. Block ids are only unique
//! within their owning page; a block never belongs to two pages at once.
//!
//! ```text
//! Page "Roadmap"
//! ├── heading   "Q3"
//! ├── database  {"columns": [...], "rows": [...]}   <-- structured payload in `content`
//! └── embed     "Ref: Backlog"  --link--> Page "Backlog" (live)
//! ```
//!
//! ## Block Payloads
//!
//! `content` is always a string. For structured block types (kanban, database,
//! mindmap, project board) it is itself a serialized document owned by whoever
//! renders that block type; the core never interprets it except for the
//! tabular engine working on `database` blocks.
//!
//! ## Metadata Bag
//!
//! Blocks carry an open attribute bag whose shape depends on the block type.
//! Known shapes are lifted into typed variants of [`BlockMetadata`]; anything
//! else (including known shapes carrying extra keys) is kept verbatim in
//! [`BlockMetadata::Unknown`] so that loading and saving never drops data.
//!
//! ## Timestamps
//!
//! All timestamps are UTC with millisecond precision (see [`now`]), which is the
//! resolution the relational store persists.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Current time, truncated to the millisecond resolution used by the store.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4().simple().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

opaque_id!(
    /// Globally unique, immutable page identifier.
    PageId
);

opaque_id!(
    /// Block identifier, unique within the owning page.
    BlockId
);

/// The closed set of block types. The type decides how `content` and
/// `metadata` are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Text,
    Heading,
    Todo,
    Code,
    Divider,
    Kanban,
    Database,
    Mindmap,
    ProjectOs,
    Callout,
    Embed,
    Quote,
    Table,
    Image,
    Video,
    Audio,
    Checkbox,
    Date,
    Time,
    Math,
    Emoji,
    Timer,
}

impl BlockType {
    pub const ALL: [BlockType; 22] = [
        BlockType::Text,
        BlockType::Heading,
        BlockType::Todo,
        BlockType::Code,
        BlockType::Divider,
        BlockType::Kanban,
        BlockType::Database,
        BlockType::Mindmap,
        BlockType::ProjectOs,
        BlockType::Callout,
        BlockType::Embed,
        BlockType::Quote,
        BlockType::Table,
        BlockType::Image,
        BlockType::Video,
        BlockType::Audio,
        BlockType::Checkbox,
        BlockType::Date,
        BlockType::Time,
        BlockType::Math,
        BlockType::Emoji,
        BlockType::Timer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BlockType::Text => "text",
            BlockType::Heading => "heading",
            BlockType::Todo => "todo",
            BlockType::Code => "code",
            BlockType::Divider => "divider",
            BlockType::Kanban => "kanban",
            BlockType::Database => "database",
            BlockType::Mindmap => "mindmap",
            BlockType::ProjectOs => "project_os",
            BlockType::Callout => "callout",
            BlockType::Embed => "embed",
            BlockType::Quote => "quote",
            BlockType::Table => "table",
            BlockType::Image => "image",
            BlockType::Video => "video",
            BlockType::Audio => "audio",
            BlockType::Checkbox => "checkbox",
            BlockType::Date => "date",
            BlockType::Time => "time",
            BlockType::Math => "math",
            BlockType::Emoji => "emoji",
            BlockType::Timer => "timer",
        }
    }

    /// Block types whose `content` is a serialized sub-document.
    pub fn is_structured(self) -> bool {
        matches!(
            self,
            BlockType::Kanban | BlockType::Database | BlockType::Mindmap | BlockType::ProjectOs
        )
    }

    /// Block types that carry a `checked` toggle.
    pub fn is_checkable(self) -> bool {
        matches!(self, BlockType::Todo | BlockType::Checkbox)
    }

    /// Block types whose `content` is plain prose.
    pub fn is_textual(self) -> bool {
        matches!(
            self,
            BlockType::Text
                | BlockType::Heading
                | BlockType::Todo
                | BlockType::Callout
                | BlockType::Quote
                | BlockType::Checkbox
        )
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlockType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown block type: {}", s))
    }
}

/// Scheduling bucket a block can be filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Schedule {
    Today,
    Week,
    Someday,
}

impl Schedule {
    pub fn as_str(self) -> &'static str {
        match self {
            Schedule::Today => "today",
            Schedule::Week => "week",
            Schedule::Someday => "someday",
        }
    }
}

impl FromStr for Schedule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "today" => Ok(Schedule::Today),
            "week" => Ok(Schedule::Week),
            "someday" => Ok(Schedule::Someday),
            other => Err(format!("unknown schedule: {}", other)),
        }
    }
}

/// How a linked block relates to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// Always reflects the current state of the target.
    Live,
    /// Captured the target once; independent afterwards.
    Snapshot,
}

impl LinkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkKind::Live => "live",
            LinkKind::Snapshot => "snapshot",
        }
    }
}

impl FromStr for LinkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(LinkKind::Live),
            "snapshot" => Ok(LinkKind::Snapshot),
            other => Err(format!("unknown link kind: {}", other)),
        }
    }
}

/// Marks a block as representing content from another page (or one block of it).
///
/// The target must exist when the link is created. It may disappear later; such a
/// dangling link is a tolerated state and resolves to
/// [`LinkTarget::Missing`](crate::links::LinkTarget::Missing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkMetadata {
    pub source_page_id: PageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_block_id: Option<BlockId>,
    #[serde(rename = "type")]
    pub kind: LinkKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LinkMetadata {
    pub fn new(source_page_id: PageId, source_block_id: Option<BlockId>, kind: LinkKind) -> Self {
        let now = now();
        Self {
            source_page_id,
            source_block_id,
            kind,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeMetadata {
    pub language: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerMetadata {
    pub state: TimerState,
    /// Epoch milliseconds of the last start, while running.
    pub last_start: Option<i64>,
}

/// Per-type block attributes.
///
/// Serialized as the plain attribute bag; the block type is what selects the
/// variant on the way back in (see [`BlockMetadata::from_bag`]).
#[derive(Debug, Clone, PartialEq)]
pub enum BlockMetadata {
    Code(CodeMetadata),
    Timer(TimerMetadata),
    /// Shapes this version does not model, kept verbatim.
    Unknown(Map<String, Value>),
}

impl BlockMetadata {
    /// Lifts an attribute bag into the variant matching `block_type`.
    ///
    /// Returns `None` for an empty bag. A typed variant is only chosen when it
    /// reproduces the bag exactly; otherwise the bag is kept as `Unknown`.
    pub fn from_bag(block_type: BlockType, bag: Map<String, Value>) -> Option<Self> {
        if bag.is_empty() {
            return None;
        }

        let typed = match block_type {
            BlockType::Code => bag
                .get("language")
                .and_then(Value::as_str)
                .map(|language| {
                    BlockMetadata::Code(CodeMetadata {
                        language: language.to_string(),
                    })
                }),
            BlockType::Timer => {
                let state = match bag.get("state").and_then(Value::as_str) {
                    Some("running") => Some(TimerState::Running),
                    Some("stopped") => Some(TimerState::Stopped),
                    _ => None,
                };
                state.map(|state| {
                    BlockMetadata::Timer(TimerMetadata {
                        state,
                        last_start: bag.get("lastStart").and_then(Value::as_i64),
                    })
                })
            }
            _ => None,
        };

        match typed {
            Some(meta) if meta.to_bag() == bag => Some(meta),
            _ => Some(BlockMetadata::Unknown(bag)),
        }
    }

    pub fn to_bag(&self) -> Map<String, Value> {
        match self {
            BlockMetadata::Code(code) => {
                let mut bag = Map::new();
                bag.insert("language".into(), Value::String(code.language.clone()));
                bag
            }
            BlockMetadata::Timer(timer) => {
                let mut bag = Map::new();
                let state = match timer.state {
                    TimerState::Running => "running",
                    TimerState::Stopped => "stopped",
                };
                bag.insert("state".into(), Value::String(state.into()));
                if let Some(start) = timer.last_start {
                    bag.insert("lastStart".into(), Value::from(start));
                }
                bag
            }
            BlockMetadata::Unknown(bag) => bag.clone(),
        }
    }
}

impl Serialize for BlockMetadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_bag().serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: BlockId,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_edited_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BlockMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_metadata: Option<LinkMetadata>,
}

// The metadata bag can only be typed once the block type is known, so blocks
// deserialize through a helper and lift the bag afterwards.
impl<'de> Deserialize<'de> for Block {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let helper = BlockHelper::deserialize(deserializer)?;
        let metadata = helper
            .metadata
            .and_then(|bag| BlockMetadata::from_bag(helper.block_type, bag));

        Ok(Block {
            id: helper.id,
            block_type: helper.block_type,
            content: helper.content,
            checked: helper.checked,
            schedule: helper.schedule,
            last_edited_at: helper.last_edited_at,
            metadata,
            link_metadata: helper.link_metadata,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockHelper {
    id: BlockId,
    #[serde(rename = "type")]
    block_type: BlockType,
    #[serde(default)]
    content: String,
    #[serde(default)]
    checked: Option<bool>,
    #[serde(default)]
    schedule: Option<Schedule>,
    #[serde(default)]
    last_edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
    #[serde(default)]
    link_metadata: Option<LinkMetadata>,
}

impl Block {
    pub fn new(block_type: BlockType, content: impl Into<String>) -> Self {
        Self {
            id: BlockId::new(),
            block_type,
            content: content.into(),
            checked: None,
            schedule: None,
            last_edited_at: Some(now()),
            metadata: None,
            link_metadata: None,
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::new(BlockType::Text, content)
    }

    pub fn with_id(mut self, id: impl Into<BlockId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_metadata(mut self, metadata: BlockMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_link(mut self, link: LinkMetadata) -> Self {
        self.link_metadata = Some(link);
        self
    }

    /// The attribute bag as persisted: an empty object when there is no metadata.
    pub fn metadata_bag(&self) -> Map<String, Value> {
        self.metadata
            .as_ref()
            .map(BlockMetadata::to_bag)
            .unwrap_or_default()
    }

    pub fn links_to(&self, page_id: &PageId) -> bool {
        self.link_metadata
            .as_ref()
            .is_some_and(|link| &link.source_page_id == page_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: PageId,
    pub title: String,
    pub blocks: Vec<Block>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Page {
    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| &b.id == id)
    }

    pub fn block_position(&self, id: &BlockId) -> Option<usize> {
        self.blocks.iter().position(|b| &b.id == id)
    }

    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "Untitled"
        } else {
            &self.title
        }
    }

    /// Plain text of the page's prose blocks, one block per line.
    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .filter(|b| b.block_type.is_textual() && !b.content.is_empty())
            .map(|b| b.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
