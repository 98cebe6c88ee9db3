//! # Tabular Blocks
//!
//! A `database` block stores a small table in its `content`: a column schema,
//! the rows, and the view cursor the user last left it at.
//!
//! ```json
//! {
//!   "columns": [
//!     {"id": "title", "title": "Title", "type": "text"},
//!     {"id": "done",  "title": "Done",  "type": "checklist"},
//!     {"id": "pct",   "title": "%",     "type": "progress"}
//!   ],
//!   "rows": [
//!     {"id": "r1", "title": "Ship", "done": [{"id": "a", "text": "build", "checked": true}], "pct": 100}
//!   ],
//!   "viewConfig": {"page": 1, "pageSize": 10, "searchQuery": ""}
//! }
//! ```
//!
//! ## Schema Invariants
//!
//! - Every row has a value for every column. Adding a column backfills the
//!   column type's default into all rows; removing one strips the key.
//! - While the schema has a `checklist` column, every `progress` column is
//!   derived: `round(100 * checked / total)` of the first checklist column,
//!   recomputed after every cell write and overwriting whatever was there.
//!   An empty checklist counts as 0.
//!
//! ## Submodules
//!
//! - [`query`]: search, column filters, sort and paging into a [`query::TableView`].
//! - [`edit`]: schema, row and view-cursor mutations on [`TabularData`].
//! - [`export`]: CSV rendering.

use crate::model::PageId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub mod edit;
pub mod export;
pub mod query;

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const DEFAULT_COLUMN_WIDTH: u32 = 150;
pub const MIN_COLUMN_WIDTH: u32 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Number,
    Checkbox,
    Date,
    Select,
    Tags,
    Progress,
    Rating,
    Relation,
    Checklist,
}

impl ColumnType {
    /// Value a new row (or a backfilled row) starts with.
    pub fn default_value(self) -> CellValue {
        match self {
            ColumnType::Checklist => CellValue::Checklist(Vec::new()),
            ColumnType::Tags => CellValue::Tags(Vec::new()),
            ColumnType::Checkbox => CellValue::Bool(false),
            ColumnType::Progress | ColumnType::Rating => CellValue::Number(Number::from(0)),
            _ => CellValue::Text(String::new()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Number => "number",
            ColumnType::Checkbox => "checkbox",
            ColumnType::Date => "date",
            ColumnType::Select => "select",
            ColumnType::Tags => "tags",
            ColumnType::Progress => "progress",
            ColumnType::Rating => "rating",
            ColumnType::Relation => "relation",
            ColumnType::Checklist => "checklist",
        }
    }

    /// Reads a cell from user-typed text.
    ///
    /// Tags and checklist items are comma separated; a checklist item written
    /// as `[x] text` starts checked.
    pub fn parse_value(self, input: &str) -> Result<CellValue, String> {
        let input = input.trim();
        let list = || {
            input
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        };
        match self {
            ColumnType::Checkbox => match input.to_ascii_lowercase().as_str() {
                "true" | "yes" | "x" | "1" => Ok(CellValue::Bool(true)),
                "false" | "no" | "" | "0" => Ok(CellValue::Bool(false)),
                other => Err(format!("not a checkbox value: {}", other)),
            },
            ColumnType::Number | ColumnType::Progress | ColumnType::Rating => {
                if input.is_empty() {
                    return Ok(self.default_value());
                }
                serde_json::from_str::<Number>(input)
                    .map(CellValue::Number)
                    .map_err(|_| format!("not a number: {}", input))
            }
            ColumnType::Tags => Ok(CellValue::Tags(list())),
            ColumnType::Checklist => Ok(CellValue::Checklist(
                list()
                    .into_iter()
                    .enumerate()
                    .map(|(i, text)| match text.strip_prefix("[x]") {
                        Some(rest) => ChecklistItem::new(i.to_string(), rest.trim(), true),
                        None => ChecklistItem::new(i.to_string(), text, false),
                    })
                    .collect(),
            )),
            _ => Ok(CellValue::Text(input.to_string())),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "text" => ColumnType::Text,
            "number" => ColumnType::Number,
            "checkbox" => ColumnType::Checkbox,
            "date" => ColumnType::Date,
            "select" => ColumnType::Select,
            "tags" => ColumnType::Tags,
            "progress" => ColumnType::Progress,
            "rating" => ColumnType::Rating,
            "relation" => ColumnType::Relation,
            "checklist" => ColumnType::Checklist,
            other => return Err(format!("unknown column type: {}", other)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_page_id: Option<PageId>,
}

impl Column {
    pub fn new(id: impl Into<String>, title: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            column_type,
            width: None,
            options: None,
            visible: None,
            relation_page_id: None,
        }
    }

    pub fn width_or_default(&self) -> u32 {
        self.width.unwrap_or(DEFAULT_COLUMN_WIDTH)
    }

    pub fn is_visible(&self) -> bool {
        self.visible.unwrap_or(true)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub checked: bool,
    /// Keys this crate does not interpret, kept so edits write them back.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChecklistItem {
    pub fn new(id: impl Into<String>, text: impl Into<String>, checked: bool) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            checked,
            extra: Map::new(),
        }
    }
}

/// One cell. Matched structurally, in variant order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Number(Number),
    Text(String),
    Tags(Vec<String>),
    Checklist(Vec<ChecklistItem>),
    Other(Value),
}

impl CellValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Checklist items, if this cell holds a checklist. An empty list reads as
    /// an empty checklist whatever variant it was parsed into.
    pub fn checklist(&self) -> Option<&[ChecklistItem]> {
        match self {
            CellValue::Checklist(items) => Some(items),
            CellValue::Tags(tags) if tags.is_empty() => Some(&[][..]),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            CellValue::Tags(v) => v.is_empty(),
            CellValue::Checklist(v) => v.is_empty(),
            CellValue::Other(v) => v.is_null(),
            CellValue::Bool(_) | CellValue::Number(_) => false,
        }
    }
}

/// Stringified form used for search, sort keys and export.
impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Tags(tags) => f.write_str(&tags.join(", ")),
            CellValue::Checklist(items) => {
                let texts: Vec<&str> = items.iter().map(|i| i.text.as_str()).collect();
                f.write_str(&texts.join(", "))
            }
            CellValue::Other(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: String,
    #[serde(flatten)]
    pub cells: BTreeMap<String, CellValue>,
}

impl Row {
    pub fn get(&self, column_id: &str) -> Option<&CellValue> {
        self.cells.get(column_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortBy {
    #[serde(rename = "colId", alias = "columnId")]
    pub column_id: String,
    pub direction: SortDirection,
}

/// Per-column substring filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFilter {
    #[serde(rename = "colId", alias = "columnId")]
    pub column_id: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Table,
    Calendar,
    Kanban,
    Gallery,
}

/// Display cursor over the table. Not authoritative data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortBy>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<ColumnFilter>,
    #[serde(default)]
    pub search_query: String,
    #[serde(default = "first_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub view_mode: ViewMode,
}

fn first_page() -> usize {
    1
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }
}

impl ViewConfig {
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            sort_by: None,
            filters: Vec::new(),
            search_query: String::new(),
            page: 1,
            page_size: page_size.max(1),
            view_mode: ViewMode::Table,
        }
    }
}

/// The payload of a `database` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabularData {
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub view_config: ViewConfig,
}

impl TabularData {
    /// Parses a block payload and restores the schema invariants.
    /// Blank content is an empty table.
    pub fn from_content(content: &str) -> Result<Self, serde_json::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut data: TabularData = serde_json::from_str(content)?;
        data.normalize();
        Ok(data)
    }

    pub fn to_content(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn column(&self, column_id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == column_id)
    }

    pub fn row(&self, row_id: &str) -> Option<&Row> {
        self.rows.iter().find(|r| r.id == row_id)
    }

    /// Backfills missing cells, repairs the view cursor and recomputes
    /// derived progress.
    pub fn normalize(&mut self) {
        for column in &self.columns {
            for row in &mut self.rows {
                row.cells
                    .entry(column.id.clone())
                    .or_insert_with(|| column.column_type.default_value());
            }
        }
        if self.view_config.page_size == 0 {
            self.view_config.page_size = DEFAULT_PAGE_SIZE;
        }
        if self.view_config.page == 0 {
            self.view_config.page = 1;
        }
        self.recompute_progress();
    }

    /// Overwrites every `progress` cell from the first `checklist` column.
    /// Does nothing while the schema has no checklist column.
    pub fn recompute_progress(&mut self) {
        let Some(checklist_id) = self
            .columns
            .iter()
            .find(|c| c.column_type == ColumnType::Checklist)
            .map(|c| c.id.clone())
        else {
            return;
        };
        let progress_ids: Vec<String> = self
            .columns
            .iter()
            .filter(|c| c.column_type == ColumnType::Progress)
            .map(|c| c.id.clone())
            .collect();
        if progress_ids.is_empty() {
            return;
        }

        for row in &mut self.rows {
            let items = row
                .cells
                .get(&checklist_id)
                .and_then(CellValue::checklist)
                .unwrap_or(&[]);
            let value = CellValue::Number(Number::from(checklist_progress(items)));
            for id in &progress_ids {
                row.cells.insert(id.clone(), value.clone());
            }
        }
    }
}

/// Percentage of checked items, rounded half up. Empty lists are 0.
pub fn checklist_progress(items: &[ChecklistItem]) -> u64 {
    if items.is_empty() {
        return 0;
    }
    let checked = items.iter().filter(|i| i.checked).count();
    (100.0 * checked as f64 / items.len() as f64).round() as u64
}
