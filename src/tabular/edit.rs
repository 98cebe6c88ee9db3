//! Mutations on a [`TabularData`].
//!
//! Every schema or cell change re-establishes the backfill/strip invariant and
//! recomputes derived progress before returning.

use super::query::{query_with, total_pages};
use super::{
    CellValue, Column, ColumnFilter, Row, SortBy, SortDirection, TabularData, MIN_COLUMN_WIDTH,
};
use std::collections::BTreeMap;
use uuid::Uuid;

fn new_row_id() -> String {
    Uuid::new_v4().simple().to_string()
}

impl TabularData {
    /// Appends `column` and backfills its default into every row.
    /// Returns false if a column with that id already exists.
    pub fn add_column(&mut self, column: Column) -> bool {
        if self.column(&column.id).is_some() {
            return false;
        }
        let default = column.column_type.default_value();
        for row in &mut self.rows {
            row.cells.insert(column.id.clone(), default.clone());
        }
        self.columns.push(column);
        self.recompute_progress();
        true
    }

    /// Removes a column, its cells, and any sort or filter on it.
    pub fn remove_column(&mut self, column_id: &str) -> Option<Column> {
        let index = self.columns.iter().position(|c| c.id == column_id)?;
        let column = self.columns.remove(index);

        for row in &mut self.rows {
            row.cells.remove(column_id);
        }
        if self
            .view_config
            .sort_by
            .as_ref()
            .is_some_and(|s| s.column_id == column_id)
        {
            self.view_config.sort_by = None;
        }
        self.view_config.filters.retain(|f| f.column_id != column_id);
        self.recompute_progress();
        Some(column)
    }

    /// Writes one cell, then recomputes every derived progress cell.
    /// Returns false if the row or the column does not exist.
    pub fn set_cell(&mut self, row_id: &str, column_id: &str, value: CellValue) -> bool {
        if self.column(column_id).is_none() {
            return false;
        }
        let Some(row) = self.rows.iter_mut().find(|r| r.id == row_id) else {
            return false;
        };
        row.cells.insert(column_id.to_string(), value);
        self.recompute_progress();
        true
    }

    /// Prepends a row of column defaults and returns its id.
    pub fn add_row(&mut self) -> String {
        let id = new_row_id();
        let cells: BTreeMap<String, CellValue> = self
            .columns
            .iter()
            .map(|c| (c.id.clone(), c.column_type.default_value()))
            .collect();
        self.rows.insert(
            0,
            Row {
                id: id.clone(),
                cells,
            },
        );
        self.recompute_progress();
        id
    }

    /// Prepends a copy of `row_id` under a fresh id.
    pub fn duplicate_row(&mut self, row_id: &str) -> Option<String> {
        let mut copy = self.row(row_id)?.clone();
        copy.id = new_row_id();
        let id = copy.id.clone();
        self.rows.insert(0, copy);
        Some(id)
    }

    /// Deletes the given rows and returns how many were removed.
    pub fn delete_rows(&mut self, row_ids: &[&str]) -> usize {
        let before = self.rows.len();
        self.rows.retain(|r| !row_ids.contains(&r.id.as_str()));
        let removed = before - self.rows.len();
        self.clamp_page();
        removed
    }

    /// Sets a column's width, never below the minimum. Returns the width applied.
    pub fn resize_column(&mut self, column_id: &str, width: u32) -> Option<u32> {
        let column = self.columns.iter_mut().find(|c| c.id == column_id)?;
        let width = width.max(MIN_COLUMN_WIDTH);
        column.width = Some(width);
        Some(width)
    }

    /// Sorts by `column_id` ascending, or flips to descending when it is
    /// already the ascending sort column.
    pub fn toggle_sort(&mut self, column_id: &str) {
        let direction = match &self.view_config.sort_by {
            Some(SortBy {
                column_id: current,
                direction: SortDirection::Asc,
            }) if current == column_id => SortDirection::Desc,
            _ => SortDirection::Asc,
        };
        self.view_config.sort_by = Some(SortBy {
            column_id: column_id.to_string(),
            direction,
        });
    }

    pub fn set_sort(&mut self, sort: Option<SortBy>) {
        self.view_config.sort_by = sort;
    }

    /// Changing the search starts over from page 1.
    pub fn set_search(&mut self, query: impl Into<String>) {
        self.view_config.search_query = query.into();
        self.view_config.page = 1;
    }

    /// Replaces the filter on `column_id`; an empty value removes it.
    pub fn set_filter(&mut self, column_id: &str, value: impl Into<String>) {
        let value = value.into();
        self.view_config.filters.retain(|f| f.column_id != column_id);
        if !value.trim().is_empty() {
            self.view_config.filters.push(ColumnFilter {
                column_id: column_id.to_string(),
                value,
            });
        }
        self.view_config.page = 1;
    }

    /// Changing the page size starts over from page 1.
    pub fn set_page_size(&mut self, page_size: usize) {
        self.view_config.page_size = page_size.max(1);
        self.view_config.page = 1;
    }

    /// Moves the cursor to `page`, clamped to the pages the current search
    /// produces. Returns the page applied.
    pub fn go_to_page(&mut self, page: usize) -> usize {
        self.view_config.page = page;
        self.clamp_page();
        self.view_config.page
    }

    fn clamp_page(&mut self) {
        let matched = query_with(self, &self.view_config).matched;
        let last = total_pages(matched, self.view_config.page_size).max(1);
        self.view_config.page = self.view_config.page.clamp(1, last);
    }
}
