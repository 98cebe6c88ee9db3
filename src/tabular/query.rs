use super::{CellValue, ColumnFilter, Row, SortBy, SortDirection, TabularData, ViewConfig};
use std::cmp::{Ordering, Reverse};

/// The rows visible under a view cursor, plus paging facts.
#[derive(Debug, Clone, PartialEq)]
pub struct TableView<'a> {
    pub rows: Vec<&'a Row>,
    /// The page actually shown, after clamping.
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    /// Rows left after search and filters.
    pub matched: usize,
    pub total: usize,
}

impl TableView<'_> {
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Filter, sort and paginate `data` under its own view cursor.
pub fn query(data: &TabularData) -> TableView<'_> {
    query_with(data, &data.view_config)
}

/// Filter, sort and paginate `data` under `view`.
///
/// A page past either end is clamped to the nearest valid page; an empty
/// result is page 1 of 0.
pub fn query_with<'a>(data: &'a TabularData, view: &ViewConfig) -> TableView<'a> {
    let needle = view.search_query.trim().to_lowercase();
    let mut rows: Vec<&Row> = data
        .rows
        .iter()
        .filter(|row| needle.is_empty() || matches_search(row, &needle))
        .filter(|row| view.filters.iter().all(|f| matches_filter(row, f)))
        .collect();

    if let Some(sort) = &view.sort_by {
        sort_rows(&mut rows, sort);
    }

    let matched = rows.len();
    let page_size = view.page_size.max(1);
    let total_pages = matched.div_ceil(page_size);
    let page = view.page.clamp(1, total_pages.max(1));

    let start = (page - 1) * page_size;
    let rows = rows.into_iter().skip(start).take(page_size).collect();

    TableView {
        rows,
        page,
        page_size,
        total_pages,
        matched,
        total: data.rows.len(),
    }
}

/// Number of pages `rows` would fill; zero rows fill zero pages.
pub fn total_pages(rows: usize, page_size: usize) -> usize {
    rows.div_ceil(page_size.max(1))
}

fn matches_search(row: &Row, needle: &str) -> bool {
    row.cells
        .values()
        .any(|value| value.to_string().to_lowercase().contains(needle))
}

fn matches_filter(row: &Row, filter: &ColumnFilter) -> bool {
    let wanted = filter.value.trim().to_lowercase();
    if wanted.is_empty() {
        return true;
    }
    row.get(&filter.column_id)
        .is_some_and(|value| value.to_string().to_lowercase().contains(&wanted))
}

fn sort_rows(rows: &mut [&Row], sort: &SortBy) {
    let key = |row: &&Row| SortKey::of(row.get(&sort.column_id));
    match sort.direction {
        SortDirection::Asc => rows.sort_by_cached_key(key),
        SortDirection::Desc => rows.sort_by_cached_key(|row| Reverse(key(row))),
    }
}

/// Total order over cells: blanks, then booleans, then numbers, then text.
///
/// Missing cells and cells that render as empty text are blank. Numbers compare
/// numerically and everything else by its rendered text, so a column that mixes
/// value types still sorts consistently.
#[derive(Debug)]
enum SortKey {
    Blank,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl SortKey {
    fn of(value: Option<&CellValue>) -> Self {
        match value {
            None | Some(CellValue::Empty) => SortKey::Blank,
            Some(CellValue::Bool(b)) => SortKey::Bool(*b),
            Some(CellValue::Number(n)) => SortKey::Number(n.as_f64().unwrap_or(0.0)),
            Some(other) => {
                let text = other.to_string();
                if text.is_empty() {
                    SortKey::Blank
                } else {
                    SortKey::Text(text)
                }
            }
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortKey::Blank => 0,
            SortKey::Bool(_) => 1,
            SortKey::Number(_) => 2,
            SortKey::Text(_) => 3,
        }
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Bool(a), SortKey::Bool(b)) => a.cmp(b),
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortKey {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabular::{Column, ColumnType};
    use serde_json::Number;
    use std::collections::BTreeMap;

    fn row(id: &str, name: &str, score: Option<i64>) -> Row {
        let mut cells = BTreeMap::new();
        cells.insert("name".to_string(), CellValue::Text(name.to_string()));
        if let Some(score) = score {
            cells.insert("score".to_string(), CellValue::Number(Number::from(score)));
        }
        Row {
            id: id.to_string(),
            cells,
        }
    }

    fn table(rows: Vec<Row>) -> TabularData {
        TabularData {
            columns: vec![
                Column::new("name", "Name", ColumnType::Text),
                Column::new("score", "Score", ColumnType::Number),
            ],
            rows,
            view_config: ViewConfig::default(),
        }
    }

    fn ids(view: &TableView<'_>) -> Vec<String> {
        view.rows.iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn search_is_case_insensitive_substring_over_cells() {
        let mut data = table(vec![
            row("1", "Alpha", Some(1)),
            row("2", "beta", Some(2)),
            row("3", "ALPHABET", Some(3)),
        ]);
        data.view_config.search_query = "alpha".into();

        let view = query(&data);
        assert_eq!(ids(&view), vec!["1", "3"]);
        assert_eq!(view.matched, 2);
        assert_eq!(view.total, 3);
    }

    #[test]
    fn search_does_not_match_row_ids() {
        let mut data = table(vec![row("needle", "hay", None)]);
        data.view_config.search_query = "needle".into();
        assert!(query(&data).rows.is_empty());
    }

    #[test]
    fn numbers_sort_numerically_and_missing_sorts_first() {
        let mut data = table(vec![
            row("a", "a", Some(10)),
            row("b", "b", Some(9)),
            row("c", "c", None),
        ]);
        data.view_config.sort_by = Some(SortBy {
            column_id: "score".into(),
            direction: SortDirection::Asc,
        });
        assert_eq!(ids(&query(&data)), vec!["c", "b", "a"]);

        data.view_config.sort_by = Some(SortBy {
            column_id: "score".into(),
            direction: SortDirection::Desc,
        });
        assert_eq!(ids(&query(&data)), vec!["a", "b", "c"]);
    }

    #[test]
    fn mixed_value_types_sort_as_one_order() {
        let rows: Vec<Row> = (0..200)
            .map(|i| {
                let score = match i % 4 {
                    0 => CellValue::Number(Number::from(i % 97)),
                    1 => CellValue::Text((i % 89).to_string()),
                    2 => CellValue::Number(Number::from(i % 13)),
                    _ => CellValue::Text(String::new()),
                };
                let mut cells = BTreeMap::new();
                cells.insert("score".to_string(), score);
                Row {
                    id: i.to_string(),
                    cells,
                }
            })
            .collect();
        let mut data = table(rows);
        data.view_config.page_size = 500;

        for direction in [SortDirection::Asc, SortDirection::Desc] {
            data.view_config.sort_by = Some(SortBy {
                column_id: "score".into(),
                direction,
            });
            let view = query(&data);
            assert_eq!(view.rows.len(), 200);

            let keys: Vec<SortKey> = view
                .rows
                .iter()
                .map(|r| SortKey::of(r.get("score")))
                .collect();
            for pair in keys.windows(2) {
                match direction {
                    SortDirection::Asc => assert!(pair[0] <= pair[1], "{:?}", pair),
                    SortDirection::Desc => assert!(pair[0] >= pair[1], "{:?}", pair),
                }
            }
        }

        data.view_config.sort_by = Some(SortBy {
            column_id: "score".into(),
            direction: SortDirection::Asc,
        });
        let view = query(&data);
        assert_eq!(view.rows[0].get("score"), Some(&CellValue::Text(String::new())));
        assert_eq!(
            view.rows[50].get("score"),
            Some(&CellValue::Number(Number::from(0)))
        );
        assert!(matches!(view.rows[199].get("score"), Some(CellValue::Text(_))));
    }

    #[test]
    fn equal_keys_keep_their_order() {
        let mut data = table(vec![
            row("1", "same", None),
            row("2", "same", None),
            row("3", "same", None),
        ]);
        data.view_config.sort_by = Some(SortBy {
            column_id: "name".into(),
            direction: SortDirection::Asc,
        });
        assert_eq!(ids(&query(&data)), vec!["1", "2", "3"]);
    }

    #[test]
    fn twenty_three_rows_make_three_pages() {
        let rows = (0..23).map(|i| row(&i.to_string(), "r", Some(i))).collect();
        let mut data = table(rows);

        let view = query(&data);
        assert_eq!(view.total_pages, 3);
        assert_eq!(view.rows.len(), 10);
        assert!(view.has_next());

        data.view_config.page = 3;
        let view = query(&data);
        assert_eq!(view.rows.len(), 3);
        assert!(!view.has_next());

        data.view_config.page = 4;
        let view = query(&data);
        assert_eq!(view.page, 3);
        assert_eq!(view.rows.len(), 3);
    }

    #[test]
    fn empty_result_is_first_page_of_none() {
        let mut data = table(vec![row("1", "x", None)]);
        data.view_config.search_query = "nothing".into();
        data.view_config.page = 5;

        let view = query(&data);
        assert_eq!(view.page, 1);
        assert_eq!(view.total_pages, 0);
        assert!(view.rows.is_empty());
    }

    #[test]
    fn column_filters_narrow_by_column() {
        let mut data = table(vec![row("1", "red", Some(1)), row("2", "blue", Some(11))]);
        data.view_config.filters = vec![ColumnFilter {
            column_id: "score".into(),
            value: "1".into(),
        }];
        assert_eq!(ids(&query(&data)), vec!["1", "2"]);

        data.view_config.filters = vec![ColumnFilter {
            column_id: "name".into(),
            value: "BLU".into(),
        }];
        assert_eq!(ids(&query(&data)), vec!["2"]);
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(5, 0), 5);
    }
}
