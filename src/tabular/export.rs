use super::TabularData;

/// Renders every row (stored order, not the current view) as CSV: a header of
/// column titles, then one line per row in schema order. All fields are quoted.
pub fn to_csv(data: &TabularData) -> String {
    let mut out = String::new();

    let header: Vec<String> = data.columns.iter().map(|c| quote(&c.title)).collect();
    out.push_str(&header.join(","));

    for row in &data.rows {
        out.push('\n');
        let fields: Vec<String> = data
            .columns
            .iter()
            .map(|c| quote(&row.get(&c.id).map(ToString::to_string).unwrap_or_default()))
            .collect();
        out.push_str(&fields.join(","));
    }
    out
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
