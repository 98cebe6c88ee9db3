use chrono::{DateTime, Utc};
use colored::*;
use folio::config::FolioConfig;
use folio::links::LinkTarget;
use folio::model::{Block, BlockType, LinkKind, Page};
use folio::store::sqlite::BLOB_KEY;
use folio::store::{DataStore, FsBackend};
use folio::tabular::query::TableView;
use folio::tabular::TabularData;
use folio::workspace::DeletePreview;
use folio::Workspace;
use std::path::Path;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const LINE_WIDTH: usize = 100;
const TIME_WIDTH: usize = 14;
const CELL_WIDTH: usize = 18;
const LINK_MARKER: &str = "↪";

pub fn success(message: &str) {
    println!("{}", message.green());
}

pub fn info(message: &str) {
    println!("{}", message.dimmed());
}

pub fn warning(message: &str) {
    println!("{}", message.yellow());
}

pub fn print_pages(pages: &[&Page]) {
    if pages.is_empty() {
        println!("No pages found.");
        return;
    }

    for (i, page) in pages.iter().enumerate() {
        let idx_str = format!("{}. ", i + 1);
        let blocks = format!("{} blocks", page.blocks.len());
        let time_ago = format_time_ago(page.updated_at);

        let fixed = 4 + idx_str.width() + blocks.width() + 2 + TIME_WIDTH;
        let available = LINE_WIDTH.saturating_sub(fixed);
        let title = truncate_to_width(page.display_title(), available);
        let padding = available.saturating_sub(title.width());

        println!(
            "    {}{}{}{}  {}",
            idx_str.yellow(),
            title,
            " ".repeat(padding),
            blocks.dimmed(),
            time_ago.dimmed()
        );
    }
}

pub fn print_page<S: DataStore>(workspace: &Workspace<S>, page: &Page) {
    println!("{}", page.display_title().bold());
    println!("{}", "--------------------------------".dimmed());
    for (i, block) in page.blocks.iter().enumerate() {
        let idx = format!("{:>3}. ", i + 1).dimmed();
        println!("{}{}", idx, format_block(block));
        if let Some(link) = &block.link_metadata {
            let target = match workspace.resolve_link(link) {
                LinkTarget::Page(page) => page.display_title().to_string(),
                LinkTarget::Block { page, .. } => format!("{} (block)", page.display_title()),
                LinkTarget::MissingBlock { page } => {
                    format!("{} (missing block)", page.display_title()).red().to_string()
                }
                LinkTarget::Missing => "missing page".red().to_string(),
            };
            let kind = match link.kind {
                LinkKind::Live => "live",
                LinkKind::Snapshot => "snapshot",
            };
            println!("       {} {} {}", LINK_MARKER.cyan(), target, kind.dimmed());
        }
    }
}

fn format_block(block: &Block) -> String {
    let content = block.content.as_str();
    match block.block_type {
        BlockType::Heading => content.bold().to_string(),
        BlockType::Todo | BlockType::Checkbox => {
            if block.checked.unwrap_or(false) {
                format!("[x] {}", content.strikethrough())
            } else {
                format!("[ ] {}", content)
            }
        }
        BlockType::Quote => format!("> {}", content.italic()),
        BlockType::Callout => format!("! {}", content),
        BlockType::Divider => "────────".dimmed().to_string(),
        BlockType::Code => {
            let indented: Vec<String> = content.lines().map(|l| format!("      {}", l)).collect();
            format!("```\n{}\n     ```", indented.join("\n"))
        }
        BlockType::Text => content.to_string(),
        BlockType::Database => match TabularData::from_content(content) {
            Ok(data) => format!(
                "{} {} columns, {} rows",
                "[database]".cyan(),
                data.columns.len(),
                data.rows.len()
            ),
            Err(_) => format!("{} (unreadable)", "[database]".cyan()),
        },
        other => {
            let first_line = content.lines().next().unwrap_or_default();
            format!(
                "{} {}",
                format!("[{}]", other).cyan(),
                truncate_to_width(first_line, LINE_WIDTH / 2)
            )
        }
    }
}

pub fn print_links(outbound: &[&Page], inbound: &[&Page]) {
    println!("{}", "Links to:".bold());
    if outbound.is_empty() {
        println!("    {}", "nothing".dimmed());
    }
    for page in outbound {
        println!("    {} {}", LINK_MARKER.cyan(), page.display_title());
    }
    println!("{}", "Linked from:".bold());
    if inbound.is_empty() {
        println!("    {}", "nothing".dimmed());
    }
    for page in inbound {
        println!("    {} {}", LINK_MARKER.cyan(), page.display_title());
    }
}

pub fn print_delete_preview(preview: &DeletePreview) {
    println!(
        "{} ({} blocks, edited {})",
        preview.title.bold(),
        preview.block_count,
        format_time_ago(preview.last_modified).trim()
    );
    if preview.linked_block_count > 0 {
        warning(&format!(
            "{} block(s) in {} other page(s) link here",
            preview.linked_block_count,
            preview.linking_pages.len()
        ));
    }
}

pub fn print_table(data: &TabularData, view: &TableView<'_>) {
    let columns: Vec<_> = data.columns.iter().filter(|c| c.is_visible()).collect();

    let mut header = format!("{:<10}", "row");
    for column in &columns {
        header.push_str(&pad_cell(&column.title));
    }
    println!("{}", header.bold());

    for row in &view.rows {
        let short_id: String = row.id.chars().take(8).collect();
        let mut line = format!("{:<10}", short_id);
        for column in &columns {
            let value = row.get(&column.id).map(ToString::to_string).unwrap_or_default();
            line.push_str(&pad_cell(&value));
        }
        println!("{}", line);
    }

    let pages = view.total_pages.max(1);
    info(&format!(
        "page {} of {} · {} of {} rows",
        view.page, pages, view.matched, view.total
    ));
}

pub fn print_config(config: &FolioConfig, data_dir: &Path) {
    println!("data_dir = {}", data_dir.display());
    println!(
        "blob = {}",
        FsBackend::new(data_dir).blob_path(BLOB_KEY).display()
    );
    println!("recovery_window_secs = {}", config.recovery_window_secs);
    println!("autosave_debounce_ms = {}", config.autosave_debounce_ms);
    println!("default_page_title = {:?}", config.default_page_title);
    println!("table_page_size = {}", config.table_page_size);
    println!("log_level = {:?}", config.log_level);
}

fn pad_cell(value: &str) -> String {
    let value = truncate_to_width(value, CELL_WIDTH - 2);
    let padding = CELL_WIDTH.saturating_sub(value.width());
    format!("{}{}", value, " ".repeat(padding))
}

fn truncate_to_width(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }

    let mut result = String::new();
    let mut current_width = 0;
    for c in s.chars() {
        let char_width = c.width().unwrap_or(0);
        if current_width + char_width > max_width.saturating_sub(1) {
            result.push('…');
            return result;
        }
        result.push(c);
        current_width += char_width;
    }
    result
}

fn format_time_ago(timestamp: DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(timestamp);
    let formatter = timeago::Formatter::new();
    let time_str = formatter.convert(duration.to_std().unwrap_or_default());
    format!("{:>width$}", time_str, width = TIME_WIDTH)
}
