use super::args::TableCommands;
use super::render;
use folio::document::BlockPatch;
use folio::error::{FolioError, Result};
use folio::model::{Block, BlockId, BlockType, LinkKind, PageId};
use folio::store::{FsBackend, PageStore};
use folio::tabular::query::query;
use folio::tabular::{Column, ColumnType};
use folio::Workspace;
use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

pub struct AppContext {
    pub workspace: Workspace<PageStore<FsBackend>>,
    pub data_dir: PathBuf,
}

impl AppContext {
    fn page(&self, selector: &str) -> Result<PageId> {
        self.workspace.select_page(selector)
    }

    fn block(&self, page: &PageId, selector: &str) -> Result<BlockId> {
        self.workspace.select_block(page, selector)
    }
}

pub fn list(ctx: &AppContext) -> Result<()> {
    render::print_pages(&ctx.workspace.pages_by_recency());
    Ok(())
}

pub fn new_page(ctx: &mut AppContext, title: String, text: Option<String>) -> Result<()> {
    let blocks = text.map(|t| vec![Block::text(t)]);
    let id = ctx.workspace.create_page_with(title, blocks);
    let page = ctx.workspace.page(&id)?;
    render::success(&format!("Created page: {}", page.display_title()));
    Ok(())
}

pub fn show(ctx: &AppContext, selector: &str) -> Result<()> {
    let id = ctx.page(selector)?;
    render::print_page(&ctx.workspace, ctx.workspace.page(&id)?);
    Ok(())
}

pub fn rename(ctx: &mut AppContext, selector: &str, title: String) -> Result<()> {
    let id = ctx.page(selector)?;
    ctx.workspace.rename_page(&id, title)?;
    render::success(&format!(
        "Renamed page to: {}",
        ctx.workspace.page(&id)?.display_title()
    ));
    Ok(())
}

pub fn add(
    ctx: &mut AppContext,
    selector: &str,
    content: String,
    block_type: &str,
    after: Option<&str>,
) -> Result<()> {
    let block_type: BlockType = block_type.parse().map_err(FolioError::Validation)?;
    if block_type.is_structured() {
        return Err(FolioError::Validation(format!(
            "{} blocks cannot be added from text (use `folio table new` for databases)",
            block_type
        )));
    }

    let page = ctx.page(selector)?;
    let mut block = Block::new(block_type, content);
    if block_type.is_checkable() {
        block.checked = Some(false);
    }
    match after {
        Some(after) => {
            let after = ctx.block(&page, after)?;
            ctx.workspace.insert_block(&page, Some(&after), block)?;
        }
        None => {
            ctx.workspace.append_block(&page, block)?;
        }
    }
    render::success(&format!("Added {} block", block_type));
    Ok(())
}

pub fn edit(ctx: &mut AppContext, selector: &str, block: &str, content: String) -> Result<()> {
    let page = ctx.page(selector)?;
    let block = ctx.block(&page, block)?;
    ctx.workspace
        .update_block(&page, &block, BlockPatch::content(content))?;
    render::success("Block updated");
    Ok(())
}

pub fn check(ctx: &mut AppContext, selector: &str, block: &str) -> Result<()> {
    let page = ctx.page(selector)?;
    let block = ctx.block(&page, block)?;
    let current = ctx.workspace.block(&page, &block)?;
    if !current.block_type.is_checkable() {
        return Err(FolioError::Validation(format!(
            "block is a {} block, not a todo or checkbox",
            current.block_type
        )));
    }
    let checked = !current.checked.unwrap_or(false);
    ctx.workspace.update_block(
        &page,
        &block,
        BlockPatch::default().with_checked(Some(checked)),
    )?;
    render::success(if checked { "Checked" } else { "Unchecked" });
    Ok(())
}

pub fn remove(ctx: &mut AppContext, selector: &str, block: &str) -> Result<()> {
    let page = ctx.page(selector)?;
    let block = ctx.block(&page, block)?;
    ctx.workspace.remove_block(&page, &block)?;
    render::success("Block removed");
    Ok(())
}

pub fn move_block(ctx: &mut AppContext, selector: &str, block: &str, to: &str) -> Result<()> {
    let from = ctx.page(selector)?;
    let block = ctx.block(&from, block)?;
    let to = ctx.page(to)?;
    let last = ctx.workspace.page(&to)?.blocks.last().map(|b| b.id.clone());
    ctx.workspace.move_block(&from, &block, &to, last.as_ref())?;
    render::success(&format!(
        "Moved block to: {}",
        ctx.workspace.page(&to)?.display_title()
    ));
    Ok(())
}

pub fn link(
    ctx: &mut AppContext,
    selector: &str,
    target: &str,
    block: Option<&str>,
    snapshot: bool,
) -> Result<()> {
    let page = ctx.page(selector)?;
    let target = ctx.page(target)?;
    let target_block = block.map(|b| ctx.block(&target, b)).transpose()?;
    let kind = if snapshot {
        LinkKind::Snapshot
    } else {
        LinkKind::Live
    };
    ctx.workspace
        .insert_link(&page, &target, target_block.as_ref(), kind)?;
    render::success(&format!(
        "Linked to: {} ({})",
        ctx.workspace.page(&target)?.display_title(),
        kind.as_str()
    ));
    Ok(())
}

pub fn links(ctx: &AppContext, selector: &str) -> Result<()> {
    let id = ctx.page(selector)?;
    let outbound = ctx.workspace.outbound_links(&id)?;
    let inbound = ctx.workspace.inbound_links(&id);
    render::print_links(&outbound, &inbound);
    Ok(())
}

pub fn delete(ctx: &mut AppContext, selector: &str, yes: bool) -> Result<()> {
    let id = ctx.page(selector)?;
    let preview = ctx.workspace.delete_preview(&id)?;
    render::print_delete_preview(&preview);

    if !yes && !confirm("Delete this page?")? {
        render::info("Cancelled.");
        return Ok(());
    }

    let outcome = ctx.workspace.delete_page(&id)?;
    // Nothing can undo it once this process exits.
    ctx.workspace.purge_pending();
    render::success(&format!("Deleted page: {}", preview.title));
    if outcome.linked_block_count > 0 {
        render::warning(&format!(
            "{} linked block(s) now point at a missing page",
            outcome.linked_block_count
        ));
    }
    if outcome.replacement.is_some() {
        render::info("Created an empty page in its place.");
    }
    Ok(())
}

pub fn table(ctx: &mut AppContext, command: TableCommands) -> Result<()> {
    match command {
        TableCommands::New { page, columns } => {
            let page = ctx.page(&page)?;
            let columns = columns
                .iter()
                .map(|spec| parse_column(spec))
                .collect::<Result<Vec<_>>>()?;
            let last = ctx.workspace.page(&page)?.blocks.last().map(|b| b.id.clone());
            ctx.workspace.insert_table(&page, last.as_ref(), columns)?;
            render::success("Created table");
            Ok(())
        }
        TableCommands::Show {
            page,
            block,
            search,
            sort,
            page_number,
        } => {
            let page = ctx.page(&page)?;
            let block = ctx.block(&page, &block)?;
            let data = if search.is_some() || sort.is_some() || page_number.is_some() {
                ctx.workspace.edit_table(&page, &block, |t| {
                    if let Some(search) = search {
                        t.set_search(search);
                    }
                    if let Some(sort) = sort {
                        t.toggle_sort(&sort);
                    }
                    if let Some(n) = page_number {
                        t.go_to_page(n);
                    }
                    t.clone()
                })?
            } else {
                ctx.workspace.table(&page, &block)?
            };
            render::print_table(&data, &query(&data));
            Ok(())
        }
        TableCommands::Row { page, block, cells } => {
            let page = ctx.page(&page)?;
            let block = ctx.block(&page, &block)?;
            let data = ctx.workspace.table(&page, &block)?;
            let values = cells
                .iter()
                .map(|pair| {
                    let (column, value) = pair.split_once('=').ok_or_else(|| {
                        FolioError::Validation(format!("expected column=value, got: {}", pair))
                    })?;
                    let column = data.column(column.trim()).ok_or_else(|| {
                        FolioError::Validation(format!("unknown column: {}", column))
                    })?;
                    let value = column
                        .column_type
                        .parse_value(value)
                        .map_err(FolioError::Validation)?;
                    Ok((column.id.clone(), value))
                })
                .collect::<Result<Vec<_>>>()?;

            let row = ctx.workspace.edit_table(&page, &block, |t| {
                let row = t.add_row();
                for (column, value) in values {
                    t.set_cell(&row, &column, value);
                }
                row
            })?;
            render::success(&format!("Added row {}", row));
            Ok(())
        }
        TableCommands::Set {
            page,
            block,
            row,
            column,
            value,
        } => {
            let page = ctx.page(&page)?;
            let block = ctx.block(&page, &block)?;
            let data = ctx.workspace.table(&page, &block)?;
            let column = data
                .column(&column)
                .ok_or_else(|| FolioError::Validation(format!("unknown column: {}", column)))?;
            let value = column
                .column_type
                .parse_value(&value)
                .map_err(FolioError::Validation)?;
            let column = column.id.clone();
            let applied = ctx
                .workspace
                .edit_table(&page, &block, |t| t.set_cell(&row, &column, value))?;
            if !applied {
                return Err(FolioError::Validation(format!("unknown row: {}", row)));
            }
            render::success("Cell updated");
            Ok(())
        }
        TableCommands::Delete { page, block, rows } => {
            let page = ctx.page(&page)?;
            let block = ctx.block(&page, &block)?;
            let ids: Vec<&str> = rows.iter().map(String::as_str).collect();
            let removed = ctx
                .workspace
                .edit_table(&page, &block, |t| t.delete_rows(&ids))?;
            render::success(&format!("Deleted {} row(s)", removed));
            Ok(())
        }
        TableCommands::Csv { page, block } => {
            let page = ctx.page(&page)?;
            let block = ctx.block(&page, &block)?;
            println!("{}", ctx.workspace.export_table_csv(&page, &block)?);
            Ok(())
        }
    }
}

pub fn export(ctx: &mut AppContext, output: &Path) -> Result<()> {
    let bytes = ctx.workspace.export_blob()?;
    fs::write(output, &bytes).map_err(folio::StorageError::from)?;
    render::success(&format!(
        "Exported {} bytes to {}",
        bytes.len(),
        output.display()
    ));
    Ok(())
}

pub fn config(ctx: &AppContext) -> Result<()> {
    render::print_config(ctx.workspace.config(), &ctx.data_dir);
    Ok(())
}

/// `Title:type` (type defaults to text). The id is the title in snake case.
fn parse_column(spec: &str) -> Result<Column> {
    let (title, column_type) = match spec.rsplit_once(':') {
        Some((title, ty)) => (
            title.trim(),
            ty.parse::<ColumnType>().map_err(FolioError::Validation)?,
        ),
        None => (spec.trim(), ColumnType::Text),
    };
    if title.is_empty() {
        return Err(FolioError::Validation(format!("column needs a title: {}", spec)));
    }
    let id: String = title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    Ok(Column::new(id, title, column_type))
}

fn confirm(prompt: &str) -> Result<bool> {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        return Err(FolioError::Validation(
            "refusing to delete without confirmation (pass --yes)".into(),
        ));
    }
    print!("{} [y/N] ", prompt);
    io::stdout().flush().map_err(folio::StorageError::from)?;
    let mut answer = String::new();
    stdin
        .lock()
        .read_line(&mut answer)
        .map_err(folio::StorageError::from)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_specs_parse_title_and_type() {
        let column = parse_column("Due Date:date").unwrap();
        assert_eq!(column.id, "due_date");
        assert_eq!(column.title, "Due Date");
        assert_eq!(column.column_type, ColumnType::Date);

        let column = parse_column("Name").unwrap();
        assert_eq!(column.column_type, ColumnType::Text);

        assert!(parse_column("X:blob").is_err());
        assert!(parse_column(":text").is_err());
    }
}
