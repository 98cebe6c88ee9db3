use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "folio", version)]
#[command(about = "A local-first workspace of linked pages", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Workspace directory (defaults to the platform data dir)
    #[arg(long, global = true, env = "FOLIO_DATA", help_heading = "Options")]
    pub data: Option<PathBuf>,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true, help_heading = "Options")]
    pub verbose: bool,
}

/// Pages are addressed by their position in `folio list` or by id; blocks by
/// their position in `folio show` or by id.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List pages, most recently edited first
    #[command(alias = "ls")]
    List,

    /// Create a new page
    #[command(alias = "n")]
    New {
        title: String,

        /// Initial text block
        text: Option<String>,
    },

    /// Show a page and its blocks
    #[command(alias = "v")]
    Show { page: String },

    /// Rename a page
    Rename { page: String, title: String },

    /// Add a block to a page
    #[command(alias = "a")]
    Add {
        page: String,
        content: String,

        /// Block type (text, todo, heading, quote, code, ...)
        #[arg(short = 't', long = "type", default_value = "text")]
        block_type: String,

        /// Insert after this block (default: at the end)
        #[arg(long)]
        after: Option<String>,
    },

    /// Edit a block's content
    Edit {
        page: String,
        block: String,
        content: String,
    },

    /// Toggle a todo block
    Check { page: String, block: String },

    /// Remove a block
    #[command(alias = "rmb")]
    Remove { page: String, block: String },

    /// Move a block to another page
    #[command(alias = "mv")]
    Move {
        page: String,
        block: String,
        to: String,
    },

    /// Add a block referencing another page
    Link {
        page: String,
        target: String,

        /// Reference a single block of the target page
        #[arg(long)]
        block: Option<String>,

        /// Copy the content once instead of following it
        #[arg(long)]
        snapshot: bool,
    },

    /// Show what a page links to and what links to it
    Links { page: String },

    /// Delete a page
    #[command(alias = "rm")]
    Delete {
        page: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Work with database blocks
    #[command(subcommand)]
    Table(TableCommands),

    /// Write the workspace snapshot to a file
    Export { output: PathBuf },

    /// Print the resolved configuration
    Config,
}

#[derive(Subcommand, Debug)]
pub enum TableCommands {
    /// Create a database block with the given columns (`Title:type`)
    New {
        page: String,

        #[arg(required = true, num_args = 1..)]
        columns: Vec<String>,
    },

    /// Show a table's rows under a view
    Show {
        page: String,
        block: String,

        /// Case-insensitive search over all cells
        #[arg(short, long)]
        search: Option<String>,

        /// Column to sort by (toggles direction when repeated)
        #[arg(long)]
        sort: Option<String>,

        /// Page of results to show
        #[arg(short, long)]
        page_number: Option<usize>,
    },

    /// Add a row (`column=value` pairs)
    Row {
        page: String,
        block: String,
        cells: Vec<String>,
    },

    /// Set one cell
    Set {
        page: String,
        block: String,
        row: String,
        column: String,
        value: String,
    },

    /// Delete rows by id
    Delete {
        page: String,
        block: String,

        #[arg(required = true, num_args = 1..)]
        rows: Vec<String>,
    },

    /// Print a table as CSV
    Csv { page: String, block: String },
}
