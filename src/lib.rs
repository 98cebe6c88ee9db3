//! # Folio Architecture
//!
//! Folio is a **local-first workspace of linked pages**. Pages hold ordered,
//! typed blocks; blocks can reference other pages, and database blocks carry a
//! small spreadsheet. The whole workspace persists as one relational snapshot.
//!
//! Like any UI-agnostic library, the core never prints and never exits. The
//! bundled CLI is one client among many possible ones.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (cli/, wired by main.rs)                         │
//! │  - Parses arguments, formats output, handles terminal I/O   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Workspace Facade (workspace.rs)                            │
//! │  - Owns the page list, recovery buffer and store            │
//! │  - Resolves ids, validates, persists after every change     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Pure Logic (document.rs, links.rs, tabular/, recovery.rs)  │
//! │  - Value in, value out; no I/O, no clocks of their own      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage Layer (store/)                                     │
//! │  - DataStore trait: PageStore (SQLite snapshot), Autosaver  │
//! │  - BlobStore trait: FsBackend (production), MemBackend      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Testing Strategy
//!
//! 1. **Pure logic**: unit tests next to the code, no store involved.
//! 2. **Workspace**: unit tests over `PageStore<MemBackend>` with a
//!    [`ManualClock`](clock::ManualClock) driving recovery deadlines.
//! 3. **Storage and CLI**: integration tests in `tests/` against a temp dir.
//!
//! ## Module Overview
//!
//! - [`model`]: pages, blocks, ids and block metadata
//! - [`document`]: pure page and block transformations
//! - [`links`]: link resolution, inbound/outbound queries, dangling detection
//! - [`tabular`]: database block payloads, view queries and CSV export
//! - [`recovery`]: single-slot undo buffer for deleted pages
//! - [`store`]: relational snapshot persistence and background saves
//! - [`workspace`]: the facade
//! - [`config`], [`clock`], [`error`]: ambient plumbing

pub mod clock;
pub mod config;
pub mod document;
pub mod error;
pub mod links;
pub mod model;
pub mod recovery;
pub mod store;
pub mod tabular;
pub mod workspace;

pub use config::FolioConfig;
pub use error::{FolioError, Result, StorageError};
pub use model::{Block, BlockId, BlockType, LinkKind, Page, PageId};
pub use workspace::Workspace;
