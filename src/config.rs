//! # Configuration
//!
//! Folio configuration is declared with [`confique`], which handles layered
//! loading from a TOML file and environment variables.
//!
//! ## Storage Hierarchy
//!
//! Configuration is resolved in priority order:
//! 1. **Environment variables**: `FOLIO_RECOVERY_WINDOW_SECS`, `FOLIO_LOG_LEVEL`, etc.
//! 2. **Data directory config**: `folio.toml` next to the workspace blob.
//! 3. **Compiled Defaults**: Built-in fallbacks via `#[config(default = ...)]`.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `recovery_window_secs` | `10` | How long a deleted page can be restored |
//! | `autosave_debounce_ms` | `500` | Quiet time before a background save is written |
//! | `default_page_title` | `Workspace` | Title of bootstrap and replacement pages |
//! | `table_page_size` | `10` | Rows per page for new table views |
//! | `log_level` | `warn` | Log filter used when `RUST_LOG` is unset |

use crate::error::{FolioError, Result};
use confique::Config;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE: &str = "folio.toml";

/// Configuration for folio, stored in `folio.toml`.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FolioConfig {
    /// Seconds a deleted page stays in the recovery buffer.
    #[config(default = 10, env = "FOLIO_RECOVERY_WINDOW_SECS")]
    pub recovery_window_secs: u64,

    /// Trailing debounce for background saves, in milliseconds.
    #[config(default = 500, env = "FOLIO_AUTOSAVE_DEBOUNCE_MS")]
    pub autosave_debounce_ms: u64,

    /// Title given to the bootstrap page and to pages synthesized after the
    /// last page is deleted.
    #[config(default = "Workspace", env = "FOLIO_DEFAULT_PAGE_TITLE")]
    pub default_page_title: String,

    /// Rows per page for newly created table views.
    #[config(default = 10, env = "FOLIO_TABLE_PAGE_SIZE")]
    pub table_page_size: usize,

    #[config(default = "warn", env = "FOLIO_LOG_LEVEL")]
    pub log_level: String,
}

impl Default for FolioConfig {
    fn default() -> Self {
        Self {
            recovery_window_secs: 10,
            autosave_debounce_ms: 500,
            default_page_title: "Workspace".to_string(),
            table_page_size: 10,
            log_level: "warn".to_string(),
        }
    }
}

impl FolioConfig {
    /// Loads configuration for the workspace in `data_dir`. A missing
    /// `folio.toml` is not an error.
    pub fn load(data_dir: &Path) -> Result<Self> {
        FolioConfig::builder()
            .env()
            .file(data_dir.join(CONFIG_FILE))
            .load()
            .map_err(|e| FolioError::Config(e.to_string()))
    }

    pub fn recovery_window(&self) -> Duration {
        Duration::from_secs(self.recovery_window_secs)
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }
}
