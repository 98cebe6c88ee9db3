//! # Folio CLI
//!
//! The binary is intentionally thin: the CLI lives in `src/cli/` and this file
//! only invokes `cli::run()` and handles process termination.
//!
//! ```text
//!  main.rs ──▶ cli::run ──▶ args (clap) ──▶ handlers ──▶ Workspace<PageStore<FsBackend>>
//!                                              │
//!                                              └──▶ render (stdout)
//! ```
//!
//! Errors surface as `Error: <message>` on stderr with exit code 1. Logs go to
//! stderr too, filtered by `RUST_LOG` or the configured `log_level`.

mod cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
