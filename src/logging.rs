//! Logger setup for the binary.
//!
//! Every line carries the `[file:line]` of the call site so a message can be
//! traced straight back to the code that emitted it:
//!
//! ```text
//! 2024-05-01T18:03:11.512Z INFO  [src/commissioning.rs:96] bathroom_controller::commissioning: Initialize Zigbee stack
//! ```

use std::io::Write;

use anyhow::Result;
use env_logger::{Builder, Env};

/// Used when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "info";

/// Install the global logger. `RUST_LOG` overrides `default_filter`.
pub fn init(default_filter: &str) -> Result<()> {
    Builder::from_env(Env::default().default_filter_or(default_filter))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} [{}:{}] {}: {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("?"),
                record.line().unwrap_or(0),
                record.target(),
                record.args()
            )
        })
        .try_init()?;
    Ok(())
}
