//! Capability report binary.
//!
//! Binds against the configured hosting environment and prints a JSON
//! report: availability, API version, and which known capabilities the
//! runtime supports.
//!
//! # Environment Variables
//!
//! - `HOSTCAPS_DISABLE` / `HOSTCAPS_LIBRARY` / `HOSTCAPS_ENTRY_POINT` — see
//!   `hostcaps::config`
//! - `RUST_LOG` — Tracing filter (default: "info,hostcaps=debug")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin capability-report
//! # or with an explicit configuration file:
//! cargo run --bin capability-report --features dylib -- hostcaps.yaml
//! ```

use anyhow::Context;
use hostcaps::{BindingState, CapabilityLinker, LinkConfig};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hostcaps=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => LinkConfig::from_yaml_file(&path)
            .with_context(|| format!("Failed to load link configuration from {}", path))?,
        None => LinkConfig::from_env(),
    };
    tracing::info!("Binding with {:?}", config);

    let linker = CapabilityLinker::from_config(&config);
    if let BindingState::Faulted(fault) = linker.state() {
        tracing::error!("{}", fault);
        return Err(fault.clone()).context("Capability runtime is present but broken");
    }

    let report = linker.binding_report();
    let supported = report.capabilities.iter().filter(|c| c.supported).count();
    tracing::info!(
        "Capability layer available: {} ({} of {} capabilities supported)",
        report.available,
        supported,
        report.capabilities.len()
    );

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
