use tracing_subscriber::{fmt, EnvFilter};

use crate::{errors::Error, Result};

/// Initialize tracing for the relay.
///
/// Default: info for the relay crates, warn for everything else. Can be overridden with
/// `RUST_LOG`.
pub fn init(service_name: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let crate_name = service_name.replace('-', "_");
        EnvFilter::new(format!(
            "warn,relay=info,relay_core=info,relay_chatgpt=info,relay_telegram=info,relay_whatsapp=info,{crate_name}=info"
        ))
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .try_init()
        .map_err(|e| Error::Config(format!("failed to install log subscriber: {e}")))
}
