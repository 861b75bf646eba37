//! Tracing subscriber setup.
//!
//! `PHOTONMAP_LOG` holds an `EnvFilter` directive (default `info`).
//! With the `chrome-trace` feature and `PHOTONMAP_TRACE=1`, spans are also
//! written to `trace.json` for chrome://tracing.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "PHOTONMAP_LOG";

/// Keeps optional trace outputs alive; flushes on drop.
#[derive(Default)]
pub struct TraceGuard {
    #[cfg(feature = "chrome-trace")]
    _chrome: Option<tracing_chrome::FlushGuard>,
}

/// Install the global subscriber.
///
/// Returns `None` if a global subscriber was already set (tests, host
/// applications); that is not an error.
pub fn init_tracing() -> Option<TraceGuard> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(false);

    #[cfg(feature = "chrome-trace")]
    {
        if std::env::var("PHOTONMAP_TRACE").ok().as_deref() == Some("1") {
            let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
                .file("trace.json")
                .build();
            let subscriber = tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .with(chrome_layer);
            if tracing::subscriber::set_global_default(subscriber).is_err() {
                return None;
            }
            return Some(TraceGuard { _chrome: Some(guard) });
        }
    }

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return None;
    }
    Some(TraceGuard::default())
}
