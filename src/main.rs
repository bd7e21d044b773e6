//! Snap blog feed: binary entrypoint
//! Boots the Axum HTTP server, wiring config, shared state, and metrics.

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use snap_blog_feed::metrics::Metrics;
use snap_blog_feed::AppConfig;

/// Compact tracing logs; `RUST_LOG` overrides the default filter.
/// The runtime may already have installed a subscriber, in which case this is a no-op.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("snap_blog_feed=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = AppConfig::load_default()?;
    let mut router = snap_blog_feed::app(&cfg)?;

    match Metrics::init(cfg.fetch.timeout_ms) {
        Ok(metrics) => router = router.merge(metrics.router()),
        Err(e) => tracing::warn!(error = ?e, "metrics disabled"),
    }

    Ok(router.into())
}
