//! Log output setup
//!
//! Logs go to stderr so stdout only carries the banners and links CI jobs parse.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directive for a verbosity level
pub fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "relcheck=info",
        1 => "relcheck=debug",
        _ => "relcheck=trace,ureq=debug",
    }
}

/// Initialize tracing; `RUST_LOG` takes precedence over `-v`
pub fn init(verbose: u8) {
    let filter = EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_directive(verbose).into()),
    );

    // Keep any subscriber installed earlier
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
