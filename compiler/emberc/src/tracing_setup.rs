use std::sync::OnceLock;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

static INSTALLED: OnceLock<bool> = OnceLock::new();

/// Route compiler `tracing` events to stderr when `RUST_LOG` asks for them.
///
/// Returns whether this process has an ember subscriber. Only the first call
/// does any work. An unset or malformed `RUST_LOG` leaves logging off, and a
/// subscriber installed by someone else (a test harness) is left in place.
pub fn init_tracing() -> bool {
    *INSTALLED.get_or_init(|| {
        let Ok(filter) = EnvFilter::try_from_default_env() else {
            return false;
        };
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .try_init()
            .is_ok()
    })
}
