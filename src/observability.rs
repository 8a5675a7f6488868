use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

static INIT: OnceCell<()> = OnceCell::new();

/// Installs the global subscriber once. `RUST_LOG` wins over `level` when set.
pub fn init_tracing(level: &str, json: bool) {
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        let result = if json {
            let subscriber = Registry::default()
                .with(filter)
                .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr));
            tracing::subscriber::set_global_default(subscriber)
        } else {
            let subscriber = Registry::default()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_writer(std::io::stderr),
                );
            tracing::subscriber::set_global_default(subscriber)
        };
        if result.is_err() {
            tracing::debug!(target: "veil.session", "tracing.subscriber.already_set");
        }
    });
}
