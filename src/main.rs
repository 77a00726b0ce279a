use druid::AppLauncher;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stock_monitor::app::{self, AppData, Delegate};
use stock_monitor::{QuoteFetcher, SampleStore, Settings, StartupError, Ticker};

const DEFAULT_LOG_DIRECTIVE: &str = "stock_monitor=info";

fn main() -> Result<(), StartupError> {
    // Diagnostics go to stderr; stdout carries one line per sampled price.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE)),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(true)
        .init();

    let settings = Settings::load()?;
    info!(?settings, "starting stock monitor");
    if settings.uses_placeholder_key() {
        warn!("no API key configured, set STOCK_MONITOR_API_KEY or api_key in StockMonitor.toml");
    }

    let launcher = AppLauncher::with_window(app::main_window(&settings)).delegate(Delegate);

    let fetcher = QuoteFetcher::from_settings(&settings)?;
    info!(symbol = fetcher.symbol(), interval_secs = settings.interval_secs, "polling quotes");
    let ticker = Ticker::new(
        fetcher,
        SampleStore::new(),
        launcher.get_external_handle(),
        settings.interval(),
    );
    ticker.spawn()?;

    launcher.launch(AppData::from_settings(&settings))?;
    Ok(())
}
