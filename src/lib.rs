use druid::{Data, Lens};

pub mod app;
pub mod chart_widget;
pub mod error;
pub mod quote;
pub mod settings;
pub mod store;
pub mod ticker;

pub use error::{DispatchError, QuoteError, StartupError};
pub use quote::{QuoteFetcher, QuoteSource};
pub use settings::Settings;
pub use store::SampleStore;
pub use ticker::{ChartSink, TickOutcome, Ticker};

/// One price observation. `sequence_index` doubles as the x coordinate on the chart.
#[derive(Clone, Copy, Debug, PartialEq, Lens, Data)]
pub struct Sample {
    pub sequence_index: usize,
    pub price: f64,
}
