use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Local;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::error::DispatchError;
use crate::quote::QuoteSource;
use crate::store::SampleStore;
use crate::Sample;

/// Hand-off from the ticker thread into whatever draws the chart.
///
/// Implementations must be safe to call from a thread other than the UI thread.
pub trait ChartSink: Send {
    fn append_point(&self, sample: Sample) -> Result<(), DispatchError>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickOutcome {
    Appended(Sample),
    Failed,
}

/// Polls a [`QuoteSource`] at a fixed period and forwards every price it gets.
pub struct Ticker<S, C> {
    source: S,
    store: SampleStore,
    sink: C,
    period: Duration,
}

impl<S, C> Ticker<S, C>
where
    S: QuoteSource,
    C: ChartSink,
{
    pub fn new(source: S, store: SampleStore, sink: C, period: Duration) -> Self {
        Self {
            source,
            store,
            sink,
            period,
        }
    }

    pub fn store(&self) -> &SampleStore {
        &self.store
    }

    /// One firing: fetch, then record and forward the price. Errors end here.
    pub async fn tick(&self) -> TickOutcome {
        let result = self.source.fetch_latest_price().await;
        let timestamp = Local::now().format("%H:%M:%S").to_string();

        match result {
            Ok(price) => {
                let sample = self.store.append(price);
                if let Err(err) = self.sink.append_point(sample) {
                    warn!(%err, sequence_index = sample.sequence_index, "sample not shown on chart");
                }
                println!("{}", price_line(&timestamp, price));
                TickOutcome::Appended(sample)
            }
            Err(err) => {
                eprintln!("Error: {}", err);
                debug!(?err, "tick failed");
                TickOutcome::Failed
            }
        }
    }

    /// Fires immediately, then on every multiple of the period after the start, forever.
    ///
    /// A fetch is always awaited before the next firing, so ticks never
    /// overlap. Grid slots that pass while a fetch is still running are
    /// dropped; the next firing is the first slot after the fetch returns.
    pub async fn run(self) {
        let start = Instant::now();

        info!(period_secs = self.period.as_secs(), "ticker started");
        loop {
            self.tick().await;
            time::sleep_until(next_firing(start, self.period, Instant::now())).await;
        }
    }
}

/// First grid slot `start + k * period` strictly after `now`.
fn next_firing(start: Instant, period: Duration, now: Instant) -> Instant {
    let elapsed = now.saturating_duration_since(start).as_nanos();
    let period_nanos = period.as_nanos().max(1);
    let slots = u32::try_from(elapsed / period_nanos + 1).unwrap_or(u32::MAX);
    start + period * slots
}

fn price_line(timestamp: &str, price: f64) -> String {
    format!("Timestamp: {}, Price: {:?}", timestamp, price)
}

impl<S, C> Ticker<S, C>
where
    S: QuoteSource + 'static,
    C: ChartSink + 'static,
{
    /// Runs the ticker on its own thread with a single-threaded tokio runtime.
    ///
    /// The runtime is built before the thread starts, so a failure surfaces here.
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        thread::Builder::new()
            .name("ticker".to_string())
            .spawn(move || runtime.block_on(self.run()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QuoteError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ScriptedSource {
        replies: Mutex<VecDeque<Result<f64, QuoteError>>>,
    }

    impl ScriptedSource {
        fn new(replies: Vec<Result<f64, QuoteError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
            }
        }
    }

    #[async_trait]
    impl QuoteSource for ScriptedSource {
        async fn fetch_latest_price(&self) -> Result<f64, QuoteError> {
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(QuoteError::UnexpectedSchema("script exhausted".into())))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        points: Arc<Mutex<Vec<Sample>>>,
    }

    impl ChartSink for RecordingSink {
        fn append_point(&self, sample: Sample) -> Result<(), DispatchError> {
            self.points.lock().push(sample);
            Ok(())
        }
    }

    struct ClosedSink;

    impl ChartSink for ClosedSink {
        fn append_point(&self, _sample: Sample) -> Result<(), DispatchError> {
            Err(DispatchError("window closed".into()))
        }
    }

    fn period() -> Duration {
        Duration::from_secs(60)
    }

    #[tokio::test]
    async fn successful_tick_appends_one_sample() {
        let sink = RecordingSink::default();
        let ticker = Ticker::new(
            ScriptedSource::new(vec![Ok(150.25)]),
            SampleStore::new(),
            sink.clone(),
            period(),
        );

        let before = ticker.store().len();
        let outcome = ticker.tick().await;

        let expected = Sample { sequence_index: before, price: 150.25 };
        assert_eq!(outcome, TickOutcome::Appended(expected));
        assert_eq!(ticker.store().len(), before + 1);
        assert_eq!(*sink.points.lock(), vec![expected]);
    }

    #[tokio::test]
    async fn failed_tick_changes_nothing() {
        let sink = RecordingSink::default();
        let ticker = Ticker::new(
            ScriptedSource::new(vec![Err(QuoteError::RateLimited("slow down".into()))]),
            SampleStore::new(),
            sink.clone(),
            period(),
        );

        assert_eq!(ticker.tick().await, TickOutcome::Failed);
        assert!(ticker.store().is_empty());
        assert!(sink.points.lock().is_empty());
    }

    #[tokio::test]
    async fn chart_points_match_successful_ticks() {
        let script = vec![
            Err(QuoteError::Transport { status: 503 }),
            Ok(100.0),
            Ok(101.0),
            Err(QuoteError::InvalidRequest("bad".into())),
            Err(QuoteError::UnexpectedSchema("missing".into())),
            Ok(99.5),
            Err(QuoteError::RateLimited("note".into())),
            Ok(102.0),
        ];
        let successes = script.iter().filter(|reply| reply.is_ok()).count();
        let ticks = script.len();

        let sink = RecordingSink::default();
        let ticker = Ticker::new(ScriptedSource::new(script), SampleStore::new(), sink.clone(), period());
        for _ in 0..ticks {
            ticker.tick().await;
        }

        let points = sink.points.lock().clone();
        assert_eq!(points.len(), successes);
        assert_eq!(ticker.store().snapshot(), points);
        let prices: Vec<f64> = points.iter().map(|p| p.price).collect();
        assert_eq!(prices, vec![100.0, 101.0, 99.5, 102.0]);
        for (i, point) in points.iter().enumerate() {
            assert_eq!(point.sequence_index, i);
        }
    }

    #[tokio::test]
    async fn closed_chart_still_records_the_sample() {
        let ticker = Ticker::new(
            ScriptedSource::new(vec![Ok(42.0)]),
            SampleStore::new(),
            ClosedSink,
            period(),
        );

        assert!(matches!(ticker.tick().await, TickOutcome::Appended(_)));
        assert_eq!(ticker.store().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_fires_immediately_then_every_period() {
        let sink = RecordingSink::default();
        let store = SampleStore::new();
        let ticker = Ticker::new(
            ScriptedSource::new(vec![Ok(1.0), Ok(2.0), Ok(3.0), Ok(4.0)]),
            store.clone(),
            sink.clone(),
            period(),
        );
        let handle = tokio::spawn(ticker.run());

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.len(), 1);

        time::sleep(Duration::from_secs(149)).await;
        assert_eq!(store.len(), 3);
        assert_eq!(sink.points.lock().len(), 3);

        handle.abort();
    }

    struct SlowFirstSource {
        calls: Arc<AtomicUsize>,
        first_delay: Duration,
    }

    #[async_trait]
    impl QuoteSource for SlowFirstSource {
        async fn fetch_latest_price(&self) -> Result<f64, QuoteError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                time::sleep(self.first_delay).await;
            }
            Ok(10.0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn overrunning_fetch_waits_for_the_next_grid_slot() {
        let store = SampleStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let source = SlowFirstSource {
            calls: calls.clone(),
            first_delay: Duration::from_secs(130),
        };
        let ticker = Ticker::new(source, store.clone(), RecordingSink::default(), period());
        let handle = tokio::spawn(ticker.run());

        // first fetch returns at t=130; the slots at 60 and 120 are gone
        time::sleep(Duration::from_secs(170)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.len(), 1);

        time::sleep(Duration::from_secs(15)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.len(), 2);

        handle.abort();
    }

    #[test]
    fn next_firing_lands_on_the_grid() {
        let start = Instant::now();
        let secs = Duration::from_secs;

        assert_eq!(next_firing(start, period(), start), start + secs(60));
        assert_eq!(next_firing(start, period(), start + secs(2)), start + secs(60));
        assert_eq!(next_firing(start, period(), start + secs(60)), start + secs(120));
        assert_eq!(next_firing(start, period(), start + secs(130)), start + secs(180));
    }

    #[test]
    fn price_line_keeps_the_decimal_point() {
        assert_eq!(price_line("09:31:00", 151.0), "Timestamp: 09:31:00, Price: 151.0");
        assert_eq!(price_line("09:32:00", 150.25), "Timestamp: 09:32:00, Price: 150.25");
    }

    #[test]
    fn spawned_ticker_fires_on_its_own_thread() {
        let store = SampleStore::new();
        let ticker = Ticker::new(
            ScriptedSource::new(vec![Ok(5.0)]),
            store.clone(),
            RecordingSink::default(),
            period(),
        );
        let handle = ticker.spawn().unwrap();
        assert_eq!(handle.thread().name(), Some("ticker"));

        for _ in 0..200 {
            if !store.is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(store.snapshot(), vec![Sample { sequence_index: 0, price: 5.0 }]);
    }
}
