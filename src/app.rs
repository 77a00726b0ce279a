use std::sync::Arc;

use druid::widget::{Flex, Label, Padding, SizedBox};
use druid::{
    AppDelegate, Command, Data, DelegateCtx, Env, ExtEventSink, Handled, Lens, Selector, Target,
    Widget, WindowDesc,
};
use tracing::trace;

use crate::chart_widget::ChartWidget;
use crate::error::DispatchError;
use crate::settings::Settings;
use crate::ticker::ChartSink;
use crate::Sample;

/// Carries one freshly fetched sample from the ticker thread to the UI thread.
pub const APPEND_SAMPLE: Selector<Sample> = Selector::new("stock-monitor.append-sample");

const TITLE_FONT_SIZE: f64 = 18.0;

#[derive(Clone, Data, Lens)]
pub struct AppData {
    pub series: Arc<Vec<Sample>>,
    pub series_name: String,
    pub chart_title: String,
}

impl AppData {
    pub fn new(series_name: impl Into<String>, chart_title: impl Into<String>) -> Self {
        Self {
            series: Arc::new(vec![]),
            series_name: series_name.into(),
            chart_title: chart_title.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.display_name.clone(), settings.chart_title.clone())
    }

    /// The only mutation the chart supports. Must run on the UI thread.
    pub fn append_point(&mut self, sample: Sample) {
        Arc::make_mut(&mut self.series).push(sample);
    }

    pub fn point_count(&self) -> usize {
        self.series.len()
    }
}

/// Applies a command coming from outside the UI thread to the chart state.
pub fn apply_command(cmd: &Command, data: &mut AppData) -> Handled {
    match cmd.get(APPEND_SAMPLE) {
        Some(sample) => {
            trace!(sequence_index = sample.sequence_index, price = sample.price, "appending point");
            data.append_point(*sample);
            Handled::Yes
        }
        None => Handled::No,
    }
}

pub struct Delegate;

impl AppDelegate<AppData> for Delegate {
    fn command(
        &mut self,
        _ctx: &mut DelegateCtx,
        _target: Target,
        cmd: &Command,
        data: &mut AppData,
        _env: &Env,
    ) -> Handled {
        apply_command(cmd, data)
    }
}

impl ChartSink for ExtEventSink {
    fn append_point(&self, sample: Sample) -> Result<(), DispatchError> {
        self.submit_command(APPEND_SAMPLE, sample, Target::Auto)
            .map_err(|err| DispatchError(err.to_string()))
    }
}

pub fn build_ui() -> impl Widget<AppData> {
    Padding::new(
        5.0,
        Flex::column()
            .with_child(
                Label::new(|data: &AppData, _env: &Env| data.chart_title.clone())
                    .with_text_size(TITLE_FONT_SIZE),
            )
            .with_spacer(8.0)
            .with_flex_child(
                SizedBox::new(Padding::new(10.0, ChartWidget::empty()))
                    .expand_height()
                    .expand_width(),
                1.0,
            ),
    )
}

pub fn main_window(settings: &Settings) -> WindowDesc<AppData> {
    WindowDesc::new(build_ui())
        .title(settings.window_title.clone())
        .window_size((settings.window_width, settings.window_height))
}
