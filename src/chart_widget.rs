use std::sync::Arc;
use std::time::Instant;

use druid::kurbo::{BezPath, Circle, Line};
use druid::piet::{FontFamily, Text, TextLayout, TextLayoutBuilder};
use druid::widget::prelude::*;
use druid::{Color, Data, Point};
use tracing::{trace, warn};

use crate::app::AppData;
use crate::Sample;

const FONT_SIZE: f64 = 14.0;
const POINT_SPACING: f64 = 6.0; // Never draw consecutive samples closer than this
const MARKER_RADIUS: f64 = 2.5;
const LEFT_PADDING: f64 = 10.0;
const TOP_PADDING: f64 = 30.0; // Room for the legend
const X_AXIS_LABELS_PADDING: f64 = 45.0;
const Y_AXIS_LABELS_PADDING: f64 = 70.0;
const X_TICK_SPACING: f64 = 80.0;
const Y_TICK_SPACING: f64 = 50.0; // Ticks on y axis roughly every 50 pixels
const TICK_LENGTH: f64 = 5.0;
const FLAT_SERIES_PAD: f64 = 0.5;
const DEFAULT_SIZE: Size = Size::new(400.0, 300.0);
static X_AXIS_TICK_INCREMENTS: &[f64] = &[1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 500.0, 1000.0];
static Y_AXIS_TICK_INCREMENTS: &[f64] = &[0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 50.0, 100.0, 500.0];
const TEXT_COLOR: Color = Color::rgb8(0xef, 0xf8, 0xff);
const SERIES_COLOR: Color = Color::rgb8(0x38, 0xc1, 0x72);

#[derive(Clone, Copy, Debug, PartialEq)]
struct PriceRange {
    lowest: f64,
    highest: f64,
}

impl PriceRange {
    fn range(&self) -> f64 {
        self.highest - self.lowest
    }
}

/// Line chart of the sampled prices.
///
/// The x axis is the sample sequence index, the y axis the price. Both axes
/// autoscale to the samples that fit on screen.
pub struct ChartWidget {
    samples: Arc<Vec<Sample>>,
    size: Size,
}

struct AxisLabel {
    /// Label text
    label: String,

    /// Anchor point of the label
    position: Point,

    /// 0.0 puts the anchor at the left edge of the text, 0.5 centers it
    align: f64,
}

struct AxisTick {
    tick_line: Line,
    label: AxisLabel,
}

/// Picks the increment that gives the number of ticks closest to `approx_num_of_ticks`.
fn tick_size(span: f64, approx_num_of_ticks: f64, increments: &[f64]) -> f64 {
    let mut closest_tick_size = increments[0];
    let mut closest_num_ticks = span / closest_tick_size;

    for tick_size in increments {
        let num_ticks = span / tick_size;
        if (num_ticks - approx_num_of_ticks).abs() < (closest_num_ticks - approx_num_of_ticks).abs() {
            closest_tick_size = *tick_size;
            closest_num_ticks = num_ticks;
        }
    }
    closest_tick_size
}

fn decimals_for(tick_size: f64) -> usize {
    if tick_size >= 1.0 {
        0
    } else {
        (-tick_size.log10()).ceil() as usize
    }
}

impl ChartWidget {
    pub fn new(samples: Arc<Vec<Sample>>, size: Size) -> Self {
        Self { samples, size }
    }

    pub fn empty() -> Self {
        Self {
            samples: Arc::new(vec![]),
            size: Size::ZERO,
        }
    }

    fn plot_width(&self) -> f64 {
        (self.size.width - Y_AXIS_LABELS_PADDING - LEFT_PADDING).max(0.0)
    }

    fn plot_height(&self) -> f64 {
        (self.size.height - X_AXIS_LABELS_PADDING - TOP_PADDING).max(0.0)
    }

    /// The most recent samples that fit in the plot area at `POINT_SPACING`.
    fn visible_samples(&self) -> &[Sample] {
        let capacity = (self.plot_width() / POINT_SPACING).floor() as usize + 1;
        let start = self.samples.len().saturating_sub(capacity);
        &self.samples[start..]
    }

    /// The price range of the samples that will be visible on the rendered graph
    fn price_range(&self, samples: &[Sample]) -> Option<PriceRange> {
        let first = samples.first()?;
        let (lowest, highest) = samples
            .iter()
            .fold((first.price, first.price), |(low, high), sample| {
                (low.min(sample.price), high.max(sample.price))
            });

        if highest - lowest < f64::EPSILON {
            Some(PriceRange {
                lowest: lowest - FLAT_SERIES_PAD,
                highest: highest + FLAT_SERIES_PAD,
            })
        } else {
            Some(PriceRange { lowest, highest })
        }
    }

    fn index_span(samples: &[Sample]) -> Option<(usize, usize)> {
        Some((samples.first()?.sequence_index, samples.last()?.sequence_index))
    }

    fn x_for(&self, index: usize, first_index: usize, last_index: usize) -> f64 {
        let span = (last_index - first_index).max(1) as f64;
        LEFT_PADDING + (index - first_index) as f64 / span * self.plot_width()
    }

    fn y_for(&self, price: f64, prices: PriceRange) -> f64 {
        TOP_PADDING + (prices.highest - price) / prices.range() * self.plot_height()
    }

    fn to_screen(&self, sample: &Sample, prices: PriceRange, first_index: usize, last_index: usize) -> Point {
        Point::new(
            self.x_for(sample.sequence_index, first_index, last_index),
            self.y_for(sample.price, prices),
        )
    }

    fn plot_bottom(&self) -> f64 {
        TOP_PADDING + self.plot_height()
    }

    fn plot_right(&self) -> f64 {
        LEFT_PADDING + self.plot_width()
    }

    fn x_axis(&self) -> Line {
        Line::new((LEFT_PADDING, self.plot_bottom()), (self.plot_right(), self.plot_bottom()))
    }

    fn y_axis(&self) -> Line {
        Line::new((self.plot_right(), TOP_PADDING), (self.plot_right(), self.plot_bottom()))
    }

    fn y_axis_ticks(&self) -> Vec<AxisTick> {
        let prices = match self.price_range(self.visible_samples()) {
            Some(prices) => prices,
            None => return vec![],
        };
        let approx_num_of_ticks = self.plot_height() / Y_TICK_SPACING;
        let step = tick_size(prices.range(), approx_num_of_ticks, Y_AXIS_TICK_INCREMENTS);
        let decimals = decimals_for(step);

        let mut ticks: Vec<AxisTick> = vec![];
        let mut n = (prices.lowest / step).ceil();
        while n * step <= prices.highest {
            let price = n * step;
            let y = self.y_for(price, prices);
            ticks.push(AxisTick {
                tick_line: Line::new((self.plot_right(), y), (self.plot_right() + TICK_LENGTH, y)),
                label: AxisLabel {
                    label: format!("{:.*}", decimals, price),
                    position: Point::new(self.plot_right() + 2.0 * TICK_LENGTH, y - FONT_SIZE / 2.0),
                    align: 0.0,
                },
            });
            n += 1.0;
        }
        ticks
    }

    fn x_axis_ticks(&self) -> Vec<AxisTick> {
        let (first_index, last_index) = match Self::index_span(self.visible_samples()) {
            Some(span) => span,
            None => return vec![],
        };
        let approx_num_of_ticks = (self.plot_width() / X_TICK_SPACING).max(1.0);
        let step = tick_size((last_index - first_index) as f64, approx_num_of_ticks, X_AXIS_TICK_INCREMENTS) as usize;

        let mut ticks: Vec<AxisTick> = vec![];
        let mut index = (first_index + step - 1) / step * step;
        while index <= last_index {
            let x = self.x_for(index, first_index, last_index);
            ticks.push(AxisTick {
                tick_line: Line::new((x, self.plot_bottom()), (x, self.plot_bottom() + TICK_LENGTH)),
                label: AxisLabel {
                    label: index.to_string(),
                    position: Point::new(x, self.plot_bottom() + TICK_LENGTH),
                    align: 0.5,
                },
            });
            index += step;
        }
        ticks
    }

    fn axis_titles(&self) -> Vec<AxisLabel> {
        vec![
            AxisLabel {
                label: "Time".to_string(),
                position: Point::new(LEFT_PADDING + self.plot_width() / 2.0, self.plot_bottom() + TICK_LENGTH + FONT_SIZE + 6.0),
                align: 0.5,
            },
            AxisLabel {
                label: "Price".to_string(),
                position: Point::new(self.plot_right() + 2.0 * TICK_LENGTH, TOP_PADDING - FONT_SIZE - 6.0),
                align: 0.0,
            },
        ]
    }

    /// Polyline through the visible samples, oldest first.
    fn series_path(&self) -> Option<BezPath> {
        let samples = self.visible_samples();
        let prices = self.price_range(samples)?;
        let (first_index, last_index) = Self::index_span(samples)?;

        let mut path = BezPath::new();
        let mut points = samples.iter().map(|sample| self.to_screen(sample, prices, first_index, last_index));
        path.move_to(points.next()?);
        for point in points {
            path.line_to(point);
        }
        Some(path)
    }

    fn markers(&self) -> Vec<Circle> {
        let samples = self.visible_samples();
        let (prices, (first_index, last_index)) = match (self.price_range(samples), Self::index_span(samples)) {
            (Some(prices), Some(span)) => (prices, span),
            _ => return vec![],
        };
        samples
            .iter()
            .map(|sample| Circle::new(self.to_screen(sample, prices, first_index, last_index), MARKER_RADIUS))
            .collect()
    }
}

fn draw_label(ctx: &mut PaintCtx, label: AxisLabel) {
    let layout = ctx
        .text()
        .new_text_layout(label.label)
        .font(FontFamily::SANS_SERIF, FONT_SIZE)
        .text_color(TEXT_COLOR)
        .build();
    match layout {
        Ok(layout) => {
            let origin = Point::new(label.position.x - layout.size().width * label.align, label.position.y);
            ctx.draw_text(&layout, origin);
        }
        Err(err) => warn!(%err, "could not lay out chart label"),
    }
}

impl Widget<AppData> for ChartWidget {
    fn event(&mut self, _ctx: &mut EventCtx, _event: &Event, _data: &mut AppData, _env: &Env) {}

    fn lifecycle(&mut self, _ctx: &mut LifeCycleCtx, _event: &LifeCycle, _data: &AppData, _env: &Env) {}

    fn update(&mut self, ctx: &mut UpdateCtx, old_data: &AppData, data: &AppData, _env: &Env) {
        if !old_data.same(data) {
            ctx.request_paint();
        }
    }

    fn layout(&mut self, _layout_ctx: &mut LayoutCtx, bc: &BoxConstraints, _data: &AppData, _env: &Env) -> Size {
        // Take all the room we are given; fall back to a fixed size when unbounded (e.g. scrolling).
        if bc.is_width_bounded() && bc.is_height_bounded() {
            bc.max()
        } else {
            bc.constrain(DEFAULT_SIZE)
        }
    }

    fn paint(&mut self, ctx: &mut PaintCtx, data: &AppData, _env: &Env) {
        let start_time = Instant::now();

        let widget = ChartWidget::new(data.series.clone(), ctx.size());
        ctx.stroke(widget.x_axis(), &TEXT_COLOR, 1.0);
        ctx.stroke(widget.y_axis(), &TEXT_COLOR, 1.0);

        for tick in widget.y_axis_ticks().into_iter().chain(widget.x_axis_ticks()) {
            ctx.stroke(tick.tick_line, &TEXT_COLOR, 1.0);
            draw_label(ctx, tick.label);
        }
        for title in widget.axis_titles() {
            draw_label(ctx, title);
        }

        // Legend
        let legend_y = TOP_PADDING / 2.0;
        ctx.stroke(Line::new((LEFT_PADDING, legend_y), (LEFT_PADDING + 20.0, legend_y)), &SERIES_COLOR, 2.0);
        draw_label(
            ctx,
            AxisLabel {
                label: data.series_name.clone(),
                position: Point::new(LEFT_PADDING + 26.0, legend_y - FONT_SIZE / 2.0 - 2.0),
                align: 0.0,
            },
        );

        if let Some(path) = widget.series_path() {
            ctx.stroke(path, &SERIES_COLOR, 2.0);
        }
        for marker in widget.markers() {
            ctx.fill(marker, &SERIES_COLOR);
        }

        trace!(points = data.point_count(), elapsed_us = start_time.elapsed().as_micros() as u64, "chart painted");
    }
}
