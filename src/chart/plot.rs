//! Renders the common subset of chart specifications to SVG and rasterizes
//! it: scatter/line and bar traces, axis ranges and titles, tick labels,
//! line/rect/circle shapes and text annotations.

use std::sync::{Arc, LazyLock};

use image::RgbImage;
use itertools::Itertools;
use resvg::{tiny_skia, usvg};
use serde::Deserialize;
use serde_json::Value;

use super::{ChartRenderer, ChartSpec, RenderError};

const GRID: &str = "#e6e6e6";
const AXIS: &str = "#505050";
const LABEL: &str = "#374151";
const PALETTE: [&str; 6] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b",
];
const TICKS: u32 = 5;
const MAX_CATEGORY_LABELS: usize = 10;

static FONTS: LazyLock<Arc<usvg::fontdb::Database>> = LazyLock::new(|| {
    let mut fonts = usvg::fontdb::Database::new();
    fonts.load_system_fonts();
    tracing::debug!("Loaded {} font faces for chart text", fonts.len());
    Arc::new(fonts)
});

#[derive(Debug, Default, Clone, Copy)]
pub struct PlotRenderer;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Trace {
    x: Vec<Value>,
    y: Vec<Value>,
    #[serde(rename = "type")]
    kind: Option<String>,
    mode: Option<String>,
    line: Paint,
    marker: Paint,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Paint {
    color: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Layout {
    title: Option<Value>,
    xaxis: Axis,
    yaxis: Axis,
    shapes: Vec<Shape>,
    annotations: Vec<Annotation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Axis {
    range: Option<Vec<Value>>,
    title: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Shape {
    #[serde(rename = "type")]
    kind: String,
    x0: Value,
    y0: Value,
    x1: Value,
    y1: Value,
    line: Paint,
    fillcolor: Option<Value>,
    opacity: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Annotation {
    x: Value,
    y: Value,
    text: String,
    xref: Option<String>,
    yref: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Kind {
    Scatter { lines: bool, markers: bool },
    Bar,
}

#[derive(Debug)]
struct Series {
    kind: Kind,
    color: String,
    points: Vec<(f64, f64)>,
}

/// Maps data coordinates onto the plot area of the canvas.
#[derive(Debug, Clone, Copy)]
struct Frame {
    x_range: (f64, f64),
    y_range: (f64, f64),
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    canvas: (f64, f64),
    font_size: f64,
    bar_half_width: f64,
}

impl ChartRenderer for PlotRenderer {
    fn render(&self, spec: &ChartSpec, width: u32, height: u32) -> Result<RgbImage, RenderError> {
        let svg = chart_svg(spec, width, height)?;
        rasterize(&svg, width, height)
    }
}

/// Builds the SVG document for `spec` on a `width` by `height` canvas.
pub fn chart_svg(spec: &ChartSpec, width: u32, height: u32) -> Result<String, RenderError> {
    let layout: Layout = serde_json::from_value(Value::Object(spec.layout.clone()))?;
    let traces = spec
        .data
        .iter()
        .map(|trace| serde_json::from_value::<Trace>(trace.clone()))
        .collect::<Result<Vec<_>, _>>()?;

    let categories = traces
        .iter()
        .find_map(|trace| categories(&trace.x))
        .unwrap_or_default();
    let series = traces
        .into_iter()
        .enumerate()
        .filter_map(|(i, trace)| series_from_trace(trace, i))
        .collect::<Vec<_>>();

    if series.is_empty() {
        return Err(RenderError::NothingToPlot);
    }

    let frame = Frame::new(&series, &layout, width, height);
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}" font-family="sans-serif">"#
    );
    svg.push_str(&format!(
        r#"<rect x="0" y="0" width="{width}" height="{height}" fill="white"/>"#
    ));
    svg.push_str(&format!(
        r#"<defs><clipPath id="plot"><rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}"/></clipPath></defs>"#,
        frame.left, frame.top, frame.width, frame.height
    ));

    frame.grid(&mut svg, &categories);

    svg.push_str(r#"<g clip-path="url(#plot)">"#);
    for shape in &layout.shapes {
        shape_svg(&mut svg, &frame, shape);
    }
    for series in &series {
        series_svg(&mut svg, &frame, series);
    }
    svg.push_str("</g>");

    for annotation in &layout.annotations {
        annotation_svg(&mut svg, &frame, annotation);
    }
    frame.titles(&mut svg, &layout);

    svg.push_str("</svg>");
    Ok(svg)
}

fn rasterize(svg: &str, width: u32, height: u32) -> Result<RgbImage, RenderError> {
    let mut options = usvg::Options::default();
    options.fontdb = FONTS.clone();
    let tree = usvg::Tree::from_str(svg, &options)?;

    let mut pixmap =
        tiny_skia::Pixmap::new(width, height).ok_or(RenderError::Surface { width, height })?;
    pixmap.fill(tiny_skia::Color::WHITE);
    resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());

    // The canvas is opaque, so demultiplying leaves the colours untouched.
    let rgb = pixmap
        .pixels()
        .iter()
        .flat_map(|pixel| {
            let color = pixel.demultiply();
            [color.red(), color.green(), color.blue()]
        })
        .collect();
    RgbImage::from_raw(width, height, rgb).ok_or(RenderError::Surface { width, height })
}

fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Accepts hex, named and `rgb()`-style colours; anything else could break
/// out of the attribute it is written into.
fn paint(value: &Value) -> Option<String> {
    let s = value.as_str()?.trim();
    let allowed = |c: char| c.is_ascii_alphanumeric() || "#(),.% ".contains(c);
    (!s.is_empty() && s.chars().all(allowed)).then(|| s.to_string())
}

fn title_text(value: &Option<Value>) -> Option<&str> {
    let text = match value.as_ref()? {
        Value::String(s) => s.as_str(),
        Value::Object(title) => title.get("text")?.as_str()?,
        _ => return None,
    };
    let text = text.trim();
    (!text.is_empty()).then_some(text)
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Plain text of a label; line breaks in the label become spaces.
fn label_text(text: &str) -> String {
    escape_xml(&text.replace("<br>", " ").replace("<br/>", " "))
}

fn format_tick(value: f64, step: f64) -> String {
    let decimals = (-step.abs().log10().floor()).clamp(0.0, 6.0) as usize;
    let text = format!("{value:.decimals$}");
    if text.trim_start_matches(['-', '0', '.']).is_empty() {
        "0".to_string()
    } else {
        text
    }
}

/// Category names when the x values are not all numeric.
fn categories(x: &[Value]) -> Option<Vec<String>> {
    let is_category = |v: &Value| v.is_string() && number(v).is_none();
    if !x.iter().any(is_category) {
        return None;
    }
    Some(
        x.iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
    )
}

fn series_from_trace(trace: Trace, index: usize) -> Option<Series> {
    let kind = match trace.kind.as_deref().unwrap_or("scatter") {
        "bar" => Kind::Bar,
        "scatter" | "scattergl" | "line" => {
            let mode = trace.mode.clone().unwrap_or_else(|| {
                if trace.y.len() <= 20 {
                    "lines+markers".to_string()
                } else {
                    "lines".to_string()
                }
            });
            Kind::Scatter {
                lines: mode.contains("lines"),
                markers: mode.contains("markers"),
            }
        }
        other => {
            tracing::debug!("Skipping unsupported trace type {}", other);
            return None;
        }
    };

    // Non-numeric x values are categories placed at their index.
    let points = trace
        .y
        .iter()
        .enumerate()
        .filter_map(|(i, y)| {
            let x = trace.x.get(i).and_then(number).unwrap_or(i as f64);
            Some((x, number(y)?))
        })
        .collect::<Vec<_>>();
    if points.is_empty() {
        return None;
    }

    let color = [&trace.line.color, &trace.marker.color]
        .into_iter()
        .flatten()
        .find_map(paint)
        .unwrap_or_else(|| PALETTE[index % PALETTE.len()].to_string());

    Some(Series {
        kind,
        color,
        points,
    })
}

fn explicit_range(axis: &Axis) -> Option<(f64, f64)> {
    let range = axis.range.as_ref()?;
    let (lo, hi) = range.iter().filter_map(number).collect_tuple()?;
    (lo != hi).then_some((lo, hi))
}

fn auto_range(values: impl Iterator<Item = f64>, include_zero: bool) -> (f64, f64) {
    let (mut lo, mut hi) = match values.minmax().into_option() {
        Some(bounds) => bounds,
        None => (0.0, 1.0),
    };
    if include_zero {
        lo = lo.min(0.0);
        hi = hi.max(0.0);
    }
    if lo == hi {
        return (lo - 1.0, hi + 1.0);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad, hi + pad)
}

/// Half the bar width in data units: 40% of the closest spacing between bars.
fn bar_half_width(series: &[Series]) -> f64 {
    let xs = series
        .iter()
        .filter(|s| s.kind == Kind::Bar)
        .flat_map(|s| s.points.iter().map(|&(x, _)| x))
        .sorted_by(|a, b| a.total_cmp(b))
        .dedup()
        .collect::<Vec<_>>();
    let step = xs
        .iter()
        .tuple_windows()
        .map(|(a, b)| b - a)
        .filter(|d| *d > 0.0)
        .min_by(|a, b| a.total_cmp(b))
        .unwrap_or(1.0);
    step * 0.4
}

impl Frame {
    fn new(series: &[Series], layout: &Layout, width: u32, height: u32) -> Self {
        let has_bars = series.iter().any(|s| s.kind == Kind::Bar);
        let points = || series.iter().flat_map(|s| s.points.iter().copied());
        let bar_half_width = bar_half_width(series);

        let x_range = explicit_range(&layout.xaxis).unwrap_or_else(|| {
            let (lo, hi) = auto_range(points().map(|(x, _)| x), false);
            if has_bars {
                let (min, max) = points().map(|(x, _)| x).minmax().into_option().unwrap_or((lo, hi));
                let reach = bar_half_width * 1.25;
                (lo.min(min - reach), hi.max(max + reach))
            } else {
                (lo, hi)
            }
        });
        let y_range = explicit_range(&layout.yaxis)
            .unwrap_or_else(|| auto_range(points().map(|(_, y)| y), has_bars));

        let (w, h) = (width as f64, height as f64);
        let font_size = (h * 0.045).clamp(8.0, 16.0);
        let top = font_size * if title_text(&layout.title).is_some() { 2.6 } else { 1.0 };
        let bottom = font_size * if title_text(&layout.xaxis.title).is_some() { 3.6 } else { 2.2 };
        let left = font_size * if title_text(&layout.yaxis.title).is_some() { 5.4 } else { 4.0 };
        let right = font_size;

        Self {
            x_range,
            y_range,
            left,
            top,
            width: (w - left - right).max(1.0),
            height: (h - top - bottom).max(1.0),
            canvas: (w, h),
            font_size,
            bar_half_width,
        }
    }

    fn right(&self) -> f64 {
        self.left + self.width
    }

    fn bottom(&self) -> f64 {
        self.top + self.height
    }

    fn to_px(&self, x: f64, y: f64) -> (f64, f64) {
        let (x0, x1) = self.x_range;
        let (y0, y1) = self.y_range;
        let px = self.left + (x - x0) / (x1 - x0) * self.width;
        let py = self.top + (1.0 - (y - y0) / (y1 - y0)) * self.height;
        // Far off-canvas points are clipped anyway.
        let bound = |v: f64| v.clamp(-100_000.0, 100_000.0);
        (bound(px), bound(py))
    }

    /// Positions and labels of the x ticks, in data units.
    fn x_ticks(&self, categories: &[String]) -> Vec<(f64, String)> {
        let (x0, x1) = self.x_range;
        if categories.is_empty() {
            return numeric_ticks(x0, x1);
        }

        let stride = categories.len().div_ceil(MAX_CATEGORY_LABELS).max(1);
        let (lo, hi) = (x0.min(x1), x0.max(x1));
        categories
            .iter()
            .enumerate()
            .step_by(stride)
            .map(|(i, name)| (i as f64, name.clone()))
            .filter(|(x, _)| (lo..=hi).contains(x))
            .collect()
    }

    fn grid(&self, svg: &mut String, categories: &[String]) {
        let font = self.font_size;

        for (x, label) in self.x_ticks(categories) {
            let (px, _) = self.to_px(x, 0.0);
            svg.push_str(&format!(
                r#"<line x1="{px:.2}" y1="{:.2}" x2="{px:.2}" y2="{:.2}" stroke="{GRID}" stroke-width="1"/>"#,
                self.top,
                self.bottom()
            ));
            svg.push_str(&format!(
                r#"<text x="{px:.2}" y="{:.2}" font-size="{font:.1}" text-anchor="middle" fill="{LABEL}">{}</text>"#,
                self.bottom() + font * 1.3,
                label_text(&label)
            ));
        }

        let (y0, y1) = self.y_range;
        for (y, label) in numeric_ticks(y0, y1) {
            let (_, py) = self.to_px(0.0, y);
            svg.push_str(&format!(
                r#"<line x1="{:.2}" y1="{py:.2}" x2="{:.2}" y2="{py:.2}" stroke="{GRID}" stroke-width="1"/>"#,
                self.left,
                self.right()
            ));
            svg.push_str(&format!(
                r#"<text x="{:.2}" y="{:.2}" font-size="{font:.1}" text-anchor="end" fill="{LABEL}">{label}</text>"#,
                self.left - font * 0.4,
                py + font * 0.35
            ));
        }

        svg.push_str(&format!(
            r#"<polyline points="{:.2},{:.2} {:.2},{:.2} {:.2},{:.2}" fill="none" stroke="{AXIS}" stroke-width="1.5"/>"#,
            self.left,
            self.top,
            self.left,
            self.bottom(),
            self.right(),
            self.bottom()
        ));
    }

    fn titles(&self, svg: &mut String, layout: &Layout) {
        let font = self.font_size;
        let (w, h) = self.canvas;

        if let Some(title) = title_text(&layout.title) {
            svg.push_str(&format!(
                r#"<text x="{:.2}" y="{:.2}" font-size="{:.1}" font-weight="bold" text-anchor="middle" fill="{LABEL}">{}</text>"#,
                w / 2.0,
                font * 1.7,
                font * 1.25,
                label_text(title)
            ));
        }
        if let Some(title) = title_text(&layout.xaxis.title) {
            svg.push_str(&format!(
                r#"<text x="{:.2}" y="{:.2}" font-size="{font:.1}" text-anchor="middle" fill="{LABEL}">{}</text>"#,
                self.left + self.width / 2.0,
                h - font * 0.6,
                label_text(title)
            ));
        }
        if let Some(title) = title_text(&layout.yaxis.title) {
            let (x, y) = (font * 1.2, self.top + self.height / 2.0);
            svg.push_str(&format!(
                r#"<text x="{x:.2}" y="{y:.2}" font-size="{font:.1}" text-anchor="middle" fill="{LABEL}" transform="rotate(-90 {x:.2} {y:.2})">{}</text>"#,
                label_text(title)
            ));
        }
    }
}

/// Evenly spaced ticks across `lo..hi`, labelled with as many decimals as the
/// spacing needs.
fn numeric_ticks(lo: f64, hi: f64) -> Vec<(f64, String)> {
    let step = (hi - lo) / TICKS as f64;
    (0..=TICKS)
        .map(|i| {
            let value = lo + step * i as f64;
            (value, format_tick(value, step))
        })
        .collect()
}

fn series_svg(svg: &mut String, frame: &Frame, series: &Series) {
    let color = &series.color;
    let stroke = (frame.font_size * 0.25).max(1.5);

    match series.kind {
        Kind::Scatter { lines, markers } => {
            let pixels = series
                .points
                .iter()
                .map(|&(x, y)| frame.to_px(x, y))
                .collect::<Vec<_>>();
            if lines && pixels.len() > 1 {
                let points = pixels
                    .iter()
                    .map(|(x, y)| format!("{x:.2},{y:.2}"))
                    .join(" ");
                svg.push_str(&format!(
                    r#"<polyline points="{points}" fill="none" stroke="{color}" stroke-width="{stroke:.2}" stroke-linejoin="round" stroke-linecap="round"/>"#
                ));
            }
            if markers {
                let radius = stroke * 1.6;
                for (x, y) in &pixels {
                    svg.push_str(&format!(
                        r#"<circle cx="{x:.2}" cy="{y:.2}" r="{radius:.2}" fill="{color}"/>"#
                    ));
                }
            }
        }
        Kind::Bar => {
            let (lo, hi) = frame.y_range;
            let baseline = 0.0_f64.clamp(lo.min(hi), lo.max(hi));
            for &(x, y) in &series.points {
                let (left, top) = frame.to_px(x - frame.bar_half_width, y);
                let (right, base) = frame.to_px(x + frame.bar_half_width, baseline);
                svg.push_str(&format!(
                    r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{color}"/>"#,
                    left.min(right),
                    top.min(base),
                    (right - left).abs(),
                    (base - top).abs()
                ));
            }
        }
    }
}

fn shape_svg(svg: &mut String, frame: &Frame, shape: &Shape) {
    let (Some(x0), Some(y0), Some(x1), Some(y1)) = (
        number(&shape.x0),
        number(&shape.y0),
        number(&shape.x1),
        number(&shape.y1),
    ) else {
        return;
    };
    let stroke = shape
        .line
        .color
        .as_ref()
        .and_then(paint)
        .unwrap_or_else(|| AXIS.to_string());
    let fill = shape
        .fillcolor
        .as_ref()
        .and_then(paint)
        .unwrap_or_else(|| "none".to_string());
    let opacity = shape.opacity.unwrap_or(1.0).clamp(0.0, 1.0);
    let (ax, ay) = frame.to_px(x0, y0);
    let (bx, by) = frame.to_px(x1, y1);
    let (left, top, width, height) = (ax.min(bx), ay.min(by), (bx - ax).abs(), (by - ay).abs());

    let element = match shape.kind.as_str() {
        "line" => format!(
            r#"<line x1="{ax:.2}" y1="{ay:.2}" x2="{bx:.2}" y2="{by:.2}" stroke="{stroke}" stroke-width="2""#
        ),
        "rect" => format!(
            r#"<rect x="{left:.2}" y="{top:.2}" width="{width:.2}" height="{height:.2}" fill="{fill}" stroke="{stroke}" stroke-width="1""#
        ),
        "circle" => format!(
            r#"<ellipse cx="{:.2}" cy="{:.2}" rx="{:.2}" ry="{:.2}" fill="{fill}" stroke="{stroke}" stroke-width="1""#,
            left + width / 2.0,
            top + height / 2.0,
            width / 2.0,
            height / 2.0
        ),
        other => {
            tracing::debug!("Skipping unsupported shape type {:?}", other);
            return;
        }
    };
    svg.push_str(&format!(r#"{element} opacity="{opacity}"/>"#));
}

fn annotation_svg(svg: &mut String, frame: &Frame, annotation: &Annotation) {
    let text = annotation.text.trim();
    let (Some(x), Some(y)) = (number(&annotation.x), number(&annotation.y)) else {
        return;
    };
    if text.is_empty() {
        return;
    }

    let (mut px, mut py) = frame.to_px(x, y);
    if annotation.xref.as_deref() == Some("paper") {
        px = frame.left + x * frame.width;
    }
    if annotation.yref.as_deref() == Some("paper") {
        py = frame.top + (1.0 - y) * frame.height;
    }
    svg.push_str(&format!(
        r#"<text x="{px:.2}" y="{py:.2}" font-size="{:.1}" text-anchor="middle" fill="{LABEL}">{}</text>"#,
        frame.font_size,
        label_text(text)
    ));
}
