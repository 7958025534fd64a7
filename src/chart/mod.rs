use std::{
    fmt,
    sync::{Arc, LazyLock},
    time::Duration,
};

use image::RgbImage;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::images::EmbeddedImage;

pub mod plot;

/// Language tag of the fenced blocks that carry chart specifications.
pub const CHART_FENCE_TAG: &str = "json-plotly";

static CHART_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?s)```{CHART_FENCE_TAG}(.*?)```")).unwrap());

/// A declarative 2-D plot description.
///
/// Only the two required top-level keys are checked; their contents are
/// forwarded untouched to the [`ChartRenderer`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChartSpec {
    pub data: Vec<Value>,
    pub layout: Map<String, Value>,
}

impl ChartSpec {
    pub fn parse(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }
}

/// A piece of a message, in original order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    /// The raw payload between a chart fence opener and its closer.
    Chart(&'a str),
}

/// Splits a message into text and chart segments.
///
/// Empty text before, between or after fences is omitted; every other byte
/// of the message ends up in exactly one segment, except the fence markers.
pub fn split_segments(message: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut last = 0;

    for captures in CHART_FENCE.captures_iter(message) {
        let (Some(fence), Some(payload)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        if fence.start() > last {
            segments.push(Segment::Text(&message[last..fence.start()]));
        }
        segments.push(Segment::Chart(payload.as_str()));
        last = fence.end();
    }

    if last < message.len() {
        segments.push(Segment::Text(&message[last..]));
    }

    segments
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("chart has no plottable traces")]
    NothingToPlot,
    #[error("malformed chart: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("chart svg was rejected: {0}")]
    Svg(#[from] resvg::usvg::Error),
    #[error("cannot allocate a {width}x{height} chart surface")]
    Surface { width: u32, height: u32 },
    #[error("{0}")]
    Other(String),
}

/// A rendering surface able to rasterize chart specifications.
pub trait ChartRenderer: Send + Sync + fmt::Debug {
    fn render(&self, spec: &ChartSpec, width: u32, height: u32) -> Result<RgbImage, RenderError>;
}

/// Why a chart could not be turned into an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    InvalidSpec,
    NoRenderer,
    RenderFailed,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartRaster {
    Image(EmbeddedImage),
    Unavailable(Unavailable),
}

/// Turns chart payloads into embeddable images. Never fails: every fault
/// comes back as [`ChartRaster::Unavailable`].
#[derive(Debug, Clone)]
pub struct ChartRasterizer {
    renderer: Option<Arc<dyn ChartRenderer>>,
    width: u32,
    height: u32,
    timeout: Duration,
}

impl ChartRasterizer {
    pub fn new(
        renderer: Option<Arc<dyn ChartRenderer>>,
        width: u32,
        height: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            renderer,
            width,
            height,
            timeout,
        }
    }

    pub async fn rasterize(&self, payload: &str) -> ChartRaster {
        let spec = match ChartSpec::parse(payload) {
            Ok(spec) => spec,
            Err(e) => {
                tracing::warn!("Chart specification is not valid: {}", e);
                return ChartRaster::Unavailable(Unavailable::InvalidSpec);
            }
        };

        let Some(renderer) = self.renderer.clone() else {
            tracing::warn!("No chart renderer available");
            return ChartRaster::Unavailable(Unavailable::NoRenderer);
        };

        let (width, height) = (self.width, self.height);
        let task = tokio::task::spawn_blocking(move || renderer.render(&spec, width, height));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(image))) => match EmbeddedImage::from_rgb(&image) {
                Ok(image) => ChartRaster::Image(image),
                Err(e) => {
                    tracing::warn!("Error embedding chart image: {}", e);
                    ChartRaster::Unavailable(Unavailable::RenderFailed)
                }
            },
            Ok(Ok(Err(e))) => {
                tracing::warn!("Error generating chart image: {}", e);
                ChartRaster::Unavailable(Unavailable::RenderFailed)
            }
            Ok(Err(e)) => {
                tracing::warn!("Chart renderer panicked: {}", e);
                ChartRaster::Unavailable(Unavailable::RenderFailed)
            }
            Err(_) => {
                tracing::warn!("Chart rendering timed out after {:?}", self.timeout);
                ChartRaster::Unavailable(Unavailable::TimedOut)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE_CHART: &str = r#"{"data":[{"x":[0,1],"y":[0,2],"type":"scatter"}],"layout":{}}"#;

    fn reconstruct(segments: &[Segment]) -> String {
        segments
            .iter()
            .map(|segment| match segment {
                Segment::Text(s) | Segment::Chart(s) => *s,
            })
            .collect()
    }

    #[test]
    fn test_split_without_charts() {
        assert_eq!(split_segments("just text"), vec![Segment::Text("just text")]);
        assert!(split_segments("").is_empty());
    }

    #[test]
    fn test_split_preserves_order() {
        let message = format!(
            "Look:\n```json-plotly\n{LINE_CHART}\n```\nand\n```json-plotly {{}} ```\nend"
        );
        let segments = split_segments(&message);

        assert_eq!(
            segments,
            vec![
                Segment::Text("Look:\n"),
                Segment::Chart(&format!("\n{LINE_CHART}\n")),
                Segment::Text("\nand\n"),
                Segment::Chart(" {} "),
                Segment::Text("\nend"),
            ]
        );
        let without_fences = message.replace("```json-plotly", "").replace("```", "");
        assert_eq!(reconstruct(&segments), without_fences);
    }

    #[test]
    fn test_split_omits_empty_edges() {
        let segments = split_segments("```json-plotly{}``````json-plotly[]```");
        assert_eq!(segments, vec![Segment::Chart("{}"), Segment::Chart("[]")]);
    }

    #[test]
    fn test_other_fences_are_text() {
        let message = "```python\nprint(1)\n```";
        assert_eq!(split_segments(message), vec![Segment::Text(message)]);
    }

    #[test]
    fn test_unclosed_fence_is_text() {
        let message = "```json-plotly {\"data\": []";
        assert_eq!(split_segments(message), vec![Segment::Text(message)]);
    }

    #[test]
    fn test_spec_requires_data_and_layout() {
        assert!(ChartSpec::parse(LINE_CHART).is_ok());
        assert!(ChartSpec::parse(r#"{"data":[]}"#).is_err());
        assert!(ChartSpec::parse(r#"{"layout":{}}"#).is_err());
        assert!(ChartSpec::parse("not json").is_err());
    }

    #[derive(Debug)]
    struct Failing;

    impl ChartRenderer for Failing {
        fn render(&self, _: &ChartSpec, _: u32, _: u32) -> Result<RgbImage, RenderError> {
            Err(RenderError::Other("surface lost".to_string()))
        }
    }

    #[derive(Debug)]
    struct Stalled;

    impl ChartRenderer for Stalled {
        fn render(&self, _: &ChartSpec, w: u32, h: u32) -> Result<RgbImage, RenderError> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(RgbImage::new(w, h))
        }
    }

    fn rasterizer(renderer: Option<Arc<dyn ChartRenderer>>) -> ChartRasterizer {
        ChartRasterizer::new(renderer, 60, 40, Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_rasterize_with_plot_renderer() {
        let raster = rasterizer(Some(Arc::new(plot::PlotRenderer)))
            .rasterize(LINE_CHART)
            .await;
        let ChartRaster::Image(image) = raster else {
            panic!("expected an image, got {raster:?}");
        };
        assert_eq!((image.width, image.height), (60, 40));
    }

    #[tokio::test]
    async fn test_unavailable_signals() {
        let cases: [(Option<Arc<dyn ChartRenderer>>, &str, Unavailable); 4] = [
            (Some(Arc::new(plot::PlotRenderer)), "{ nope", Unavailable::InvalidSpec),
            (None, LINE_CHART, Unavailable::NoRenderer),
            (Some(Arc::new(Failing)), LINE_CHART, Unavailable::RenderFailed),
            (Some(Arc::new(Stalled)), LINE_CHART, Unavailable::TimedOut),
        ];
        for (renderer, payload, expected) in cases {
            assert_eq!(
                rasterizer(renderer).rasterize(payload).await,
                ChartRaster::Unavailable(expected)
            );
        }
    }
}
