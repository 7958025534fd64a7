use std::{path::Path, time::Duration};

use glam::{vec2, Vec2};
use serde::Deserialize;
use thiserror::Error;

/// Points per millimetre.
pub const MM: f32 = 72.0 / 25.4;

// A4 page size
pub const PAGE_WIDTH: f32 = 8.27 * 72.0;
pub const PAGE_HEIGHT: f32 = 11.69 * 72.0;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Page geometry and spacing, in points.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub page_size: Vec2,
    /// Left and right margin.
    pub margin: f32,
    pub top_margin: f32,
    pub bottom_margin: f32,
    pub line_height: f32,
    /// Display height cap for problem and solution images.
    pub max_image_height: f32,
    /// Fixed display height of rasterized charts.
    pub chart_height: f32,
    /// Vertical space after each transcript message.
    pub message_gap: f32,
    /// Vertical space for a blank line inside a message.
    pub blank_line_gap: f32,
    pub body_font_size: f32,
    pub footer_font_size: f32,
    /// Footer position, measured from the bottom-right corner of the page.
    pub footer_offset: Vec2,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            page_size: vec2(PAGE_WIDTH, PAGE_HEIGHT),
            margin: 15.0 * MM,
            top_margin: 20.0 * MM,
            bottom_margin: 20.0 * MM,
            line_height: 5.0 * MM,
            max_image_height: 100.0 * MM,
            chart_height: 80.0 * MM,
            message_gap: 8.0 * MM,
            blank_line_gap: 2.0 * MM,
            body_font_size: 10.0,
            footer_font_size: 8.0,
            footer_offset: vec2(30.0 * MM, 10.0 * MM),
        }
    }
}

impl LayoutConfig {
    pub fn content_width(&self) -> f32 {
        self.page_size.x - 2.0 * self.margin
    }

    /// Lowest y a block may reach before a page break is required.
    pub fn content_bottom(&self) -> f32 {
        self.page_size.y - self.bottom_margin
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// File name prefix, e.g. `PrismAI_Learn` in `PrismAI_Learn_Session_en.pdf`.
    pub product_name: String,
    pub chart_width: u32,
    pub chart_height: u32,
    #[serde(with = "duration_secs")]
    pub chart_timeout: Duration,
    #[serde(with = "duration_secs")]
    pub fetch_timeout: Duration,
    pub layout: LayoutConfig,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            product_name: "PrismAI_Learn".to_string(),
            chart_width: 600,
            chart_height: 400,
            chart_timeout: Duration::from_secs(10),
            fetch_timeout: Duration::from_secs(30),
            layout: LayoutConfig::default(),
        }
    }
}

impl ReportConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_a4_millimetres() {
        let layout = LayoutConfig::default();
        assert!((layout.page_size.x / MM - 210.0).abs() < 0.5);
        assert!((layout.page_size.y / MM - 297.0).abs() < 0.5);
        assert!((layout.content_width() / MM - 180.0).abs() < 0.5);
    }

    #[test]
    fn test_partial_override() {
        let config: ReportConfig = serde_json::from_str(
            r#"{ "product_name": "Demo", "chart_timeout": 2.5, "layout": { "line_height": 12.0 } }"#,
        )
        .unwrap();
        assert_eq!(config.product_name, "Demo");
        assert_eq!(config.chart_timeout, Duration::from_millis(2500));
        assert_eq!(config.layout.line_height, 12.0);
        assert_eq!(config.layout.margin, LayoutConfig::default().margin);
        assert_eq!(config.chart_width, 600);
    }

    #[test]
    fn test_negative_timeout_is_rejected() {
        assert!(serde_json::from_str::<ReportConfig>(r#"{ "chart_timeout": -1 }"#).is_err());
    }
}
