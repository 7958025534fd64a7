use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::{
    chart::{split_segments, ChartRaster, ChartRasterizer, ChartRenderer, Segment},
    config::{ReportConfig, MM},
    document::{Color, Document, TextStyle},
    font::FontFace,
    i18n::{LanguageCode, LocalizedStrings},
    images::{self, ImageLoader, ImageSource},
    normalize::clean_text,
    pdf,
    session::{Question, ReportRequest, Role, SolutionAttempt, TranscriptEntry},
    writer::DocumentWriter,
};

/// Written before a precomputed video summary in the solution section.
pub const VIDEO_SUMMARY_PREFIX: &str = "[Video Summary]: ";

const BRAND_BLUE: Color = Color(2, 132, 199);
const STUDENT_BLUE: Color = Color(0, 0, 150);
const BODY: Color = Color(20, 20, 20);
const RULE: Color = Color::gray(200);
const MUTED: Color = Color::gray(150);

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Pdf(#[from] pdf::Error),
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to set up image loading: {0}")]
    Loader(#[from] images::Error),
}

/// A laid-out report, ready to be serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub file_name: String,
    pub document: Document,
}

impl Report {
    pub fn to_pdf(&self) -> Result<Vec<u8>, pdf::Error> {
        pdf::write_document(&self.document)
    }

    /// Writes the PDF into `dir` under [`Report::file_name`].
    pub async fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf, Error> {
        let path = dir.as_ref().join(&self.file_name);
        let bytes = self.to_pdf()?;
        tokio::fs::write(&path, bytes).await?;
        tracing::info!("Saved report to {}", path.display());
        Ok(path)
    }
}

pub fn file_name(product_name: &str, language: LanguageCode) -> String {
    format!("{product_name}_Session_{language}.pdf")
}

/// Builds session reports. Every content fault (unreachable image, bad
/// chart) is replaced by a localized placeholder line, so assembling a
/// report cannot fail.
#[derive(Debug, Clone)]
pub struct ReportAssembler {
    config: ReportConfig,
    loader: ImageLoader,
    charts: ChartRasterizer,
}

impl ReportAssembler {
    /// `renderer` rasterizes chart blocks; with `None` every chart becomes a
    /// placeholder.
    pub fn new(
        config: ReportConfig,
        renderer: Option<Arc<dyn ChartRenderer>>,
    ) -> Result<Self, Error> {
        let loader = ImageLoader::new(config.fetch_timeout)?;
        let charts = ChartRasterizer::new(
            renderer,
            config.chart_width,
            config.chart_height,
            config.chart_timeout,
        );
        Ok(Self {
            config,
            loader,
            charts,
        })
    }

    pub async fn assemble(
        &self,
        request: &ReportRequest,
        transcript: &[TranscriptEntry],
        generated_at: NaiveDateTime,
    ) -> Report {
        let language = request.language;
        let strings = language.strings();
        let mut writer = DocumentWriter::new(self.config.layout.clone());

        self.header(&mut writer, strings, generated_at);
        if let Some(source) = &request.problem_image {
            self.problem_context(&mut writer, strings, source).await;
        }
        self.student_inputs(&mut writer, strings, request).await;

        writer.reserve(15.0 * MM);
        writer.set_style(self.heading(12.0));
        writer.line(strings.transcript, 10.0 * MM);

        for entry in transcript.iter().filter(|entry| !entry.thinking) {
            self.message(&mut writer, strings, entry).await;
        }

        let footer = TextStyle::new(FontFace::Regular, self.config.layout.footer_font_size, MUTED);
        let document = writer.finish(footer, |page, total| strings.page_label(page, total));
        tracing::info!(
            "Assembled {} report with {} pages and {} images",
            language,
            document.page_count(),
            document.images.len()
        );

        Report {
            file_name: file_name(&self.config.product_name, language),
            document,
        }
    }

    fn heading(&self, size: f32) -> TextStyle {
        TextStyle::new(FontFace::Bold, size, Color::BLACK)
    }

    fn body(&self, color: Color) -> TextStyle {
        TextStyle::new(FontFace::Regular, self.config.layout.body_font_size, color)
    }

    fn header(&self, writer: &mut DocumentWriter, strings: &LocalizedStrings, at: NaiveDateTime) {
        writer.set_style(TextStyle::new(FontFace::Bold, 18.0, BRAND_BLUE));
        writer.line(strings.header, 10.0 * MM);

        writer.set_style(self.body(Color::gray(100)));
        writer.line(
            format!("{} {}", strings.date, at.format("%Y-%m-%d %H:%M:%S")),
            10.0 * MM,
        );
        writer.rule(RULE, 10.0 * MM);
    }

    async fn problem_context(
        &self,
        writer: &mut DocumentWriter,
        strings: &LocalizedStrings,
        source: &ImageSource,
    ) {
        writer.reserve(15.0 * MM);
        writer.set_style(self.heading(12.0));
        writer.line(strings.problem_context, 8.0 * MM);

        match self.loader.load(source).await {
            Ok(image) => {
                writer.image(image, self.config.layout.max_image_height, 10.0 * MM);
            }
            Err(e) => {
                tracing::warn!("Failed to load problem image: {}", e);
                writer.set_style(self.body(MUTED));
                writer.line(strings.image_error, 10.0 * MM);
            }
        }
    }

    async fn student_inputs(
        &self,
        writer: &mut DocumentWriter,
        strings: &LocalizedStrings,
        request: &ReportRequest,
    ) {
        let line_height = self.config.layout.line_height;

        writer.reserve(20.0 * MM);
        writer.set_style(self.heading(12.0));
        writer.line(strings.student_inputs, 8.0 * MM);

        writer.reserve(15.0 * MM);
        writer.set_style(self.heading(10.0));
        writer.line(strings.attempt, 6.0 * MM);
        writer.set_style(self.body(Color::BLACK));

        match &request.solution {
            SolutionAttempt::Text { text } => {
                writer.paragraph(text);
            }
            SolutionAttempt::Image { image: Some(source) } => {
                match self.loader.load(source).await {
                    Ok(image) => {
                        writer.image(image, self.config.layout.max_image_height, 5.0 * MM);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load solution image: {}", e);
                        writer.line(strings.image_error, line_height);
                    }
                }
            }
            SolutionAttempt::Image { image: None } => {}
            SolutionAttempt::Video { summary } => {
                let text = match summary {
                    Some(summary) => format!("{VIDEO_SUMMARY_PREFIX}{summary}"),
                    None => strings.video_submitted.to_string(),
                };
                writer.paragraph(&text);
            }
            SolutionAttempt::Audio => {
                writer.line(strings.audio_submitted, line_height);
            }
        }
        writer.advance(4.0 * MM);

        writer.reserve(15.0 * MM);
        writer.set_style(self.heading(10.0));
        writer.line(strings.question, 6.0 * MM);
        writer.set_style(self.body(Color::BLACK));

        let question = match &request.question {
            Question::Text { text } => text.as_str(),
            Question::Audio => strings.audio_question,
        };
        writer.paragraph(question);
        writer.advance(10.0 * MM);

        writer.reserve(10.0 * MM);
        writer.rule(RULE, 10.0 * MM);
    }

    async fn message(
        &self,
        writer: &mut DocumentWriter,
        strings: &LocalizedStrings,
        entry: &TranscriptEntry,
    ) {
        let layout = &self.config.layout;
        writer.reserve(10.0 * MM);

        let (label, color) = match entry.role {
            Role::Student => (strings.student, STUDENT_BLUE),
            Role::Tutor => (strings.tutor, BRAND_BLUE),
        };
        writer.set_style(TextStyle::new(FontFace::Bold, layout.body_font_size, color));
        writer.line(label, 5.0 * MM);
        writer.set_style(self.body(BODY));

        for segment in split_segments(&entry.text) {
            match segment {
                Segment::Text(text) => {
                    // Lines are split before normalizing, which would fold
                    // the newlines away.
                    for line in text.split('\n') {
                        let cleaned = clean_text(line);
                        if cleaned.trim().is_empty() {
                            writer.advance(layout.blank_line_gap);
                        } else {
                            writer.paragraph(cleaned.trim());
                        }
                    }
                }
                Segment::Chart(payload) => match self.charts.rasterize(payload).await {
                    ChartRaster::Image(image) => {
                        writer.image_with_height(image, layout.chart_height, 5.0 * MM);
                    }
                    ChartRaster::Unavailable(reason) => {
                        tracing::debug!("Chart replaced by placeholder: {:?}", reason);
                        writer.line(strings.chart_error, layout.line_height);
                    }
                },
            }
        }

        if let Some(source) = &entry.image {
            match self.loader.load(source).await {
                Ok(image) => {
                    writer.image(image, layout.max_image_height, 5.0 * MM);
                }
                Err(e) => {
                    tracing::warn!("Failed to load attached image: {}", e);
                    writer.line(strings.image_error, layout.line_height);
                }
            }
        }

        writer.advance(layout.message_gap);
    }
}
