use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::{
    chart::{plot::PlotRenderer, ChartRenderer},
    config::ReportConfig,
    report::{Report, ReportAssembler},
    session::{ReportRequest, TranscriptEntry},
};

pub mod chart;
pub mod config;
pub mod document;
pub mod font;
pub mod i18n;
pub mod images;
pub mod normalize;
pub mod pdf;
pub mod report;
pub mod session;
pub mod text_layout;
pub mod writer;

/// Assembles a report with the built-in chart renderer and serializes it.
pub async fn generate_pdf(
    config: ReportConfig,
    request: &ReportRequest,
    transcript: &[TranscriptEntry],
    generated_at: NaiveDateTime,
) -> Result<(Report, Vec<u8>), report::Error> {
    let renderer: Arc<dyn ChartRenderer> = Arc::new(PlotRenderer);
    let assembler = ReportAssembler::new(config, Some(renderer))?;
    let report = assembler.assemble(request, transcript, generated_at).await;
    let content = report.to_pdf()?;
    Ok((report, content))
}
