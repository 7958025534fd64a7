use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tutor_report::{
    chart::{plot::PlotRenderer, ChartRenderer},
    config::ReportConfig,
    i18n::LanguageCode,
    report::ReportAssembler,
    session::{ReportRequest, TranscriptEntry},
};

/// Renders the PDF report of a finished tutoring session.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Session file with a `request` object and a `transcript` array.
    session: PathBuf,

    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// JSON file overriding layout and rendering settings.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the language stored in the session file.
    #[arg(short, long)]
    language: Option<String>,

    /// Replace every chart with its placeholder.
    #[arg(long, default_value_t = false)]
    no_charts: bool,
}

#[derive(Debug, Deserialize)]
struct SessionFile {
    request: ReportRequest,
    #[serde(default)]
    transcript: Vec<TranscriptEntry>,
}

fn init_logger() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let subscriber = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true);
    tracing_subscriber::registry()
        .with(subscriber)
        .with(env_filter)
        .try_init()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger()?;
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ReportConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ReportConfig::default(),
    };

    let content = tokio::fs::read_to_string(&args.session)
        .await
        .with_context(|| format!("reading session {}", args.session.display()))?;
    let mut session: SessionFile = serde_json::from_str(&content).context("parsing session")?;
    if let Some(code) = &args.language {
        session.request.language = LanguageCode::from_code(code);
    }

    let renderer = (!args.no_charts).then(|| Arc::new(PlotRenderer) as Arc<dyn ChartRenderer>);
    let assembler = ReportAssembler::new(config, renderer)?;
    let report = assembler
        .assemble(
            &session.request,
            &session.transcript,
            chrono::Local::now().naive_local(),
        )
        .await;

    tokio::fs::create_dir_all(&args.out_dir).await?;
    let path = report.save(&args.out_dir).await?;
    println!("{}", path.display());
    Ok(())
}
