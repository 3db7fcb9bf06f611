use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use pdfchat::client::AskClient;
use pdfchat::config::AppConfig;
use pdfchat::conversation::{run_turn, ConversationController, TurnOutcome};
use pdfchat::correlate::HighlightMap;
use pdfchat::document::{DocumentView, ExtractedText, TextLayer};
use pdfchat::models::{FileUpload, StreamEvent};

#[derive(Parser, Debug)]
#[command(name = "pdfchat")]
#[command(about = "Ask questions about a PDF and anchor the answer's evidence to its pages")]
struct Cli {
    /// PDF to upload with the question (required on the first turn of a session)
    #[arg(long)]
    file: Option<String>,
    /// Pre-extracted text layer ([Page N] sections) used to preview highlighted fragments
    #[arg(long)]
    text_layer: Option<String>,
    /// Page count of the document when no text layer is given
    #[arg(long, default_value_t = 1)]
    pages: u32,
    /// Resume an existing backend session instead of uploading a document
    #[arg(long)]
    session: Option<String>,
    /// Question to ask about the document
    question: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = AppConfig::from_env();
    let client = AskClient::new(&config)?;

    let file = match &cli.file {
        Some(path) => Some(load_upload(path).await?),
        None => None,
    };

    let text_layer = match &cli.text_layer {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read text layer {path}"))?;
            Some(ExtractedText::parse(&raw))
        }
        None => None,
    };

    let page_count = text_layer
        .as_ref()
        .map(|layer| layer.page_count())
        .unwrap_or(cli.pages);
    let mut view = DocumentView::new(page_count);
    let mut controller = ConversationController::new();
    if let Some(session) = cli.session.clone() {
        controller.adopt_session(session);
    }

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_cancel.cancel();
        }
    });

    let outcome = run_turn(
        &client,
        &mut controller,
        &mut view,
        &cli.question,
        file,
        &cancel,
        |event| match event {
            StreamEvent::Status(message) => eprintln!("[status] {message}"),
            StreamEvent::ToolCall { name, .. } => eprintln!("[tool] {name}"),
            StreamEvent::Reasoning(delta) => {
                eprint!("{delta}");
                let _ = std::io::stderr().flush();
            }
            StreamEvent::Answer(delta) => {
                print!("{delta}");
                let _ = std::io::stdout().flush();
            }
            _ => {}
        },
    )
    .await?;

    println!();
    match outcome {
        TurnOutcome::Answered(report) => {
            println!("{}", report.answer.trim());
            if let Some(page) = report.navigated_to {
                println!("\n[viewer] jumped to page {page}");
            }
            if let Some(session) = controller.session_id() {
                println!("[session] {session}");
            }
            if let Some(layer) = &text_layer {
                print_highlights(&controller, &view, layer);
            }
        }
        TurnOutcome::Cancelled => {
            eprintln!("cancelled");
        }
    }

    Ok(())
}

async fn load_upload(path: &str) -> Result<FileUpload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {path}"))?;
    let filename = Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("document.pdf")
        .to_string();
    Ok(FileUpload { filename, bytes })
}

fn print_highlights(
    controller: &ConversationController,
    view: &DocumentView,
    layer: &ExtractedText,
) {
    let fragments = layer.page_fragments(view.current_page());
    let map = HighlightMap::build(
        controller.evidence_version(),
        view.current_page(),
        &fragments,
        controller.evidence(),
    );

    let highlighted: Vec<&String> = map
        .highlighted_indices()
        .filter_map(|index| fragments.get(index))
        .collect();
    if highlighted.is_empty() {
        return;
    }

    println!("\n[highlights] page {}:", view.current_page());
    for fragment in highlighted {
        println!("  > {fragment}");
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
