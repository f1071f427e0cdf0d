use anyhow::Result;
use clap::Parser;
use intervue::{
    AudioSource, Config, HttpEvaluator, InterviewSession, Stage, SyntheticAudioSpec,
    SyntheticVideoSpec, VideoSource,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Terminal front-end for the interview core: runs a text-mode session
/// against a remote evaluator.
#[derive(Debug, Parser)]
#[command(name = "intervue", version, about)]
struct Args {
    /// Config file (TOML/YAML/JSON, extension resolved by the loader)
    #[arg(long)]
    config: Option<String>,

    /// Override the evaluator base URL from the config
    #[arg(long)]
    base_url: Option<String>,

    /// Where to save the final report as JSON
    #[arg(long)]
    report_out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut cfg = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(base_url) = args.base_url {
        cfg.evaluator.base_url = base_url;
    }

    info!("Evaluator endpoint: {}", cfg.evaluator.base_url);

    let evaluator = Arc::new(HttpEvaluator::new(&cfg.evaluator)?);
    let session = InterviewSession::new(
        cfg,
        evaluator,
        VideoSource::Synthetic(SyntheticVideoSpec::default()),
        AudioSource::Synthetic(SyntheticAudioSpec::default()),
    );

    session.start().await?;
    info!(
        "Session {} started with {} questions",
        session.session_id().unwrap_or_default(),
        session.total_questions()
    );

    let stdin = std::io::stdin();
    let total = session.total_questions();
    for _ in 0..total {
        let question = match session.current_question() {
            Some(q) => q,
            None => break,
        };
        println!(
            "\nQuestion {}/{}: {}",
            question.index + 1,
            total,
            question.text
        );
        print!("> ");
        std::io::stdout().flush()?;

        let mut answer = String::new();
        stdin.lock().read_line(&mut answer)?;
        if answer.trim().is_empty() {
            warn!("Empty answer, skipping question");
        } else {
            match session.submit_text(answer.trim()).await {
                Ok(Some(eval)) => {
                    println!("Score: {:.1}/10 ({})", eval.overall_score, eval.feedback)
                }
                Ok(None) => warn!("Submission already in flight, skipping"),
                Err(e) => warn!("Submission failed, question stays answerable: {}", e),
            }
        }

        if session.current_index() + 1 >= total {
            break;
        }
        session.advance();
    }

    session.finish().await?;
    debug_assert_eq!(session.stage(), Stage::Result);
    if let Some(summary) = session.summary() {
        println!("\n{}", summary);
    }
    if let Some(path) = args.report_out {
        session.save_report(&path)?;
    }

    Ok(())
}
