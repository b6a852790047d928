use std::{io, path::PathBuf};

use anyhow::{bail, Result};
use clap::Parser;
use client_core::{load_settings, FormController};
use shared::{domain::ExcuseCategory, error::ExcuseError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

mod presentation;

use presentation::{
    describe_failure, parse_input_line, reached_backend, status_line, InputLine, OutputCursor,
    OutputSink,
};

#[derive(Parser, Debug)]
#[command(name = "excuse", about = "Generate an excuse for any situation")]
struct Args {
    /// What do you need an excuse for? Starts an interactive session when omitted.
    text: Option<String>,
    #[arg(long, short, default_value_t = ExcuseCategory::Medical)]
    category: ExcuseCategory,
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    endpoint_path: Option<String>,
    /// Settings file; defaults to ./excuse.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    if let Some(endpoint_path) = args.endpoint_path {
        settings.endpoint_path = endpoint_path;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
    tracing::debug!(
        server_url = %settings.server_url,
        endpoint_path = %settings.endpoint_path,
        "cli: settings loaded"
    );

    let controller = FormController::from_settings(&settings)?;
    controller.update_category(args.category);

    match args.text {
        Some(text) => {
            controller.update_text(text);
            if let Err(err) = submit_and_render(&controller).await {
                bail!(describe_failure(&err));
            }
        }
        None => interactive(&controller).await?,
    }

    Ok(())
}

async fn interactive(controller: &FormController) -> Result<()> {
    eprintln!("Excuse Generator - generate an excuse for any situation");
    eprintln!(
        "Type what you need an excuse for. `:category <medical|familiar|overlapping>` switches context, `:quit` exits."
    );
    eprintln!("Context: {}", controller.form_state().category.label());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_input_line(&line) {
            InputLine::Blank => continue,
            InputLine::Quit => break,
            InputLine::Category(raw) => match raw.parse::<ExcuseCategory>() {
                Ok(category) => {
                    controller.update_category(category);
                    eprintln!("Context: {}", category.label());
                }
                Err(err) => eprintln!("{err}"),
            },
            InputLine::Excuse(text) => {
                controller.update_text(text);
                if let Err(err) = submit_and_render(controller).await {
                    eprintln!("{}", describe_failure(&err));
                }
            }
        }
    }

    Ok(())
}

/// Submits the form and writes fragments to stdout as they arrive.
async fn submit_and_render(controller: &FormController) -> Result<(), ExcuseError> {
    let mut text_rx = controller.subscribe_text();
    text_rx.borrow_and_update();
    let mut cursor = OutputCursor::default();
    let mut output = OutputSink::new(io::stdout());

    let submission = controller.submit();
    tokio::pin!(submission);
    let mut announced = false;

    let outcome = loop {
        tokio::select! {
            outcome = &mut submission => break outcome,
            changed = text_rx.changed() => {
                if changed.is_err() {
                    break (&mut submission).await;
                }
                if !announced {
                    if let Some(status) = status_line(&controller.form_state()) {
                        eprintln!("{status}");
                    }
                    output.write("Your generated excuse:\n");
                    announced = true;
                }
                let text = text_rx.borrow_and_update().clone();
                output.write(cursor.advance(text.as_str()));
            }
        }
    };

    if let Err(err) = &outcome {
        if !reached_backend(err) {
            return outcome;
        }
    }

    let text = controller.generated_text();
    output.write(cursor.advance(text.as_str()));
    if announced || !text.is_empty() {
        output.write("\n");
    }
    outcome
}
