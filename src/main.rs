//! compliance-rag - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use compliance_rag::{
    cli::{Args, Commands, ProgressBarObserver, Verbosity},
    config::{Config, IndexBackend},
    document::{PlainTextSource, ProgressObserver, StructuredDocument, StructuredDocumentBuilder, TracingObserver},
    index::{build_index, open_index},
    llm::{Generator, OllamaClient},
    rag::{pipeline::INDEX_UNAVAILABLE_MESSAGE, Assembled, AdvisoryService, RagPipeline},
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbosity());

    let mut config = Config::load(args.config.as_deref())?;
    args.apply_overrides(&mut config);

    match &args.command {
        Commands::Structure { source, output } => {
            run_structure(&args, &config, source.clone(), output.clone())?;
        }
        Commands::Index { json } => {
            run_index(&config, json.clone()).await?;
        }
        Commands::Query { text } => {
            run_query(&config, text).await?;
        }
        Commands::Ask { text } => {
            let pipeline = build_pipeline(&config).await?;
            println!("{}", pipeline.answer(text).await);
        }
        Commands::Advise { task, text } => {
            let pipeline = build_pipeline(&config).await?;
            let service = AdvisoryService::new(
                pipeline.orchestrator().clone(),
                generator(&config)?,
                config.standard.name.as_str(),
                config.generation_timeout(),
            );
            println!("{}", service.run((*task).into(), text).await);
        }
        Commands::Config => {
            show_config(&args, &config)?;
        }
    }

    Ok(())
}

/// Install the tracing subscriber; `RUST_LOG` wins over `-v`
fn init_tracing(verbosity: Verbosity) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(verbosity.filter_directive())),
        )
        .init();
}

fn run_structure(
    args: &Args,
    config: &Config,
    source: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let source = source.unwrap_or_else(|| config.paths.source.clone());
    let output = output.unwrap_or_else(|| config.paths.structured_json.clone());

    let observer: Arc<dyn ProgressObserver> = if args.verbosity().show_progress() {
        Arc::new(ProgressBarObserver::new())
    } else {
        Arc::new(TracingObserver)
    };
    let builder = StructuredDocumentBuilder::for_standard(&config.standard.name).with_observer(observer);

    let document = builder
        .build_from_source(&PlainTextSource, &source)
        .with_context(|| format!("Failed to structure {}", source.display()))?;
    document.write_json(&output)?;

    println!("{} {}", "Structured".green().bold(), document.document_name);
    print_stats(&document);
    println!("  Output:           {}", output.display());
    Ok(())
}

async fn run_index(config: &Config, json: Option<PathBuf>) -> Result<()> {
    let path = json.unwrap_or_else(|| config.paths.structured_json.clone());
    let document = StructuredDocument::load_json(&path)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    let count = build_index(config, &document).await?;

    // The memory backend rebuilds from the configured JSON on every run
    if config.index.backend == IndexBackend::Memory && path != config.paths.structured_json {
        document.write_json(&config.paths.structured_json)?;
    }

    println!("{} {} chunks", "Indexed".green().bold(), count);
    print_stats(&document);
    Ok(())
}

async fn run_query(config: &Config, text: &str) -> Result<()> {
    let pipeline = build_pipeline(config).await?;

    let outcome = match pipeline.context(text).await {
        Ok(outcome) => outcome,
        Err(e) if e.is_unavailable() => {
            println!("{}", INDEX_UNAVAILABLE_MESSAGE.red());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let query = &outcome.query;
    println!("{}", "Classification".cyan().bold());
    match &query.requirement_ref {
        Some(reference) => println!("  Reference: {} {}", reference.kind, reference.number),
        None => println!("  Reference: none"),
    }
    println!("  Topics:    {}", if query.topics.is_empty() { "none".to_string() } else { query.topics.join(", ") });
    println!("  Strategy:  {}", outcome.strategy);
    println!("  Hits:      {}", outcome.hits_retrieved);
    println!();

    match &outcome.assembled {
        Assembled::Context(context) => {
            println!("{} ({} entries)", "Context".cyan().bold(), context.entry_count);
            println!("{}", context.text);
        }
        Assembled::Fallback { topic, text } => {
            let label = topic.as_deref().unwrap_or("generic");
            println!("{} ({})", "Fallback".yellow().bold(), label);
            println!("{}", text);
        }
    }
    Ok(())
}

async fn build_pipeline(config: &Config) -> Result<RagPipeline> {
    let index = open_index(config).await;
    Ok(RagPipeline::from_config(config, index, generator(config)?))
}

fn generator(config: &Config) -> Result<Arc<dyn Generator>> {
    let client = OllamaClient::with_config(
        &config.ollama_url(),
        &config.llm.model,
        config.generation_timeout(),
    )?;
    Ok(Arc::new(client))
}

fn print_stats(document: &StructuredDocument) {
    println!("  Version:          {}", document.version());
    println!("  Processed:        {}", document.processed_at().format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  Requirements:     {}", document.requirements.len());
    println!("  Sub-requirements: {}", document.subrequirement_count());
    println!("  Chunks:           {}", document.chunk_count());
}

fn show_config(args: &Args, config: &Config) -> Result<()> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => Config::config_path()?,
    };
    println!("{} {}", "# Configuration:".dimmed(), path.display());
    println!("{}", config.to_toml()?);
    Ok(())
}
