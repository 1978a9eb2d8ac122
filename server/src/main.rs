use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

use search_core::{
    Article, FileModelStore, LtrModel, MemoryArticleStore, MemoryEventStore, RankingConfig,
    SearchEngine, SharedConfig,
};
use server::build_app;

#[derive(Parser)]
struct Args {
    /// News dataset (JSONL, one article per line)
    #[arg(long)]
    dataset: String,
    /// Optional ranking config JSON file (missing fields use defaults)
    #[arg(long)]
    config: Option<String>,
    /// Model weights file
    #[arg(long, default_value = "ltr_model.bin")]
    model: String,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let ranking = match &args.config {
        Some(path) => {
            let text =
                std::fs::read_to_string(path).with_context(|| format!("read config {path}"))?;
            serde_json::from_str(&text).with_context(|| format!("parse config {path}"))?
        }
        None => RankingConfig::default(),
    };

    let articles = load_dataset(&args.dataset)?;
    tracing::info!(count = articles.len(), dataset = %args.dataset, "loaded articles");

    let engine = Arc::new(SearchEngine::new(
        Arc::new(MemoryArticleStore::from_articles(articles)),
        SharedConfig::new(ranking),
        LtrModel::new(Box::new(FileModelStore::new(&args.model))),
        Arc::new(MemoryEventStore::new()),
    ));

    let app: Router = build_app(engine);
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

fn load_dataset(path: &str) -> Result<Vec<Article>> {
    let file = File::open(path).with_context(|| format!("open dataset {path}"))?;
    let reader = BufReader::new(file);
    let mut articles = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut article: Article = serde_json::from_str(&line)
            .with_context(|| format!("parse dataset line {}", line_no + 1))?;
        if article.id.is_empty() {
            article.id = format!("doc-{line_no}");
        }
        articles.push(article);
    }
    Ok(articles)
}
