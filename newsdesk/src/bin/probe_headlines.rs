use clap::Parser;
use std::path::PathBuf;

use newsdesk::app;

/// Fetch the configured topic and print the headlines that survive filtering.
#[derive(Parser, Debug)]
#[command(name = "probe_headlines")]
struct Args {
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let config = app::load_config(args.config).await?;
    let source = app::headline_source(&config)?;

    println!("Topic: {}", config.search.topic_token());
    let headlines = source
        .fetch(config.search.topic_token(), config.search.headline_limit())
        .await;

    if headlines.is_empty() {
        println!("✗ No headlines (see log for errors)");
        return Ok(());
    }

    println!("✓ {} headlines\n", headlines.len());
    for (i, h) in headlines.iter().enumerate() {
        println!("{:>2}. {}", i + 1, h.title);
        println!("    {} | {} | {}", h.source, h.published, h.link);
        match h.story_token() {
            Some(token) => println!("    story_token: {}", token),
            None => println!("    story_token: none"),
        }
    }
    Ok(())
}
