use clap::Parser;
use std::path::PathBuf;

use newsdesk::app;
use newsdesk::scraping::{extract_text, BrowserLauncher};
use newsdesk::pipeline::PipelineSettings;
use newsdesk::text::truncate_for_log;

/// Open one browser session, scrape a page and print what the pipeline would keep.
#[derive(Parser, Debug)]
#[command(name = "probe_scrape")]
struct Args {
    /// Page to scrape
    url: String,

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
    let settings = PipelineSettings::from_config(&config);
    let launcher = app::browser_launcher(&config)?;

    let mut session = launcher.launch().await?;
    let text = extract_text(session.as_mut(), &args.url, settings.scrape).await;
    session.close().await?;

    if text.is_empty() {
        println!("✗ No paragraph text extracted from {}", args.url);
    } else {
        println!("✓ {} chars from {}\n", text.chars().count(), args.url);
        println!("{}", truncate_for_log(&text, 800));
    }
    Ok(())
}
