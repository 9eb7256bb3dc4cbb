mod error;
mod extract;
mod normalize;
mod render;
mod report;

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use tracing::info;

const START_URL: &str = "https://www.alternatives.org.uk/experts";
const OUTPUT_FILE: &str = "experts.xlsx";

#[derive(Parser)]
#[command(
    name = "expert_scraper",
    about = "Expert listing scraper with a styled XLSX report"
)]
struct Cli {
    /// Listing page URL
    #[arg(long, default_value = START_URL)]
    url: String,
    /// Output spreadsheet path
    #[arg(short, long, default_value = OUTPUT_FILE)]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let html = render::render_page(&cli.url, extract::PROFILE_SELECTOR).await?;

    let raw = extract::extract_records(&html)?;
    info!("Found {} profiles on the listing page", raw.len());

    let records = normalize::normalize(raw);
    info!("{} records after cleanup and dedup", records.len());

    let style = report::StyleSpec::for_source(&cli.url);
    report::write_report(&records, &style, &cli.output)?;
    println!("Saved {} experts to {}", records.len(), cli.output.display());

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("Done in {:.1}s", elapsed.as_secs_f64());
    }
    Ok(())
}
