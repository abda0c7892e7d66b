use std::{
    path::PathBuf,
    sync::{atomic::AtomicBool, Arc},
    time::Duration,
};

use anyhow::{anyhow, Context};
use clap::Parser;
use log::debug;
use signal_hook::consts::{SIGINT, SIGTERM};
use toolify_scraper::{
    browser_controller::BrowserController,
    exporter, logging,
    scraper::{Scraper, ScraperOptions},
    types::{RunMode, ScraperError},
    utils::LOG_FILE,
};

// detail pages show the information block, listing pages the tool cards
const READY_SELECTOR: &str = ".tool-detail-information, .tool-item";

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Toolify AI tools scraper", long_about = None)]
struct Args {
    /// Scrape a single listing page and at most five tools
    #[arg(long, conflicts_with = "resume")]
    test: bool,
    /// Continue from the checkpoint of an interrupted run
    #[arg(long)]
    resume: bool,
    /// Convert an exported JSON file to CSV and exit
    #[arg(
        long,
        num_args = 2,
        value_names = ["INPUT_JSON", "OUTPUT_CSV"],
        conflicts_with_all = ["test", "resume", "fresh"]
    )]
    convert: Option<Vec<PathBuf>>,
    /// Delete an existing checkpoint and start over
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,
    /// First listing page, defaults to $TOOLIFY_BASE_URL or the advertising category
    #[arg(long)]
    url: Option<String>,
    /// Directory for the exports, checkpoint, log and screenshots
    #[arg(short = 'd', long, default_value = ".")]
    output_dir: PathBuf,
    /// Highest listing page to visit
    #[arg(short = 'p', long)]
    max_pages: Option<u32>,
    /// Milliseconds to wait between two page loads
    #[arg(long, default_value_t = 1000)]
    delay: u64,
    /// Number of retries per page that fails to load
    #[arg(short = 'r', long, default_value_t = 2)]
    retries: usize,
    /// Maximum time in seconds the browser waits for an event before timing out
    #[arg(long, default_value_t = 45)]
    browser_timeout: u64,
    /// Show the browser window
    #[arg(long)]
    headful: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    std::fs::create_dir_all(&args.output_dir).context(format!(
        "could not create output directory {:?}",
        args.output_dir
    ))?;
    logging::init(&args.output_dir.join(LOG_FILE))?;

    if let Some(paths) = &args.convert {
        let (input, output) = match paths.as_slice() {
            [input, output] => (input, output),
            _ => return Err(anyhow!("--convert takes an input json and an output csv")),
        };
        let rows = exporter::convert(input, output)
            .context(format!("could not convert {:?}", input))?;
        println!("converted {} tools from {:?} to {:?}", rows, input, output);
        return Ok(());
    }

    let mode = if args.test {
        RunMode::Test
    } else if args.resume {
        RunMode::Resume
    } else {
        RunMode::Full
    };

    let mut builder = ScraperOptions::default_builder();
    builder
        .output_dir(args.output_dir.clone())
        .max_pages(args.max_pages)
        .request_delay_ms(args.delay)
        .retries(args.retries)
        .fresh(args.fresh);
    if let Some(url) = &args.url {
        builder.listing_url(url.clone());
    }
    let options = builder.build()?;

    debug!("Starting scraper with {:#?}", args);

    let should_terminate = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGTERM, Arc::clone(&should_terminate))?;
    signal_hook::flag::register(SIGINT, Arc::clone(&should_terminate))?;

    let browser = BrowserController::new(Duration::from_secs(args.browser_timeout), !args.headful)?
        .wait_for(READY_SELECTOR);
    let scraper = Scraper::new(browser, options, should_terminate);
    let summary = scraper.run(mode).await?;

    println!(
        "{} tools saved to {:?} ({} new, {} failed, {} skipped) in {:.1}s",
        summary.count,
        scraper.options().json_path(),
        summary.succeeded,
        summary.failed(),
        summary.skipped,
        summary.duration.as_secs_f64()
    );

    if summary.interrupted {
        return Err(ScraperError::EarlyTermination).context("run with --resume to continue");
    }
    if summary.incomplete {
        return Err(anyhow!(
            "stopped at listing page {} which could not be loaded, run with --resume to continue",
            summary.last_page + 1
        ));
    }
    Ok(())
}
