use std::{
    collections::HashSet,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use anyhow::anyhow;
use tokio::time::sleep;
use tokio_retry::{strategy::FixedInterval, RetryIf};

use crate::{
    browser_controller::{Browser, Page},
    capturer,
    checkpoint::CheckpointStore,
    classifier,
    document::{Document, HtmlDocument},
    exporter, extractor,
    types::{CheckpointState, RunMode, RunSummary, ScraperError, ToolFailure, ToolRecord},
    utils::{
        jitter, listing_page_url, normalize_url, screenshot_stem, CHECKPOINT_FILE, LISTING_URL,
        OUTPUT_CSV, OUTPUT_JSON, SCREENSHOT_DIR, TEST_MODE_PAGES, TEST_MODE_TOOLS,
    },
};

const TOOL_LINK: &str = ".tool-item a.go-tool-detail-name";
const TOOL_LINK_FALLBACK: &str = r#"a[href^="/tool/"]"#;

#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct ScraperOptions {
    // first listing page, later pages live under <listing_url>/page/<n>
    #[builder(default = "self.default_listing_url()")]
    listing_url: String,
    // directory receiving json, csv, checkpoint, log and screenshots
    #[builder(default = "self.default_output_dir()")]
    output_dir: PathBuf,
    // highest listing page to visit, unbounded when None
    #[builder(default = "None")]
    max_pages: Option<u32>,
    // politeness delay between two page loads
    #[builder(default = "1000")]
    request_delay_ms: u64,
    // random extra delay added on top of request_delay_ms
    #[builder(default = "500")]
    delay_jitter_ms: u64,
    // extra attempts for a page that fails to load
    #[builder(default = "2")]
    retries: usize,
    #[builder(default = "3000")]
    retry_backoff_ms: u64,
    // successful tools between two checkpoint writes
    #[builder(default = "1")]
    checkpoint_every: usize,
    // delete an existing checkpoint before starting
    #[builder(default = "false")]
    fresh: bool,
}

impl ScraperOptions {
    pub fn default_builder() -> ScraperOptionsBuilder {
        ScraperOptionsBuilder::default()
    }

    pub fn listing_url(&self) -> &str {
        &self.listing_url
    }

    pub fn json_path(&self) -> PathBuf {
        self.output_dir.join(OUTPUT_JSON)
    }

    pub fn csv_path(&self) -> PathBuf {
        self.output_dir.join(OUTPUT_CSV)
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.output_dir.join(CHECKPOINT_FILE)
    }

    pub fn screenshot_dir(&self) -> PathBuf {
        self.output_dir.join(SCREENSHOT_DIR)
    }
}

impl ScraperOptionsBuilder {
    fn default_listing_url(&self) -> String {
        LISTING_URL.clone()
    }
    fn default_output_dir(&self) -> PathBuf {
        PathBuf::from(".")
    }
}

/// Everything one run mutates. Lives for a single `Scraper::run`.
pub struct RunContext {
    mode: RunMode,
    state: CheckpointState,
    store: CheckpointStore,
    started: Instant,
    attempted: HashSet<String>,
    requests: usize,
    succeeded: usize,
    skipped: usize,
    failures: Vec<ToolFailure>,
    unsaved: usize,
    interrupted: bool,
    // pagination stopped at a listing page that never loaded
    incomplete: bool,
}

impl RunContext {
    fn new(mode: RunMode, state: CheckpointState, store: CheckpointStore) -> Self {
        RunContext {
            mode,
            state,
            store,
            started: Instant::now(),
            attempted: HashSet::new(),
            requests: 0,
            succeeded: 0,
            skipped: 0,
            failures: vec![],
            unsaved: 0,
            interrupted: false,
            incomplete: false,
        }
    }

    fn save(&mut self) -> Result<(), ScraperError> {
        self.store.save(&mut self.state)?;
        self.unsaved = 0;
        Ok(())
    }

    fn commit(&mut self, id: &str, record: ToolRecord, every: usize) -> Result<(), ScraperError> {
        self.state.failed_ids.remove(id);
        self.state.processed_ids.insert(id.to_string());
        if self.state.has_name(&record.name) {
            warn!(
                "duplicate tool name '{}' at {}, keeping the first one",
                record.name, id
            );
            self.skipped += 1;
        } else {
            info!("scraped '{}' [{}] from {}", record.name, record.category, id);
            self.state.results.push(record);
            self.succeeded += 1;
        }
        self.unsaved += 1;
        if self.unsaved >= every.max(1) {
            self.save()?;
        }
        Ok(())
    }

    fn fail(&mut self, id: &str, e: &ScraperError) -> Result<(), ScraperError> {
        self.failures.push(ToolFailure {
            id: id.to_string(),
            reason: e.to_string(),
        });
        self.state.failed_ids.insert(id.to_string());
        self.save()
    }

    fn finish_page(&mut self, page: u32) -> Result<(), ScraperError> {
        if page > self.state.last_page {
            self.state.last_page = page;
        }
        self.save()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            count: self.state.results.len(),
            succeeded: self.succeeded,
            skipped: self.skipped,
            failures: self.failures.clone(),
            duration: self.started.elapsed(),
            interrupted: self.interrupted,
            incomplete: self.incomplete,
            last_page: self.state.last_page,
        }
    }
}

pub struct Scraper<B: Browser> {
    browser: B,
    options: ScraperOptions,
    should_terminate: Arc<AtomicBool>,
}

impl<B: Browser> Scraper<B> {
    pub fn new(browser: B, options: ScraperOptions, should_terminate: Arc<AtomicBool>) -> Self {
        Scraper {
            browser,
            options,
            should_terminate,
        }
    }

    pub fn options(&self) -> &ScraperOptions {
        &self.options
    }

    pub async fn run(&self, mode: RunMode) -> anyhow::Result<RunSummary> {
        let store = CheckpointStore::new(self.options.checkpoint_path());
        if self.options.fresh {
            store.clear()?;
        }
        let state = match mode {
            RunMode::Resume => store.load(),
            _ if store.exists() => {
                return Err(anyhow!(
                    "checkpoint {:?} exists, pass --resume to continue it or --fresh to discard it",
                    store.path()
                ))
            }
            _ => CheckpointState::default(),
        };

        info!(
            "starting {:?} scrape of {} with {} retries, {}ms delay, {} tools carried over",
            mode,
            self.options.listing_url,
            self.options.retries,
            self.options.request_delay_ms,
            state.results.len()
        );
        let mut ctx = RunContext::new(mode, state, store);

        let crawl = self.crawl(&mut ctx).await;
        if let Err(e) = &crawl {
            error!("scrape stopped: {}", e);
        }

        // the final save and export run whatever happened above
        let saved = ctx.save();
        let exported = self.export(&ctx.state.results);
        crawl?;
        saved?;
        exported?;

        let summary = ctx.summary();
        self.log_summary(&summary, &ctx.state.results);
        Ok(summary)
    }

    fn terminated(&self, ctx: &mut RunContext) -> bool {
        if self.should_terminate.load(Ordering::Relaxed) {
            if !ctx.interrupted {
                warn!("termination requested, finishing up");
            }
            ctx.interrupted = true;
        }
        ctx.interrupted
    }

    fn page_range(&self, ctx: &RunContext) -> (u32, Option<u32>) {
        match ctx.mode {
            RunMode::Test => (1, Some(TEST_MODE_PAGES)),
            RunMode::Full => (1, self.options.max_pages),
            RunMode::Resume => (ctx.state.last_page + 1, self.options.max_pages),
        }
    }

    async fn crawl(&self, ctx: &mut RunContext) -> Result<(), ScraperError> {
        if ctx.mode == RunMode::Resume && !ctx.state.failed_ids.is_empty() {
            let retry: Vec<String> = ctx.state.failed_ids.iter().cloned().collect();
            info!("retrying {} tools that failed in an earlier run", retry.len());
            for id in retry {
                if self.terminated(ctx) {
                    return Ok(());
                }
                self.process_tool(ctx, &id).await?;
            }
        }

        let per_page = match ctx.mode {
            RunMode::Test => TEST_MODE_TOOLS,
            _ => usize::MAX,
        };
        let (first, last) = self.page_range(ctx);
        let mut page = first;

        while last.map_or(true, |l| page <= l) {
            if self.terminated(ctx) {
                return Ok(());
            }
            let links = match self.listing(ctx, page).await {
                Ok(links) => links,
                // nothing reachable at all is fatal, a later page only cuts the run short
                Err(e) if page == first => {
                    error!("listing page {} could not be loaded: {}", page, e);
                    return Err(e);
                }
                Err(e) => {
                    error!("listing page {} could not be loaded, stopping: {}", page, e);
                    ctx.failures.push(ToolFailure {
                        id: listing_page_url(&self.options.listing_url, page),
                        reason: e.to_string(),
                    });
                    ctx.incomplete = true;
                    break;
                }
            };
            if links.is_empty() {
                info!("no tools on listing page {}, done paginating", page);
                break;
            }
            let truncated = links.len() > per_page;
            info!(
                "listing page {}: {} tools{}",
                page,
                links.len(),
                if truncated { " (capped)" } else { "" }
            );

            for id in links.iter().take(per_page) {
                if self.terminated(ctx) {
                    return Ok(());
                }
                if ctx.state.is_processed(id) || ctx.attempted.contains(id) {
                    debug!("skipping {}, already processed", id);
                    ctx.skipped += 1;
                    continue;
                }
                self.process_tool(ctx, id).await?;
            }

            if !truncated {
                ctx.finish_page(page)?;
            }
            page += 1;
        }
        Ok(())
    }

    async fn throttle(&self, ctx: &mut RunContext) {
        if ctx.requests > 0 {
            let delay = jitter(
                Duration::from_millis(self.options.request_delay_ms),
                Duration::from_millis(self.options.delay_jitter_ms),
            );
            if !delay.is_zero() {
                debug!("sleeping for {}ms", delay.as_millis());
                sleep(delay).await;
            }
        }
        ctx.requests += 1;
    }

    async fn open_with_retry(&self, url: &str) -> Result<(Box<dyn Page>, String), ScraperError> {
        let strategy =
            FixedInterval::from_millis(self.options.retry_backoff_ms).take(self.options.retries);
        let mut attempt = 0;
        RetryIf::spawn(
            strategy,
            || {
                attempt += 1;
                if attempt > 1 {
                    warn!("retrying {} (attempt {})", url, attempt);
                }
                let opened = self
                    .browser
                    .open(url)
                    .and_then(|page| page.content().map(|html| (page, html)));
                std::future::ready(opened)
            },
            |e: &ScraperError| e.is_retryable(),
        )
        .await
    }

    async fn listing(&self, ctx: &mut RunContext, page: u32) -> Result<Vec<String>, ScraperError> {
        let url = listing_page_url(&self.options.listing_url, page);
        self.throttle(ctx).await;
        debug!("loading listing page {} at {}", page, url);
        let (_page, html) = self.open_with_retry(&url).await?;
        let doc = HtmlDocument::parse(&html);
        Ok(tool_links(&doc, &url))
    }

    async fn process_tool(&self, ctx: &mut RunContext, id: &str) -> Result<(), ScraperError> {
        ctx.attempted.insert(id.to_string());
        self.throttle(ctx).await;
        debug!("processing tool {}", id);
        match self.visit_tool(id).await {
            Ok(record) => ctx.commit(id, record, self.options.checkpoint_every),
            Err(e) => {
                error!("tool {} failed: {}", id, e);
                ctx.fail(id, &e)
            }
        }
    }

    async fn visit_tool(&self, url: &str) -> Result<ToolRecord, ScraperError> {
        let (page, html) = self.open_with_retry(url).await?;
        let mut record = {
            let doc = HtmlDocument::parse(&html);
            extractor::extract(&doc, url)?
        };

        let text = format!("{} {}", record.full_description, record.features.join(" "));
        record.category = classifier::classify(&text).to_string();

        let shots = capturer::capture(page.as_ref());
        record.screenshots = capturer::store(
            &shots,
            &screenshot_stem(&record.name, url),
            &self.options.screenshot_dir(),
        );
        record.img_url = record.screenshots.representative();
        debug!(
            "{}: {} features, {} social links, {} screenshots",
            record.name,
            record.features.len(),
            record.social_links.len(),
            shots.len()
        );
        Ok(record)
    }

    fn export(&self, records: &[ToolRecord]) -> anyhow::Result<()> {
        exporter::to_json(records, &self.options.json_path())?;
        exporter::to_csv(records, &self.options.csv_path())?;
        Ok(())
    }

    fn log_summary(&self, summary: &RunSummary, records: &[ToolRecord]) {
        info!(
            "scrape {} in {:.1}s: {} succeeded, {} failed, {} skipped, {} tools in output, last page {}",
            if summary.interrupted {
                "interrupted"
            } else if summary.incomplete {
                "cut short"
            } else {
                "finished"
            },
            summary.duration.as_secs_f64(),
            summary.succeeded,
            summary.failed(),
            summary.skipped,
            summary.count,
            summary.last_page
        );
        for failure in &summary.failures {
            warn!("failed: {} ({})", failure.id, failure.reason);
        }
        for (category, names) in exporter::category_summary(records) {
            info!("{} ({} tools): {}", category, names.len(), names.join(", "));
        }
    }
}

/// Absolute detail-page URLs on a listing page, in listing order, without repeats.
pub fn tool_links(doc: &dyn Document, base_url: &str) -> Vec<String> {
    let mut hrefs = doc.find_all_attr(TOOL_LINK, "href");
    if hrefs.is_empty() {
        hrefs = doc.find_all_attr(TOOL_LINK_FALLBACK, "href");
    }
    let mut seen = HashSet::new();
    hrefs
        .iter()
        .filter_map(|href| normalize_url(base_url, href))
        .filter(|url| seen.insert(url.clone()))
        .collect()
}
