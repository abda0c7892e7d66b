use anyhow::{anyhow, Context, Result};
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{browser::default_executable, Browser as ChromeProcess, LaunchOptions, Tab};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, PidExt, ProcessExt, System, SystemExt};

use crate::types::ScraperError;

/// Opens pages. One implementation drives Chrome, tests use an in-memory one.
pub trait Browser {
    fn open(&self, url: &str) -> Result<Box<dyn Page>, ScraperError>;
}

/// A rendered page the scraper reads and photographs.
pub trait Page {
    fn url(&self) -> String;
    fn content(&self) -> Result<String, ScraperError>;
    /// PNG of the element's bounding box, `None` when it is missing or has no size.
    fn screenshot_element(&self, selector: &str) -> Result<Option<Vec<u8>>, ScraperError>;
    fn screenshot_viewport(&self) -> Result<Vec<u8>, ScraperError>;
}

fn get_scroll_script(interval_ms: u64) -> String {
    format!(
        r#" new Promise((resolve) => {{
            var totalHeight = 0;
            var distance = 200;
            var timer = setInterval(() => {{
                var scrollHeight = document.body.scrollHeight;
                window.scrollBy(0, distance);
                totalHeight += distance;

                if(totalHeight >= scrollHeight - window.innerHeight){{
                    clearInterval(timer);
                    window.scrollTo(0, 0);
                    resolve("ok");
                }}
            }}, {});
        }});"#,
        interval_ms
    )
}

pub struct BrowserController {
    browser: ChromeProcess,
    tab: Arc<Tab>,
    ready_selector: Option<String>,
    timeout: Duration,
}

impl BrowserController {
    pub fn new(timeout: Duration, headless: bool) -> Result<Self> {
        let is_docker = std::env::var("IN_DOCKER").is_ok();
        let path = default_executable().map_err(|e| anyhow!("could not find chrome: {}", e))?;
        let options = LaunchOptions::default_builder()
            .path(Some(path))
            .headless(headless)
            .window_size(Some((1280, 800)))
            .idle_browser_timeout(timeout * 4)
            // warning only do this if in docker env
            .sandbox(!is_docker)
            .build()
            .map_err(|e| anyhow!("invalid launch options: {}", e))?;
        let browser = ChromeProcess::new(options).context("browser launching error")?;
        let tab = browser.new_tab().context("could not create new tab")?;
        tab.set_default_timeout(timeout);

        Ok(BrowserController {
            browser,
            tab,
            ready_selector: None,
            timeout,
        })
    }

    /// Selector waited for after each navigation before the page counts as loaded.
    pub fn wait_for(mut self, selector: &str) -> Self {
        self.ready_selector = Some(selector.to_string());
        self
    }

    pub fn kill(&self) -> bool {
        let pid = match self.browser.get_process_id() {
            Some(pid) => pid,
            None => return false,
        };
        let mut s = System::new();
        s.refresh_processes();
        if let Some(process) = s.process(Pid::from_u32(pid)) {
            debug!("killing process with id {}", pid);
            return process.kill();
        }
        false
    }
}

impl Browser for BrowserController {
    fn open(&self, url: &str) -> Result<Box<dyn Page>, ScraperError> {
        debug!("navigating to {}", url);
        let nv = self
            .tab
            .navigate_to(url)
            .map_err(|e| ScraperError::navigation(url, e))?;
        if let Err(e) = nv.wait_until_navigated() {
            // we wait one more timeout
            warn!("error waiting for navigation to {}, retrying {}", url, e);
            nv.wait_until_navigated()
                .map_err(|e| ScraperError::navigation(url, e))?;
        }

        if let Some(selector) = &self.ready_selector {
            if let Err(e) = self
                .tab
                .wait_for_element_with_custom_timeout(selector, self.timeout)
            {
                // the page rendered but without the expected anchor, extraction decides
                warn!("{} never showed {}: {}", url, selector, e);
            }
        }

        debug!("scrolling....");
        if let Err(e) = self.tab.evaluate(&get_scroll_script(50), true) {
            warn!("scrolling for url {} failed {}", url, e);
        }
        debug!("scrolling ended");

        Ok(Box::new(ChromePage {
            tab: self.tab.clone(),
        }))
    }
}

impl Drop for BrowserController {
    fn drop(&mut self) {
        debug!("killing browser process...");
        self.kill();
    }
}

pub struct ChromePage {
    tab: Arc<Tab>,
}

impl Page for ChromePage {
    fn url(&self) -> String {
        self.tab.get_url()
    }

    fn content(&self) -> Result<String, ScraperError> {
        self.tab
            .get_content()
            .map_err(|e| ScraperError::navigation(&self.tab.get_url(), e))
    }

    fn screenshot_element(&self, selector: &str) -> Result<Option<Vec<u8>>, ScraperError> {
        let element = match self.tab.find_element(selector) {
            Ok(el) => el,
            Err(_) => return Ok(None),
        };
        let model = element
            .get_box_model()
            .map_err(|e| ScraperError::Capture(format!("box model of {}: {}", selector, e)))?;
        if model.width <= 0.0 || model.height <= 0.0 {
            return Ok(None);
        }
        element
            .capture_screenshot(CaptureScreenshotFormatOption::Png)
            .map(Some)
            .map_err(|e| ScraperError::Capture(format!("{}: {}", selector, e)))
    }

    fn screenshot_viewport(&self) -> Result<Vec<u8>, ScraperError> {
        self.tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| ScraperError::Capture(format!("viewport: {}", e)))
    }
}
