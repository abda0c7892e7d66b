use rand::Rng;
use reqwest::Url;
use sha2::{Digest, Sha256};
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    time::Duration,
};

pub const SITE_URL: &str = "https://www.toolify.ai";
pub const OUTPUT_JSON: &str = "toolify_ai_tools.json";
pub const OUTPUT_CSV: &str = "toolify_ai_tools.csv";
pub const CHECKPOINT_FILE: &str = "scrape_checkpoint.json";
pub const LOG_FILE: &str = "scraper.log";
pub const SCREENSHOT_DIR: &str = "screenshots";

// placeholder served by the site when a tool has no logo of its own
pub const PLACEHOLDER_LOGO: &str = "/2.9.4/img/logo.f3a91ce.png";
// the site's own contact address, linked from every page footer
pub const PLACEHOLDER_EMAIL: &str = "business@toolify.ai";

pub const TEST_MODE_PAGES: u32 = 1;
pub const TEST_MODE_TOOLS: usize = 5;

lazy_static! {
    pub static ref LISTING_URL: String = match std::env::var("TOOLIFY_BASE_URL") {
        Ok(u) if !u.is_empty() => u,
        _ => format!("{}/category/advertising-assistant", SITE_URL),
    };
}

/// Listing page `n` lives under `/page/n`, except the first one.
pub fn listing_page_url(base_url: &str, page: u32) -> String {
    let base = base_url.trim_end_matches('/');
    if page > 1 {
        format!("{}/page/{}", base, page)
    } else {
        base.to_string()
    }
}

pub fn normalize_url(base_url: &str, url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    let mut new_url = match Url::parse(url) {
        Ok(u) => u,
        Err(_) => {
            let base = Url::parse(base_url).ok()?;
            base.join(url).ok()?
        }
    };
    if new_url.scheme() != "http" && new_url.scheme() != "https" {
        return None;
    }
    // we remove the fragments (#)
    new_url.set_fragment(None);
    Some(new_url.to_string())
}

/// Filesystem-safe stem derived from a tool name. Letters and digits of any
/// script are kept, lowercased.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    if slug.is_empty() {
        return String::from("tool");
    }
    slug
}

/// Screenshot file stem: the name slug plus a short digest of the tool id, so
/// tools whose names slug alike never share files.
pub fn screenshot_stem(name: &str, id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    let result = hasher.finalize();
    let suffix: String = result.iter().take(4).map(|b| format!("{:02x}", b)).collect();
    format!("{}_{}", slugify(name), suffix)
}

/// Sibling of `path` used while it is being rewritten.
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Replaces `path` with `data` through a synced temp file and a rename, so
/// readers see either the old or the new content.
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = tmp_path(path);
    let write = || -> io::Result<()> {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(data)?;
        f.sync_all()?;
        fs::rename(&tmp, path)
    };
    write().map_err(|e| {
        let _ = fs::remove_file(&tmp);
        e
    })
}

/// Base delay plus a random share of `max_jitter`.
pub fn jitter(base: Duration, max_jitter: Duration) -> Duration {
    if max_jitter.is_zero() {
        return base;
    }
    let mut rng = rand::thread_rng();
    let extra = rng.gen_range(0..=max_jitter.as_millis() as u64);
    base + Duration::from_millis(extra)
}

/// Collapses whitespace runs inside a piece of visible text.
pub fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn remove_path_fragments() {
        assert_eq!(
            normalize_url("https://example.com", "https://example.com#hello").unwrap(),
            "https://example.com/"
        );
        assert_eq!(
            normalize_url("https://example.com", "/hello#test").unwrap(),
            "https://example.com/hello"
        );
    }

    #[test]
    fn rejects_non_web_links() {
        assert_eq!(normalize_url("https://example.com", "mailto:a@b.c"), None);
        assert_eq!(normalize_url("https://example.com", "  "), None);
    }

    #[test]
    fn listing_pages() {
        let base = "https://www.toolify.ai/category/advertising-assistant/";
        assert_eq!(
            listing_page_url(base, 1),
            "https://www.toolify.ai/category/advertising-assistant"
        );
        assert_eq!(
            listing_page_url(base, 3),
            "https://www.toolify.ai/category/advertising-assistant/page/3"
        );
    }

    #[test]
    fn slugs() {
        assert_eq!(slugify("Jasper AI"), "jasper_ai");
        assert_eq!(slugify("  Ad-Creative.ai!! "), "ad_creative_ai");
        assert_eq!(slugify("ÆØÅ"), "æøå");
        assert_eq!(slugify("智能广告"), "智能广告");
        assert_ne!(slugify("智能广告"), slugify("视频剪辑"));
        assert_eq!(slugify("🚀 !!"), "tool");
    }

    #[test]
    fn stems_differ_for_lookalike_names() {
        let a = screenshot_stem("Jasper AI", "https://www.toolify.ai/tool/jasper-ai");
        let b = screenshot_stem("Jasper.AI", "https://www.toolify.ai/tool/jasper-ai-2");
        assert_ne!(a, b);
        assert!(a.starts_with("jasper_ai_"));
        assert_eq!(a.len(), "jasper_ai_".len() + 8);
        assert_eq!(a, screenshot_stem("Jasper AI", "https://www.toolify.ai/tool/jasper-ai"));
    }

    #[test]
    fn atomic_write_replaces_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.json");
        write_atomic(&path, b"first version, longer").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn failed_atomic_write_keeps_old_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        fs::write(&path, b"old").unwrap();
        // a directory in the way of the temp file makes the write fail
        fs::create_dir(tmp_path(&path)).unwrap();
        assert!(write_atomic(&path, b"new").is_err());
        assert_eq!(fs::read(&path).unwrap(), b"old");
    }

    #[test]
    fn jitter_stays_in_range() {
        let base = Duration::from_millis(100);
        assert_eq!(jitter(base, Duration::ZERO), base);
        for _ in 0..20 {
            let d = jitter(base, Duration::from_millis(50));
            assert!(d >= base && d <= Duration::from_millis(150));
        }
    }
}
