use std::{fs, path::Path};

use crate::{
    browser_controller::Page,
    types::{Region, Screenshots},
};

/// Raw PNG bytes per region; `None` where the region could not be captured.
#[derive(Debug, Default)]
pub struct CaptureSet {
    pub full: Option<Vec<u8>>,
    pub hero: Option<Vec<u8>>,
    pub content: Option<Vec<u8>>,
    pub features: Option<Vec<u8>>,
}

impl CaptureSet {
    fn slot(&mut self, region: Region) -> &mut Option<Vec<u8>> {
        match region {
            Region::Full => &mut self.full,
            Region::Hero => &mut self.hero,
            Region::Content => &mut self.content,
            Region::Features => &mut self.features,
        }
    }

    pub fn get(&self, region: Region) -> Option<&Vec<u8>> {
        match region {
            Region::Full => self.full.as_ref(),
            Region::Hero => self.hero.as_ref(),
            Region::Content => self.content.as_ref(),
            Region::Features => self.features.as_ref(),
        }
    }

    pub fn len(&self) -> usize {
        Region::ALL.iter().filter(|r| self.get(**r).is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn anchor(region: Region) -> &'static str {
    match region {
        Region::Full => "main",
        Region::Hero => ".tool-detail-header",
        Region::Content => ".tool-detail-information",
        Region::Features => ".features-list",
    }
}

/// Best-effort capture of every region. Never fails: problems are logged and
/// the region is left empty, except `full` which falls back to the viewport.
pub fn capture(page: &dyn Page) -> CaptureSet {
    let mut set = CaptureSet::default();
    let url = page.url();

    for region in Region::ALL {
        let shot = match page.screenshot_element(anchor(region)) {
            Ok(shot) => shot,
            Err(e) => {
                warn!("{} screenshot failed for {}: {}", region.suffix(), url, e);
                None
            }
        };
        *set.slot(region) = shot;
    }

    if set.full.is_none() {
        debug!("no {} anchor on {}, capturing viewport", anchor(Region::Full), url);
        match page.screenshot_viewport() {
            Ok(png) => set.full = Some(png),
            Err(e) => warn!("viewport screenshot failed for {}: {}", url, e),
        }
    }

    set
}

/// Writes the captured regions as `<dir>/<slug>_<region>.png` and returns their paths.
pub fn store(set: &CaptureSet, slug: &str, dir: &Path) -> Screenshots {
    let mut screenshots = Screenshots::default();
    if set.is_empty() {
        return screenshots;
    }
    if let Err(e) = fs::create_dir_all(dir) {
        warn!("could not create screenshot dir {:?}: {}", dir, e);
        return screenshots;
    }

    for region in Region::ALL {
        let png = match set.get(region) {
            Some(png) => png,
            None => continue,
        };
        let path = dir.join(format!("{}_{}.png", slug, region.suffix()));
        match fs::write(&path, png) {
            Ok(_) => screenshots.set(region, Some(path.to_string_lossy().to_string())),
            Err(e) => warn!("could not save screenshot {:?}: {}", path, e),
        }
    }
    screenshots
}
