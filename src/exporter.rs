//! JSON and CSV output for scraped tools.
//!
//! CSV columns, in order:
//!
//! | column                 | source                                   |
//! |------------------------|------------------------------------------|
//! | `name`                 | `name`                                   |
//! | `category`             | `category`                               |
//! | `full_description`     | `full_description`                       |
//! | `features`             | `features` joined with `;`, order kept   |
//! | `social_links`         | `social_links` joined with `;`, sorted   |
//! | `pricing_link`         | `pricing_link`, empty when absent        |
//! | `logo_url`             | `logo_url`, empty when absent            |
//! | `img_url`              | `img_url`, empty when absent             |
//! | `screenshots.full`     | `screenshots.full`, empty when absent    |
//! | `screenshots.content`  | `screenshots.content`                    |
//! | `screenshots.features` | `screenshots.features`                   |
//! | `screenshots.hero`     | `screenshots.hero`                       |
//! | `support_email`        | `support_email`                          |
//! | `monthly_traffic`      | `monthly_traffic`                        |
//! | `rating`               | `rating`                                 |
//!
//! Scalar columns round-trip exactly. A feature that itself contains `;` is
//! split on read, and empty features are dropped.

use std::{collections::BTreeMap, fs, path::Path};

use anyhow::anyhow;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    types::{ScraperError, Screenshots, ToolRecord},
    utils::write_atomic,
};

pub const LIST_SEPARATOR: char = ';';

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    name: String,
    category: String,
    full_description: String,
    features: String,
    social_links: String,
    pricing_link: Option<String>,
    logo_url: Option<String>,
    img_url: Option<String>,
    #[serde(rename = "screenshots.full")]
    screenshot_full: Option<String>,
    #[serde(rename = "screenshots.content")]
    screenshot_content: Option<String>,
    #[serde(rename = "screenshots.features")]
    screenshot_features: Option<String>,
    #[serde(rename = "screenshots.hero")]
    screenshot_hero: Option<String>,
    support_email: Option<String>,
    monthly_traffic: Option<String>,
    rating: Option<f32>,
}

fn split_list(cell: &str) -> impl Iterator<Item = String> + '_ {
    cell.split(LIST_SEPARATOR)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
}

impl From<&ToolRecord> for CsvRow {
    fn from(r: &ToolRecord) -> Self {
        CsvRow {
            name: r.name.clone(),
            category: r.category.clone(),
            full_description: r.full_description.clone(),
            features: r.features.iter().join(&LIST_SEPARATOR.to_string()),
            social_links: r.social_links.iter().join(&LIST_SEPARATOR.to_string()),
            pricing_link: r.pricing_link.clone(),
            logo_url: r.logo_url.clone(),
            img_url: r.img_url.clone(),
            screenshot_full: r.screenshots.full.clone(),
            screenshot_content: r.screenshots.content.clone(),
            screenshot_features: r.screenshots.features.clone(),
            screenshot_hero: r.screenshots.hero.clone(),
            support_email: r.support_email.clone(),
            monthly_traffic: r.monthly_traffic.clone(),
            rating: r.rating,
        }
    }
}

impl From<CsvRow> for ToolRecord {
    fn from(row: CsvRow) -> Self {
        ToolRecord {
            features: split_list(&row.features).collect(),
            social_links: split_list(&row.social_links).collect(),
            name: row.name,
            category: row.category,
            full_description: row.full_description,
            pricing_link: row.pricing_link,
            logo_url: row.logo_url,
            img_url: row.img_url,
            screenshots: Screenshots {
                full: row.screenshot_full,
                content: row.screenshot_content,
                features: row.screenshot_features,
                hero: row.screenshot_hero,
            },
            support_email: row.support_email,
            monthly_traffic: row.monthly_traffic,
            rating: row.rating,
        }
    }
}

pub fn to_json(records: &[ToolRecord], path: &Path) -> anyhow::Result<()> {
    let data = serde_json::to_vec_pretty(records)?;
    write_atomic(path, &data)?;
    info!("saved {} tools to {:?}", records.len(), path);
    Ok(())
}

pub fn to_csv(records: &[ToolRecord], path: &Path) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(vec![]);
    for record in records {
        writer.serialize(CsvRow::from(record))?;
    }
    if records.is_empty() {
        // serde only emits the header alongside the first row
        writer.write_record(csv_header())?;
    }
    let data = writer
        .into_inner()
        .map_err(|e| anyhow!("could not flush csv for {:?}: {}", path, e.error()))?;
    write_atomic(path, &data)?;
    info!("saved {} tools to {:?}", records.len(), path);
    Ok(())
}

pub fn csv_header() -> [&'static str; 15] {
    [
        "name",
        "category",
        "full_description",
        "features",
        "social_links",
        "pricing_link",
        "logo_url",
        "img_url",
        "screenshots.full",
        "screenshots.content",
        "screenshots.features",
        "screenshots.hero",
        "support_email",
        "monthly_traffic",
        "rating",
    ]
}

pub fn read_json(path: &Path) -> Result<Vec<ToolRecord>, ScraperError> {
    let data = fs::read(path)
        .map_err(|e| ScraperError::Conversion(format!("could not read {:?}: {}", path, e)))?;
    serde_json::from_slice(&data)
        .map_err(|e| ScraperError::Conversion(format!("malformed json in {:?}: {}", path, e)))
}

pub fn read_csv(path: &Path) -> Result<Vec<ToolRecord>, ScraperError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| ScraperError::Conversion(format!("could not read {:?}: {}", path, e)))?;
    reader
        .deserialize::<CsvRow>()
        .map(|row| {
            row.map(ToolRecord::from)
                .map_err(|e| ScraperError::Conversion(format!("malformed csv in {:?}: {}", path, e)))
        })
        .collect()
}

/// Standalone JSON to CSV conversion. Returns the number of rows written.
pub fn convert(json_path: &Path, csv_path: &Path) -> Result<usize, ScraperError> {
    let records = read_json(json_path)?;
    to_csv(&records, csv_path)
        .map_err(|e| ScraperError::Conversion(format!("could not write {:?}: {}", csv_path, e)))?;
    Ok(records.len())
}

/// Tool names grouped by category, both sorted.
pub fn category_summary(records: &[ToolRecord]) -> BTreeMap<String, Vec<String>> {
    let mut by_category: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for r in records {
        by_category
            .entry(r.category.clone())
            .or_default()
            .push(r.name.clone());
    }
    for names in by_category.values_mut() {
        names.sort();
    }
    by_category
}
