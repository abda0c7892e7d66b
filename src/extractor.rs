use regex::Regex;

use crate::{
    document::Document,
    types::{ScraperError, ToolRecord},
    utils::{normalize_url, PLACEHOLDER_EMAIL, PLACEHOLDER_LOGO},
};

const NAME: &str = "h1";
const DESCRIPTION: &str = ".tool-detail-information";
const FEATURES: &str = ".features-list li";
const SOCIAL_LINKS: &str = r#"a[href*="twitter.com"], a[href*="://x.com/"], a[href*="://www.x.com/"], a[href*="linkedin.com"], a[href*="facebook.com"]"#;
const SUPPORT_EMAIL: &str = r#"a[href^="mailto:"]"#;
const MONTHLY_TRAFFIC: &str = r#"span[title="Monthly Visits"] + span"#;
const RATING: &str = ".rating-value";
const LOGO: [&str; 3] = [
    ".tool-detail-header img[src]",
    "img.tool-logo[src]",
    "img[src]",
];

lazy_static! {
    static ref QA_PLACEHOLDER: Regex = Regex::new(r"[ \t]*\bQ\d+[ \t]+A\d+\b").unwrap();
    static ref FAQ_HEADING: Regex = Regex::new(r"(?m)^[ \t]*FAQ from[^\n]*$").unwrap();
}

/// Builds a partial record from a detail page. Category and screenshots are
/// left empty for the caller to fill in.
pub fn extract(doc: &dyn Document, base_url: &str) -> Result<ToolRecord, ScraperError> {
    let name = doc
        .find_text(NAME)
        .ok_or_else(|| ScraperError::Extraction(format!("no tool name ({}) found", NAME)))?;

    let full_description = doc
        .find_raw_text(DESCRIPTION)
        .map(|d| clean_description(&d))
        .unwrap_or_default();

    let features = doc.find_all_text(FEATURES);

    let social_links = doc
        .find_all_attr(SOCIAL_LINKS, "href")
        .iter()
        .filter(|href| href.starts_with("http://") || href.starts_with("https://"))
        .filter_map(|href| normalize_url(base_url, href))
        .collect();

    let support_email = doc
        .find_all_attr(SUPPORT_EMAIL, "href")
        .iter()
        .filter_map(|href| href.trim_start_matches("mailto:").split('?').next())
        .map(|email| email.trim().to_string())
        .find(|email| email.contains('@') && !email.eq_ignore_ascii_case(PLACEHOLDER_EMAIL));

    let rating = doc
        .find_text(RATING)
        .and_then(|r| r.parse::<f32>().ok())
        .filter(|r| (0.0..=5.0).contains(r));

    Ok(ToolRecord {
        name,
        full_description,
        features,
        social_links,
        pricing_link: pricing_link(doc, base_url),
        logo_url: logo_url(doc, base_url),
        support_email,
        monthly_traffic: doc.find_text(MONTHLY_TRAFFIC),
        rating,
        ..Default::default()
    })
}

fn pricing_link(doc: &dyn Document, base_url: &str) -> Option<String> {
    let links = doc.find_links("a[href]");
    links
        .iter()
        .find(|l| l.text.to_lowercase().contains("pricing"))
        .or_else(|| {
            links
                .iter()
                .find(|l| l.href.to_lowercase().contains("pricing"))
        })
        .and_then(|l| normalize_url(base_url, &l.href))
}

fn logo_url(doc: &dyn Document, base_url: &str) -> Option<String> {
    LOGO.iter()
        .flat_map(|selector| doc.find_all_attr(selector, "src"))
        .find(|src| !src.ends_with(PLACEHOLDER_LOGO))
        .and_then(|src| normalize_url(base_url, &src))
}

/// Strips the site's FAQ scaffolding out of a description.
pub fn clean_description(text: &str) -> String {
    let text = QA_PLACEHOLDER.replace_all(text, " ");
    let text = FAQ_HEADING.replace_all(&text, "Frequently Asked Questions:");
    text.lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::document::HtmlDocument;

    const BASE: &str = "https://www.toolify.ai/tool/adgen";

    const DETAIL: &str = r#"
        <html><body>
          <div class="tool-detail-header"><img src="/2.9.4/img/logo.f3a91ce.png"><img src="https://cdn.toolify.ai/adgen.webp"></div>
          <h1>AdGen</h1>
          <div class="tool-detail-information">Generate ad creative   in seconds.</div>
          <ul class="features-list"><li>Ad copy</li><li>Banner sizes</li></ul>
          <a href="https://twitter.com/adgen">tw</a>
          <a href="https://www.linkedin.com/company/adgen">li</a>
          <a href="/relative/twitter.com">ignored</a>
          <footer><a href="mailto:business@toolify.ai">toolify</a></footer>
          <a href="mailto:help@adgen.io?subject=Hi">mail</a>
          <a href="https://adgen.io/plans">Pricing</a>
          <span title="Monthly Visits">Monthly Visits</span><span>12.5K</span>
          <span class="rating-value">4.5</span>
        </body></html>"#;

    #[test]
    fn extracts_detail_page() {
        let doc = HtmlDocument::parse(DETAIL);
        let r = extract(&doc, BASE).unwrap();
        assert_eq!(r.name, "AdGen");
        assert_eq!(r.full_description, "Generate ad creative in seconds.");
        assert_eq!(r.features, vec!["Ad copy", "Banner sizes"]);
        assert_eq!(
            r.social_links.iter().cloned().collect::<Vec<_>>(),
            vec![
                "https://twitter.com/adgen".to_string(),
                "https://www.linkedin.com/company/adgen".to_string()
            ]
        );
        assert_eq!(r.pricing_link.as_deref(), Some("https://adgen.io/plans"));
        assert_eq!(
            r.logo_url.as_deref(),
            Some("https://cdn.toolify.ai/adgen.webp")
        );
        assert_eq!(r.support_email.as_deref(), Some("help@adgen.io"));
        assert_eq!(r.monthly_traffic.as_deref(), Some("12.5K"));
        assert_eq!(r.rating, Some(4.5));
        assert!(r.category.is_empty());
        assert_eq!(r.img_url, None);
    }

    #[test]
    fn missing_name_is_an_extraction_error() {
        let doc = HtmlDocument::parse("<div class='tool-detail-information'>x</div>");
        match extract(&doc, BASE) {
            Err(ScraperError::Extraction(_)) => {}
            other => panic!("expected extraction error, got {:?}", other),
        }
    }

    #[test]
    fn optional_sections_default_to_empty() {
        let doc = HtmlDocument::parse("<h1>Bare</h1><a href='/plans/pricing'>plans</a>");
        let r = extract(&doc, BASE).unwrap();
        assert_eq!(r.name, "Bare");
        assert!(r.full_description.is_empty());
        assert!(r.features.is_empty());
        assert!(r.social_links.is_empty());
        assert_eq!(
            r.pricing_link.as_deref(),
            Some("https://www.toolify.ai/plans/pricing")
        );
        assert_eq!(r.logo_url, None);
        assert_eq!(r.rating, None);
    }

    #[test]
    fn x_profiles_are_social_but_lookalike_domains_are_not() {
        let doc = HtmlDocument::parse(
            "<h1>X</h1><a href='https://x.com/adgen'>x</a><a href='https://www.dropbox.com/s/a'>d</a>",
        );
        let r = extract(&doc, BASE).unwrap();
        assert_eq!(
            r.social_links.into_iter().collect::<Vec<_>>(),
            vec!["https://x.com/adgen".to_string()]
        );
    }

    #[test]
    fn site_contact_is_not_a_support_email() {
        let doc = HtmlDocument::parse("<h1>X</h1><a href='mailto:business@toolify.ai'>contact</a>");
        assert_eq!(extract(&doc, BASE).unwrap().support_email, None);
    }

    #[test]
    fn faq_heading_in_page_markup_is_rewritten() {
        let doc = HtmlDocument::parse(
            "<h1>AdGen</h1><div class=\"tool-detail-information\"><p>Great   tool</p>\n\
             <h2>FAQ from AdGen</h2>\n<p>Is it free?</p></div>",
        );
        assert_eq!(
            extract(&doc, BASE).unwrap().full_description,
            "Great tool\nFrequently Asked Questions:\nIs it free?"
        );
    }

    #[test]
    fn out_of_range_rating_is_dropped() {
        let doc = HtmlDocument::parse("<h1>X</h1><span class='rating-value'>9.1</span>");
        assert_eq!(extract(&doc, BASE).unwrap().rating, None);
    }

    #[test]
    fn cleans_faq_scaffolding() {
        let raw = "Great tool Q1 A1 for ads\nFAQ from AdGen\nIs it free?";
        assert_eq!(
            clean_description(raw),
            "Great tool for ads\nFrequently Asked Questions:\nIs it free?"
        );
    }
}
