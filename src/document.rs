use scraper::{ElementRef, Html, Node, Selector};

use crate::utils::squash_whitespace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub text: String,
    pub href: String,
}

/// Read-only view of a parsed page. Lookups are positional: the first or all
/// elements matching a CSS selector. An invalid selector matches nothing.
pub trait Document {
    fn find_text(&self, selector: &str) -> Option<String> {
        self.find_all_text(selector).into_iter().next()
    }
    fn find_all_text(&self, selector: &str) -> Vec<String>;
    /// Text of the first match with a line break before each block element.
    /// Whitespace is otherwise left as is.
    fn find_raw_text(&self, selector: &str) -> Option<String>;
    fn find_attr(&self, selector: &str, attr: &str) -> Option<String>;
    fn find_all_attr(&self, selector: &str, attr: &str) -> Vec<String>;
    fn find_links(&self, selector: &str) -> Vec<Link>;
}

pub struct HtmlDocument {
    html: Html,
}

impl HtmlDocument {
    pub fn parse(content: &str) -> Self {
        HtmlDocument {
            html: Html::parse_document(content),
        }
    }

    fn select<'a>(&'a self, selector: &str) -> Vec<ElementRef<'a>> {
        match Selector::parse(selector) {
            Ok(s) => self.html.select(&s).collect(),
            Err(e) => {
                warn!("invalid selector '{}': {:?}", selector, e);
                vec![]
            }
        }
    }
}

const BLOCK_TAGS: &[&str] = &[
    "article", "br", "dd", "div", "dt", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "ol", "p", "section", "table", "tr", "ul",
];

fn element_text(el: &ElementRef) -> String {
    squash_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

fn element_lines(el: &ElementRef) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        match node.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(e) if BLOCK_TAGS.contains(&e.name()) => out.push('\n'),
            _ => {}
        }
    }
    out
}

impl Document for HtmlDocument {
    fn find_all_text(&self, selector: &str) -> Vec<String> {
        self.select(selector)
            .iter()
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect()
    }

    fn find_raw_text(&self, selector: &str) -> Option<String> {
        self.select(selector)
            .first()
            .map(element_lines)
            .filter(|t| !t.trim().is_empty())
    }

    fn find_attr(&self, selector: &str, attr: &str) -> Option<String> {
        self.find_all_attr(selector, attr).into_iter().next()
    }

    fn find_all_attr(&self, selector: &str, attr: &str) -> Vec<String> {
        self.select(selector)
            .iter()
            .filter_map(|el| el.value().attr(attr))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect()
    }

    fn find_links(&self, selector: &str) -> Vec<Link> {
        self.select(selector)
            .iter()
            .filter_map(|el| {
                let href = el.value().attr("href")?.trim();
                if href.is_empty() {
                    return None;
                }
                Some(Link {
                    text: element_text(el),
                    href: href.to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <h1>  Copy
            Genius </h1>
          <ul class="features-list"><li>One</li><li> </li><li>Two</li></ul>
          <a href="/pricing">See <b>Pricing</b></a>
          <a>no href</a>
          <img src=" /logo.png ">
        </body></html>"#;

    #[test]
    fn text_is_trimmed_and_squashed() {
        let d = HtmlDocument::parse(PAGE);
        assert_eq!(d.find_text("h1").as_deref(), Some("Copy Genius"));
        assert_eq!(d.find_all_text(".features-list li"), vec!["One", "Two"]);
        assert_eq!(d.find_text("h2"), None);
    }

    #[test]
    fn attributes_and_links() {
        let d = HtmlDocument::parse(PAGE);
        assert_eq!(d.find_attr("img[src]", "src").as_deref(), Some("/logo.png"));
        let links = d.find_links("a");
        assert_eq!(
            links,
            vec![Link {
                text: "See Pricing".into(),
                href: "/pricing".into()
            }]
        );
    }

    #[test]
    fn raw_text_keeps_block_boundaries() {
        let d = HtmlDocument::parse(
            "<div class='info'><p>Great <b>tool</b></p><h2>FAQ from X</h2><p>Free?</p></div>",
        );
        let raw = d.find_raw_text(".info").unwrap();
        let lines: Vec<&str> = raw.lines().filter(|l| !l.trim().is_empty()).collect();
        assert_eq!(lines, vec!["Great tool", "FAQ from X", "Free?"]);
        assert_eq!(d.find_raw_text(".missing"), None);
    }

    #[test]
    fn bad_selector_matches_nothing() {
        let d = HtmlDocument::parse(PAGE);
        assert!(d.find_all_text("li[[").is_empty());
    }
}
