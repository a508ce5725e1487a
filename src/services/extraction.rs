use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::models::domain::PageContent;

static BASE_SELECTOR: Lazy<Selector> = Lazy::new(|| parse_selector("base[href]"));
static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| parse_selector("a[href]"));
static AUDIO_SELECTOR: Lazy<Selector> = Lazy::new(|| parse_selector("audio"));
static SOURCE_SELECTOR: Lazy<Selector> = Lazy::new(|| parse_selector("source[src]"));
static IMAGE_SELECTOR: Lazy<Selector> = Lazy::new(|| parse_selector("img[src]"));
static SCRIPT_SELECTOR: Lazy<Selector> = Lazy::new(|| parse_selector("script"));

const HIDDEN_TEXT_PARENTS: [&str; 4] = ["script", "style", "noscript", "template"];

fn parse_selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid CSS")
}

/// Resolve `reference` against `base`, keeping it verbatim when either side
/// cannot be parsed.
pub fn resolve_url(base: &str, reference: &str) -> String {
    let reference = reference.trim();
    match Url::parse(base).and_then(|b| b.join(reference)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => reference.to_string(),
    }
}

fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("")
}

/// Visible text of a document: each non-blank text node, trimmed, one per line.
/// Text anywhere below a script, style, noscript or template element is skipped.
pub fn visible_text(document: &Html) -> String {
    let mut lines = Vec::new();
    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_TEXT_PARENTS.contains(&el.name()))
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }
    lines.join("\n")
}

pub fn extract_page(html: &str, page_url: &str) -> PageContent {
    let document = Html::parse_document(html);

    let base_url = document
        .select(&BASE_SELECTOR)
        .next()
        .and_then(|base| base.value().attr("href"))
        .map(|href| resolve_url(page_url, href))
        .unwrap_or_else(|| page_url.to_string());

    if base_url != page_url {
        log::info!("Found <base> tag, using base URL: {}", base_url);
    }

    let links = document
        .select(&LINK_SELECTOR)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            Some(format!(
                "Link: [{}]({})",
                element_text(&a),
                resolve_url(&base_url, href)
            ))
        })
        .collect();

    let mut audio = Vec::new();
    for element in document.select(&AUDIO_SELECTOR) {
        if let Some(src) = element.value().attr("src") {
            audio.push(format!("Audio: {}", resolve_url(&base_url, src)));
        }
        for source in element.select(&SOURCE_SELECTOR) {
            if let Some(src) = source.value().attr("src") {
                audio.push(format!("Audio: {}", resolve_url(&base_url, src)));
            }
        }
    }

    let images = document
        .select(&IMAGE_SELECTOR)
        .filter_map(|img| {
            let src = img.value().attr("src")?;
            if src.trim().is_empty() {
                return None;
            }
            let alt = img.value().attr("alt").unwrap_or("No description");
            Some(format!("Image: [{}]({})", alt, resolve_url(&base_url, src)))
        })
        .collect();

    PageContent {
        text: visible_text(&document),
        base_url,
        links,
        audio,
        images,
        screenshot: None,
    }
}

/// Scripts embedded in or referenced by a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageScripts {
    pub inline: Vec<String>,
    pub external: Vec<String>,
}

pub fn extract_scripts(html: &str, page_url: &str) -> PageScripts {
    let document = Html::parse_document(html);
    let mut scripts = PageScripts::default();

    for script in document.select(&SCRIPT_SELECTOR) {
        match script.value().attr("src") {
            Some(src) if !src.trim().is_empty() => {
                scripts.external.push(resolve_url(page_url, src));
            }
            _ => {
                let body: String = script.text().collect();
                if !body.trim().is_empty() {
                    scripts.inline.push(body.trim().to_string());
                }
            }
        }
    }
    scripts
}
