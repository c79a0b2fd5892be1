// src/ingest/providers/rss.rs
//! RSS 2.0 / Atom feed provider.
//!
//! One provider per registered endpoint. In `Http` mode the body is fetched with the
//! shared client (user agent + request timeout baked in); `Fixture` mode parses a
//! static document and is what the tests use.

use async_trait::async_trait;
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::ingest::snippet;
use crate::ingest::types::{FetchError, RawItem, SourceProvider};

/* ----------------------------
RSS 2.0
---------------------------- */

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    // `<link>` and namespaced siblings like `<atom:link href=".."/>` share a local name.
    #[serde(default)]
    link: Vec<ItemLink>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemLink {
    #[serde(rename = "$text", default)]
    value: String,
}

impl Item {
    /// First link with a text body; `atom:link` elements are empty and skipped.
    fn text_link(&self) -> Option<String> {
        self.link
            .iter()
            .map(|l| l.value.trim())
            .find(|v| !v.is_empty())
            .map(str::to_string)
    }
}

/* ----------------------------
Atom
---------------------------- */

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<TextNode>,
    #[serde(default)]
    link: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<TextNode>,
    content: Option<TextNode>,
}

// Atom text constructs carry a `type` attribute, so they can't go straight into a String.
#[derive(Debug, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

impl AtomEntry {
    fn alternate_link(&self) -> Option<String> {
        self.link
            .iter()
            .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .or_else(|| self.link.first())
            .and_then(|l| l.href.clone())
    }
}

pub struct FeedProvider {
    name: String,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl FeedProvider {
    /// Parse a static document instead of hitting the network.
    pub fn from_fixture(name: impl Into<String>, xml: &str) -> Self {
        Self {
            name: name.into(),
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn from_url(url: impl Into<String>, client: reqwest::Client) -> Self {
        let url = url.into();
        Self {
            name: url.clone(),
            mode: Mode::Http { url, client },
        }
    }

    async fn fetch_body(url: &str, client: &reqwest::Client) -> Result<String, FetchError> {
        let resp = client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl SourceProvider for FeedProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>, FetchError> {
        match &self.mode {
            Mode::Fixture(s) => parse_feed(s),
            Mode::Http { url, client } => {
                let body = Self::fetch_body(url, client).await?;
                parse_feed(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Parse an RSS 2.0 or Atom document into raw items, in document order.
pub fn parse_feed(xml: &str) -> Result<Vec<RawItem>, FetchError> {
    let t0 = std::time::Instant::now();
    let xml_clean = scrub_html_entities_for_xml(xml);

    let out = if looks_like_atom(&xml_clean) {
        parse_atom(&xml_clean)?
    } else {
        parse_rss(&xml_clean)?
    };

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("ingest_parse_ms").record(ms);
    counter!("ingest_raw_items_total").increment(out.len() as u64);
    Ok(out)
}

fn parse_rss(xml: &str) -> Result<Vec<RawItem>, FetchError> {
    let rss: Rss = from_str(xml).map_err(|e| FetchError::Parse(format!("rss: {e}")))?;
    Ok(rss
        .channel
        .item
        .into_iter()
        .map(|it| RawItem {
            link: it.text_link().unwrap_or_default(),
            title: it.title.unwrap_or_default(),
            published: it.pub_date,
            summary: it.description.as_deref().map(snippet),
        })
        .collect())
}

fn parse_atom(xml: &str) -> Result<Vec<RawItem>, FetchError> {
    let feed: AtomFeed = from_str(xml).map_err(|e| FetchError::Parse(format!("atom: {e}")))?;
    Ok(feed
        .entry
        .into_iter()
        .map(|e| {
            let link = e.alternate_link().unwrap_or_default();
            let summary = e.summary.as_ref().or(e.content.as_ref()).map(|t| snippet(&t.value));
            RawItem {
                title: e.title.map(|t| t.value).unwrap_or_default(),
                link,
                published: e.published.or(e.updated),
                summary,
            }
        })
        .collect())
}

/// Cheap root sniffing: Atom documents have a `<feed` root and no `<rss` element.
fn looks_like_atom(xml: &str) -> bool {
    !xml.contains("<rss") && xml.contains("<feed")
}

// HTML named entities are not valid XML; feeds leak them anyway.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}
