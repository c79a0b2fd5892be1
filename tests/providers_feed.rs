// tests/providers_feed.rs
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::{header, HeaderMap, StatusCode};
use axum::{routing::get, Router};

use gaza_deal_tracker::ingest::providers::http_client;
use gaza_deal_tracker::ingest::providers::rss::{parse_feed, FeedProvider};
use gaza_deal_tracker::ingest::types::{FetchError, RawItem, SourceProvider};
use gaza_deal_tracker::relevance::{RelevanceEngine, SEED_RELEVANCE_TOML};

#[tokio::test]
async fn rss_fixture_parses_in_document_order() {
    let xml = std::fs::read_to_string("tests/fixtures/gaza_rss.xml").expect("fixture");
    let p = FeedProvider::from_fixture("reuters", &xml);
    let items = p.fetch_latest().await.expect("parse");

    assert_eq!(items.len(), 5);
    assert_eq!(
        items[0].link,
        "https://www.reuters.com/world/middle-east/hamas-responds-2025-10-06/"
    );
    assert_eq!(
        items[0].summary.as_deref(),
        Some("Mediators in Qatar and Egypt received the reply.")
    );
    assert_eq!(items[4].link, "https://news.example.com/gaza-deal");
    assert_eq!(p.name(), "reuters");
}

#[tokio::test]
async fn atom_fixture_prefers_alternate_link_and_published() {
    let xml = std::fs::read_to_string("tests/fixtures/axios_atom.xml").expect("fixture");
    let items = parse_feed(&xml).expect("parse");

    assert_eq!(items.len(), 2);
    assert_eq!(
        items[0].link,
        "https://www.axios.com/2025/10/06/trump-gaza-deal-close"
    );
    assert_eq!(items[0].published.as_deref(), Some("2025-10-06T14:00:00Z"));
    // no <published>: falls back to <updated>
    assert_eq!(items[1].published.as_deref(), Some("2025-10-06T08:00:00Z"));
    assert_eq!(items[1].link, "https://www.axios.com/2025/10/06/tech-earnings");
}

#[test]
fn html_named_entities_do_not_break_xml() {
    let xml = r#"<rss version="2.0"><channel>
      <item><title>Talks&nbsp;resume &mdash; Cairo</title><link>https://apnews.com/a</link></item>
    </channel></rss>"#;
    let items = parse_feed(xml).expect("scrubbed entities parse");
    assert_eq!(items[0].title, "Talks resume - Cairo");
}

#[test]
fn empty_channel_is_ok_and_not_an_error() {
    let items = parse_feed(r#"<rss version="2.0"><channel><title>x</title></channel></rss>"#)
        .expect("empty feed");
    assert!(items.is_empty());
}

#[test]
fn atom_links_split_by_other_elements_still_parse() {
    let xml = std::fs::read_to_string("tests/fixtures/split_atom.xml").expect("fixture");
    let items = parse_feed(&xml).expect("split <link> siblings");
    assert_eq!(items.len(), 2);
    assert_eq!(
        items[0].link,
        "https://www.haaretz.com/israel-news/2025-10-06/ty-article/hostages"
    );
    assert_eq!(
        items[1].link,
        "https://www.haaretz.com/middle-east-news/2025-10-06/ty-article/rafah"
    );
}

#[test]
fn rss_item_with_atom_link_and_split_items_keeps_every_item() {
    let xml = std::fs::read_to_string("tests/fixtures/rss_atom_link.xml").expect("fixture");
    let items = parse_feed(&xml).expect("atom:link inside item");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].link, "https://www.timesofisrael.com/cabinet-debates/");
    assert_eq!(items[1].link, "https://www.timesofisrael.com/hamas-rejects-clause/");
}

#[test]
fn long_description_is_matched_in_full() {
    let xml = format!(
        r#"<rss version="2.0"><channel><item>
          <title>Weekly wrap</title>
          <link>https://apnews.com/article/wrap</link>
          <description>{} hostage deal reached</description>
        </item></channel></rss>"#,
        "lorem ".repeat(300)
    );
    let items = parse_feed(&xml).expect("parse");
    let summary = items[0].summary.as_deref().unwrap();
    assert!(summary.chars().count() > 1_500);
    assert!(summary.ends_with("hostage deal reached"));

    let engine = RelevanceEngine::from_toml_str(SEED_RELEVANCE_TOML).unwrap();
    assert!(engine.accepts(&items[0]));
}

/// Local feed server: `/feed.xml` serves the RSS fixture and records the
/// `User-Agent` it saw; `/down` always answers 503.
async fn serve_feeds() -> (SocketAddr, Arc<Mutex<Vec<String>>>) {
    let xml = std::fs::read_to_string("tests/fixtures/gaza_rss.xml").expect("fixture");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_h = Arc::clone(&seen);

    let app = Router::new()
        .route(
            "/feed.xml",
            get(move |headers: HeaderMap| {
                let seen = Arc::clone(&seen_h);
                let xml = xml.clone();
                async move {
                    if let Some(ua) = headers.get(header::USER_AGENT).and_then(|v| v.to_str().ok()) {
                        seen.lock().unwrap().push(ua.to_string());
                    }
                    ([(header::CONTENT_TYPE, "application/rss+xml")], xml)
                }
            }),
        )
        .route("/down", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, seen)
}

#[tokio::test]
async fn http_mode_sends_user_agent_and_parses_body() {
    let (addr, seen) = serve_feeds().await;
    let client = http_client("gaza-deal-tracker-test/1.0", Duration::from_secs(5)).unwrap();
    let url = format!("http://{addr}/feed.xml");
    let p = FeedProvider::from_url(url.clone(), client);

    let items: Vec<RawItem> = p.fetch_latest().await.expect("fetch over http");
    assert_eq!(items.len(), 5);
    assert_eq!(p.name(), url);
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        ["gaza-deal-tracker-test/1.0".to_string()]
    );
}

#[tokio::test]
async fn http_mode_maps_error_status() {
    let (addr, _) = serve_feeds().await;
    let client = http_client("gaza-deal-tracker-test/1.0", Duration::from_secs(5)).unwrap();
    let p = FeedProvider::from_url(format!("http://{addr}/down"), client);

    let err = p.fetch_latest().await.unwrap_err();
    assert!(matches!(err, FetchError::Status(503)), "{err:?}");
}
