//! Integration tests for the value-bet pipeline.
//!
//! These tests require live services and are ignored by default:
//! - a reachable redis at REDIS_URL for the dedup-store tests
//! - a valid API_TOKEN for the feed test
//!
//! Run with: cargo test --test integration -- --ignored

use valuecast::store::DedupStore;

/// Redis URL from the environment, if one is configured.
fn redis_url() -> Option<String> {
    dotenvy::dotenv().ok();
    std::env::var("REDIS_URL").ok()
}

#[tokio::test]
#[ignore = "requires REDIS_URL"]
async fn dedup_record_then_exists() {
    let url = match redis_url() {
        Some(url) => url,
        None => {
            println!("Skipping: REDIS_URL not set");
            return;
        }
    };

    let store = DedupStore::connect(&url, 2).await.expect("connect");

    let key = format!("it:dedup:{}", std::process::id());
    let keys = vec![key.clone()];

    assert!(!store.exists_any(&keys).await.expect("exists before"));

    store
        .record_batch(&[(key.clone(), 30)])
        .await
        .expect("record");

    assert!(store.exists_any(&keys).await.expect("exists after"));
    assert_eq!(store.exists_which(&keys).await.expect("which"), Some(0));
}

#[tokio::test]
#[ignore = "requires REDIS_URL"]
async fn dedup_opposite_key_matches_independently() {
    let url = match redis_url() {
        Some(url) => url,
        None => {
            println!("Skipping: REDIS_URL not set");
            return;
        }
    };

    let store = DedupStore::connect(&url, 2).await.expect("connect");

    let sent = format!("it:opp:over:{}", std::process::id());
    let opposite = format!("it:opp:under:{}", std::process::id());

    store
        .record_batch(&[(sent.clone(), 30), (opposite.clone(), 30)])
        .await
        .expect("record");

    // A rebound pick on the opposite market hits at the opposite index.
    let probe = vec![format!("it:opp:absent:{}", std::process::id()), opposite];
    assert_eq!(store.exists_which(&probe).await.expect("which"), Some(1));
}

#[tokio::test]
#[ignore = "requires REDIS_URL"]
async fn cursor_round_trips_across_connections() {
    let url = match redis_url() {
        Some(url) => url,
        None => {
            println!("Skipping: REDIS_URL not set");
            return;
        }
    };

    let cursor = format!("created_at:{}", std::process::id());

    {
        let store = DedupStore::connect(&url, 2).await.expect("connect");
        store.save_cursor(&cursor).await.expect("save");
    }

    // A fresh connection simulates the restart path.
    let store = DedupStore::connect(&url, 2).await.expect("reconnect");
    let loaded = store.load_cursor().await.expect("load");
    assert_eq!(loaded.as_deref(), Some(cursor.as_str()));
}

#[tokio::test]
#[ignore = "requires API_TOKEN"]
async fn feed_fetch_returns_records() {
    use valuecast::config::Config;
    use valuecast::feed::FeedClient;

    dotenvy::dotenv().ok();
    if std::env::var("API_TOKEN").map(|t| t.is_empty()).unwrap_or(true) {
        println!("Skipping: API_TOKEN not set");
        return;
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            println!("Skipping: config incomplete ({e})");
            return;
        }
    };

    let client = FeedClient::new(&config);
    let response = client.fetch(None).await.expect("fetch");
    println!("Fetched {} records", response.records.len());
}
