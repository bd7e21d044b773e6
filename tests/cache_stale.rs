// tests/cache_stale.rs
//
// Stale-while-revalidate over the real HTTP fetcher.
//
// Covered:
// - a timeout after a successful exchange serves the stored body
// - error statuses are passed through and never stored
// - unseen requests propagate the failure
// - a disabled cache is a pass-through

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use snap_blog_feed::fetch::{CachingFetcher, Fetch, FetchError, FetchRequest, HttpFetcher, ResponseCache};

fn caching(bound_ms: u64) -> (CachingFetcher<HttpFetcher>, Arc<ResponseCache>) {
    let http = HttpFetcher::new("snap-blog-feed-tests", Duration::from_millis(bound_ms))
        .expect("build http client");
    let cache = Arc::new(ResponseCache::new());
    (CachingFetcher::new(http, Arc::clone(&cache)), cache)
}

#[tokio::test]
async fn timeout_after_success_serves_stale_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"id":12}]"#))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tags"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("[]")
                .set_delay(Duration::from_millis(1500)),
        )
        .mount(&server)
        .await;

    let (fetcher, cache) = caching(150);
    let req = FetchRequest::builder(format!("{}/tags", server.uri()))
        .query("slug", "sc:snap:vlc")
        .build();
    let cancel = CancellationToken::new();

    let fresh = fetcher.fetch(&req, &cancel).await.expect("first fetch");
    assert_eq!(fresh.body, r#"[{"id":12}]"#);
    assert_eq!(cache.len(), 1);

    let stale = fetcher.fetch(&req, &cancel).await.expect("stale copy");
    assert_eq!(stale, fresh, "timeout should be answered from cache");
}

#[tokio::test]
async fn error_status_passes_through_without_replacing_entry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[1]"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&server)
        .await;

    let (fetcher, cache) = caching(2000);
    let req = FetchRequest::get(format!("{}/posts", server.uri()));
    let cancel = CancellationToken::new();

    fetcher.fetch(&req, &cancel).await.expect("first fetch");
    let second = fetcher.fetch(&req, &cancel).await.expect("503 is a response");
    assert_eq!(second.status, 503);

    let entry = cache.get(&req.key()).expect("entry kept");
    assert_eq!(entry.response.body, "[1]");
}

#[tokio::test]
async fn unseen_request_propagates_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/5"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(1500)))
        .mount(&server)
        .await;

    let (fetcher, cache) = caching(150);
    let req = FetchRequest::get(format!("{}/media/5", server.uri()));
    let err = fetcher
        .fetch(&req, &CancellationToken::new())
        .await
        .expect_err("nothing cached");
    assert!(matches!(err, FetchError::Timeout { .. }), "got {err:?}");
    assert!(cache.is_empty());
}

#[tokio::test]
async fn stale_copy_is_per_request_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tags"))
        .and(query_param("slug", "a"))
        .respond_with(ResponseTemplate::new(200).set_body_string("a"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tags"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(1500)))
        .mount(&server)
        .await;

    let (fetcher, _cache) = caching(150);
    let cancel = CancellationToken::new();
    let a = FetchRequest::builder(format!("{}/tags", server.uri()))
        .query("slug", "a")
        .build();
    let b = FetchRequest::builder(format!("{}/tags", server.uri()))
        .query("slug", "b")
        .build();

    fetcher.fetch(&a, &cancel).await.expect("a fresh");
    assert!(fetcher.fetch(&b, &cancel).await.is_err(), "b was never stored");
    assert_eq!(fetcher.fetch(&a, &cancel).await.expect("a stale").body, "a");
}

#[tokio::test]
async fn disabled_cache_is_pass_through() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tags"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(1500)))
        .mount(&server)
        .await;

    let (fetcher, cache) = caching(150);
    let fetcher = fetcher.enabled(false);
    let req = FetchRequest::get(format!("{}/tags", server.uri()));
    let cancel = CancellationToken::new();

    fetcher.fetch(&req, &cancel).await.expect("first fetch");
    assert!(cache.is_empty());
    let err = fetcher.fetch(&req, &cancel).await.expect_err("no stale copy");
    assert!(matches!(err, FetchError::Timeout { .. }));
}
