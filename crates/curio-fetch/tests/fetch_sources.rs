//! Integration tests for the HTTP sources against a mock server.
//!
//! These verify the wire format of each source: endpoints, query
//! parameters, auth headers, and the fetch-then-tidy round trip.

use curio_core::{ContentSource, EditIndexFetcher, Error, RawFetcher};
use curio_fetch::{BlogSource, EssaySource, SpotifySource, YoutubeSource};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn youtube_items() -> serde_json::Value {
    serde_json::json!({
        "kind": "youtube#videoListResponse",
        "items": [{
            "kind": "youtube#video",
            "id": "C-gEQdGVXbk",
            "snippet": {
                "publishedAt": "2019-01-08T17:00:07Z",
                "channelId": "UCCezIgC97PvUuR4_gbFUs5g",
                "title": "10 Python Tips and Tricks For Writing Better Code",
                "description": "This video is sponsored by Skillshare.",
                "channelTitle": "Corey Schafer",
                "tags": ["Python"]
            },
            "contentDetails": { "duration": "PT39M21S" },
            "statistics": { "viewCount": "1529622", "likeCount": "48771" }
        }]
    })
}

#[tokio::test]
async fn youtube_sends_key_and_parts_and_tidies() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/videos"))
        .and(query_param("id", "C-gEQdGVXbk"))
        .and(query_param("part", "snippet,contentDetails,statistics"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(youtube_items()))
        .expect(1)
        .mount(&server)
        .await;

    let source = YoutubeSource::with_api_url("test-key", format!("{}/videos", server.uri()));
    let ids = vec!["C-gEQdGVXbk".to_string()];

    let raw = source.fetch_batch(&ids).await.expect("fetch failed");
    let drafts = source.tidy(&ids, &raw).expect("tidy failed");

    let draft = drafts[0].as_ref().expect("draft missing");
    assert_eq!(
        draft.title.as_deref(),
        Some("10 Python Tips and Tricks For Writing Better Code")
    );
    assert_eq!(draft.duration_secs, Some(2361));
}

#[tokio::test]
async fn youtube_maps_error_status_to_fetch_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/videos"))
        .respond_with(ResponseTemplate::new(403).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let source = YoutubeSource::with_api_url("test-key", format!("{}/videos", server.uri()));
    let result = source.fetch_batch(&["C-gEQdGVXbk".to_string()]).await;

    match result {
        Err(Error::Fetch(msg)) => assert!(msg.contains("403")),
        other => panic!("Expected fetch error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn spotify_exchanges_credentials_once_per_token_lifetime() {
    let server = MockServer::start().await;

    // token endpoint: Basic auth with base64("client-id:client-secret")
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(header(
            "authorization",
            "Basic Y2xpZW50LWlkOmNsaWVudC1zZWNyZXQ=",
        ))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "test-token",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/episodes"))
        .and(header("authorization", "Bearer test-token"))
        .and(query_param("ids", "6MAszRR6tdDnMsjgVdw4Jh"))
        .and(query_param("market", "US"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "episodes": [{
                "id": "6MAszRR6tdDnMsjgVdw4Jh",
                "name": "Robin Hanson on Signaling and Self-Deception (Live at Mason Econ)",
                "description": "If intros aren't about introductions...",
                "html_description": "<p>If intros aren't about introductions...</p>",
                "release_date": "2018-03-28",
                "duration_ms": 3977155,
                "show": {
                    "id": "0Z1S42nK7vE9nkqfqfeZdD",
                    "name": "Conversations with Tyler",
                    "publisher": "Mercatus Center at George Mason University"
                }
            }]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let source = SpotifySource::with_urls(
        "client-id",
        "client-secret",
        format!("{}/v1/episodes", server.uri()),
        format!("{}/api/token", server.uri()),
    );
    let ids = vec!["6MAszRR6tdDnMsjgVdw4Jh".to_string()];

    // Two batches, one token exchange: the second call reuses the cache.
    let raw = source.fetch_batch(&ids).await.expect("first fetch failed");
    source.fetch_batch(&ids).await.expect("second fetch failed");

    let drafts = source.tidy(&ids, &raw).expect("tidy failed");
    assert_eq!(
        drafts[0].as_ref().and_then(|d| d.show_title.as_deref()),
        Some("Conversations with Tyler")
    );
}

#[tokio::test]
async fn spotify_token_failure_is_fetch_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid client"))
        .mount(&server)
        .await;

    let source = SpotifySource::with_urls(
        "bad-id",
        "bad-secret",
        format!("{}/v1/episodes", server.uri()),
        format!("{}/api/token", server.uri()),
    );

    let result = source.fetch_batch(&["x".to_string()]).await;
    match result {
        Err(Error::Fetch(msg)) => assert!(msg.contains("401")),
        other => panic!("Expected fetch error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn blog_fetches_posts_and_edit_index() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/posts"))
        .and(query_param("names", "2009/03/signaling-in-economics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "2009/03/signaling-in-economics": {
                "name": "2009/03/signaling-in-economics",
                "number": 16642,
                "title": "Signaling in Economics",
                "author": "Robin Hanson",
                "publish_date": "2009-03-21T22:00:00Z",
                "edit_date": "2009-03-22T08:15:00Z",
                "tags": ["signaling"],
                "categories": ["economics"],
                "text_html": "<p>Arnold Kling cites this definition.</p>",
                "plaintext": "Arnold Kling cites this definition.",
                "word_count": 6,
                "internal_links": [],
                "external_links": [],
                "disqus_id": "16642 https://www.overcomingbias.com/?p=16642",
                "votes": 12,
                "comments": 31
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/edit-dates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "2009/03/signaling-in-economics": "2009-03-22T08:15:00Z",
            "2021/04/shoulda-listened-futures": "2021-04-26T12:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source = BlogSource::with_base_url(server.uri());
    let ids = vec!["2009/03/signaling-in-economics".to_string()];

    let raw = source.fetch_batch(&ids).await.expect("fetch failed");
    let drafts = source.tidy(&ids, &raw).expect("tidy failed");
    assert_eq!(
        drafts[0].as_ref().and_then(|d| d.post_number),
        Some(16642)
    );

    let index = source.fetch_index().await.expect("index fetch failed");
    assert_eq!(index.len(), 2);
    assert!(index.contains_key("2021/04/shoulda-listened-futures"));
}

#[tokio::test]
async fn essays_fetch_per_page_with_user_agent_and_null_for_missing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/matrix.html"))
        .and(header("user-agent", "Mozilla/5.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><head><title>Was Cypher Right?</title></head><body><p>Essay text.</p></body></html>",
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/gone.html"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let source = EssaySource::with_base_url(server.uri());
    let ids = vec!["matrix".to_string(), "gone".to_string()];

    let raw = source.fetch_batch(&ids).await.expect("fetch failed");
    let drafts = source.tidy(&ids, &raw).expect("tidy failed");

    assert_eq!(
        drafts[0].as_ref().and_then(|d| d.title.as_deref()),
        Some("Was Cypher Right?")
    );
    assert!(drafts[1].is_none());
}

#[tokio::test]
async fn essays_server_error_fails_the_batch() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/broken.html"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let source = EssaySource::with_base_url(server.uri());
    let result = source.fetch_batch(&["broken".to_string()]).await;
    assert!(matches!(result, Err(Error::Fetch(_))));
}
