use crate::common::{MirrorSite, RELEASES_PATH};
use release_mirror::core::{MirrorError, Version};
use release_mirror::sync::{ReleaseApiOracle, VersionOracle};
use release_mirror::test_utils::Route;
use reqwest::Client;
use serde_json::json;

fn oracle(site: &MirrorSite) -> ReleaseApiOracle {
    ReleaseApiOracle::new(Client::new(), &site.config().upstream)
}

#[tokio::test]
async fn test_latest_version_from_release_document() {
    let site = MirrorSite::start().await;
    site.server.route(
        RELEASES_PATH,
        Route::json(&json!({
            "experimental": {"alpha": "2.0.73", "headless": "2.0.73"},
            "stable": {"alpha": "2.0.72", "headless": " 2.0.72\n"}
        })),
    );

    let oracle = oracle(&site);
    assert_eq!(oracle.latest_version().await.unwrap(), Version::from("2.0.72"));
    assert_eq!(oracle.source(), site.server.url(RELEASES_PATH));
}

#[tokio::test]
async fn test_other_channel() {
    let site = MirrorSite::start().await;
    site.server.route(RELEASES_PATH, Route::json(&json!({"experimental": {"headless": "2.0.73"}})));

    let mut upstream = site.config().upstream;
    upstream.channel = "experimental".to_string();
    let oracle = ReleaseApiOracle::new(Client::new(), &upstream);
    assert_eq!(oracle.latest_version().await.unwrap().as_str(), "2.0.73");
}

#[tokio::test]
async fn test_bad_responses_are_upstream_unavailable() {
    let cases = [
        Route::status(503, "maintenance"),
        Route::ok("<html>not json</html>"),
        Route::json(&json!({"stable": {"alpha": "2.0.72"}})),
        Route::json(&json!({"stable": {"headless": ""}})),
        Route::json(&json!({"stable": {"headless": 2}})),
    ];

    for route in cases {
        let site = MirrorSite::start().await;
        site.server.route(RELEASES_PATH, route);

        let err = oracle(&site).latest_version().await.unwrap_err();
        assert!(
            matches!(err, MirrorError::UpstreamUnavailable { .. }),
            "expected UpstreamUnavailable, got {err:?}"
        );
    }
}
