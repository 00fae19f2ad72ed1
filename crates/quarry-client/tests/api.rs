use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use quarry_client::{ApiDownloader, Error};
use quarry_parse::ParserRegistry;
use quarry_types::RepositoryConfig;

fn downloader(yaml: &str) -> ApiDownloader {
    let config: RepositoryConfig = serde_yaml::from_str(yaml).unwrap();
    ApiDownloader::new(config, Arc::new(ParserRegistry::new()))
}

fn npm_style(base: &str, extra_limits: &str) -> ApiDownloader {
    downloader(&format!(
        r#"
name: npm-api
type: npm
platform: universal
query_type: api
endpoints:
  packages: "{base}/all"
  info: "{base}/info/{{package}}"
parsing:
  format: json
limits:
{extra_limits}
"#
    ))
}

#[tokio::test]
async fn retries_server_errors_with_exponential_backoff() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/info/left-pad"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/info/left-pad"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"[{"name": "left-pad", "version": "1.3.0"}]"#,
            "application/json",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let downloader = npm_style(
        &server.uri(),
        "  max_retries: 3\n  retry_delay_seconds: 1\n  exponential_backoff: true",
    );

    let start = Instant::now();
    let package = downloader.query_package("left-pad", true).await;
    let elapsed = start.elapsed();

    let package = package.expect("query should succeed after retries");
    assert_eq!(package.version, "1.3.0");
    // Two failures cost 1s + 2s of backoff before the third attempt.
    assert!(elapsed >= Duration::from_secs(3), "elapsed {elapsed:?}");
    Ok(())
}

#[tokio::test]
async fn responses_are_served_from_the_in_memory_cache() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/info/express"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"[{"name": "express", "version": "4.19.2"}]"#,
            "application/json",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let downloader = npm_style(&server.uri(), "  max_retries: 0");

    let first = downloader.query_package("express", true).await;
    let second = downloader.query_package("express", true).await;
    assert_eq!(first.unwrap().version, "4.19.2");
    assert_eq!(second.unwrap().version, "4.19.2");
    // The mock's expect(1) verifies the second query never hit the network.
    Ok(())
}

#[tokio::test]
async fn cache_bypass_hits_the_network_every_time() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/info/express"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"[{"name": "express", "version": "4.19.2"}]"#,
            "application/json",
        ))
        .expect(2)
        .mount(&server)
        .await;

    let downloader = npm_style(&server.uri(), "  max_retries: 0");

    downloader.query_package("express", false).await;
    downloader.query_package("express", false).await;
    Ok(())
}

#[tokio::test]
async fn missing_packages_resolve_to_none() -> Result<()> {
    let server = MockServer::start().await;
    // No mock for the package: wiremock answers 404.
    let downloader = npm_style(&server.uri(), "  max_retries: 0");

    assert!(downloader.query_package("not-a-package", true).await.is_none());
    Ok(())
}

#[tokio::test]
async fn persistent_429_surfaces_as_rate_limited() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/all"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let downloader = npm_style(
        &server.uri(),
        "  max_retries: 1\n  retry_delay_seconds: 0",
    );

    let result = downloader.download_package_list().await;
    assert!(matches!(result, Err(Error::RateLimited { retries: 1, .. })));
    Ok(())
}

#[tokio::test]
async fn batch_queries_preserve_every_requested_name() -> Result<()> {
    let server = MockServer::start().await;
    for (name, version) in [("react", "18.3.1"), ("vue", "3.4.27")] {
        Mock::given(method("GET"))
            .and(path(format!("/info/{name}")))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                format!(r#"[{{"name": "{name}", "version": "{version}"}}]"#),
                "application/json",
            ))
            .mount(&server)
            .await;
    }

    let downloader = npm_style(&server.uri(), "  max_retries: 0\n  concurrent_requests: 2");

    let names = vec![
        "react".to_string(),
        "missing".to_string(),
        "vue".to_string(),
    ];
    let results = downloader.query_batch(&names, true).await;

    assert_eq!(results.len(), 3);
    let keys: Vec<&String> = results.keys().collect();
    assert_eq!(keys, vec!["react", "missing", "vue"]);
    assert_eq!(results["react"].as_ref().unwrap().version, "18.3.1");
    assert!(results["missing"].is_none());
    assert_eq!(results["vue"].as_ref().unwrap().version, "3.4.27");
    Ok(())
}

#[tokio::test]
async fn first_package_is_returned_when_no_exact_name_matches() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/info/reqwest"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"[{"name": "reqwest-middleware", "version": "0.4.0"}]"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let downloader = npm_style(&server.uri(), "  max_retries: 0");

    let package = downloader.query_package("reqwest", true).await;
    assert_eq!(package.unwrap().name, "reqwest-middleware");
    Ok(())
}

#[tokio::test]
async fn bulk_download_on_an_api_repository_uses_a_single_cached_fetch() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/all"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"[{"name": "a", "version": "1"}, {"name": "b", "version": "2"}]"#,
            "application/json",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let downloader = npm_style(&server.uri(), "  max_retries: 0");

    assert_eq!(downloader.download_package_list().await?.len(), 2);
    // Second call is served from the response cache.
    assert_eq!(downloader.download_package_list().await?.len(), 2);
    Ok(())
}
