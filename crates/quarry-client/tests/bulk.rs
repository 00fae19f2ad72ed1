use std::sync::Arc;

use anyhow::Result;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use quarry_client::{BulkDownloader, Downloader, Error};
use quarry_parse::ParserRegistry;
use quarry_types::RepositoryConfig;

fn downloader(yaml: &str) -> BulkDownloader {
    let config: RepositoryConfig = serde_yaml::from_str(yaml).unwrap();
    BulkDownloader::new(config, Arc::new(ParserRegistry::new()))
}

const PACKAGES: &str = "\
Package: nginx
Version: 1.24.0-1
Description: HTTP server
Installed-Size: 512

Package: curl
Version: 7.88.1-1
Depends: libcurl (= 7.88.1-1), libc6
";

#[tokio::test]
async fn downloads_and_parses_a_debian_index() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dists/jammy/main/binary-amd64/Packages"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PACKAGES, "text/plain"))
        .expect(1)
        .mount(&server)
        .await;

    let downloader = downloader(&format!(
        r#"
name: apt-test
type: apt
platform: linux
distribution: [jammy]
architecture: [amd64]
endpoints:
  packages: "{}/dists/{{release}}/main/binary-{{arch}}/Packages"
parsing:
  format: debian_packages
"#,
        server.uri()
    ));

    let packages = downloader.download_package_list().await?;
    assert_eq!(packages.len(), 2);

    let nginx = &packages[0];
    assert_eq!(nginx.name, "nginx");
    assert_eq!(nginx.version, "1.24.0-1");
    assert_eq!(nginx.size, Some(524_288));
    assert_eq!(nginx.repository_name, "apt-test");
    assert!(nginx.last_updated.is_some());

    let curl = &packages[1];
    assert_eq!(curl.name, "curl");
    assert_eq!(
        curl.dependencies,
        Some(vec!["libcurl".to_string(), "libc6".to_string()])
    );
    Ok(())
}

#[tokio::test]
async fn gzip_configured_plain_payload_still_parses() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Packages.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PACKAGES, "application/octet-stream"))
        .mount(&server)
        .await;

    let downloader = downloader(&format!(
        r#"
name: apt-plain
type: apt
platform: linux
endpoints:
  packages: "{}/Packages.gz"
parsing:
  format: debian_packages
  compression: gzip
"#,
        server.uri()
    ));

    let packages = downloader.download_package_list().await?;
    assert_eq!(packages.len(), 2);
    Ok(())
}

#[tokio::test]
async fn oversized_responses_are_rejected_before_parsing() -> Result<()> {
    let server = MockServer::start().await;
    let body = vec![b'a'; 2 * 1024 * 1024];
    Mock::given(method("GET"))
        .and(path("/Packages"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/plain"))
        .mount(&server)
        .await;

    let downloader = downloader(&format!(
        r#"
name: apt-big
type: apt
platform: linux
endpoints:
  packages: "{}/Packages"
parsing:
  format: debian_packages
limits:
  max_response_size_mb: 1
"#,
        server.uri()
    ));

    let result = downloader.download_package_list().await;
    assert!(matches!(result, Err(Error::TooLarge { .. })));
    Ok(())
}

#[tokio::test]
async fn non_http_schemes_never_reach_the_network() {
    let downloader = downloader(
        r#"
name: apt-ftp
type: apt
platform: linux
endpoints:
  packages: "ftp://mirror.example.com/Packages"
parsing:
  format: debian_packages
"#,
    );

    let result = downloader.download_package_list().await;
    assert!(matches!(result, Err(Error::UrlScheme { .. })));
}

#[tokio::test]
async fn search_endpoint_results_are_filtered_to_the_query() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/nginx"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"[
                {"name": "nginx", "version": "1.24.0"},
                {"name": "apache2", "version": "2.4.58", "description": "unrelated"}
            ]"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let downloader = downloader(&format!(
        r#"
name: json-repo
type: npm
platform: universal
endpoints:
  packages: "{base}/all"
  search: "{base}/search/{{query}}"
parsing:
  format: json
"#,
        base = server.uri()
    ));

    let matches = downloader.search_package("nginx").await?;
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].name, "nginx");
    Ok(())
}

#[tokio::test]
async fn search_falls_back_to_the_full_index() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/all"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"[
                {"name": "ripgrep", "version": "14.1", "description": "fast grep"},
                {"name": "fd", "version": "9.0", "description": "find files, grep-adjacent"}
            ]"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let downloader = downloader(&format!(
        r#"
name: json-repo
type: npm
platform: universal
endpoints:
  packages: "{}/all"
parsing:
  format: json
"#,
        server.uri()
    ));

    // "grep" matches ripgrep by name and fd by description.
    let matches = downloader.search_package("grep").await?;
    assert_eq!(matches.len(), 2);
    Ok(())
}

#[tokio::test]
async fn details_prefer_the_info_endpoint() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/info/express"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"[{"name": "express", "version": "4.19.2", "homepage": "https://expressjs.com"}]"#,
            "application/json",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let downloader = downloader(&format!(
        r#"
name: npm-bulk
type: npm
platform: universal
endpoints:
  packages: "{base}/all"
  info: "{base}/info/{{package}}"
parsing:
  format: json
"#,
        base = server.uri()
    ));

    let details = downloader.get_package_details("express", None).await?;
    let package = details.expect("package should be found");
    assert_eq!(package.version, "4.19.2");
    assert_eq!(package.homepage.as_deref(), Some("https://expressjs.com"));
    Ok(())
}

#[tokio::test]
async fn availability_uses_a_head_probe() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/Packages"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let available = downloader(&format!(
        r#"
name: apt-up
type: apt
platform: linux
endpoints:
  packages: "{}/Packages"
parsing:
  format: debian_packages
"#,
        server.uri()
    ));
    assert!(available.is_available().await);

    let missing = downloader(&format!(
        r#"
name: apt-down
type: apt
platform: linux
endpoints:
  packages: "{}/elsewhere/Packages"
parsing:
  format: debian_packages
"#,
        server.uri()
    ));
    assert!(!missing.is_available().await);
    Ok(())
}

#[tokio::test]
async fn configured_bearer_token_is_sent() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Packages"))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PACKAGES, "text/plain"))
        .expect(1)
        .mount(&server)
        .await;

    let downloader = downloader(&format!(
        r#"
name: apt-auth
type: apt
platform: linux
endpoints:
  packages: "{}/Packages"
parsing:
  format: debian_packages
auth:
  type: bearer
  token: secret-token
"#,
        server.uri()
    ));

    let packages = downloader.download_package_list().await?;
    assert_eq!(packages.len(), 2);
    Ok(())
}

#[tokio::test]
async fn downloader_enum_dispatches_by_query_type() {
    let bulk_config: RepositoryConfig = serde_yaml::from_str(
        r#"
name: bulk-repo
type: apt
platform: linux
endpoints:
  packages: "https://example.com/Packages"
parsing:
  format: debian_packages
"#,
    )
    .unwrap();
    let api_config: RepositoryConfig = serde_yaml::from_str(
        r#"
name: api-repo
type: npm
platform: universal
query_type: api
endpoints:
  packages: "https://example.com/all"
  info: "https://example.com/{package}"
parsing:
  format: json
"#,
    )
    .unwrap();

    let parsers = Arc::new(ParserRegistry::new());
    let bulk = Downloader::from_config(bulk_config, Arc::clone(&parsers));
    let api = Downloader::from_config(api_config, parsers);

    assert!(!bulk.is_api());
    assert!(api.is_api());
    assert!(api.as_api().is_some());
    assert_eq!(bulk.info().name, "bulk-repo");
    assert_eq!(bulk.cache_key().len(), 16);
    assert_ne!(bulk.cache_key(), api.cache_key());
}
