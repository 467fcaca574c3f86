//! Integration tests for the crawl pipeline
//!
//! These tests use wiremock as both the target site and the forwarding
//! proxy: the client sends proxied requests in absolute form, and the mock
//! server matches them by path. Identity rotation is exercised against a
//! fake control endpoint on a local TCP port.

use onion_snapshot::config::{ClientConfig, Config, ControlConfig, CookieEntry, OutputConfig};
use onion_snapshot::job::{crawl, ExtractionRule, FetchError, HttpFetcher, JobError, Method, Target};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration routing through the given proxy
fn create_test_config(proxy_url: &str, output_root: &str) -> Config {
    Config {
        client: ClientConfig {
            proxy_url: proxy_url.to_string(),
            user_agent: "TestAgent/1.0".to_string(),
            referer: "http://referer.test/".to_string(),
            cookies: vec![],
            probe_url: "http://probe.test/ip".to_string(),
            timeout_secs: 5,
        },
        control: None,
        output: OutputConfig {
            root: output_root.to_string(),
        },
    }
}

fn get_target(url: &str, title: &str) -> Target {
    Target {
        url: url.to_string(),
        method: Method::Get,
        form_data: vec![],
        title: title.to_string(),
    }
}

/// Mounts a probe responder so the apparent-address check succeeds
async fn mount_probe(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/ip"))
        .respond_with(ResponseTemplate::new(200).set_body_string("203.0.113.7\n"))
        .mount(server)
        .await;
}

/// Spawns a fake control endpoint answering every command with `reply`
async fn spawn_control_endpoint(reply: &'static str) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let mut line = String::new();

        while reader.read_line(&mut line).await.unwrap_or(0) > 0 {
            if line.starts_with("QUIT") {
                break;
            }
            write_half.write_all(reply.as_bytes()).await.unwrap();
            line.clear();
        }
    });

    port
}

#[tokio::test]
async fn test_get_returns_body_byte_for_byte() {
    let mock_server = MockServer::start().await;
    mount_probe(&mock_server).await;

    // Non-UTF8 bytes verify the body is passed through untouched.
    let body = vec![0x25, 0x50, 0x44, 0x46, 0xff, 0x00, 0x7f];
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), "unused");
    let fetcher = HttpFetcher::new(&config.client).expect("Failed to build fetcher");

    let result = fetcher
        .fetch(&get_target("http://site.test/data", "Bytes"))
        .await
        .expect("Fetch failed");

    assert_eq!(result.body, body);
    assert!(!result.is_html);
}

#[tokio::test]
async fn test_post_sends_form_and_cookies() {
    let mock_server = MockServer::start().await;
    mount_probe(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/results"))
        .and(header("cookie", "adnum=a0; session=tok"))
        .and(body_string("csr_prot=abc&searchstr=test"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html></html>")
                .insert_header("content-type", "text/html"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&mock_server.uri(), "unused");
    config.client.cookies = vec![
        CookieEntry {
            name: "adnum".to_string(),
            value: "a0".to_string(),
        },
        CookieEntry {
            name: "session".to_string(),
            value: "tok".to_string(),
        },
    ];

    let fetcher = HttpFetcher::new(&config.client).expect("Failed to build fetcher");
    let target = Target {
        url: "http://site.test/results".to_string(),
        method: Method::Post,
        form_data: vec![
            ("csr_prot".to_string(), "abc".to_string()),
            ("searchstr".to_string(), "test".to_string()),
        ],
        title: "Form".to_string(),
    };

    let result = fetcher.fetch(&target).await.expect("Fetch failed");
    assert!(result.is_html);
}

#[tokio::test]
async fn test_http_error_status_surfaces() {
    let mock_server = MockServer::start().await;
    mount_probe(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), "unused");
    let fetcher = HttpFetcher::new(&config.client).expect("Failed to build fetcher");

    let result = fetcher
        .fetch(&get_target("http://site.test/broken", "Broken"))
        .await;

    assert!(matches!(result, Err(FetchError::HttpStatus(500))));
}

#[tokio::test]
async fn test_probe_failure_is_nonfatal() {
    let mock_server = MockServer::start().await;
    // No probe mock mounted: the probe gets a 404 and must be swallowed.

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), "unused");
    let fetcher = HttpFetcher::new(&config.client).expect("Failed to build fetcher");

    let result = fetcher
        .fetch(&get_target("http://site.test/page", "Probe"))
        .await
        .expect("Fetch failed");

    assert_eq!(result.body, b"ok");
}

#[tokio::test]
async fn test_end_to_end_record_extraction() {
    let mock_server = MockServer::start().await;
    mount_probe(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/results"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(
                    r#"<html><body>
                    <div class="media-body"><a href="/a">Item1</a></div>
                    <div class="media-body"><a href="/b">Item2</a></div>
                    </body></html>"#,
                )
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    let tmp = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), tmp.path().to_str().unwrap());

    let rule = ExtractionRule {
        label_selector: "div.media-body a".to_string(),
        link_selector: "div.media-body a".to_string(),
    };

    let outcome = crawl(
        config,
        get_target("http://site.test/results", "Test"),
        Some(rule),
    )
    .await;

    let files = match outcome {
        onion_snapshot::job::JobOutcome::Success { files } => files,
        other => panic!("Expected success, got {:?}", other),
    };
    assert_eq!(files.len(), 2);

    // Layout: {root}/Test/crawlTest{DDMMYYYY_HHMMSS} plus the _href sibling.
    let name = files[0].file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("crawlTest"));
    assert_eq!(name.len(), "crawlTest".len() + "DDMMYYYY_HHMMSS".len());
    assert_eq!(files[0].parent().unwrap(), tmp.path().join("Test"));
    assert_eq!(
        files[1].file_name().unwrap().to_str().unwrap(),
        format!("{}_href", name)
    );

    let labels = std::fs::read_to_string(&files[0]).unwrap();
    assert_eq!(labels, "\"Result\",\"Item1\"\r\n\"Result\",\"Item2\"\r\n");

    let links = std::fs::read_to_string(&files[1]).unwrap();
    assert_eq!(links, "\"Result\",\"/a\"\r\n\"Result\",\"/b\"\r\n");
}

#[tokio::test]
async fn test_raw_mode_persists_response_body() {
    let mock_server = MockServer::start().await;
    mount_probe(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>raw snapshot</html>"))
        .mount(&mock_server)
        .await;

    let tmp = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), tmp.path().to_str().unwrap());

    let outcome = crawl(config, get_target("http://site.test/page", "Raw"), None).await;

    let files = match outcome {
        onion_snapshot::job::JobOutcome::Success { files } => files,
        other => panic!("Expected success, got {:?}", other),
    };
    assert_eq!(files.len(), 1);
    assert_eq!(
        std::fs::read_to_string(&files[0]).unwrap(),
        "<html>raw snapshot</html>"
    );
}

#[tokio::test]
async fn test_fetch_failure_creates_no_output() {
    // Bind a listener to find a free port, then drop it so the proxy is
    // unreachable.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let tmp = TempDir::new().unwrap();
    let config = create_test_config(
        &format!("http://127.0.0.1:{}", port),
        tmp.path().to_str().unwrap(),
    );

    let outcome = crawl(config, get_target("http://site.test/page", "Test"), None).await;

    match outcome {
        onion_snapshot::job::JobOutcome::Failure(JobError::Fetch(_)) => {}
        other => panic!("Expected fetch failure, got {:?}", other),
    }

    // Persist never ran, so no run directory was created.
    assert!(!tmp.path().join("Test").exists());
}

#[tokio::test]
async fn test_rotation_failure_aborts_before_fetch() {
    let mock_server = MockServer::start().await;

    // The fetch stage must never run when rotation fails.
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let control_port = spawn_control_endpoint("515 Bad authentication\r\n").await;

    let tmp = TempDir::new().unwrap();
    let mut config = create_test_config(&mock_server.uri(), tmp.path().to_str().unwrap());
    config.control = Some(ControlConfig {
        host: "127.0.0.1".to_string(),
        port: control_port,
        passphrase: "wrong".to_string(),
        timeout_secs: 2,
    });

    let outcome = crawl(config, get_target("http://site.test/page", "Test"), None).await;

    match outcome {
        onion_snapshot::job::JobOutcome::Failure(JobError::Rotate(_)) => {}
        other => panic!("Expected rotation failure, got {:?}", other),
    }
    assert!(!tmp.path().join("Test").exists());
}

#[tokio::test]
async fn test_rotation_success_then_fetch() {
    let mock_server = MockServer::start().await;
    mount_probe(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("after rotation"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let control_port = spawn_control_endpoint("250 OK\r\n").await;

    let tmp = TempDir::new().unwrap();
    let mut config = create_test_config(&mock_server.uri(), tmp.path().to_str().unwrap());
    config.control = Some(ControlConfig {
        host: "127.0.0.1".to_string(),
        port: control_port,
        passphrase: String::new(),
        timeout_secs: 2,
    });

    let outcome = crawl(config, get_target("http://site.test/page", "Rotated"), None).await;
    assert!(outcome.is_success());
}
