//! Integration tests for lra using mockito

use std::time::Duration;

use lra::{Connection, Error, HeaderList, JsonObject, Method, TransportError};
use mockito::Matcher;
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq)]
struct TestResponse {
    success: bool,
    data: String,
}

fn connection_for(server: &mockito::ServerGuard) -> Connection {
    let address = server.socket_address();
    let mut headers = HeaderList::new();
    headers.insert("test-header".to_string(), "test".to_string());

    Connection::new(
        false,
        &address.ip().to_string(),
        address.port(),
        "/base",
        "",
        "",
        true,
        "",
        false,
        headers,
        Duration::from_secs(5),
    )
    .expect("Valid connection")
}

// === Success path ===

#[tokio::test]
async fn test_get_json_success() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", Matcher::Regex(r"^/base/api/data".to_string()))
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("stringdata".into(), "hello".into()),
            Matcher::UrlEncoded("intdata".into(), "42".into()),
        ]))
        .match_header("test-header", "test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success": true, "data": "hello"}"#)
        .create_async()
        .await;

    let connection = connection_for(&server);
    let response: TestResponse = connection
        .get_json("/api/data?stringdata=hello&intdata=42")
        .await
        .expect("GET JSON should succeed");

    assert!(response.success);
    assert_eq!(response.data, "hello");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_post_raw_sends_json_body() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/base/api/submit")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(serde_json::json!({
            "stringdata": "hello",
            "intdata": 42,
            "booldata": true
        })))
        .with_status(201)
        .with_body(r#"{"success": true, "data": "received"}"#)
        .create_async()
        .await;

    let connection = connection_for(&server);
    let body = connection
        .post(
            "/api/submit",
            Some(br#"{"stringdata":"hello","intdata":42,"booldata":true}"#.as_slice()),
        )
        .await
        .expect("POST should succeed");

    assert_eq!(body, br#"{"success": true, "data": "received"}"#);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_basic_auth_is_sent() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/secure")
        .match_header("authorization", "Basic YWxpY2U6czNjcmV0")
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let address = server.socket_address();
    let connection = Connection::builder()
        .host(address.ip().to_string())
        .port(address.port())
        .credentials("alice", "s3cret")
        .build()
        .expect("Valid connection");

    assert_eq!(
        connection.base_url(),
        format!("http://alice:s3cret@{}", address)
    );
    let value: JsonObject = connection
        .get_json("/secure")
        .await
        .expect("GET should succeed");
    assert!(value.is_empty());

    mock.assert_async().await;
}

#[tokio::test]
async fn test_credentials_replace_default_authorization() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/secure")
        .match_request(|request| {
            request
                .header("authorization")
                .into_iter()
                .map(|value| value.as_bytes())
                .eq([b"Basic YWxpY2U6cHc=".as_slice()])
        })
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let address = server.socket_address();
    let connection = Connection::builder()
        .host(address.ip().to_string())
        .port(address.port())
        .credentials("alice", "pw")
        .header("Authorization", "Bearer tok")
        .build()
        .expect("Valid connection");

    connection.get("/secure").await.expect("GET should succeed");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_per_call_headers_are_merged() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/base/merged")
        .match_header("test-header", "test")
        .match_header("x-request-id", "42")
        .with_status(200)
        .with_body("ok")
        .create_async()
        .await;

    let connection = connection_for(&server);
    let mut extra = HeaderList::new();
    extra.insert("x-request-id".to_string(), "42".to_string());

    let body = connection
        .call_with_headers(Method::GET, "/merged", &extra, None)
        .await
        .expect("GET should succeed");
    assert_eq!(body, b"ok");

    mock.assert_async().await;
}

// === Status errors ===

#[tokio::test]
async fn test_not_found_for_every_json_verb() {
    let mut server = mockito::Server::new_async().await;

    let mut mocks = Vec::new();
    for method in [
        "GET", "HEAD", "OPTIONS", "TRACE", "POST", "PUT", "PATCH", "DELETE", "CONNECT",
    ] {
        mocks.push(
            server
                .mock(method, "/base/missing")
                .with_status(404)
                .with_body(r#"{"error": "not here"}"#)
                .create_async()
                .await,
        );
    }

    let connection = connection_for(&server);
    let body = Some(br#"{"stringdata":"hello"}"#.as_slice());

    let results: Vec<lra::Response<JsonObject>> = vec![
        connection.get_json("/missing").await,
        connection.head_json("/missing").await,
        connection.options_json("/missing").await,
        connection.trace_json("/missing").await,
        connection.post_json("/missing", body).await,
        connection.put_json("/missing", body).await,
        connection.patch_json("/missing", body).await,
        connection.delete_json("/missing", None).await,
        connection.connect_json("/missing", None).await,
    ];

    for result in results {
        let err = result.expect_err("404 should be an error");
        assert_eq!(err.to_string(), "404 Not Found");
        assert!(matches!(err, Error::Status { status: 404, .. }));
    }

    for mock in mocks {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn test_server_error_keeps_body_on_error() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/base/broken")
        .with_status(500)
        .with_body("Internal Server Error")
        .create_async()
        .await;

    let connection = connection_for(&server);
    let err = connection
        .get("/broken")
        .await
        .expect_err("500 should be an error");

    assert_eq!(err.to_string(), "500 Internal Server Error");
    assert_eq!(err.status(), Some(500));
    assert_eq!(err.status_body(), Some(b"Internal Server Error".as_slice()));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_client_error_boundary() {
    let mut server = mockito::Server::new_async().await;

    let ok = server
        .mock("GET", "/base/edge-399")
        .with_status(399)
        .with_body("edge")
        .create_async()
        .await;
    let bad = server
        .mock("GET", "/base/edge-400")
        .with_status(400)
        .with_body("bad")
        .create_async()
        .await;

    let connection = connection_for(&server);
    let body = connection
        .get("/edge-399")
        .await
        .expect("399 is not an error");
    assert_eq!(body, b"edge");

    let err = connection
        .get("/edge-400")
        .await
        .expect_err("400 is an error");
    assert_eq!(err.to_string(), "400 Bad Request");

    ok.assert_async().await;
    bad.assert_async().await;
}

// === Decode errors ===

#[tokio::test]
async fn test_malformed_json_is_decode_error() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/base/garbled")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{{")
        .create_async()
        .await;

    let connection = connection_for(&server);
    let result: lra::Response<JsonObject> = connection.get_json("/garbled").await;

    let err = result.expect_err("Malformed JSON should fail");
    assert!(matches!(err, Error::Decode(_)));
    assert!(err.status().is_none());
    assert!(
        err.to_string().contains("column"),
        "Decoder diagnostic should point at the offending character: {}",
        err
    );

    mock.assert_async().await;
}

#[tokio::test]
async fn test_raw_path_does_not_decode() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/base/garbled")
        .with_status(200)
        .with_body("{{")
        .create_async()
        .await;

    let connection = connection_for(&server);
    let body = connection
        .get("/garbled")
        .await
        .expect("Raw path returns bytes as-is");
    assert_eq!(body, b"{{");

    mock.assert_async().await;
}

// === Proxy and transport ===

#[tokio::test]
async fn test_http_proxy_forwards_request() {
    let mut proxy = mockito::Server::new_async().await;

    let mock = proxy
        .mock("GET", "/base/proxied")
        .with_status(200)
        .with_body(r#"{"success": true, "data": "via proxy"}"#)
        .create_async()
        .await;

    let connection = Connection::builder()
        .host("origin.invalid")
        .port(80)
        .base_path("/base")
        .proxy(proxy.host_with_port())
        .proxy_is_socks(false)
        .build()
        .expect("Valid connection");

    let response: TestResponse = connection
        .get_json("/proxied")
        .await
        .expect("Request should go through the proxy");
    assert_eq!(response.data, "via proxy");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Bind ephemeral port");
        listener.local_addr().expect("Local address").port()
    };

    let connection = Connection::builder()
        .host("127.0.0.1")
        .port(port)
        .timeout(Duration::from_secs(2))
        .build()
        .expect("Valid connection");

    let err = connection
        .get("/anything")
        .await
        .expect_err("Nothing listens on the port");
    assert!(matches!(err, Error::Transport(TransportError::Connect(_))));
    assert!(std::error::Error::source(&err).is_some());
}
