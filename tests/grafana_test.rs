//! Grafana注解通知测试
//!
//! 使用mockito模拟Grafana和GCP令牌接口

use grafana_notifier::error::NotificationError;
use grafana_notifier::logging::MemoryLogger;
use grafana_notifier::notification::{
    Destination, GrafanaAnnotation, GrafanaService, Notification, NotificationService,
};
use grafana_notifier::GrafanaOptions;
use mockito::Matcher;
use serde_json::json;
use std::sync::Arc;

const TEST_PRIVATE_KEY: &str = include_str!("fixtures/test_rsa_key.pem");

/// 创建测试用的服务和日志
fn create_service(options: GrafanaOptions) -> (GrafanaService, Arc<MemoryLogger>) {
    let logger = Arc::new(MemoryLogger::new());
    let service = GrafanaService::with_logger(options, logger.clone());
    (service, logger)
}

/// 创建指向指定令牌接口的服务账号密钥
fn service_account_key(token_uri: &str) -> String {
    json!({
        "type": "service_account",
        "project_id": "test-project",
        "private_key_id": "kid-123",
        "private_key": TEST_PRIVATE_KEY,
        "client_email": "notifier@test-project.iam.gserviceaccount.com",
        "token_uri": token_uri,
    })
    .to_string()
}

fn destination(recipient: &str) -> Destination {
    Destination::new("grafana", recipient)
}

#[tokio::test]
async fn test_send_success() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/annotations")
        .match_header("content-type", "application/json")
        .match_header("authorization", "Bearer glsa_test")
        .match_header("proxy-authorization", Matcher::Missing)
        .match_body(Matcher::PartialJson(json!({
            "isRegion": false,
            "tags": ["a", "b", "c"],
            "text": "deployed v1.2.3",
        })))
        .with_status(200)
        .with_body(r#"{"id":1,"message":"Annotation added"}"#)
        .expect(1)
        .create_async()
        .await;

    let (service, logger) = create_service(GrafanaOptions::new(server.url(), "glsa_test"));

    let result = service
        .send(&Notification::new("deployed v1.2.3"), &destination("a|b|c"))
        .await;

    assert!(result.is_ok(), "unexpected error: {result:?}");
    mock.assert_async().await;
    assert_eq!(logger.count(log::Level::Warn), 0);
    assert_eq!(logger.count(log::Level::Error), 0);
}

#[tokio::test]
async fn test_send_preserves_path_prefix() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/grafana/api/annotations")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let (service, _logger) =
        create_service(GrafanaOptions::new(format!("{}/grafana/api/", server.url()), "k"));

    service
        .send(&Notification::new("hello"), &destination("x"))
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_send_empty_message_warns_once_and_delivers() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/annotations")
        .match_body(Matcher::PartialJson(json!({"text": "", "tags": [""]})))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let (service, logger) = create_service(GrafanaOptions::new(server.url(), "k"));

    let result = service
        .send(&Notification::new(""), &destination(""))
        .await;

    assert!(result.is_ok());
    mock.assert_async().await;
    assert_eq!(logger.count(log::Level::Warn), 1);
}

#[tokio::test]
async fn test_send_server_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/annotations")
        .with_status(500)
        .with_body("server error")
        .create_async()
        .await;

    let (service, _logger) = create_service(GrafanaOptions::new(server.url(), "k"));

    let err = service
        .send(&Notification::new("hello"), &destination("a"))
        .await
        .unwrap_err();

    match &err {
        NotificationError::Delivery { url, status, body } => {
            assert_eq!(url, &format!("{}/annotations", server.url()));
            assert_eq!(*status, 500);
            assert_eq!(body, "server error");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let message = err.to_string();
    assert!(message.contains(&server.url()));
    assert!(message.contains("500"));
    assert!(message.contains("server error"));
}

#[tokio::test]
async fn test_send_non_ok_success_status_is_failure() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/annotations")
        .with_status(204)
        .create_async()
        .await;

    let (service, _logger) = create_service(GrafanaOptions::new(server.url(), "k"));

    let result = service
        .send(&Notification::new("hello"), &destination("a"))
        .await;

    assert!(matches!(
        result,
        Err(NotificationError::Delivery { status: 204, .. })
    ));
}

#[tokio::test]
async fn test_send_time_is_current() {
    let mut server = mockito::Server::new_async().await;
    // 返回请求体，便于从错误中取回发送的注解
    let _mock = server
        .mock("POST", "/annotations")
        .with_status(418)
        .with_body_from_request(|request| request.body().cloned().unwrap_or_default())
        .create_async()
        .await;

    let (service, _logger) = create_service(GrafanaOptions::new(server.url(), "k"));

    let before = chrono::Utc::now().timestamp() * 1000;
    let err = service
        .send(&Notification::new("tick"), &destination("a|b"))
        .await
        .unwrap_err();
    let after = chrono::Utc::now().timestamp() * 1000;

    let NotificationError::Delivery { body, .. } = err else {
        panic!("unexpected error: {err:?}");
    };
    let annotation: GrafanaAnnotation = serde_json::from_str(&body).unwrap();

    assert!(annotation.time >= before - 5_000 && annotation.time <= after + 5_000);
    assert_eq!(annotation.time % 1000, 0);
    assert_eq!(annotation.tags, vec!["a", "b"]);
    assert_eq!(annotation.text, "tick");
}

#[tokio::test]
async fn test_send_malformed_api_url() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let (service, _logger) = create_service(GrafanaOptions::new("not a url", "k"));

    let result = service
        .send(&Notification::new("hello"), &destination("a"))
        .await;

    assert!(matches!(result, Err(NotificationError::Configuration(_))));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_send_transport_error_is_unwrapped() {
    let (service, _logger) = create_service(GrafanaOptions::new("http://127.0.0.1:1", "k"));

    let result = service
        .send(&Notification::new("hello"), &destination("a"))
        .await;

    match result {
        Err(NotificationError::Transport(e)) => assert!(e.is_connect() || e.is_request()),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_send_truncated_response_body() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // 声明100字节的响应体，实际只写入5字节后关闭连接
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            if request.ends_with(b"}") {
                break;
            }
        }
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\nContent-Type: text/plain\r\n\r\nshort",
            )
            .await
            .unwrap();
        socket.flush().await.unwrap();
        socket.shutdown().await.unwrap();
    });

    let (service, _logger) = create_service(GrafanaOptions::new(format!("http://{addr}"), "k"));

    let err = service
        .send(&Notification::new("hello"), &destination("a"))
        .await
        .unwrap_err();

    assert!(matches!(err, NotificationError::ResponseRead(_)), "unexpected error: {err:?}");
    assert!(err.to_string().contains("unable to read response data"));
    server.await.unwrap();
}

#[tokio::test]
async fn test_send_invalid_service_account_key() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let mut options = GrafanaOptions::new(server.url(), "k");
    options.gcp_sa_key = "{not json".to_string();
    let (service, logger) = create_service(options);

    let result = service
        .send(&Notification::new("hello"), &destination("a"))
        .await;

    assert!(matches!(result, Err(NotificationError::AuthSetup(_))));
    assert_eq!(logger.count(log::Level::Error), 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_send_with_service_account_identity() {
    let mut server = mockito::Server::new_async().await;
    let token_mock = server
        .mock("POST", "/token")
        .match_body(Matcher::Regex("assertion=".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id_token":"iap-id-token"}"#)
        .expect(1)
        .create_async()
        .await;
    let annotation_mock = server
        .mock("POST", "/annotations")
        .match_header("authorization", "Bearer glsa_test")
        .match_header("proxy-authorization", "Bearer iap-id-token")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let mut options = GrafanaOptions::new(server.url(), "glsa_test");
    options.gcp_sa_key = service_account_key(&format!("{}/token", server.url()));
    let (service, _logger) = create_service(options);

    let result = service
        .send(&Notification::new("hello"), &destination("iap"))
        .await;

    assert!(result.is_ok(), "unexpected error: {result:?}");
    token_mock.assert_async().await;
    annotation_mock.assert_async().await;
}

#[tokio::test]
async fn test_send_identity_token_exchange_failure() {
    let mut server = mockito::Server::new_async().await;
    let _token_mock = server
        .mock("POST", "/token")
        .with_status(401)
        .with_body(r#"{"error":"unauthorized_client"}"#)
        .create_async()
        .await;
    let annotation_mock = server
        .mock("POST", "/annotations")
        .expect(0)
        .create_async()
        .await;

    let mut options = GrafanaOptions::new(server.url(), "k");
    options.gcp_sa_key = service_account_key(&format!("{}/token", server.url()));
    let (service, _logger) = create_service(options);

    let result = service
        .send(&Notification::new("hello"), &destination("a"))
        .await;

    assert!(matches!(result, Err(NotificationError::IdentityToken(_))));
    annotation_mock.assert_async().await;
}

#[tokio::test]
async fn test_concurrent_sends_share_service() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/annotations")
        .with_status(200)
        .expect(8)
        .create_async()
        .await;

    let (service, _logger) = create_service(GrafanaOptions::new(server.url(), "k"));
    let service = Arc::new(service);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .send(
                        &Notification::new(format!("event {i}")),
                        &destination(&format!("worker|{i}")),
                    )
                    .await
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }
    mock.assert_async().await;
}
