//! Auth client against a stub backend.
use std::time::Duration;
use supplier_score::auth::{ApiClient, Role, SessionStore};
use supplier_score::error::ApiError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const USER: &str = r#"{"id":1,"email":"admin@local","username":"admin","fullName":"Admin","role":"admin","joinedAt":"2024-01-15T09:00:00"}"#;

/// Answer each request by its request line; unknown routes get 401 with no body.
async fn stub_backend() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let n = stream.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                let authed = request
                    .lines()
                    .any(|l| l.eq_ignore_ascii_case("authorization: Bearer tok"));
                let (status, body) = if request.starts_with("POST /auth/login") {
                    ("200 OK", format!(r#"{{"access_token":"tok","token_type":"bearer","user":{USER}}}"#))
                } else if request.starts_with("GET /users") && authed {
                    ("200 OK", format!("[{USER}]"))
                } else if request.starts_with("DELETE /users/7") && authed {
                    ("404 Not Found", r#"{"detail":"Utilisateur introuvable."}"#.to_string())
                } else {
                    ("401 Unauthorized", String::new())
                };
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn login_then_admin_listing() {
    let api = ApiClient::new(&stub_backend().await, Duration::from_secs(5)).unwrap();
    let resp = api.login("admin", "secret").await.unwrap();
    assert_eq!(resp.user.role, Role::Admin);

    let mut session = SessionStore::new();
    session.login(resp);
    let token = session.require_admin().unwrap();
    let users = api.list_users(token).await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].full_name.as_deref(), Some("Admin"));
}

#[tokio::test]
async fn rejections_carry_body_or_status() {
    let api = ApiClient::new(&stub_backend().await, Duration::from_secs(5)).unwrap();

    let err = api.me("expired").await.unwrap_err();
    assert!(matches!(err, ApiError::Status { status: 401, .. }));
    assert_eq!(err.to_string(), "HTTP 401");
    assert!(err.is_auth_rejection());

    let err = api.delete_user("tok", 7).await.unwrap_err();
    assert_eq!(err.to_string(), r#"{"detail":"Utilisateur introuvable."}"#);
    assert!(!err.is_auth_rejection());
}

#[tokio::test]
async fn unreachable_backend_is_not_an_auth_rejection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = ApiClient::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap();
    let err = api.me("tok").await.unwrap_err();
    assert!(matches!(err, ApiError::Network(_)));
    assert!(!err.is_auth_rejection());
}
