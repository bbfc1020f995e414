use adhd_helper::domain::models::{AuthTokens, NewTodoItem};
use adhd_helper::infrastructure::api_client::{AiApi, AuthApi, ReqwestApiClient, TodoApi};
use adhd_helper::infrastructure::credential_store::{CredentialStore, InMemoryCredentialStore};
use adhd_helper::infrastructure::error::InfraError;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const USER_JSON: &str = r#"{"id":"user-1","email":"min@example.com","name":"Min","timezone":"Asia/Seoul","is_active":true,"created_at":"2026-02-16T09:00:00"}"#;

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    target: String,
    authorization: Option<String>,
    body: String,
}

type Handler = dyn Fn(&Recorded) -> (u16, String) + Send + Sync;

struct TestServer {
    base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl TestServer {
    async fn start<F>(handler: F) -> Self
    where
        F: Fn(&Recorded) -> (u16, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("address");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);

        let recorded = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let recorded = Arc::clone(&recorded);
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    serve_one(stream, recorded, handler).await;
                });
            }
        });

        Self {
            base_url: format!("http://{address}"),
            requests,
        }
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().expect("requests mutex poisoned").clone()
    }
}

async fn serve_one(mut stream: TcpStream, recorded: Arc<Mutex<Vec<Recorded>>>, handler: Arc<Handler>) {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 4096];
    let header_end = loop {
        let read = match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(read) => read,
        };
        buffer.extend_from_slice(&chunk[..read]);
        if let Some(position) = find_header_end(&buffer) {
            break position;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default().to_string();

    let mut content_length = 0_usize;
    let mut authorization = None;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "content-length" => content_length = value.trim().parse().unwrap_or(0),
            "authorization" => authorization = Some(value.trim().to_string()),
            _ => {}
        }
    }

    let body_start = header_end + 4;
    while buffer.len() < body_start + content_length {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(read) => buffer.extend_from_slice(&chunk[..read]),
        }
    }
    let body_end = (body_start + content_length).min(buffer.len());
    let body = String::from_utf8_lossy(&buffer[body_start..body_end]).to_string();

    let request = Recorded {
        method,
        target,
        authorization,
        body,
    };
    let (status, payload) = handler(&request);
    recorded.lock().expect("requests mutex poisoned").push(request);

    let response = format!(
        "HTTP/1.1 {status} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{payload}",
        reason(status),
        payload.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|window| window == b"\r\n\r\n")
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        401 => "Unauthorized",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        _ => "Status",
    }
}

fn tokens(access: &str) -> AuthTokens {
    AuthTokens {
        access_token: access.to_string(),
        refresh_token: Some(format!("{access}-refresh")),
        token_type: "bearer".to_string(),
    }
}

fn client(base_url: &str, store: Arc<InMemoryCredentialStore>) -> ReqwestApiClient {
    ReqwestApiClient::new(base_url, store).expect("client")
}

#[tokio::test]
async fn bearer_token_is_attached_under_v1() {
    let server = TestServer::start(|_| (200, USER_JSON.to_string())).await;
    let store = Arc::new(InMemoryCredentialStore::with_tokens(tokens("access-1")));

    let user = client(&server.base_url, store).current_user().await.expect("me");

    assert_eq!(user.id, "user-1");
    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].target, "/v1/auth/me");
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer access-1"));
}

#[tokio::test]
async fn unauthorized_request_refreshes_once_and_replays() {
    let server = TestServer::start(|request| {
        match (request.target.as_str(), request.authorization.as_deref()) {
            ("/v1/auth/refresh", _) => (200, r#"{"access_token":"new","token_type":"bearer"}"#.to_string()),
            ("/v1/auth/me", Some("Bearer new")) => (200, USER_JSON.to_string()),
            _ => (401, r#"{"detail":"Token expired"}"#.to_string()),
        }
    })
    .await;
    let store = Arc::new(InMemoryCredentialStore::with_tokens(tokens("old")));

    let user = client(&server.base_url, Arc::clone(&store))
        .current_user()
        .await
        .expect("replayed");

    assert_eq!(user.email, "min@example.com");
    let targets = server
        .requests()
        .into_iter()
        .map(|request| request.target)
        .collect::<Vec<_>>();
    assert_eq!(targets, vec!["/v1/auth/me", "/v1/auth/refresh", "/v1/auth/me"]);

    let refresh = &server.requests()[1];
    assert_eq!(refresh.authorization, None);
    assert!(refresh.body.contains(r#""refresh_token":"old-refresh""#));

    let stored = store.load_tokens().expect("load").expect("tokens");
    assert_eq!(stored.access_token, "new");
    assert_eq!(stored.refresh_token.as_deref(), Some("old-refresh"));
}

#[tokio::test]
async fn refused_refresh_returns_the_original_rejection() {
    let server = TestServer::start(|request| match request.target.as_str() {
        "/v1/auth/refresh" => (401, r#"{"detail":"Invalid refresh token"}"#.to_string()),
        _ => (401, r#"{"detail":"Token expired"}"#.to_string()),
    })
    .await;
    let store = Arc::new(InMemoryCredentialStore::with_tokens(tokens("old")));

    let error = client(&server.base_url, store)
        .current_user()
        .await
        .expect_err("rejected");

    match error {
        InfraError::Unauthorized(detail) => assert_eq!(detail, "Token expired"),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn signed_out_client_sends_nothing() {
    let server = TestServer::start(|_| (200, "[]".to_string())).await;
    let store = Arc::new(InMemoryCredentialStore::default());

    let error = client(&server.base_url, store)
        .list_todos(None)
        .await
        .expect_err("no token");

    assert!(matches!(error, InfraError::Unauthorized(_)));
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn validation_details_are_joined() {
    let server = TestServer::start(|_| {
        (
            422,
            r#"{"detail":[{"loc":["body","title"],"msg":"field required"},{"loc":["body","priority"],"msg":"ensure this value is less than or equal to 5"}]}"#
                .to_string(),
        )
    })
    .await;
    let store = Arc::new(InMemoryCredentialStore::with_tokens(tokens("access")));
    let todo = NewTodoItem {
        title: "x".to_string(),
        description: None,
        priority: Some(3),
        due_date: None,
    };

    let error = client(&server.base_url, store)
        .create_todo(&todo)
        .await
        .expect_err("422");

    match error {
        InfraError::Http { status, detail } => {
            assert_eq!(status, 422);
            assert_eq!(
                detail,
                "field required; ensure this value is less than or equal to 5"
            );
        }
        other => panic!("unexpected error {other:?}"),
    }
    let request = &server.requests()[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.target, "/v1/todos");
    assert!(request.body.contains(r#""title":"x""#));
}

#[tokio::test]
async fn base_path_prefix_and_query_are_kept() {
    let server = TestServer::start(|request| {
        if request.target.starts_with("/api/v1/ai/test-api-key") {
            (200, r#"{"valid":false,"messasge":"Invalid API key"}"#.to_string())
        } else {
            (200, "[]".to_string())
        }
    })
    .await;
    let store = Arc::new(InMemoryCredentialStore::with_tokens(tokens("access")));
    let api = client(&format!("{}/api/", server.base_url), store);

    let todos = api.list_todos(Some(false)).await.expect("todos");
    assert!(todos.is_empty());

    let result = api.test_api_key(" sk-bad ").await.expect("test key");
    assert!(!result.valid);
    assert_eq!(result.message.as_deref(), Some("Invalid API key"));

    let targets = server
        .requests()
        .into_iter()
        .map(|request| request.target)
        .collect::<Vec<_>>();
    assert_eq!(
        targets,
        vec![
            "/api/v1/todos?completed=false".to_string(),
            "/api/v1/ai/test-api-key?api_key=sk-bad".to_string()
        ]
    );
}

#[tokio::test]
async fn plain_text_error_bodies_are_kept() {
    let server = TestServer::start(|_| (500, "upstream exploded".to_string())).await;
    let store = Arc::new(InMemoryCredentialStore::with_tokens(tokens("access")));

    let error = client(&server.base_url, store)
        .todo_stats()
        .await
        .expect_err("500");

    assert!(error.is_retryable());
    assert_eq!(error.user_message(), "upstream exploded");
}
