use std::time::Duration;
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};
use trellis::config::Settings;
use trellis::handler::{handler, with_request};
use trellis::{Application, Params, Request, Server};

fn server() -> Server {
    let mut settings = Settings::default();
    settings.max_body_bytes = 64;
    let mut app = Application::with_settings(settings);
    app.get("/", handler(|_: &Params| "Welcome to /")).unwrap();
    app.get("/users/{id}", handler(|p: &Params| format!("user {}", &p[0])))
        .unwrap();
    app.post("/login", with_request(|req: &Request, _: &Params| {
        format!("{} : {}", req.input_or("username", ""), req.input_or("pass", ""))
    }))
    .unwrap();
    app.build()
}

async fn exchange(raw: &str) -> String {
    let (mut client, server_side) = duplex(64 * 1024);
    let server = server();
    let task = tokio::spawn(async move { server.handle_connection(server_side).await });

    client.write_all(raw.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut response))
        .await
        .expect("response timed out")
        .unwrap();
    task.await.unwrap().unwrap();
    String::from_utf8(response).unwrap()
}

fn status_of(response: &str) -> u16 {
    response
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
        .unwrap_or(0)
}

fn body_of(response: &str) -> &str {
    response.split_once("\r\n\r\n").map(|(_, body)| body).unwrap_or("")
}

#[tokio::test]
async fn serves_a_get() {
    let response = exchange("GET /users/9?x=1 HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
    assert_eq!(status_of(&response), 200);
    assert!(response.contains("Content-Length: 6\r\n"));
    assert_eq!(body_of(&response), "user 9");
}

#[tokio::test]
async fn reads_form_bodies() {
    let body = "username=ada&pass=secret";
    let raw = format!(
        "POST /login HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    let response = exchange(&raw).await;
    assert_eq!(status_of(&response), 200);
    assert_eq!(body_of(&response), "ada : secret");
}

#[tokio::test]
async fn unknown_routes_and_methods_are_404() {
    let response = exchange("GET /missing HTTP/1.1\r\n\r\n").await;
    assert_eq!(status_of(&response), 404);
    assert!(body_of(&response).contains("404"));

    let response = exchange("OPTIONS / HTTP/1.1\r\n\r\n").await;
    assert_eq!(status_of(&response), 404);
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let raw = "POST /login HTTP/1.1\r\nContent-Length: 4096\r\n\r\n";
    let response = exchange(raw).await;
    assert_eq!(status_of(&response), 413);
}

#[tokio::test]
async fn malformed_content_length_is_a_bad_request() {
    let raw = "POST /login HTTP/1.1\r\nContent-Length: ten\r\n\r\nusername=ada";
    let response = exchange(raw).await;
    assert_eq!(status_of(&response), 400);
    assert!(!body_of(&response).contains("ada"));
}

#[tokio::test]
async fn exactly_one_response_per_connection() {
    let response = exchange("GET / HTTP/1.1\r\n\r\n").await;
    assert_eq!(response.matches("HTTP/1.1 ").count(), 1);
    assert!(response.contains("Connection: close\r\n"));
}
