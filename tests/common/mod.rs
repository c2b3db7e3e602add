#![allow(dead_code)]

use std::path::Path;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// A canned HTTP response.
pub struct Reply {
    pub status: &'static str,
    pub body: String,
    /// Advertised `Content-Length` when it should not match the body.
    pub declared_len: Option<usize>,
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: "200 OK",
            body: body.into(),
            declared_len: None,
        }
    }

    pub fn status(status: &'static str, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            declared_len: None,
        }
    }

    /// A reply whose connection closes before the advertised body length is sent.
    pub fn cut_short(status: &'static str, body: impl Into<String>) -> Self {
        let body = body.into();
        let declared_len = Some(body.len() + 64);
        Self {
            status,
            body,
            declared_len,
        }
    }
}

/// Serve `connections` requests on a loopback port, answering each with `respond(request)`.
///
/// Returns the endpoint URL and a handle resolving to the raw requests seen.
pub async fn serve<F>(connections: usize, respond: F) -> (String, JoinHandle<Vec<String>>)
where
    F: Fn(&str) -> Reply + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let mut requests = Vec::new();
        for _ in 0..connections {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let reply = respond(&request);
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                reply.status,
                reply.declared_len.unwrap_or(reply.body.len()),
                reply.body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            requests.push(request);
        }
        requests
    });

    (format!("http://{addr}/api/keywords"), handle)
}

/// Read one HTTP request (head and body) from the socket.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(head_end) = find(&buf, b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).to_lowercase();
        if let Some(len) = content_length(&head) {
            if buf.len() >= head_end + 4 + len {
                break;
            }
        } else if head.contains("transfer-encoding: chunked") {
            if buf.ends_with(b"0\r\n\r\n") {
                break;
            }
        } else {
            break;
        }
    }

    String::from_utf8_lossy(&buf).into_owned()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn content_length(head: &str) -> Option<usize> {
    head.lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse().ok())
}

/// An endpoint on which nothing is listening.
pub async fn closed_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/api/keywords")
}

/// Write a small real JPEG.
pub fn write_jpeg(path: &Path) {
    image::RgbImage::from_pixel(12, 12, image::Rgb([240, 140, 60]))
        .save(path)
        .unwrap();
}

pub const SUNSET: &str =
    r#"{"data": {"title": "Sunset", "description": "", "keywords": ["sky", "orange"]}}"#;
