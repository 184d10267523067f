//! Mock profile feed server for testing
//!
//! Serves a single JSON document on any GET path, the way the real feed
//! serves `friendface.json`. Status code, body and latency are configurable
//! so fetch failures can be exercised without network access.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crate::domain::{TransferFriend, TransferUser};

/// Mock feed server bound to a random loopback port
pub struct MockFeedServer {
    port: u16,
    running: Arc<AtomicBool>,
    requests: Arc<AtomicUsize>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

/// What the mock server answers with
#[derive(Debug, Clone)]
pub struct MockFeedConfig {
    /// HTTP status code
    pub status: u16,
    /// Response body, sent verbatim
    pub body: String,
    /// Delay in milliseconds before responding
    pub delay_ms: u64,
}

impl Default for MockFeedConfig {
    fn default() -> Self {
        Self::with_users(&generate_mock_users(3))
    }
}

impl MockFeedConfig {
    /// Answer 200 with the given users serialized as a feed document
    pub fn with_users(users: &[TransferUser]) -> Self {
        Self {
            status: 200,
            body: serde_json::to_string(users).unwrap_or_else(|_| "[]".to_string()),
            delay_ms: 0,
        }
    }

    /// Answer 200 with an arbitrary body
    pub fn with_body(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            delay_ms: 0,
        }
    }

    /// Answer with an error status and a small JSON body
    pub fn failing(status: u16) -> Self {
        Self {
            status,
            body: r#"{"error": "unavailable"}"#.to_string(),
            delay_ms: 0,
        }
    }
}

impl MockFeedServer {
    pub fn start(config: MockFeedConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let running = Arc::new(AtomicBool::new(true));
        let requests = Arc::new(AtomicUsize::new(0));

        // Non-blocking so stop() can end the accept loop
        listener.set_nonblocking(true)?;

        let running_clone = running.clone();
        let requests_clone = requests.clone();
        let thread_handle = thread::spawn(move || {
            while running_clone.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        requests_clone.fetch_add(1, Ordering::SeqCst);
                        let cfg = config.clone();
                        thread::spawn(move || handle_connection(stream, &cfg));
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(std::time::Duration::from_millis(10));
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            port,
            running,
            requests,
            thread_handle: Some(thread_handle),
        })
    }

    /// URL of the feed document
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}/samples/friendface.json", self.port)
    }

    /// Number of connections accepted so far
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockFeedServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn handle_connection(mut stream: TcpStream, config: &MockFeedConfig) {
    // Accepted sockets inherit non-blocking mode on some platforms
    let _ = stream.set_nonblocking(false);

    let mut buffer = [0; 4096];
    let Ok(n) = stream.read(&mut buffer) else {
        return;
    };
    let request = String::from_utf8_lossy(&buffer[..n]);

    if config.delay_ms > 0 {
        thread::sleep(std::time::Duration::from_millis(config.delay_ms));
    }

    let method = request.split_whitespace().next().unwrap_or("");
    if method != "GET" {
        send_response(&mut stream, 405, r#"{"error": "Method not allowed"}"#);
        return;
    }

    send_response(&mut stream, config.status, &config.body);
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        405 => "Method Not Allowed",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

fn send_response(stream: &mut TcpStream, status: u16, body: &str) {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        status_text(status),
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

/// Deterministic users; user `i` is friends with every earlier user
pub fn generate_mock_users(count: usize) -> Vec<TransferUser> {
    let names = ["Alford Rodriguez", "Hawkins Patel", "Jewel Sexton", "Berry Dunn"];
    let registered = chrono::DateTime::parse_from_rfc3339("2015-11-10T01:47:18+00:00")
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_default();

    (0..count)
        .map(|i| {
            let name = names[i % names.len()];
            TransferUser {
                id: format!("user-{}", i + 1),
                is_active: i % 2 == 0,
                name: name.to_string(),
                age: 20 + i as i64,
                company: "Imkan".to_string(),
                email: format!("user{}@imkan.com", i + 1),
                address: format!("{} Nelson Street", 900 + i),
                about: format!("{} likes testing.", name),
                registered,
                tags: vec!["cillum".to_string(), format!("tag{}", i)],
                friends: (0..i)
                    .map(|j| TransferFriend {
                        id: format!("user-{}", j + 1),
                        name: names[j % names.len()].to_string(),
                    })
                    .collect(),
            }
        })
        .collect()
}
