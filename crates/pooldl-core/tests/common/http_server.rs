//! Minimal keep-alive HTTP/1.1 server for integration tests.
//!
//! Serves `GET /<path>` with body `body of /<path>`, `/missing` with 404 and
//! `/named` with a Content-Disposition header. Several requests may arrive on
//! one TCP connection; the number of accepted connections is counted so tests
//! can check that clients reuse them.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub struct TestServer {
    pub base_url: String,
    accepted: Arc<AtomicUsize>,
    requests: Arc<AtomicUsize>,
}

impl TestServer {
    /// TCP connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Requests answered so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn url(&self, path: &str) -> url::Url {
        url::Url::parse(&format!("{}{}", self.base_url, path.trim_start_matches('/'))).unwrap()
    }
}

/// Starts the server on an ephemeral port. It runs until the process exits.
pub fn start() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let accepted = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(AtomicUsize::new(0));
    {
        let accepted = Arc::clone(&accepted);
        let requests = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                accepted.fetch_add(1, Ordering::SeqCst);
                let requests = Arc::clone(&requests);
                thread::spawn(move || serve(stream, &requests));
            }
        });
    }
    TestServer {
        base_url: format!("http://127.0.0.1:{}/", port),
        accepted,
        requests,
    }
}

fn serve(mut stream: TcpStream, requests: &AtomicUsize) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let mut pending = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        while find_header_end(&pending).is_none() {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => return,
                Ok(n) => pending.extend_from_slice(&buf[..n]),
            }
        }
        let end = match find_header_end(&pending) {
            Some(end) => end,
            None => return,
        };
        let head = String::from_utf8_lossy(&pending[..end]).into_owned();
        pending.drain(..end + 4);

        let path = head
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .unwrap_or("/")
            .to_string();
        requests.fetch_add(1, Ordering::SeqCst);
        if stream.write_all(&respond(&path)).is_err() {
            return;
        }
    }
}

fn respond(path: &str) -> Vec<u8> {
    let (status, extra, body) = match path {
        "/missing" => ("404 Not Found", String::new(), "not found".to_string()),
        "/named" => (
            "200 OK",
            "Content-Disposition: attachment; filename=\"server-name.txt\"\r\n".to_string(),
            "named body".to_string(),
        ),
        _ => ("200 OK", String::new(), format!("body of {}", path)),
    };
    let mut response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Type: text/plain\r\n{}\r\n",
        status,
        body.len(),
        extra
    )
    .into_bytes();
    response.extend_from_slice(body.as_bytes());
    response
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}
