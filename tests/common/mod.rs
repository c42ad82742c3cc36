#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use summary_vectors::{Embedder, Result};

/// One request as seen by [`FakeHttp`].
#[derive(Debug, Clone)]
pub struct Captured {
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
}

impl Captured {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// What the server does with one connection.
pub enum Reply {
    Json(u16, String),
    Stall(Duration),
}

/// Single-threaded HTTP/1.1 responder serving one canned reply per connection.
pub struct FakeHttp {
    pub base_url: String,
    handle: JoinHandle<Vec<Captured>>,
}

impl FakeHttp {
    pub fn start(replies: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let base_url = format!("http://{}", listener.local_addr().expect("addr"));
        let handle = thread::spawn(move || {
            let mut captured = Vec::new();
            for reply in replies {
                let (stream, _) = listener.accept().expect("accept");
                match reply {
                    Reply::Json(status, body) => {
                        captured.push(read_request(&stream));
                        write_response(stream, status, &body);
                    }
                    Reply::Stall(delay) => {
                        captured.push(read_request(&stream));
                        thread::sleep(delay);
                    }
                }
            }
            captured
        });
        Self { base_url, handle }
    }

    /// Waits for every reply to be served and returns the requests.
    pub fn finish(self) -> Vec<Captured> {
        self.handle.join().expect("server thread")
    }
}

fn read_request(stream: &TcpStream) -> Captured {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).expect("request line");
    let path = request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or_default()
        .to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).expect("header line");
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            headers.push((key.trim().to_string(), value.trim().to_string()));
        }
    }
    let length = headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).expect("body");
    let body = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).expect("json body")
    };
    Captured {
        path,
        headers,
        body,
    }
}

fn write_response(mut stream: TcpStream, status: u16, body: &str) {
    let response = format!(
        "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).expect("write");
    stream.flush().expect("flush");
}

/// Deterministic embedder: a 3-dim vector derived from the text's bytes.
pub struct HashEmbedder;

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f64>> {
        let bytes = text.as_bytes();
        let sum: u32 = bytes.iter().map(|b| u32::from(*b)).sum();
        Ok(vec![
            bytes.len() as f64,
            f64::from(sum % 97),
            f64::from(u32::from(bytes.first().copied().unwrap_or(0))),
        ])
    }
}
