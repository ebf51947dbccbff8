//! Minimal HTTP/1.1 server serving a fixed path->bytes map for integration
//! tests.
//!
//! Responds to GET with 200 and the mapped body, 404 for unknown paths. Can
//! be forced to answer every request with a fixed error status to exercise
//! transport fallback. Records the path of every request it sees.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

pub type RequestLog = Arc<Mutex<Vec<String>>>;

/// Starts a server in a background thread serving `files` (keys are relative
/// paths without a leading slash). Returns the base URL and the request log.
/// The server runs until the process exits.
pub fn start(files: HashMap<String, Vec<u8>>) -> (String, RequestLog) {
    start_with_status(files, None)
}

/// Like `start`, but when `forced_status` is Some, every request is answered
/// with that status line and an empty body.
pub fn start_with_status(
    files: HashMap<String, Vec<u8>>,
    forced_status: Option<&'static str>,
) -> (String, RequestLog) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let files = Arc::new(files);
    let log: RequestLog = Arc::new(Mutex::new(Vec::new()));
    let log_handle = Arc::clone(&log);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let files = Arc::clone(&files);
            let log = Arc::clone(&log_handle);
            thread::spawn(move || handle(stream, &files, &log, forced_status));
        }
    });
    (format!("http://127.0.0.1:{}/", port), log)
}

fn handle(
    mut stream: std::net::TcpStream,
    files: &HashMap<String, Vec<u8>>,
    log: &RequestLog,
    forced_status: Option<&'static str>,
) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let mut parts = request.split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("").trim_start_matches('/').to_string();
    log.lock().unwrap().push(path.clone());

    if let Some(status) = forced_status {
        let _ = stream.write_all(
            format!("HTTP/1.1 {status}\r\nContent-Length: 0\r\n\r\n").as_bytes(),
        );
        return;
    }
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\n\r\n");
        return;
    }
    match files.get(&path) {
        Some(body) => {
            let header = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", body.len());
            let _ = stream.write_all(header.as_bytes());
            let _ = stream.write_all(body);
        }
        None => {
            let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
        }
    }
}
