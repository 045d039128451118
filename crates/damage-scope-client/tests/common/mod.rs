//! Loopback HTTP server answering one request with a canned response.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::JoinHandle;

use damage_scope_client::{HttpDetectionTransport, ServiceEndpoint};

/// Server thread plus the base URL it listens on.
pub struct OneShotServer {
    base: String,
    handle: JoinHandle<String>,
}

impl OneShotServer {
    /// Starts a server that answers the first request with `status` and a
    /// JSON `body`.
    pub fn start(status: &'static str, body: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("loopback bind");
        let base = format!("http://{}/", listener.local_addr().expect("local addr"));
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("client connects");
            let request = read_request(&mut stream);
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).expect("response written");
            request
        });
        Self { base, handle }
    }

    /// Transport pointed at this server.
    pub fn transport(&self) -> HttpDetectionTransport {
        let endpoint = ServiceEndpoint::parse(&self.base).expect("loopback url is valid");
        HttpDetectionTransport::new(endpoint).expect("client builds")
    }

    /// Waits for the server and returns the raw request it received.
    pub fn request(self) -> String {
        self.handle.join().expect("server thread finishes")
    }
}

fn read_request(stream: &mut TcpStream) -> String {
    let mut raw = Vec::new();
    let mut chunk = [0_u8; 4096];
    loop {
        let read = stream.read(&mut chunk).expect("request readable");
        if read == 0 {
            break;
        }
        raw.extend_from_slice(&chunk[..read]);
        if request_complete(&raw) {
            break;
        }
    }
    String::from_utf8_lossy(&raw).into_owned()
}

fn request_complete(raw: &[u8]) -> bool {
    let text = String::from_utf8_lossy(raw);
    let Some(header_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let headers = text[..header_end].to_ascii_lowercase();
    let body_len = raw.len() - (header_end + 4);

    if headers.contains("transfer-encoding: chunked") {
        return text.ends_with("0\r\n\r\n");
    }
    let expected = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    body_len >= expected
}
