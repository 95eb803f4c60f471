//! Helpers shared by the unit tests.

use anyhow::Result;
use std::cell::RefCell;
use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::retry::Sleeper;

/// Writes an executable bash script named `name` into `dir`.
pub fn install_script(dir: &Path, name: &str, body: &str) -> Result<PathBuf> {
    let script_path = dir.join(name);
    fs::write(&script_path, format!("#!/usr/bin/env bash\nset -eu\n{body}"))?;
    let mut perms = fs::metadata(&script_path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&script_path, perms)?;
    Ok(script_path)
}

/// Records every requested delay instead of blocking.
#[derive(Default)]
pub struct RecordingSleeper {
    pub delays: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn seconds(&self) -> Vec<u64> {
        self.delays.borrow().iter().map(Duration::as_secs).collect()
    }

    pub fn millis(&self) -> Vec<u128> {
        self.delays.borrow().iter().map(Duration::as_millis).collect()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.delays.borrow_mut().push(duration);
    }
}

/// Loopback HTTP server answering one request per canned `(status, body)`
/// pair, in order, then exiting. Each connection is closed after replying.
pub struct CannedServer {
    pub base_url: String,
    handle: JoinHandle<Vec<String>>,
}

impl CannedServer {
    pub fn start(responses: Vec<(u16, &'static str)>) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let base_url = format!("http://{}", listener.local_addr()?);
        let handle = thread::spawn(move || {
            let mut heads = Vec::new();
            for (status, body) in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    break;
                };
                heads.push(read_request_head(&mut stream));
                let reply = format!(
                    "HTTP/1.1 {status} Canned\r\nContent-Type: text/plain\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(reply.as_bytes());
            }
            heads
        });
        Ok(Self { base_url, handle })
    }

    /// Request heads received so far; waits for the server thread to finish.
    pub fn requests(self) -> Vec<String> {
        self.handle.join().unwrap_or_default()
    }
}

fn read_request_head(stream: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|window| window == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}
