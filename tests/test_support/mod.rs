#![allow(dead_code)]

use stagehand::materializer::{Materializer, ScaffoldTool};
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

pub(crate) const HEALTHY_REPORT: &str =
    r#"{"status":"Healthy","totalDuration":"00:00:00.0100000","entries":{}}"#;
pub(crate) const DEGRADED_REPORT: &str = r#"{"status":"Degraded","entries":{"queue":{"status":"Degraded","description":"backlog"}}}"#;

pub(crate) fn write_script(path: &Path, body: &str) {
    fs::write(path, body).expect("write script");
    let mut perms = fs::metadata(path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod");
}

/// Stand-in for `dotnet new`: records its arguments and writes a source file
/// with a `#{Placeholder}#` token into the `--output` directory.
pub(crate) fn write_fake_scaffold_tool(dir: &Path) -> PathBuf {
    let path = dir.join("fake-dotnet");
    write_script(
        &path,
        r##"#!/bin/sh
out=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "--output" ]; then out="$arg"; fi
  prev="$arg"
done
if [ -z "$out" ]; then echo "missing --output" >&2; exit 2; fi
echo "$@" > "$out/args.txt"
mkdir -p "$out/src"
printf 'var connection = "#{ConnectionString}#";\n' > "$out/src/Program.cs"
echo "The template was created successfully."
"##,
    );
    path
}

pub(crate) fn write_failing_scaffold_tool(dir: &Path, stderr: &str, code: i32) -> PathBuf {
    let path = dir.join("failing-dotnet");
    write_script(
        &path,
        &format!("#!/bin/sh\nprintf '%s\\n' '{stderr}' >&2\nexit {code}\n"),
    );
    path
}

pub(crate) fn materializer_for(tool: &Path) -> Materializer {
    Materializer::new(ScaffoldTool::new(
        tool.display().to_string(),
        Duration::from_secs(10),
    ))
}

pub(crate) fn entries_in(dir: &Path) -> Vec<PathBuf> {
    match fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|entry| entry.expect("dir entry").path())
            .collect(),
        Err(_) => Vec::new(),
    }
}

pub(crate) fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(25));
    }
    condition()
}

/// A port nothing listens on right now.
pub(crate) fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("local addr").port()
}

#[derive(Debug, Clone)]
pub(crate) struct StubRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl StubRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct StubReply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl StubReply {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Minimal HTTP/1.1 server on an ephemeral port; one request per connection.
pub(crate) fn spawn_http_stub<F>(handler: F) -> u16
where
    F: Fn(&StubRequest) -> StubReply + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind http stub");
    let port = listener.local_addr().expect("local addr").port();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            if let Some(request) = read_request(&stream) {
                let reply = handler(&request);
                write_reply(&mut stream, &reply);
            }
        }
    });
    port
}

/// Writes `body` to every connection and closes it.
pub(crate) fn spawn_tcp_health_stub(body: &str) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind tcp stub");
    let port = listener.local_addr().expect("local addr").port();
    let body = body.to_string();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let _ = stream.write_all(body.as_bytes());
            let _ = stream.flush();
        }
    });
    port
}

fn read_request(stream: &TcpStream) -> Option<StubRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(5))).ok()?;
    let mut reader = BufReader::new(stream.try_clone().ok()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).ok()? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    let length = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0_u8; length];
    reader.read_exact(&mut body).ok()?;

    Some(StubRequest {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn write_reply(stream: &mut TcpStream, reply: &StubReply) {
    let reason = match reply.status {
        200 => "OK",
        202 => "Accepted",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    };
    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
        reply.status,
        reason,
        reply.body.len()
    );
    for (name, value) in &reply.headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str("\r\n");
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(reply.body.as_bytes());
    let _ = stream.flush();
}
