//! Shared test infrastructure for integration tests.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

const PROXY_VARS: &[&str] = &[
    "ALL_PROXY",
    "all_proxy",
    "HTTP_PROXY",
    "http_proxy",
    "HTTPS_PROXY",
    "https_proxy",
];

/// Temp working directory holding a `config.json`.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn with_config(contents: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::write(dir.path().join("config.json"), contents).expect("write config");
        Self { dir }
    }

    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Run `dvtrace` with the workspace as cwd.
    pub fn run(&self, args: &[&str]) -> Output {
        self.command(args).output().expect("run dvtrace")
    }

    pub fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_dvtrace"));
        command
            .args(args)
            .current_dir(self.path())
            .env_remove("RUST_LOG");
        for var in PROXY_VARS {
            command.env_remove(var);
        }
        command
    }
}

pub fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// One request as seen by [`MockApi`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request_line: String,
    pub head: String,
    pub body: String,
}

impl RecordedRequest {
    /// Path plus query, e.g. `/api/data/v9.0/sample_Log?tag=T1`.
    pub fn target(&self) -> &str {
        self.request_line.split(' ').nth(1).unwrap_or_default()
    }

    pub fn body_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body is JSON")
    }
}

/// Loopback HTTP server replying with canned bodies, one connection per reply.
pub struct MockApi {
    pub base_url: String,
    addr: SocketAddr,
    handle: thread::JoinHandle<Vec<RecordedRequest>>,
}

impl MockApi {
    pub fn start(replies: Vec<&'static str>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            for reply in replies {
                let Ok((mut stream, _)) = listener.accept() else {
                    break;
                };
                let request = read_request(&mut stream);
                if request.request_line.is_empty() {
                    continue;
                }
                seen.push(request);
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{reply}",
                    reply.len()
                );
                let _ = stream.write_all(response.as_bytes());
            }
            seen
        });
        Self {
            base_url: format!("http://{addr}/"),
            addr,
            handle,
        }
    }

    /// Collect the requests once the client is done.
    ///
    /// Replies the client never asked for are drained with empty connections,
    /// which are not recorded.
    pub fn finish(self) -> Vec<RecordedRequest> {
        while !self.handle.is_finished() {
            let _ = TcpStream::connect(self.addr);
            thread::sleep(Duration::from_millis(10));
        }
        self.handle.join().expect("mock api thread")
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

fn read_request(stream: &mut TcpStream) -> RecordedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let mut head_end = None;
    loop {
        let n = stream.read(&mut chunk).unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = find_subslice(&buf, b"\r\n\r\n") {
            head_end = Some(end);
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            if buf.len() >= end + 4 + content_length(&head) {
                break;
            }
        }
    }
    let end = head_end.unwrap_or(buf.len());
    let head = String::from_utf8_lossy(&buf[..end]).into_owned();
    let body = buf
        .get(end + 4..)
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .unwrap_or_default();
    RecordedRequest {
        request_line: head.lines().next().unwrap_or_default().to_string(),
        head,
        body,
    }
}

/// Directory containing no `az`, for PATH-scan failures.
pub fn empty_path_dir(workspace: &Workspace) -> PathBuf {
    let dir = workspace.path().join("empty-bin");
    std::fs::create_dir_all(&dir).expect("create empty bin dir");
    dir
}

/// Install an `az` script in a fresh bin dir and return that dir.
///
/// The script prints `token` and writes its arguments to `az-args.txt` in the
/// workspace.
#[cfg(unix)]
pub fn fake_az(workspace: &Workspace, token: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let bin = workspace.path().join("az-bin");
    std::fs::create_dir_all(&bin).expect("create az bin dir");
    let args_file = workspace.path().join("az-args.txt");
    let script = format!(
        "#!/bin/sh\nprintf '%s\\n' \"$*\" > '{}'\necho {token}\n",
        args_file.display()
    );
    let az = bin.join("az");
    std::fs::write(&az, script).expect("write az");
    std::fs::set_permissions(&az, std::fs::Permissions::from_mode(0o755)).expect("chmod az");
    bin
}

/// PATH holding `bin` ahead of the system directories.
#[cfg(unix)]
pub fn path_with(bin: &Path) -> String {
    format!("{}:/usr/bin:/bin", bin.display())
}
