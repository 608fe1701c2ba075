//! Shared test doubles: a fake host runner that interprets the commands
//! the adapters issue (backed by an in-memory service registry and real
//! filesystem operations against test-owned directories), and a minimal
//! HTTP stub standing in for the release endpoints.

use std::collections::HashSet;
use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use noctum_install::error::Result;
use noctum_install::privilege::{Action, CommandOutput, Runner};
use noctum_install::service::ServiceDescriptor;

#[derive(Default)]
pub struct FakeState {
    pub actions: Vec<Action>,
    pub registered: HashSet<String>,
    pub active: HashSet<String>,
    pub refuse_elevated: bool,
}

pub struct FakeRunner {
    pub state: Mutex<FakeState>,
}

impl FakeRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeRunner {
            state: Mutex::new(FakeState::default()),
        })
    }

    /// Simulates the user declining the interactive privilege prompt.
    pub fn refusing_elevation() -> Arc<Self> {
        Arc::new(FakeRunner {
            state: Mutex::new(FakeState {
                refuse_elevated: true,
                ..FakeState::default()
            }),
        })
    }

    pub fn actions(&self) -> Vec<Action> {
        self.state.lock().expect("state lock").actions.clone()
    }

    pub fn registered(&self) -> HashSet<String> {
        self.state.lock().expect("state lock").registered.clone()
    }
}

fn ok() -> CommandOutput {
    CommandOutput {
        success: true,
        stdout: String::new(),
        stderr: String::new(),
    }
}

fn ok_with(stdout: &str) -> CommandOutput {
    CommandOutput {
        success: true,
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

fn failed(stderr: &str) -> CommandOutput {
    CommandOutput {
        success: false,
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

fn fs_result(result: std::io::Result<()>) -> CommandOutput {
    match result {
        Ok(()) => ok(),
        Err(e) => failed(&e.to_string()),
    }
}

impl Runner for FakeRunner {
    fn run(&self, action: &Action) -> Result<CommandOutput> {
        let mut state = self.state.lock().expect("state lock");
        state.actions.push(action.clone());

        if action.elevated && state.refuse_elevated {
            return Ok(failed("sudo: a password is required"));
        }

        let args: Vec<&str> = action.args.iter().map(String::as_str).collect();
        let output = match (action.program.as_str(), args.as_slice()) {
            ("mv", [src, dst]) | ("mv", ["-f", src, dst]) => {
                fs_result(fs::rename(src, dst))
            }
            ("cp", [src, dst]) => fs_result(fs::copy(src, dst).map(|_| ())),
            ("rm", ["-f", path]) => {
                if Path::new(path).exists() {
                    fs_result(fs::remove_file(path))
                } else {
                    ok()
                }
            }
            ("mkdir", ["-p", path]) => fs_result(fs::create_dir_all(path)),
            ("chmod", [_, _]) => ok(),

            ("systemctl", ["daemon-reload"]) => ok(),
            ("systemctl", ["enable", unit]) => {
                state.registered.insert(unit.to_string());
                ok()
            }
            ("systemctl", ["disable", unit]) => {
                state.registered.remove(*unit);
                ok()
            }
            ("systemctl", ["start", unit] | ["restart", unit]) => {
                state.active.insert(unit.to_string());
                ok()
            }
            ("systemctl", ["stop", unit]) => {
                state.active.remove(*unit);
                ok()
            }
            ("systemctl", ["is-active", unit]) => {
                if state.active.contains(*unit) {
                    ok_with("active\n")
                } else {
                    failed("inactive")
                }
            }

            ("launchctl", ["load", path]) => {
                let label = label_from_plist(path);
                if state.registered.contains(&label) {
                    failed("service already loaded")
                } else {
                    state.registered.insert(label.clone());
                    state.active.insert(label);
                    ok()
                }
            }
            ("launchctl", ["unload", path]) => {
                let label = label_from_plist(path);
                if state.registered.remove(&label) {
                    state.active.remove(&label);
                    ok()
                } else {
                    failed("Could not find specified service")
                }
            }
            ("launchctl", ["list", label]) => {
                if state.active.contains(*label) {
                    ok_with("{ \"PID\" = 4242; }")
                } else {
                    failed("Could not find service in domain")
                }
            }

            _ => ok(),
        };

        Ok(output)
    }
}

fn label_from_plist(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// How the stub answers the tarball request.
pub enum TarballResponse {
    Bytes(Vec<u8>),
    Garbage,
    NotFound,
    /// Holds the connection open without responding, for interruption
    /// tests.
    Stall,
}

/// Serves the release listing (`tag_name: v1.2.3`) and the tarball from a
/// local port, recording every requested path.
pub struct StubReleaseServer {
    pub api_url: String,
    pub download_base: String,
    pub requested: Arc<Mutex<Vec<String>>>,
}

impl StubReleaseServer {
    pub fn start(tarball: TarballResponse) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("stub server bind");
        let addr = listener.local_addr().expect("stub server addr");
        let requested = Arc::new(Mutex::new(Vec::new()));
        let log = requested.clone();

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let mut buf = [0u8; 4096];
                let n = stream.read(&mut buf).unwrap_or(0);
                let head = String::from_utf8_lossy(&buf[..n]).into_owned();
                let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                log.lock().expect("request log").push(path.clone());

                if path.ends_with("/releases/latest") {
                    respond(&mut stream, 200, br#"{"tag_name":"v1.2.3"}"#);
                } else if path.ends_with(".tar.gz") {
                    match &tarball {
                        TarballResponse::Bytes(bytes) => respond(&mut stream, 200, bytes),
                        TarballResponse::Garbage => {
                            respond(&mut stream, 200, b"definitely not gzip")
                        }
                        TarballResponse::NotFound => respond(&mut stream, 404, b""),
                        TarballResponse::Stall => thread::sleep(Duration::from_secs(600)),
                    }
                } else {
                    respond(&mut stream, 404, b"");
                }
            }
        });

        StubReleaseServer {
            api_url: format!("http://{addr}/releases/latest"),
            download_base: format!("http://{addr}/download"),
            requested,
        }
    }
}

fn respond(stream: &mut TcpStream, status: u16, body: &[u8]) {
    let reason = if status == 200 { "OK" } else { "Not Found" };
    let head = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}

/// A gzipped tar with the daemon executable at the archive root.
pub fn release_tarball() -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let payload = b"#!/bin/sh\nexit 0\n";
    let mut header = tar::Header::new_gnu();
    header.set_size(payload.len() as u64);
    header.set_mode(0o755);
    header.set_cksum();
    builder
        .append_data(&mut header, "noctum", payload.as_slice())
        .expect("tar entry");
    builder
        .into_inner()
        .expect("tar finish")
        .finish()
        .expect("gzip finish")
}

pub fn sample_descriptor(home: &Path) -> ServiceDescriptor {
    ServiceDescriptor {
        exec_path: "/usr/local/bin/noctum".into(),
        run_as_user: "dev".into(),
        run_as_group: "staff".into(),
        home_dir: home.to_path_buf(),
        stdout_log: home.join(".local/share/noctum/logs/noctum.out.log"),
        stderr_log: home.join(".local/share/noctum/logs/noctum.err.log"),
    }
}
