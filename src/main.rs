mod audit;
mod auth;
mod config;
mod dashboard;
mod error;
mod exchange;
mod ipc;
mod matcher;
mod records;
mod session;
mod spreadsheet;
mod store;
mod tabular;
mod workspace;

use log::{error, info};
use serde_json::json;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

fn main() {
    // stdout carries the protocol, so logs go to stderr
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let mut state = ipc::AppState::default();
    if let Some(path) = std::env::var_os(config::WORKSPACE_ENV).map(PathBuf::from) {
        match workspace::Workspace::open(&path) {
            Ok(ws) => state.workspace = Some(ws),
            Err(e) => error!("could not open {}: {}", config::WORKSPACE_ENV, e),
        }
    }
    info!("rosterd {} ready", env!("CARGO_PKG_VERSION"));

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // no id to answer with
                let _ = writeln!(
                    stdout,
                    "{}",
                    json!({ "ok": false, "error": { "code": "bad_json", "message": e.to_string() } })
                );
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
