//! A minimal host shell: parses a config file, boots a `Runtime` on a
//! `HostPumpLoop`, creates one window with a `NullWebViewHost`, and feeds
//! it IPC messages from stdin — enough to exercise the bridge end to end
//! without a real web-view widget attached.

use app_runtime_core::config::UserConfig;
use app_runtime_core::eventloop::HostPumpLoop;
use app_runtime_core::message::Message;
use app_runtime_core::window::{NullWebViewHost, WindowOptions};
use app_runtime_core::Runtime;
use bytes::Bytes;
use clap::Parser;
use std::io::BufRead;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "runtime-shell", about = "Drives an app-runtime-core Runtime from stdin IPC messages")]
struct Args {
    /// Path to a socket.ini-style configuration file.
    #[arg(long)]
    config: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = match args.config {
        Some(path) => {
            let source = std::fs::read_to_string(&path).unwrap_or_else(|e| {
                tracing::warn!(%path, error = %e, "failed to read config, using defaults");
                String::new()
            });
            UserConfig::parse(&source)
        }
        None => UserConfig::default(),
    };

    let event_loop = Arc::new(HostPumpLoop::new());
    let mut runtime = Runtime::new(event_loop.clone());

    let window_index = runtime
        .create_window(
            -1,
            WindowOptions {
                width: config.window_width(),
                height: config.window_height(),
                title: config.app_name().to_string(),
                ..WindowOptions::default()
            },
            Box::new(NullWebViewHost),
        )
        .expect("failed to create initial window");

    tracing::info!(window_index, app = config.app_name(), "runtime started");

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        let message = Message::parse(&line, Bytes::new());
        let bridge = {
            let guard = runtime.windows.lock();
            guard.get(window_index).expect("window exists").bridge.clone()
        };
        let result = bridge.dispatch(&message);
        println!("{}", result.to_wire());
        event_loop.poll();
        runtime.poll_services();
    }

    runtime.shutdown();
}
