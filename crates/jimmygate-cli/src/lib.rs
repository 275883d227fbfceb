//! Launcher for the jimmygate gateway: argument parsing and listener setup.
#![deny(unsafe_code)]

use std::io;

use tokio::net::TcpListener;

pub mod args;

pub use args::Cli;

/// Bind the listener, turning common failures into actionable messages.
pub async fn bind_listener(host: &str, port: u16) -> anyhow::Result<TcpListener> {
    TcpListener::bind((host, port))
        .await
        .map_err(|e| anyhow::anyhow!(describe_bind_error(host, port, &e)))
}

/// Human-readable explanation of a bind failure.
pub fn describe_bind_error(host: &str, port: u16, err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::AddrInUse => format!(
            "address {host}:{port} is already in use.\n\
             How to fix:\n  \
             1) Stop the process listening on port {port}.\n  \
             2) Or change PORT (in .env or the environment) and restart."
        ),
        io::ErrorKind::PermissionDenied => format!(
            "no permission to bind {host}:{port}.\n\
             Try a higher port (for example 3000 or 3011)."
        ),
        _ => format!("failed to bind {host}:{port}: {err}"),
    }
}
