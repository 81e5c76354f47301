use std::{net::SocketAddr, time::Duration};

use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crate::rpc::dispatcher::Dispatched;

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

pub fn log_dispatch(peer: SocketAddr, dispatched: &Dispatched, elapsed: Duration) {
    let method = dispatched.method.as_deref().unwrap_or("-");
    let response = &dispatched.response;

    info!(
        peer = %peer,
        method = %method,
        id = response.id,
        code = response.error.code,
        outcome = if response.is_error() { "failure" } else { "success" },
        duration_ms = elapsed.as_millis(),
        "rpc call summary"
    );

    if response.is_error() {
        warn!(
            peer = %peer,
            method = %method,
            code = response.error.code,
            error = %response.error.message,
            "rpc call failed"
        );
    }
}
