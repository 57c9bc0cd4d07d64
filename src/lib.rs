pub mod auth;
pub mod config;
pub mod core;
pub mod handlers;
pub mod messages;
pub mod models;
pub mod topics;
pub mod users;

pub use handlers::{handle_request, route};

/// Installs the fmt subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(config::log_filter()))
        .try_init();
}

// === Component entrypoint ===
#[cfg(target_arch = "wasm32")]
#[spin_sdk::http_component]
fn handle(req: spin_sdk::http::Request) -> anyhow::Result<spin_sdk::http::Response> {
    init_tracing();
    let store = crate::core::db::spin_store()?;
    Ok(handle_request(&store, &req))
}
