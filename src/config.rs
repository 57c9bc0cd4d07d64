pub const POLL_PAGE_SIZE: usize = 100;
pub const DISCUSSION_PAGE_SIZE: usize = 50;
pub const INDEX_PAGE_SIZE: usize = 50;
pub const MAX_MESSAGE_LENGTH: usize = 5000;
pub const MAX_TITLE_LENGTH: usize = 500;

/// Format accepted for topic `start`/`end` form fields.
pub const DATE_INPUT_FORMAT: &str = "%Y-%m-%d %H:%M";

pub const SESSION_COOKIE: &str = "board_session";
/// Oldest pending flashes are dropped past this many.
pub const MAX_PENDING_FLASHES: usize = 5;

pub const USERS_LIST_KEY: &str = "users_list";
pub const TOPICS_LIST_KEY: &str = "topics_list";
pub const SESSIONS_LIST_KEY: &str = "sessions_list";

pub fn user_key(id: &str) -> String {
    format!("user:{}", id)
}

pub fn email_key(email: &str) -> String {
    format!("user_email:{}", email)
}

pub fn topic_key(id: &str) -> String {
    format!("topic:{}", id)
}

pub fn message_key(id: &str) -> String {
    format!("message:{}", id)
}

pub fn topic_messages_key(topic_id: &str) -> String {
    format!("messages:{}", topic_id)
}

pub fn session_key(token: &str) -> String {
    format!("session:{}", token)
}

pub fn session_expiration_hours() -> i64 {
    std::env::var("BOARD_SESSION_EXPIRATION_HOURS")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(24)
}

pub fn bind_address() -> String {
    std::env::var("BOARD_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string())
}

pub fn seed_data_enabled() -> bool {
    std::env::var("BOARD_SEED_DATA")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

pub fn log_filter() -> String {
    std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string())
}
