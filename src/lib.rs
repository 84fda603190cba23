pub mod clipboard;
pub mod config;
pub mod event;
pub mod platform;
pub mod resolve;
pub mod session;

pub type SessionId = String;

// get timestamp in milliseconds
pub fn get_timestamp() -> u64 {
    let now = std::time::SystemTime::now();
    now.duration_since(std::time::UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}
