use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "MedCenter";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is not set.
pub fn default_log_filter() -> String {
    format!("info,{}=debug", env!("CARGO_PKG_NAME"))
}

/// Get the application data directory
/// ~/MedCenter/ on all platforms (user-visible)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("MedCenter")
}

/// Get the SQLite database path
pub fn db_path() -> PathBuf {
    app_data_dir().join("medcenter.db")
}

/// Get the directory for uploaded report attachments
pub fn attachments_dir() -> PathBuf {
    app_data_dir().join("attachments")
}

/// REST listen address. Override with the MEDCENTER_ADDR environment variable.
pub fn bind_addr() -> String {
    std::env::var("MEDCENTER_ADDR").unwrap_or_else(|_| "127.0.0.1:8642".to_string())
}
