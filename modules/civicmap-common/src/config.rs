use std::env;
use std::path::PathBuf;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Web server
    pub web_host: String,
    pub web_port: u16,

    // Remote issue store. Empty means in-memory (demo mode).
    pub store_url: String,

    // Durable local state (offline queue, vote ledgers)
    pub data_dir: PathBuf,

    // Image store (Cloudinary-compatible). Cloud name/key may be empty,
    // in which case uploads degrade to photo-less submissions.
    pub image_cloud_name: String,
    pub image_api_key: String,
    pub image_api_secret: String,
    pub image_upload_preset: String,

    // Admin identity
    pub admin_email: String,
    pub admin_password: String,

    // Session token signing
    pub session_secret: String,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: env::var("WEB_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("WEB_PORT must be a number"),
            store_url: env::var("ISSUE_STORE_URL").unwrap_or_default(),
            data_dir: env::var("DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string())
                .into(),
            image_cloud_name: env::var("IMAGE_CLOUD_NAME").unwrap_or_default(),
            image_api_key: env::var("IMAGE_API_KEY").unwrap_or_default(),
            image_api_secret: env::var("IMAGE_API_SECRET").unwrap_or_default(),
            image_upload_preset: env::var("IMAGE_UPLOAD_PRESET")
                .unwrap_or_else(|_| "civicmap".to_string()),
            admin_email: env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@civicmap.org".to_string()),
            admin_password: required_env("ADMIN_PASSWORD"),
            session_secret: required_env("SESSION_SECRET"),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
