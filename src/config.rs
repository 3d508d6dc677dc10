use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub upload: UploadConfig,

    #[serde(default)]
    pub admin: AdminConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Served under `/static`; uploaded images live in a subdirectory of it.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,

    #[serde(default = "default_session_idle_minutes")]
    pub session_idle_minutes: i64,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5000))
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("templates")
}

fn default_session_idle_minutes() -> i64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            static_dir: default_static_dir(),
            templates_dir: default_templates_dir(),
            session_idle_minutes: default_session_idle_minutes(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CatalogBackend {
    #[default]
    Json,
    Sqlite,
    Postgresql,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub backend: CatalogBackend,

    #[serde(default = "default_json_path")]
    pub json_path: PathBuf,

    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: PathBuf,

    #[serde(default)]
    pub postgresql_url: Option<String>,

    #[serde(default)]
    pub pool_size: Option<u32>,

    /// Append the three demo photos when the catalog is empty at startup.
    #[serde(default = "default_seed_demo_photos")]
    pub seed_demo_photos: bool,
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("photo-gallery")
}

fn default_json_path() -> PathBuf {
    data_dir().join("photos.json")
}

fn default_sqlite_path() -> PathBuf {
    data_dir().join("photos.db")
}

fn default_seed_demo_photos() -> bool {
    true
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            backend: CatalogBackend::default(),
            json_path: default_json_path(),
            sqlite_path: default_sqlite_path(),
            postgresql_url: None,
            pool_size: None,
            seed_demo_photos: default_seed_demo_photos(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Relative to `server.static_dir`, also the prefix of stored `image_path`s.
    #[serde(default = "default_images_subdir")]
    pub images_subdir: String,

    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,

    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

fn default_images_subdir() -> String {
    "images".to_string()
}

fn default_max_bytes() -> u64 {
    16 * 1024 * 1024 // 16 MiB
}

fn default_allowed_extensions() -> Vec<String> {
    vec![
        "png".to_string(),
        "jpg".to_string(),
        "jpeg".to_string(),
        "gif".to_string(),
    ]
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            images_subdir: default_images_subdir(),
            max_bytes: default_max_bytes(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_username")]
    pub username: String,

    /// Lowercase hex SHA-256 of the admin password, see `--hash-password`.
    #[serde(default = "default_admin_password_hash")]
    pub password_hash: String,
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_admin_password_hash() -> String {
    // sha256("password123")
    "ef92b778bafe771e89245b89ecbc08a44a4e166c06659911881f383d4473e94f".to_string()
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: default_admin_username(),
            password_hash: default_admin_password_hash(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    #[default]
    Stdout,
    Journald,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub target: LogTarget,

    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
}

fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("photo-gallery")
        .join("logs")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            target: LogTarget::default(),
            dir: default_log_dir(),
        }
    }
}

impl Config {
    /// Load from `PHOTO_GALLERY_CONFIG` or the default location, writing
    /// defaults there on first run.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("PHOTO_GALLERY_CONFIG") {
            return Self::load_from(Path::new(&path));
        }

        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("photo-gallery")
    }

    fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Directory uploaded files are written to.
    pub fn images_dir(&self) -> PathBuf {
        self.server.static_dir.join(&self.upload.images_subdir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.catalog.backend, CatalogBackend::Json);
        assert_eq!(config.upload.max_bytes, 16 * 1024 * 1024);
        assert_eq!(config.admin.username, "admin");
        assert_eq!(config.logging.target, LogTarget::Stdout);
    }

    #[test]
    fn test_partial_sections() {
        let config: Config = toml::from_str(
            r#"
            [catalog]
            backend = "sqlite"
            sqlite_path = "/tmp/photos.db"

            [server]
            bind = "0.0.0.0:8080"
            "#,
        )
        .unwrap();

        assert_eq!(config.catalog.backend, CatalogBackend::Sqlite);
        assert_eq!(config.catalog.sqlite_path, PathBuf::from("/tmp/photos.db"));
        assert_eq!(config.server.bind.port(), 8080);
        assert_eq!(config.server.static_dir, PathBuf::from("static"));
        assert!(config.catalog.seed_demo_photos);
    }

    #[test]
    fn test_save_and_load_from() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.admin.username = "curator".to_string();
        config.upload.allowed_extensions = vec!["png".to_string()];
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.admin.username, "curator");
        assert_eq!(loaded.upload.allowed_extensions, vec!["png".to_string()]);
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let dir = tempdir().unwrap();
        assert!(Config::load_from(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn test_images_dir() {
        let mut config = Config::default();
        config.server.static_dir = PathBuf::from("/srv/static");
        assert_eq!(config.images_dir(), PathBuf::from("/srv/static/images"));
    }
}
