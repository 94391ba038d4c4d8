use crate::core::constants::{defaults, download, env as env_names};
use crate::error::{AppError, AppResult};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// 配置文件结构（`<base>/config.toml`，所有字段可选）
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// 数据目录，不从文件读取
    #[serde(skip)]
    base_dir: PathBuf,
    #[serde(default)]
    pub install_dir: Option<PathBuf>,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default = "default_catalog_url")]
    pub catalog_url: String,
    #[serde(default = "default_image_type")]
    pub image_type: String,
    #[serde(default)]
    pub download: DownloadSettings,
    #[serde(default)]
    pub shell: ShellSettings,
}

/// 下载配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    pub retry_count: u32,
    pub retry_delay_ms: u64,
    pub connect_timeout_sec: u64,
    pub read_timeout_sec: u64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            retry_count: download::MAX_RETRIES,
            retry_delay_ms: download::RETRY_DELAY_MS,
            connect_timeout_sec: download::CONNECT_TIMEOUT_SEC,
            read_timeout_sec: download::READ_TIMEOUT_SEC,
        }
    }
}

impl DownloadSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_sec)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_sec)
    }
}

/// Shell 集成配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShellSettings {
    /// 相对用户主目录的启动文件
    pub rc_files: Vec<String>,
    pub system_profile_path: PathBuf,
    pub system_environment_file: PathBuf,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            rc_files: defaults::RC_FILES.iter().map(|s| s.to_string()).collect(),
            system_profile_path: PathBuf::from(defaults::SYSTEM_PROFILE_PATH),
            system_environment_file: PathBuf::from(defaults::SYSTEM_ENVIRONMENT_FILE),
        }
    }
}

fn default_catalog_url() -> String {
    defaults::CATALOG_URL.to_string()
}

fn default_image_type() -> String {
    defaults::IMAGE_TYPE.to_string()
}

impl Config {
    /// 以 `base_dir` 为数据目录的默认配置
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Config {
            base_dir: base_dir.into(),
            install_dir: None,
            cache_dir: None,
            catalog_url: default_catalog_url(),
            image_type: default_image_type(),
            download: DownloadSettings::default(),
            shell: ShellSettings::default(),
        }
    }

    /// 从默认数据目录加载配置
    pub fn load() -> AppResult<Self> {
        Self::load_from(get_base_dir()?)
    }

    /// 从指定数据目录加载配置，配置文件不存在时使用默认值
    pub fn load_from(base_dir: impl Into<PathBuf>) -> AppResult<Self> {
        let base_dir = base_dir.into();
        let config_path = base_dir.join(defaults::CONFIG_FILE);

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            toml::from_str::<Config>(&content).map_err(|e| AppError::Config {
                message: format!("解析配置文件失败 {}: {e}", config_path.display()),
            })?
        } else {
            debug!(path = %config_path.display(), "config file not found, using defaults");
            Config::with_base_dir(&base_dir)
        };

        config.base_dir = base_dir;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> AppResult<()> {
        let url = url::Url::parse(&self.catalog_url).map_err(|e| AppError::Config {
            message: format!("无效的 catalog_url '{}': {e}", self.catalog_url),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::Config {
                message: format!("catalog_url 必须使用 http 或 https: {}", self.catalog_url),
            });
        }
        if self.image_type.trim().is_empty() {
            return Err(AppError::Config {
                message: "image_type 不能为空".to_string(),
            });
        }
        Ok(())
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// 版本安装根目录
    pub fn install_dir(&self) -> PathBuf {
        self.install_dir
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| self.base_dir.join(defaults::VERSIONS_DIR))
    }

    /// 下载缓存目录
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| self.base_dir.join(defaults::CACHE_DIR))
    }

    /// 去掉末尾 `/` 的目录接口地址
    pub fn catalog_base_url(&self) -> &str {
        self.catalog_url.trim_end_matches('/')
    }

    /// 创建安装与缓存目录
    pub fn ensure_directories(&self) -> AppResult<()> {
        fs::create_dir_all(self.install_dir())?;
        fs::create_dir_all(self.cache_dir())?;
        Ok(())
    }
}

/// 数据目录：`$JVT_HOME`，否则 `~/.jvt`
pub fn get_base_dir() -> AppResult<PathBuf> {
    if let Ok(base) = env::var(env_names::JVT_HOME) {
        if !base.trim().is_empty() {
            return Ok(expand_home(Path::new(&base)));
        }
    }

    let home_dir = dirs::home_dir().ok_or_else(|| AppError::Config {
        message: "无法获取用户主目录".to_string(),
    })?;
    Ok(home_dir.join(defaults::DEFAULT_BASE_DIR))
}

/// 展开开头的 `~`
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
