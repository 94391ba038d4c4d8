use crate::core::constants::download::PARTIAL_SUFFIX;
use crate::error::{AppError, AppResult};
use crate::infrastructure::config::{Config, DownloadSettings};
use crate::infrastructure::remote::catalog::VersionDescriptor;
use crate::infrastructure::remote::http_client::HttpClient;
use async_trait::async_trait;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::StatusCode;
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

/// 获取到的归档文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArtifact {
    pub path: PathBuf,
    /// 直接复用了缓存中的文件
    pub from_cache: bool,
}

/// 下载器接口
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// 下载到缓存目录；缓存中已有同名文件时直接返回
    async fn fetch(&self, url: &str, file_name: &str) -> AppResult<FetchedArtifact>;

    /// 校验 SHA-256
    async fn verify_checksum(&self, path: &Path, expected: &str) -> AppResult<()>;

    /// 下载并校验
    ///
    /// 缓存命中时不再重新计算哈希；新下载的文件校验失败会被删除，避免下次命中损坏的缓存。
    async fn download_and_verify(&self, descriptor: &VersionDescriptor) -> AppResult<PathBuf> {
        let fetched = self
            .fetch(&descriptor.download_url, &descriptor.file_name)
            .await?;

        if fetched.from_cache || descriptor.checksum.is_empty() {
            return Ok(fetched.path);
        }

        if let Err(e) = self.verify_checksum(&fetched.path, &descriptor.checksum).await {
            if let Err(remove) = tokio::fs::remove_file(&fetched.path).await {
                warn!(path = %fetched.path.display(), error = %remove, "failed to remove corrupt download");
            }
            return Err(e);
        }

        Ok(fetched.path)
    }
}

/// 错误类型：用于区分临时错误和永久错误
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorType {
    /// 临时错误（网络问题、超时等，可以重试）
    Transient(String),
    /// 永久错误（404、403等，不应重试）
    Permanent(String),
}

/// 判断错误类型
fn classify_status(status: StatusCode) -> ErrorType {
    match status.as_u16() {
        401 | 403 | 404 => ErrorType::Permanent(format!("资源不存在或无权访问 (HTTP {status})")),
        500..=599 => ErrorType::Transient(format!("服务器错误 (HTTP {status})")),
        _ => ErrorType::Transient(format!("HTTP {status}")),
    }
}

fn classify_transport(error: &reqwest::Error) -> ErrorType {
    if error.is_timeout() {
        ErrorType::Transient(format!("连接超时: {error}"))
    } else if error.is_connect() {
        ErrorType::Transient(format!("连接失败: {error}"))
    } else if error.is_builder() {
        ErrorType::Permanent(format!("无效的下载地址: {error}"))
    } else {
        ErrorType::Transient(error.to_string())
    }
}

/// 下载选项
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub retry_count: u32,
    pub retry_delay_ms: u64,
    pub show_progress: bool,
}

impl DownloadOptions {
    pub fn from_settings(settings: &DownloadSettings) -> Self {
        Self {
            retry_count: settings.retry_count,
            retry_delay_ms: settings.retry_delay_ms,
            show_progress: true,
        }
    }

    /// 指数退避：delay * 2^(attempt-1)，最大不超过 60 秒
    fn calculate_retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.retry_delay_ms.saturating_mul(factor).min(60_000))
    }
}

/// 带缓存的归档下载器
pub struct Downloader {
    http: HttpClient,
    cache_dir: PathBuf,
    options: DownloadOptions,
}

impl Downloader {
    pub fn new(http: HttpClient, cache_dir: impl Into<PathBuf>, options: DownloadOptions) -> Self {
        Self {
            http,
            cache_dir: cache_dir.into(),
            options,
        }
    }

    pub fn from_config(config: &Config) -> AppResult<Self> {
        Ok(Self::new(
            HttpClient::new(&config.download)?,
            config.cache_dir(),
            DownloadOptions::from_settings(&config.download),
        ))
    }

    /// 缓存中的目标路径，文件名必须是单个普通路径分量
    pub fn cache_path(&self, file_name: &str) -> AppResult<PathBuf> {
        let mut components = Path::new(file_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.cache_dir.join(file_name)),
            _ => Err(AppError::download(format!("非法的文件名: {file_name}"))),
        }
    }

    async fn fetch_once(&self, url: &str, dest: &Path) -> Result<(), ErrorType> {
        let response = self
            .http
            .get(url)
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        let total_size = response.content_length().unwrap_or(0);
        let progress = self.progress_bar(total_size);

        let temp_path = partial_path(dest);
        let mut file = tokio::fs::File::create(&temp_path)
            .await
            .map_err(|e| ErrorType::Permanent(format!("创建文件失败: {e}")))?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| classify_transport(&e))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| ErrorType::Permanent(format!("写入文件失败: {e}")))?;
            if let Some(pb) = &progress {
                pb.inc(chunk.len() as u64);
            }
        }

        file.flush()
            .await
            .map_err(|e| ErrorType::Permanent(format!("刷新文件失败: {e}")))?;
        drop(file);

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        tokio::fs::rename(&temp_path, dest)
            .await
            .map_err(|e| ErrorType::Permanent(format!("重命名文件失败: {e}")))
    }

    fn progress_bar(&self, total_size: u64) -> Option<ProgressBar> {
        if !self.options.show_progress {
            return None;
        }

        let pb = ProgressBar::new(total_size);
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta}) {percent}%",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }
        Some(pb)
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

#[async_trait]
impl ArtifactFetcher for Downloader {
    async fn fetch(&self, url: &str, file_name: &str) -> AppResult<FetchedArtifact> {
        tokio::fs::create_dir_all(&self.cache_dir).await?;

        let dest = self.cache_path(file_name)?;
        if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            info!(file = file_name, "using cached archive");
            return Ok(FetchedArtifact {
                path: dest,
                from_cache: true,
            });
        }

        let mut attempts = 0;
        loop {
            attempts += 1;
            let error = match self.fetch_once(url, &dest).await {
                Ok(()) => {
                    debug!(file = file_name, attempts, "download complete");
                    return Ok(FetchedArtifact {
                        path: dest,
                        from_cache: false,
                    });
                }
                Err(error) => error,
            };

            let _ = tokio::fs::remove_file(partial_path(&dest)).await;

            let message = match error {
                ErrorType::Permanent(message) => {
                    return Err(AppError::download(format!("{message} (URL: {url})")));
                }
                ErrorType::Transient(message) => message,
            };

            if attempts > self.options.retry_count {
                return Err(AppError::download(format!(
                    "已重试 {} 次: {message} (URL: {url})",
                    self.options.retry_count
                )));
            }

            let delay = self.options.calculate_retry_delay(attempts);
            warn!(
                attempt = attempts,
                max = self.options.retry_count + 1,
                delay_ms = delay.as_millis() as u64,
                error = message.as_str(),
                "download failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn verify_checksum(&self, path: &Path, expected: &str) -> AppResult<()> {
        verify_file_sha256(path, expected).await
    }
}

/// 流式计算文件的 SHA-256 并比较（不区分大小写）
pub async fn verify_file_sha256(path: &Path, expected: &str) -> AppResult<()> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    let actual = hex::encode(hasher.finalize());
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(AppError::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}
