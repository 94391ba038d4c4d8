use crate::core::constants::defaults::DISTRIBUTION;
use crate::error::{AppError, AppResult};
use crate::infrastructure::config::Config;
use crate::infrastructure::remote::http_client::HttpClient;
use crate::infrastructure::remote::platform::Platform;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// 远程可下载的版本描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionDescriptor {
    pub version: String,
    pub major: u32,
    pub distribution: String,
    pub os: String,
    pub arch: String,
    pub download_url: String,
    pub checksum: String,
    pub file_name: String,
}

/// 远程版本目录
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// 可用的主版本号
    async fn fetch_available_majors(&self) -> AppResult<Vec<u32>>;

    /// 某个主版本的最新构建（已按当前平台与镜像类型过滤）
    async fn fetch_latest_for_major(&self, major: u32) -> AppResult<Vec<VersionDescriptor>>;

    /// 主版本的最新描述，没有匹配当前平台的构建时报错
    async fn latest_for_major(&self, major: u32) -> AppResult<VersionDescriptor> {
        self.fetch_latest_for_major(major)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::catalog(format!("没有找到 Java {major} 的可用版本")))
    }

    /// 所有主版本的最新描述，按主版本号降序
    ///
    /// 单个主版本获取失败只记录警告并跳过。
    async fn fetch_all(&self) -> AppResult<Vec<VersionDescriptor>> {
        let mut descriptors = Vec::new();
        for major in self.fetch_available_majors().await? {
            match self.fetch_latest_for_major(major).await {
                Ok(found) => descriptors.extend(found),
                Err(e) => warn!(major, error = %e, "skipping major version"),
            }
        }

        descriptors.sort_by(|a, b| b.major.cmp(&a.major));
        Ok(descriptors)
    }
}

/// 安装时的匹配规则：整数按主版本，其他先精确匹配再前缀匹配
pub fn find_version<'a>(
    descriptors: &'a [VersionDescriptor],
    query: &str,
) -> Option<&'a VersionDescriptor> {
    if let Ok(major) = query.parse::<u32>() {
        return descriptors.iter().find(|d| d.major == major);
    }

    descriptors
        .iter()
        .find(|d| d.version == query)
        .or_else(|| descriptors.iter().find(|d| d.version.starts_with(query)))
}

#[derive(Debug, Deserialize)]
struct AvailableReleases {
    available_releases: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct AdoptiumRelease {
    binary: AdoptiumBinary,
    version: AdoptiumVersion,
}

#[derive(Debug, Deserialize)]
struct AdoptiumBinary {
    os: String,
    architecture: String,
    image_type: String,
    package: AdoptiumPackage,
}

#[derive(Debug, Deserialize)]
struct AdoptiumPackage {
    name: String,
    link: String,
    #[serde(default)]
    checksum: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdoptiumVersion {
    major: u32,
    #[serde(default)]
    minor: u32,
    #[serde(default)]
    security: u32,
    #[serde(default)]
    build: u32,
}

/// Adoptium API 客户端
pub struct AdoptiumCatalog {
    http: HttpClient,
    base_url: String,
    platform: Platform,
    image_type: String,
}

impl AdoptiumCatalog {
    pub fn new(
        http: HttpClient,
        base_url: impl Into<String>,
        platform: Platform,
        image_type: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            platform,
            image_type: image_type.into(),
        }
    }

    pub fn from_config(config: &Config) -> AppResult<Self> {
        Ok(Self::new(
            HttpClient::new(&config.download)?,
            config.catalog_base_url(),
            Platform::current(),
            config.image_type.clone(),
        ))
    }
}

#[async_trait]
impl CatalogClient for AdoptiumCatalog {
    async fn fetch_available_majors(&self) -> AppResult<Vec<u32>> {
        let url = format!("{}/info/available_releases", self.base_url);
        let releases: AvailableReleases = self.http.get_json(&url).await?;
        Ok(releases.available_releases)
    }

    async fn fetch_latest_for_major(&self, major: u32) -> AppResult<Vec<VersionDescriptor>> {
        let url = format!("{}/assets/latest/{major}/hotspot", self.base_url);
        let releases: Vec<AdoptiumRelease> = self.http.get_json(&url).await?;
        let descriptors = descriptors_for_platform(releases, &self.platform, &self.image_type);
        debug!(major, count = descriptors.len(), platform = %self.platform, "catalog entries");
        Ok(descriptors)
    }
}

fn descriptors_for_platform(
    releases: Vec<AdoptiumRelease>,
    platform: &Platform,
    image_type: &str,
) -> Vec<VersionDescriptor> {
    releases
        .into_iter()
        .filter(|r| {
            platform.matches(&r.binary.os, &r.binary.architecture) && r.binary.image_type == image_type
        })
        .map(|r| VersionDescriptor {
            version: format!(
                "{}.{}.{}+{}",
                r.version.major, r.version.minor, r.version.security, r.version.build
            ),
            major: r.version.major,
            distribution: DISTRIBUTION.to_string(),
            os: r.binary.os,
            arch: r.binary.architecture,
            download_url: r.binary.package.link,
            checksum: r.binary.package.checksum.unwrap_or_default(),
            file_name: r.binary.package.name,
        })
        .collect()
}
