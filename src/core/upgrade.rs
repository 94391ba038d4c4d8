use crate::core::switcher::EnvironmentSwitcher;
use crate::environments::java::{ArchiveInstaller, SemanticVersion};
use crate::error::AppResult;
use crate::infrastructure::remote::{ArtifactFetcher, CatalogClient};
use serde::Serialize;
use tracing::{debug, info, warn};

/// 升级选项
#[derive(Debug, Clone, Copy, Default)]
pub struct UpgradeOptions {
    /// 只检查，不下载、不安装、不卸载
    pub dry_run: bool,
    /// 升级后保留旧版本目录
    pub keep_old: bool,
}

/// 单个主版本的升级结果（失败通过 `Err` 返回）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum UpgradeOutcome {
    Updated {
        from: String,
        to: String,
        /// 旧版本处于激活状态，已切换到新版本
        activated: bool,
        old_removed: bool,
        warnings: Vec<String>,
    },
    Available {
        from: String,
        to: String,
    },
    UpToDate {
        version: String,
    },
    NotInstalled,
}

/// 批量升级中单个主版本的结果
#[derive(Debug)]
pub struct BatchEntry {
    pub major: u32,
    pub result: AppResult<UpgradeOutcome>,
}

/// 批量升级报告
#[derive(Debug, Default)]
pub struct BatchReport {
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    fn count(&self, predicate: impl Fn(&UpgradeOutcome) -> bool) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.result.as_ref().map(&predicate).unwrap_or(false))
            .count()
    }

    pub fn updated_count(&self) -> usize {
        self.count(|o| matches!(o, UpgradeOutcome::Updated { .. }))
    }

    pub fn available_count(&self) -> usize {
        self.count(|o| matches!(o, UpgradeOutcome::Available { .. }))
    }

    pub fn up_to_date_count(&self) -> usize {
        self.count(|o| matches!(o, UpgradeOutcome::UpToDate { .. }))
    }

    pub fn error_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.result.is_err()).count()
    }
}

/// 升级编排：解析 → 下载 → 安装 → 切换 → 清理
pub struct UpgradeOrchestrator<'a> {
    installer: ArchiveInstaller,
    switcher: &'a EnvironmentSwitcher,
    catalog: &'a dyn CatalogClient,
    fetcher: &'a dyn ArtifactFetcher,
}

impl<'a> UpgradeOrchestrator<'a> {
    pub fn new(
        switcher: &'a EnvironmentSwitcher,
        catalog: &'a dyn CatalogClient,
        fetcher: &'a dyn ArtifactFetcher,
    ) -> Self {
        Self {
            installer: ArchiveInstaller::new(switcher.install_root()),
            switcher,
            catalog,
            fetcher,
        }
    }

    /// 已安装构建中版本号最大的一个
    fn newest_installed(&self, major: u32) -> AppResult<Option<(String, SemanticVersion)>> {
        let installed = self.installer.store().installed_by_major(major)?;
        Ok(installed
            .into_iter()
            .filter_map(|name| match SemanticVersion::parse(&name) {
                Ok(version) => Some((name, version)),
                Err(e) => {
                    debug!(name = name.as_str(), error = %e, "skipping during comparison");
                    None
                }
            })
            .max_by(|a, b| a.1.cmp(&b.1)))
    }

    /// 升级单个主版本
    pub async fn upgrade_major(
        &self,
        major: u32,
        options: UpgradeOptions,
    ) -> AppResult<UpgradeOutcome> {
        let Some((current, current_version)) = self.newest_installed(major)? else {
            return Ok(UpgradeOutcome::NotInstalled);
        };

        let latest = self.catalog.latest_for_major(major).await?;
        let latest_version = SemanticVersion::parse(&latest.version)?;

        if current_version >= latest_version {
            debug!(major, version = current.as_str(), "up to date");
            return Ok(UpgradeOutcome::UpToDate { version: current });
        }

        if options.dry_run {
            return Ok(UpgradeOutcome::Available {
                from: current,
                to: latest.version,
            });
        }

        let was_active = self.switcher.is_active(&current);
        info!(major, from = current.as_str(), to = latest.version.as_str(), was_active, "upgrading");

        let archive = self.fetcher.download_and_verify(&latest).await?;
        self.installer.install(&archive, &latest.version)?;

        let mut warnings = Vec::new();

        let mut activated = false;
        if was_active {
            match self.switcher.use_version(&latest.version, false) {
                Ok(report) => {
                    activated = true;
                    warnings.extend(report.warnings);
                }
                Err(e) => {
                    warn!(error = %e, "failed to activate upgraded version");
                    warnings.push(format!("无法切换到 {}: {e}", latest.version));
                }
            }
        }

        let mut old_removed = false;
        if !options.keep_old {
            match self.installer.uninstall(&current) {
                Ok(()) => old_removed = true,
                Err(e) => {
                    warn!(version = current.as_str(), error = %e, "failed to remove old version");
                    warnings.push(format!(
                        "删除旧版本 {current} 失败: {e}，可手动运行 'jvt uninstall {current}'"
                    ));
                }
            }
        }

        Ok(UpgradeOutcome::Updated {
            from: current,
            to: latest.version,
            activated,
            old_removed,
            warnings,
        })
    }

    /// 依次升级所有已安装的主版本，单个主版本失败不影响其他主版本
    pub async fn upgrade_all(&self, options: UpgradeOptions) -> AppResult<BatchReport> {
        let mut report = BatchReport::default();

        for major in self.installer.store().installed_majors()? {
            let result = self.upgrade_major(major, options).await;
            if let Err(e) = &result {
                warn!(major, error = %e, "upgrade failed");
            }
            report.entries.push(BatchEntry { major, result });
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::infrastructure::remote::{FetchedArtifact, VersionDescriptor};
    use crate::infrastructure::shell::{EnvBackend, EnvTarget, UserEnvReport};
    use async_trait::async_trait;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct NoopBackend;

    impl EnvBackend for NoopBackend {
        fn set_session_env(&self, _target: &EnvTarget) -> AppResult<()> {
            Ok(())
        }
        fn set_user_env(&self, _target: &EnvTarget) -> AppResult<UserEnvReport> {
            Ok(UserEnvReport::Persisted)
        }
        fn set_system_env(&self, _target: &EnvTarget) -> AppResult<()> {
            Ok(())
        }
        fn detect_shadowing(&self) -> AppResult<Vec<String>> {
            Ok(Vec::new())
        }
    }

    struct FixedCatalog {
        latest: VersionDescriptor,
    }

    #[async_trait]
    impl CatalogClient for FixedCatalog {
        async fn fetch_available_majors(&self) -> AppResult<Vec<u32>> {
            Ok(vec![self.latest.major])
        }

        async fn fetch_latest_for_major(&self, major: u32) -> AppResult<Vec<VersionDescriptor>> {
            if major == self.latest.major {
                Ok(vec![self.latest.clone()])
            } else {
                Err(AppError::catalog("offline"))
            }
        }
    }

    /// 把预先写好的 zip 当作下载结果
    struct LocalFetcher {
        archive: PathBuf,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ArtifactFetcher for LocalFetcher {
        async fn fetch(&self, _url: &str, _file_name: &str) -> AppResult<FetchedArtifact> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(FetchedArtifact {
                path: self.archive.clone(),
                from_cache: false,
            })
        }

        async fn verify_checksum(&self, _path: &Path, _expected: &str) -> AppResult<()> {
            Ok(())
        }
    }

    fn write_zip(path: &Path) {
        use std::io::Write;
        let mut writer = zip::ZipWriter::new(fs::File::create(path).unwrap());
        let options = zip::write::FileOptions::default();
        writer.add_directory("jdk-17.0.9+3/", options).unwrap();
        writer.start_file("jdk-17.0.9+3/release", options).unwrap();
        writer.write_all(b"JAVA_VERSION=\"17.0.9\"").unwrap();
        writer.finish().unwrap();
    }

    fn descriptor(version: &str, major: u32) -> VersionDescriptor {
        VersionDescriptor {
            version: version.to_string(),
            major,
            distribution: "Temurin".to_string(),
            os: "linux".to_string(),
            arch: "x64".to_string(),
            download_url: "https://example.com/jdk.zip".to_string(),
            checksum: String::new(),
            file_name: "jdk.zip".to_string(),
        }
    }

    struct Fixture {
        temp: TempDir,
        switcher: EnvironmentSwitcher,
        fetcher: LocalFetcher,
    }

    fn fixture(installed: &[&str]) -> Fixture {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("versions");
        for version in installed {
            fs::create_dir_all(root.join(version)).unwrap();
        }
        let archive = temp.path().join("jdk.zip");
        write_zip(&archive);

        Fixture {
            switcher: EnvironmentSwitcher::new(&root, Box::new(NoopBackend), false),
            fetcher: LocalFetcher {
                archive,
                calls: AtomicUsize::new(0),
            },
            temp,
        }
    }

    #[tokio::test]
    async fn test_not_installed() {
        let f = fixture(&["11.0.22+7"]);
        let catalog = FixedCatalog {
            latest: descriptor("17.0.9+3", 17),
        };
        let orchestrator = UpgradeOrchestrator::new(&f.switcher, &catalog, &f.fetcher);

        let outcome = orchestrator.upgrade_major(17, UpgradeOptions::default()).await.unwrap();
        assert_eq!(outcome, UpgradeOutcome::NotInstalled);
    }

    #[tokio::test]
    async fn test_up_to_date_picks_newest_installed() {
        let f = fixture(&["17.0.1+1", "17.0.9+3", "not-a-version"]);
        let catalog = FixedCatalog {
            latest: descriptor("17.0.9+3", 17),
        };
        let orchestrator = UpgradeOrchestrator::new(&f.switcher, &catalog, &f.fetcher);

        let outcome = orchestrator.upgrade_major(17, UpgradeOptions::default()).await.unwrap();
        assert_eq!(
            outcome,
            UpgradeOutcome::UpToDate {
                version: "17.0.9+3".to_string()
            }
        );
        assert_eq!(f.fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_catalog_error_propagates() {
        let f = fixture(&["11.0.22+7"]);
        let catalog = FixedCatalog {
            latest: descriptor("17.0.9+3", 17),
        };
        let orchestrator = UpgradeOrchestrator::new(&f.switcher, &catalog, &f.fetcher);

        let err = orchestrator.upgrade_major(11, UpgradeOptions::default()).await.unwrap_err();
        assert!(matches!(err, AppError::CatalogUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_inactive_upgrade_does_not_activate() {
        let f = fixture(&["17.0.1+1"]);
        let catalog = FixedCatalog {
            latest: descriptor("17.0.9+3", 17),
        };
        let orchestrator = UpgradeOrchestrator::new(&f.switcher, &catalog, &f.fetcher);

        let outcome = orchestrator.upgrade_major(17, UpgradeOptions::default()).await.unwrap();
        match outcome {
            UpgradeOutcome::Updated {
                activated,
                old_removed,
                ..
            } => {
                assert!(!activated);
                assert!(old_removed);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(f.temp.path().join("versions/17.0.9+3/release").is_file());
    }
}
