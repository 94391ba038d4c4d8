use crate::environments::java::version::SemanticVersion;
use crate::error::{AppError, AppResult};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 已安装版本仓库
///
/// 安装根目录下的每个子目录对应一个已安装版本，目录名即版本字符串。
/// 不维护任何内存索引，每次查询都直接读取文件系统。
#[derive(Debug, Clone)]
pub struct InstalledVersionStore {
    install_dir: PathBuf,
}

impl InstalledVersionStore {
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
        }
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// 版本对应的 JAVA_HOME 目录
    pub fn version_dir(&self, version: &str) -> PathBuf {
        self.install_dir.join(version)
    }

    /// 列出已安装版本（文件系统枚举顺序，不排序）
    ///
    /// 安装根目录尚不存在时返回空列表。
    pub fn list_installed(&self) -> AppResult<Vec<String>> {
        let entries = match fs::read_dir(&self.install_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                versions.push(entry.file_name().to_string_lossy().into_owned());
            }
        }

        Ok(versions)
    }

    pub fn is_installed(&self, version: &str) -> bool {
        self.version_dir(version).exists()
    }

    /// 按 `use` / `uninstall` 的规则解析用户输入
    pub fn resolve(&self, query: &str) -> AppResult<String> {
        let installed = self.list_installed()?;
        match match_installed(&installed, query) {
            Some(version) => {
                debug!(query, version, "resolved installed version");
                Ok(version.to_string())
            }
            None => Err(AppError::not_installed(query)),
        }
    }

    /// 按主版本号结构化匹配，无法解析的目录名会被跳过
    pub fn installed_by_major(&self, major: u32) -> AppResult<Vec<String>> {
        Ok(self
            .list_installed()?
            .into_iter()
            .filter(|name| match SemanticVersion::parse(name) {
                Ok(version) => version.major == major,
                Err(_) => {
                    debug!(name = name.as_str(), "skipping unparsable install directory");
                    false
                }
            })
            .collect())
    }

    /// 至少安装了一个构建的主版本号集合（升序）
    pub fn installed_majors(&self) -> AppResult<Vec<u32>> {
        let majors: BTreeSet<u32> = self
            .list_installed()?
            .iter()
            .filter_map(|name| SemanticVersion::parse(name).ok())
            .map(|version| version.major)
            .collect();
        Ok(majors.into_iter().collect())
    }
}

/// 在已安装列表中匹配查询字符串
///
/// 纯整数查询按字符前缀匹配列表中的第一个版本（`"1"` 也会匹配 `17.0.1+12`），
/// 其他查询只接受完全相同的目录名。
pub fn match_installed<'a>(installed: &'a [String], query: &str) -> Option<&'a str> {
    let is_integer = query.parse::<i64>().is_ok();
    installed
        .iter()
        .find(|candidate| {
            if is_integer {
                candidate.starts_with(query)
            } else {
                candidate.as_str() == query
            }
        })
        .map(String::as_str)
}
