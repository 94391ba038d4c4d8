use crate::environments::java::store::InstalledVersionStore;
use crate::error::{AppError, AppResult};
use flate2::read::GzDecoder;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tar::EntryType;
use tracing::{debug, info, warn};

/// 支持的压缩包格式（按文件名后缀区分大小写判断）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    pub fn detect(archive_path: &Path) -> Option<Self> {
        let name = archive_path.to_string_lossy();
        if name.ends_with(".zip") {
            Some(ArchiveFormat::Zip)
        } else if name.ends_with(".tar.gz") {
            Some(ArchiveFormat::TarGz)
        } else {
            None
        }
    }
}

/// Java 压缩包安装器
///
/// 每个版本解压到安装根目录下独立的目录中。安装要么完整成功，
/// 要么版本目录被整体删除，半成品永远不会被视为“已安装”。
#[derive(Debug, Clone)]
pub struct ArchiveInstaller {
    store: InstalledVersionStore,
}

impl ArchiveInstaller {
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            store: InstalledVersionStore::new(install_dir),
        }
    }

    pub fn store(&self) -> &InstalledVersionStore {
        &self.store
    }

    /// 解压压缩包到 `<install_dir>/<version>`，返回版本目录
    pub fn install(&self, archive_path: &Path, version: &str) -> AppResult<PathBuf> {
        fs::create_dir_all(self.store.install_dir())?;

        let version_dir = self.store.version_dir(version);
        if version_dir.exists() {
            return Err(AppError::already_installed(version));
        }

        fs::create_dir(&version_dir)?;
        info!(version, dest = %version_dir.display(), "extracting archive");

        let result = match ArchiveFormat::detect(archive_path) {
            Some(ArchiveFormat::Zip) => extract_zip(archive_path, &version_dir),
            Some(ArchiveFormat::TarGz) => extract_tar_gz(archive_path, &version_dir),
            None => Err(AppError::UnsupportedFormat {
                path: archive_path.display().to_string(),
            }),
        };

        if let Err(e) = result {
            if let Err(cleanup) = fs::remove_dir_all(&version_dir) {
                warn!(
                    dest = %version_dir.display(),
                    error = %cleanup,
                    "failed to remove partially extracted version"
                );
            }
            return Err(e);
        }

        Ok(version_dir)
    }

    /// 删除已安装版本
    pub fn uninstall(&self, version: &str) -> AppResult<()> {
        let version_dir = self.store.version_dir(version);
        if !version_dir.exists() {
            return Err(AppError::not_installed(version));
        }

        fs::remove_dir_all(&version_dir)?;
        info!(version, "uninstalled");
        Ok(())
    }
}

/// 压缩包条目到目标路径的映射
///
/// 以第一个条目的顶层目录作为根目录剥离掉（发行版通常包一层 `jdk-17.0.1+12/`）。
struct EntryMapper<'a> {
    dest: &'a Path,
    root: Option<String>,
}

impl<'a> EntryMapper<'a> {
    fn new(dest: &'a Path) -> Self {
        Self { dest, root: None }
    }

    /// 返回 `None` 表示跳过该条目（根目录本身）
    fn map(&mut self, raw_name: &str) -> AppResult<Option<PathBuf>> {
        let root = self
            .root
            .get_or_insert_with(|| raw_name.split('/').next().unwrap_or_default().to_string());

        let mut relative = raw_name;
        if !root.is_empty() {
            if let Some(stripped) = raw_name.strip_prefix(root.as_str()) {
                if stripped.is_empty() {
                    relative = stripped;
                } else if let Some(rest) = stripped.strip_prefix('/') {
                    relative = rest;
                }
            }
        }

        if relative.is_empty() {
            return Ok(None);
        }

        resolve_inside(self.dest, Path::new(relative), raw_name).map(Some)
    }
}

/// 将相对路径按词法规则拼接到 `dest` 下，结果必须严格位于 `dest` 之内
fn resolve_inside(dest: &Path, relative: &Path, raw_name: &str) -> AppResult<PathBuf> {
    let mut resolved = dest.to_path_buf();
    let mut depth = 0usize;

    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir if depth > 0 => {
                resolved.pop();
                depth -= 1;
            }
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(illegal_path(raw_name));
            }
        }
    }

    if depth == 0 {
        return Err(illegal_path(raw_name));
    }

    Ok(resolved)
}

fn illegal_path(raw_name: &str) -> AppError {
    AppError::extraction(format!("非法的条目路径（越出目标目录）: {raw_name}"))
}

fn io_failure(context: &str, path: &Path, err: io::Error) -> AppError {
    AppError::extraction(format!("{context} {}: {err}", path.display()))
}

fn create_parent(path: &Path) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_failure("创建父目录失败", parent, e))?;
    }
    Ok(())
}

fn write_file(path: &Path, reader: &mut impl io::Read, mode: Option<u32>) -> AppResult<()> {
    create_parent(path)?;

    let mut out = fs::File::create(path).map_err(|e| io_failure("创建文件失败", path, e))?;
    io::copy(reader, &mut out).map_err(|e| io_failure("写入文件失败", path, e))?;
    drop(out);

    apply_mode(path, mode)
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: Option<u32>) -> AppResult<()> {
    use std::os::unix::fs::PermissionsExt;

    if let Some(mode) = mode.map(|m| m & 0o7777).filter(|m| *m != 0) {
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|e| io_failure("设置权限失败", path, e))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: Option<u32>) -> AppResult<()> {
    Ok(())
}

fn extract_zip(archive_path: &Path, dest: &Path) -> AppResult<()> {
    let file = fs::File::open(archive_path)
        .map_err(|e| io_failure("打开 ZIP 文件失败", archive_path, e))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| AppError::extraction(format!("读取 ZIP 文件失败: {e}")))?;

    let mut mapper = EntryMapper::new(dest);
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| AppError::extraction(format!("读取 ZIP 文件项失败: {e}")))?;

        let name = entry.name().to_string();
        let Some(target) = mapper.map(&name)? else {
            continue;
        };

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| io_failure("创建目录失败", &target, e))?;
        } else {
            let mode = entry.unix_mode();
            write_file(&target, &mut entry, mode)?;
        }
    }

    debug!(entries = archive.len(), "zip extracted");
    Ok(())
}

fn extract_tar_gz(archive_path: &Path, dest: &Path) -> AppResult<()> {
    let file = fs::File::open(archive_path)
        .map_err(|e| io_failure("打开 TAR.GZ 文件失败", archive_path, e))?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));

    let entries = archive
        .entries()
        .map_err(|e| AppError::extraction(format!("读取 TAR 文件失败: {e}")))?;

    let mut mapper = EntryMapper::new(dest);
    for entry in entries {
        let mut entry =
            entry.map_err(|e| AppError::extraction(format!("读取 TAR 文件项失败: {e}")))?;

        let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let Some(target) = mapper.map(&name)? else {
            continue;
        };

        let entry_type = entry.header().entry_type();
        match entry_type {
            EntryType::Directory => {
                fs::create_dir_all(&target).map_err(|e| io_failure("创建目录失败", &target, e))?;
            }
            EntryType::Regular | EntryType::Continuous => {
                let mode = entry.header().mode().ok();
                write_file(&target, &mut entry, mode)?;
            }
            EntryType::Symlink => {
                let link = entry
                    .link_name_bytes()
                    .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                    .unwrap_or_default();
                create_symlink(dest, &target, &link, &name)?;
            }
            other => {
                debug!(entry = name.as_str(), kind = ?other, "skipping unsupported tar entry");
            }
        }
    }

    Ok(())
}

/// 符号链接的目标同样不得指向目标目录之外
#[cfg(unix)]
fn create_symlink(dest: &Path, target: &Path, link: &str, raw_name: &str) -> AppResult<()> {
    let link_path = Path::new(link);
    if link.is_empty() || link_path.is_absolute() {
        return Err(illegal_path(raw_name));
    }

    let parent_rel = target
        .parent()
        .and_then(|p| p.strip_prefix(dest).ok())
        .unwrap_or_else(|| Path::new(""));
    resolve_inside(dest, &parent_rel.join(link_path), raw_name)?;

    create_parent(target)?;
    std::os::unix::fs::symlink(link_path, target)
        .map_err(|e| io_failure("创建符号链接失败", target, e))
}

#[cfg(not(unix))]
fn create_symlink(_dest: &Path, target: &Path, _link: &str, raw_name: &str) -> AppResult<()> {
    debug!(entry = raw_name, target = %target.display(), "symlinks are not extracted on this platform");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    enum Item<'a> {
        Dir(&'a str),
        File(&'a str, &'a [u8], u32),
    }

    fn build_zip(path: &Path, items: &[Item]) {
        let file = fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for item in items {
            match item {
                Item::Dir(name) => {
                    let options = zip::write::FileOptions::default();
                    writer.add_directory(*name, options).unwrap();
                }
                Item::File(name, data, mode) => {
                    let options = zip::write::FileOptions::default().unix_permissions(*mode);
                    writer.start_file(*name, options).unwrap();
                    writer.write_all(data).unwrap();
                }
            }
        }
        writer.finish().unwrap();
    }

    /// 直接写入原始条目名，绕过 tar crate 对 `..` 的校验
    fn raw_header(name: &str, entry_type: EntryType, size: u64, mode: u32) -> tar::Header {
        let mut header = tar::Header::new_gnu();
        {
            let bytes = header.as_mut_bytes();
            bytes[..100].fill(0);
            bytes[..name.len()].copy_from_slice(name.as_bytes());
        }
        header.set_entry_type(entry_type);
        header.set_size(size);
        header.set_mode(mode);
        header.set_cksum();
        header
    }

    fn build_tar_gz(path: &Path, items: &[Item]) {
        let file = fs::File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for item in items {
            match item {
                Item::Dir(name) => {
                    let header = raw_header(name, EntryType::Directory, 0, 0o755);
                    builder.append(&header, io::empty()).unwrap();
                }
                Item::File(name, data, mode) => {
                    let header = raw_header(name, EntryType::Regular, data.len() as u64, *mode);
                    builder.append(&header, *data).unwrap();
                }
            }
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    fn jdk_layout() -> Vec<Item<'static>> {
        vec![
            Item::Dir("jdk-17.0.1+12/"),
            Item::Dir("jdk-17.0.1+12/bin/"),
            Item::File("jdk-17.0.1+12/bin/java", b"#!/bin/sh\necho java\n", 0o755),
            Item::File("jdk-17.0.1+12/release", b"JAVA_VERSION=\"17.0.1\"\n", 0o644),
            Item::File("jdk-17.0.1+12/lib/modules", b"modules", 0o644),
        ]
    }

    fn children(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_detect_format_is_case_sensitive() {
        assert_eq!(ArchiveFormat::detect(Path::new("a/jdk.zip")), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::detect(Path::new("jdk.tar.gz")), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::detect(Path::new("jdk.ZIP")), None);
        assert_eq!(ArchiveFormat::detect(Path::new("jdk.tgz")), None);
    }

    #[test]
    fn test_zip_install_strips_wrapper_directory() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("jdk.zip");
        build_zip(&archive, &jdk_layout());

        let installer = ArchiveInstaller::new(temp.path().join("versions"));
        let home = installer.install(&archive, "17.0.1+12").unwrap();

        assert_eq!(children(&home), ["bin", "lib", "release"]);
        assert_eq!(
            fs::read_to_string(home.join("release")).unwrap(),
            "JAVA_VERSION=\"17.0.1\"\n"
        );
        assert!(installer.store().is_installed("17.0.1+12"));
    }

    #[test]
    fn test_tar_gz_install_strips_wrapper_directory() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("jdk.tar.gz");
        build_tar_gz(&archive, &jdk_layout());

        let installer = ArchiveInstaller::new(temp.path().join("versions"));
        let home = installer.install(&archive, "17.0.1+12").unwrap();

        assert_eq!(children(&home), ["bin", "lib", "release"]);
        assert_eq!(fs::read(home.join("lib/modules")).unwrap(), b"modules");
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions_are_preserved() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let installer = ArchiveInstaller::new(temp.path().join("versions"));

        let tgz = temp.path().join("jdk.tar.gz");
        build_tar_gz(&tgz, &jdk_layout());
        let home = installer.install(&tgz, "17.0.1+12").unwrap();
        let mode = fs::metadata(home.join("bin/java")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);

        let zip = temp.path().join("jdk.zip");
        build_zip(&zip, &jdk_layout());
        let home = installer.install(&zip, "17.0.1+13").unwrap();
        let mode = fs::metadata(home.join("bin/java")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_already_installed_leaves_directory_untouched() {
        let temp = TempDir::new().unwrap();
        let versions = temp.path().join("versions");
        let existing = versions.join("17.0.1+12");
        fs::create_dir_all(&existing).unwrap();
        fs::write(existing.join("marker"), "keep").unwrap();

        let archive = temp.path().join("jdk.zip");
        build_zip(&archive, &jdk_layout());

        let err = ArchiveInstaller::new(&versions)
            .install(&archive, "17.0.1+12")
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyInstalled { .. }));
        assert_eq!(children(&existing), ["marker"]);
        assert_eq!(fs::read_to_string(existing.join("marker")).unwrap(), "keep");
    }

    #[test]
    fn test_unsupported_format_removes_version_dir() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("jdk.msi");
        fs::write(&archive, b"not an archive").unwrap();

        let installer = ArchiveInstaller::new(temp.path().join("versions"));
        let err = installer.install(&archive, "17.0.1+12").unwrap_err();
        assert!(matches!(err, AppError::UnsupportedFormat { .. }));
        assert!(!installer.store().is_installed("17.0.1+12"));
    }

    #[test]
    fn test_zip_path_traversal_is_rejected() {
        let temp = TempDir::new().unwrap();
        let versions = temp.path().join("root").join("versions");
        let archive = temp.path().join("evil.zip");
        build_zip(
            &archive,
            &[
                Item::Dir("jdk-17.0.1+12/"),
                Item::File("jdk-17.0.1+12/release", b"ok", 0o644),
                Item::File("../../evil", b"pwned", 0o644),
            ],
        );

        let installer = ArchiveInstaller::new(&versions);
        let err = installer.install(&archive, "17.0.1+12").unwrap_err();
        assert!(matches!(err, AppError::Extraction { .. }));
        assert!(!installer.store().is_installed("17.0.1+12"));
        assert!(!temp.path().join("evil").exists());
        assert!(!temp.path().join("root").join("evil").exists());
    }

    #[test]
    fn test_tar_path_traversal_as_first_entry_is_rejected() {
        let temp = TempDir::new().unwrap();
        let versions = temp.path().join("root").join("versions");
        let archive = temp.path().join("evil.tar.gz");
        build_tar_gz(&archive, &[Item::File("../../evil", b"pwned", 0o644)]);

        let installer = ArchiveInstaller::new(&versions);
        let err = installer.install(&archive, "17.0.1+12").unwrap_err();
        assert!(matches!(err, AppError::Extraction { .. }));
        assert!(!versions.join("17.0.1+12").exists());
        assert!(!temp.path().join("evil").exists());
        assert!(!temp.path().join("root").join("evil").exists());
    }

    #[test]
    fn test_mid_extraction_failure_rolls_back() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("broken.tar.gz");
        // `bin` 先作为普通文件写出，随后的 `bin/java` 无法创建父目录
        build_tar_gz(
            &archive,
            &[
                Item::Dir("jdk-17.0.1+12/"),
                Item::File("jdk-17.0.1+12/release", b"ok", 0o644),
                Item::File("jdk-17.0.1+12/bin", b"not a directory", 0o644),
                Item::File("jdk-17.0.1+12/bin/java", b"java", 0o755),
            ],
        );

        let installer = ArchiveInstaller::new(temp.path().join("versions"));
        let err = installer.install(&archive, "17.0.1+12").unwrap_err();
        assert!(matches!(err, AppError::Extraction { .. }));
        assert!(!installer.store().is_installed("17.0.1+12"));
        assert!(!temp.path().join("versions").join("17.0.1+12").exists());
    }

    #[test]
    fn test_corrupt_archive_rolls_back() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("corrupt.zip");
        fs::write(&archive, b"PK\x03\x04 definitely not a zip").unwrap();

        let installer = ArchiveInstaller::new(temp.path().join("versions"));
        assert!(installer.install(&archive, "21.0.2+13").is_err());
        assert!(!installer.store().is_installed("21.0.2+13"));
    }

    #[test]
    fn test_uninstall() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("jdk.zip");
        build_zip(&archive, &jdk_layout());

        let installer = ArchiveInstaller::new(temp.path().join("versions"));
        installer.install(&archive, "17.0.1+12").unwrap();
        installer.uninstall("17.0.1+12").unwrap();
        assert!(!installer.store().is_installed("17.0.1+12"));

        let err = installer.uninstall("17.0.1+12").unwrap_err();
        assert!(matches!(err, AppError::NotInstalled { .. }));
    }

    #[test]
    fn test_resolve_inside() {
        let dest = Path::new("/opt/jvt/versions/17");
        assert_eq!(
            resolve_inside(dest, Path::new("bin/java"), "bin/java").unwrap(),
            dest.join("bin/java")
        );
        assert_eq!(
            resolve_inside(dest, Path::new("lib/../bin/./java"), "x").unwrap(),
            dest.join("bin/java")
        );
        assert!(resolve_inside(dest, Path::new("../17-evil/x"), "x").is_err());
        assert!(resolve_inside(dest, Path::new("bin/.."), "x").is_err());
        assert!(resolve_inside(dest, Path::new("/etc/passwd"), "x").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_escaping_symlink_is_rejected() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("link.tar.gz");
        let file = fs::File::create(&archive).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        builder
            .append(&raw_header("jdk/", EntryType::Directory, 0, 0o755), io::empty())
            .unwrap();
        let mut link = raw_header("jdk/escape", EntryType::Symlink, 0, 0o777);
        link.set_link_name("../../../etc").unwrap();
        link.set_cksum();
        builder.append(&link, io::empty()).unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        let installer = ArchiveInstaller::new(temp.path().join("versions"));
        let err = installer.install(&archive, "17").unwrap_err();
        assert!(matches!(err, AppError::Extraction { .. }));
        assert!(!installer.store().is_installed("17"));
    }
}
