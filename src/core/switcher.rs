use crate::core::constants::env as env_names;
use crate::environments::java::InstalledVersionStore;
use crate::error::{AppError, AppResult};
use crate::infrastructure::config::Config;
use crate::infrastructure::shell::{
    EnvBackend, EnvTarget, UnixEnvBackend, UserEnvReport, WindowsEnvBackend,
};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 一次 `use` 的执行结果
#[derive(Debug)]
pub struct SwitchReport {
    pub version: String,
    pub java_home: PathBuf,
    pub user: UserEnvReport,
    /// 是否成功写入了系统级作用域
    pub system_applied: bool,
    /// 被降级为警告的失败（系统级、当前会话）
    pub warnings: Vec<String>,
    /// 系统级 PATH 中可能遮蔽受管版本的条目
    pub shadowing: Vec<String>,
}

/// 环境切换器
///
/// 在三个作用域上设置 JAVA_HOME 并把 bin 目录放到 PATH 最前：
/// 用户级（失败即报错）、系统级（失败只警告）、当前进程（失败只警告）。
pub struct EnvironmentSwitcher {
    install_root: PathBuf,
    backend: Box<dyn EnvBackend>,
    /// 不加 `--system` 时也尝试写入系统级作用域
    system_by_default: bool,
}

impl EnvironmentSwitcher {
    pub fn new(
        install_root: impl Into<PathBuf>,
        backend: Box<dyn EnvBackend>,
        system_by_default: bool,
    ) -> Self {
        Self {
            install_root: install_root.into(),
            backend,
            system_by_default,
        }
    }

    /// 按编译目标选择平台实现
    pub fn for_current_platform(config: &Config) -> AppResult<Self> {
        if cfg!(windows) {
            Ok(Self::new(config.install_dir(), Box::new(WindowsEnvBackend), true))
        } else {
            let backend = UnixEnvBackend::from_config(config)?;
            Ok(Self::new(config.install_dir(), Box::new(backend), false))
        }
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    /// 激活已安装的版本
    ///
    /// `version` 必须是已安装目录名（由调用方先行解析）。
    pub fn use_version(&self, version: &str, system: bool) -> AppResult<SwitchReport> {
        let store = InstalledVersionStore::new(&self.install_root);
        if !store.is_installed(version) {
            return Err(AppError::not_installed(version));
        }

        let target = EnvTarget::new(&self.install_root, version);
        let mut warnings = Vec::new();

        let user = self.backend.set_user_env(&target)?;

        let shadowing = match self.backend.detect_shadowing() {
            Ok(entries) => entries,
            Err(e) => {
                debug!(error = %e, "shadowing detection failed");
                Vec::new()
            }
        };

        let mut system_applied = false;
        if system || self.system_by_default {
            match self.backend.set_system_env(&target) {
                Ok(()) => system_applied = true,
                Err(e) => {
                    warn!(error = %e, "system environment not updated");
                    warnings.push(system_scope_warning(&e));
                }
            }
        }

        if let Err(e) = self.backend.set_session_env(&target) {
            warn!(error = %e, "session environment not updated");
            warnings.push(format!("当前会话环境变量未更新: {e}"));
        }

        Ok(SwitchReport {
            version: version.to_string(),
            java_home: target.java_home,
            user,
            system_applied,
            warnings,
            shadowing,
        })
    }

    /// 当前激活的版本（从 JAVA_HOME 推导）
    pub fn get_current_version(&self) -> AppResult<String> {
        let java_home = env::var(env_names::JAVA_HOME).ok();
        current_version_from(java_home.as_deref(), &self.install_root)
    }

    /// 任何查询失败都视为未激活
    pub fn is_active(&self, version: &str) -> bool {
        self.get_current_version()
            .map(|current| current == version)
            .unwrap_or(false)
    }
}

fn system_scope_warning(error: &AppError) -> String {
    if error.is_permission_denied() {
        "系统级环境变量未更新: 权限不足，请以管理员身份（或 sudo）重新运行 'jvt use --system'"
            .to_string()
    } else {
        format!("系统级环境变量未更新: {error}")
    }
}

/// 由 JAVA_HOME 的值推导受管版本
pub fn current_version_from(java_home: Option<&str>, install_root: &Path) -> AppResult<String> {
    let java_home = match java_home {
        Some(value) if !value.is_empty() => value,
        _ => return Err(AppError::NotSet),
    };

    let path = Path::new(java_home);
    let not_managed = || AppError::NotManaged {
        java_home: java_home.to_string(),
    };

    match path.strip_prefix(install_root) {
        Ok(rest) if rest.components().next().is_some() => path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(not_managed),
        _ => Err(not_managed()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// 记录调用顺序的后端
    #[derive(Default)]
    struct RecordingBackend {
        calls: Arc<Mutex<Vec<String>>>,
        fail_system: bool,
        fail_user: bool,
        shadowing: Vec<String>,
    }

    impl EnvBackend for RecordingBackend {
        fn set_session_env(&self, target: &EnvTarget) -> AppResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("session:{}", target.java_home.display()));
            Ok(())
        }

        fn set_user_env(&self, _target: &EnvTarget) -> AppResult<UserEnvReport> {
            self.calls.lock().unwrap().push("user".to_string());
            if self.fail_user {
                return Err(AppError::environment("user store unavailable"));
            }
            Ok(UserEnvReport::Persisted)
        }

        fn set_system_env(&self, _target: &EnvTarget) -> AppResult<()> {
            self.calls.lock().unwrap().push("system".to_string());
            if self.fail_system {
                return Err(AppError::permission_denied("写入系统环境变量"));
            }
            Ok(())
        }

        fn detect_shadowing(&self) -> AppResult<Vec<String>> {
            Ok(self.shadowing.clone())
        }
    }

    fn installed_root(versions: &[&str]) -> TempDir {
        let temp = TempDir::new().unwrap();
        for version in versions {
            fs::create_dir_all(temp.path().join(version).join("bin")).unwrap();
        }
        temp
    }

    #[test]
    fn test_current_version_from_java_home() {
        let root = Path::new("/home/dev/.jvt/versions");
        assert!(matches!(current_version_from(None, root), Err(AppError::NotSet)));
        assert!(matches!(current_version_from(Some(""), root), Err(AppError::NotSet)));
        assert!(matches!(
            current_version_from(Some("/usr/lib/jvm/java-17"), root),
            Err(AppError::NotManaged { .. })
        ));
        assert!(matches!(
            current_version_from(Some("/home/dev/.jvt/versions"), root),
            Err(AppError::NotManaged { .. })
        ));
        assert_eq!(
            current_version_from(Some("/home/dev/.jvt/versions/17.0.9+9"), root).unwrap(),
            "17.0.9+9"
        );
    }

    #[test]
    fn test_use_requires_installed_version() {
        let temp = installed_root(&[]);
        let switcher =
            EnvironmentSwitcher::new(temp.path(), Box::new(RecordingBackend::default()), false);
        assert!(matches!(
            switcher.use_version("17", false).unwrap_err(),
            AppError::NotInstalled { .. }
        ));
    }

    #[test]
    fn test_system_failure_is_a_warning() {
        let temp = installed_root(&["17.0.9+9"]);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let backend = RecordingBackend {
            calls: Arc::clone(&calls),
            fail_system: true,
            shadowing: vec![r"C:\Program Files\Java\jdk-11\bin".to_string()],
            ..Default::default()
        };
        let switcher = EnvironmentSwitcher::new(temp.path(), Box::new(backend), true);

        let report = switcher.use_version("17.0.9+9", false).unwrap();
        assert!(!report.system_applied);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("权限不足"));
        assert_eq!(report.shadowing, [r"C:\Program Files\Java\jdk-11\bin"]);

        let calls = calls.lock().unwrap();
        assert_eq!(calls[0], "user");
        assert_eq!(calls[1], "system");
        assert!(calls[2].starts_with("session:"));
    }

    #[test]
    fn test_system_scope_warning_wording() {
        let denied = system_scope_warning(&AppError::permission_denied("写入 /etc/environment"));
        assert!(denied.contains("权限不足"));
        assert!(denied.contains("jvt use --system"));

        let io_denied = system_scope_warning(&AppError::Io(std::io::Error::from(
            std::io::ErrorKind::PermissionDenied,
        )));
        assert!(io_denied.contains("权限不足"));

        let other = system_scope_warning(&AppError::environment("registry unavailable"));
        assert!(!other.contains("权限不足"));
        assert!(other.contains("registry unavailable"));
    }

    #[test]
    fn test_user_failure_is_fatal() {
        let temp = installed_root(&["17.0.9+9"]);
        let backend = RecordingBackend {
            fail_user: true,
            ..Default::default()
        };
        let switcher = EnvironmentSwitcher::new(temp.path(), Box::new(backend), false);
        assert!(switcher.use_version("17.0.9+9", true).is_err());
    }

    #[test]
    fn test_system_scope_only_when_requested_on_unix_style_backends() {
        let temp = installed_root(&["21.0.2+13"]);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let backend = RecordingBackend {
            calls: Arc::clone(&calls),
            ..Default::default()
        };
        let switcher = EnvironmentSwitcher::new(temp.path(), Box::new(backend), false);

        let report = switcher.use_version("21.0.2+13", false).unwrap();
        assert!(!report.system_applied);
        assert!(!calls.lock().unwrap().contains(&"system".to_string()));

        let report = switcher.use_version("21.0.2+13", true).unwrap();
        assert!(report.system_applied);
    }

    #[test]
    #[serial]
    fn test_is_active_reads_java_home() {
        let temp = installed_root(&["17.0.9+9"]);
        let switcher =
            EnvironmentSwitcher::new(temp.path(), Box::new(RecordingBackend::default()), false);
        let original = env::var("JAVA_HOME").ok();

        env::set_var("JAVA_HOME", temp.path().join("17.0.9+9"));
        assert!(switcher.is_active("17.0.9+9"));
        assert!(!switcher.is_active("21.0.2+13"));

        env::remove_var("JAVA_HOME");
        assert!(!switcher.is_active("17.0.9+9"));

        if let Some(value) = original {
            env::set_var("JAVA_HOME", value);
        }
    }
}
