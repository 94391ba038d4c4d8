use crate::core::constants::{env as env_names, shell};
use crate::error::{AppError, AppResult};
use crate::infrastructure::config::Config;
use crate::infrastructure::shell::integration::{InjectionOutcome, ShellIntegration};
use crate::infrastructure::shell::platform::escape_powershell_value;
use crate::infrastructure::shell::templates::TemplateEngine;
use crate::utils::EnvVarUtils;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// 一次切换的目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvTarget {
    pub java_home: PathBuf,
    pub bin_dir: PathBuf,
    pub install_root: PathBuf,
}

impl EnvTarget {
    pub fn new(install_root: &Path, version: &str) -> Self {
        let java_home = install_root.join(version);
        Self {
            bin_dir: java_home.join("bin"),
            java_home,
            install_root: install_root.to_path_buf(),
        }
    }

    /// 按重写规则计算新的 PATH
    pub fn rewrite(&self, current: &str, separator: char) -> String {
        EnvVarUtils::rewrite_path(
            current,
            &self.install_root.display().to_string(),
            &self.bin_dir.display().to_string(),
            separator,
        )
    }
}

/// 用户级持久化的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEnvReport {
    /// 写入了操作系统的用户环境变量
    Persisted,
    /// 写入了 jvt.sh，并尝试注入启动文件
    ShellScript {
        script: PathBuf,
        injection: InjectionOutcome,
        startup_block: String,
    },
}

/// 平台相关的环境变量写入能力
pub trait EnvBackend: Send + Sync {
    /// 当前进程
    fn set_session_env(&self, target: &EnvTarget) -> AppResult<()> {
        apply_session_env(target)
    }

    /// 当前用户，未来的会话
    fn set_user_env(&self, target: &EnvTarget) -> AppResult<UserEnvReport>;

    /// 所有用户，需要管理员权限
    fn set_system_env(&self, target: &EnvTarget) -> AppResult<()>;

    /// 只读地检查系统级 PATH 中的其他 Java 安装
    fn detect_shadowing(&self) -> AppResult<Vec<String>>;
}

/// 修改当前进程的 JAVA_HOME 与 PATH
pub fn apply_session_env(target: &EnvTarget) -> AppResult<()> {
    let current = env::var(env_names::PATH).unwrap_or_default();
    let path = target.rewrite(&current, EnvVarUtils::list_separator());

    env::set_var(env_names::JAVA_HOME, &target.java_home);
    env::set_var(env_names::PATH, path);
    debug!(java_home = %target.java_home.display(), "session environment updated");
    Ok(())
}

/// 通过生成 shell 脚本并注入启动文件实现持久化（Linux / macOS）
pub struct UnixEnvBackend {
    home: PathBuf,
    base_dir: PathBuf,
    rc_files: Vec<String>,
    system_profile_path: PathBuf,
    system_environment_file: PathBuf,
    templates: TemplateEngine,
}

impl UnixEnvBackend {
    pub fn new(
        home: impl Into<PathBuf>,
        base_dir: impl Into<PathBuf>,
        rc_files: Vec<String>,
        system_profile_path: impl Into<PathBuf>,
        system_environment_file: impl Into<PathBuf>,
    ) -> AppResult<Self> {
        Ok(Self {
            home: home.into(),
            base_dir: base_dir.into(),
            rc_files,
            system_profile_path: system_profile_path.into(),
            system_environment_file: system_environment_file.into(),
            templates: TemplateEngine::new()?,
        })
    }

    pub fn from_config(config: &Config) -> AppResult<Self> {
        let home = dirs::home_dir().ok_or_else(|| AppError::Config {
            message: "无法获取用户主目录".to_string(),
        })?;

        Self::new(
            home,
            config.base_dir(),
            config.shell.rc_files.clone(),
            &config.shell.system_profile_path,
            &config.shell.system_environment_file,
        )
    }

    pub fn script_path(&self) -> PathBuf {
        self.base_dir.join(shell::SCRIPT_FILE_NAME)
    }

    /// 启动文件代码块，供 `jvt env` 与找不到启动文件时输出
    pub fn startup_block(&self) -> AppResult<String> {
        self.templates.startup_block(&self.base_dir, &self.script_path())
    }
}

impl EnvBackend for UnixEnvBackend {
    fn set_user_env(&self, target: &EnvTarget) -> AppResult<UserEnvReport> {
        fs::create_dir_all(&self.base_dir)?;

        let script = self.script_path();
        let content = self.templates.env_script(&target.java_home, &target.install_root)?;
        fs::write(&script, content)?;
        info!(script = %script.display(), "user environment script written");

        let startup_block = self.startup_block()?;
        let injection =
            ShellIntegration::ensure_startup_block(&self.home, &self.rc_files, &startup_block, &script)?;

        Ok(UserEnvReport::ShellScript {
            script,
            injection,
            startup_block,
        })
    }

    fn set_system_env(&self, target: &EnvTarget) -> AppResult<()> {
        let operation = format!("写入 {}", self.system_profile_path.display());
        let content = self.templates.env_script(&target.java_home, &target.install_root)?;

        if let Some(parent) = self.system_profile_path.parent() {
            fs::create_dir_all(parent).map_err(|e| AppError::from_io_for(&operation, e))?;
        }
        fs::write(&self.system_profile_path, content)
            .map_err(|e| AppError::from_io_for(&operation, e))?;

        info!(path = %self.system_profile_path.display(), "system environment script written");
        Ok(())
    }

    fn detect_shadowing(&self) -> AppResult<Vec<String>> {
        let content = match fs::read_to_string(&self.system_environment_file) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(system_path_from_environment_file(&content)
            .map(|path| EnvVarUtils::shadowing_entries(path, ':'))
            .unwrap_or_default())
    }
}

/// 取出 `/etc/environment` 中 `PATH=` 行的值（去掉引号）
fn system_path_from_environment_file(content: &str) -> Option<&str> {
    content
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("PATH="))
        .map(|value| value.trim_matches(|c| c == '"' || c == '\''))
}

/// Windows 环境变量作用域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvScope {
    User,
    Machine,
}

impl EnvScope {
    fn as_str(&self) -> &'static str {
        match self {
            EnvScope::User => "User",
            EnvScope::Machine => "Machine",
        }
    }
}

const POWERSHELL_UTF8_PREFIX: &str = "[Console]::OutputEncoding=[System.Text.Encoding]::UTF8; ";

/// 通过 PowerShell 的 `[Environment]` API 写入注册表环境变量（Windows）
pub struct WindowsEnvBackend;

impl WindowsEnvBackend {
    fn get_variable_script(name: &str, scope: EnvScope) -> String {
        format!(
            "[Environment]::GetEnvironmentVariable('{}', '{}')",
            escape_powershell_value(name),
            scope.as_str()
        )
    }

    fn set_variable_script(name: &str, value: &str, scope: EnvScope) -> String {
        format!(
            "[Environment]::SetEnvironmentVariable('{}', '{}', '{}')",
            escape_powershell_value(name),
            escape_powershell_value(value),
            scope.as_str()
        )
    }

    /// 强制 UTF-8 输出，否则控制台代码页（如 GBK）会损坏 PATH 中的非 ASCII 路径
    fn command_script(script: &str) -> String {
        format!("{POWERSHELL_UTF8_PREFIX}{script}")
    }

    fn run_powershell(script: &str, operation: &str) -> AppResult<String> {
        let output = Command::new("powershell")
            .args(["-NoProfile", "-NonInteractive", "-Command", &Self::command_script(script)])
            .output()
            .map_err(|e| AppError::from_io_for(operation, e))?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if stderr.contains("UnauthorizedAccess") || stderr.contains("denied") {
            Err(AppError::permission_denied(operation))
        } else {
            Err(AppError::environment(format!("{operation}: {}", stderr.trim())))
        }
    }

    fn persist(&self, target: &EnvTarget, scope: EnvScope) -> AppResult<()> {
        let operation = format!("写入 {} 环境变量", scope.as_str());

        let java_home = target.java_home.display().to_string();
        Self::run_powershell(
            &Self::set_variable_script(env_names::JAVA_HOME, &java_home, scope),
            &operation,
        )?;

        let current = Self::run_powershell(&Self::get_variable_script("Path", scope), &operation)?;
        let path = target.rewrite(&current, ';');
        Self::run_powershell(&Self::set_variable_script("Path", &path, scope), &operation)?;

        info!(scope = scope.as_str(), java_home = java_home.as_str(), "environment persisted");
        Ok(())
    }
}

impl EnvBackend for WindowsEnvBackend {
    fn set_user_env(&self, target: &EnvTarget) -> AppResult<UserEnvReport> {
        self.persist(target, EnvScope::User)?;
        Ok(UserEnvReport::Persisted)
    }

    fn set_system_env(&self, target: &EnvTarget) -> AppResult<()> {
        self.persist(target, EnvScope::Machine)
    }

    fn detect_shadowing(&self) -> AppResult<Vec<String>> {
        let path = Self::run_powershell(
            &Self::get_variable_script("Path", EnvScope::Machine),
            "读取系统 PATH",
        )?;
        Ok(EnvVarUtils::shadowing_entries(&path, ';'))
    }
}
