use std::env;

/// Shell 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellType {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Cmd,
    Unknown,
}

impl ShellType {
    /// 能否 source POSIX 风格的 jvt.sh
    pub fn is_posix_compatible(&self) -> bool {
        matches!(self, ShellType::Bash | ShellType::Zsh | ShellType::Unknown)
    }
}

/// 检测当前使用的 shell
pub fn detect_shell() -> ShellType {
    if cfg!(target_os = "windows") {
        if env::var("PSModulePath").is_ok() {
            return ShellType::PowerShell;
        }
        if env::var("COMSPEC").is_ok() {
            return ShellType::Cmd;
        }
    }

    match env::var("SHELL") {
        Ok(shell) => shell_from_path(&shell),
        Err(_) if cfg!(target_os = "windows") => ShellType::PowerShell,
        Err(_) => ShellType::Bash,
    }
}

fn shell_from_path(shell: &str) -> ShellType {
    if shell.contains("fish") {
        ShellType::Fish
    } else if shell.contains("zsh") {
        ShellType::Zsh
    } else if shell.contains("bash") {
        ShellType::Bash
    } else {
        ShellType::Unknown
    }
}

/// 转义双引号内的 shell 值（bash/zsh）
pub fn escape_shell_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('$', "\\$")
        .replace('"', "\\\"")
        .replace('`', "\\`")
}

/// 转义 PowerShell 单引号字符串
pub fn escape_powershell_value(value: &str) -> String {
    value.replace('\'', "''")
}
