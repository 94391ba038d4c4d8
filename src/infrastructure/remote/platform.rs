use std::fmt;

/// 按 Adoptium 命名的平台信息（`os` / `architecture` 字段）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// 检测当前运行平台。
    pub fn current() -> Self {
        Self::from_rust_target(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// 把 Rust 的 target 名称映射为 Adoptium 的名称
    pub fn from_rust_target(os: &str, arch: &str) -> Self {
        let os = match os {
            "macos" => "mac",
            other => other,
        };

        let arch = match arch {
            "x86_64" => "x64",
            "x86" => "x32",
            "aarch64" => "aarch64",
            "arm" => "arm",
            other => other,
        };

        Platform::new(os, arch)
    }

    pub fn matches(&self, os: &str, arch: &str) -> bool {
        self.os == os && self.arch == arch
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}
