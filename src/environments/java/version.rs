use crate::error::{AppError, AppResult};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Java 版本号：`major[.minor[.patch]][+build]`，缺省部分按 0 处理
///
/// 字段声明顺序即比较顺序，派生的 `Ord` 按 (major, minor, patch, build) 逐项比较。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SemanticVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub build: u32,
}

impl SemanticVersion {
    pub fn new(major: u32, minor: u32, patch: u32, build: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            build,
        }
    }

    /// 解析版本字符串
    ///
    /// 主版本部分之后多余的点分段会被忽略（例如 `17.0.1.3` 等同于 `17.0.1`）。
    pub fn parse(input: &str) -> AppResult<Self> {
        let (main, build) = match input.split_once('+') {
            Some((main, build)) => (main, Some(build)),
            None => (input, None),
        };

        if main.is_empty() {
            return Err(AppError::invalid_format(input));
        }

        let mut parts = [0u32; 4];
        for (slot, component) in parts.iter_mut().take(3).zip(main.split('.')) {
            *slot = parse_component(component, input)?;
        }

        if let Some(build) = build {
            parts[3] = parse_component(build, input)?;
        }

        Ok(Self::new(parts[0], parts[1], parts[2], parts[3]))
    }
}

fn parse_component(component: &str, input: &str) -> AppResult<u32> {
    component
        .parse::<u32>()
        .map_err(|_| AppError::invalid_format(input))
}

impl FromStr for SemanticVersion {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}+{}",
            self.major, self.minor, self.patch, self.build
        )
    }
}

/// 比较两个版本字符串，任意一方无法解析时返回 `InvalidFormat`
pub fn compare_versions(a: &str, b: &str) -> AppResult<Ordering> {
    Ok(SemanticVersion::parse(a)?.cmp(&SemanticVersion::parse(b)?))
}
