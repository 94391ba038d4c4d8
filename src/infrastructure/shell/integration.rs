use crate::core::constants::shell::WRAPPER_MARKER;
use crate::error::AppResult;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 启动文件注入结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionOutcome {
    /// 至少一个启动文件已包含（或刚写入）集成代码块
    Configured {
        updated: Vec<PathBuf>,
        unchanged: Vec<PathBuf>,
    },
    /// 没有找到任何可识别的启动文件，需要用户手动添加
    NoStartupFile,
}

/// Shell 启动文件集成
pub struct ShellIntegration;

impl ShellIntegration {
    /// 启动文件是否已经同时包含 source 行与包装函数
    pub fn is_configured(content: &str, script_path: &Path) -> bool {
        content.contains(&script_path.display().to_string()) && content.contains(WRAPPER_MARKER)
    }

    /// 把集成代码块追加到 `home` 下已存在的启动文件中
    ///
    /// 已经配置过的文件保持不变，重复执行不会产生重复的代码块。
    pub fn ensure_startup_block(
        home: &Path,
        rc_files: &[String],
        block: &str,
        script_path: &Path,
    ) -> AppResult<InjectionOutcome> {
        let mut updated = Vec::new();
        let mut unchanged = Vec::new();

        for rc in rc_files {
            let rc_path = home.join(rc);
            if !rc_path.is_file() {
                continue;
            }

            let content = fs::read_to_string(&rc_path)?;
            if Self::is_configured(&content, script_path) {
                debug!(file = %rc_path.display(), "startup file already configured");
                unchanged.push(rc_path);
                continue;
            }

            let mut file = fs::OpenOptions::new().append(true).open(&rc_path)?;
            if !content.is_empty() && !content.ends_with('\n') {
                file.write_all(b"\n")?;
            }
            file.write_all(b"\n")?;
            file.write_all(block.as_bytes())?;

            info!(file = %rc_path.display(), "injected shell integration");
            updated.push(rc_path);
        }

        if updated.is_empty() && unchanged.is_empty() {
            return Ok(InjectionOutcome::NoStartupFile);
        }

        Ok(InjectionOutcome::Configured { updated, unchanged })
    }
}
