use crate::error::AppError;
use thiserror::Error;

/// 用于提供错误上下文和用户友好建议
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub operation: String,
    pub suggestions: Vec<String>,
}

/// 带有上下文的错误
#[derive(Error, Debug)]
pub struct ContextualError {
    #[source]
    pub error: AppError,
    pub context: ErrorContext,
}

impl std::fmt::Display for ContextualError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "操作失败: {}\n错误: {}", self.context.operation, self.error)
    }
}

impl ContextualError {
    /// 获取用户友好的错误消息
    pub fn user_message(&self) -> String {
        let mut msg = format!("❌ {}\n", self.context.operation);
        msg.push_str(&format!("原因: {}\n", self.error));

        if !self.context.suggestions.is_empty() {
            msg.push_str("💡 建议:\n");
            for suggestion in &self.context.suggestions {
                msg.push_str(&format!("  • {}\n", suggestion));
            }
        }

        msg
    }
}

impl AppError {
    /// 为错误添加上下文信息，并根据错误类型附带默认建议
    pub fn with_context(self, operation: &str) -> ContextualError {
        let suggestions = default_suggestions(&self);
        ContextualError {
            error: self,
            context: ErrorContext {
                operation: operation.to_string(),
                suggestions,
            },
        }
    }
}

fn default_suggestions(error: &AppError) -> Vec<String> {
    match error {
        AppError::NotInstalled { version } => vec![
            "运行 'jvt list' 查看已安装的版本".to_string(),
            format!("运行 'jvt install {version}' 安装该版本"),
        ],
        AppError::AlreadyInstalled { version } => {
            vec![format!("运行 'jvt use {version}' 切换到该版本")]
        }
        AppError::PermissionDenied { .. } => {
            vec!["使用管理员权限（或 sudo）重新运行该命令".to_string()]
        }
        AppError::ChecksumMismatch { .. } => {
            vec!["删除缓存目录中的对应文件后重试".to_string()]
        }
        AppError::CatalogUnavailable { .. } | AppError::DownloadFailed { .. } => {
            vec!["检查网络连接，或在 config.toml 中配置 catalog_url".to_string()]
        }
        AppError::NotSet | AppError::NotManaged { .. } => {
            vec!["运行 'jvt use <version>' 激活一个版本".to_string()]
        }
        _ => Vec::new(),
    }
}

/// 带上下文的 Result 类型
pub type ContextualResult<T> = Result<T, ContextualError>;

/// 为Result添加上下文信息的辅助函数
pub fn with_context<T, E: Into<AppError>>(
    result: Result<T, E>,
    operation: &str,
) -> ContextualResult<T> {
    result.map_err(|e| e.into().with_context(operation))
}

impl From<AppError> for ContextualError {
    fn from(error: AppError) -> Self {
        error.with_context("未知操作")
    }
}
