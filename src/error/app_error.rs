use std::io;
use thiserror::Error;

/// 应用程序错误类型
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO 错误: {0}")]
    Io(#[from] io::Error),

    #[error("无效的版本格式: {version}")]
    InvalidFormat { version: String },

    #[error("Java {version} 未安装")]
    NotInstalled { version: String },

    #[error("Java {version} 已经安装")]
    AlreadyInstalled { version: String },

    #[error("不支持的压缩包格式: {path}")]
    UnsupportedFormat { path: String },

    #[error("解压失败: {message}")]
    Extraction { message: String },

    #[error("JAVA_HOME 未设置")]
    NotSet,

    #[error("当前 Java 不由 jvt 管理: {java_home}")]
    NotManaged { java_home: String },

    #[error("权限不足: {operation}")]
    PermissionDenied { operation: String },

    #[error("校验和不匹配: 期望 {expected}, 实际 {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("无法获取版本目录: {message}")]
    CatalogUnavailable { message: String },

    #[error("下载失败: {message}")]
    DownloadFailed { message: String },

    #[error("配置错误: {message}")]
    Config { message: String },

    #[error("环境变量设置失败: {message}")]
    Environment { message: String },

    #[error("脚本模板错误: {message}")]
    Template { message: String },
}

/// 应用程序 Result 类型
pub type AppResult<T> = Result<T, AppError>;

/// 便捷的错误创建函数
impl AppError {
    pub fn invalid_format(version: &str) -> Self {
        Self::InvalidFormat {
            version: version.to_string(),
        }
    }

    pub fn not_installed(version: &str) -> Self {
        Self::NotInstalled {
            version: version.to_string(),
        }
    }

    pub fn already_installed(version: &str) -> Self {
        Self::AlreadyInstalled {
            version: version.to_string(),
        }
    }

    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction {
            message: message.into(),
        }
    }

    pub fn permission_denied(operation: &str) -> Self {
        Self::PermissionDenied {
            operation: operation.to_string(),
        }
    }

    pub fn catalog(message: impl Into<String>) -> Self {
        Self::CatalogUnavailable {
            message: message.into(),
        }
    }

    pub fn download(message: impl Into<String>) -> Self {
        Self::DownloadFailed {
            message: message.into(),
        }
    }

    pub fn environment(message: impl Into<String>) -> Self {
        Self::Environment {
            message: message.into(),
        }
    }

    /// 将 IO 错误按权限问题归类，用于提升到系统级作用域的写入
    pub fn from_io_for(operation: &str, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::PermissionDenied {
            Self::permission_denied(operation)
        } else {
            Self::Io(err)
        }
    }

    /// 是否为权限不足类错误
    pub fn is_permission_denied(&self) -> bool {
        match self {
            AppError::PermissionDenied { .. } => true,
            AppError::Io(e) => e.kind() == io::ErrorKind::PermissionDenied,
            _ => false,
        }
    }
}

impl From<handlebars::RenderError> for AppError {
    fn from(err: handlebars::RenderError) -> Self {
        AppError::Template {
            message: err.to_string(),
        }
    }
}

impl From<handlebars::TemplateError> for AppError {
    fn from(err: handlebars::TemplateError) -> Self {
        AppError::Template {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_classification() {
        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err = AppError::from_io_for("写入 /etc/profile.d/jvt.sh", denied);
        assert!(matches!(err, AppError::PermissionDenied { .. }));
        assert!(err.is_permission_denied());

        let other = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err = AppError::from_io_for("读取", other);
        assert!(matches!(err, AppError::Io(_)));
        assert!(!err.is_permission_denied());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(AppError::not_installed("17").to_string(), "Java 17 未安装");
        assert_eq!(AppError::NotSet.to_string(), "JAVA_HOME 未设置");
    }
}
