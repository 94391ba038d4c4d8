//! 应用程序常量定义
//!
//! 本模块包含全局使用的常量，避免魔数并提供统一的配置值。

/// 版本信息常量
pub mod version {
    /// 应用程序名称
    pub const APP_NAME: &str = "jvt";
    /// 版本号
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

/// 环境变量相关常量
pub mod env {
    pub const JAVA_HOME: &str = "JAVA_HOME";
    pub const PATH: &str = "PATH";
    /// 覆盖数据目录
    pub const JVT_HOME: &str = "JVT_HOME";
    /// 日志过滤器
    pub const JVT_LOG: &str = "JVT_LOG";
}

/// PATH 中判定为“其他 Java 安装”的关键字（小写匹配）
pub const JAVA_PATH_KEYWORDS: &[&str] = &["java", "jdk", "jre", "adoptium", "temurin"];

/// Shell 集成相关常量
pub mod shell {
    /// 用户级脚本文件名（位于数据目录下）
    pub const SCRIPT_FILE_NAME: &str = "jvt.sh";
    /// 包装函数签名标记
    pub const WRAPPER_MARKER: &str = "jvt() {";
    pub const BLOCK_BEGIN: &str = "# >>> jvt >>>";
    pub const BLOCK_END: &str = "# <<< jvt <<<";
}

/// 默认配置值
pub mod defaults {
    /// 默认数据目录（相对用户主目录）
    pub const DEFAULT_BASE_DIR: &str = ".jvt";
    pub const VERSIONS_DIR: &str = "versions";
    pub const CACHE_DIR: &str = "cache";
    pub const CONFIG_FILE: &str = "config.toml";
    pub const CATALOG_URL: &str = "https://api.adoptium.net/v3";
    pub const IMAGE_TYPE: &str = "jdk";
    pub const DISTRIBUTION: &str = "Temurin";
    pub const RC_FILES: &[&str] = &[".zshrc", ".bashrc", ".profile", ".bash_profile"];
    pub const SYSTEM_PROFILE_PATH: &str = "/etc/profile.d/jvt.sh";
    pub const SYSTEM_ENVIRONMENT_FILE: &str = "/etc/environment";
    /// 默认日志级别
    pub const DEFAULT_LOG_LEVEL: &str = "warn";
}

/// 下载相关常量
pub mod download {
    /// 最大重试次数
    pub const MAX_RETRIES: u32 = 3;
    /// 首次重试间隔（毫秒）
    pub const RETRY_DELAY_MS: u64 = 1000;
    /// 连接超时（秒）
    pub const CONNECT_TIMEOUT_SEC: u64 = 30;
    /// 读取超时（秒）
    pub const READ_TIMEOUT_SEC: u64 = 300;
    /// 未完成下载的临时文件后缀
    pub const PARTIAL_SUFFIX: &str = "downloading";
}
