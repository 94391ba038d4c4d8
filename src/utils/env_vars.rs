use crate::core::constants::JAVA_PATH_KEYWORDS;

/// 环境变量工具
pub struct EnvVarUtils;

impl EnvVarUtils {
    /// 当前平台的 PATH 分隔符
    pub fn list_separator() -> char {
        if cfg!(target_os = "windows") {
            ';'
        } else {
            ':'
        }
    }

    /// 拆分 PATH 字符串，丢弃空项
    pub fn split_path(value: &str, separator: char) -> Vec<&str> {
        value.split(separator).filter(|p| !p.is_empty()).collect()
    }

    /// 路径是否位于安装根目录之下（不区分大小写的前缀比较）
    pub fn is_managed(entry: &str, install_root: &str) -> bool {
        !install_root.is_empty() && entry.to_lowercase().starts_with(&install_root.to_lowercase())
    }

    /// 路径是否看起来属于另一个 Java 安装
    pub fn contains_java_keyword(entry: &str) -> bool {
        let lower = entry.to_lowercase();
        JAVA_PATH_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
    }

    /// 重写 PATH：移除受管目录、重复项与其他 Java 安装，并把新的 bin 目录放在最前
    ///
    /// 保留项维持原有顺序；对同一目标重复执行得到相同结果。
    pub fn rewrite_path(current: &str, install_root: &str, bin_dir: &str, separator: char) -> String {
        let bin_lower = bin_dir.to_lowercase();

        let survivors = Self::split_path(current, separator)
            .into_iter()
            .filter(|entry| !Self::is_managed(entry, install_root))
            .filter(|entry| entry.to_lowercase() != bin_lower)
            .filter(|entry| !Self::contains_java_keyword(entry));

        std::iter::once(bin_dir)
            .chain(survivors)
            .collect::<Vec<_>>()
            .join(&separator.to_string())
    }

    /// 找出 PATH 中可能遮蔽受管版本的条目
    pub fn shadowing_entries(path_value: &str, separator: char) -> Vec<String> {
        Self::split_path(path_value, separator)
            .into_iter()
            .filter(|entry| Self::contains_java_keyword(entry))
            .map(str::to_string)
            .collect()
    }
}
