use crate::core::upgrade::{BatchReport, UpgradeOutcome};
use crate::error::{AppError, AppResult};
use serde::Serialize;
use serde_json::{json, Value};

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_flag(json: bool) -> Self {
        if json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// 已安装版本条目
#[derive(Debug, Clone, Serialize)]
pub struct InstalledEntry {
    pub version: String,
    pub active: bool,
}

/// 输出格式化器（JSON 部分）
pub struct OutputFormatter;

impl OutputFormatter {
    pub fn to_json(&self, value: &Value) -> AppResult<String> {
        serde_json::to_string_pretty(value).map_err(|e| AppError::Config {
            message: format!("JSON 序列化失败: {e}"),
        })
    }

    pub fn installed(&self, entries: &[InstalledEntry]) -> AppResult<String> {
        let current = entries.iter().find(|e| e.active).map(|e| e.version.as_str());
        self.to_json(&json!({
            "current": current,
            "installed": entries,
        }))
    }

    pub fn current(&self, version: Option<&str>, java_executable: Option<&str>) -> AppResult<String> {
        self.to_json(&json!({
            "current": version,
            "java": java_executable,
        }))
    }

    pub fn upgrade(&self, major: u32, outcome: &UpgradeOutcome) -> AppResult<String> {
        let mut value = json!(outcome);
        value["major"] = json!(major);
        self.to_json(&value)
    }

    pub fn batch(&self, report: &BatchReport) -> AppResult<String> {
        let results: Vec<Value> = report
            .entries
            .iter()
            .map(|entry| match &entry.result {
                Ok(outcome) => {
                    let mut value = json!(outcome);
                    value["major"] = json!(entry.major);
                    value
                }
                Err(e) => json!({
                    "major": entry.major,
                    "status": "error",
                    "message": e.to_string(),
                }),
            })
            .collect();

        self.to_json(&json!({
            "results": results,
            "updated": report.updated_count(),
            "available": report.available_count(),
            "up_to_date": report.up_to_date_count(),
            "errors": report.error_count(),
        }))
    }
}

/// 默认输出格式化器实例
pub static FORMATTER: OutputFormatter = OutputFormatter;
