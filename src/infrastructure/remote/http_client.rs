use crate::core::constants::version::{APP_NAME, VERSION};
use crate::error::{AppError, AppResult};
use crate::infrastructure::config::DownloadSettings;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

/// HTTP 客户端包装器
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// 按下载配置创建客户端（连接超时 + 读取超时）
    pub fn new(settings: &DownloadSettings) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout())
            .timeout(settings.read_timeout())
            .user_agent(format!("{APP_NAME}/{VERSION}"))
            .build()
            .map_err(|e| AppError::download(format!("创建 HTTP 客户端失败: {e}")))?;

        Ok(Self { client })
    }

    /// GET 请求
    pub async fn get(&self, url: &str) -> Result<Response, reqwest::Error> {
        debug!(url, "GET");
        self.client.get(url).send().await
    }

    /// GET 请求并解析 JSON，任何失败都视为版本目录不可用
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> AppResult<T> {
        let response = self
            .get(url)
            .await
            .map_err(|e| AppError::catalog(format!("请求 {url} 失败: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::catalog(format!("{url} 返回状态码 {status}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::catalog(format!("解析 {url} 的响应失败: {e}")))
    }
}
