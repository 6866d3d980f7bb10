use anyhow::Result;
use log::{debug, warn};
use reqwest::{Client, header::{HeaderMap, HeaderName, HeaderValue}};
use std::time::Duration;

use crate::error::DownloadError;

/// 构建HTTP客户端，包含自定义请求头
pub fn build_http_client(custom_headers: &[String]) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        "User-Agent",
        HeaderValue::from_static("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36")
    );

    for header in custom_headers {
        if let Some((key, value)) = header.split_once(':') {
            let header_name = HeaderName::from_bytes(key.trim().as_bytes())?;
            let header_value = HeaderValue::from_str(value.trim())?;
            headers.insert(header_name, header_value);
        } else {
            warn!("Ignoring malformed header: {}", header);
        }
    }

    debug!("Using HTTP headers: {:?}", headers);

    let client = Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(30))
        .build()?;

    Ok(client)
}

/// 获取播放列表文本；传输层失败会中止整个运行
pub async fn fetch_playlist_text(client: &Client, url: &str) -> Result<String, DownloadError> {
    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|source| DownloadError::Transport {
            url: url.to_string(),
            source,
        })?;

    response
        .text()
        .await
        .map_err(|source| DownloadError::Transport {
            url: url.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetches_playlist_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/audio/index.m3u8"))
            .respond_with(ResponseTemplate::new(200).set_body_string("#EXTM3U\n"))
            .mount(&server)
            .await;

        let client = build_http_client(&[]).unwrap();
        let url = format!("{}/audio/index.m3u8", server.uri());

        let body = fetch_playlist_text(&client, &url).await.unwrap();
        assert_eq!(body, "#EXTM3U\n");
    }

    #[tokio::test]
    async fn http_error_maps_to_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = build_http_client(&[]).unwrap();
        let url = format!("{}/missing/index.m3u8", server.uri());

        let err = fetch_playlist_text(&client, &url).await.unwrap_err();
        assert!(matches!(err, DownloadError::Transport { .. }));
    }

    #[test]
    fn malformed_custom_header_is_skipped() {
        let client = build_http_client(&["NotAHeader".to_string()]);
        assert!(client.is_ok());
    }
}
