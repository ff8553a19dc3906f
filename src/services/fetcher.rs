use std::time::Duration;

use fake_user_agent::get_rua;
use serde::Serialize;
use thirtyfour::{ChromiumLikeCapabilities, DesiredCapabilities, WebDriver};
use url::Url;

use crate::configuration::CrawlerSettings;
use crate::domain::page::{FetchMethod, FetchResult};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("browser error: {0}")]
    Browser(#[from] thirtyfour::error::WebDriverError),
    #[error("markdown conversion failed: {0}")]
    Convert(String),
    #[error("content below minimum size: {got} < {min} bytes")]
    TooShort {
        got: usize,
        min: usize,
        content: String,
    },
    #[error("render api not configured")]
    RenderApiUnavailable,
    #[error("all fetch stages failed for {url}")]
    AllStagesFailed {
        url: String,
        /// Longest below-threshold content any stage produced; the caller
        /// may still hand this to the AI extraction fallback.
        partial: Option<String>,
    },
}

/// Try retrieval methods cheapest-first until one yields usable content.
/// Each stage retries once with the `www.` prefix toggled before the chain
/// advances, because apex and `www` hosts are frequently misconfigured in
/// opposite directions.
pub async fn fetch_page(url: &str, settings: &CrawlerSettings) -> Result<FetchResult, FetchError> {
    let url = ensure_scheme(url);
    let mut partial: Option<String> = None;

    for method in [FetchMethod::Http, FetchMethod::Headless, FetchMethod::PaidApi] {
        if let Some(result) = run_stage_with_www_toggle(method, &url, settings, &mut partial).await {
            return Ok(result);
        }
    }

    Err(FetchError::AllStagesFailed { url, partial })
}

async fn run_stage_with_www_toggle(
    method: FetchMethod,
    url: &str,
    settings: &CrawlerSettings,
    partial: &mut Option<String>,
) -> Option<FetchResult> {
    match run_stage(method, url, settings).await {
        Ok(result) => return Some(result),
        Err(e) => {
            remember_partial(partial, &e);
            log::warn!("{} fetch failed for {}: {}", method.as_str(), url, e);
        }
    }

    if let Some(toggled) = toggle_www(url) {
        match run_stage(method, &toggled, settings).await {
            Ok(result) => return Some(result),
            Err(e) => {
                remember_partial(partial, &e);
                log::warn!("{} fetch failed for {}: {}", method.as_str(), toggled, e);
            }
        }
    }

    None
}

async fn run_stage(
    method: FetchMethod,
    url: &str,
    settings: &CrawlerSettings,
) -> Result<FetchResult, FetchError> {
    match method {
        FetchMethod::Http => fetch_http(url, settings).await,
        FetchMethod::Headless => fetch_headless(url, settings).await,
        FetchMethod::PaidApi => fetch_render_api(url, settings).await,
    }
}

async fn fetch_http(url: &str, settings: &CrawlerSettings) -> Result<FetchResult, FetchError> {
    let client = reqwest::Client::builder()
        .user_agent(get_rua())
        .timeout(Duration::from_secs(settings.http_timeout_secs))
        .build()?;
    let response = client.get(url).send().await?.error_for_status()?;
    let html = response.text().await?;
    let content = markup_to_markdown(&html)?;
    accept(url, content, FetchMethod::Http, settings)
}

async fn fetch_headless(url: &str, settings: &CrawlerSettings) -> Result<FetchResult, FetchError> {
    let mut caps = DesiredCapabilities::chrome();
    caps.set_headless()?;
    let driver = WebDriver::new(&settings.webdriver_url, caps).await?;
    let rendered = render_page(&driver, url, settings).await;
    if let Err(e) = driver.quit().await {
        log::warn!("Render session for {} did not shut down cleanly: {:?}", url, e);
    }
    let content = markup_to_markdown(&rendered?)?;
    accept(url, content, FetchMethod::Headless, settings)
}

async fn render_page(
    driver: &WebDriver,
    url: &str,
    settings: &CrawlerSettings,
) -> Result<String, FetchError> {
    driver
        .set_page_load_timeout(Duration::from_secs(settings.render_timeout_secs))
        .await?;
    driver.goto(url).await?;
    wait_for_page_ready(driver, settings).await;
    Ok(driver.source().await?)
}

/// readyState polling plus a settle delay, approximating a network-idle wait
/// for client-rendered pages.
async fn wait_for_page_ready(driver: &WebDriver, settings: &CrawlerSettings) {
    for _ in 0..20 {
        let ready = driver
            .execute("return document.readyState;", vec![])
            .await
            .map(|ret| ret.json().as_str() == Some("complete"))
            .unwrap_or(false);
        if ready {
            break;
        }
        tokio::time::sleep(Duration::from_millis(settings.settle_millis)).await;
    }
    tokio::time::sleep(Duration::from_millis(settings.settle_millis)).await;
}

#[derive(Serialize)]
struct RenderQuery {
    token: String,
    url: String,
}

/// Paid third-party rendering service; last resort only.
async fn fetch_render_api(url: &str, settings: &CrawlerSettings) -> Result<FetchResult, FetchError> {
    let endpoint = settings
        .render_api_url
        .as_ref()
        .ok_or(FetchError::RenderApiUnavailable)?;
    let token = settings
        .render_api_token
        .as_ref()
        .ok_or(FetchError::RenderApiUnavailable)?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.render_timeout_secs))
        .build()?;
    let response = client
        .get(endpoint)
        .query(&RenderQuery {
            token: token.clone(),
            url: url.to_string(),
        })
        .send()
        .await?
        .error_for_status()?;
    let body = response.text().await?;

    // Rendering services usually return markdown already
    let content = if body.trim_start().starts_with('<') {
        markup_to_markdown(&body)?
    } else {
        body
    };
    accept(url, content, FetchMethod::PaidApi, settings)
}

fn markup_to_markdown(html: &str) -> Result<String, FetchError> {
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "nav", "footer"])
        .build();
    converter
        .convert(html)
        .map_err(|e| FetchError::Convert(e.to_string()))
}

/// Enforce the minimum-content threshold: short content is a failed fetch
/// regardless of transport-level success.
fn accept(
    url: &str,
    content: String,
    method: FetchMethod,
    settings: &CrawlerSettings,
) -> Result<FetchResult, FetchError> {
    let content = content.trim().to_string();
    if content.len() < settings.min_content_bytes {
        return Err(FetchError::TooShort {
            got: content.len(),
            min: settings.min_content_bytes,
            content,
        });
    }
    let byte_length = content.len();
    Ok(FetchResult {
        url: url.to_string(),
        content,
        method,
        byte_length,
    })
}

fn remember_partial(partial: &mut Option<String>, error: &FetchError) {
    if let FetchError::TooShort { content, .. } = error {
        if content.is_empty() {
            return;
        }
        let longer = partial.as_ref().map(|p| p.len() < content.len()).unwrap_or(true);
        if longer {
            *partial = Some(content.clone());
        }
    }
}

pub fn ensure_scheme(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

/// Strip the `www.` prefix if present, add it if absent.
pub fn toggle_www(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    if let Some(stripped) = host.strip_prefix("www.") {
        Some(url.replacen(host, stripped, 1))
    } else if host.contains('.') {
        Some(url.replacen(host, &format!("www.{}", host), 1))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_scheme_prepends_https() {
        assert_eq!(ensure_scheme("example.com/careers"), "https://example.com/careers");
        assert_eq!(ensure_scheme("http://example.com"), "http://example.com");
        assert_eq!(ensure_scheme(" https://example.com "), "https://example.com");
    }

    #[test]
    fn toggle_www_strips_the_prefix() {
        assert_eq!(
            toggle_www("https://www.example.com/careers").as_deref(),
            Some("https://example.com/careers")
        );
    }

    #[test]
    fn toggle_www_adds_the_prefix_for_apex_hosts() {
        assert_eq!(
            toggle_www("https://example.com/careers").as_deref(),
            Some("https://www.example.com/careers")
        );
    }

    #[test]
    fn short_content_is_rejected_regardless_of_transport_success() {
        let settings = CrawlerSettings::default();
        let result = accept(
            "https://example.com/careers",
            "Tiny page".to_string(),
            FetchMethod::Http,
            &settings,
        );
        match result {
            Err(FetchError::TooShort { got, min, content }) => {
                assert_eq!(got, "Tiny page".len());
                assert_eq!(min, settings.min_content_bytes);
                assert_eq!(content, "Tiny page");
            }
            other => panic!("Expected TooShort, got {:?}", other.map(|r| r.byte_length)),
        }
    }

    #[test]
    fn accepted_content_meets_the_threshold() {
        let settings = CrawlerSettings::default();
        let content = "job listing ".repeat(100);
        let result = accept("https://example.com", content, FetchMethod::Http, &settings)
            .expect("content above the threshold");
        assert!(result.byte_length >= settings.min_content_bytes);
        assert_eq!(result.method, FetchMethod::Http);
    }

    #[test]
    fn remember_partial_keeps_the_longest_fragment() {
        let mut partial = None;
        remember_partial(
            &mut partial,
            &FetchError::TooShort {
                got: 5,
                min: 500,
                content: "short".to_string(),
            },
        );
        remember_partial(
            &mut partial,
            &FetchError::TooShort {
                got: 13,
                min: 500,
                content: "a bit longer!".to_string(),
            },
        );
        remember_partial(
            &mut partial,
            &FetchError::TooShort {
                got: 3,
                min: 500,
                content: "eh?".to_string(),
            },
        );
        assert_eq!(partial.as_deref(), Some("a bit longer!"));
    }
}
