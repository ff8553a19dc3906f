use std::time::Duration;

use async_trait::async_trait;
use thirtyfour::error::WebDriverError;
use thirtyfour::{By, ChromiumLikeCapabilities, DesiredCapabilities, WebDriver};

use crate::configuration::CrawlerSettings;
use crate::domain::page::{Anchor, PatternTag};

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("webdriver error: {0}")]
    Driver(#[from] WebDriverError),
}

/// DOM-level operations the interaction pipeline needs from a rendered page.
/// Implemented by the live WebDriver session, and by scripted drivers in
/// tests so the pipeline can be exercised without a browser.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), PageError>;
    async fn current_url(&self) -> Result<String, PageError>;
    async fn visible_text(&self) -> Result<String, PageError>;
    async fn page_source(&self) -> Result<String, PageError>;
    async fn collect_anchors(&self, pattern: PatternTag) -> Result<Vec<Anchor>, PageError>;
    async fn iframe_count(&self) -> Result<usize, PageError>;
    async fn enter_iframe(&self, index: usize) -> Result<bool, PageError>;
    async fn leave_iframe(&self) -> Result<(), PageError>;
    async fn selector_present(&self, css: &str) -> Result<bool, PageError>;
    async fn scroll_to_bottom(&self) -> Result<u64, PageError>;
    /// Click the first visible control whose text contains one of `phrases`.
    async fn click_visible_control(&self, phrases: &[&str]) -> Result<bool, PageError>;
    async fn tab_count(&self) -> Result<usize, PageError>;
    async fn activate_tab(&self, index: usize) -> Result<bool, PageError>;
    async fn select_all_filter_options(&self) -> Result<u32, PageError>;
    async fn check_visible_checkboxes(&self) -> Result<u32, PageError>;
}

/// One headless Chrome session, owned by a single crawl.
pub struct Browser {
    driver: WebDriver,
}

impl Browser {
    pub async fn open(settings: &CrawlerSettings) -> Result<Self, PageError> {
        let mut caps = DesiredCapabilities::chrome();
        caps.set_headless()?;
        let driver = WebDriver::new(&settings.webdriver_url, caps).await?;
        driver
            .set_page_load_timeout(Duration::from_secs(settings.render_timeout_secs))
            .await?;
        Ok(Browser { driver })
    }

    pub async fn quit(self) -> Result<(), PageError> {
        self.driver.quit().await?;
        Ok(())
    }
}

const FILTER_ALL_LABELS: [&str; 6] = [
    "all",
    "any",
    "all departments",
    "all locations",
    "all teams",
    "all categories",
];

const TAB_SELECTOR: &str = "[role='tab'], .tab, .tabs button, ul.tabs li";

#[async_trait]
impl PageDriver for Browser {
    async fn navigate(&self, url: &str) -> Result<(), PageError> {
        self.driver.goto(url).await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, PageError> {
        Ok(self.driver.current_url().await?.to_string())
    }

    async fn visible_text(&self) -> Result<String, PageError> {
        let body = self.driver.find(By::Tag("body")).await?;
        Ok(body.text().await?)
    }

    async fn page_source(&self) -> Result<String, PageError> {
        Ok(self.driver.source().await?)
    }

    async fn collect_anchors(&self, pattern: PatternTag) -> Result<Vec<Anchor>, PageError> {
        let mut anchors = vec![];
        for element in self.driver.find_all(By::Tag("a")).await? {
            let href = match element.attr("href").await {
                Ok(Some(href)) => href,
                Ok(None) => continue,
                Err(e) => {
                    log::warn!("Could not read anchor href: {:?}", e);
                    continue;
                }
            };
            if href.trim().is_empty() {
                continue;
            }
            let text = element.text().await.unwrap_or_default();
            anchors.push(Anchor {
                href,
                text: text.trim().to_string(),
                pattern,
            });
        }
        Ok(anchors)
    }

    async fn iframe_count(&self) -> Result<usize, PageError> {
        Ok(self.driver.find_all(By::Tag("iframe")).await?.len())
    }

    async fn enter_iframe(&self, index: usize) -> Result<bool, PageError> {
        let frames = self.driver.find_all(By::Tag("iframe")).await?;
        match frames.into_iter().nth(index) {
            Some(frame) => {
                frame.enter_frame().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn leave_iframe(&self) -> Result<(), PageError> {
        self.driver.enter_default_frame().await?;
        Ok(())
    }

    async fn selector_present(&self, css: &str) -> Result<bool, PageError> {
        Ok(self.driver.find(By::Css(css)).await.is_ok())
    }

    async fn scroll_to_bottom(&self) -> Result<u64, PageError> {
        let ret = self
            .driver
            .execute(
                "window.scrollTo(0, document.body.scrollHeight); return document.body.scrollHeight;",
                vec![],
            )
            .await?;
        let height = ret
            .json()
            .as_u64()
            .or_else(|| ret.json().as_f64().map(|h| h as u64))
            .unwrap_or(0);
        Ok(height)
    }

    async fn click_visible_control(&self, phrases: &[&str]) -> Result<bool, PageError> {
        for by in [By::Tag("button"), By::Css("[role='button']"), By::Tag("a")] {
            for element in self.driver.find_all(by).await? {
                let text = match element.text().await {
                    Ok(text) => text.trim().to_lowercase(),
                    Err(_) => continue,
                };
                // Long texts are content, not controls
                if text.is_empty() || text.len() > 60 {
                    continue;
                }
                if !phrases.iter().any(|phrase| text.contains(phrase)) {
                    continue;
                }
                if !element.is_displayed().await.unwrap_or(false) {
                    continue;
                }
                if let Err(e) = element.click().await {
                    log::warn!("Could not click control '{}': {:?}", text, e);
                    continue;
                }
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn tab_count(&self) -> Result<usize, PageError> {
        Ok(self.driver.find_all(By::Css(TAB_SELECTOR)).await?.len())
    }

    async fn activate_tab(&self, index: usize) -> Result<bool, PageError> {
        let tabs = self.driver.find_all(By::Css(TAB_SELECTOR)).await?;
        let tab = match tabs.into_iter().nth(index) {
            Some(tab) => tab,
            None => return Ok(false),
        };
        if !tab.is_displayed().await.unwrap_or(false) {
            return Ok(false);
        }
        tab.click().await?;
        Ok(true)
    }

    async fn select_all_filter_options(&self) -> Result<u32, PageError> {
        let mut selected = 0;
        for dropdown in self.driver.find_all(By::Tag("select")).await? {
            if !dropdown.is_displayed().await.unwrap_or(false) {
                continue;
            }
            let options = match dropdown.find_all(By::Tag("option")).await {
                Ok(options) => options,
                Err(e) => {
                    log::warn!("Could not read dropdown options: {:?}", e);
                    continue;
                }
            };
            for option in options {
                let label = match option.text().await {
                    Ok(label) => label.trim().to_lowercase(),
                    Err(_) => continue,
                };
                if FILTER_ALL_LABELS.contains(&label.as_str()) {
                    if let Err(e) = option.click().await {
                        log::warn!("Could not select option '{}': {:?}", label, e);
                        break;
                    }
                    selected += 1;
                    break;
                }
            }
        }
        Ok(selected)
    }

    async fn check_visible_checkboxes(&self) -> Result<u32, PageError> {
        let mut checked = 0;
        for checkbox in self.driver.find_all(By::Css("input[type='checkbox']")).await? {
            if !checkbox.is_displayed().await.unwrap_or(false) {
                continue;
            }
            if checkbox.is_selected().await.unwrap_or(true) {
                continue;
            }
            if let Err(e) = checkbox.click().await {
                log::warn!("Could not check consent checkbox: {:?}", e);
                continue;
            }
            checked += 1;
        }
        Ok(checked)
    }
}
