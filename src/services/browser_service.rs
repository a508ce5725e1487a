//! Chromium page driver used by the solve loop and the `fetch_page_text` tool.

use std::{ffi::OsStr, path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use headless_chrome::{protocol::cdp::Page::CaptureScreenshotFormatOption, Browser, LaunchOptions, Tab};

use crate::{
    config::Config,
    errors::{AppError, AppResult},
};

pub const EMAIL_INPUT_SELECTOR: &str =
    "input[type='email'], input[name='email'], input[placeholder*='email']";
const VISUALS_SCRIPT: &str = "document.querySelectorAll('canvas, img').length > 0";
const INNER_TEXT_SCRIPT: &str = "document.body ? document.body.innerText : ''";
const SCREENSHOT_QUALITY: u32 = 50;
const EMAIL_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Operations the solver needs from a loaded page.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to `url` and wait until `body` is present.
    async fn open(&self, url: &str) -> AppResult<()>;
    /// Fill the first email input with `email` and press Enter.
    /// Returns `false` when the page has no email input.
    async fn fill_email(&self, email: &str) -> AppResult<bool>;
    async fn html(&self) -> AppResult<String>;
    async fn has_visuals(&self) -> AppResult<bool>;
    async fn screenshot_jpeg(&self, path: &Path) -> AppResult<()>;
    async fn inner_text(&self) -> AppResult<String>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> AppResult<Box<dyn PageDriver>>;
}

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub user_agent: Option<String>,
    pub timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1280,
            window_height: 1024,
            user_agent: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl BrowserConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            headless: config.browser_headless,
            timeout: Duration::from_secs(config.browser_timeout_secs),
            user_agent: config.browser_user_agent.clone(),
            ..Self::default()
        }
    }
}

/// One Chromium process with a single tab. The process exits when the
/// session is dropped.
pub struct BrowserSession {
    #[allow(dead_code)]
    browser: Browser,
    tab: Arc<Tab>,
    config: BrowserConfig,
}

impl BrowserSession {
    pub async fn launch(config: BrowserConfig) -> AppResult<Self> {
        tokio::task::spawn_blocking(move || Self::launch_blocking(config))
            .await
            .map_err(|e| AppError::Browser(format!("Browser launch task failed: {}", e)))?
    }

    fn launch_blocking(config: BrowserConfig) -> AppResult<Self> {
        log::info!(
            "Launching browser (headless: {}, size: {}x{})",
            config.headless,
            config.window_width,
            config.window_height
        );

        let mut launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some((config.window_width, config.window_height)))
            .build()
            .map_err(|e| AppError::Browser(format!("Invalid launch options: {}", e)))?;

        let user_agent_arg = config
            .user_agent
            .as_ref()
            .map(|ua| format!("--user-agent={}", ua));
        if let Some(ref ua_arg) = user_agent_arg {
            launch_options.args.push(OsStr::new(ua_arg));
        }

        let browser = Browser::new(launch_options)
            .map_err(|e| AppError::Browser(format!("Failed to launch browser: {}", e)))?;
        let tab = browser
            .new_tab()
            .map_err(|e| AppError::Browser(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(config.timeout);

        Ok(Self {
            browser,
            tab,
            config,
        })
    }

    /// Run blocking CDP work against the tab off the async executor.
    async fn with_tab<T, F>(&self, f: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> AppResult<T> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || f(&tab))
            .await
            .map_err(|e| AppError::Browser(format!("Browser task failed: {}", e)))?
    }

    async fn evaluate(&self, script: &'static str) -> AppResult<serde_json::Value> {
        self.with_tab(move |tab| {
            let result = tab
                .evaluate(script, false)
                .map_err(|e| AppError::Browser(format!("JavaScript evaluation failed: {}", e)))?;
            Ok(result.value.unwrap_or(serde_json::Value::Null))
        })
        .await
    }
}

#[async_trait]
impl PageDriver for BrowserSession {
    async fn open(&self, url: &str) -> AppResult<()> {
        let url = url.to_string();
        let timeout = self.config.timeout;
        self.with_tab(move |tab| {
            tab.navigate_to(&url)
                .map_err(|e| AppError::Browser(format!("Failed to navigate to {}: {}", url, e)))?;
            tab.wait_until_navigated()
                .map_err(|e| AppError::Browser(format!("Navigation timeout for {}: {}", url, e)))?;
            tab.wait_for_element_with_custom_timeout("body", timeout)
                .map_err(|e| AppError::Browser(format!("No body on {}: {}", url, e)))?;
            Ok(())
        })
        .await
    }

    async fn fill_email(&self, email: &str) -> AppResult<bool> {
        let email = email.to_string();
        let filled = self
            .with_tab(move |tab| {
                let Ok(input) = tab.find_element(EMAIL_INPUT_SELECTOR) else {
                    return Ok(false);
                };
                log::info!("Found email input, filling with {}", email);
                input
                    .click()
                    .and_then(|el| el.type_into(&email))
                    .map_err(|e| AppError::Browser(format!("Failed to type email: {}", e)))?;
                tab.press_key("Enter")
                    .map_err(|e| AppError::Browser(format!("Failed to submit email: {}", e)))?;
                if let Err(e) = tab.wait_until_navigated() {
                    log::debug!("No navigation after email submit: {}", e);
                }
                Ok(true)
            })
            .await?;

        if filled {
            tokio::time::sleep(EMAIL_SETTLE_DELAY).await;
        }
        Ok(filled)
    }

    async fn html(&self) -> AppResult<String> {
        self.with_tab(|tab| {
            tab.get_content()
                .map_err(|e| AppError::Browser(format!("Failed to read page HTML: {}", e)))
        })
        .await
    }

    async fn has_visuals(&self) -> AppResult<bool> {
        Ok(self.evaluate(VISUALS_SCRIPT).await?.as_bool().unwrap_or(false))
    }

    async fn screenshot_jpeg(&self, path: &Path) -> AppResult<()> {
        let data = self
            .with_tab(|tab| {
                tab.capture_screenshot(
                    CaptureScreenshotFormatOption::Jpeg,
                    Some(SCREENSHOT_QUALITY),
                    None,
                    true,
                )
                .map_err(|e| AppError::Browser(format!("Screenshot capture failed: {}", e)))
            })
            .await?;
        tokio::fs::write(path, data).await?;
        Ok(())
    }

    async fn inner_text(&self) -> AppResult<String> {
        Ok(self
            .evaluate(INNER_TEXT_SCRIPT)
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        log::debug!("BrowserSession dropped, chromium will be shut down");
    }
}

pub struct ChromeLauncher {
    config: BrowserConfig,
}

impl ChromeLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self) -> AppResult<Box<dyn PageDriver>> {
        let session = BrowserSession::launch(self.config.clone()).await?;
        Ok(Box::new(session))
    }
}
