//! Minimal W3C WebDriver client for driving headless Chrome

use crate::core::scraper::is_command_available;
use crate::error::{AuthError, Result, TrendsError};
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::sleep;

/// W3C element reference key
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Page loads slower than this fail with the W3C `timeout` error
const PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Cookie as returned by `GET /session/{id}/cookie`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebDriverCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub secure: Option<bool>,
    #[serde(default, rename = "httpOnly")]
    pub http_only: Option<bool>,
    #[serde(default)]
    pub expiry: Option<u64>,
}

/// The browser-automation operations the sign-in flow needs
#[async_trait]
pub trait WebDriver: Send + Sync {
    /// Open a browser session and return its id
    async fn new_session(&self) -> std::result::Result<String, AuthError>;
    async fn navigate(&self, session: &str, url: &str) -> std::result::Result<(), AuthError>;
    async fn current_url(&self, session: &str) -> std::result::Result<String, AuthError>;
    /// `Ok(None)` when nothing matches the selector
    async fn find_element(
        &self,
        session: &str,
        css: &str,
    ) -> std::result::Result<Option<String>, AuthError>;
    async fn element_text(&self, session: &str, element: &str)
    -> std::result::Result<String, AuthError>;
    async fn send_keys(
        &self,
        session: &str,
        element: &str,
        text: &str,
    ) -> std::result::Result<(), AuthError>;
    async fn click(&self, session: &str, element: &str) -> std::result::Result<(), AuthError>;
    async fn cookies(&self, session: &str)
    -> std::result::Result<Vec<WebDriverCookie>, AuthError>;
    /// Close the browser session
    async fn delete_session(&self, session: &str) -> std::result::Result<(), AuthError>;
}

/// chromedriver over HTTP
pub struct ChromeDriver {
    base_url: String,
    client: reqwest::Client,
    // Killed on drop.
    _process: Option<Child>,
}

impl ChromeDriver {
    /// Use an already running chromedriver
    pub fn connect(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            _process: None,
        }
    }

    /// Launch chromedriver on `port` and wait until it accepts sessions
    pub async fn spawn(binary: &str, port: u16) -> Result<Self> {
        if !Path::new(binary).is_file() && !is_command_available(binary).await {
            return Err(TrendsError::MissingDependency(binary.into()));
        }

        let child = Command::new(binary)
            .arg(format!("--port={}", port))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TrendsError::Spawn(format!("Failed to start chromedriver: {}", e)))?;

        let mut driver = Self::connect(&format!("http://127.0.0.1:{}", port));
        driver._process = Some(child);

        for _ in 0..50 {
            if driver.is_ready().await {
                tracing::debug!(port, "chromedriver ready");
                return Ok(driver);
            }
            sleep(Duration::from_millis(200)).await;
        }

        Err(TrendsError::Spawn(
            "chromedriver did not become ready within 10s".into(),
        ))
    }

    async fn is_ready(&self) -> bool {
        let Ok(resp) = self
            .client
            .get(format!("{}/status", self.base_url))
            .send()
            .await
        else {
            return false;
        };
        resp.json::<Value>()
            .await
            .ok()
            .and_then(|v| v.get("value")?.get("ready")?.as_bool())
            .unwrap_or(false)
    }

    fn capabilities() -> Value {
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "timeouts": { "pageLoad": PAGE_LOAD_TIMEOUT.as_millis() as u64 },
                    "goog:chromeOptions": {
                        "args": [
                            "--headless=new",
                            "--no-sandbox",
                            "--disable-dev-shm-usage",
                            "--disable-gpu",
                            "--window-size=1920,1080",
                            "--disable-extensions",
                            "--disable-blink-features=AutomationControlled",
                            format!("--user-agent={}", USER_AGENT),
                        ],
                        "excludeSwitches": ["enable-automation"],
                    }
                }
            }
        })
    }

    /// Issue a command and return its `value`, or the W3C error code and message
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> std::result::Result<Value, WireError> {
        let mut req = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(body) = body {
            req = req.json(&body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| WireError::new("transport", e.to_string()))?;
        let ok = resp.status().is_success();
        let payload: Value = resp
            .json()
            .await
            .map_err(|e| WireError::new("invalid response", e.to_string()))?;
        let value = payload.get("value").cloned().unwrap_or(Value::Null);

        if ok {
            return Ok(value);
        }
        let code = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Err(WireError::new(code, message.to_string()))
    }
}

#[derive(Debug)]
struct WireError {
    code: String,
    message: String,
}

impl WireError {
    fn new(code: &str, message: String) -> Self {
        Self {
            code: code.to_string(),
            message,
        }
    }
}

impl From<WireError> for AuthError {
    fn from(e: WireError) -> Self {
        match e.code.as_str() {
            "timeout" | "script timeout" => AuthError::Timeout(PAGE_LOAD_TIMEOUT),
            _ => AuthError::Driver(format!("{}: {}", e.code, e.message)),
        }
    }
}

#[async_trait]
impl WebDriver for ChromeDriver {
    async fn new_session(&self) -> std::result::Result<String, AuthError> {
        let value = self
            .call(Method::POST, "/session", Some(Self::capabilities()))
            .await?;
        value
            .get("sessionId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AuthError::Driver("new session response had no sessionId".into()))
    }

    async fn navigate(&self, session: &str, url: &str) -> std::result::Result<(), AuthError> {
        self.call(
            Method::POST,
            &format!("/session/{}/url", session),
            Some(json!({ "url": url })),
        )
        .await?;
        Ok(())
    }

    async fn current_url(&self, session: &str) -> std::result::Result<String, AuthError> {
        let value = self
            .call(Method::GET, &format!("/session/{}/url", session), None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn find_element(
        &self,
        session: &str,
        css: &str,
    ) -> std::result::Result<Option<String>, AuthError> {
        let result = self
            .call(
                Method::POST,
                &format!("/session/{}/element", session),
                Some(json!({ "using": "css selector", "value": css })),
            )
            .await;
        match result {
            Ok(value) => Ok(value
                .get(ELEMENT_KEY)
                .and_then(Value::as_str)
                .map(str::to_string)),
            Err(e) if e.code == "no such element" => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn element_text(
        &self,
        session: &str,
        element: &str,
    ) -> std::result::Result<String, AuthError> {
        let value = self
            .call(
                Method::GET,
                &format!("/session/{}/element/{}/text", session, element),
                None,
            )
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn send_keys(
        &self,
        session: &str,
        element: &str,
        text: &str,
    ) -> std::result::Result<(), AuthError> {
        self.call(
            Method::POST,
            &format!("/session/{}/element/{}/value", session, element),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    async fn click(&self, session: &str, element: &str) -> std::result::Result<(), AuthError> {
        self.call(
            Method::POST,
            &format!("/session/{}/element/{}/click", session, element),
            Some(json!({})),
        )
        .await?;
        Ok(())
    }

    async fn cookies(
        &self,
        session: &str,
    ) -> std::result::Result<Vec<WebDriverCookie>, AuthError> {
        let value = self
            .call(Method::GET, &format!("/session/{}/cookie", session), None)
            .await?;
        serde_json::from_value(value).map_err(|e| AuthError::Driver(e.to_string()))
    }

    async fn delete_session(&self, session: &str) -> std::result::Result<(), AuthError> {
        self.call(Method::DELETE, &format!("/session/{}", session), None)
            .await?;
        Ok(())
    }
}
