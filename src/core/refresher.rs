//! Live sign-in: drive a browser through the Google login flow and keep its cookies

use crate::core::browser::from_webdriver;
use crate::core::webdriver::{ChromeDriver, WebDriver};
use crate::error::AuthError;
use crate::types::{CookieSet, LoginCredentials};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};

pub const SIGN_IN_URL: &str = "https://accounts.google.com/ServiceLogin?service=youtube&passive=true&continue=https%3A%2F%2Fwww.youtube.com%2F";
const YOUTUBE_ORIGIN: &str = "https://www.youtube.com";
const ACCOUNT_ORIGIN: &str = "https://myaccount.google.com";

pub(crate) const EMAIL_INPUT: &str = "input[type=email]";
pub(crate) const IDENTIFIER_NEXT: &str = "#identifierNext";
pub(crate) const PASSWORD_INPUT: &str = "input[type=password]";
pub(crate) const PASSWORD_NEXT: &str = "#passwordNext";
pub(crate) const ERROR_MESSAGE: &str = "div[aria-live=assertive]";

/// Produces a fresh cookie set from a username and password
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn refresh(&self, credentials: &LoginCredentials) -> Result<CookieSet, AuthError>;
}

enum Awaiting {
    PasswordField,
    SignedIn,
}

enum Progress {
    PasswordField(String),
    SignedIn(CookieSet),
}

/// Runs the sign-in flow over an injected [`WebDriver`]
pub struct SessionRefresher<D> {
    driver: D,
    login_timeout: Duration,
    poll_interval: Duration,
}

impl<D: WebDriver> SessionRefresher<D> {
    pub fn new(driver: D, login_timeout: Duration) -> Self {
        Self {
            driver,
            login_timeout,
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Sign in and return the YouTube cookies. A timeout gets one more attempt.
    pub async fn refresh(&self, credentials: &LoginCredentials) -> Result<CookieSet, AuthError> {
        match self.attempt(credentials).await {
            Err(e) if e.is_retryable() => {
                tracing::warn!("sign-in timed out, retrying once with a new browser session");
                self.attempt(credentials).await
            }
            other => other,
        }
    }

    /// One browser session, always closed before returning. The whole sign-in,
    /// including any single slow driver call, is bounded by the login timeout.
    async fn attempt(&self, credentials: &LoginCredentials) -> Result<CookieSet, AuthError> {
        let session = self.driver.new_session().await?;
        tracing::debug!(%session, "browser session opened");

        let result = timeout(self.login_timeout, self.sign_in(&session, credentials))
            .await
            .unwrap_or(Err(AuthError::Timeout(self.login_timeout)));

        match self.driver.delete_session(&session).await {
            Ok(()) => tracing::debug!(%session, "browser session closed"),
            Err(e) => tracing::warn!(%session, "failed to close browser session: {}", e),
        }
        result
    }

    async fn sign_in(
        &self,
        session: &str,
        credentials: &LoginCredentials,
    ) -> Result<CookieSet, AuthError> {
        let deadline = Instant::now() + self.login_timeout;

        self.driver.navigate(session, SIGN_IN_URL).await?;

        let email = self.wait_for_element(session, EMAIL_INPUT, deadline).await?;
        self.driver
            .send_keys(session, &email, &credentials.username)
            .await?;
        let next = self.wait_for_element(session, IDENTIFIER_NEXT, deadline).await?;
        self.driver.click(session, &next).await?;

        let Progress::PasswordField(password) =
            self.poll(session, deadline, Awaiting::PasswordField).await?
        else {
            return Err(AuthError::Driver("unexpected sign-in state".into()));
        };
        self.driver
            .send_keys(session, &password, &credentials.password)
            .await?;
        let next = self.wait_for_element(session, PASSWORD_NEXT, deadline).await?;
        self.driver.click(session, &next).await?;

        match self.poll(session, deadline, Awaiting::SignedIn).await? {
            Progress::SignedIn(cookies) => {
                tracing::info!(cookies = cookies.len(), "live sign-in succeeded");
                Ok(cookies)
            }
            Progress::PasswordField(_) => Err(AuthError::Driver("unexpected sign-in state".into())),
        }
    }

    async fn wait_for_element(
        &self,
        session: &str,
        css: &str,
        deadline: Instant,
    ) -> Result<String, AuthError> {
        loop {
            if let Some(element) = self.driver.find_element(session, css).await? {
                return Ok(element);
            }
            if Instant::now() >= deadline {
                return Err(AuthError::Timeout(self.login_timeout));
            }
            sleep(self.poll_interval).await;
        }
    }

    /// Wait for the next step, failing fast on a challenge or a rejection
    async fn poll(
        &self,
        session: &str,
        deadline: Instant,
        awaiting: Awaiting,
    ) -> Result<Progress, AuthError> {
        loop {
            let url = self.driver.current_url(session).await?;
            if is_challenge_url(&url) {
                let page = url.split('?').next().unwrap_or_default().to_string();
                return Err(AuthError::ChallengeRequired(page));
            }

            match awaiting {
                Awaiting::PasswordField => {
                    if let Some(el) = self.driver.find_element(session, PASSWORD_INPUT).await? {
                        return Ok(Progress::PasswordField(el));
                    }
                }
                Awaiting::SignedIn => {
                    if url.starts_with(ACCOUNT_ORIGIN) {
                        self.driver.navigate(session, YOUTUBE_ORIGIN).await?;
                    } else if url.starts_with(YOUTUBE_ORIGIN) {
                        let cookies = from_webdriver(&self.driver.cookies(session).await?);
                        if cookies.has_auth_cookie() {
                            return Ok(Progress::SignedIn(cookies));
                        }
                    }
                }
            }

            if self.sign_in_rejected(session).await? {
                return Err(AuthError::InvalidCredentials);
            }
            if Instant::now() >= deadline {
                return Err(AuthError::Timeout(self.login_timeout));
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn sign_in_rejected(&self, session: &str) -> Result<bool, AuthError> {
        let Some(el) = self.driver.find_element(session, ERROR_MESSAGE).await? else {
            return Ok(false);
        };
        let text = self.driver.element_text(session, &el).await?;
        Ok(!text.trim().is_empty())
    }
}

#[async_trait]
impl<D: WebDriver> SessionProvider for SessionRefresher<D> {
    async fn refresh(&self, credentials: &LoginCredentials) -> Result<CookieSet, AuthError> {
        SessionRefresher::refresh(self, credentials).await
    }
}

/// Verification pages other than the password prompt itself
fn is_challenge_url(url: &str) -> bool {
    if url.contains("/signin/rejected") {
        return true;
    }
    url.contains("/challenge/") && !url.contains("/challenge/pwd")
}

/// Starts chromedriver only when a live sign-in is actually needed
pub struct ChromeSessionProvider {
    pub binary: String,
    pub port: u16,
    pub login_timeout: Duration,
}

#[async_trait]
impl SessionProvider for ChromeSessionProvider {
    async fn refresh(&self, credentials: &LoginCredentials) -> Result<CookieSet, AuthError> {
        let driver = ChromeDriver::spawn(&self.binary, self.port)
            .await
            .map_err(|e| AuthError::Driver(e.to_string()))?;
        SessionRefresher::new(driver, self.login_timeout)
            .refresh(credentials)
            .await
    }
}


#[cfg(test)]
mod tests {
    use super::fake::{FakeDriver, Outcome};
    use super::*;

    fn creds() -> LoginCredentials {
        LoginCredentials {
            username: "a@b.com".into(),
            password: "x".into(),
        }
    }

    fn refresher(outcomes: &[Outcome]) -> SessionRefresher<FakeDriver> {
        SessionRefresher::new(FakeDriver::new(outcomes), Duration::from_millis(60))
            .with_poll_interval(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn success_returns_auth_cookies_and_closes_session() {
        let r = refresher(&[Outcome::Success]);
        let cookies = r.refresh(&creds()).await.unwrap();
        assert!(cookies.has_auth_cookie());
        assert_eq!(cookies.len(), 3);
        assert_eq!(r.driver().open_sessions(), 0);
        assert_eq!(r.driver().sessions_created(), 1);
    }

    #[tokio::test]
    async fn wrong_password_is_fatal_without_retry() {
        let r = refresher(&[Outcome::WrongPassword, Outcome::Success]);
        let err = r.refresh(&creds()).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(r.driver().open_sessions(), 0);
        assert_eq!(r.driver().sessions_created(), 1);
    }

    #[tokio::test]
    async fn challenge_is_surfaced_without_query_string() {
        let r = refresher(&[Outcome::Challenge]);
        let err = r.refresh(&creds()).await.unwrap_err();
        match err {
            AuthError::ChallengeRequired(page) => {
                assert!(page.ends_with("/challenge/ipp"));
                assert!(!page.contains("secret"));
            }
            other => panic!("expected challenge, got {:?}", other),
        }
        assert_eq!(r.driver().open_sessions(), 0);
        assert_eq!(r.driver().sessions_created(), 1);
    }

    #[tokio::test]
    async fn timeout_is_retried_once_then_fatal() {
        let r = refresher(&[Outcome::Hang, Outcome::Hang, Outcome::Success]);
        let err = r.refresh(&creds()).await.unwrap_err();
        assert!(matches!(err, AuthError::Timeout(_)));
        assert_eq!(r.driver().sessions_created(), 2);
        assert_eq!(r.driver().open_sessions(), 0);
    }

    #[tokio::test]
    async fn timeout_then_success_recovers() {
        let r = refresher(&[Outcome::Hang, Outcome::Success]);
        let cookies = r.refresh(&creds()).await.unwrap();
        assert!(cookies.has_auth_cookie());
        assert_eq!(r.driver().sessions_created(), 2);
        assert_eq!(r.driver().open_sessions(), 0);
    }

    #[tokio::test]
    async fn slow_driver_call_is_cut_off_at_the_login_timeout() {
        let r = SessionRefresher::new(
            FakeDriver::new(&[Outcome::Stall, Outcome::Stall]),
            Duration::from_millis(100),
        )
        .with_poll_interval(Duration::from_millis(5));

        let started = std::time::Instant::now();
        let err = r.refresh(&creds()).await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, AuthError::Timeout(d) if d == Duration::from_millis(100)));
        assert!(elapsed < Duration::from_secs(2), "took {:?}", elapsed);
        assert_eq!(r.driver().sessions_created(), 2);
        assert_eq!(r.driver().open_sessions(), 0);
    }

    #[tokio::test]
    async fn driver_failure_still_releases_session() {
        let r = refresher(&[Outcome::Broken]);
        let err = r.refresh(&creds()).await.unwrap_err();
        assert!(matches!(err, AuthError::Driver(_)));
        assert_eq!(r.driver().open_sessions(), 0);
    }

    #[test]
    fn challenge_urls() {
        assert!(is_challenge_url(
            "https://accounts.google.com/signin/v2/challenge/totp?x=1"
        ));
        assert!(is_challenge_url("https://accounts.google.com/v3/signin/rejected"));
        assert!(!is_challenge_url(
            "https://accounts.google.com/signin/v2/challenge/pwd"
        ));
        assert!(!is_challenge_url("https://www.youtube.com/"));
    }
}
