//! Credential source selection
//!
//! Picks exactly one source per run, in a fixed order:
//! live sign-in, then the cookie file, then browser cookies, then nothing.

use crate::core::browser::BrowserCookieSource;
use crate::core::cookies;
use crate::core::refresher::SessionProvider;
use crate::error::AuthError;
use crate::types::{Config, CredentialSource, LoginCredentials, ResolvedSession};
use std::path::PathBuf;

pub const USERNAME_ENV: &str = "YT_USERNAME";
pub const PASSWORD_ENV: &str = "YT_PASSWORD";

/// Everything the selector is allowed to look at, captured up front
#[derive(Debug, Clone)]
pub struct CredentialEnv {
    pub login: Option<LoginCredentials>,
    pub cookie_file: PathBuf,
    pub browser: Option<String>,
}

impl CredentialEnv {
    /// Read the sign-in pair from the process environment; paths come from config
    pub fn from_env(config: &Config) -> Self {
        Self::from_lookup(config, |key| std::env::var(key).ok())
    }

    pub fn from_lookup(config: &Config, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let login = match (non_empty(USERNAME_ENV), non_empty(PASSWORD_ENV)) {
            (Some(username), Some(password)) => Some(LoginCredentials { username, password }),
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!(
                    "only one of {} / {} is set, ignoring live sign-in",
                    USERNAME_ENV,
                    PASSWORD_ENV
                );
                None
            }
            (None, None) => None,
        };

        Self {
            login,
            cookie_file: PathBuf::from(&config.cookie_file),
            browser: config.browser.clone().filter(|b| !b.is_empty()),
        }
    }
}

/// Resolves a [`ResolvedSession`] from injected capabilities
pub struct CredentialResolver<'a> {
    sessions: &'a dyn SessionProvider,
    browsers: &'a dyn BrowserCookieSource,
}

impl<'a> CredentialResolver<'a> {
    pub fn new(sessions: &'a dyn SessionProvider, browsers: &'a dyn BrowserCookieSource) -> Self {
        Self { sessions, browsers }
    }

    /// Only a failed live sign-in is an error; every other miss falls through.
    pub async fn resolve(&self, env: &CredentialEnv) -> Result<ResolvedSession, AuthError> {
        if let Some(login) = &env.login {
            tracing::info!(user = %login.username, "using live sign-in, static cookies ignored");
            let cookies = self.sessions.refresh(login).await?;
            return Ok(ResolvedSession::new(
                CredentialSource::LiveSession(login.clone()),
                cookies,
            ));
        }

        match cookies::load(&env.cookie_file).await {
            Ok(cookies) => {
                tracing::info!(
                    path = %env.cookie_file.display(),
                    cookies = cookies.len(),
                    "using cookie file"
                );
                return Ok(ResolvedSession::new(
                    CredentialSource::CookieFile(env.cookie_file.clone()),
                    cookies,
                ));
            }
            Err(e) => tracing::info!("cookie file not used: {}", e),
        }

        if let Some(browser) = &env.browser {
            match self.browsers.extract(browser).await {
                Ok(cookies) => {
                    tracing::info!(browser = %browser, cookies = cookies.len(), "using browser cookies");
                    return Ok(ResolvedSession::new(
                        CredentialSource::BrowserCookies(browser.clone()),
                        cookies,
                    ));
                }
                Err(e) => tracing::info!("browser cookies not used: {}", e),
            }
        }

        tracing::warn!("no YouTube credentials available, continuing unauthenticated");
        Ok(ResolvedSession::unauthenticated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::refresher::SessionRefresher;
    use crate::core::refresher::fake::{FakeDriver, Outcome};
    use crate::error::LoadError;
    use crate::types::{CookieRecord, CookieSet};
    use std::collections::HashMap;
    use std::time::Duration;
    use tempfile::tempdir;

    struct FakeBrowser {
        available: bool,
    }

    #[async_trait::async_trait]
    impl BrowserCookieSource for FakeBrowser {
        async fn extract(&self, browser: &str) -> Result<CookieSet, LoadError> {
            if !self.available {
                return Err(LoadError::BrowserUnavailable {
                    browser: browser.into(),
                    reason: "container".into(),
                });
            }
            Ok(CookieSet::from_records([CookieRecord {
                domain: ".youtube.com".into(),
                include_subdomains: true,
                path: "/".into(),
                secure: true,
                expires_at: 0,
                name: "BROWSER".into(),
                value: "b".into(),
                http_only: false,
            }]))
        }
    }

    fn refresher() -> SessionRefresher<FakeDriver> {
        SessionRefresher::new(
            FakeDriver::new(&[Outcome::Success; 16]),
            Duration::from_millis(50),
        )
        .with_poll_interval(Duration::from_millis(1))
    }

    fn env(login: bool, cookie_file: PathBuf) -> CredentialEnv {
        CredentialEnv {
            login: login.then(|| LoginCredentials {
                username: "a@b.com".into(),
                password: "x".into(),
            }),
            cookie_file,
            browser: Some("firefox".into()),
        }
    }

    #[tokio::test]
    async fn priority_order_is_total_and_deterministic() {
        let dir = tempdir().unwrap();
        let present = dir.path().join("youtube_cookies.txt");
        std::fs::write(&present, ".youtube.com\tTRUE\t/\tTRUE\t1999999999\tHSID\tabc123\n").unwrap();
        let absent = dir.path().join("missing.txt");

        let sessions = refresher();
        for login in [true, false] {
            for file in [true, false] {
                for browser in [true, false] {
                    let browsers = FakeBrowser { available: browser };
                    let resolver = CredentialResolver::new(&sessions, &browsers);
                    let path = if file { present.clone() } else { absent.clone() };

                    let first = resolver.resolve(&env(login, path.clone())).await.unwrap();
                    let again = resolver.resolve(&env(login, path)).await.unwrap();
                    assert_eq!(first.source, again.source);

                    let expected = if login {
                        "live_session"
                    } else if file {
                        "cookie_file"
                    } else if browser {
                        "browser_cookies"
                    } else {
                        "unauthenticated"
                    };
                    assert_eq!(
                        first.source.label(),
                        expected,
                        "login={} file={} browser={}",
                        login,
                        file,
                        browser
                    );
                }
            }
        }
        assert_eq!(sessions.driver().open_sessions(), 0);
    }

    #[tokio::test]
    async fn live_session_ignores_cookie_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("youtube_cookies.txt");
        std::fs::write(&path, ".youtube.com\tTRUE\t/\tTRUE\t1999999999\tHSID\tabc123\n").unwrap();

        let sessions = refresher();
        let browsers = FakeBrowser { available: true };
        let session = CredentialResolver::new(&sessions, &browsers)
            .resolve(&env(true, path))
            .await
            .unwrap();

        assert!(matches!(session.source, CredentialSource::LiveSession(ref c) if c.username == "a@b.com"));
        assert!(session.cookies.get("HSID").is_some());
        assert!(session.cookies.get("SAPISID").is_some());
        assert_eq!(session.cookies.get("HSID").unwrap().value, "HSID-value");
    }

    #[tokio::test]
    async fn live_sign_in_failure_is_returned() {
        let sessions = SessionRefresher::new(
            FakeDriver::new(&[Outcome::WrongPassword]),
            Duration::from_millis(50),
        )
        .with_poll_interval(Duration::from_millis(1));
        let browsers = FakeBrowser { available: true };
        let err = CredentialResolver::new(&sessions, &browsers)
            .resolve(&env(true, PathBuf::from("/nonexistent/cookies.txt")))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn cookie_file_without_valid_lines_falls_through() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("youtube_cookies.txt");
        std::fs::write(&path, "# Netscape HTTP Cookie File\nnot a cookie line\n").unwrap();

        let sessions = refresher();
        let browsers = FakeBrowser { available: true };
        let session = CredentialResolver::new(&sessions, &browsers)
            .resolve(&env(false, path))
            .await
            .unwrap();
        assert_eq!(session.source, CredentialSource::BrowserCookies("firefox".into()));
    }

    #[tokio::test]
    async fn nothing_available_is_unauthenticated() {
        let sessions = refresher();
        let browsers = FakeBrowser { available: false };
        let session = CredentialResolver::new(&sessions, &browsers)
            .resolve(&env(false, PathBuf::from("/nonexistent/cookies.txt")))
            .await
            .unwrap();
        assert_eq!(session.source, CredentialSource::Unauthenticated);
        assert!(session.cookies.is_empty());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn env_requires_both_username_and_password() {
        let config = Config {
            cookie_file: "youtube_cookies.txt".into(),
            ..Config::default()
        };

        let vars: HashMap<&str, &str> = [(USERNAME_ENV, "a@b.com"), (PASSWORD_ENV, "x")].into();
        let env = CredentialEnv::from_lookup(&config, |k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(env.login.unwrap().username, "a@b.com");
        assert_eq!(env.cookie_file, PathBuf::from("youtube_cookies.txt"));

        let vars: HashMap<&str, &str> = [(USERNAME_ENV, "a@b.com"), (PASSWORD_ENV, " ")].into();
        let env = CredentialEnv::from_lookup(&config, |k| vars.get(k).map(|v| v.to_string()));
        assert!(env.login.is_none());
    }
}
