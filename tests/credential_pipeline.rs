//! End-to-end credential resolution through the public API

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::tempdir;
use tokio_test::{assert_err, assert_ok};

use yt_trends::core::browser::BrowserCookieSource;
use yt_trends::core::cookies;
use yt_trends::core::credentials::{CredentialEnv, CredentialResolver};
use yt_trends::core::refresher::{SessionProvider, SessionRefresher};
use yt_trends::core::scraper::{CookieArgs, prepare_cookies};
use yt_trends::core::webdriver::{WebDriver, WebDriverCookie};
use yt_trends::error::{AuthError, LoadError};
use yt_trends::types::{CookieSet, CredentialSource, LoginCredentials};

const HSID_LINE: &str = ".youtube.com\tTRUE\t/\tTRUE\t1999999999\tHSID\tabc123\n";

/// Signs in successfully with one SAPISID cookie, counting calls
#[derive(Default)]
struct ScriptedSessions {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl SessionProvider for ScriptedSessions {
    async fn refresh(&self, _credentials: &LoginCredentials) -> Result<CookieSet, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(cookies::parse(
            ".youtube.com\tTRUE\t/\tTRUE\t1999999999\tSAPISID\tlive\n",
        ))
    }
}

struct NoBrowser;

#[async_trait]
impl BrowserCookieSource for NoBrowser {
    async fn extract(&self, browser: &str) -> Result<CookieSet, LoadError> {
        Err(LoadError::BrowserUnavailable {
            browser: browser.to_string(),
            reason: "no profile".into(),
        })
    }
}

struct FirefoxWithCookies;

#[async_trait]
impl BrowserCookieSource for FirefoxWithCookies {
    async fn extract(&self, _browser: &str) -> Result<CookieSet, LoadError> {
        Ok(cookies::parse(HSID_LINE))
    }
}

fn login() -> Option<LoginCredentials> {
    Some(LoginCredentials {
        username: "a@b.com".into(),
        password: "x".into(),
    })
}

#[tokio::test]
async fn live_sign_in_wins_over_cookie_file() {
    let dir = tempdir().unwrap();
    let cookie_file = dir.path().join("youtube_cookies.txt");
    std::fs::write(&cookie_file, HSID_LINE).unwrap();

    let sessions = ScriptedSessions::default();
    let env = CredentialEnv {
        login: login(),
        cookie_file,
        browser: Some("firefox".into()),
    };

    let session = assert_ok!(
        CredentialResolver::new(&sessions, &NoBrowser)
            .resolve(&env)
            .await
    );
    assert!(matches!(session.source, CredentialSource::LiveSession(_)));
    assert!(session.cookies.get("SAPISID").is_some());
    assert!(session.cookies.get("HSID").is_none());
    assert_eq!(sessions.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_sign_in_is_reported_not_skipped() {
    let dir = tempdir().unwrap();
    let cookie_file = dir.path().join("youtube_cookies.txt");
    std::fs::write(&cookie_file, HSID_LINE).unwrap();

    let sessions = ScriptedSessions {
        fail: true,
        ..Default::default()
    };
    let env = CredentialEnv {
        login: login(),
        cookie_file,
        browser: None,
    };

    let err = assert_err!(
        CredentialResolver::new(&sessions, &NoBrowser)
            .resolve(&env)
            .await
    );
    assert!(matches!(err, AuthError::InvalidCredentials));
}

#[tokio::test]
async fn cookie_file_parses_hsid_record() {
    let dir = tempdir().unwrap();
    let cookie_file = dir.path().join("youtube_cookies.txt");
    std::fs::write(&cookie_file, format!("# Netscape HTTP Cookie File\n{}", HSID_LINE)).unwrap();

    let sessions = ScriptedSessions::default();
    let env = CredentialEnv {
        login: None,
        cookie_file: cookie_file.clone(),
        browser: Some("firefox".into()),
    };

    let session = assert_ok!(
        CredentialResolver::new(&sessions, &FirefoxWithCookies)
            .resolve(&env)
            .await
    );
    assert_eq!(session.source, CredentialSource::CookieFile(cookie_file));
    assert_eq!(session.cookies.len(), 1);
    let hsid = session.cookies.get("HSID").unwrap();
    assert_eq!(hsid.expires_at, 1999999999);
    assert_eq!(hsid.value, "abc123");
    assert_eq!(sessions.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn browser_is_used_when_cookie_file_is_missing() {
    let dir = tempdir().unwrap();
    let sessions = ScriptedSessions::default();
    let env = CredentialEnv {
        login: None,
        cookie_file: dir.path().join("absent.txt"),
        browser: Some("firefox".into()),
    };

    let session = assert_ok!(
        CredentialResolver::new(&sessions, &FirefoxWithCookies)
            .resolve(&env)
            .await
    );
    assert_eq!(
        session.source,
        CredentialSource::BrowserCookies("firefox".into())
    );
}

#[tokio::test]
async fn nothing_available_runs_unauthenticated_without_cookie_file() {
    let dir = tempdir().unwrap();
    let sessions = ScriptedSessions::default();
    let env = CredentialEnv {
        login: None,
        cookie_file: dir.path().join("absent.txt"),
        browser: Some("firefox".into()),
    };

    let session = assert_ok!(
        CredentialResolver::new(&sessions, &NoBrowser)
            .resolve(&env)
            .await
    );
    assert_eq!(session.source, CredentialSource::Unauthenticated);
    assert!(session.cookies.is_empty());

    let runtime = dir.path().join("session_cookies.txt");
    let args = assert_ok!(prepare_cookies(&session, &runtime, false));
    assert!(matches!(args, CookieArgs::None));
    assert!(args.to_args().is_empty());
    assert!(!runtime.exists());
}

#[tokio::test]
async fn runtime_cookie_file_is_removed_after_the_run() {
    let dir = tempdir().unwrap();
    let cookie_file = dir.path().join("youtube_cookies.txt");
    std::fs::write(&cookie_file, HSID_LINE).unwrap();
    let env = CredentialEnv {
        login: None,
        cookie_file,
        browser: None,
    };
    let session = CredentialResolver::new(&ScriptedSessions::default(), &NoBrowser)
        .resolve(&env)
        .await
        .unwrap();

    let runtime = dir.path().join("session_cookies.txt");
    {
        let args = prepare_cookies(&session, &runtime, false).unwrap();
        assert_eq!(args.to_args()[0], "--cookies");
        let written = std::fs::read_to_string(&runtime).unwrap();
        assert!(written.contains("HSID\tabc123"));
    }
    assert!(!runtime.exists());
}

/// Opens sessions but fails as soon as the flow navigates
#[derive(Default)]
struct BrokenDriver {
    open: AtomicUsize,
}

#[async_trait]
impl WebDriver for BrokenDriver {
    async fn new_session(&self) -> Result<String, AuthError> {
        self.open.fetch_add(1, Ordering::SeqCst);
        Ok("s1".into())
    }
    async fn navigate(&self, _session: &str, _url: &str) -> Result<(), AuthError> {
        Err(AuthError::Driver("renderer crashed".into()))
    }
    async fn current_url(&self, _session: &str) -> Result<String, AuthError> {
        Ok(String::new())
    }
    async fn find_element(&self, _session: &str, _css: &str) -> Result<Option<String>, AuthError> {
        Ok(None)
    }
    async fn element_text(&self, _session: &str, _element: &str) -> Result<String, AuthError> {
        Ok(String::new())
    }
    async fn send_keys(&self, _session: &str, _element: &str, _text: &str) -> Result<(), AuthError> {
        Ok(())
    }
    async fn click(&self, _session: &str, _element: &str) -> Result<(), AuthError> {
        Ok(())
    }
    async fn cookies(&self, _session: &str) -> Result<Vec<WebDriverCookie>, AuthError> {
        Ok(Vec::new())
    }
    async fn delete_session(&self, _session: &str) -> Result<(), AuthError> {
        self.open.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn refresher_closes_the_browser_when_sign_in_breaks() {
    let refresher = SessionRefresher::new(BrokenDriver::default(), Duration::from_secs(5))
        .with_poll_interval(Duration::from_millis(1));
    let credentials = LoginCredentials {
        username: "a@b.com".into(),
        password: "x".into(),
    };

    let err = assert_err!(refresher.refresh(&credentials).await);
    assert!(matches!(err, AuthError::Driver(_)));
    assert_eq!(refresher.driver().open.load(Ordering::SeqCst), 0);
}

#[test]
fn env_lookup_requires_both_halves_of_the_login() {
    let config = yt_trends::types::Config {
        cookie_file: "/tmp/cookies.txt".into(),
        ..Default::default()
    };
    let env = CredentialEnv::from_lookup(&config, |key| {
        (key == "YT_USERNAME").then(|| "a@b.com".to_string())
    });
    assert!(env.login.is_none());
    assert_eq!(env.cookie_file, PathBuf::from("/tmp/cookies.txt"));
}
