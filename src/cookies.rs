#![forbid(unsafe_code)]

//! Cookie panel: turns a pasted `name=value; ...` string or a browser cookie
//! jar into the record list the backend writes out as a Netscape cookie file.

use crate::api::{self, Backend};
use crate::error::ValidationError;
use crate::i18n::{Language, t, tf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

pub const DEFAULT_COOKIE_DOMAIN: &str = ".youtube.com";
pub const DEFAULT_COOKIE_SITE: &str = "https://www.youtube.com";
pub const COOKIE_FORMAT: &str = "netscape";
const ONE_YEAR_SECS: i64 = 365 * 24 * 60 * 60;

/// Every field is a string on the wire, flags included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: String,
    #[serde(rename = "httpOnly")]
    pub http_only: String,
    #[serde(rename = "expirationDate")]
    pub expiration_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieUpload {
    pub cookies: Vec<CookieRecord>,
    pub domain: String,
    pub format: String,
}

impl CookieUpload {
    pub fn new(cookies: Vec<CookieRecord>, domain: &str) -> Self {
        Self {
            cookies,
            domain: domain.to_string(),
            format: COOKIE_FORMAT.to_string(),
        }
    }
}

fn default_expiration(now: DateTime<Utc>) -> String {
    (now.timestamp() + ONE_YEAR_SECS).to_string()
}

/// Parses a pasted cookie header. Segments without `=` or with an empty name
/// are skipped; a value keeps any `=` after the first one.
pub fn parse_cookie_text(
    text: &str,
    now: DateTime<Utc>,
) -> Result<Vec<CookieRecord>, ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyCookies);
    }
    let expiration = default_expiration(now);
    let cookies: Vec<CookieRecord> = text
        .split(';')
        .filter_map(|segment| {
            let (name, value) = segment.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some(CookieRecord {
                name: name.to_string(),
                value: value.trim().to_string(),
                domain: DEFAULT_COOKIE_DOMAIN.to_string(),
                path: "/".to_string(),
                secure: "TRUE".to_string(),
                http_only: "FALSE".to_string(),
                expiration_date: expiration.clone(),
            })
        })
        .collect();
    if cookies.is_empty() {
        return Err(ValidationError::UnparseableCookies);
    }
    Ok(cookies)
}

/// Cookies read from a browser jar, and whether the demo set stood in for
/// an empty jar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JarCookies {
    pub cookies: Vec<CookieRecord>,
    pub domain: String,
    pub used_demo: bool,
}

/// Reads a `document.cookie` style jar exported for `site`.
///
/// Values are percent-decoded. Entries missing either a name or a value are
/// dropped. When nothing survives and `demo_fallback` is set, the three demo
/// YouTube cookies are returned instead and flagged.
pub fn read_cookie_jar(
    raw: &str,
    site: &Url,
    now: DateTime<Utc>,
    demo_fallback: bool,
) -> JarCookies {
    let host = site.host_str().unwrap_or_default().to_string();
    let secure = (site.scheme() == "https").to_string();
    let expiration = default_expiration(now);
    let cookies: Vec<CookieRecord> = raw
        .split(';')
        .filter_map(|entry| {
            let (name, value) = entry.trim().split_once('=')?;
            let (name, value) = (name.trim(), value.trim());
            if name.is_empty() || value.is_empty() {
                return None;
            }
            let value = urlencoding::decode(value)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| value.to_string());
            Some(CookieRecord {
                name: name.to_string(),
                value,
                domain: host.clone(),
                path: "/".to_string(),
                secure: secure.clone(),
                http_only: "false".to_string(),
                expiration_date: expiration.clone(),
            })
        })
        .collect();

    if cookies.is_empty() && demo_fallback {
        warn!(site = %site, "cookie jar is empty, substituting demo cookies");
        return JarCookies {
            cookies: demo_cookies(now),
            domain: host,
            used_demo: true,
        };
    }
    JarCookies {
        cookies,
        domain: host,
        used_demo: false,
    }
}

/// Placeholder YouTube cookies. A zero expiry serializes as one year out.
pub fn demo_cookies(now: DateTime<Utc>) -> Vec<CookieRecord> {
    let expiration = default_expiration(now);
    [
        ("VISITOR_INFO1_LIVE", "demo_visitor_info", false),
        ("YSC", "demo_ysc_value", true),
        ("PREF", "demo_pref_value", false),
    ]
    .into_iter()
    .map(|(name, value, http_only)| CookieRecord {
        name: name.to_string(),
        value: value.to_string(),
        domain: DEFAULT_COOKIE_DOMAIN.to_string(),
        path: "/".to_string(),
        secure: "true".to_string(),
        http_only: http_only.to_string(),
        expiration_date: expiration.clone(),
    })
    .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Success,
    Error,
}

/// Inline message shown under the panel after an update attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieStatus {
    pub kind: StatusKind,
    pub message: String,
    pub used_demo: bool,
}

impl CookieStatus {
    fn error(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            message: message.into(),
            used_demo: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == StatusKind::Success
    }
}

async fn upload(
    backend: &Arc<dyn Backend>,
    cancel: &CancellationToken,
    payload: CookieUpload,
    language: Language,
    used_demo: bool,
) -> CookieStatus {
    let sent = payload.cookies.len() as u64;
    match api::call(backend, cancel, move |b| b.upload_cookies(&payload)).await {
        Ok(response) => {
            let count = response.cookies_count.unwrap_or(sent);
            info!(count, used_demo, "cookies updated");
            let mut message = tf(language, "cookie.success", &[("count", count.to_string())]);
            if used_demo {
                message = format!("{message} ({})", t(language, "cookie.demo_used"));
            }
            CookieStatus {
                kind: StatusKind::Success,
                message,
                used_demo,
            }
        }
        Err(err) => {
            warn!(error = %err, "cookie update failed");
            CookieStatus::error(t(language, "cookie.failure"))
        }
    }
}

/// Text-paste path. Validation failures never reach the network.
pub async fn submit_pasted(
    backend: &Arc<dyn Backend>,
    cancel: &CancellationToken,
    text: &str,
    language: Language,
    now: DateTime<Utc>,
) -> CookieStatus {
    let cookies = match parse_cookie_text(text, now) {
        Ok(cookies) => cookies,
        Err(ValidationError::EmptyCookies) => {
            return CookieStatus::error(t(language, "cookie.empty"));
        }
        Err(_) => return CookieStatus::error(t(language, "cookie.unparseable")),
    };
    upload(
        backend,
        cancel,
        CookieUpload::new(cookies, DEFAULT_COOKIE_DOMAIN),
        language,
        false,
    )
    .await
}

/// Browser-jar path. The payload domain is the jar's host.
pub async fn submit_browser(
    backend: &Arc<dyn Backend>,
    cancel: &CancellationToken,
    jar: JarCookies,
    language: Language,
) -> CookieStatus {
    if jar.cookies.is_empty() {
        return CookieStatus::error(t(language, "cookie.none_found"));
    }
    let used_demo = jar.used_demo;
    upload(
        backend,
        cancel,
        CookieUpload::new(jar.cookies, &jar.domain),
        language,
        used_demo,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{Call, ScriptedBackend, status};
    use crate::api::CookieUploadResponse;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn parses_pasted_header_with_defaults() {
        let cookies = parse_cookie_text(" SID = abc ; token=a=b==;bare; =x;", now()).unwrap();
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].name, "SID");
        assert_eq!(cookies[0].value, "abc");
        assert_eq!(cookies[1].value, "a=b==");
        assert_eq!(cookies[0].domain, ".youtube.com");
        assert_eq!(cookies[0].secure, "TRUE");
        assert_eq!(cookies[0].http_only, "FALSE");
        assert_eq!(cookies[0].expiration_date, (now().timestamp() + ONE_YEAR_SECS).to_string());
    }

    #[test]
    fn rejects_empty_and_unparseable_text() {
        assert_eq!(parse_cookie_text("   ", now()), Err(ValidationError::EmptyCookies));
        assert_eq!(
            parse_cookie_text("nothing here; =x", now()),
            Err(ValidationError::UnparseableCookies)
        );
    }

    #[test]
    fn serializes_camel_case_flags() {
        let cookies = parse_cookie_text("a=b", now()).unwrap();
        let json = serde_json::to_value(CookieUpload::new(cookies, DEFAULT_COOKIE_DOMAIN)).unwrap();
        assert_eq!(json["format"], "netscape");
        assert_eq!(json["cookies"][0]["httpOnly"], "FALSE");
        assert!(json["cookies"][0]["expirationDate"].is_string());
    }

    #[test]
    fn jar_decodes_values_and_uses_site_host() {
        let site = Url::parse("https://www.youtube.com/").unwrap();
        let jar = read_cookie_jar("PREF=f1%3D5; empty=; =v", &site, now(), true);
        assert!(!jar.used_demo);
        assert_eq!(jar.domain, "www.youtube.com");
        assert_eq!(jar.cookies.len(), 1);
        assert_eq!(jar.cookies[0].value, "f1=5");
        assert_eq!(jar.cookies[0].secure, "true");
        assert_eq!(jar.cookies[0].http_only, "false");
    }

    #[test]
    fn empty_jar_only_uses_demo_when_enabled() {
        let site = Url::parse("http://localhost:5173").unwrap();
        assert!(read_cookie_jar("", &site, now(), false).cookies.is_empty());

        let jar = read_cookie_jar("", &site, now(), true);
        assert!(jar.used_demo);
        let names: Vec<_> = jar.cookies.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["VISITOR_INFO1_LIVE", "YSC", "PREF"]);
        assert_eq!(jar.cookies[1].http_only, "true");
        assert!(jar.cookies.iter().all(|c| c.expiration_date != "0"));
    }

    #[tokio::test]
    async fn empty_paste_never_hits_the_network() {
        let scripted = Arc::new(ScriptedBackend::default());
        let backend: Arc<dyn Backend> = scripted.clone();
        let cancel = CancellationToken::new();
        let status = submit_pasted(&backend, &cancel, "", Language::Zh, now()).await;
        assert_eq!(status.message, "请先粘贴 Cookie 内容");
        assert!(!status.is_success());
        assert!(scripted.calls().is_empty());
    }

    #[tokio::test]
    async fn pasted_upload_reports_server_count() {
        let scripted = Arc::new(ScriptedBackend::default());
        scripted.cookies.lock().push_back(Ok(CookieUploadResponse {
            cookies_count: Some(5),
        }));
        let backend: Arc<dyn Backend> = scripted.clone();
        let cancel = CancellationToken::new();
        let status = submit_pasted(&backend, &cancel, "a=1; b=2", Language::Zh, now()).await;
        assert!(status.is_success());
        assert_eq!(status.message, "成功更新 5 个 Cookie");
        let calls = scripted.calls();
        let Call::Cookies(payload) = &calls[0] else {
            panic!("expected cookie upload, got {calls:?}");
        };
        assert_eq!(payload.domain, ".youtube.com");
        assert_eq!(payload.cookies.len(), 2);
    }

    #[tokio::test]
    async fn failed_upload_shows_generic_message() {
        let scripted = Arc::new(ScriptedBackend::default());
        scripted.cookies.lock().push_back(Err(status(500)));
        let backend: Arc<dyn Backend> = scripted.clone();
        let cancel = CancellationToken::new();
        let status = submit_pasted(&backend, &cancel, "a=1", Language::En, now()).await;
        assert_eq!(status.message, "Cookie update failed, please try again");
    }

    #[tokio::test]
    async fn browser_path_flags_demo_cookies() {
        let scripted = Arc::new(ScriptedBackend::default());
        let backend: Arc<dyn Backend> = scripted.clone();
        let site = Url::parse("https://www.youtube.com").unwrap();
        let jar = read_cookie_jar("", &site, now(), true);
        let status = submit_browser(&backend, &CancellationToken::new(), jar, Language::En).await;
        assert!(status.is_success());
        assert!(status.used_demo);
        assert!(status.message.starts_with("Successfully updated 3 cookie(s)"));

        let empty = read_cookie_jar("", &site, now(), false);
        let status = submit_browser(&backend, &CancellationToken::new(), empty, Language::En).await;
        assert!(!status.is_success());
        assert_eq!(scripted.calls().len(), 1);
    }
}
