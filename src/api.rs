#![forbid(unsafe_code)]

//! Backend REST surface: wire types, the [`Backend`] seam and a blocking
//! `ureq` implementation.
//!
//! Every call is blocking. Async callers go through [`call`], which moves the
//! request onto the blocking pool and races it against a cancellation token.

use crate::cookies::CookieUpload;
use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_BACKEND_ORIGIN: &str = "http://localhost:6800";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Loose {
    Int(u64),
    Float(f64),
    Text(String),
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Loose>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match value {
        Loose::Int(n) => Some(n),
        Loose::Float(f) if f.is_finite() && f >= 0.0 => Some(f as u64),
        Loose::Float(_) => None,
        Loose::Text(s) => s.trim().parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f as u64),
    }))
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Loose>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match value {
        Loose::Int(n) => Some(n as f64),
        Loose::Float(f) => Some(f).filter(|f| f.is_finite()),
        Loose::Text(s) => s.trim().parse::<f64>().ok(),
    }))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Loose>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Loose::Int(n)) => n.to_string(),
        Some(Loose::Float(f)) => f.to_string(),
        Some(Loose::Text(s)) => s,
        None => String::new(),
    })
}

fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<OneOrMany<String>>::deserialize(deserializer)?;
    Ok(match raw {
        Some(OneOrMany::One(tag)) if tag.trim().is_empty() => Vec::new(),
        Some(OneOrMany::One(tag)) => vec![tag],
        Some(OneOrMany::Many(tags)) => tags,
        None => Vec::new(),
    })
}

/// A library entry exactly as the backend persists it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiVideo {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub video_url: String,
    #[serde(deserialize_with = "lenient_string")]
    pub video_page_name: String,
    pub original_file_name: Option<String>,
    pub library_file_name: Option<String>,
    pub file_path: Option<String>,
    #[serde(deserialize_with = "lenient_u64")]
    pub file_size: Option<u64>,
    pub saved_at: Option<String>,
    pub video_local_url: Option<String>,
    pub video_direct_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    #[serde(deserialize_with = "string_list")]
    pub selected_tags: Vec<String>,
    pub uploader: Option<String>,
    #[serde(deserialize_with = "lenient_u64")]
    pub view_count: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    pub like_count: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    pub dislike_count: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    pub comment_count: Option<u64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub average_rating: Option<f64>,
    pub channel_id: Option<String>,
    pub channel_url: Option<String>,
    pub upload_date: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub duration: Option<f64>,
    #[serde(deserialize_with = "lenient_u64")]
    pub age_limit: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ListResponse {
    pub videos: Vec<ApiVideo>,
    #[serde(deserialize_with = "lenient_u64")]
    pub total_videos: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    SavedAt,
    Title,
    ViewCount,
    LikeCount,
    Duration,
}

impl SortBy {
    pub const ALL: [SortBy; 5] = [
        SortBy::SavedAt,
        SortBy::Title,
        SortBy::ViewCount,
        SortBy::LikeCount,
        SortBy::Duration,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortBy::SavedAt => "saved_at",
            SortBy::Title => "title",
            SortBy::ViewCount => "view_count",
            SortBy::LikeCount => "like_count",
            SortBy::Duration => "duration",
        }
    }

    pub fn label_key(self) -> &'static str {
        match self {
            SortBy::SavedAt => "sort.saved_at",
            SortBy::Title => "sort.title",
            SortBy::ViewCount => "sort.view_count",
            SortBy::LikeCount => "sort.like_count",
            SortBy::Duration => "sort.duration",
        }
    }

    pub fn next(self) -> SortBy {
        let idx = SortBy::ALL.iter().position(|&s| s == self).unwrap_or(0);
        SortBy::ALL[(idx + 1) % SortBy::ALL.len()]
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        SortBy::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == value.trim())
            .ok_or_else(|| format!("unknown sort key: {value}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Desc,
    Asc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Desc => "desc",
            SortOrder::Asc => "asc",
        }
    }

    pub fn label_key(self) -> &'static str {
        match self {
            SortOrder::Desc => "order.desc",
            SortOrder::Asc => "order.asc",
        }
    }

    pub fn flip(self) -> SortOrder {
        match self {
            SortOrder::Desc => SortOrder::Asc,
            SortOrder::Asc => SortOrder::Desc,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "desc" => Ok(SortOrder::Desc),
            "asc" => Ok(SortOrder::Asc),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

/// Query parameters of the listing endpoint. Empty filters are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub search: String,
    pub category: String,
    pub uploader: String,
    pub sort_by: SortBy,
    pub order: SortOrder,
}

impl ListQuery {
    /// Newest first, which is what the recents strip asks for.
    pub fn newest() -> Self {
        Self {
            sort_by: SortBy::SavedAt,
            order: SortOrder::Desc,
            ..Self::default()
        }
    }

    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        for (key, value) in [
            ("search", &self.search),
            ("category", &self.category),
            ("uploader", &self.uploader),
        ] {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                pairs.push((key, trimmed.to_string()));
            }
        }
        pairs.push(("sort_by", self.sort_by.as_str().to_string()));
        pairs.push(("order", self.order.as_str().to_string()));
        pairs
    }
}

/// One downloadable rendition reported by the analyze step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteFormat {
    #[serde(deserialize_with = "lenient_string")]
    pub format_id: String,
    pub ext: Option<String>,
    pub quality: Option<String>,
    pub resolution: Option<String>,
    #[serde(deserialize_with = "lenient_u64")]
    pub filesize: Option<u64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub abr: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub vbr: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub tbr: Option<f64>,
    pub acodec: Option<String>,
    pub format_note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalyzedVideo {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(deserialize_with = "lenient_string")]
    pub url: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub duration: Option<f64>,
    pub thumbnail: Option<String>,
    pub uploader: Option<String>,
    #[serde(deserialize_with = "lenient_u64")]
    pub view_count: Option<u64>,
    pub formats: Vec<RemoteFormat>,
}

fn into_object(stage: &str, value: Value) -> ApiResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ApiError::Decode(format!(
            "{stage} response must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Result of the analyze step. `raw` is kept verbatim for the later steps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyzeReport {
    pub videos: Vec<AnalyzedVideo>,
    pub raw: Map<String, Value>,
}

impl AnalyzeReport {
    pub fn from_value(value: Value) -> ApiResult<Self> {
        let raw = into_object("analyze", value)?;
        let videos = match raw.get("videos") {
            None | Some(Value::Null) => Vec::new(),
            Some(videos) => Vec::<AnalyzedVideo>::deserialize(videos)
                .map_err(|err| ApiError::Decode(format!("analyze videos: {err}")))?,
        };
        Ok(Self { videos, raw })
    }

    /// Formats of the first analyzed video, the only one the form offers.
    pub fn formats(&self) -> &[RemoteFormat] {
        self.videos
            .first()
            .map(|video| video.formats.as_slice())
            .unwrap_or(&[])
    }

    pub fn title(&self) -> Option<&str> {
        self.videos
            .first()
            .map(|video| video.title.as_str())
            .filter(|title| !title.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadReport {
    pub raw: Map<String, Value>,
}

impl DownloadReport {
    pub fn from_value(value: Value) -> ApiResult<Self> {
        Ok(Self {
            raw: into_object("download", value)?,
        })
    }

    pub fn filename(&self) -> Option<&str> {
        self.raw.get("filename").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveReport {
    pub raw: Map<String, Value>,
}

impl SaveReport {
    pub fn from_value(value: Value) -> ApiResult<Self> {
        Ok(Self {
            raw: into_object("save", value)?,
        })
    }

    pub fn video_id(&self) -> Option<String> {
        match self.raw.get("video_id")? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CookieUploadResponse {
    #[serde(deserialize_with = "lenient_u64")]
    pub cookies_count: Option<u64>,
}

/// Everything the client needs from the backend.
pub trait Backend: Send + Sync {
    fn analyze(&self, url: &str) -> ApiResult<AnalyzeReport>;
    fn download(&self, url: &str, format: &str, video_info: &Value) -> ApiResult<DownloadReport>;
    fn save(&self, body: &Value) -> ApiResult<SaveReport>;
    fn list(&self, query: &ListQuery) -> ApiResult<ListResponse>;
    fn delete_video(&self, id: &str) -> ApiResult<()>;
    fn upload_cookies(&self, payload: &CookieUpload) -> ApiResult<CookieUploadResponse>;
}

/// Runs a blocking backend call off the async runtime.
///
/// Returns [`ApiError::Cancelled`] as soon as `cancel` fires. The blocking
/// request itself cannot be interrupted; its result is discarded.
pub async fn call<T, F>(
    backend: &Arc<dyn Backend>,
    cancel: &CancellationToken,
    op: F,
) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn Backend) -> ApiResult<T> + Send + 'static,
{
    if cancel.is_cancelled() {
        return Err(ApiError::Cancelled);
    }
    let backend = Arc::clone(backend);
    let task = tokio::task::spawn_blocking(move || op(backend.as_ref()));
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ApiError::Cancelled),
        joined = task => match joined {
            Ok(result) => result,
            Err(err) => Err(ApiError::Transport(format!("request task failed: {err}"))),
        },
    }
}

/// `ureq` client bound to one backend origin.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    origin: Url,
    agent: ureq::Agent,
}

impl HttpBackend {
    pub fn new(origin: &Url, timeout: Option<Duration>) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let mut origin = origin.clone();
        if !origin.path().ends_with('/') {
            let path = format!("{}/", origin.path());
            origin.set_path(&path);
        }
        Self {
            origin,
            agent: builder.build(),
        }
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.origin.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ApiError::Transport(format!("{} cannot be a base", self.origin)))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    fn post_json(&self, segments: &[&str], body: &impl Serialize) -> ApiResult<Value> {
        let url = self.endpoint(segments)?;
        debug!(method = "POST", url = %url, "backend request");
        let response = self
            .agent
            .post(url.as_str())
            .send_json(body)
            .map_err(|err| map_ureq_error("POST", &url, err))?;
        response
            .into_json::<Value>()
            .map_err(|err| ApiError::Decode(err.to_string()))
    }
}

fn map_ureq_error(method: &str, url: &Url, err: ureq::Error) -> ApiError {
    let mapped = match err {
        ureq::Error::Status(status, response) => ApiError::Status {
            status,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => ApiError::Transport(transport.to_string()),
    };
    warn!(method, url = %url, error = %mapped, "backend request failed");
    mapped
}

impl Backend for HttpBackend {
    fn analyze(&self, url: &str) -> ApiResult<AnalyzeReport> {
        let value = self.post_json(&["videopage_analyze"], &serde_json::json!({ "url": url }))?;
        AnalyzeReport::from_value(value)
    }

    fn download(&self, url: &str, format: &str, video_info: &Value) -> ApiResult<DownloadReport> {
        let body = serde_json::json!({
            "url": url,
            "format": format,
            "format_id": format,
            "video_info": video_info,
        });
        let value = self.post_json(&["videopage_download"], &body)?;
        DownloadReport::from_value(value)
    }

    fn save(&self, body: &Value) -> ApiResult<SaveReport> {
        let value = self.post_json(&["videopage_save"], body)?;
        SaveReport::from_value(value)
    }

    fn list(&self, query: &ListQuery) -> ApiResult<ListResponse> {
        let url = self.endpoint(&["videopage_list"])?;
        debug!(method = "GET", url = %url, ?query, "backend request");
        let mut request = self.agent.get(url.as_str());
        for (key, value) in query.pairs() {
            request = request.query(key, &value);
        }
        let response = request
            .call()
            .map_err(|err| map_ureq_error("GET", &url, err))?;
        response
            .into_json::<ListResponse>()
            .map_err(|err| ApiError::Decode(err.to_string()))
    }

    fn delete_video(&self, id: &str) -> ApiResult<()> {
        let url = self.endpoint(&["api", "videos", id])?;
        debug!(method = "DELETE", url = %url, "backend request");
        self.agent
            .delete(url.as_str())
            .call()
            .map_err(|err| map_ureq_error("DELETE", &url, err))?;
        Ok(())
    }

    fn upload_cookies(&self, payload: &CookieUpload) -> ApiResult<CookieUploadResponse> {
        let value = self.post_json(&["cookie"], payload)?;
        CookieUploadResponse::deserialize(&value).map_err(|err| ApiError::Decode(err.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory backend shared by the view-model tests.

    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Analyze(String),
        Download { url: String, format: String },
        Save(Value),
        List(ListQuery),
        Delete(String),
        Cookies(CookieUpload),
    }

    #[derive(Default)]
    pub struct ScriptedBackend {
        pub calls: Mutex<Vec<Call>>,
        pub analyze: Mutex<VecDeque<ApiResult<Value>>>,
        pub download: Mutex<VecDeque<ApiResult<Value>>>,
        pub save: Mutex<VecDeque<ApiResult<Value>>>,
        pub list: Mutex<VecDeque<ApiResult<ListResponse>>>,
        pub delete_failures: Mutex<Vec<String>>,
        pub cookies: Mutex<VecDeque<ApiResult<CookieUploadResponse>>>,
    }

    pub fn status(code: u16) -> ApiError {
        ApiError::Status {
            status: code,
            body: String::new(),
        }
    }

    impl ScriptedBackend {
        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }

        fn next<T>(
            queue: &Mutex<VecDeque<ApiResult<T>>>,
            fallback: impl FnOnce() -> T,
        ) -> ApiResult<T> {
            queue.lock().pop_front().unwrap_or_else(|| Ok(fallback()))
        }
    }

    impl Backend for ScriptedBackend {
        fn analyze(&self, url: &str) -> ApiResult<AnalyzeReport> {
            self.calls.lock().push(Call::Analyze(url.to_string()));
            let value = Self::next(&self.analyze, || serde_json::json!({ "videos": [] }))?;
            AnalyzeReport::from_value(value)
        }

        fn download(
            &self,
            url: &str,
            format: &str,
            _video_info: &Value,
        ) -> ApiResult<DownloadReport> {
            self.calls.lock().push(Call::Download {
                url: url.to_string(),
                format: format.to_string(),
            });
            let value = Self::next(&self.download, || serde_json::json!({}))?;
            DownloadReport::from_value(value)
        }

        fn save(&self, body: &Value) -> ApiResult<SaveReport> {
            self.calls.lock().push(Call::Save(body.clone()));
            let value = Self::next(&self.save, || serde_json::json!({}))?;
            SaveReport::from_value(value)
        }

        fn list(&self, query: &ListQuery) -> ApiResult<ListResponse> {
            self.calls.lock().push(Call::List(query.clone()));
            Self::next(&self.list, ListResponse::default)
        }

        fn delete_video(&self, id: &str) -> ApiResult<()> {
            self.calls.lock().push(Call::Delete(id.to_string()));
            if self.delete_failures.lock().iter().any(|failing| failing == id) {
                return Err(status(500));
            }
            Ok(())
        }

        fn upload_cookies(&self, payload: &CookieUpload) -> ApiResult<CookieUploadResponse> {
            self.calls.lock().push(Call::Cookies(payload.clone()));
            Self::next(&self.cookies, CookieUploadResponse::default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::CookieRecord;
    use axum::{
        Json, Router,
        extract::{Path, Query},
        http::StatusCode,
        routing::{delete, get, post},
    };
    use std::collections::HashMap;

    async fn spawn_stub(router: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Url::parse(&format!("http://{addr}")).unwrap()
    }

    fn stub_router() -> Router {
        Router::new()
            .route(
                "/videopage_list",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    let mut keys: Vec<_> = params.keys().cloned().collect();
                    keys.sort();
                    Json(serde_json::json!({
                        "total_videos": 1,
                        "videos": [{
                            "id": 7,
                            "video_url": "https://youtu.be/abc",
                            "video_page_name": keys.join(","),
                            "file_size": 1536.0,
                            "selected_tags": "music",
                            "duration": 65.4,
                            "view_count": null,
                        }]
                    }))
                }),
            )
            .route(
                "/api/videos/{id}",
                delete(|Path(id): Path<String>| async move {
                    if id == "broken" {
                        StatusCode::INTERNAL_SERVER_ERROR
                    } else {
                        StatusCode::OK
                    }
                }),
            )
            .route(
                "/videopage_analyze",
                post(|Json(body): Json<Value>| async move {
                    Json(serde_json::json!({
                        "url": body["url"],
                        "videos_found": 1,
                        "videos": [{
                            "id": "abc",
                            "title": "Clip",
                            "url": body["url"],
                            "formats": [{"format_id": "22", "ext": "mp4", "quality": "720p", "filesize": 100}]
                        }]
                    }))
                }),
            )
            .route(
                "/videopage_save",
                post(|| async { Json(serde_json::json!(["not", "an", "object"])) }),
            )
            .route(
                "/cookie",
                post(|Json(body): Json<Value>| async move {
                    let count = body["cookies"].as_array().map(Vec::len).unwrap_or(0);
                    assert_eq!(body["format"], "netscape");
                    assert!(body["cookies"][0].get("httpOnly").is_some());
                    Json(serde_json::json!({ "cookies_count": count }))
                }),
            )
    }

    async fn stub_backend() -> Arc<dyn Backend> {
        let origin = spawn_stub(stub_router()).await;
        Arc::new(HttpBackend::new(&origin, Some(Duration::from_secs(5))))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn list_sends_only_non_empty_filters() {
        let backend = stub_backend().await;
        let cancel = CancellationToken::new();
        let query = ListQuery {
            search: "  ".into(),
            category: "Music".into(),
            ..ListQuery::default()
        };
        let response = call(&backend, &cancel, move |b| b.list(&query)).await.unwrap();
        assert_eq!(response.total_videos, Some(1));
        let video = &response.videos[0];
        assert_eq!(video.video_page_name, "category,order,sort_by");
        assert_eq!(video.id, "7");
        assert_eq!(video.file_size, Some(1536));
        assert_eq!(video.selected_tags, vec!["music".to_string()]);
        assert_eq!(video.view_count, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_maps_server_errors_to_status() {
        let backend = stub_backend().await;
        let cancel = CancellationToken::new();
        call(&backend, &cancel, |b| b.delete_video("ok-id")).await.unwrap();
        let err = call(&backend, &cancel, |b| b.delete_video("broken"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn analyze_narrows_formats() {
        let backend = stub_backend().await;
        let cancel = CancellationToken::new();
        let report = call(&backend, &cancel, |b| b.analyze("https://youtu.be/abc"))
            .await
            .unwrap();
        assert_eq!(report.title(), Some("Clip"));
        assert_eq!(report.formats()[0].filesize, Some(100));
        assert_eq!(report.raw["videos_found"], 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn non_object_save_response_is_rejected() {
        let backend = stub_backend().await;
        let cancel = CancellationToken::new();
        let err = call(&backend, &cancel, |b| b.save(&serde_json::json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cookie_upload_reports_count() {
        let backend = stub_backend().await;
        let cancel = CancellationToken::new();
        let payload = CookieUpload::new(
            vec![CookieRecord {
                name: "SID".into(),
                value: "x".into(),
                domain: ".youtube.com".into(),
                path: "/".into(),
                secure: "TRUE".into(),
                http_only: "FALSE".into(),
                expiration_date: "0".into(),
            }],
            ".youtube.com",
        );
        let response = call(&backend, &cancel, move |b| b.upload_cookies(&payload))
            .await
            .unwrap();
        assert_eq!(response.cookies_count, Some(1));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_backend_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let origin = Url::parse(&format!("http://{addr}")).unwrap();
        let backend: Arc<dyn Backend> = Arc::new(HttpBackend::new(&origin, None));
        let err = call(&backend, &CancellationToken::new(), |b| b.list(&ListQuery::newest()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let backend: Arc<dyn Backend> = Arc::new(testing::ScriptedBackend::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = call(&backend, &cancel, |b| b.list(&ListQuery::newest()))
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn endpoint_keeps_origin_prefix_and_escapes_ids() {
        let origin = Url::parse("http://host:6800/prefix").unwrap();
        let backend = HttpBackend::new(&origin, None);
        let url = backend.endpoint(&["api", "videos", "a b/c"]).unwrap();
        assert_eq!(url.as_str(), "http://host:6800/prefix/api/videos/a%20b%2Fc");
    }

    #[test]
    fn sort_keys_round_trip_through_strings() {
        for key in SortBy::ALL {
            assert_eq!(key.as_str().parse::<SortBy>().unwrap(), key);
        }
        assert!("rating".parse::<SortBy>().is_err());
        assert_eq!("asc".parse::<SortOrder>().unwrap(), SortOrder::Asc);
    }
}
