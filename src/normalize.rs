#![forbid(unsafe_code)]

//! Maps backend records to display-ready [`Video`] values.
//!
//! Nothing in here fails: missing or malformed fields degrade to `N/A`, `0`
//! or an empty string.

use crate::api::ApiVideo;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fmt;
use std::path::Path;

pub const NOT_AVAILABLE: &str = "N/A";

/// Platform badge derived from the canonical URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoSource {
    YouTube,
    Bilibili,
    X,
    Unknown,
}

impl VideoSource {
    pub fn classify(url: &str) -> VideoSource {
        let url = url.to_ascii_lowercase();
        if url.contains("youtube.com") || url.contains("youtu.be") {
            VideoSource::YouTube
        } else if url.contains("bilibili.com") {
            VideoSource::Bilibili
        } else if url.contains("x.com") || url.contains("twitter.com") {
            VideoSource::X
        } else {
            VideoSource::Unknown
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            VideoSource::YouTube => "YouTube",
            VideoSource::Bilibili => "Bilibili",
            VideoSource::X => "X",
            VideoSource::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for VideoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Optional metadata shown in the player side panel and list rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoDetails {
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub uploader: Option<String>,
    pub view_count: String,
    pub like_count: String,
    pub dislike_count: String,
    pub comment_count: String,
    pub average_rating: Option<f64>,
    pub channel_id: Option<String>,
    pub channel_url: Option<String>,
    pub upload_date: String,
    pub age_limit: Option<u64>,
}

/// One library entry as the UI shows it. Every display field is derived.
#[derive(Debug, Clone, PartialEq)]
pub struct Video {
    pub id: String,
    pub title: String,
    pub thumbnail: Option<String>,
    pub duration: String,
    pub format: String,
    pub file_size: String,
    pub downloaded_at: String,
    /// Parsed form of `downloaded_at`, used for the local date sort.
    pub saved_at: Option<NaiveDateTime>,
    pub url: String,
    pub local_url: Option<String>,
    pub direct_url: Option<String>,
    pub source: VideoSource,
    pub details: VideoDetails,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Prefixes a backend-relative path with `origin`. Absolute URLs pass through.
pub fn absolutize(origin: &str, path: Option<&str>) -> Option<String> {
    let path = non_empty(path)?;
    if path.starts_with("http://") || path.starts_with("https://") {
        return Some(path.to_string());
    }
    let origin = origin.trim_end_matches('/');
    if path.starts_with('/') {
        Some(format!("{origin}{path}"))
    } else {
        Some(format!("{origin}/{path}"))
    }
}

pub fn normalize(record: &ApiVideo, origin: &str) -> Video {
    let title = non_empty(Some(record.video_page_name.as_str()))
        .or_else(|| non_empty(record.original_file_name.as_deref()))
        .unwrap_or(record.id.as_str())
        .to_string();
    let saved_at = record.saved_at.as_deref().and_then(parse_timestamp);
    Video {
        id: record.id.clone(),
        title,
        thumbnail: absolutize(origin, record.thumbnail_url.as_deref()),
        duration: format_duration(record.duration),
        format: format_label(record.library_file_name.as_deref()),
        file_size: format_file_size(record.file_size.unwrap_or(0)),
        downloaded_at: format_date(record.saved_at.as_deref()),
        saved_at,
        url: record.video_url.clone(),
        local_url: absolutize(origin, record.video_local_url.as_deref()),
        direct_url: absolutize(origin, record.video_direct_url.as_deref()),
        source: VideoSource::classify(&record.video_url),
        details: VideoDetails {
            description: non_empty(record.description.as_deref()).map(str::to_string),
            category: non_empty(record.category.as_deref()).map(str::to_string),
            tags: record
                .selected_tags
                .iter()
                .map(|tag| tag.trim())
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect(),
            uploader: non_empty(record.uploader.as_deref()).map(str::to_string),
            view_count: format_number(record.view_count),
            like_count: format_number(record.like_count),
            dislike_count: format_number(record.dislike_count),
            comment_count: format_number(record.comment_count),
            average_rating: record.average_rating,
            channel_id: non_empty(record.channel_id.as_deref()).map(str::to_string),
            channel_url: non_empty(record.channel_url.as_deref()).map(str::to_string),
            upload_date: format_date(record.upload_date.as_deref()),
            age_limit: record.age_limit.filter(|limit| *limit > 0),
        },
    }
}

/// `M:SS`, minutes unbounded. Fractions are dropped.
pub fn format_duration(seconds: Option<f64>) -> String {
    let Some(seconds) = seconds.filter(|s| s.is_finite() && *s > 0.0) else {
        return NOT_AVAILABLE.to_string();
    };
    let total = seconds.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Largest unit in B..GB with one decimal, a trailing `.0` trimmed.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rendered = format!("{value:.1}");
    let rendered = rendered.strip_suffix(".0").unwrap_or(&rendered);
    format!("{rendered} {}", UNITS[unit])
}

/// Accepts RFC 3339, naive ISO date-times, `YYYY-MM-DD` and `YYYYMMDD`.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_local());
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, pattern) {
            return Some(parsed);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| compact_date(raw))
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// `YYYYMMDD`, the layout extractors use for upload dates.
fn compact_date(value: &str) -> Option<NaiveDate> {
    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::from_ymd_opt(
        value[0..4].parse().ok()?,
        value[4..6].parse().ok()?,
        value[6..8].parse().ok()?,
    )
}

/// `Jan 5, 2024`. Unparseable input renders as `N/A`.
pub fn format_date(raw: Option<&str>) -> String {
    raw.and_then(parse_timestamp)
        .map(|parsed| parsed.format("%b %-d, %Y").to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Uppercased extension of the stored file name, `MP4` when there is none.
pub fn format_label(file_name: Option<&str>) -> String {
    non_empty(file_name)
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(str::to_ascii_uppercase)
        .unwrap_or_else(|| "MP4".to_string())
}

/// Compact engagement count: `999`, `1.5K`, `2.0M`, `1.2B`.
pub fn format_number(count: Option<u64>) -> String {
    match count.unwrap_or(0) {
        0 => "0".to_string(),
        n if n < 1_000 => n.to_string(),
        n if n < 1_000_000 => format!("{:.1}K", n as f64 / 1_000.0),
        n if n < 1_000_000_000 => format!("{:.1}M", n as f64 / 1_000_000.0),
        n => format!("{:.1}B", n as f64 / 1_000_000_000.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "http://localhost:6800";

    fn record() -> ApiVideo {
        ApiVideo {
            id: "v1".into(),
            video_url: "https://www.youtube.com/watch?v=abc".into(),
            video_page_name: "Rust in 100 Seconds".into(),
            library_file_name: Some("abc_rust.webm".into()),
            file_size: Some(1536),
            saved_at: Some("2024-03-05T10:20:30.123456".into()),
            video_local_url: Some("/videopage_file/v1".into()),
            thumbnail_url: Some("video_library/abc.jpg".into()),
            selected_tags: vec![" rust ".into(), "".into()],
            view_count: Some(1_260_000),
            upload_date: Some("20240301".into()),
            duration: Some(65.9),
            ..ApiVideo::default()
        }
    }

    #[test]
    fn normalizes_full_record() {
        let video = normalize(&record(), ORIGIN);
        assert_eq!(video.title, "Rust in 100 Seconds");
        assert_eq!(video.duration, "1:05");
        assert_eq!(video.file_size, "1.5 KB");
        assert_eq!(video.format, "WEBM");
        assert_eq!(video.downloaded_at, "Mar 5, 2024");
        assert_eq!(
            video.local_url.as_deref(),
            Some("http://localhost:6800/videopage_file/v1")
        );
        assert_eq!(
            video.thumbnail.as_deref(),
            Some("http://localhost:6800/video_library/abc.jpg")
        );
        assert_eq!(video.direct_url, None);
        assert_eq!(video.source, VideoSource::YouTube);
        assert_eq!(video.details.tags, vec!["rust".to_string()]);
        assert_eq!(video.details.view_count, "1.3M");
        assert_eq!(video.details.like_count, "0");
        assert_eq!(video.details.upload_date, "Mar 1, 2024");
    }

    #[test]
    fn sparse_record_degrades_instead_of_failing() {
        let video = normalize(
            &ApiVideo {
                id: "bare".into(),
                saved_at: Some("yesterday".into()),
                ..ApiVideo::default()
            },
            ORIGIN,
        );
        assert_eq!(video.title, "bare");
        assert_eq!(video.duration, "N/A");
        assert_eq!(video.file_size, "0 B");
        assert_eq!(video.downloaded_at, "N/A");
        assert_eq!(video.saved_at, None);
        assert_eq!(video.format, "MP4");
        assert_eq!(video.thumbnail, None);
        assert_eq!(video.source, VideoSource::Unknown);
    }

    #[test]
    fn duration_pads_seconds() {
        assert_eq!(format_duration(Some(65.0)), "1:05");
        assert_eq!(format_duration(Some(5.0)), "0:05");
        assert_eq!(format_duration(Some(3725.0)), "62:05");
        assert_eq!(format_duration(Some(0.0)), "N/A");
        assert_eq!(format_duration(None), "N/A");
        assert_eq!(format_duration(Some(f64::NAN)), "N/A");
    }

    #[test]
    fn file_size_respects_unit_boundaries() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(1023), "1023 B");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024 / 2), "1.5 GB");
        assert_eq!(format_file_size(4096 * 1024 * 1024 * 1024), "4096 GB");
    }

    #[test]
    fn dates_accept_several_layouts() {
        assert_eq!(format_date(Some("2024-01-01T08:00:00Z")), "Jan 1, 2024");
        assert_eq!(format_date(Some("2024-12-25 23:59:59")), "Dec 25, 2024");
        assert_eq!(format_date(Some("2023-07-04")), "Jul 4, 2023");
        assert_eq!(format_date(Some("")), "N/A");
        assert_eq!(format_date(None), "N/A");
    }

    #[test]
    fn source_classification_by_substring() {
        assert_eq!(VideoSource::classify("https://youtu.be/x"), VideoSource::YouTube);
        assert_eq!(
            VideoSource::classify("https://www.bilibili.com/video/BV1"),
            VideoSource::Bilibili
        );
        assert_eq!(VideoSource::classify("https://twitter.com/a/status/1"), VideoSource::X);
        assert_eq!(VideoSource::classify("https://x.com/a/status/1"), VideoSource::X);
        assert_eq!(VideoSource::classify("https://vimeo.com/1"), VideoSource::Unknown);
    }

    #[test]
    fn engagement_counts_are_compact() {
        assert_eq!(format_number(None), "0");
        assert_eq!(format_number(Some(999)), "999");
        assert_eq!(format_number(Some(1_500)), "1.5K");
        assert_eq!(format_number(Some(2_000_000)), "2.0M");
        assert_eq!(format_number(Some(1_200_000_000)), "1.2B");
    }

    #[test]
    fn absolute_urls_are_left_alone() {
        assert_eq!(
            absolutize("http://h:1/", Some("https://cdn.example/t.jpg")).as_deref(),
            Some("https://cdn.example/t.jpg")
        );
        assert_eq!(absolutize("http://h:1/", Some("  ")), None);
    }
}
