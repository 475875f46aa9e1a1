#![forbid(unsafe_code)]

//! URL allow-list and the quality picker built from analyzed formats.

use crate::api::RemoteFormat;
use crate::normalize::{NOT_AVAILABLE, format_file_size};
use indexmap::IndexMap;
use url::Url;

pub const ALLOWED_DOMAINS: [&str; 8] = [
    "youtube.com",
    "youtu.be",
    "vimeo.com",
    "dailymotion.com",
    "twitch.tv",
    "facebook.com",
    "instagram.com",
    "tiktok.com",
];

/// Ascending resolution ladder. Tiers outside it sort after, alphabetically.
pub const QUALITY_LADDER: [&str; 7] = ["360p", "480p", "720p", "1080p", "1440p", "2160p", "4K"];

pub const UNKNOWN_QUALITY: &str = "Unknown";
pub const PREFERRED_QUALITY: &str = "1080p";
const CONTAINER: &str = "mp4";

/// True when `input` parses as a URL whose host contains an allowed domain.
pub fn is_valid_video_url(input: &str) -> bool {
    let Ok(url) = Url::parse(input.trim()) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    ALLOWED_DOMAINS.iter().any(|domain| host.contains(domain))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOption {
    /// Backend format identifier sent with the download request.
    pub value: String,
    pub quality: String,
    pub label: String,
    pub size: String,
}

/// Human label for a tier, e.g. `Full HD (1080p)`.
pub fn quality_label(quality: &str) -> String {
    match quality {
        "4K" | "2160p" => "4K (2160p)".to_string(),
        "1440p" => "2K (1440p)".to_string(),
        "1080p" => "Full HD (1080p)".to_string(),
        "720p" => "HD (720p)".to_string(),
        "480p" => "SD (480p)".to_string(),
        other => other.to_string(),
    }
}

/// Buckets a `WIDTHxHEIGHT` resolution the way the analyzer does.
pub fn quality_from_resolution(resolution: &str) -> Option<&'static str> {
    let (_, height) = resolution.trim().split_once('x')?;
    let height: u32 = height.trim().parse().ok()?;
    let tier = match height {
        360..480 => "360p",
        480..720 => "480p",
        720..1080 => "720p",
        1080..1440 => "1080p",
        1440..2160 => "1440p",
        2160..4320 => "4K",
        _ => UNKNOWN_QUALITY,
    };
    Some(tier)
}

fn quality_of(format: &RemoteFormat) -> String {
    format
        .quality
        .as_deref()
        .map(str::trim)
        .filter(|quality| !quality.is_empty())
        .map(str::to_string)
        .or_else(|| {
            format
                .resolution
                .as_deref()
                .and_then(quality_from_resolution)
                .map(str::to_string)
        })
        .unwrap_or_else(|| UNKNOWN_QUALITY.to_string())
}

fn is_mp4(format: &RemoteFormat) -> bool {
    format
        .ext
        .as_deref()
        .is_some_and(|ext| ext.trim().eq_ignore_ascii_case(CONTAINER))
}

/// MP4 formats, one per tier (largest file wins), best tier first.
pub fn build_format_options(formats: &[RemoteFormat]) -> Vec<FormatOption> {
    let mut best: IndexMap<String, &RemoteFormat> = IndexMap::new();
    for format in formats.iter().filter(|format| is_mp4(format)) {
        let quality = quality_of(format);
        match best.get(&quality) {
            Some(current) if current.filesize.unwrap_or(0) >= format.filesize.unwrap_or(0) => {}
            _ => {
                best.insert(quality, format);
            }
        }
    }

    let mut tiers: Vec<(String, &RemoteFormat)> = best.into_iter().collect();
    tiers.sort_by(|(a, _), (b, _)| {
        let rank_a = QUALITY_LADDER.iter().position(|tier| tier == a);
        let rank_b = QUALITY_LADDER.iter().position(|tier| tier == b);
        match (rank_a, rank_b) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.cmp(b),
        }
    });

    tiers
        .into_iter()
        .map(|(quality, format)| FormatOption {
            value: format.format_id.clone(),
            label: quality_label(&quality),
            size: format
                .filesize
                .map(format_file_size)
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            quality,
        })
        .collect()
}

/// Index preselected in the picker: 1080p when offered, else the best tier.
pub fn default_choice(options: &[FormatOption]) -> Option<usize> {
    if options.is_empty() {
        return None;
    }
    Some(
        options
            .iter()
            .position(|option| option.quality == PREFERRED_QUALITY)
            .unwrap_or(0),
    )
}
