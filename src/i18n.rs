#![forbid(unsafe_code)]

//! English and Chinese UI strings with English fallback.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Zh,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::En, Language::Zh];

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Zh => "zh",
        }
    }

    /// Name shown in the language switcher, always in its own script.
    pub fn name(self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Zh => "中文",
        }
    }

    pub fn next(self) -> Language {
        let idx = Language::ALL.iter().position(|&l| l == self).unwrap_or(0);
        Language::ALL[(idx + 1) % Language::ALL.len()]
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Language::En),
            "zh" | "zh-cn" | "chinese" => Ok(Language::Zh),
            other => Err(format!("unsupported language: {other}")),
        }
    }
}

const EN: &[(&str, &str)] = &[
    ("app.title", "Video Wallet"),
    ("app.tagline", "Video Library Made Simple"),
    ("nav.home", "Home"),
    ("nav.library", "Library"),
    ("nav.config", "Settings"),
    ("upload.title", "Download Any Video"),
    (
        "upload.subtitle",
        "Paste a video URL and choose your preferred quality",
    ),
    ("upload.url_label", "Video URL"),
    ("upload.placeholder", "https://www.youtube.com/watch?v=..."),
    (
        "upload.invalid_url",
        "Please enter a valid video URL from supported platforms (YouTube, Vimeo, etc.)",
    ),
    ("upload.quality", "Video Quality"),
    ("upload.analyzing", "Analyzing available formats..."),
    ("upload.no_formats", "No MP4 formats are available for this video"),
    ("upload.analyze_error", "Could not load formats for this video"),
    ("upload.submit", "Download Video"),
    ("upload.processing", "Processing..."),
    ("pipeline.analyzing", "Analyzing video..."),
    ("pipeline.downloading", "Downloading video..."),
    ("pipeline.saving", "Saving to library..."),
    ("pipeline.completed", "Completed"),
    ("pipeline.failed", "Failed"),
    ("library.title", "Video Library"),
    ("library.count", "{count} video(s) in your collection"),
    ("library.selected", "{count} selected"),
    ("library.select_hint", "Click videos to select them"),
    ("library.loading", "Loading videos..."),
    ("library.error", "Failed to load videos"),
    ("library.retry", "Retry"),
    ("library.empty", "No videos yet"),
    (
        "library.empty_hint",
        "Download your first video to start your collection",
    ),
    ("library.no_match", "No videos match your filters"),
    ("library.clear_filters", "Clear filters"),
    ("library.search", "Search videos..."),
    ("library.category", "Category"),
    ("library.uploader", "Uploader"),
    ("library.all", "All"),
    ("library.sort", "Sort"),
    ("library.local_sort", "Local date sort"),
    ("view.grid", "Grid"),
    ("view.list", "List"),
    ("sort.saved_at", "Date added"),
    ("sort.title", "Title"),
    ("sort.view_count", "Views"),
    ("sort.like_count", "Likes"),
    ("sort.duration", "Duration"),
    ("order.desc", "Descending"),
    ("order.asc", "Ascending"),
    ("selection.enter", "Select"),
    ("selection.select_all", "Select all"),
    ("selection.clear", "Clear"),
    ("selection.exit", "Cancel"),
    ("selection.delete", "Delete"),
    (
        "selection.delete_confirm",
        "Are you sure you want to delete {count} video(s)? This action cannot be undone.",
    ),
    ("selection.deleting", "Deleting..."),
    ("selection.deleted", "Deleted {count} video(s)"),
    ("recent.title", "Recent Videos"),
    ("recent.empty", "No recent videos"),
    (
        "player.error",
        "This video could not be played. The file may be missing or in an unsupported format.",
    ),
    ("player.loading", "Starting playback..."),
    ("player.playing", "Playing"),
    ("player.download", "Download Video"),
    ("player.original", "View Original"),
    ("player.downloaded", "Saved to {path}"),
    ("player.download_failed", "Download failed"),
    ("player.views", "views"),
    ("player.finished", "Playback finished"),
    ("player.stopped", "Playback stopped"),
    ("player.close", "Close"),
    ("detail.source", "Source"),
    ("detail.uploader", "Uploader"),
    ("detail.duration", "Duration"),
    ("detail.format", "Format"),
    ("detail.size", "Size"),
    ("detail.downloaded", "Downloaded"),
    ("detail.uploaded", "Uploaded"),
    ("detail.views", "Views"),
    ("detail.likes", "Likes"),
    ("detail.comments", "Comments"),
    ("detail.category", "Category"),
    ("detail.tags", "Tags"),
    ("detail.description", "Description"),
    ("confirm.yes", "Yes"),
    ("confirm.no", "No"),
    ("cookie.paste_label", "Paste cookies (name=value; name2=value2)"),
    ("cookie.submit", "Update Cookies"),
    ("cookie.read_browser", "Read Browser Cookies"),
    ("cookie.demo_toggle", "Fall back to demo cookies"),
    ("cookie.updating", "Updating..."),
    ("help.home", "Enter: analyze / download  Up/Down: quality  Esc: cancel  F5: reload  Alt+1-3: open recent"),
    ("help.library", "Enter: play  /: search  c/u: category/uploader  s/o: sort/order  v: view  d: date sort  x: clear filters  m: select  r: reload"),
    ("help.selecting", "Space: toggle  Ctrl+A: select all  Del: delete  Esc: exit selection"),
    ("help.config", "Up/Down: move  Enter: activate  Ctrl+L: language"),
    ("help.player", "p: play  s: stop  d: download  o: view original  Esc: close"),
    ("config.title", "Settings"),
    ("config.subtitle", "Manage application configuration and settings"),
    ("config.cookie.title", "Cookie Management"),
    ("config.language", "Language"),
    ("cookie.empty", "Please paste cookie content first"),
    (
        "cookie.unparseable",
        "Unable to parse the cookie content, please check the format",
    ),
    ("cookie.success", "Successfully updated {count} cookie(s)"),
    ("cookie.failure", "Cookie update failed, please try again"),
    (
        "cookie.none_found",
        "No usable cookies found. Sign in to the site first if the video requires a login.",
    ),
    (
        "cookie.demo_used",
        "No browser cookies were found, demo cookies were sent instead",
    ),
];

const ZH: &[(&str, &str)] = &[
    ("app.title", "视频钱包"),
    ("app.tagline", "轻松管理视频库"),
    ("nav.home", "首页"),
    ("nav.library", "视频库"),
    ("nav.config", "配置"),
    ("upload.title", "下载任意视频"),
    ("upload.subtitle", "粘贴视频链接并选择清晰度"),
    ("upload.url_label", "视频链接"),
    ("upload.invalid_url", "请输入受支持平台（YouTube、Vimeo 等）的有效视频链接"),
    ("upload.quality", "视频质量"),
    ("upload.analyzing", "正在分析可用格式..."),
    ("upload.no_formats", "该视频没有可用的 MP4 格式"),
    ("upload.analyze_error", "无法获取该视频的格式"),
    ("upload.submit", "下载视频"),
    ("upload.processing", "处理中..."),
    ("pipeline.analyzing", "正在分析视频..."),
    ("pipeline.downloading", "正在下载视频..."),
    ("pipeline.saving", "正在保存到视频库..."),
    ("pipeline.completed", "已完成"),
    ("pipeline.failed", "失败"),
    ("library.title", "视频库"),
    ("library.count", "收藏中共有 {count} 个视频"),
    ("library.selected", "已选择 {count} 个"),
    ("library.select_hint", "点击视频进行选择"),
    ("library.loading", "正在加载视频..."),
    ("library.error", "加载视频失败"),
    ("library.retry", "重试"),
    ("library.empty", "还没有视频"),
    ("library.empty_hint", "下载第一个视频开始建立收藏"),
    ("library.no_match", "没有符合筛选条件的视频"),
    ("library.clear_filters", "清除筛选"),
    ("library.search", "搜索视频..."),
    ("library.category", "分类"),
    ("library.uploader", "上传者"),
    ("library.all", "全部"),
    ("library.sort", "排序"),
    ("library.local_sort", "本地日期排序"),
    ("view.grid", "网格"),
    ("view.list", "列表"),
    ("sort.saved_at", "添加日期"),
    ("sort.title", "标题"),
    ("sort.view_count", "观看次数"),
    ("sort.like_count", "点赞数"),
    ("sort.duration", "时长"),
    ("order.desc", "降序"),
    ("order.asc", "升序"),
    ("selection.enter", "选择"),
    ("selection.select_all", "全选"),
    ("selection.clear", "清空"),
    ("selection.exit", "取消"),
    ("selection.delete", "删除"),
    (
        "selection.delete_confirm",
        "确定要删除 {count} 个视频吗？此操作无法撤销。",
    ),
    ("selection.deleting", "正在删除..."),
    ("selection.deleted", "已删除 {count} 个视频"),
    ("recent.title", "最近的视频"),
    ("recent.empty", "暂无最近的视频"),
    ("player.error", "无法播放该视频，文件可能缺失或格式不受支持。"),
    ("player.loading", "正在启动播放..."),
    ("player.playing", "正在播放"),
    ("player.download", "下载视频"),
    ("player.original", "查看原视频"),
    ("player.downloaded", "已保存到 {path}"),
    ("player.download_failed", "下载失败"),
    ("player.views", "次观看"),
    ("player.finished", "播放结束"),
    ("player.stopped", "已停止播放"),
    ("player.close", "关闭"),
    ("detail.source", "来源"),
    ("detail.uploader", "上传者"),
    ("detail.duration", "时长"),
    ("detail.format", "格式"),
    ("detail.size", "大小"),
    ("detail.downloaded", "下载时间"),
    ("detail.uploaded", "上传日期"),
    ("detail.views", "观看次数"),
    ("detail.likes", "点赞数"),
    ("detail.comments", "评论数"),
    ("detail.category", "分类"),
    ("detail.tags", "标签"),
    ("detail.description", "简介"),
    ("confirm.yes", "确定"),
    ("confirm.no", "取消"),
    ("cookie.paste_label", "粘贴 Cookie（name=value; name2=value2）"),
    ("cookie.submit", "更新 Cookie"),
    ("cookie.read_browser", "读取浏览器 Cookie"),
    ("cookie.demo_toggle", "没有 Cookie 时使用演示 Cookie"),
    ("cookie.updating", "更新中..."),
    ("config.title", "配置设置"),
    ("config.subtitle", "管理应用程序配置和设置"),
    ("config.cookie.title", "Cookie 管理"),
    ("config.language", "语言"),
    ("cookie.empty", "请先粘贴 Cookie 内容"),
    ("cookie.unparseable", "无法解析 Cookie 内容，请检查格式是否正确"),
    ("cookie.success", "成功更新 {count} 个 Cookie"),
    ("cookie.failure", "Cookie 更新失败，请重试"),
    (
        "cookie.none_found",
        "未找到可用的Cookie。如果您需要下载需要登录的视频，请先访问对应网站并登录。",
    ),
    ("cookie.demo_used", "未找到浏览器 Cookie，已改为发送演示 Cookie"),
];

fn catalog(language: Language) -> &'static [(&'static str, &'static str)] {
    match language {
        Language::En => EN,
        Language::Zh => ZH,
    }
}

fn lookup(table: &'static [(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(candidate, _)| *candidate == key)
        .map(|(_, text)| *text)
}

/// Looks up `key`, falling back to English and finally to the key itself.
pub fn t(language: Language, key: &'static str) -> &'static str {
    lookup(catalog(language), key)
        .or_else(|| lookup(EN, key))
        .unwrap_or(key)
}

/// Like [`t`] but substitutes `{name}` placeholders.
pub fn tf(language: Language, key: &'static str, args: &[(&str, String)]) -> String {
    let mut text = t(language, key).to_string();
    for (name, value) in args {
        text = text.replace(&format!("{{{name}}}"), value);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_chinese_key_exists_in_english() {
        for (key, _) in ZH {
            assert!(lookup(EN, key).is_some(), "missing en entry for {key}");
        }
    }

    #[test]
    fn missing_translation_falls_back_to_english() {
        assert_eq!(
            t(Language::Zh, "upload.placeholder"),
            "https://www.youtube.com/watch?v=..."
        );
        assert_eq!(t(Language::Zh, "no.such.key"), "no.such.key");
    }

    #[test]
    fn placeholders_are_substituted() {
        assert_eq!(
            tf(Language::Zh, "cookie.success", &[("count", 3.to_string())]),
            "成功更新 3 个 Cookie"
        );
        assert_eq!(
            tf(Language::En, "library.count", &[("count", 12.to_string())]),
            "12 video(s) in your collection"
        );
    }

    #[test]
    fn language_parses_codes_and_cycles() {
        assert_eq!("ZH".parse::<Language>().unwrap(), Language::Zh);
        assert!("fr".parse::<Language>().is_err());
        assert_eq!(Language::En.next(), Language::Zh);
        assert_eq!(Language::Zh.next(), Language::En);
        assert_eq!(Language::Zh.name(), "中文");
    }
}
