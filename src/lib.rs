#![forbid(unsafe_code)]

//! Terminal client for a Video Wallet backend: paste a link, pick a quality,
//! let the backend analyze/download/save it, then browse, play and prune the
//! resulting library.

pub mod api;
pub mod config;
pub mod cookies;
pub mod error;
pub mod events;
pub mod formats;
pub mod i18n;
pub mod library;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod player;
pub mod prefs;
pub mod selection;
pub mod shell;
pub mod tui;
pub mod upload;
