//! PaperPilot: a Telegram research assistant over arXiv.

pub mod ai;
pub mod bot;
pub mod compare;
pub mod config;
pub mod error;
pub mod paper;
pub mod session;
pub mod store;
pub mod text;
pub mod whisper;
