//! Headliner: a Telegram bot that broadcasts periodic tech-news digests.
//!
//! Every cycle fetches headlines for a fixed list of topics from a news
//! search API, filters out everything already delivered, shortens the
//! survivors' links, and sends one formatted message to all subscribers.
//! A `/start` command registers the sender and sends them a digest
//! immediately.
pub mod app;
pub mod config;
pub mod digest;
pub mod news;
pub mod shorten;
pub mod store;
pub mod telegram;
