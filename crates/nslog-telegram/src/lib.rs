//! Telegram delivery for nslog
//!
//! This crate provides a reservoir rate limiter, a length-bounded chunker, an
//! ordered single-slot dispatcher and a Telegram Bot API client.

mod chunk;
mod client;
mod dispatcher;
mod error;
mod limiter;

pub use chunk::{MAX_CHUNK_LEN, split_chunks};
pub use client::{ChatId, ChatTransport, ParseMode, TelegramClient, TelegramConfig};
pub use dispatcher::{DeliveryReport, DispatchEvent, Dispatcher, DispatcherConfig};
pub use error::{DeliveryError, DispatchError};
pub use limiter::{LimiterConfig, LimiterPermit, RateLimiter};
