//! Pairup Core Library
//!
//! Models, validation, quota tracking, per-peer message logs and local
//! storage for the Pairup anonymous chat client.

pub mod error;
pub mod limits;
pub mod message_log;
pub mod models;
pub mod storage;
pub mod validation;

pub use error::{Error, Result};
pub use limits::{DailyLimits, MAX_DAILY_MATCHES};
pub use message_log::MessageLog;
pub use models::*;
pub use storage::{
    ChatLogRepository, ChatLogStore, Database, DeviceStore, PreferencesStore,
    PreferenceRepository, ProfileStore, SessionStorage,
};
