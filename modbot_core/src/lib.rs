//! Core of the moderator bot: trigger engine, chat registry, config loading,
//! media-group accumulation and spam-strike accounting. The webhook listener,
//! the worker pool and the outbound HTTP dispatcher that wire this core up to
//! an actual Telegram-shaped upstream live in the `telebot` binary crate.

/// Typed errors for the subsystems in this crate.
mod error;
pub use error::{ConfigError, ModerationError};

/// Chat and trigger data model, plus the thread-safe registry (component B).
mod chat;
pub use chat::{BotInfo, Chat, ChatKind, GroupChatRegistry};

/// The trigger engine (component A) and its kinds.
pub mod rules;
pub use rules::{Trigger, TriggerKind, TriggerText};

/// YAML rule/chat document parsing (component C).
pub mod config;
pub use config::{load_document, ConfigDocument};

/// Per-media-group delete correlation.
mod media_group;
pub use media_group::MediaGroupTable;

/// Per-(chat, user) strike accounting and ban escalation decisions.
mod spam_ledger;
pub use spam_ledger::{SpamLedger, SpamVerdict};

/// Clean-text and display-name helpers shared by the trigger engine and the
/// worker pipeline.
pub mod text;

use std::sync::atomic::{AtomicU32, Ordering};

/// Process-wide count of config items skipped due to shape/type errors.
/// Mirrors the original's `globalConfigParceErrors` counter: it is informational
/// only and never gates anything, but is surfaced so operators can notice a
/// config file slowly rotting.
static GLOBAL_CONFIG_PARSE_ERRORS: AtomicU32 = AtomicU32::new(0);

pub fn global_config_parse_errors() -> u32 {
    GLOBAL_CONFIG_PARSE_ERRORS.load(Ordering::Relaxed)
}

pub(crate) fn bump_config_parse_errors() {
    GLOBAL_CONFIG_PARSE_ERRORS.fetch_add(1, Ordering::Relaxed);
}
