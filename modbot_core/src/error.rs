use thiserror::Error;

/// A per-item config shape problem. These are always logged and skipped by
/// the caller (see [`crate::config::load_document`]); they never abort a load.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("top-level node '{0}' must be a sequence")]
    NotASequence(&'static str),

    #[error("in a '{node}' node a field '{field}' can not be null or missing")]
    MissingField { node: &'static str, field: &'static str },

    #[error("in a '{node}' node a field '{field}' can not be empty")]
    EmptyField { node: &'static str, field: &'static str },

    #[error(
        "in a 'trigger' node a field 'type' must be one of \
         link_enable, link_disable/link, word, regexp; got '{0}'"
    )]
    UnknownTriggerType(String),

    #[error("trigger '{0}' references an invalid regular expression: {1}")]
    InvalidRegex(String, regex::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors surfaced by the moderation core's in-memory bookkeeping. These are
/// distinct from [`ConfigError`]: they describe inconsistencies found while
/// the bot is already running, not at load time.
#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("media group '{group_id}' was first seen in chat {expected} but message belongs to chat {actual}")]
    MediaGroupChatMismatch {
        group_id: String,
        expected: i64,
        actual: i64,
    },
}
