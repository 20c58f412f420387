//! The state file: a small key-value store for operational toggles
//! (`bot.spam_message.active`, `bot.spam_message.text`) that the bot itself
//! mutates at runtime and persists back at clean shutdown, distinct from the
//! read-only rule/chat YAML document. Format is deliberately a flat
//! `key = value` text file, one per line, the simplest thing that can carry
//! a handful of scalar toggles without dragging in a second serde format for
//! a file this small.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

const DEFAULT_SPAM_MESSAGE_ACTIVE: bool = false;
const DEFAULT_SPAM_MESSAGE_TEXT: &str = "";

pub struct StateFile {
    path: String,
    values: Mutex<BTreeMap<String, String>>,
    dirty: AtomicBool,
}

impl StateFile {
    /// Load `path` if it exists; a missing file is not an error (first run),
    /// it just means every toggle starts at its default.
    pub fn load(path: &str) -> Self {
        let values = std::fs::read_to_string(path)
            .map(|raw| parse(&raw))
            .unwrap_or_default();
        Self {
            path: path.to_string(),
            values: Mutex::new(values),
            dirty: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn spam_message_active(&self) -> bool {
        self.get_bool("bot.spam_message.active", DEFAULT_SPAM_MESSAGE_ACTIVE)
    }

    #[must_use]
    pub fn spam_message_text(&self) -> String {
        self.get("bot.spam_message.text")
            .unwrap_or_else(|| DEFAULT_SPAM_MESSAGE_TEXT.to_string())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    pub fn set(&self, key: &str, value: impl Into<String>) {
        let mut guard = self.values.lock().unwrap();
        guard.insert(key.to_string(), value.into());
        self.dirty.store(true, Ordering::Relaxed);
    }

    /// Write the file back only if something changed since load: clean
    /// shutdown is the only time this file is written.
    pub fn save_if_dirty(&self) -> std::io::Result<()> {
        if !self.dirty.swap(false, Ordering::Relaxed) {
            return Ok(());
        }
        let guard = self.values.lock().unwrap();
        let mut out = String::new();
        for (key, value) in guard.iter() {
            out.push_str(key);
            out.push_str(" = ");
            out.push_str(value);
            out.push('\n');
        }
        std::fs::write(&self.path, out)
    }
}

fn parse(raw: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            map.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    map
}
