//! `ModerationState`: the explicit `Arc<...>` context handle threaded
//! through the webhook ingress, the worker pool, and the outbound
//! dispatcher, instead of a set of process-wide singletons. Every subsystem
//! reaches shared state only through this handle.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use modbot_core::{GroupChatRegistry, MediaGroupTable, SpamLedger};
use teloxide::types::UserId;

use crate::queue::UpdateQueue;
use crate::settings::Settings;
use crate::state_file::StateFile;

/// A global stop flag observed by every worker and timer, built on
/// [`tokio::sync::Notify`] so waiters wake immediately instead of polling.
#[derive(Default)]
pub struct StopFlag {
    stopped: AtomicBool,
    notify: tokio::sync::Notify,
}

impl StopFlag {
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
        self.notify.notify_waiters();
    }

    /// Resolves once [`StopFlag::stop`] has been called. If it already has,
    /// resolves immediately.
    pub async fn notified(&self) {
        if self.is_stopped() {
            return;
        }
        self.notify.notified().await;
    }
}

/// The fallback "spam message" the worker pool sends when a chat isn't in
/// the registry yet, loaded from the state file and refreshed whenever a
/// worker observes `config_dirty`.
#[derive(Debug, Clone)]
pub struct SpamFallback {
    pub active: bool,
    pub text: String,
}

pub struct ModerationState {
    pub settings: Settings,
    pub registry: GroupChatRegistry,
    pub media_groups: MediaGroupTable,
    pub spam_ledger: SpamLedger,
    pub queue: UpdateQueue,
    pub http: reqwest::Client,
    pub state_file: StateFile,
    pub stop: StopFlag,

    bot_user_id: RwLock<Option<UserId>>,
    spam_fallback: RwLock<SpamFallback>,
    config_dirty: AtomicBool,
    reply_counter: AtomicU64,
}

impl ModerationState {
    #[must_use]
    pub fn new(settings: Settings, http: reqwest::Client, state_file: StateFile) -> Self {
        let spam_fallback = SpamFallback {
            active: state_file.spam_message_active(),
            text: state_file.spam_message_text(),
        };
        Self {
            settings,
            registry: GroupChatRegistry::new(),
            media_groups: MediaGroupTable::new(),
            spam_ledger: SpamLedger::new(),
            queue: UpdateQueue::new(),
            http,
            state_file,
            stop: StopFlag::default(),
            bot_user_id: RwLock::new(None),
            spam_fallback: RwLock::new(spam_fallback),
            config_dirty: AtomicBool::new(false),
            reply_counter: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn bot_user_id(&self) -> Option<UserId> {
        *self.bot_user_id.read().unwrap()
    }

    pub fn set_bot_user_id(&self, id: UserId) {
        *self.bot_user_id.write().unwrap() = Some(id);
    }

    #[must_use]
    pub fn spam_fallback(&self) -> SpamFallback {
        self.spam_fallback.read().unwrap().clone()
    }

    /// Mark that config has reloaded; the worker pool re-reads the spam
    /// fallback text/flag the next time it observes this.
    pub fn mark_config_dirty(&self) {
        self.config_dirty.store(true, Ordering::Relaxed);
    }

    /// Consume the dirty flag: `true` at most once per reload. Workers call
    /// this every loop iteration; whichever worker observes it first
    /// refreshes the fallback from the state file for everyone.
    pub fn take_config_dirty(&self) -> bool {
        self.config_dirty.swap(false, Ordering::Relaxed)
    }

    pub fn refresh_spam_fallback(&self) {
        let mut guard = self.spam_fallback.write().unwrap();
        guard.active = self.state_file.spam_message_active();
        guard.text = self.state_file.spam_message_text();
    }

    /// A monotonically-assigned id for the next outbound HTTP call, for
    /// correlating its log line with the eventual response.
    pub fn next_reply_id(&self) -> u64 {
        self.reply_counter.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stop_flag_wakes_a_waiter() {
        let flag = std::sync::Arc::new(StopFlag::default());
        let waiter = std::sync::Arc::clone(&flag);
        let handle = tokio::spawn(async move {
            waiter.notified().await;
        });
        flag.stop();
        tokio::time::timeout(std::time::Duration::from_millis(200), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn config_dirty_is_consumed_once() {
        let settings_yaml_state = StateFile::load("/nonexistent/for/test3.state");
        let state = ModerationState::new(
            test_settings(),
            reqwest::Client::new(),
            settings_yaml_state,
        );
        state.mark_config_dirty();
        assert!(state.take_config_dirty());
        assert!(!state.take_config_dirty());
    }

    fn test_settings() -> Settings {
        serde_yaml::from_str(
            r#"
bot_token: "123:abc"
webhook_port: 8443
tls_cert_path: cert.pem
tls_key_path: key.pem
"#,
        )
        .unwrap()
    }
}
