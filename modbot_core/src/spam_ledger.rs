//! Per-(chat, user) strike accounting and ban-escalation decisions
//! (component F's "spam ledger"). Every call to [`SpamLedger::report_spam`]
//! both records a new strike *and* re-judges every other outstanding
//! record, mirroring the source's "sweep the whole table on every report"
//! behavior rather than only checking the record just touched.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use teloxide::types::{ChatId, User, UserId};

use crate::chat::GroupChatRegistry;

const STRIKE_TTL_SECS: i64 = 24 * 3600;

struct Record {
    user: User,
    /// Strike timestamps, in seconds since the Unix epoch.
    strikes: Vec<i64>,
}

/// Outcome of re-judging one ledger record during a [`SpamLedger::report_spam`]
/// sweep. Only `Ban` and `OwnerExempt` are surfaced to the caller; chats
/// that vanished from the registry or have escalation disabled are dropped
/// silently (matching §4.F step 2).
#[derive(Debug, Clone)]
pub enum SpamVerdict {
    /// Strike count crossed `user_spam_limit`; the dispatcher should issue
    /// `banChatMember` and, on success, call [`SpamLedger::confirm_ban`].
    Ban { chat_id: ChatId, user: User },
    /// Strike count crossed the limit but the user is a chat owner; never
    /// banned. The record is dropped immediately (no confirmation needed).
    OwnerExempt { chat_id: ChatId, user: User },
}

/// Mutex-guarded table ordered by `(chat_id, user_id)`.
pub struct SpamLedger {
    inner: Mutex<HashMap<(ChatId, UserId), Record>>,
}

impl Default for SpamLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl SpamLedger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Record one strike against `(chat_id, user.id)`, then re-judge every
    /// outstanding record against the current registry snapshot. Returns
    /// every verdict produced by this sweep (usually zero or one, but a
    /// report can coincidentally push more than one user over threshold if
    /// strikes expired unevenly between calls).
    pub fn report_spam(&self, chat_id: ChatId, user: User, registry: &GroupChatRegistry) -> Vec<SpamVerdict> {
        let now = now_secs();
        {
            let mut guard = self.inner.lock().unwrap();
            let record = guard.entry((chat_id, user.id)).or_insert_with(|| Record {
                user: user.clone(),
                strikes: Vec::new(),
            });
            record.user = user;
            record.strikes.push(now);
        }
        self.sweep_and_judge(registry, now)
    }

    fn sweep_and_judge(&self, registry: &GroupChatRegistry, now: i64) -> Vec<SpamVerdict> {
        let mut verdicts = Vec::new();
        let mut guard = self.inner.lock().unwrap();
        let mut owner_exempt_keys = Vec::new();

        guard.retain(|&(chat_id, _user_id), record| {
            let Some(chat) = registry.find(chat_id) else {
                return false;
            };
            if chat.user_spam_limit <= 0 {
                return false;
            }

            record.strikes.retain(|&ts| now - ts <= STRIKE_TTL_SECS);

            if (record.strikes.len() as i64) >= chat.user_spam_limit {
                if chat.is_owner(record.user.id) {
                    owner_exempt_keys.push((chat_id, record.user.clone()));
                    return false;
                }
                verdicts.push(SpamVerdict::Ban {
                    chat_id,
                    user: record.user.clone(),
                });
            }
            true
        });

        for (chat_id, user) in owner_exempt_keys {
            verdicts.push(SpamVerdict::OwnerExempt { chat_id, user });
        }
        verdicts
    }

    /// Remove the ledger entry after a successful `banChatMember`. The
    /// terminal `Banned` state is observed by the record's absence.
    pub fn confirm_ban(&self, chat_id: ChatId, user_id: UserId) {
        self.inner.lock().unwrap().remove(&(chat_id, user_id));
    }

    #[cfg(test)]
    fn strike_count(&self, chat_id: ChatId, user_id: UserId) -> usize {
        self.inner
            .lock()
            .unwrap()
            .get(&(chat_id, user_id))
            .map_or(0, |r| r.strikes.len())
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Chat;

    fn registry_with_chat(id: i64, limit: i64) -> GroupChatRegistry {
        let registry = GroupChatRegistry::new();
        registry.replace(vec![Chat::new(ChatId(id), vec![], true, vec![], limit, false, vec![])]);
        registry
    }

    fn user(id: u64) -> User {
        User {
            id: UserId(id),
            is_bot: false,
            first_name: "Test".to_string(),
            last_name: None,
            username: None,
            language_code: None,
            is_premium: false,
            added_to_attachment_menu: false,
        }
    }

    #[test]
    fn bans_after_reaching_limit_and_confirm_removes_entry() {
        let registry = registry_with_chat(-200, 2);
        let ledger = SpamLedger::new();
        let v1 = ledger.report_spam(ChatId(-200), user(42), &registry);
        assert!(v1.is_empty());
        let v2 = ledger.report_spam(ChatId(-200), user(42), &registry);
        assert!(matches!(v2.as_slice(), [SpamVerdict::Ban { .. }]));
        ledger.confirm_ban(ChatId(-200), UserId(42));
        assert_eq!(ledger.strike_count(ChatId(-200), UserId(42)), 0);
    }

    #[test]
    fn owner_is_never_banned_and_entry_is_dropped() {
        let registry = registry_with_chat(-500, 1);
        let chat = registry.find(ChatId(-500)).unwrap();
        let mut owners = std::collections::HashSet::new();
        owners.insert(UserId(7));
        chat.set_owner_ids(owners);

        let ledger = SpamLedger::new();
        let verdicts = ledger.report_spam(ChatId(-500), user(7), &registry);
        assert!(matches!(verdicts.as_slice(), [SpamVerdict::OwnerExempt { .. }]));
        assert_eq!(ledger.strike_count(ChatId(-500), UserId(7)), 0);
    }

    #[test]
    fn disabled_escalation_drops_record_without_banning() {
        let registry = registry_with_chat(-1, 0);
        let ledger = SpamLedger::new();
        let verdicts = ledger.report_spam(ChatId(-1), user(1), &registry);
        assert!(verdicts.is_empty());
        assert_eq!(ledger.strike_count(ChatId(-1), UserId(1)), 0);
    }

    #[test]
    fn record_for_vanished_chat_is_dropped() {
        let registry = GroupChatRegistry::new();
        let ledger = SpamLedger::new();
        let verdicts = ledger.report_spam(ChatId(-999), user(1), &registry);
        assert!(verdicts.is_empty());
    }
}
