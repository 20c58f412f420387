//! The chat data model and the group-chat registry: a thread-safe,
//! id-ordered set of chats, each owning an immutable rule list and a small
//! per-chat mutable core (admin/owner caches, display name, bot privilege
//! descriptor) guarded by its own lock so readers never contend on a chat
//! they're not touching.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use teloxide::types::{ChatId, UserId};

use crate::rules::Trigger;

/// What the bot currently knows about its own standing in a chat. Filled in
/// by `getChatAdministrators` (component F); absent until the first refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BotInfo {
    pub user_id: Option<UserId>,
    pub can_restrict_members: bool,
}

/// Only `group`/`supergroup` chats are retained after discovery; the
/// registry never holds `private`/`channel` entries, so this enum exists
/// purely to record which of the two survived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Group,
    Supergroup,
}

#[derive(Debug, Default)]
struct ChatMutable {
    name: Option<String>,
    /// Unknown until the first `getChat` discovery confirms the upstream
    /// platform's own classification; the config loader has no way to know
    /// this ahead of time.
    kind: Option<ChatKind>,
    admin_ids: HashSet<UserId>,
    owner_ids: HashSet<UserId>,
    bot_info: Option<BotInfo>,
}

/// A moderated chat: immutable rule set and config for its lifetime, plus a
/// mutable core refreshed out-of-band by the outbound dispatcher. Reload
/// produces a brand new `Chat` (never mutates an existing one's rule list);
/// see [`GroupChatRegistry::replace`] for how the mutable core survives that.
#[derive(Debug)]
pub struct Chat {
    pub id: ChatId,
    pub triggers: Vec<Arc<Trigger>>,
    pub skip_admins: bool,
    pub white_users: Vec<UserId>,
    pub user_spam_limit: i64,
    /// Parsed and carried, not consumed by the core (open question (b)).
    pub premium_ban: bool,
    /// Parsed and carried, not consumed by the core (open question (b)).
    pub user_restricts: Vec<i64>,
    mutable: Mutex<ChatMutable>,
}

impl Chat {
    #[must_use]
    pub fn new(
        id: ChatId,
        triggers: Vec<Arc<Trigger>>,
        skip_admins: bool,
        white_users: Vec<UserId>,
        user_spam_limit: i64,
        premium_ban: bool,
        user_restricts: Vec<i64>,
    ) -> Self {
        Self {
            id,
            triggers,
            skip_admins,
            white_users,
            user_spam_limit,
            premium_ban,
            user_restricts,
            mutable: Mutex::new(ChatMutable::default()),
        }
    }

    #[must_use]
    pub fn kind(&self) -> Option<ChatKind> {
        self.mutable.lock().unwrap().kind
    }

    pub fn set_kind(&self, kind: ChatKind) {
        self.mutable.lock().unwrap().kind = Some(kind);
    }

    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.mutable.lock().unwrap().name.clone()
    }

    pub fn set_name(&self, name: String) {
        self.mutable.lock().unwrap().name = Some(name);
    }

    #[must_use]
    pub fn admin_ids(&self) -> HashSet<UserId> {
        self.mutable.lock().unwrap().admin_ids.clone()
    }

    #[must_use]
    pub fn owner_ids(&self) -> HashSet<UserId> {
        self.mutable.lock().unwrap().owner_ids.clone()
    }

    #[must_use]
    pub fn bot_info(&self) -> Option<BotInfo> {
        self.mutable.lock().unwrap().bot_info.clone()
    }

    #[must_use]
    pub fn is_admin(&self, user: UserId) -> bool {
        self.mutable.lock().unwrap().admin_ids.contains(&user)
    }

    #[must_use]
    pub fn is_owner(&self, user: UserId) -> bool {
        self.mutable.lock().unwrap().owner_ids.contains(&user)
    }

    /// Install the administrator set. Owners are always a subset of admins
    /// on the upstream platform already, but since `set_owner_ids` is called
    /// separately, this unions rather than overwrites to preserve the
    /// admin ⊇ owner invariant regardless of call order.
    pub fn set_admin_ids(&self, ids: HashSet<UserId>) {
        let mut guard = self.mutable.lock().unwrap();
        guard.admin_ids.extend(guard.owner_ids.iter().copied());
        guard.admin_ids.extend(ids);
    }

    /// Install the owner set and fold it into the admin set, preserving
    /// admin ⊇ owner.
    pub fn set_owner_ids(&self, ids: HashSet<UserId>) {
        let mut guard = self.mutable.lock().unwrap();
        guard.admin_ids.extend(ids.iter().copied());
        guard.owner_ids = ids;
    }

    pub fn set_bot_info(&self, info: BotInfo) {
        self.mutable.lock().unwrap().bot_info = Some(info);
    }

    /// Copy this chat's mutable core onto `other`, field by field, skipping
    /// any field `other` already has a value for. Used by
    /// [`GroupChatRegistry::replace`] so a reload doesn't briefly blank out
    /// admin caches for chats that survive it.
    fn inherit_into(&self, other: &Chat) {
        let mine = self.mutable.lock().unwrap();
        let mut theirs = other.mutable.lock().unwrap();
        if theirs.name.is_none() {
            theirs.name.clone_from(&mine.name);
        }
        if theirs.kind.is_none() {
            theirs.kind = mine.kind;
        }
        if theirs.admin_ids.is_empty() {
            theirs.admin_ids.clone_from(&mine.admin_ids);
        }
        if theirs.owner_ids.is_empty() {
            theirs.owner_ids.clone_from(&mine.owner_ids);
        }
        if theirs.bot_info.is_none() {
            theirs.bot_info.clone_from(&mine.bot_info);
        }
    }
}

/// Thread-safe, id-ordered set of chats (component B). Lookup is O(log n)
/// over a sorted `Vec`; readers clone the whole ordered sequence under the
/// lock (cheap: it's `Arc`s) and then iterate without holding it.
pub struct GroupChatRegistry {
    chats: Mutex<Vec<Arc<Chat>>>,
}

impl Default for GroupChatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupChatRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            chats: Mutex::new(Vec::new()),
        }
    }

    /// A point-in-time, read-only copy of the registry, ordered by id, safe
    /// to iterate without holding the registry lock.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<Chat>> {
        self.chats.lock().unwrap().clone()
    }

    #[must_use]
    pub fn find(&self, id: ChatId) -> Option<Arc<Chat>> {
        let guard = self.chats.lock().unwrap();
        let idx = guard.binary_search_by_key(&id.0, |c| c.id.0).ok()?;
        Some(Arc::clone(&guard[idx]))
    }

    pub fn remove(&self, id: ChatId) {
        let mut guard = self.chats.lock().unwrap();
        if let Ok(idx) = guard.binary_search_by_key(&id.0, |c| c.id.0) {
            guard.remove(idx);
        }
    }

    /// Atomically swap in a freshly-loaded chat list. Chats present (by id)
    /// in both the old and new list have the old entry's admin/owner/name/
    /// bot-info copied onto the new one, so a reload never briefly drops
    /// known admins for a chat that survives it.
    pub fn replace(&self, mut new_list: Vec<Chat>) {
        new_list.sort_unstable_by_key(|c| c.id.0);
        let new_arcs: Vec<Arc<Chat>> = new_list.into_iter().map(Arc::new).collect();

        let mut guard = self.chats.lock().unwrap();
        for old in guard.iter() {
            if let Ok(idx) = new_arcs.binary_search_by_key(&old.id.0, |c| c.id.0) {
                old.inherit_into(&new_arcs[idx]);
            }
        }
        *guard = new_arcs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_chat(id: i64) -> Chat {
        Chat::new(ChatId(id), vec![], true, vec![], 5, false, vec![])
    }

    #[test]
    fn replace_inherits_admin_cache_for_surviving_chat() {
        let registry = GroupChatRegistry::new();
        registry.replace(vec![empty_chat(-100)]);
        let first = registry.find(ChatId(-100)).unwrap();
        let mut admins = HashSet::new();
        admins.insert(UserId(1));
        first.set_admin_ids(admins.clone());

        registry.replace(vec![empty_chat(-100)]);
        let second = registry.find(ChatId(-100)).unwrap();
        assert_eq!(second.admin_ids(), admins);
    }

    #[test]
    fn replace_does_not_inherit_when_caller_already_set_new_entry() {
        let registry = GroupChatRegistry::new();
        registry.replace(vec![empty_chat(-100)]);
        let first = registry.find(ChatId(-100)).unwrap();
        let mut old_admins = HashSet::new();
        old_admins.insert(UserId(1));
        first.set_admin_ids(old_admins);

        let fresh = empty_chat(-100);
        let mut new_admins = HashSet::new();
        new_admins.insert(UserId(2));
        fresh.set_admin_ids(new_admins.clone());
        registry.replace(vec![fresh]);

        let second = registry.find(ChatId(-100)).unwrap();
        assert_eq!(second.admin_ids(), new_admins);
    }

    #[test]
    fn owner_set_keeps_admin_superset_invariant() {
        let chat = empty_chat(-1);
        let mut owners = HashSet::new();
        owners.insert(UserId(7));
        chat.set_owner_ids(owners.clone());
        assert!(chat.admin_ids().is_superset(&owners));
    }

    #[test]
    fn find_is_none_for_unknown_chat() {
        let registry = GroupChatRegistry::new();
        registry.replace(vec![empty_chat(-1)]);
        assert!(registry.find(ChatId(-2)).is_none());
    }
}
