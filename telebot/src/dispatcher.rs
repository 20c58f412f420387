//! Outbound dispatcher: submits platform API calls over plain HTTPS GET,
//! decodes replies through the same `\uXXXX` decoder as the webhook ingress,
//! and routes each response to its per-method handler. Owns the "give the
//! platform time to observe the preceding delete" delays on the explanatory
//! notice and on an immediate ban.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Deserialize;
use teloxide::types::{ChatId, MessageId, User, UserId};

use modbot_core::ChatKind;

use crate::error::TransportError;
use crate::state::ModerationState;
use crate::unicode_escape::decode_unicode_escapes;

/// One outbound action the worker pipeline or the spam ledger wants issued.
/// Each variant carries exactly the parameters its upstream method needs;
/// [`Dispatcher::submit`] applies its documented delay, if any, before
/// firing.
#[derive(Debug, Clone)]
pub enum Action {
    GetChat { chat_id: ChatId },
    GetChatAdministrators { chat_id: ChatId },
    SendMessage { chat_id: ChatId, text: String },
    DeleteMessage { chat_id: ChatId, message_id: MessageId },
    BanChatMember { chat_id: ChatId, user_id: UserId, revoke_messages: bool, delay: Duration },
}

impl Action {
    fn method_name(&self) -> &'static str {
        match self {
            Self::GetChat { .. } => "getChat",
            Self::GetChatAdministrators { .. } => "getChatAdministrators",
            Self::SendMessage { .. } => "sendMessage",
            Self::DeleteMessage { .. } => "deleteMessage",
            Self::BanChatMember { .. } => "banChatMember",
        }
    }

    /// The delay this action waits before firing: 1 s for the explanatory
    /// notice, 3 s for an immediate ban, none otherwise.
    fn delay(&self) -> Duration {
        match self {
            Self::SendMessage { .. } => Duration::from_secs(1),
            Self::BanChatMember { delay, .. } => *delay,
            _ => Duration::ZERO,
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::GetChat { chat_id } | Self::GetChatAdministrators { chat_id } => {
                vec![("chat_id", chat_id.0.to_string())]
            }
            Self::SendMessage { chat_id, text } => vec![
                ("chat_id", chat_id.0.to_string()),
                ("text", text.clone()),
                ("parse_mode", "HTML".to_string()),
            ],
            Self::DeleteMessage { chat_id, message_id } => vec![
                ("chat_id", chat_id.0.to_string()),
                ("message_id", message_id.0.to_string()),
            ],
            Self::BanChatMember { chat_id, user_id, revoke_messages, .. } => vec![
                ("chat_id", chat_id.0.to_string()),
                ("user_id", user_id.0.to_string()),
                ("until_date", now_secs().to_string()),
                ("revoke_messages", revoke_messages.to_string()),
            ],
        }
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Generic shape of every upstream JSON response: `result` is
/// method-specific and deserialized again, per-handler, from the
/// already-validated `Value`.
#[derive(Debug, Deserialize)]
struct UpstreamResponse {
    ok: bool,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    #[allow(dead_code)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct ChatInfo {
    #[serde(rename = "type")]
    kind: String,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMemberInfo {
    status: String,
    user: UserInfo,
}

#[derive(Debug, Deserialize)]
struct SentMessageInfo {
    message_id: i32,
    from: Option<UserInfo>,
}

/// Owns every outbound platform HTTP call. Cheap to clone: it's just a
/// handle onto the shared [`ModerationState`].
#[derive(Clone)]
pub struct Dispatcher {
    state: Arc<ModerationState>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(state: Arc<ModerationState>) -> Self {
        Self { state }
    }

    /// `getMe`, awaited directly at startup rather than fire-and-forget:
    /// its failure is fatal, so the caller needs the `Result` synchronously
    /// instead of a logged-and-dropped background outcome.
    pub async fn get_me(&self) -> Result<User, TransportError> {
        let response = self.call("getMe", &[]).await?;
        if !response.ok {
            return Err(TransportError::MalformedResponse(
                serde::de::Error::custom(response.description.unwrap_or_else(|| "getMe returned ok=false".to_string())),
            ));
        }
        let result = response.result.ok_or_else(|| {
            TransportError::MalformedResponse(serde::de::Error::custom("getMe response missing 'result'"))
        })?;
        serde_json::from_value(result).map_err(TransportError::MalformedResponse)
    }

    /// Schedule `action`'s delay (if any), fire it, and route the response
    /// to its handler. Non-blocking: this spawns and returns immediately, so
    /// callers never wait on an upstream round trip.
    pub fn submit(&self, action: Action) {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher.execute(action).await;
        });
    }

    async fn execute(&self, action: Action) {
        let delay = action.delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let method = action.method_name();
        match self.call(method, &action.params()).await {
            Ok(response) => self.handle_response(&action, response),
            Err(e) => log::warn!("upstream call '{method}' failed: {e}"),
        }
    }

    async fn call(&self, method: &str, params: &[(&str, String)]) -> Result<UpstreamResponse, TransportError> {
        let reply_id = self.state.next_reply_id();
        let url = format!(
            "{}/bot{}/{}",
            self.state.settings.upstream_base_url, self.state.settings.bot_token, method
        );
        log::debug!("http call {method} (reply id: {reply_id})");

        let response = self.state.http.get(&url).query(params).send().await?;
        let bytes = response.bytes().await?;
        let decoded = decode_unicode_escapes(&bytes);
        serde_json::from_slice(&decoded).map_err(TransportError::MalformedResponse)
    }

    fn handle_response(&self, action: &Action, response: UpstreamResponse) {
        match action {
            Action::GetChat { chat_id } => self.handle_get_chat(*chat_id, response),
            Action::GetChatAdministrators { chat_id } => self.handle_get_chat_administrators(*chat_id, response),
            Action::SendMessage { chat_id, .. } => self.handle_send_message(*chat_id, response),
            Action::DeleteMessage { .. } => {
                // Silently ignored on either outcome.
            }
            Action::BanChatMember { chat_id, user_id, .. } => self.handle_ban_chat_member(*chat_id, *user_id, response),
        }
    }

    /// If the chat's type is `group`/`supergroup`, refresh its label and
    /// schedule an admin refresh; otherwise (or on an unsuccessful result)
    /// remove it from the registry.
    fn handle_get_chat(&self, chat_id: ChatId, response: UpstreamResponse) {
        if !response.ok {
            log::warn!("getChat failed for chat {}: {:?}", chat_id.0, response.description);
            self.state.registry.remove(chat_id);
            return;
        }

        let info = response.result.and_then(|v| serde_json::from_value::<ChatInfo>(v).ok());
        let Some(info) = info else {
            self.state.registry.remove(chat_id);
            return;
        };

        let Some(chat) = self.state.registry.find(chat_id) else {
            return;
        };

        match info.kind.as_str() {
            "group" => chat.set_kind(ChatKind::Group),
            "supergroup" => chat.set_kind(ChatKind::Supergroup),
            _ => {
                self.state.registry.remove(chat_id);
                return;
            }
        }

        if let Some(title) = info.title {
            chat.set_name(title);
        }
        self.submit(Action::GetChatAdministrators { chat_id });
    }

    /// Build `adminIds` and `ownerIds` (owner = status `creator`) and
    /// install them on the chat.
    fn handle_get_chat_administrators(&self, chat_id: ChatId, response: UpstreamResponse) {
        if !response.ok {
            log::warn!("getChatAdministrators failed for chat {}: {:?}", chat_id.0, response.description);
            return;
        }
        let Some(chat) = self.state.registry.find(chat_id) else {
            return;
        };
        let Some(members) = response
            .result
            .and_then(|v| serde_json::from_value::<Vec<ChatMemberInfo>>(v).ok())
        else {
            return;
        };

        let mut admin_ids = HashSet::new();
        let mut owner_ids = HashSet::new();
        for member in members {
            let uid = UserId(member.user.id);
            admin_ids.insert(uid);
            if member.status == "creator" {
                owner_ids.insert(uid);
            }
        }
        chat.set_owner_ids(owner_ids);
        chat.set_admin_ids(admin_ids);
    }

    /// If the message we just sent came from the bot itself, schedule its
    /// own deletion once it comes back through `sendMessage`'s response.
    fn handle_send_message(&self, chat_id: ChatId, response: UpstreamResponse) {
        if !response.ok {
            log::warn!("sendMessage failed for chat {}: {:?}", chat_id.0, response.description);
            return;
        }
        let Some(sent) = response
            .result
            .and_then(|v| serde_json::from_value::<SentMessageInfo>(v).ok())
        else {
            return;
        };
        let Some(from) = sent.from else {
            return;
        };
        if Some(UserId(from.id)) == self.state.bot_user_id() {
            self.submit(Action::DeleteMessage {
                chat_id,
                message_id: MessageId(sent.message_id),
            });
        }
    }

    /// Log success/failure and, only on success, drop the ledger entry —
    /// the terminal `Banned` state is observed by its absence.
    fn handle_ban_chat_member(&self, chat_id: ChatId, user_id: UserId, response: UpstreamResponse) {
        if response.ok {
            log::info!("user {} banned in chat {}", user_id.0, chat_id.0);
            self.state.spam_ledger.confirm_ban(chat_id, user_id);
        } else {
            log::warn!(
                "failed to ban user {} in chat {}: {:?} (perhaps the bot lacks rights to restrict members)",
                user_id.0,
                chat_id.0,
                response.description
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_message_delay_is_one_second() {
        let action = Action::SendMessage { chat_id: ChatId(-1), text: String::new() };
        assert_eq!(action.delay(), Duration::from_secs(1));
    }

    #[test]
    fn ban_chat_member_keeps_its_own_delay() {
        let action = Action::BanChatMember {
            chat_id: ChatId(-1),
            user_id: UserId(1),
            revoke_messages: true,
            delay: Duration::from_secs(3),
        };
        assert_eq!(action.delay(), Duration::from_secs(3));
    }

    #[test]
    fn delete_message_has_no_delay() {
        let action = Action::DeleteMessage { chat_id: ChatId(-1), message_id: MessageId(1) };
        assert_eq!(action.delay(), Duration::ZERO);
    }

    #[test]
    fn ban_params_carry_revoke_messages_flag() {
        let action = Action::BanChatMember {
            chat_id: ChatId(-200),
            user_id: UserId(42),
            revoke_messages: false,
            delay: Duration::ZERO,
        };
        let params = action.params();
        assert!(params.contains(&("revoke_messages", "false".to_string())));
        assert!(params.contains(&("user_id", "42".to_string())));
    }
}
