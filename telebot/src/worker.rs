//! Processing workers (component E): N identical async tasks share the
//! update queue; each one decodes a raw update, resolves its chat, runs the
//! trigger engine, and turns a positive activation into outbound actions
//! submitted to the dispatcher. Uses the same `message.from()`/
//! `message.chat.id`/`message.media_group_id()` accessors teloxide bots
//! commonly reach for when handling an incoming `Message`.

use std::sync::Arc;
use std::time::Duration;

use teloxide::types::{Message, Update, UpdateKind, User};

use modbot_core::rules::{TriggerInput, TriggerText};
use modbot_core::text::{build_clear_text, build_user_name};
use modbot_core::{Chat, Trigger};

use crate::dispatcher::{Action, Dispatcher};
use crate::state::ModerationState;

/// Run one worker loop until `state.stop` fires. Every iteration waits up to
/// `queue_poll_ms` for a queued update, refreshes the spam fallback if the
/// config just reloaded, and sweeps the media-group table regardless of
/// whether an item was available, not only after a processed message.
pub async fn run(worker_id: usize, state: Arc<ModerationState>) {
    let dispatcher = Dispatcher::new(Arc::clone(&state));
    let poll = Duration::from_millis(state.settings.queue_poll_ms);

    log::info!("worker {worker_id} started");
    loop {
        if state.stop.is_stopped() {
            break;
        }

        if state.take_config_dirty() {
            state.refresh_spam_fallback();
        }

        if let Some(bytes) = state.queue.pop_timeout(poll).await {
            process_one(&bytes, &state, &dispatcher);
        }

        state.media_groups.sweep();
    }
    log::info!("worker {worker_id} stopping");
}

/// Decode one raw update and run it through the moderation pipeline.
/// Decode failures are dropped silently; everything past that point is
/// logged, never panics.
fn process_one(bytes: &[u8], state: &Arc<ModerationState>, dispatcher: &Dispatcher) {
    let Ok(update) = serde_json::from_slice::<Update>(bytes) else {
        return;
    };

    let Some(message) = extract_message(update) else {
        return;
    };

    let Some(sender) = message.from().cloned() else {
        log::debug!("dropping update with no 'from' field");
        return;
    };

    if Some(sender.id) == state.bot_user_id() {
        dispatcher.submit(Action::DeleteMessage {
            chat_id: message.chat.id,
            message_id: message.id,
        });
        return;
    }

    let Some(chat) = state.registry.find(message.chat.id) else {
        let fallback = state.spam_fallback();
        if fallback.active && !fallback.text.is_empty() {
            dispatcher.submit(Action::SendMessage {
                chat_id: message.chat.id,
                text: fallback.text,
            });
        }
        return;
    };

    if let Some(group_id) = message.media_group_id() {
        if state.media_groups.is_bad(group_id) {
            dispatcher.submit(Action::DeleteMessage {
                chat_id: message.chat.id,
                message_id: message.id,
            });
            return;
        }
        if let Some(err) = state.media_groups.record(group_id, message.chat.id, message.id) {
            log::error!("{err}");
        }
    }

    if chat.skip_admins && chat.is_admin(sender.id) {
        return;
    }
    if chat.white_users.contains(&sender.id) {
        return;
    }

    let content = build_clear_text(
        message.text(),
        message.entities().unwrap_or_default(),
        message.caption(),
        message.caption_entities().unwrap_or_default(),
    );
    let user_name = build_user_name(
        &sender.first_name,
        sender.last_name.as_deref().unwrap_or(""),
        sender.username.as_deref().unwrap_or(""),
    );

    let input = TriggerInput::new(
        message.text().unwrap_or(""),
        message.entities().unwrap_or_default(),
        TriggerText { content: &content, user_name: &user_name },
    );

    for trigger in &chat.triggers {
        if !trigger.active {
            continue;
        }
        if trigger.skip_admins && chat.is_admin(sender.id) {
            continue;
        }
        if trigger.exempts(sender.id) {
            continue;
        }

        let (activated, reason) = trigger.is_active(&input);
        if !activated {
            continue;
        }

        punish(&message, &chat, &sender, trigger, &reason, state, dispatcher);
        break;
    }
}

/// Pull the single message carried by `update`, whichever of the four
/// message-shaped update kinds it is. Every other update kind (callback
/// queries, inline queries, ...) is outside this bot's scope and dropped
/// here.
fn extract_message(update: Update) -> Option<Message> {
    match update.kind {
        UpdateKind::Message(m)
        | UpdateKind::EditedMessage(m)
        | UpdateKind::ChannelPost(m)
        | UpdateKind::EditedChannelPost(m) => Some(m),
        _ => None,
    }
}

/// Delete the offending message (or the whole media group it belongs to),
/// post the explanatory notice, then either ban immediately or hand the
/// strike to the spam ledger.
fn punish(
    message: &Message,
    chat: &Chat,
    sender: &User,
    trigger: &Trigger,
    reason: &str,
    state: &Arc<ModerationState>,
    dispatcher: &Dispatcher,
) {
    let ids_to_delete = match message.media_group_id() {
        Some(group_id) => state.media_groups.mark_bad(group_id),
        None => vec![message.id],
    };
    for message_id in ids_to_delete {
        dispatcher.submit(Action::DeleteMessage { chat_id: chat.id, message_id });
    }

    let notice = compose_notice(
        message.text().or_else(|| message.caption()).unwrap_or(""),
        reason,
        &trigger.name,
        trigger.description.as_deref(),
    );
    dispatcher.submit(Action::SendMessage { chat_id: chat.id, text: notice });

    if trigger.immediately_ban {
        dispatcher.submit(Action::BanChatMember {
            chat_id: chat.id,
            user_id: sender.id,
            revoke_messages: false,
            delay: Duration::from_secs(3),
        });
        return;
    }

    for verdict in state.spam_ledger.report_spam(chat.id, sender.clone(), &state.registry) {
        match verdict {
            modbot_core::SpamVerdict::Ban { chat_id, user } => {
                dispatcher.submit(Action::BanChatMember {
                    chat_id,
                    user_id: user.id,
                    revoke_messages: false,
                    delay: Duration::ZERO,
                });
            }
            modbot_core::SpamVerdict::OwnerExempt { chat_id, user } => {
                log::info!(
                    "user {} crossed the spam limit in chat {} but is an owner; owner of chat cannot be banned",
                    user.id.0,
                    chat_id.0
                );
            }
        }
    }
}

/// Escape exactly `+`, `<`, `>` and substitute the original text, the
/// activation reason, the trigger's name and its optional description into
/// the HTML-mode explanatory notice.
fn compose_notice(original_text: &str, reason: &str, trigger_name: &str, description: Option<&str>) -> String {
    let mut notice = format!(
        "Сообщение удалено.\n<i>{}</i>\n\nПричина: {}\nПравило: <b>{}</b>",
        escape_html(original_text),
        escape_html(reason),
        escape_html(trigger_name),
    );
    if let Some(description) = description {
        notice.push_str(&format!(" ({})", escape_html(description)));
    }
    notice
}

fn escape_html(text: &str) -> String {
    text.replace('+', "&#43;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use modbot_core::MediaGroupTable;
    use teloxide::types::{ChatId, MessageId};

    #[test]
    fn escape_html_only_touches_the_three_documented_characters() {
        let out = escape_html("a+b<c>d&e\"f");
        assert_eq!(out, "a&#43;b&lt;c&gt;d&e\"f");
    }

    #[test]
    fn compose_notice_includes_reason_trigger_and_description() {
        let notice = compose_notice("hello <world>", "ссылка: https://evil.test", "no_links", Some("blocks bad links"));
        assert!(notice.contains("&lt;world&gt;"));
        assert!(notice.contains("ссылка: https://evil.test"));
        assert!(notice.contains("no_links"));
        assert!(notice.contains("blocks bad links"));
    }

    #[test]
    fn compose_notice_without_description_omits_parens() {
        let notice = compose_notice("hi", "слово: spam", "word_trigger", None);
        assert!(!notice.contains('('));
    }

    #[test]
    fn media_group_punish_path_deletes_every_recorded_id() {
        let table = MediaGroupTable::new();
        let chat = ChatId(-400);
        for id in 1000..1004 {
            table.record("mg-1", chat, MessageId(id)).unwrap_or(());
        }
        let ids = table.mark_bad("mg-1");
        assert_eq!(ids.len(), 4);
        assert!(table.is_bad("mg-1"));
    }
}
