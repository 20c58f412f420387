//! The trigger engine (component A): one `is_active` per trigger kind, plus
//! the shared `Trigger` envelope (name, active flag, admin/whitelist
//! exemptions, `inverse`, `immediately_ban`) that the worker pipeline
//! consults before ever looking at a kind-specific payload.

mod link;
mod regexp;
mod word;

pub use link::{LinkList, LinkListItem};
pub use regexp::{Analyze, RegexpPayload};
pub use word::WordPayload;

use teloxide::types::{MessageEntity, UserId};

/// The two clean strings every trigger kind evaluates against, built once per
/// message by [`crate::text::build_clear_text`] / `build_user_name` and
/// shared across every trigger in the chat's rule list.
#[derive(Debug, Clone, Copy)]
pub struct TriggerText<'a> {
    pub content: &'a str,
    pub user_name: &'a str,
}

/// Everything a kind's `evaluate_*` function needs: the raw message text and
/// entities (link triggers re-derive URLs from these, since entity offsets
/// are only meaningful against the original, un-stripped text) plus the
/// already-cleaned `content`/`user_name` pair.
pub struct TriggerInput<'a> {
    pub message_text: &'a str,
    pub message_entities: &'a [MessageEntity],
    pub content: &'a str,
    pub user_name: &'a str,
}

impl<'a> TriggerInput<'a> {
    #[must_use]
    pub fn new(message_text: &'a str, message_entities: &'a [MessageEntity], text: TriggerText<'a>) -> Self {
        Self {
            message_text,
            message_entities,
            content: text.content,
            user_name: text.user_name,
        }
    }
}

/// Kind-specific payload of a trigger. Replaces the source's dynamic type
/// tests with a plain tagged match.
#[derive(Debug, Clone)]
pub enum TriggerKind {
    LinkDisable { white_list: LinkList },
    LinkEnable { white_list: LinkList, black_list: LinkList },
    Word(WordPayload),
    Regexp(RegexpPayload),
}

impl TriggerKind {
    fn evaluate(&self, input: &TriggerInput<'_>) -> (bool, String) {
        match self {
            Self::LinkDisable { white_list } => link::evaluate_link_disable(white_list, input),
            Self::LinkEnable { white_list, black_list } => {
                link::evaluate_link_enable(white_list, black_list, input)
            }
            Self::Word(payload) => word::evaluate_word(payload, input),
            Self::Regexp(payload) => regexp::evaluate_regexp(payload, input),
        }
    }
}

/// One filter rule: common attributes plus a kind-specific payload. Produced
/// by the config loader (component C), referenced by name from chats, and
/// otherwise immutable for the process's lifetime.
#[derive(Debug, Clone)]
pub struct Trigger {
    pub name: String,
    pub active: bool,
    pub description: Option<String>,
    pub skip_admins: bool,
    pub white_users: Vec<UserId>,
    pub inverse: bool,
    pub immediately_ban: bool,
    pub kind: TriggerKind,
}

impl Trigger {
    /// `true` iff `user` is exempt from this trigger specifically (as
    /// opposed to the chat-wide whitelist, which the caller checks earlier).
    #[must_use]
    pub fn exempts(&self, user: UserId) -> bool {
        self.white_users.contains(&user)
    }

    /// Evaluate this trigger's kind against `input`, then XOR with
    /// `inverse`. `reason` is always empty when the final result is
    /// `false`, even if the kind-specific evaluation produced one before the
    /// XOR flip (an `inverse` trigger activating on absence of a match has
    /// no single matched substring to report).
    #[must_use]
    pub fn is_active(&self, input: &TriggerInput<'_>) -> (bool, String) {
        let (activated, reason) = self.kind.evaluate(input);
        let final_activated = activated ^ self.inverse;
        if final_activated {
            (true, reason)
        } else {
            (false, String::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_trigger(kind: TriggerKind, inverse: bool) -> Trigger {
        Trigger {
            name: "t".to_string(),
            active: true,
            description: None,
            skip_admins: false,
            white_users: vec![],
            inverse,
            immediately_ban: false,
            kind,
        }
    }

    #[test]
    fn inverse_flips_activation_and_clears_reason_when_final_is_false() {
        let word = WordPayload {
            case_insensitive: true,
            word_list: vec!["spam".to_string()],
        };
        let trigger = base_trigger(TriggerKind::Word(word), true);
        let input = TriggerInput {
            message_text: "this has spam in it",
            message_entities: &[],
            content: "this has spam in it",
            user_name: "",
        };
        // Un-inverted this would activate; inverted it must not, and reason must be empty.
        let (activated, reason) = trigger.is_active(&input);
        assert!(!activated);
        assert_eq!(reason, "");
    }

    #[test]
    fn is_active_deterministic_across_repeated_calls() {
        let word = WordPayload {
            case_insensitive: true,
            word_list: vec!["spam".to_string()],
        };
        let trigger = base_trigger(TriggerKind::Word(word), false);
        let input = TriggerInput {
            message_text: "buy SPAM now",
            message_entities: &[],
            content: "buy SPAM now",
            user_name: "",
        };
        let first = trigger.is_active(&input);
        let second = trigger.is_active(&input);
        assert_eq!(first, second);
    }
}
