//! YAML rule/chat document parsing (component C). Per-item shape problems
//! are logged and skipped (bumping [`crate::global_config_parse_errors`]);
//! the load proceeds with whatever did parse. Only a malformed top-level
//! document (the root isn't a mapping, or `triggers`/`group_chats` aren't
//! sequences) aborts the whole load, leaving the caller's existing registry
//! untouched.

use std::collections::HashMap;
use std::sync::Arc;

use regex::RegexBuilder;
use serde_yaml::Value;
use teloxide::types::UserId;

use crate::chat::Chat;
use crate::error::ConfigError;
use crate::rules::{Analyze, LinkList, LinkListItem, RegexpPayload, Trigger, TriggerKind, WordPayload};
use crate::bump_config_parse_errors;

/// The result of one successful parse of the YAML rule/chat document:
/// fully-resolved chats, each already carrying `Arc<Trigger>` references
/// into its rule list. Ready to hand to [`crate::GroupChatRegistry::replace`].
pub struct ConfigDocument {
    pub chats: Vec<Chat>,
}

/// Parse `yaml` into a [`ConfigDocument`]. See the module docs for the
/// top-level-vs-per-item failure split.
pub fn load_document(yaml: &str) -> Result<ConfigDocument, ConfigError> {
    let root: Value = serde_yaml::from_str(yaml)?;

    let triggers_node = root.get("triggers").cloned().unwrap_or(Value::Sequence(vec![]));
    let Value::Sequence(trigger_nodes) = triggers_node else {
        return Err(ConfigError::NotASequence("triggers"));
    };

    let group_chats_node = root.get("group_chats").cloned().unwrap_or(Value::Sequence(vec![]));
    let Value::Sequence(chat_nodes) = group_chats_node else {
        return Err(ConfigError::NotASequence("group_chats"));
    };

    let mut triggers_by_name: HashMap<String, Arc<Trigger>> = HashMap::new();
    for node in &trigger_nodes {
        match parse_trigger(node) {
            Ok(trigger) => {
                if triggers_by_name.contains_key(&trigger.name) {
                    log::warn!("duplicate trigger name '{}', keeping the later definition", trigger.name);
                }
                triggers_by_name.insert(trigger.name.clone(), Arc::new(trigger));
            }
            Err(e) => {
                log::error!("skipping malformed trigger: {e}");
                bump_config_parse_errors();
            }
        }
    }

    let mut chats = Vec::with_capacity(chat_nodes.len());
    for node in &chat_nodes {
        match parse_chat(node, &triggers_by_name) {
            Ok(chat) => chats.push(chat),
            Err(e) => {
                log::error!("skipping malformed group_chats entry: {e}");
                bump_config_parse_errors();
            }
        }
    }

    Ok(ConfigDocument { chats })
}

fn as_str<'a>(node: &'a Value, node_name: &'static str, field: &'static str) -> Result<&'a str, ConfigError> {
    node.get(field)
        .and_then(Value::as_str)
        .ok_or(ConfigError::MissingField { node: node_name, field })
}

fn as_str_opt(node: &Value, field: &str) -> Option<String> {
    node.get(field).and_then(Value::as_str).map(str::to_string)
}

fn as_bool_default(node: &Value, field: &str, default: bool) -> bool {
    node.get(field).and_then(Value::as_bool).unwrap_or(default)
}

fn as_i64_default(node: &Value, field: &str, default: i64) -> i64 {
    node.get(field).and_then(Value::as_i64).unwrap_or(default)
}

fn as_str_seq(node: &Value, field: &str) -> Vec<String> {
    node.get(field)
        .and_then(Value::as_sequence)
        .map(|seq| seq.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn as_i64_seq(node: &Value, field: &str) -> Vec<i64> {
    node.get(field)
        .and_then(Value::as_sequence)
        .map(|seq| seq.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default()
}

fn as_user_id_seq(node: &Value, field: &str) -> Vec<UserId> {
    as_i64_seq(node, field).into_iter().map(|id| UserId(id as u64)).collect()
}

fn as_link_list(node: &Value, field: &str) -> LinkList {
    node.get(field)
        .and_then(Value::as_sequence)
        .map(|seq| {
            seq.iter()
                .filter_map(|item| {
                    let host = item.get("host").and_then(Value::as_str)?.to_string();
                    let paths = as_str_seq(item, "paths");
                    Some(LinkListItem { host, paths })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn compile_pattern_list(
    trigger_name: &str,
    patterns: &[String],
    case_insensitive: bool,
    multiline: bool,
) -> Vec<regex::Regex> {
    patterns
        .iter()
        .filter_map(|pattern| {
            match RegexBuilder::new(pattern)
                .dot_matches_new_line(true)
                .unicode(true)
                .case_insensitive(case_insensitive)
                .multi_line(multiline)
                .build()
            {
                Ok(re) => Some(re),
                Err(e) => {
                    log::error!("{}", ConfigError::InvalidRegex(trigger_name.to_string(), e));
                    None
                }
            }
        })
        .collect()
}

fn parse_trigger(node: &Value) -> Result<Trigger, ConfigError> {
    let name = as_str(node, "trigger", "name")?.to_string();
    if name.is_empty() {
        return Err(ConfigError::EmptyField { node: "trigger", field: "name" });
    }
    let active = as_bool_default(node, "active", true);
    let description = as_str_opt(node, "description");
    let skip_admins = as_bool_default(node, "skip_admins", false);
    let white_users = as_user_id_seq(node, "white_users");
    let inverse = as_bool_default(node, "inverse", false);
    let immediately_ban = as_bool_default(node, "immediately_ban", false);

    let type_str = as_str(node, "trigger", "type")?;
    let case_insensitive = as_bool_default(node, "case_insensitive", true);
    let multiline = as_bool_default(node, "multiline", false);

    let kind = match type_str {
        "link" | "link_disable" => TriggerKind::LinkDisable {
            white_list: as_link_list(node, "white_list"),
        },
        "link_enable" => TriggerKind::LinkEnable {
            white_list: as_link_list(node, "white_list"),
            black_list: as_link_list(node, "black_list"),
        },
        "word" => TriggerKind::Word(WordPayload {
            case_insensitive,
            word_list: as_str_seq(node, "word_list"),
        }),
        "regexp" => {
            let analyze = match as_str_opt(node, "analyze").as_deref() {
                Some("username") => Analyze::Username,
                _ => Analyze::Content,
            };
            let regexp_remove = compile_pattern_list(&name, &as_str_seq(node, "regexp_remove"), case_insensitive, multiline);
            let regexp_list = compile_pattern_list(&name, &as_str_seq(node, "regexp_list"), case_insensitive, multiline);
            TriggerKind::Regexp(RegexpPayload { analyze, regexp_remove, regexp_list })
        }
        other => return Err(ConfigError::UnknownTriggerType(other.to_string())),
    };

    Ok(Trigger {
        name,
        active,
        description,
        skip_admins,
        white_users,
        inverse,
        immediately_ban,
        kind,
    })
}

fn parse_chat(node: &Value, triggers_by_name: &HashMap<String, Arc<Trigger>>) -> Result<Chat, ConfigError> {
    let id = node
        .get("id")
        .and_then(Value::as_i64)
        .ok_or(ConfigError::MissingField { node: "group_chats", field: "id" })?;
    if id == 0 {
        return Err(ConfigError::EmptyField { node: "group_chats", field: "id" });
    }

    let trigger_names = as_str_seq(node, "triggers");
    let mut resolved = Vec::with_capacity(trigger_names.len());
    for trigger_name in &trigger_names {
        match triggers_by_name.get(trigger_name) {
            Some(trigger) => resolved.push(Arc::clone(trigger)),
            None => log::warn!("chat {id} references unknown trigger '{trigger_name}'"),
        }
    }

    let skip_admins = as_bool_default(node, "skip_admins", true);
    let premium_ban = as_bool_default(node, "premium_ban", false);
    let white_users = as_user_id_seq(node, "white_users");
    let user_spam_limit = as_i64_default(node, "user_spam_limit", 5);
    let user_restricts = as_i64_seq(node, "user_restricts");

    let chat = Chat::new(
        teloxide::types::ChatId(id),
        resolved,
        skip_admins,
        white_users,
        user_spam_limit,
        premium_ban,
        user_restricts,
    );
    if let Some(name) = as_str_opt(node, "name") {
        chat.set_name(name);
    }
    Ok(chat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_document() {
        let yaml = r#"
triggers:
  - name: no_links
    type: link_disable
    white_list:
      - host: example.com
group_chats:
  - id: -100
    triggers: [no_links]
    user_spam_limit: 2
"#;
        let doc = load_document(yaml).unwrap();
        assert_eq!(doc.chats.len(), 1);
        assert_eq!(doc.chats[0].triggers.len(), 1);
        assert_eq!(doc.chats[0].user_spam_limit, 2);
    }

    #[test]
    fn unknown_trigger_type_is_skipped_not_fatal() {
        let yaml = r#"
triggers:
  - name: bogus
    type: not_a_real_kind
group_chats: []
"#;
        let doc = load_document(yaml).unwrap();
        assert!(doc.chats.is_empty());
    }

    #[test]
    fn chat_with_missing_trigger_name_is_still_produced() {
        let yaml = r#"
triggers: []
group_chats:
  - id: -1
    triggers: [does_not_exist]
"#;
        let doc = load_document(yaml).unwrap();
        assert_eq!(doc.chats.len(), 1);
        assert!(doc.chats[0].triggers.is_empty());
    }

    #[test]
    fn non_sequence_top_level_node_is_a_hard_failure() {
        let yaml = "triggers: not_a_sequence\ngroup_chats: []\n";
        assert!(load_document(yaml).is_err());
    }

    #[test]
    fn invalid_regex_is_skipped_trigger_still_active_with_remaining_patterns() {
        let yaml = r#"
triggers:
  - name: r
    type: regexp
    regexp_list:
      - "(unclosed"
      - "valid"
group_chats:
  - id: -1
    triggers: [r]
"#;
        let doc = load_document(yaml).unwrap();
        assert_eq!(doc.chats.len(), 1);
        assert_eq!(doc.chats[0].triggers.len(), 1);
        let TriggerKind::Regexp(payload) = &doc.chats[0].triggers[0].kind else {
            panic!("expected a regexp trigger");
        };
        // Only the valid pattern survived; the unclosed one was skipped, not fatal.
        assert_eq!(payload.regexp_list.len(), 1);
        assert!(payload.regexp_list[0].is_match("valid"));
    }
}
