//! `link_disable` / `link_enable` trigger matching: host/path whitelist and
//! blacklist comparisons over the URLs found in a message's entities.

use teloxide::types::{parse_entities, MessageEntityKind, MessageEntityRef};

use super::TriggerInput;

/// One `{host, paths}` entry of a `white_list`/`black_list`.
#[derive(Debug, Clone)]
pub struct LinkListItem {
    pub host: String,
    pub paths: Vec<String>,
}

pub type LinkList = Vec<LinkListItem>;

/// `true` iff `host` ends with some item's `host` (case-insensitive) and
/// either that item lists no paths, or `path` starts with one of them
/// (case-insensitive, each path normalized to begin with `/`).
#[must_use]
fn url_in_list(host: &str, path: &str, list: &LinkList) -> bool {
    let host_lower = host.to_lowercase();
    let path_lower = path.to_lowercase();

    for item in list {
        if !host_lower.ends_with(&item.host.to_lowercase()) {
            continue;
        }
        if item.paths.is_empty() {
            return true;
        }
        for raw_path in &item.paths {
            let normalized = if raw_path.starts_with('/') {
                raw_path.clone()
            } else {
                format!("/{raw_path}")
            };
            if path_lower.starts_with(&normalized.to_lowercase()) {
                return true;
            }
        }
    }
    false
}

/// Extract the URL text for one resolved entity, if it's a kind that carries
/// a URL. `url` entities carry their text as a span of the message text,
/// resolved by `teloxide` rather than re-derived by hand; `text_link`
/// entities carry the URL directly.
fn entity_url(entity: &MessageEntityRef<'_>) -> Option<String> {
    match entity.kind() {
        MessageEntityKind::Url => Some(entity.text().to_string()),
        MessageEntityKind::TextLink { url } => Some(url.to_string()),
        _ => None,
    }
}

fn host_and_path(url_str: &str) -> Option<(String, String)> {
    let parsed = url::Url::parse(url_str).ok()?;
    let host = parsed.host_str()?.to_string();
    Some((host, parsed.path().to_string()))
}

/// `link_disable` (alias `link`): activates when some URL is not covered by
/// `white_list`. Scanning stops at the first activating URL.
pub fn evaluate_link_disable(white_list: &LinkList, input: &TriggerInput<'_>) -> (bool, String) {
    for entity in parse_entities(input.message_text, input.message_entities) {
        let Some(url_str) = entity_url(&entity) else {
            continue;
        };
        let reason = format!("ссылка: {url_str}");

        let Some((host, path)) = host_and_path(&url_str) else {
            // Could not parse as a URL at all; treat as "not in whitelist".
            return (true, reason);
        };

        if !url_in_list(&host, &path, white_list) {
            return (true, reason);
        }
    }
    (false, String::new())
}

/// `link_enable`: activates when some URL is not covered by `white_list`
/// *and* is covered by `black_list`. URLs neither whitelisted nor
/// blacklisted do not activate and scanning continues.
pub fn evaluate_link_enable(
    white_list: &LinkList,
    black_list: &LinkList,
    input: &TriggerInput<'_>,
) -> (bool, String) {
    for entity in parse_entities(input.message_text, input.message_entities) {
        let Some(url_str) = entity_url(&entity) else {
            continue;
        };
        let reason = format!("ссылка: {url_str}");

        let Some((host, path)) = host_and_path(&url_str) else {
            continue;
        };

        if url_in_list(&host, &path, white_list) {
            continue;
        }
        if url_in_list(&host, &path, black_list) {
            return (true, reason);
        }
    }
    (false, String::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::MessageEntity;

    fn item(host: &str, paths: &[&str]) -> LinkListItem {
        LinkListItem {
            host: host.to_string(),
            paths: paths.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn url_entity(offset: usize, length: usize) -> MessageEntity {
        MessageEntity {
            kind: MessageEntityKind::Url,
            offset,
            length,
        }
    }

    #[test]
    fn link_disable_empty_whitelist_activates_on_any_url() {
        let input = TriggerInput {
            message_text: "see https://evil.test/x",
            message_entities: &[url_entity(4, 20)],
            content: "see",
            user_name: "",
        };
        let (activated, reason) = evaluate_link_disable(&vec![], &input);
        assert!(activated);
        assert!(reason.starts_with("ссылка: "));
    }

    #[test]
    fn link_disable_whitelisted_host_with_empty_paths_never_activates() {
        let list = vec![item("example.com", &[])];
        let input = TriggerInput {
            message_text: "visit https://docs.example.com/a",
            message_entities: &[url_entity(6, 27)],
            content: "visit",
            user_name: "",
        };
        let (activated, _) = evaluate_link_disable(&list, &input);
        assert!(!activated);
    }

    #[test]
    fn link_enable_requires_blacklist_match() {
        let white = vec![item("example.com", &[])];
        let black = vec![item("evil.test", &[])];

        let good = TriggerInput {
            message_text: "https://example.com/a",
            message_entities: &[url_entity(0, 22)],
            content: "",
            user_name: "",
        };
        assert!(!evaluate_link_enable(&white, &black, &good).0);

        let neutral = TriggerInput {
            message_text: "https://neutral.test/a",
            message_entities: &[url_entity(0, 22)],
            content: "",
            user_name: "",
        };
        assert!(!evaluate_link_enable(&white, &black, &neutral).0);

        let bad = TriggerInput {
            message_text: "https://evil.test/a",
            message_entities: &[url_entity(0, 19)],
            content: "",
            user_name: "",
        };
        let (activated, reason) = evaluate_link_enable(&white, &black, &bad);
        assert!(activated);
        assert!(reason.contains("evil.test"));
    }
}
