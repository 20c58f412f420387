//! Clean-text and display-name construction shared between the trigger
//! engine and the worker pipeline. Telegram message entities are indexed in
//! UTF-16 code units; rather than re-deriving that offset math by hand, every
//! removal here goes through `teloxide`'s own [`parse_entities`], the same
//! entity-resolution entry point `Message::parse_entities` uses internally.

use teloxide::types::{parse_entities, MessageEntity, MessageEntityKind};

/// Remove every substring flagged as a `url` entity from `text`.
///
/// Idempotent: running this again on its own output is a no-op, since the
/// entities describing the removed ranges no longer apply to the new text.
#[must_use]
pub fn strip_url_entities(text: &str, entities: &[MessageEntity]) -> String {
    if text.is_empty() || entities.is_empty() {
        return text.to_string();
    }

    let base = text.as_ptr() as usize;

    // Resolve entity spans through teloxide rather than hand-rolled UTF-16
    // offsets, then recover the byte range each resolved slice occupies in
    // `text` (`MessageEntityRef::text` is always a sub-slice of it).
    let mut ranges: Vec<(usize, usize)> = parse_entities(text, entities)
        .into_iter()
        .filter(|e| matches!(e.kind(), MessageEntityKind::Url))
        .map(|e| {
            let slice = e.text();
            let start = slice.as_ptr() as usize - base;
            (start, start + slice.len())
        })
        .collect();
    // Remove back-to-front so earlier offsets stay valid.
    ranges.sort_unstable_by(|a, b| b.0.cmp(&a.0));

    let mut out = text.to_string();
    for (start, end) in ranges {
        out.replace_range(start..end, "");
    }
    out
}

/// Build the `content` half of [`crate::rules::TriggerText`]: caption first,
/// then message text, each with their `url` entities stripped, joined by a
/// newline, trimmed.
#[must_use]
pub fn build_clear_text(
    text: Option<&str>,
    text_entities: &[MessageEntity],
    caption: Option<&str>,
    caption_entities: &[MessageEntity],
) -> String {
    let clear_text = text.map_or_else(String::new, |t| strip_url_entities(t, text_entities));
    let clear_caption =
        caption.map_or_else(String::new, |c| strip_url_entities(c, caption_entities));

    let clear_caption = clear_caption.trim();
    let clear_text = clear_text.trim();

    let combined = if clear_caption.is_empty() {
        clear_text.to_string()
    } else if clear_text.is_empty() {
        clear_caption.to_string()
    } else {
        format!("{clear_caption}\n{clear_text}")
    };

    combined.trim().to_string()
}

/// Build the `user_name` half of [`crate::rules::TriggerText`]: `"first last
/// username"`, trimmed. Deliberately not per-field trimmed; an absent
/// `last_name` or `username` leaves a double space in the middle, matching
/// what the rest of the pipeline expects to scrub with `regexp_remove`.
#[must_use]
pub fn build_user_name(first_name: &str, last_name: &str, username: &str) -> String {
    format!("{first_name} {last_name} {username}").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::MessageEntity;

    fn url_entity(offset: usize, length: usize) -> MessageEntity {
        MessageEntity {
            kind: MessageEntityKind::Url,
            offset,
            length,
        }
    }

    #[test]
    fn strips_single_url() {
        let text = "see https://evil.test/x now";
        // "https://evil.test/x" starts at byte/utf16 offset 4, length 20.
        let entities = vec![url_entity(4, 20)];
        let out = strip_url_entities(text, &entities);
        assert_eq!(out, "see  now");
    }

    #[test]
    fn strip_is_idempotent() {
        let text = "see https://evil.test/x now";
        let entities = vec![url_entity(4, 20)];
        let once = strip_url_entities(text, &entities);
        let twice = strip_url_entities(&once, &[]);
        assert_eq!(once, twice);
    }

    #[test]
    fn clear_text_joins_caption_then_text() {
        let clear = build_clear_text(Some("body"), &[], Some("cap"), &[]);
        assert_eq!(clear, "cap\nbody");
    }

    #[test]
    fn clear_text_handles_missing_halves() {
        assert_eq!(build_clear_text(Some("body"), &[], None, &[]), "body");
        assert_eq!(build_clear_text(None, &[], Some("cap"), &[]), "cap");
        assert_eq!(build_clear_text(None, &[], None, &[]), "");
    }

    #[test]
    fn user_name_trims_only_ends() {
        assert_eq!(build_user_name("John", "", "jdoe"), "John  jdoe");
        assert_eq!(build_user_name("John", "Doe", ""), "John Doe");
    }
}
