//! `word` trigger matching: plain substring containment against a fixed word
//! list, case-(in)sensitive as configured.

use super::TriggerInput;

#[derive(Debug, Clone)]
pub struct WordPayload {
    pub case_insensitive: bool,
    pub word_list: Vec<String>,
}

/// First word in `word_list` that appears as a substring of `content` wins;
/// `reason` = `"слово: " + word`.
pub fn evaluate_word(payload: &WordPayload, input: &TriggerInput<'_>) -> (bool, String) {
    if payload.case_insensitive {
        let content_lower = input.content.to_lowercase();
        for word in &payload.word_list {
            if content_lower.contains(&word.to_lowercase()) {
                return (true, format!("слово: {word}"));
            }
        }
    } else {
        for word in &payload.word_list {
            if input.content.contains(word.as_str()) {
                return (true, format!("слово: {word}"));
            }
        }
    }
    (false, String::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(content: &'static str) -> TriggerInput<'static> {
        TriggerInput {
            message_text: content,
            message_entities: &[],
            content,
            user_name: "",
        }
    }

    #[test]
    fn case_insensitive_matches_regardless_of_case() {
        let payload = WordPayload {
            case_insensitive: true,
            word_list: vec!["spam".to_string()],
        };
        let (activated, reason) = evaluate_word(&payload, &input("this is SPAM"));
        assert!(activated);
        assert_eq!(reason, "слово: spam");
    }

    #[test]
    fn case_sensitive_does_not_match_different_case() {
        let payload = WordPayload {
            case_insensitive: false,
            word_list: vec!["spam".to_string()],
        };
        assert!(!evaluate_word(&payload, &input("this is SPAM")).0);
        assert!(evaluate_word(&payload, &input("this is spam")).0);
    }

    #[test]
    fn no_match_has_empty_reason() {
        let payload = WordPayload {
            case_insensitive: true,
            word_list: vec!["spam".to_string()],
        };
        let (activated, reason) = evaluate_word(&payload, &input("hello there"));
        assert!(!activated);
        assert_eq!(reason, "");
    }
}
