//! `regexp` trigger matching: a pre-scrub removal pass over `content` or
//! `user_name`, then first-match-wins against a list of patterns. Patterns
//! are compiled once by the config loader ([`crate::config`]), not here —
//! this module only ever sees already-compiled [`regex::Regex`] values.

use regex::Regex;

use super::TriggerInput;

/// Which half of the trigger text this trigger analyzes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Analyze {
    Content,
    Username,
}

#[derive(Debug, Clone)]
pub struct RegexpPayload {
    pub analyze: Analyze,
    /// Applied in order as global deletions before matching.
    pub regexp_remove: Vec<Regex>,
    pub regexp_list: Vec<Regex>,
}

/// Apply every pattern in `remove` as a global delete, in order. Applying the
/// full list a second time to the result is a no-op, since each pattern has
/// nothing left to match once its own hits are gone (the law relied on by
/// §8's "applying `regexp_remove` twice" test only holds for this identical
/// set of patterns run again, not for removing a second, different set).
#[must_use]
fn apply_removals(text: &str, remove: &[Regex]) -> String {
    let mut out = text.to_string();
    for pattern in remove {
        out = pattern.replace_all(&out, "").into_owned();
    }
    out
}

pub fn evaluate_regexp(payload: &RegexpPayload, input: &TriggerInput<'_>) -> (bool, String) {
    let source = match payload.analyze {
        Analyze::Content => input.content,
        Analyze::Username => input.user_name,
    };

    let scrubbed = apply_removals(source, &payload.regexp_remove);
    let scrubbed = scrubbed.trim();
    if scrubbed.is_empty() {
        return (false, String::new());
    }

    for pattern in &payload.regexp_list {
        if let Some(m) = pattern.find(scrubbed) {
            return (true, format!("фраза: {}", m.as_str()));
        }
    }
    (false, String::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::RegexBuilder;

    fn compile(pattern: &str, case_insensitive: bool, multiline: bool) -> Regex {
        RegexBuilder::new(pattern)
            .dot_matches_new_line(true)
            .unicode(true)
            .case_insensitive(case_insensitive)
            .multi_line(multiline)
            .build()
            .unwrap()
    }

    fn input_with_username(user_name: &'static str) -> TriggerInput<'static> {
        TriggerInput {
            message_text: "",
            message_entities: &[],
            content: "",
            user_name,
        }
    }

    #[test]
    fn matches_against_username_when_analyze_is_username() {
        let payload = RegexpPayload {
            analyze: Analyze::Username,
            regexp_remove: vec![],
            regexp_list: vec![compile("(?i)casino", true, false)],
        };
        let (activated, reason) = evaluate_regexp(&payload, &input_with_username("BigCasinoBoss"));
        assert!(activated);
        assert!(reason.starts_with("фраза: "));
    }

    #[test]
    fn removal_applied_twice_is_stable() {
        let remove = vec![compile(r"\d+", false, false)];
        let once = apply_removals("abc123def456", &remove);
        let twice = apply_removals(&once, &remove);
        assert_eq!(once, twice);
        assert_eq!(once, "abcdef");
    }

    #[test]
    fn empty_after_scrub_does_not_activate() {
        let payload = RegexpPayload {
            analyze: Analyze::Content,
            regexp_remove: vec![compile(r".*", false, false)],
            regexp_list: vec![compile("anything", false, false)],
        };
        let input = TriggerInput {
            message_text: "hello",
            message_entities: &[],
            content: "hello",
            user_name: "",
        };
        assert!(!evaluate_regexp(&payload, &input).0);
    }
}
