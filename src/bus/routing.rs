//! Topic routing-key matching.
//!
//! Keys and patterns are dot-separated words. In a pattern `*` matches
//! exactly one word and `#` matches zero or more words, as on an AMQP topic
//! exchange.

/// Returns `true` if `routing_key` matches the binding `pattern`.
#[must_use]
pub fn matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    match_words(&pattern, &key)
}

fn match_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len())
            .any(|skip| key.get(skip..).is_some_and(|tail| match_words(rest, tail))),
        Some((&"*", rest)) => key
            .split_first()
            .is_some_and(|(_, tail)| match_words(rest, tail)),
        Some((word, rest)) => key
            .split_first()
            .is_some_and(|(head, tail)| head == word && match_words(rest, tail)),
    }
}
