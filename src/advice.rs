//! Post-filtering for the free-text advice flow.
//!
//! Chat replies have no schema, so they bypass validation and
//! reconciliation entirely; the only guarantees made are bounded length and
//! the absence of unsafe financial claims. The filter is deterministic and
//! never triggers a retry: what cannot be salvaged is replaced with a fixed
//! fallback line.

/// Maximum sentences kept from a reply; the prompt asks for three.
pub const MAX_REPLY_SENTENCES: usize = 3;

/// Hard character bound on a reply after sentence trimming.
pub const MAX_REPLY_CHARS: usize = 600;

/// Returned when nothing in the generated reply survives filtering.
pub const FALLBACK_REPLY: &str =
    "I can only offer general guidance here. Consider reviewing your budget regularly and \
     speaking to a qualified financial adviser for personal advice.";

/// Claim phrases that must never reach an end user. Enforced by string
/// match on the output, not by trusting the prompt instruction.
const BANNED_CLAIMS: &[&str] = &[
    "guaranteed return",
    "guaranteed profit",
    "risk-free",
    "can't lose",
    "cannot lose",
    "get rich quick",
    "insider",
    "double your money",
];

/// Clamp a raw chat reply to a bounded, claim-safe string.
pub fn sanitize_reply(raw: &str) -> String {
    let stripped = strip_code_fences(raw);

    let kept: Vec<&str> = split_sentences(&stripped)
        .into_iter()
        .filter(|sentence| !contains_banned_claim(sentence))
        .take(MAX_REPLY_SENTENCES)
        .collect();

    let mut reply = kept.join(" ").trim().to_string();

    if reply.chars().count() > MAX_REPLY_CHARS {
        reply = reply.chars().take(MAX_REPLY_CHARS).collect::<String>();
        reply = format!("{}…", reply.trim_end());
    }

    if reply.is_empty() {
        FALLBACK_REPLY.to_string()
    } else {
        reply
    }
}

fn strip_code_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for (idx, ch) in text.char_indices() {
        if matches!(ch, '.' | '!' | '?') {
            let end = idx + ch.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}

fn contains_banned_claim(sentence: &str) -> bool {
    let lowered = sentence.to_lowercase();
    BANNED_CLAIMS.iter().any(|claim| lowered.contains(claim))
}
