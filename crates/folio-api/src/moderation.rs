use axum::Json;

use folio_types::api::{ModerateRequest, SpamAssessment};

use crate::error::{ApiError, AppJson};

const SPAM_MARKERS: &[&str] = &["http://", "https://", "t.me/", "discord.gg", "casino", "crypto"];
const SPAM_THRESHOLD: f32 = 0.6;

/// Heuristic spam score for a shoutbox message.
pub fn assess(text: &str) -> SpamAssessment {
    let lower = text.to_lowercase();
    let mut reasons = Vec::new();
    let mut score = 0.0_f32;

    if SPAM_MARKERS.iter().any(|m| lower.contains(m)) {
        score += 0.55;
        reasons.push("contains spam marker");
    }
    if text.len() > 320 {
        score += 0.2;
        reasons.push("too long");
    }
    if text.chars().filter(|c| *c == '!').count() >= 5 {
        score += 0.15;
        reasons.push("too many exclamation marks");
    }
    if text.split_whitespace().count() <= 2 {
        score += 0.1;
        reasons.push("very short message");
    }

    SpamAssessment {
        score: score.min(1.0),
        is_spam: score >= SPAM_THRESHOLD,
        reasons,
    }
}

/// POST /moderate
pub async fn moderate(AppJson(req): AppJson<ModerateRequest>) -> Result<Json<SpamAssessment>, ApiError> {
    Ok(Json(assess(&req.text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_message_is_clean() {
        let verdict = assess("Love the projects section, keep it up");
        assert!(!verdict.is_spam);
        assert!(verdict.reasons.is_empty());
        assert_eq!(verdict.score, 0.0);
    }

    #[test]
    fn link_plus_short_crosses_threshold() {
        let verdict = assess("https://casino.example");
        assert!(verdict.is_spam);
        assert_eq!(verdict.reasons, vec!["contains spam marker", "very short message"]);
    }

    #[test]
    fn link_alone_in_a_sentence_is_not_spam() {
        let verdict = assess("my write-up is at https://example.com if you are curious");
        assert!(!verdict.is_spam);
        assert!((verdict.score - 0.55).abs() < 1e-6);
    }

    #[test]
    fn score_is_capped() {
        let long = format!("buy crypto now!!!!! {}", "a ".repeat(200));
        let verdict = assess(&long);
        assert!(verdict.is_spam);
        assert!(verdict.score <= 1.0);
    }
}
