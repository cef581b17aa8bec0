//! Company-specific verdict finishing: suffix cleanup, confidence
//! calibration, and explanation tidying.

use std::sync::LazyLock;

use regex::Regex;

use prospectclean_shared::{FieldVerdict, VerdictSource};

use crate::service::{ServiceVerdict, ValidationContext};

/// Turn a raw service verdict for a company field into a [`FieldVerdict`].
pub(crate) fn finalize(
    original: &str,
    ctx: &ValidationContext,
    verdict: ServiceVerdict,
) -> FieldVerdict {
    let unknown = !verdict.known_entity;
    let trimmed = verdict.corrected_value.trim();
    let corrected = if unknown || trimmed.is_empty() {
        basic_clean(original)
    } else {
        trimmed.to_string()
    };

    let domain_ok = domain_matches(&ctx.email_domain, &corrected);
    let confidence = calibrate(verdict.confidence, verdict.citations.len(), domain_ok, unknown);

    let source_label = if corrected == original {
        VerdictSource::Accepted
    } else {
        VerdictSource::Corrected
    };

    FieldVerdict {
        corrected_value: corrected,
        confidence,
        explanation: tidy_explanation(&verdict.explanation),
        source_label,
        citations: verdict.citations,
    }
}

// ---------------------------------------------------------------------------
// Confidence calibration
// ---------------------------------------------------------------------------

/// Adjust the service's base confidence with local signals.
///
/// Citations add up to 0.1, an email-domain match adds 0.1, and an unknown
/// entity scales the base down to 30%. The result is clamped to [0, 1] and
/// rounded up to two decimals.
pub(crate) fn calibrate(
    base: f64,
    citations: usize,
    domain_match: bool,
    unknown: bool,
) -> f64 {
    let conf = if unknown { base * 0.3 } else { base };
    let mut bonus = citations.min(4) as f64 * 0.025;
    if domain_match {
        bonus += 0.1;
    }
    let raw = (conf + bonus).clamp(0.0, 1.0);
    // Epsilon keeps binary float artifacts from bumping the ceiling
    ((raw * 100.0) - 1e-9).ceil() / 100.0
}

/// Check whether the email domain's first label appears in the company name.
fn domain_matches(email_domain: &str, name: &str) -> bool {
    let label = email_domain
        .rsplit('@')
        .next()
        .unwrap_or("")
        .split('.')
        .next()
        .unwrap_or("");
    let label = normalize(label);
    !label.is_empty() && normalize(name).contains(&label)
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

// ---------------------------------------------------------------------------
// Name cleanup
// ---------------------------------------------------------------------------

static SUFFIX_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\s+(SARL|SAS|SA|SASU|EURL|SNC|SCI|SCP|SCOP|SEL|SELARL|SELAS|SELASU)\b",
        r"(?i)\s+(AG|GmbH|KG|OHG|GbR|UG)\b",
        r"(?i)\s+(Ltd|Limited|LLC|Inc|Incorporated|Corp|Corporation|Company|Co\.?)\b",
        r"(?i)\s+(BV|NV|VOF|CV)\b",
        r"(?i)\s+(SpA|Srl|Snc|Sas)\b",
        r"(?i)\s+(AB|HB|KB)\b",
        r"[,\s]+(®|™|©)",
        r"\s*\([^)]+\)$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("suffix regex"))
    .collect()
});

/// Strip legal suffixes and trademark clutter from a company name.
pub(crate) fn basic_clean(name: &str) -> String {
    let mut cleaned = name.trim().to_string();
    for re in SUFFIX_RES.iter() {
        cleaned = re.replace_all(&cleaned, "").into_owned();
    }
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        name.to_string()
    } else {
        cleaned
    }
}

// ---------------------------------------------------------------------------
// Explanation tidying
// ---------------------------------------------------------------------------

static MD_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]*\)").expect("link regex"));
static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[\-\*•]\s*").expect("bullet regex"));

/// Flatten a service explanation to a single plain-text line.
pub(crate) fn tidy_explanation(text: &str) -> String {
    let text = MD_LINK_RE.replace_all(text, "$1");
    let text = BULLET_RE.replace_all(&text, "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_clean_strips_legal_suffixes() {
        assert_eq!(basic_clean("Acme SARL"), "Acme");
        assert_eq!(basic_clean("Müller GmbH"), "Müller");
        assert_eq!(basic_clean("Initech Inc"), "Initech");
        assert_eq!(basic_clean("Globex Corporation (France)"), "Globex");
    }

    #[test]
    fn basic_clean_keeps_embedded_words() {
        // "Savoie" must not lose its "Sa"
        assert_eq!(basic_clean("Groupe Savoie"), "Groupe Savoie");
    }

    #[test]
    fn basic_clean_never_returns_empty() {
        assert_eq!(basic_clean("SARL"), "SARL");
    }

    #[test]
    fn calibrate_rounds_up_to_two_decimals() {
        // 0.5 + 3 citations * 0.025 = 0.575 -> 0.58
        assert_eq!(calibrate(0.5, 3, false, false), 0.58);
    }

    #[test]
    fn calibrate_caps_citation_bonus() {
        assert_eq!(calibrate(0.5, 10, false, false), calibrate(0.5, 4, false, false));
    }

    #[test]
    fn calibrate_domain_match_bonus() {
        assert_eq!(calibrate(0.8, 0, true, false), 0.9);
    }

    #[test]
    fn calibrate_unknown_entity_penalty() {
        assert_eq!(calibrate(0.9, 0, false, true), 0.27);
    }

    #[test]
    fn calibrate_clamps_to_one() {
        assert_eq!(calibrate(0.99, 4, true, false), 1.0);
    }

    #[test]
    fn domain_matching() {
        assert!(domain_matches("acme.fr", "Acme Industries"));
        assert!(domain_matches("contact@acme-group.io", "ACME Group"));
        assert!(!domain_matches("gmail.com", "Acme"));
        assert!(!domain_matches("", "Acme"));
    }

    #[test]
    fn tidy_explanation_flattens_markdown() {
        let raw = "- Nom officiel: [Meta](https://meta.com)\n- Renommée   en 2021";
        assert_eq!(
            tidy_explanation(raw),
            "Nom officiel: Meta Renommée en 2021"
        );
    }

    #[test]
    fn finalize_unknown_falls_back_to_cleaned_name() {
        let ctx = ValidationContext::default();
        let verdict = ServiceVerdict {
            corrected_value: "???".into(),
            confidence: 0.6,
            explanation: String::new(),
            known_entity: false,
            citations: vec![],
        };
        let out = finalize("Acme SARL", &ctx, verdict);
        assert_eq!(out.corrected_value, "Acme");
        // 0.6 * 0.3 = 0.18
        assert_eq!(out.confidence, 0.18);
        assert_eq!(out.source_label, VerdictSource::Corrected);
    }
}
