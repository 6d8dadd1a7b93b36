//! Shared value-matching rules used by both navigation phases: exact
//! case-insensitive equality takes precedence over substring containment,
//! per §4.4.2's matching rules.

/// Returns the option from `candidates` that best matches `value`: an exact
/// case-insensitive match if one exists, else the first option containing
/// `value` as a case-insensitive substring, else `None`.
pub fn best_match(value: &str, candidates: &[String]) -> Option<String> {
    let needle = value.to_ascii_lowercase();

    if let Some(exact) = candidates.iter().find(|c| c.to_ascii_lowercase() == needle) {
        return Some(exact.clone());
    }

    candidates
        .iter()
        .find(|c| c.to_ascii_lowercase().contains(&needle))
        .cloned()
}

/// Finds the first `candidate` whose text appears (case-insensitively) as a
/// substring of `goal` — the fallback used for Submodel and Body Style when
/// no parsed field matched directly, per §4.4.2/§4.4.2 Phase 2.
pub fn substring_in_goal(goal: &str, candidates: &[String]) -> Option<String> {
    let goal_upper = goal.to_ascii_uppercase();
    candidates
        .iter()
        .find(|c| !c.is_empty() && goal_upper.contains(&c.to_ascii_uppercase()))
        .cloned()
}

/// Matches common drive-type tokens (`4WD|2WD|AWD|RWD|FWD`, case
/// insensitive) appearing anywhere in `text` against `candidates`: returns
/// the first candidate whose text equals one of the tokens found in `text`.
pub fn drive_type_token_match(text: &str, candidates: &[String]) -> Option<String> {
    const TOKENS: &[&str] = &["4WD", "2WD", "AWD", "RWD", "FWD"];
    let upper = text.to_ascii_uppercase();
    let found: Vec<&str> = TOKENS.iter().copied().filter(|t| upper.contains(t)).collect();

    candidates
        .iter()
        .find(|c| found.iter().any(|t| c.to_ascii_uppercase() == *t))
        .cloned()
}

/// Matches common body-style tokens (`2D/4D/PICKUP/SEDAN/COUPE/HATCH/WAGON/CAB`)
/// appearing in `text` against `candidates`, used by the flat Options layout
/// when no direct substring match is found.
pub fn body_style_token_match(text: &str, candidates: &[String]) -> Option<String> {
    const TOKENS: &[&str] = &["2D", "4D", "PICKUP", "SEDAN", "COUPE", "HATCH", "WAGON", "CAB"];
    let upper = text.to_ascii_uppercase();
    let found: Vec<&str> = TOKENS.iter().copied().filter(|t| upper.contains(t)).collect();

    candidates
        .iter()
        .find(|c| found.iter().any(|t| c.to_ascii_uppercase().contains(t)))
        .cloned()
}

/// Matches leading-token prefixes: true if the first two whitespace tokens
/// of `candidate` both appear (case-insensitively) in `goal`. Used as a
/// weaker fallback for Body Style group matching in the structured Options
/// layout.
pub fn leading_tokens_match(goal: &str, candidate: &str) -> bool {
    let goal_upper = goal.to_ascii_uppercase();
    let tokens: Vec<&str> = candidate.split_whitespace().take(2).collect();
    !tokens.is_empty() && tokens.iter().all(|t| goal_upper.contains(&t.to_ascii_uppercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_takes_precedence_over_substring() {
        let candidates = vec!["XL".to_string(), "XLT".to_string()];
        assert_eq!(best_match("XL", &candidates), Some("XL".to_string()));
    }

    #[test]
    fn falls_back_to_substring_containment() {
        let candidates = vec!["5.0L V8".to_string(), "3.5L V6".to_string()];
        assert_eq!(best_match("5.0l", &candidates), Some("5.0L V8".to_string()));
    }

    #[test]
    fn no_match_returns_none() {
        let candidates = vec!["XL".to_string()];
        assert_eq!(best_match("Lariat", &candidates), None);
    }

    #[test]
    fn drive_type_token_extracted_from_longer_string() {
        let candidates = vec!["4WD".to_string(), "2WD".to_string()];
        assert_eq!(
            drive_type_token_match("XLT 4WD SuperCrew", &candidates),
            Some("4WD".to_string())
        );
    }

    #[test]
    fn leading_tokens_require_both_present() {
        assert!(leading_tokens_match("2018 Ford F-150 Crew Cab 4WD", "Crew Cab"));
        assert!(!leading_tokens_match("2018 Ford F-150 4WD", "Crew Cab"));
    }
}
