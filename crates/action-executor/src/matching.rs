//! Fuzzy option matching.
//!
//! A deterministic ladder: identical inputs always produce identical
//! outputs, and the first rule that matches wins. Rules, in order:
//! exact equality, case-insensitive equality, domain mappings (countries,
//! US states, year fragments, degree abbreviations), substring containment,
//! acronym match, longest-common-subsequence similarity, and a logged
//! last-resort pick of the first non-placeholder option.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use tracing::debug;

use applyflow_core_types::SelectOption;

/// Similarity floor for the LCS rule.
const SIMILARITY_THRESHOLD: f64 = 0.6;
/// Confidence assigned to the last-resort pick.
pub const LAST_RESORT_CONFIDENCE: f64 = 0.3;

/// A ladder hit: the option index, the rule that produced it, and the
/// confidence the rule carries.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchOutcome {
    pub index: usize,
    pub rule: MatchRule,
    pub confidence: f64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MatchRule {
    Exact,
    CaseInsensitive,
    Domain,
    Substring,
    Acronym,
    Similarity,
    LastResort,
}

static US_STATES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("al", "alabama"),
        ("ak", "alaska"),
        ("az", "arizona"),
        ("ar", "arkansas"),
        ("ca", "california"),
        ("co", "colorado"),
        ("ct", "connecticut"),
        ("de", "delaware"),
        ("fl", "florida"),
        ("ga", "georgia"),
        ("hi", "hawaii"),
        ("id", "idaho"),
        ("il", "illinois"),
        ("in", "indiana"),
        ("ia", "iowa"),
        ("ks", "kansas"),
        ("ky", "kentucky"),
        ("la", "louisiana"),
        ("me", "maine"),
        ("md", "maryland"),
        ("ma", "massachusetts"),
        ("mi", "michigan"),
        ("mn", "minnesota"),
        ("ms", "mississippi"),
        ("mo", "missouri"),
        ("mt", "montana"),
        ("ne", "nebraska"),
        ("nv", "nevada"),
        ("nh", "new hampshire"),
        ("nj", "new jersey"),
        ("nm", "new mexico"),
        ("ny", "new york"),
        ("nc", "north carolina"),
        ("nd", "north dakota"),
        ("oh", "ohio"),
        ("ok", "oklahoma"),
        ("or", "oregon"),
        ("pa", "pennsylvania"),
        ("ri", "rhode island"),
        ("sc", "south carolina"),
        ("sd", "south dakota"),
        ("tn", "tennessee"),
        ("tx", "texas"),
        ("ut", "utah"),
        ("vt", "vermont"),
        ("va", "virginia"),
        ("wa", "washington"),
        ("wv", "west virginia"),
        ("wi", "wisconsin"),
        ("wy", "wyoming"),
        ("dc", "district of columbia"),
    ])
});

static COUNTRY_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("us", "united states"),
        ("usa", "united states"),
        ("u.s.", "united states"),
        ("u.s.a.", "united states"),
        ("united states of america", "united states"),
        ("uk", "united kingdom"),
        ("u.k.", "united kingdom"),
        ("great britain", "united kingdom"),
        ("ca", "canada"),
        ("de", "germany"),
        ("fr", "france"),
        ("in", "india"),
        ("cn", "china"),
        ("jp", "japan"),
        ("au", "australia"),
    ])
});

static DEGREE_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("bs", "bachelor"),
        ("b.s.", "bachelor"),
        ("ba", "bachelor"),
        ("b.a.", "bachelor"),
        ("bachelors", "bachelor"),
        ("bachelor's degree", "bachelor"),
        ("bachelor's", "bachelor"),
        ("ms", "master"),
        ("m.s.", "master"),
        ("ma", "master"),
        ("m.a.", "master"),
        ("masters", "master"),
        ("master's degree", "master"),
        ("master's", "master"),
        ("phd", "doctorate"),
        ("ph.d.", "doctorate"),
        ("doctoral", "doctorate"),
    ])
});

/// Walk the ladder against an option list. `None` only when the list is
/// empty or every entry is a placeholder and no earlier rule fired.
pub fn match_option(target: &str, options: &[SelectOption]) -> Option<MatchOutcome> {
    let target_trim = target.trim();
    let target_lower = target_trim.to_lowercase();

    // 1. Exact equality on value or visible text.
    for (index, option) in options.iter().enumerate() {
        if option.value == target_trim || option.text == target_trim {
            return Some(MatchOutcome {
                index,
                rule: MatchRule::Exact,
                confidence: 1.0,
            });
        }
    }

    // 2. Case-insensitive equality.
    for (index, option) in options.iter().enumerate() {
        if option.value.trim().to_lowercase() == target_lower
            || option.text.trim().to_lowercase() == target_lower
        {
            return Some(MatchOutcome {
                index,
                rule: MatchRule::CaseInsensitive,
                confidence: 0.95,
            });
        }
    }

    // 3. Domain mappings.
    for (index, option) in options.iter().enumerate() {
        if domain_equivalent(&target_lower, &option.text.trim().to_lowercase())
            || domain_equivalent(&target_lower, &option.value.trim().to_lowercase())
        {
            return Some(MatchOutcome {
                index,
                rule: MatchRule::Domain,
                confidence: 0.9,
            });
        }
    }

    // 4. Substring containment, either direction.
    for (index, option) in options.iter().enumerate() {
        let text = option.text.trim().to_lowercase();
        if text.is_empty() {
            continue;
        }
        if text.contains(&target_lower) || target_lower.contains(&text) {
            return Some(MatchOutcome {
                index,
                rule: MatchRule::Substring,
                confidence: 0.8,
            });
        }
    }

    // 5. Acronym of the option words.
    for (index, option) in options.iter().enumerate() {
        if acronym(&option.text) == target_lower && target_lower.len() > 1 {
            return Some(MatchOutcome {
                index,
                rule: MatchRule::Acronym,
                confidence: 0.75,
            });
        }
    }

    // 6. Character-level similarity; highest ratio wins, first index breaks
    // ties.
    let mut best: Option<(usize, f64)> = None;
    for (index, option) in options.iter().enumerate() {
        let ratio = similarity(&target_lower, &option.text.trim().to_lowercase());
        if ratio >= SIMILARITY_THRESHOLD {
            match best {
                Some((_, best_ratio)) if ratio <= best_ratio => {}
                _ => best = Some((index, ratio)),
            }
        }
    }
    if let Some((index, ratio)) = best {
        return Some(MatchOutcome {
            index,
            rule: MatchRule::Similarity,
            confidence: ratio,
        });
    }

    // 7. Last resort: the first non-placeholder option.
    for (index, option) in options.iter().enumerate() {
        if !is_placeholder(option) {
            debug!(
                target = target_trim,
                option = %option.text,
                "no option matched; falling back to first non-placeholder"
            );
            return Some(MatchOutcome {
                index,
                rule: MatchRule::LastResort,
                confidence: LAST_RESORT_CONFIDENCE,
            });
        }
    }

    None
}

/// Equivalence classes used for radio groups (Yes/No and gender variants).
pub fn radio_equivalent(target: &str, value: &str, label: &str) -> bool {
    let target = target.trim().to_lowercase();
    let value = value.trim().to_lowercase();
    let label = label.trim().to_lowercase();

    if target == value || target == label {
        return true;
    }

    const CLASSES: [&[&str]; 4] = [
        &["yes", "y", "true", "1", "authorized"],
        &["no", "n", "false", "0", "not authorized"],
        &["male", "m", "man"],
        &["female", "f", "woman"],
    ];
    for class in CLASSES {
        if class.contains(&target.as_str()) {
            if class.contains(&value.as_str()) {
                return true;
            }
            if class.iter().any(|variant| label.contains(variant)) {
                return true;
            }
        }
    }

    if !label.is_empty() && (label.contains(&target) || target.contains(&label)) {
        return true;
    }
    false
}

fn domain_equivalent(target: &str, candidate: &str) -> bool {
    if target == candidate {
        return false; // earlier rules already handled equality
    }
    if let Some(expanded) = COUNTRY_ALIASES.get(target) {
        if candidate == *expanded {
            return true;
        }
    }
    if let Some(expanded) = COUNTRY_ALIASES.get(candidate) {
        if target == *expanded {
            return true;
        }
    }
    if let Some(full) = US_STATES.get(target) {
        if candidate == *full {
            return true;
        }
    }
    if let Some(full) = US_STATES.get(candidate) {
        if target == *full {
            return true;
        }
    }
    if let (Some(a), Some(b)) = (DEGREE_ALIASES.get(target), DEGREE_ALIASES.get(candidate)) {
        if a == b {
            return true;
        }
    }
    if let Some(canonical) = DEGREE_ALIASES.get(target) {
        if candidate.contains(canonical) {
            return true;
        }
    }
    // Year fragments: "2018" matches "2018 - 2019" style ranges.
    if target.len() == 4
        && target.chars().all(|c| c.is_ascii_digit())
        && candidate.contains(target)
    {
        return true;
    }
    false
}

fn acronym(text: &str) -> String {
    text.split_whitespace()
        .filter_map(|word| word.chars().next())
        .collect::<String>()
        .to_lowercase()
}

/// LCS-based similarity ratio, the same shape difflib's SequenceMatcher
/// reports: `2 * lcs / (len_a + len_b)`.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev = vec![0usize; b_chars.len() + 1];
    let mut current = vec![0usize; b_chars.len() + 1];
    for &ca in &a_chars {
        for (j, &cb) in b_chars.iter().enumerate() {
            current[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(current[j])
            };
        }
        std::mem::swap(&mut prev, &mut current);
    }
    let lcs = prev[b_chars.len()];
    (2.0 * lcs as f64) / (a_chars.len() + b_chars.len()) as f64
}

fn is_placeholder(option: &SelectOption) -> bool {
    if option.value.trim().is_empty() {
        return true;
    }
    let text = option.text.trim().to_lowercase();
    text.is_empty()
        || text.starts_with("select")
        || text.starts_with("choose")
        || text.starts_with("please")
        || text.starts_with("--")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(entries: &[(&str, &str)]) -> Vec<SelectOption> {
        entries
            .iter()
            .map(|(value, text)| SelectOption::new(*value, *text))
            .collect()
    }

    #[test]
    fn exact_match_wins_first() {
        let opts = options(&[("", ""), ("US", "United States"), ("CA", "Canada")]);
        let outcome = match_option("US", &opts).unwrap();
        assert_eq!(outcome.rule, MatchRule::Exact);
        assert_eq!(outcome.index, 1);
    }

    #[test]
    fn country_alias_maps_us_to_united_states() {
        let opts = options(&[
            ("", ""),
            ("united-states", "United States"),
            ("canada", "Canada"),
            ("uk", "United Kingdom"),
        ]);
        let outcome = match_option("US", &opts).unwrap();
        assert_eq!(outcome.rule, MatchRule::Domain);
        assert_eq!(opts[outcome.index].text, "United States");
    }

    #[test]
    fn state_abbreviation_expands() {
        let opts = options(&[("", "Select a state"), ("CA", "California"), ("NY", "New York")]);
        // "CA" hits exact on value first; full-name targets go through the
        // domain rule.
        let outcome = match_option("California", &opts).unwrap();
        assert_eq!(opts[outcome.index].value, "CA");

        let opts = options(&[("1", "California"), ("2", "New York")]);
        let outcome = match_option("NY", &opts).unwrap();
        assert_eq!(outcome.rule, MatchRule::Domain);
        assert_eq!(opts[outcome.index].text, "New York");
    }

    #[test]
    fn degree_abbreviations_map() {
        let opts = options(&[("", "--"), ("1", "Bachelor's Degree"), ("2", "Master's Degree")]);
        let outcome = match_option("BS", &opts).unwrap();
        assert_eq!(outcome.rule, MatchRule::Domain);
        assert_eq!(opts[outcome.index].text, "Bachelor's Degree");
    }

    #[test]
    fn year_fragment_matches_range() {
        let opts = options(&[("", "Year"), ("a", "2017 - 2018"), ("b", "2019 - 2020")]);
        let outcome = match_option("2019", &opts).unwrap();
        assert_eq!(opts[outcome.index].text, "2019 - 2020");
    }

    #[test]
    fn acronym_rule() {
        let opts = options(&[("1", "Information Systems"), ("2", "Computer Science")]);
        let outcome = match_option("CS", &opts).unwrap();
        assert_eq!(outcome.rule, MatchRule::Acronym);
        assert_eq!(outcome.index, 1);
    }

    #[test]
    fn similarity_catches_typos() {
        let opts = options(&[("1", "San Francisco"), ("2", "Los Angeles")]);
        let outcome = match_option("San Fransisco", &opts).unwrap();
        assert_eq!(outcome.rule, MatchRule::Similarity);
        assert_eq!(outcome.index, 0);
        assert!(outcome.confidence >= 0.6);
    }

    #[test]
    fn last_resort_skips_placeholders() {
        let opts = options(&[
            ("", "Select one"),
            ("--", "--"),
            ("real", "Something Unrelated"),
        ]);
        let outcome = match_option("zzz-no-match-qqq", &opts).unwrap();
        assert_eq!(outcome.rule, MatchRule::LastResort);
        assert_eq!(outcome.index, 2);
        assert_eq!(outcome.confidence, LAST_RESORT_CONFIDENCE);
    }

    #[test]
    fn empty_or_all_placeholder_lists_miss() {
        assert_eq!(match_option("x", &[]), None);
        let opts = options(&[("", "Select"), ("", "--")]);
        assert_eq!(match_option("zzz-no-similarity", &opts), None);
    }

    #[test]
    fn ladder_is_stable_across_runs() {
        let opts = options(&[("1", "Alpha Beta"), ("2", "Alpha Bet"), ("3", "Alpha Beta")]);
        let first = match_option("alpha beta", &opts).unwrap();
        for _ in 0..10 {
            assert_eq!(match_option("alpha beta", &opts).unwrap(), first);
        }
    }

    #[test]
    fn radio_equivalence_classes() {
        assert!(radio_equivalent("Yes", "yes", ""));
        assert!(radio_equivalent("Yes", "1", ""));
        assert!(radio_equivalent("Yes", "", "Yes, I am authorized to work"));
        assert!(radio_equivalent("No", "", "No, I require sponsorship"));
        assert!(!radio_equivalent("Yes", "no", "No"));
        assert!(radio_equivalent("Male", "m", ""));
    }

    #[test]
    fn similarity_ratio_shape() {
        assert_eq!(similarity("abc", "abc"), 1.0);
        assert_eq!(similarity("", "abc"), 0.0);
        assert!(similarity("abcd", "abce") > 0.7);
    }
}
