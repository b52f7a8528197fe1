//! Read-time value normalization.

use once_cell::sync::Lazy;
use regex::Regex;

static NON_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\d]").unwrap());

/// `(NXX) NXX-XXXX` for 10-digit numbers; 11 digits with a leading 1 drop
/// the country code. Anything else is returned untouched.
pub fn format_phone(phone: &str) -> String {
    let digits = NON_DIGITS.replace_all(phone, "");
    match digits.len() {
        10 => format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..]),
        11 if digits.starts_with('1') => {
            format!("({}) {}-{}", &digits[1..4], &digits[4..7], &digits[7..])
        }
        _ => phone.to_string(),
    }
}

/// Grouped digits with thousands separators: `"120000"` becomes `"120,000"`.
pub fn format_salary(salary: &str) -> String {
    let digits = NON_DIGITS.replace_all(salary, "");
    if digits.is_empty() {
        return salary.to_string();
    }
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Canonical `Yes`/`No` for the spellings ATS forms and YAML authors use.
/// Unrecognized values pass through unchanged.
pub fn normalize_boolean(value: &str) -> String {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" | "1" | "true" | "authorized" | "eligible" => "Yes".to_string(),
        "no" | "n" | "0" | "false" | "not authorized" | "not eligible" => "No".to_string(),
        _ => value.to_string(),
    }
}

/// Canonical degree names for the usual abbreviations.
pub fn normalize_degree(value: &str) -> String {
    match value.trim().to_ascii_lowercase().as_str() {
        "bachelor" | "bachelors" | "bs" | "ba" | "b.s." | "b.a." => "Bachelor's Degree".to_string(),
        "master" | "masters" | "ms" | "ma" | "m.s." | "m.a." => "Master's Degree".to_string(),
        "phd" | "ph.d." | "doctorate" => "PhD".to_string(),
        _ => value.to_string(),
    }
}

/// Band a raw year count into the ranges experience dropdowns use.
pub fn normalize_experience(value: &str) -> String {
    match value.trim() {
        "0" => "0-1 years".to_string(),
        "1" => "1-2 years".to_string(),
        "2" => "2-3 years".to_string(),
        "3" | "4" => "3-5 years".to_string(),
        other => {
            if other
                .parse::<u32>()
                .map(|years| years >= 5)
                .unwrap_or(false)
            {
                "5+ years".to_string()
            } else {
                value.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_formats() {
        assert_eq!(format_phone("3105551234"), "(310) 555-1234");
        assert_eq!(format_phone("+1 310 555 1234"), "(310) 555-1234");
        assert_eq!(format_phone("555-1234"), "555-1234");
    }

    #[test]
    fn salary_grouping() {
        assert_eq!(format_salary("120000"), "120,000");
        assert_eq!(format_salary("$85,500"), "85,500");
        assert_eq!(format_salary("1000000"), "1,000,000");
        assert_eq!(format_salary("n/a"), "n/a");
    }

    #[test]
    fn booleans_canonicalize() {
        assert_eq!(normalize_boolean("yes"), "Yes");
        assert_eq!(normalize_boolean("FALSE"), "No");
        assert_eq!(normalize_boolean("maybe"), "maybe");
    }

    #[test]
    fn degrees_canonicalize() {
        assert_eq!(normalize_degree("bs"), "Bachelor's Degree");
        assert_eq!(normalize_degree("Masters"), "Master's Degree");
        assert_eq!(normalize_degree("PhD"), "PhD");
        assert_eq!(normalize_degree("Diploma"), "Diploma");
    }

    #[test]
    fn experience_bands() {
        assert_eq!(normalize_experience("0"), "0-1 years");
        assert_eq!(normalize_experience("4"), "3-5 years");
        assert_eq!(normalize_experience("12"), "5+ years");
    }
}
