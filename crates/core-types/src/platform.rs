//! ATS platform detection from the page URL.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Recognized ATS / job-board platforms. Used as the overlay key in the
/// learning store and for platform-specific tips.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Greenhouse,
    Workday,
    Lever,
    Rippling,
    Linkedin,
    Indeed,
    Glassdoor,
    Angellist,
    Unknown,
}

static PLATFORM_PATTERNS: Lazy<Vec<(Regex, Platform)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"greenhouse\.io").unwrap(),
            Platform::Greenhouse,
        ),
        (
            Regex::new(r"myworkdayjobs\.com|workday\.com|wd\d+\.myworkdayjobs\.com").unwrap(),
            Platform::Workday,
        ),
        (Regex::new(r"lever\.co").unwrap(), Platform::Lever),
        (
            Regex::new(r"ats\.rippling\.com|rippling\.com/jobs").unwrap(),
            Platform::Rippling,
        ),
        (
            Regex::new(r"linkedin\.com/jobs").unwrap(),
            Platform::Linkedin,
        ),
        (
            Regex::new(r"indeed\.com|indeed\.[a-z]{2,3}").unwrap(),
            Platform::Indeed,
        ),
        (Regex::new(r"glassdoor\.com").unwrap(), Platform::Glassdoor),
        (
            Regex::new(r"angel\.co|angellist\.com|wellfound\.com").unwrap(),
            Platform::Angellist,
        ),
    ]
});

impl Platform {
    /// Pure function of the URL against the recognized regex set.
    pub fn detect(url: &str) -> Self {
        let lowered = url.to_ascii_lowercase();
        for (pattern, platform) in PLATFORM_PATTERNS.iter() {
            if pattern.is_match(&lowered) {
                return *platform;
            }
        }
        Platform::Unknown
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Greenhouse => "greenhouse",
            Platform::Workday => "workday",
            Platform::Lever => "lever",
            Platform::Rippling => "rippling",
            Platform::Linkedin => "linkedin",
            Platform::Indeed => "indeed",
            Platform::Glassdoor => "glassdoor",
            Platform::Angellist => "angellist",
            Platform::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_major_ats_hosts() {
        assert_eq!(
            Platform::detect("https://boards.greenhouse.io/acme/jobs/123"),
            Platform::Greenhouse
        );
        assert_eq!(
            Platform::detect("https://acme.wd5.myworkdayjobs.com/en-US/careers"),
            Platform::Workday
        );
        assert_eq!(
            Platform::detect("https://jobs.lever.co/acme/abc"),
            Platform::Lever
        );
        assert_eq!(
            Platform::detect("https://ats.rippling.com/acme/jobs/1"),
            Platform::Rippling
        );
        assert_eq!(
            Platform::detect("https://wellfound.com/jobs/1"),
            Platform::Angellist
        );
    }

    #[test]
    fn unrecognized_hosts_are_unknown() {
        assert_eq!(
            Platform::detect("https://careers.example.com/apply"),
            Platform::Unknown
        );
    }

    #[test]
    fn detection_is_case_insensitive() {
        assert_eq!(
            Platform::detect("https://Boards.Greenhouse.IO/x"),
            Platform::Greenhouse
        );
    }
}
