//! Read-only candidate profile.
//!
//! The profile is a YAML document keyed by semantic paths
//! (`basic_info.first_name`, `files.resume.file_path`, ...). It is loaded
//! once at session start and immutable afterwards; normalization (phone,
//! salary, booleans, degree vocabulary) is applied on read so every consumer
//! sees form-ready values.

mod normalize;

use std::path::Path;

use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::warn;

pub use normalize::{
    format_phone, format_salary, normalize_boolean, normalize_degree, normalize_experience,
};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to read profile file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse profile document: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("profile document must be a mapping at the top level")]
    NotAMapping,
}

/// The candidate profile. Internally the raw document is kept verbatim so a
/// re-serialization round-trips every recognized field bit-identically.
#[derive(Clone, Debug)]
pub struct CandidateProfile {
    raw: Value,
}

impl CandidateProfile {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ProfileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ProfileError> {
        let raw: Value = serde_yaml::from_str(text)?;
        if !raw.is_object() {
            return Err(ProfileError::NotAMapping);
        }
        Ok(Self { raw })
    }

    /// An empty profile; every lookup resolves to `None` and the mapper
    /// skips the corresponding fields.
    pub fn empty() -> Self {
        Self {
            raw: Value::Object(Map::new()),
        }
    }

    /// Re-serialize the document. Recognized fields survive unchanged.
    pub fn to_yaml_string(&self) -> String {
        serde_yaml::to_string(&self.raw).unwrap_or_default()
    }

    /// Resolve a dotted semantic path to its normalized string value.
    ///
    /// Missing sections and fields resolve to `None`; scalar values are
    /// stringified; normalization depends on the path (phone formatting,
    /// salary grouping, Yes/No booleans, canonical degree names). The
    /// computed `basic_info.full_name` is synthesized from first + last
    /// when the document does not carry it.
    pub fn get(&self, path: &str) -> Option<String> {
        if path == "basic_info.full_name" {
            if let Some(explicit) = self.raw_string(path).filter(|s| !s.is_empty()) {
                return Some(explicit);
            }
            return self.computed_full_name();
        }

        let value = self.raw_string(path)?;
        if value.is_empty() {
            return None;
        }
        Some(self.normalize_for_path(path, value))
    }

    /// Raw (un-normalized) lookup, used by the round-trip tests and anywhere
    /// the original document spelling matters.
    pub fn raw_string(&self, path: &str) -> Option<String> {
        let mut current = &self.raw;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        match current {
            Value::String(s) => Some(s.clone()),
            Value::Bool(b) => Some(if *b { "Yes".into() } else { "No".into() }),
            Value::Number(n) => Some(n.to_string()),
            Value::Null => None,
            other => {
                warn!(path, "profile path resolves to a non-scalar value");
                Some(other.to_string())
            }
        }
    }

    fn computed_full_name(&self) -> Option<String> {
        let first = self.raw_string("basic_info.first_name").unwrap_or_default();
        let last = self.raw_string("basic_info.last_name").unwrap_or_default();
        let full = format!("{} {}", first, last).trim().to_string();
        if full.is_empty() {
            None
        } else {
            Some(full)
        }
    }

    fn normalize_for_path(&self, path: &str, value: String) -> String {
        match path {
            "basic_info.phone" => format_phone(&value),
            "preferences.salary_expectation" => format_salary(&value),
            "education.degree" => normalize_degree(&value),
            "legal_status.work_authorization"
            | "legal_status.require_sponsorship"
            | "work_info.willing_to_relocate"
            | "work_info.remote_work_preference" => normalize_boolean(&value),
            _ => value,
        }
    }

    /// Path of the resume document, if configured.
    pub fn resume_path(&self) -> Option<String> {
        self.get("files.resume.file_path")
    }

    /// Path of the cover letter document, if configured.
    pub fn cover_letter_path(&self) -> Option<String> {
        self.get("files.cover_letter.file_path")
    }

    /// The subset of the profile sent to the LLM alongside form elements.
    pub fn projection(&self) -> CandidateProjection {
        let get = |p: &str| self.get(p).unwrap_or_default();
        CandidateProjection {
            basic: json!({
                "first_name": get("basic_info.first_name"),
                "last_name": get("basic_info.last_name"),
                "full_name": get("basic_info.full_name"),
                "email": get("basic_info.email"),
                "phone": get("basic_info.phone"),
            }),
            location: json!({
                "country": get("location.country"),
                "state": get("location.state"),
                "city": get("location.city"),
                "zip_code": get("location.zip_code"),
            }),
            professional: json!({
                "linkedin": get("basic_info.linkedin"),
                "github": get("basic_info.github"),
                "portfolio": get("basic_info.portfolio"),
                "website": get("basic_info.website"),
            }),
            work: json!({
                "current_company": get("work_info.current_company"),
                "current_title": get("work_info.current_title"),
                "years_experience": get("work_info.years_experience"),
            }),
            education: json!({
                "university": get("education.university"),
                "degree": get("education.degree"),
                "major": get("education.major"),
                "graduation_year": get("education.graduation_year"),
            }),
            application: json!({
                "work_authorization": get("legal_status.work_authorization"),
                "require_sponsorship": get("legal_status.require_sponsorship"),
                "salary_expectation": get("preferences.salary_expectation"),
                "start_date": get("preferences.start_date"),
                "resume_path": get("files.resume.file_path"),
            }),
        }
    }
}

/// Candidate data projected into the shape the mapping prompt expects.
#[derive(Clone, Debug, Serialize)]
pub struct CandidateProjection {
    pub basic: Value,
    pub location: Value,
    pub professional: Value,
    pub work: Value,
    pub education: Value,
    pub application: Value,
}

impl CandidateProjection {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
basic_info:
  first_name: Ada
  last_name: Lovelace
  email: ada@example.com
  phone: "3105551234"
  linkedin: https://www.linkedin.com/in/ada
location:
  country: United States
  state: California
  city: San Francisco
education:
  university: Cambridge
  degree: bs
  major: Mathematics
  graduation_year: "2018"
work_info:
  current_company: Analytical Engines
  current_title: Engineer
  years_experience: "5"
  willing_to_relocate: true
legal_status:
  work_authorization: "yes"
  require_sponsorship: "no"
preferences:
  salary_expectation: "120000"
  start_date: Immediately
files:
  resume:
    file_path: /tmp/resume.pdf
"#;

    #[test]
    fn resolves_and_normalizes_known_paths() {
        let profile = CandidateProfile::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(
            profile.get("basic_info.phone").as_deref(),
            Some("(310) 555-1234")
        );
        assert_eq!(
            profile.get("preferences.salary_expectation").as_deref(),
            Some("120,000")
        );
        assert_eq!(
            profile.get("legal_status.work_authorization").as_deref(),
            Some("Yes")
        );
        assert_eq!(
            profile.get("education.degree").as_deref(),
            Some("Bachelor's Degree")
        );
        assert_eq!(
            profile.get("work_info.willing_to_relocate").as_deref(),
            Some("Yes")
        );
    }

    #[test]
    fn missing_fields_resolve_to_none() {
        let profile = CandidateProfile::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(profile.get("basic_info.github"), None);
        assert_eq!(profile.get("nonexistent.section"), None);
        assert_eq!(CandidateProfile::empty().get("basic_info.email"), None);
    }

    #[test]
    fn full_name_is_computed_when_absent() {
        let profile = CandidateProfile::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(
            profile.get("basic_info.full_name").as_deref(),
            Some("Ada Lovelace")
        );
    }

    #[test]
    fn round_trip_preserves_recognized_fields() {
        let profile = CandidateProfile::from_yaml_str(SAMPLE).unwrap();
        let reparsed = CandidateProfile::from_yaml_str(&profile.to_yaml_string()).unwrap();
        for path in [
            "basic_info.first_name",
            "basic_info.phone",
            "location.state",
            "education.degree",
            "preferences.salary_expectation",
            "files.resume.file_path",
        ] {
            assert_eq!(profile.raw_string(path), reparsed.raw_string(path), "{path}");
        }
    }

    #[test]
    fn projection_carries_normalized_values() {
        let profile = CandidateProfile::from_yaml_str(SAMPLE).unwrap();
        let projected = profile.projection().to_value();
        assert_eq!(projected["basic"]["phone"], "(310) 555-1234");
        assert_eq!(projected["application"]["resume_path"], "/tmp/resume.pdf");
    }
}
