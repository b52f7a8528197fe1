//! Prompt templates with named placeholders.
//!
//! Every prompt the engine sends lives here so the schema constraints in
//! `schema.rs` and the wording that elicits them are authored side by side.

use serde_json::Value;

/// System prompt for page classification. The reply must match the
/// `repair_page_analysis` schema.
pub const PAGE_ANALYSIS_SYSTEM: &str = r#"You are a web page analyzer specializing in job application flows.
Analyze the given page content and return ONLY a valid JSON response with the following structure.
Do not include any markdown formatting, code blocks, or comments.
IMPORTANT: Return complete, valid JSON without ellipsis (...) or truncation.
{
    "page_type": "job_detail" | "job_detail_with_form" | "form_page" | "login_page" | "external_redirect" | "unknown",
    "confidence": 0.0-1.0,
    "form_count": number,
    "has_apply_button": boolean,
    "reasoning": "brief explanation",
    "cta_candidates": [
        {
            "text": "button text",
            "selector": "CSS selector",
            "confidence": 0.0-1.0,
            "element_type": "button" | "a" | "input",
            "priority_score": 1-10
        }
    ],
    "recommended_action": {
        "action_type": "fill_form" | "click_cta" | "login_required" | "wait_for_human" | "no_action",
        "confidence": 0.0-1.0,
        "reasoning": "brief explanation",
        "target_element": "CSS selector or null",
        "form_selector": "CSS selector or null",
        "priority": 1-10
    }
}

Page type classification rules:
- job_detail: Job posting with description, but NO application form on the same page (only navigation buttons like "Apply now" that link to other pages)
- job_detail_with_form: Job posting with the ACTUAL application form on the same page (input fields like name, email, resume upload)
- form_page: Standalone application form page (primarily form fields, minimal job description)
- login_page: Login or authentication required
- external_redirect: Page redirects to an external site
- unknown: Cannot determine page type

Only classify as "job_detail_with_form" if the page contains ACTUAL FORM FIELDS.
If the page only has "Apply" buttons that link elsewhere, classify as "job_detail".

Form counting rules:
- Count only actual HTML forms or form-like structures with input fields
- Do NOT count standalone buttons that are just navigation links

Action recommendation logic:
- If form_count > 0 AND the page contains job details: recommend "fill_form"
- If form_count = 0 AND there are good CTA candidates: recommend "click_cta"
- If login is required: recommend "login_required"
- If uncertain or low confidence: recommend "wait_for_human"
- If no clear action: recommend "no_action"

Priority scoring rules:
- Text containing "Apply": 10
- aria-label or data-action containing "apply": 9
- URL containing /apply or /candidate: 8
- Prominent button: 7
- Other relevant buttons: 1-6"#;

/// User message for page classification.
pub fn page_analysis_user(
    url: &str,
    title: &str,
    content: &str,
    buttons: &Value,
    forms: &Value,
) -> String {
    let forms_info = match forms.as_array() {
        Some(list) if !list.is_empty() => format!(
            "Found {} form(s) on this page:\n{}",
            list.len(),
            serde_json::to_string_pretty(forms).unwrap_or_default()
        ),
        _ => "No forms found on this page.".to_string(),
    };

    format!(
        "Analyze this page:\n\n\
         URL: {url}\n\
         Title: {title}\n\n\
         Content (truncated):\n{content}\n\n\
         Buttons found on page:\n{buttons}\n\n\
         Forms found on page:\n{forms_info}\n\n\
         Provide your analysis in the specified JSON format.\n\
         IMPORTANT: Base form_count on the actual forms found above, not on the presence of Apply buttons.",
        buttons = serde_json::to_string_pretty(buttons).unwrap_or_default(),
    )
}

/// System prompt for element-group → action mapping. The reply must satisfy
/// `actions_from_value`.
pub const FIELD_MAPPING_SYSTEM: &str = r##"You are an expert form field analyzer for job application systems like Greenhouse, Workday, and Lever.

Given DOM elements and candidate data, create action mappings for form filling.

Rules:
1. Identify the semantic meaning of each field (first_name, email, work_authorization, etc.)
2. Match with the appropriate candidate data
3. Determine the correct control type (text, select, radio, checkbox, file, custom-dropdown, date, textarea)
4. For custom dropdowns (React/Vue components), use "custom-dropdown"
5. For file uploads, provide the full file path

Return ONLY a JSON array of actions, no markdown:
[
  {
    "selector": "#field-id or [name='field-name']",
    "control": "text|email|tel|url|number|select|radio|checkbox|file|custom-dropdown|date|textarea",
    "value": "value to fill",
    "semantic": "field semantic meaning in snake_case",
    "confidence": 0.9
  }
]

Special mappings:
- "Are you authorized to work" -> work_authorization (Yes/No)
- "Upload Resume" -> file with the resume path
- Country/State dropdowns -> exact values from the candidate data
- Phone -> formatted exactly as provided in the candidate data

Focus on high-confidence matches only."##;

/// User message for element-group mapping.
pub fn field_mapping_user(group_name: &str, elements: &Value, candidate: &Value) -> String {
    format!(
        "Analyze these form elements and create filling actions:\n\n\
         Elements in group \"{group_name}\":\n{elements}\n\n\
         Candidate data:\n{candidate}\n\n\
         Generate the actions array. Return ONLY the JSON response.",
        elements = serde_json::to_string_pretty(elements).unwrap_or_default(),
        candidate = serde_json::to_string_pretty(candidate).unwrap_or_default(),
    )
}

/// System prompt for cover-letter generation.
pub const COVER_LETTER_SYSTEM: &str = r#"You are a professional cover letter writer.
Create a compelling, concise cover letter (150-200 words) that:
1. Shows enthusiasm for the specific role and company
2. Highlights relevant experience and skills
3. Maintains a professional tone
4. Avoids generic phrases

Return ONLY the cover letter text, no additional formatting or explanations."#;

/// User message for cover-letter generation.
pub fn cover_letter_user(job_title: &str, company: &str, candidate: &Value) -> String {
    format!(
        "Write a cover letter for:\n\n\
         Position: {job_title} at {company}\n\n\
         Candidate background:\n{candidate}",
        candidate = serde_json::to_string_pretty(candidate).unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_analysis_user_reports_missing_forms() {
        let message = page_analysis_user("https://x", "t", "content", &json!([]), &json!([]));
        assert!(message.contains("No forms found on this page."));
    }

    #[test]
    fn field_mapping_user_names_the_group() {
        let message = field_mapping_user("default_part1", &json!([]), &json!({}));
        assert!(message.contains("default_part1"));
    }
}
