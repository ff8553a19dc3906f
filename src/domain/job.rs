use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::page::PatternTag;

/// One possible open position, prior to any semantic validation.
#[derive(Debug, Clone, PartialEq)]
pub struct JobCandidate {
    pub title: String,
    pub url: String,
    pub description: String,
    pub source_pattern: PatternTag,
}

/// Wire form of a discovered job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPosting {
    pub job_title: String,
    pub job_url: String,
    #[serde(default)]
    pub description: String,
}

impl From<JobCandidate> for JobPosting {
    fn from(candidate: JobCandidate) -> Self {
        JobPosting {
            job_title: candidate.title,
            job_url: candidate.url,
            description: candidate.description,
        }
    }
}

const TITLE_PREFIXES: [&str; 11] = [
    "apply for",
    "apply to",
    "apply:",
    "view",
    "see",
    "learn more about",
    "read more:",
    "open position:",
    "job:",
    "role:",
    "position:",
];

const TITLE_SUFFIXES: [&str; 4] = [" - apply", " - view", " - learn more", " - read more"];

/// Strip "Apply for"/"- View"-style decoration from a link text and
/// title-case single-case titles for presentation consistency.
pub fn normalize_title(raw: &str) -> String {
    let mut title = raw.trim().to_string();

    let lower = title.to_lowercase();
    for prefix in TITLE_PREFIXES {
        if !lower.starts_with(prefix) {
            continue;
        }
        if let Some(rest) = title.get(prefix.len()..) {
            // "View" must not eat into "Viewport Engineer"
            if prefix.ends_with(':') || rest.starts_with(char::is_whitespace) {
                title = rest.trim().to_string();
                break;
            }
        }
    }

    let lower = title.to_lowercase();
    for suffix in TITLE_SUFFIXES {
        if !lower.ends_with(suffix) {
            continue;
        }
        if let Some(kept) = title.get(..title.len() - suffix.len()) {
            title = kept.trim().to_string();
            break;
        }
    }

    if is_single_case(&title) {
        title = title_case(&title);
    }
    title
}

fn is_single_case(title: &str) -> bool {
    let letters: Vec<char> = title.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.is_empty() {
        return false;
    }
    letters.iter().all(|c| c.is_lowercase()) || letters.iter().all(|c| c.is_uppercase())
}

fn title_case(title: &str) -> String {
    title
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str().to_lowercase().as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Deduplication key for a candidate. Candidates that point at the careers
/// page itself (text-only listings) are keyed by URL plus title, so several
/// link-less positions on one page survive URL-level deduplication.
pub fn dedupe_key(candidate: &JobCandidate, page_url: &Url) -> String {
    let url = candidate.url.trim_end_matches('/');
    if url == page_url.as_str().trim_end_matches('/') {
        format!("{}#{}", url, candidate.title.to_lowercase())
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_title_strips_prefix_and_suffix() {
        assert_eq!(normalize_title("Apply for Senior Engineer - View"), "Senior Engineer");
    }

    #[test]
    fn normalize_title_keeps_titles_starting_with_prefix_words() {
        assert_eq!(normalize_title("Viewport Engineer"), "Viewport Engineer");
    }

    #[test]
    fn normalize_title_title_cases_shouting_titles() {
        assert_eq!(normalize_title("SENIOR RUST ENGINEER"), "Senior Rust Engineer");
        assert_eq!(normalize_title("marketing manager"), "Marketing Manager");
    }

    #[test]
    fn normalize_title_leaves_mixed_case_alone() {
        assert_eq!(normalize_title("  Senior iOS Engineer "), "Senior iOS Engineer");
    }

    #[test]
    fn dedupe_key_distinguishes_text_only_candidates() {
        let page_url = Url::parse("https://example.com/careers/").unwrap();
        let a = JobCandidate {
            title: "Senior Engineer".to_string(),
            url: "https://example.com/careers/".to_string(),
            description: String::new(),
            source_pattern: PatternTag::SimpleText,
        };
        let mut b = a.clone();
        b.title = "Office Manager".to_string();
        assert_ne!(dedupe_key(&a, &page_url), dedupe_key(&b, &page_url));
    }

    #[test]
    fn dedupe_key_collapses_same_external_url() {
        let page_url = Url::parse("https://example.com/careers/").unwrap();
        let a = JobCandidate {
            title: "Senior Engineer".to_string(),
            url: "https://boards.greenhouse.io/example/jobs/123".to_string(),
            description: String::new(),
            source_pattern: PatternTag::ExternalBoard,
        };
        let mut b = a.clone();
        b.title = "Completely different text".to_string();
        assert_eq!(dedupe_key(&a, &page_url), dedupe_key(&b, &page_url));
    }
}
