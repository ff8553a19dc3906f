use std::collections::HashSet;

use itertools::Itertools;

use crate::configuration::CrawlerSettings;
use crate::domain::job::{dedupe_key, normalize_title, JobCandidate};
use crate::domain::page::{CareerPageSession, PatternTag};

/// Normalize, deduplicate and cap the classifier's output. URLs resolve
/// against the session's post-redirect URL; email-scheme URLs are dropped
/// (email-apply pages are summarized, never linked).
pub fn assemble(
    candidates: Vec<JobCandidate>,
    session: &CareerPageSession,
    settings: &CrawlerSettings,
) -> Vec<JobCandidate> {
    let base = &session.final_url;

    let mut normalized: Vec<JobCandidate> = vec![];
    for mut candidate in candidates {
        let resolved = match base.join(candidate.url.trim()) {
            Ok(resolved) => resolved,
            Err(e) => {
                log::warn!("Dropping candidate with unresolvable url {}: {}", candidate.url, e);
                continue;
            }
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }
        candidate.url = resolved.to_string();
        candidate.title = normalize_title(&candidate.title);
        if candidate.title.is_empty() {
            continue;
        }
        candidate.description = candidate.description.trim().to_string();
        normalized.push(candidate);
    }

    // A text-only candidate whose title also appears behind a real link is
    // the same position seen twice; keep the linked one.
    let linked_titles: HashSet<String> = normalized
        .iter()
        .filter(|c| c.source_pattern != PatternTag::SimpleText)
        .map(|c| c.title.to_lowercase())
        .collect();
    normalized.retain(|c| {
        c.source_pattern != PatternTag::SimpleText || !linked_titles.contains(&c.title.to_lowercase())
    });

    let mut assembled: Vec<JobCandidate> = normalized
        .into_iter()
        .unique_by(|candidate| dedupe_key(candidate, base))
        .collect();
    assembled.truncate(settings.max_candidates);
    assembled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> CareerPageSession {
        CareerPageSession::new("https://example.com/careers/").unwrap()
    }

    fn candidate(title: &str, url: &str, pattern: PatternTag) -> JobCandidate {
        JobCandidate {
            title: title.to_string(),
            url: url.to_string(),
            description: String::new(),
            source_pattern: pattern,
        }
    }

    #[test]
    fn relative_and_absolute_urls_to_the_same_posting_are_merged() {
        let candidates = vec![
            candidate("Senior Engineer", "/jobs/123", PatternTag::DirectListing),
            candidate(
                "Senior Engineer - Apply",
                "https://example.com/jobs/123",
                PatternTag::DirectListing,
            ),
        ];
        let assembled = assemble(candidates, &session(), &CrawlerSettings::default());
        assert_eq!(assembled.len(), 1);
        assert_eq!(assembled[0].url, "https://example.com/jobs/123");
    }

    #[test]
    fn email_scheme_urls_are_never_emitted() {
        let candidates = vec![
            candidate("Email your resume", "mailto:jobs@example.com", PatternTag::DirectListing),
            candidate("Senior Engineer", "/jobs/123", PatternTag::DirectListing),
        ];
        let assembled = assemble(candidates, &session(), &CrawlerSettings::default());
        assert_eq!(assembled.len(), 1);
        assert!(assembled.iter().all(|c| !c.url.starts_with("mailto:")));
    }

    #[test]
    fn titles_are_normalized_during_assembly() {
        let candidates = vec![candidate(
            "Apply for Senior Engineer - View",
            "/jobs/123",
            PatternTag::DirectListing,
        )];
        let assembled = assemble(candidates, &session(), &CrawlerSettings::default());
        assert_eq!(assembled[0].title, "Senior Engineer");
    }

    #[test]
    fn linked_candidates_shadow_text_only_twins() {
        let candidates = vec![
            candidate(
                "Senior Engineer",
                "https://example.com/careers/",
                PatternTag::SimpleText,
            ),
            candidate("Senior Engineer", "/jobs/123", PatternTag::DirectListing),
            candidate(
                "Office Manager",
                "https://example.com/careers/",
                PatternTag::SimpleText,
            ),
        ];
        let assembled = assemble(candidates, &session(), &CrawlerSettings::default());
        assert_eq!(assembled.len(), 2);
        let senior = assembled.iter().find(|c| c.title == "Senior Engineer").unwrap();
        assert_eq!(senior.url, "https://example.com/jobs/123");
    }

    #[test]
    fn output_is_capped() {
        let mut settings = CrawlerSettings::default();
        settings.max_candidates = 3;
        let candidates = (0..10)
            .map(|i| {
                candidate(
                    &format!("Engineer {}", i),
                    &format!("/jobs/{}", i),
                    PatternTag::DirectListing,
                )
            })
            .collect();
        let assembled = assemble(candidates, &session(), &settings);
        assert_eq!(assembled.len(), 3);
    }
}
