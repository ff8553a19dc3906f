use std::sync::LazyLock;

use itertools::Itertools;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::configuration::CrawlerSettings;
use crate::domain::job::{dedupe_key, JobCandidate};
use crate::domain::page::{Anchor, PatternTag};

pub const JOB_PATH_PATTERNS: [&str; 16] = [
    "/job/",
    "/jobs/",
    "/career/",
    "/careers/",
    "/position/",
    "/positions/",
    "/opening/",
    "/openings/",
    "/vacancy/",
    "/vacancies/",
    "/role/",
    "/roles/",
    "/opportunity/",
    "/opportunities/",
    "/hiring/",
    "/apply/",
];

pub const JOB_KEYWORDS: [&str; 22] = [
    "engineer",
    "developer",
    "manager",
    "director",
    "analyst",
    "specialist",
    "coordinator",
    "lead",
    "senior",
    "junior",
    "associate",
    "head of",
    "designer",
    "architect",
    "consultant",
    "representative",
    "executive",
    "scientist",
    "researcher",
    "technician",
    "administrator",
    "officer",
];

pub const EXCLUSION_KEYWORDS: [&str; 19] = [
    "home",
    "about",
    "contact",
    "blog",
    "news",
    "all jobs",
    "view all",
    "search",
    "filter",
    "category",
    "department",
    "location",
    "apply now",
    "learn more",
    "read more",
    "sign up",
    "register",
    "login",
    "logout",
];

/// Hosted applicant-tracking systems. A link into one of these is a job
/// posting with high confidence, whatever its anchor text says.
pub const ATS_DOMAINS: [&str; 12] = [
    "greenhouse.io",
    "lever.co",
    "workdayjobs.com",
    "myworkdayjobs.com",
    "paycomonline.net",
    "icims.com",
    "ultipro.com",
    "bamboohr.com",
    "jobvite.com",
    "smartrecruiters.com",
    "taleo.net",
    "ashbyhq.com",
];

pub const DOCUMENT_EXTENSIONS: [&str; 3] = [".pdf", ".doc", ".docx"];

pub const OPEN_POSITIONS_HEADINGS: [&str; 6] = [
    "open positions",
    "current openings",
    "open roles",
    "available positions",
    "we're hiring",
    "join our team",
];

struct AggregatorRule {
    host: &'static str,
    card_selector: &'static str,
}

/// Aggregator sites have far more regular structure than company pages, so
/// each gets its own card selector.
const AGGREGATOR_RULES: [AggregatorRule; 3] = [
    AggregatorRule {
        host: "builtin.com",
        card_selector: "a[data-id='job-card-title'], h2 a[href*='/job/']",
    },
    AggregatorRule {
        host: "indeed.com",
        card_selector: "a.jcs-JobTitle, h2.jobTitle a",
    },
    AggregatorRule {
        host: "linkedin.com",
        card_selector: "a.base-card__full-link, a.job-card-list__title",
    },
];

const GENERIC_CARD_SELECTOR: &str = "a[href*='job']";

static TITLE_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9 ,./&()+#'-]{3,79}$").expect("title shape regex is valid")
});

pub struct PageContext<'a> {
    pub anchors: &'a [Anchor],
    pub page_text: &'a str,
    pub page_source: &'a str,
    pub base_url: &'a Url,
}

/// Produce job candidates from an interacted page. Four strategies in
/// priority order, merged with first-wins deduplication by resolved URL.
pub fn extract_candidates(page: &PageContext, settings: &CrawlerSettings) -> Vec<JobCandidate> {
    let mut candidates = scan_on_page_titles(page.page_text, page.base_url, settings);
    candidates.extend(extract_aggregator_cards(page.page_source, page.base_url, settings));
    candidates.extend(classify_anchors(page.anchors, page.base_url, settings));
    candidates
        .into_iter()
        .unique_by(|candidate| dedupe_key(candidate, page.base_url))
        .collect()
}

/// Small companies often list titles as plain text under an "Open positions"
/// heading with no per-job link; those candidates point at the careers page
/// itself.
fn scan_on_page_titles(
    page_text: &str,
    base_url: &Url,
    settings: &CrawlerSettings,
) -> Vec<JobCandidate> {
    let lines: Vec<&str> = page_text.lines().map(str::trim).collect();
    let heading_at = lines.iter().position(|line| {
        let lower = line.to_lowercase();
        OPEN_POSITIONS_HEADINGS.iter().any(|h| lower.contains(h))
    });
    let start = match heading_at {
        Some(index) => index + 1,
        None => return vec![],
    };

    let mut found = vec![];
    for line in lines.into_iter().skip(start).take(60) {
        if looks_like_job_title(line, settings) {
            found.push(JobCandidate {
                title: line.to_string(),
                url: base_url.to_string(),
                description: String::new(),
                source_pattern: PatternTag::SimpleText,
            });
        }
    }
    found
}

pub fn looks_like_job_title(line: &str, settings: &CrawlerSettings) -> bool {
    if !TITLE_SHAPE.is_match(line) {
        return false;
    }
    let lower = line.to_lowercase();
    if contains_exclusion(&lower, settings) {
        return false;
    }
    has_job_keyword(&lower, settings)
}

pub fn has_job_keyword(lower: &str, settings: &CrawlerSettings) -> bool {
    JOB_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
        || settings
            .extra_job_keywords
            .iter()
            .any(|keyword| lower.contains(keyword.to_lowercase().as_str()))
}

fn contains_exclusion(lower: &str, settings: &CrawlerSettings) -> bool {
    EXCLUSION_KEYWORDS
        .iter()
        .any(|keyword| contains_phrase(lower, keyword))
        || settings
            .extra_exclusion_keywords
            .iter()
            .any(|keyword| contains_phrase(lower, keyword.to_lowercase().as_str()))
}

/// Whole-word phrase match; a plain substring check would let "search" veto
/// "Research Coordinator" and "location" veto "Relocation Specialist".
fn contains_phrase(lower: &str, phrase: &str) -> bool {
    lower.match_indices(phrase).any(|(at, matched)| {
        let before_ok = at == 0
            || !lower.as_bytes()[at - 1].is_ascii_alphanumeric();
        let end = at + matched.len();
        let after_ok = end >= lower.len() || !lower.as_bytes()[end].is_ascii_alphanumeric();
        before_ok && after_ok
    })
}

fn extract_aggregator_cards(
    page_source: &str,
    base_url: &Url,
    settings: &CrawlerSettings,
) -> Vec<JobCandidate> {
    let host = match base_url.host_str() {
        Some(host) => host,
        None => return vec![],
    };
    let card_selector = match AGGREGATOR_RULES
        .iter()
        .find(|rule| host_matches(host, rule.host))
    {
        Some(rule) => rule.card_selector,
        None => {
            let extra = settings
                .extra_aggregator_hosts
                .iter()
                .any(|h| host_matches(host, h));
            if !extra {
                return vec![];
            }
            GENERIC_CARD_SELECTOR
        }
    };
    let selector = match Selector::parse(card_selector) {
        Ok(selector) => selector,
        Err(e) => {
            log::error!("Invalid aggregator selector '{}': {:?}", card_selector, e);
            return vec![];
        }
    };

    let document = Html::parse_document(page_source);
    let mut found = vec![];
    for card in document.select(&selector) {
        let href = match card.value().attr("href") {
            Some(href) => href,
            None => continue,
        };
        let resolved = match base_url.join(href) {
            Ok(resolved) => resolved,
            Err(_) => continue,
        };
        let title: String = card.text().collect::<String>().trim().to_string();
        if title.is_empty() {
            continue;
        }
        found.push(JobCandidate {
            title,
            url: resolved.to_string(),
            description: String::new(),
            source_pattern: PatternTag::Aggregator,
        });
    }
    found
}

fn classify_anchors(
    anchors: &[Anchor],
    base_url: &Url,
    settings: &CrawlerSettings,
) -> Vec<JobCandidate> {
    let mut found = vec![];
    for anchor in anchors {
        let href = anchor.href.trim();
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
        {
            continue;
        }
        let resolved = match base_url.join(href) {
            Ok(resolved) => resolved,
            Err(_) => continue,
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }

        let text = anchor.text.trim();
        let text_lower = text.to_lowercase();
        let href_lower = href.to_lowercase();
        let host = resolved.host_str().unwrap_or("");

        if is_ats_host(host, settings) {
            found.push(candidate_from_anchor(text, &resolved, PatternTag::ExternalBoard));
            continue;
        }

        if is_document_path(resolved.path()) {
            if has_job_keyword(&text_lower, settings) {
                found.push(candidate_from_anchor(text, &resolved, PatternTag::DocumentListing));
            }
            continue;
        }

        let has_path_pattern = JOB_PATH_PATTERNS.iter().any(|p| href_lower.contains(p));
        let has_identifier = last_segment_is_identifier(&href_lower);
        let has_keyword = has_job_keyword(&text_lower, settings);
        let excluded = text.len() < 50 && contains_exclusion(&text_lower, settings);

        if (has_path_pattern && has_identifier) || (has_keyword && !excluded && text.len() > 10) {
            found.push(candidate_from_anchor(text, &resolved, anchor.pattern));
        }
    }
    found
}

fn candidate_from_anchor(text: &str, url: &Url, pattern: PatternTag) -> JobCandidate {
    let description = if text.len() > 50 {
        text.chars().take(200).collect()
    } else {
        String::new()
    };
    JobCandidate {
        title: title_or_slug(text, url),
        url: url.to_string(),
        description,
        source_pattern: pattern,
    }
}

/// ATS links sometimes carry no anchor text at all; fall back to the URL
/// slug so the candidate still has a readable title.
fn title_or_slug(text: &str, url: &Url) -> String {
    let text = text.trim();
    if !text.is_empty() {
        return text.to_string();
    }
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.rev().find(|s| !s.is_empty()))
        .unwrap_or("");
    segment.replace(['-', '_'], " ").trim().to_string()
}

pub fn is_ats_host(host: &str, settings: &CrawlerSettings) -> bool {
    ATS_DOMAINS.iter().any(|domain| host_matches(host, domain))
        || settings
            .extra_ats_domains
            .iter()
            .any(|domain| host_matches(host, domain))
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{}", domain))
}

fn is_document_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    DOCUMENT_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// An individual posting usually has an id or slug as its last path segment.
fn last_segment_is_identifier(href: &str) -> bool {
    let segment = href
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("")
        .split(['?', '#'])
        .next()
        .unwrap_or("");
    segment.chars().any(|c| c.is_ascii_digit()) || segment.len() > 10
}
