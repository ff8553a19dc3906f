use std::collections::HashSet;

use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchMethod {
    Http,
    Headless,
    PaidApi,
}

impl FetchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchMethod::Http => "http",
            FetchMethod::Headless => "headless",
            FetchMethod::PaidApi => "paid_api",
        }
    }
}

/// Renderable content produced by one stage of the fetch chain. Only
/// constructed once the minimum-content threshold has been met.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub url: String,
    pub content: String,
    pub method: FetchMethod,
    pub byte_length: usize,
}

/// Structural patterns a careers page can exhibit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternTag {
    Redirected,
    NoJobs,
    Iframe,
    DynamicContent,
    InfiniteScroll,
    Tabbed,
    SearchFiltered,
    FormGated,
    Accordion,
    ExternalBoard,
    Aggregator,
    DocumentListing,
    SimpleText,
    DirectListing,
}

/// A DOM link plus the pattern context it was harvested under.
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub href: String,
    pub text: String,
    pub pattern: PatternTag,
}

/// State for a single crawl invocation. Created after a successful fetch,
/// discarded when the crawl returns; nothing survives across runs.
#[derive(Debug)]
pub struct CareerPageSession {
    pub requested_url: String,
    /// Post-redirect URL; relative links resolve against this, not the
    /// requested URL.
    pub final_url: Url,
    pub detected_patterns: HashSet<PatternTag>,
    pub no_jobs_detected: bool,
    pub steps_run: Vec<&'static str>,
    /// Anchors surfaced from iframe documents and tab panes, which may no
    /// longer be reachable in the top document by classification time.
    pub harvested: Vec<Anchor>,
}

impl CareerPageSession {
    pub fn new(requested_url: &str) -> Result<Self, url::ParseError> {
        let final_url = Url::parse(requested_url)?;
        Ok(CareerPageSession {
            requested_url: requested_url.to_string(),
            final_url,
            detected_patterns: HashSet::new(),
            no_jobs_detected: false,
            steps_run: vec![],
            harvested: vec![],
        })
    }

    pub fn tag(&mut self, pattern: PatternTag) {
        self.detected_patterns.insert(pattern);
    }
}
