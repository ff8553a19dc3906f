use std::time::Duration;

use tokio::time::timeout;
use url::Url;

use crate::configuration::CrawlerSettings;
use crate::domain::page::{CareerPageSession, PatternTag};
use crate::services::browser::{PageDriver, PageError};

pub const NO_JOBS_PHRASES: [&str; 9] = [
    "no current openings",
    "no open positions",
    "no open roles",
    "not hiring",
    "check back later",
    "no vacancies",
    "no positions available",
    "no openings at this time",
    "not currently hiring",
];

pub const EXPANSION_PHRASES: [&str; 12] = [
    "view all",
    "see all",
    "show all",
    "all openings",
    "all positions",
    "open positions",
    "open roles",
    "current openings",
    "view openings",
    "see openings",
    "load more",
    "show more",
];

const LOAD_MORE_PHRASES: [&str; 3] = ["load more", "show more", "view more"];

const JOB_CONTAINER_SELECTORS: [&str; 8] = [
    ".jobs-list",
    ".job-listings",
    ".job-listing",
    ".careers-list",
    ".open-positions",
    "[class*='job-']",
    "[data-jobs]",
    "ul.positions",
];

/// The interaction pipeline, in its fixed order. Later steps assume earlier
/// ones: redirect resolution must precede link resolution, and the no-jobs
/// check must short-circuit before any costly interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionStep {
    RedirectResolution,
    NoJobsDetection,
    IframeDelegation,
    DynamicContentWait,
    InfiniteScroll,
    TabTraversal,
    FilterDefaulting,
    FormInteraction,
    AccordionExpansion,
}

pub const PIPELINE: [InteractionStep; 9] = [
    InteractionStep::RedirectResolution,
    InteractionStep::NoJobsDetection,
    InteractionStep::IframeDelegation,
    InteractionStep::DynamicContentWait,
    InteractionStep::InfiniteScroll,
    InteractionStep::TabTraversal,
    InteractionStep::FilterDefaulting,
    InteractionStep::FormInteraction,
    InteractionStep::AccordionExpansion,
];

pub enum StepEffect {
    Continue,
    ShortCircuit,
}

impl InteractionStep {
    pub fn name(&self) -> &'static str {
        match self {
            InteractionStep::RedirectResolution => "redirect_resolution",
            InteractionStep::NoJobsDetection => "no_jobs_detection",
            InteractionStep::IframeDelegation => "iframe_delegation",
            InteractionStep::DynamicContentWait => "dynamic_content_wait",
            InteractionStep::InfiniteScroll => "infinite_scroll",
            InteractionStep::TabTraversal => "tab_traversal",
            InteractionStep::FilterDefaulting => "filter_defaulting",
            InteractionStep::FormInteraction => "form_interaction",
            InteractionStep::AccordionExpansion => "accordion_expansion",
        }
    }

    async fn apply<D: PageDriver>(
        &self,
        driver: &D,
        session: &mut CareerPageSession,
        settings: &CrawlerSettings,
    ) -> Result<StepEffect, PageError> {
        match self {
            InteractionStep::RedirectResolution => resolve_redirect(driver, session).await,
            InteractionStep::NoJobsDetection => detect_no_jobs_step(driver, session, settings).await,
            InteractionStep::IframeDelegation => delegate_iframes(driver, session, settings).await,
            InteractionStep::DynamicContentWait => {
                wait_for_job_containers(driver, session, settings).await
            }
            InteractionStep::InfiniteScroll => exhaust_scroll(driver, session, settings).await,
            InteractionStep::TabTraversal => traverse_tabs(driver, session, settings).await,
            InteractionStep::FilterDefaulting => default_filters(driver, session).await,
            InteractionStep::FormInteraction => tick_consent_boxes(driver, session).await,
            InteractionStep::AccordionExpansion => expand_accordions(driver, session, settings).await,
        }
    }
}

/// Apply every step in order. Steps are best-effort: an error or timeout in
/// one is logged and the pipeline moves on; only an explicit no-jobs signal
/// stops it.
pub async fn run_pipeline<D: PageDriver>(
    driver: &D,
    session: &mut CareerPageSession,
    settings: &CrawlerSettings,
) {
    let budget = Duration::from_secs(settings.step_timeout_secs);
    for step in PIPELINE {
        session.steps_run.push(step.name());
        match timeout(budget, step.apply(driver, session, settings)).await {
            Ok(Ok(StepEffect::ShortCircuit)) => {
                log::info!(
                    "Step {} short-circuited the crawl of {}",
                    step.name(),
                    session.requested_url
                );
                break;
            }
            Ok(Ok(StepEffect::Continue)) => {}
            Ok(Err(e)) => {
                log::error!("Step {} failed on {}: {}", step.name(), session.requested_url, e)
            }
            Err(_) => {
                log::error!("Step {} timed out on {}", step.name(), session.requested_url)
            }
        }
    }
}

async fn resolve_redirect<D: PageDriver>(
    driver: &D,
    session: &mut CareerPageSession,
) -> Result<StepEffect, PageError> {
    let current = driver.current_url().await?;
    if current.trim_end_matches('/') != session.requested_url.trim_end_matches('/') {
        match Url::parse(&current) {
            Ok(parsed) => {
                log::info!("{} redirected to {}", session.requested_url, parsed);
                session.final_url = parsed;
                session.tag(PatternTag::Redirected);
            }
            Err(e) => log::warn!("Could not parse post-navigation url {}: {}", current, e),
        }
    }
    Ok(StepEffect::Continue)
}

pub fn detect_no_jobs(text: &str, extra_phrases: &[String]) -> bool {
    let lower = text.to_lowercase();
    NO_JOBS_PHRASES.iter().any(|phrase| lower.contains(phrase))
        || extra_phrases
            .iter()
            .any(|phrase| lower.contains(phrase.to_lowercase().as_str()))
}

async fn detect_no_jobs_step<D: PageDriver>(
    driver: &D,
    session: &mut CareerPageSession,
    settings: &CrawlerSettings,
) -> Result<StepEffect, PageError> {
    let text = driver.visible_text().await?;
    if detect_no_jobs(&text, &settings.extra_no_jobs_phrases) {
        session.no_jobs_detected = true;
        session.tag(PatternTag::NoJobs);
        return Ok(StepEffect::ShortCircuit);
    }
    Ok(StepEffect::Continue)
}

/// Many small companies embed a third-party board in an iframe and host no
/// native job content, so iframe documents are harvested before anything
/// else touches the page.
async fn delegate_iframes<D: PageDriver>(
    driver: &D,
    session: &mut CareerPageSession,
    settings: &CrawlerSettings,
) -> Result<StepEffect, PageError> {
    let count = driver.iframe_count().await?;
    if count == 0 {
        return Ok(StepEffect::Continue);
    }
    session.tag(PatternTag::Iframe);
    for index in 0..count.min(settings.max_iframes) {
        if !driver.enter_iframe(index).await? {
            break;
        }
        match driver.collect_anchors(PatternTag::Iframe).await {
            Ok(anchors) => {
                log::info!("Harvested {} anchors from iframe {}", anchors.len(), index);
                session.harvested.extend(anchors);
            }
            Err(e) => log::warn!("Could not read iframe {}: {}", index, e),
        }
        driver.leave_iframe().await?;
    }
    Ok(StepEffect::Continue)
}

async fn wait_for_job_containers<D: PageDriver>(
    driver: &D,
    session: &mut CareerPageSession,
    settings: &CrawlerSettings,
) -> Result<StepEffect, PageError> {
    // settle time for client-rendered single-page apps
    tokio::time::sleep(Duration::from_millis(settings.settle_millis)).await;
    let per_selector = Duration::from_millis(settings.selector_wait_millis);
    for css in JOB_CONTAINER_SELECTORS {
        let found = match timeout(per_selector, wait_for_selector(driver, css)).await {
            Ok(result) => result?,
            Err(_) => false,
        };
        if found {
            session.tag(PatternTag::DynamicContent);
            break;
        }
    }
    Ok(StepEffect::Continue)
}

async fn wait_for_selector<D: PageDriver>(driver: &D, css: &str) -> Result<bool, PageError> {
    loop {
        if driver.selector_present(css).await? {
            return Ok(true);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

async fn exhaust_scroll<D: PageDriver>(
    driver: &D,
    session: &mut CareerPageSession,
    settings: &CrawlerSettings,
) -> Result<StepEffect, PageError> {
    let mut last_height = driver.scroll_to_bottom().await?;
    for _ in 0..settings.max_scroll_iterations {
        if driver.click_visible_control(&LOAD_MORE_PHRASES).await? {
            session.tag(PatternTag::InfiniteScroll);
        }
        tokio::time::sleep(Duration::from_millis(settings.settle_millis)).await;
        let height = driver.scroll_to_bottom().await?;
        if height <= last_height {
            break;
        }
        session.tag(PatternTag::InfiniteScroll);
        last_height = height;
    }
    Ok(StepEffect::Continue)
}

async fn traverse_tabs<D: PageDriver>(
    driver: &D,
    session: &mut CareerPageSession,
    settings: &CrawlerSettings,
) -> Result<StepEffect, PageError> {
    let tabs = driver.tab_count().await?;
    if tabs < 2 {
        return Ok(StepEffect::Continue);
    }
    session.tag(PatternTag::Tabbed);
    for index in 0..tabs.min(settings.max_tabs) {
        match driver.activate_tab(index).await {
            Ok(true) => {
                tokio::time::sleep(Duration::from_millis(settings.settle_millis)).await;
                match driver.collect_anchors(PatternTag::Tabbed).await {
                    Ok(anchors) => session.harvested.extend(anchors),
                    Err(e) => log::warn!("Could not harvest tab {}: {}", index, e),
                }
            }
            Ok(false) => {}
            Err(e) => log::warn!("Could not activate tab {}: {}", index, e),
        }
    }
    Ok(StepEffect::Continue)
}

/// Default-filtered pages hide everything until a filter is broadened.
async fn default_filters<D: PageDriver>(
    driver: &D,
    session: &mut CareerPageSession,
) -> Result<StepEffect, PageError> {
    let selected = driver.select_all_filter_options().await?;
    if selected > 0 {
        log::info!("Defaulted {} filters to their broadest option", selected);
        session.tag(PatternTag::SearchFiltered);
    }
    Ok(StepEffect::Continue)
}

/// Consent checkboxes only; submitting unknown forms on third-party sites
/// is out of bounds.
async fn tick_consent_boxes<D: PageDriver>(
    driver: &D,
    session: &mut CareerPageSession,
) -> Result<StepEffect, PageError> {
    let checked = driver.check_visible_checkboxes().await?;
    if checked > 0 {
        session.tag(PatternTag::FormGated);
    }
    Ok(StepEffect::Continue)
}

async fn expand_accordions<D: PageDriver>(
    driver: &D,
    session: &mut CareerPageSession,
    settings: &CrawlerSettings,
) -> Result<StepEffect, PageError> {
    if driver.click_visible_control(&EXPANSION_PHRASES).await? {
        session.tag(PatternTag::Accordion);
        tokio::time::sleep(Duration::from_millis(settings.settle_millis)).await;
    }
    Ok(StepEffect::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::page::Anchor;
    use crate::services::browser::test_support::ScriptedDriver;

    fn fast_settings() -> CrawlerSettings {
        let mut settings = CrawlerSettings::default();
        settings.settle_millis = 1;
        settings.selector_wait_millis = 20;
        settings
    }

    #[test]
    fn no_jobs_lexicon_is_case_insensitive() {
        assert!(detect_no_jobs("Sorry, NO CURRENT OPENINGS right now.", &[]));
        assert!(detect_no_jobs("We are not hiring at the moment", &[]));
        assert!(!detect_no_jobs("12 open positions across 3 teams", &[]));
    }

    #[test]
    fn extra_no_jobs_phrases_are_honoured() {
        let extra = vec!["keine offenen stellen".to_string()];
        assert!(detect_no_jobs("Derzeit keine offenen Stellen.", &extra));
    }

    #[tokio::test]
    async fn no_jobs_page_short_circuits_before_any_interaction() {
        let driver = ScriptedDriver::new(
            "https://example.com/careers",
            "Thanks for your interest! We have no current openings, check back later.",
        );
        let mut session = CareerPageSession::new("https://example.com/careers").unwrap();

        run_pipeline(&driver, &mut session, &fast_settings()).await;

        assert!(session.no_jobs_detected);
        assert!(session.detected_patterns.contains(&PatternTag::NoJobs));
        assert_eq!(session.steps_run, vec!["redirect_resolution", "no_jobs_detection"]);
        assert!(!driver.called("scroll_to_bottom"));
        assert!(!driver.called("tab_count"));
        assert!(!driver.called("iframe_count"));
    }

    #[tokio::test]
    async fn pipeline_harvests_iframe_anchors_and_tags_patterns() {
        let mut driver = ScriptedDriver::new(
            "https://example.com/careers",
            "Open positions below. Engineering is growing fast.",
        );
        driver.iframe_anchors = vec![vec![Anchor {
            href: "https://boards.greenhouse.io/example/jobs/42".to_string(),
            text: "Senior Engineer".to_string(),
            pattern: PatternTag::DirectListing,
        }]];
        driver.heights = std::sync::Mutex::new(vec![1200, 1200]);
        let mut session = CareerPageSession::new("https://example.com/careers").unwrap();

        run_pipeline(&driver, &mut session, &fast_settings()).await;

        assert!(!session.no_jobs_detected);
        assert_eq!(session.harvested.len(), 1);
        assert_eq!(session.harvested[0].pattern, PatternTag::Iframe);
        assert!(session.detected_patterns.contains(&PatternTag::Iframe));
        assert!(session.detected_patterns.contains(&PatternTag::DynamicContent));
        assert_eq!(session.steps_run.len(), PIPELINE.len());
    }

    #[tokio::test]
    async fn redirects_update_the_effective_url() {
        let driver = ScriptedDriver::new(
            "https://jobs.example-ats.com/example",
            "Plenty of roles to browse here, engineering and sales alike.",
        );
        let mut session = CareerPageSession::new("https://example.com/careers").unwrap();

        run_pipeline(&driver, &mut session, &fast_settings()).await;

        assert_eq!(session.final_url.as_str(), "https://jobs.example-ats.com/example");
        assert!(session.detected_patterns.contains(&PatternTag::Redirected));
    }
}
