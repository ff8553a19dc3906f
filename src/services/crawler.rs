use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::configuration::CrawlerSettings;
use crate::domain::job::JobCandidate;
use crate::domain::page::{CareerPageSession, FetchResult, PatternTag};
use crate::services::assembler::assemble;
use crate::services::browser::{Browser, PageDriver};
use crate::services::classifier::{extract_candidates, PageContext};
use crate::services::fetcher::{fetch_page, FetchError};
use crate::services::navigator::run_pipeline;
use crate::services::telemetry::{TelemetryEvent, TelemetrySender};

#[derive(Debug, Clone, Deserialize)]
pub struct CrawlRequest {
    pub careers_url: String,
    pub company_name: String,
}

/// What a single crawl produced. "Found nothing" and "the company is not
/// hiring" are distinct from one another and from fetch failure (the `Err`
/// arm of the crawl), so callers can decide what to do next.
#[derive(Debug)]
pub enum CrawlOutcome {
    Jobs {
        candidates: Vec<JobCandidate>,
        /// Raw page text, handed back for the AI collaborator.
        page_text: String,
    },
    NoneFound {
        page_text: String,
    },
    NoJobsDetected,
}

impl CrawlOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            CrawlOutcome::Jobs { .. } => "ok",
            CrawlOutcome::NoneFound { .. } => "none_found",
            CrawlOutcome::NoJobsDetected => "no_jobs_detected",
        }
    }
}

pub struct CrawlReport {
    pub request: CrawlRequest,
    pub run_id: Uuid,
    pub outcome: Result<CrawlOutcome, FetchError>,
}

/// Crawl one careers page: fetch, drive a fresh browser session through the
/// interaction pipeline, classify the live DOM, assemble candidates.
pub async fn crawl_career_page(
    request: &CrawlRequest,
    settings: &CrawlerSettings,
    telemetry: &TelemetrySender,
    run_id: Uuid,
) -> Result<CrawlOutcome, FetchError> {
    telemetry.emit(TelemetryEvent::CrawlStarted {
        run_id,
        company_name: request.company_name.clone(),
        careers_url: request.careers_url.clone(),
    });

    let fetched = match fetch_page(&request.careers_url, settings).await {
        Ok(fetched) => fetched,
        Err(error) => {
            telemetry.emit(TelemetryEvent::FetchFailed {
                run_id,
                careers_url: request.careers_url.clone(),
            });
            return Err(error);
        }
    };
    telemetry.emit(TelemetryEvent::FetchSucceeded {
        run_id,
        method: fetched.method,
        byte_length: fetched.byte_length,
    });

    // The fetch worked, so a broken browser degrades the crawl to text-only
    // instead of failing the site.
    let browser = match Browser::open(settings).await {
        Ok(browser) => browser,
        Err(error) => {
            log::error!(
                "Could not open a browser session for {}: {}",
                request.careers_url,
                error
            );
            return Ok(CrawlOutcome::NoneFound {
                page_text: fetched.content,
            });
        }
    };

    let outcome = drive_session(&browser, &fetched, settings, telemetry, run_id).await;
    if let Err(error) = browser.quit().await {
        log::warn!(
            "Browser session for {} did not shut down cleanly: {}",
            request.careers_url,
            error
        );
    }
    Ok(outcome)
}

pub(crate) async fn drive_session<D: PageDriver>(
    driver: &D,
    fetched: &FetchResult,
    settings: &CrawlerSettings,
    telemetry: &TelemetrySender,
    run_id: Uuid,
) -> CrawlOutcome {
    let mut session = match CareerPageSession::new(&fetched.url) {
        Ok(session) => session,
        Err(e) => {
            log::error!("Unparseable careers url {}: {}", fetched.url, e);
            return CrawlOutcome::NoneFound {
                page_text: fetched.content.clone(),
            };
        }
    };

    if let Err(error) = driver.navigate(&fetched.url).await {
        log::error!("Navigation to {} failed: {}", fetched.url, error);
        return CrawlOutcome::NoneFound {
            page_text: fetched.content.clone(),
        };
    }

    run_pipeline(driver, &mut session, settings).await;
    telemetry.emit(TelemetryEvent::PatternsDetected {
        run_id,
        patterns: session.detected_patterns.iter().copied().collect(),
    });

    if session.no_jobs_detected {
        return CrawlOutcome::NoJobsDetected;
    }

    let page_text = match driver.visible_text().await {
        Ok(text) => text,
        Err(e) => {
            log::warn!("Could not read page text of {}: {}", fetched.url, e);
            fetched.content.clone()
        }
    };
    let page_source = match driver.page_source().await {
        Ok(source) => source,
        Err(e) => {
            log::warn!("Could not read page source of {}: {}", fetched.url, e);
            String::new()
        }
    };

    // Iframe and tab anchors come first so first-wins deduplication prefers
    // the delegated document over the host page.
    let mut anchors = session.harvested.clone();
    match driver.collect_anchors(PatternTag::DirectListing).await {
        Ok(main_anchors) => anchors.extend(main_anchors),
        Err(e) => log::warn!("Could not collect anchors from {}: {}", fetched.url, e),
    }

    let page = PageContext {
        anchors: &anchors,
        page_text: &page_text,
        page_source: &page_source,
        base_url: &session.final_url,
    };
    let candidates = extract_candidates(&page, settings);
    let assembled = assemble(candidates, &session, settings);
    telemetry.emit(TelemetryEvent::CandidatesAssembled {
        run_id,
        count: assembled.len(),
    });

    if assembled.is_empty() {
        CrawlOutcome::NoneFound { page_text }
    } else {
        CrawlOutcome::Jobs {
            candidates: assembled,
            page_text,
        }
    }
}

/// Fan a batch of companies out over a bounded worker pool. Each worker owns
/// one browser session for the duration of one company's crawl.
pub async fn crawl_many(
    requests: Vec<CrawlRequest>,
    settings: Arc<CrawlerSettings>,
    telemetry: TelemetrySender,
) -> Vec<CrawlReport> {
    let semaphore = Arc::new(Semaphore::new(settings.worker_count.max(1)));

    let mut handles = Vec::with_capacity(requests.len());
    for request in requests {
        let semaphore = semaphore.clone();
        let settings = settings.clone();
        let telemetry = telemetry.clone();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let run_id = Uuid::new_v4();
            let outcome = crawl_career_page(&request, &settings, &telemetry, run_id).await;
            let status = match &outcome {
                Ok(outcome) => outcome.status(),
                Err(_) => "fetch_failed",
            };
            telemetry.emit(TelemetryEvent::CrawlFinished { run_id, status });
            CrawlReport {
                request,
                run_id,
                outcome,
            }
        }));
    }

    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(report) => reports.push(report),
            Err(e) => log::error!("Crawl worker panicked: {}", e),
        }
    }
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::page::{Anchor, FetchMethod};
    use crate::services::browser::test_support::ScriptedDriver;
    use tokio::sync::mpsc;

    fn fast_settings() -> CrawlerSettings {
        let mut settings = CrawlerSettings::default();
        settings.settle_millis = 1;
        settings.selector_wait_millis = 20;
        settings
    }

    fn telemetry() -> TelemetrySender {
        let (sender, receiver) = mpsc::unbounded_channel();
        drop(receiver);
        TelemetrySender::new(sender)
    }

    fn fetched(url: &str) -> FetchResult {
        let content = "careers page content ".repeat(30);
        let byte_length = content.len();
        FetchResult {
            url: url.to_string(),
            content,
            method: FetchMethod::Http,
            byte_length,
        }
    }

    #[tokio::test]
    async fn not_hiring_pages_yield_the_no_jobs_outcome() {
        let driver = ScriptedDriver::new(
            "https://example.com/careers",
            "We currently have no open positions, check back later!",
        );
        let outcome = drive_session(
            &driver,
            &fetched("https://example.com/careers"),
            &fast_settings(),
            &telemetry(),
            Uuid::new_v4(),
        )
        .await;
        assert!(matches!(outcome, CrawlOutcome::NoJobsDetected));
    }

    #[tokio::test]
    async fn external_board_anchors_become_candidates() {
        let mut driver = ScriptedDriver::new(
            "https://example.com/careers",
            "Come build things with us. Roles below.",
        );
        driver.anchors = vec![
            Anchor {
                href: "https://boards.greenhouse.io/example/jobs/101".to_string(),
                text: "Senior Platform Engineer".to_string(),
                pattern: PatternTag::DirectListing,
            },
            Anchor {
                href: "https://boards.greenhouse.io/example/jobs/102".to_string(),
                text: "Data Scientist".to_string(),
                pattern: PatternTag::DirectListing,
            },
            Anchor {
                href: "mailto:jobs@example.com".to_string(),
                text: "Email your resume for this role".to_string(),
                pattern: PatternTag::DirectListing,
            },
        ];
        let outcome = drive_session(
            &driver,
            &fetched("https://example.com/careers"),
            &fast_settings(),
            &telemetry(),
            Uuid::new_v4(),
        )
        .await;
        match outcome {
            CrawlOutcome::Jobs { candidates, .. } => {
                assert_eq!(candidates.len(), 2);
                assert!(candidates.iter().all(|c| !c.url.starts_with("mailto:")));
                assert!(candidates
                    .iter()
                    .all(|c| c.source_pattern == PatternTag::ExternalBoard));
            }
            other => panic!("Expected jobs, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn pages_without_candidates_hand_back_raw_text_for_the_ai_fallback() {
        let driver = ScriptedDriver::new(
            "https://example.com/careers",
            "Our culture is great and our snacks are plentiful.",
        );
        let outcome = drive_session(
            &driver,
            &fetched("https://example.com/careers"),
            &fast_settings(),
            &telemetry(),
            Uuid::new_v4(),
        )
        .await;
        match outcome {
            CrawlOutcome::NoneFound { page_text } => {
                assert!(page_text.contains("snacks"));
            }
            other => panic!("Expected none-found, got {:?}", other),
        }
    }
}
