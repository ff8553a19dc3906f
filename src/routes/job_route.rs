use std::sync::Arc;

use actix_web::{post, web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::configuration::Settings;
use crate::domain::job::JobPosting;
use crate::services::crawler::{crawl_many, CrawlOutcome, CrawlRequest};
use crate::services::fetcher::FetchError;
use crate::services::openai_client::{cap_text, OpenaiClient};
use crate::services::telemetry::TelemetrySender;

#[derive(Deserialize)]
pub struct JobDiscoveryBody {
    pub companies: Vec<CrawlRequest>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Ok,
    NoJobsDetected,
    NoneFound,
    FetchFailed,
}

#[derive(Serialize)]
pub struct CompanyJobsReport {
    pub company_name: String,
    pub careers_url: String,
    pub status: ReportStatus,
    pub jobs: Vec<JobPosting>,
}

#[post("")]
pub async fn discover_jobs(
    body: web::Json<JobDiscoveryBody>,
    settings: web::Data<Settings>,
    openai_client: web::Data<OpenaiClient>,
    telemetry: web::Data<TelemetrySender>,
) -> HttpResponse {
    let crawler_settings = Arc::new(settings.crawler.clone());
    let reports = crawl_many(
        body.into_inner().companies,
        crawler_settings,
        telemetry.get_ref().clone(),
    )
    .await;

    let mut out = Vec::with_capacity(reports.len());
    for report in reports {
        let (status, jobs) = match report.outcome {
            Ok(CrawlOutcome::Jobs { candidates, .. }) => (
                ReportStatus::Ok,
                candidates.into_iter().map(JobPosting::from).collect(),
            ),
            Ok(CrawlOutcome::NoJobsDetected) => (ReportStatus::NoJobsDetected, vec![]),
            Ok(CrawlOutcome::NoneFound { page_text }) => {
                ai_fallback(
                    &openai_client,
                    &report.request.company_name,
                    &page_text,
                    &settings,
                    ReportStatus::NoneFound,
                )
                .await
            }
            Err(FetchError::AllStagesFailed {
                partial: Some(partial),
                ..
            }) => {
                ai_fallback(
                    &openai_client,
                    &report.request.company_name,
                    &partial,
                    &settings,
                    ReportStatus::FetchFailed,
                )
                .await
            }
            Err(_) => (ReportStatus::FetchFailed, vec![]),
        };
        out.push(CompanyJobsReport {
            company_name: report.request.company_name,
            careers_url: report.request.careers_url,
            status,
            jobs,
        });
    }

    HttpResponse::Ok().json(out)
}

/// Structural classification came up empty; let the model read the raw text.
async fn ai_fallback(
    client: &OpenaiClient,
    company_name: &str,
    page_text: &str,
    settings: &Settings,
    empty_status: ReportStatus,
) -> (ReportStatus, Vec<JobPosting>) {
    if page_text.trim().is_empty() {
        return (empty_status, vec![]);
    }
    let capped = cap_text(page_text, settings.crawler.ai_text_cap);
    match client.extract_jobs_from_text(company_name, &capped).await {
        Ok(jobs) if !jobs.is_empty() => (ReportStatus::Ok, jobs),
        Ok(_) => (empty_status, vec![]),
        Err(e) => {
            log::error!("AI extraction fallback failed for {}: {}", company_name, e);
            (empty_status, vec![])
        }
    }
}
