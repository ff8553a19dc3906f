use std::error::Error;

use async_openai::{
    config::OpenAIConfig,
    types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ResponseFormat},
    Client,
};
use serde::Deserialize;

use crate::domain::job::JobPosting;

pub struct OpenaiClient {
    client: Client<OpenAIConfig>,
}

#[derive(Deserialize)]
struct ExtractedJobs {
    #[serde(default)]
    jobs: Vec<ExtractedJob>,
}

#[derive(Deserialize)]
struct ExtractedJob {
    job_title: String,
    #[serde(default)]
    job_url: String,
    #[serde(default)]
    description: String,
}

impl Default for OpenaiClient {
    fn default() -> Self {
        OpenaiClient {
            client: Client::new(),
        }
    }
}

impl OpenaiClient {
    pub fn new(api_key: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        OpenaiClient {
            client: Client::with_config(config),
        }
    }

    /// Structural-extraction fallback: hand raw page text to the model and
    /// parse job records out of its JSON reply. Records without an http(s)
    /// URL are dropped.
    pub async fn extract_jobs_from_text(
        &self,
        company_name: &str,
        page_text: &str,
    ) -> Result<Vec<JobPosting>, Box<dyn Error>> {
        let prompt = format!(
            "You are analyzing the careers/jobs page of {company_name}.\n\
             Extract all job listings from the following content. For each job return:\n\
             - job_title: the position name\n\
             - job_url: link to apply or view details (if available)\n\
             - description: brief description, 2-3 sentences (if available)\n\
             Return a JSON object of the form {{\"jobs\": [...]}}.\n\
             If no jobs are found, return {{\"jobs\": []}}.\n\n\
             Page content:\n{page_text}"
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model("gpt-4o-mini")
            .response_format(ResponseFormat::JsonObject)
            .messages([ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()?
                .into()])
            .max_tokens(1500_u32)
            .build()?;

        let response = self.client.chat().create(request).await?;

        let first_choice = response
            .choices
            .first()
            .ok_or("No choices in Openai response")?
            .message
            .content
            .clone()
            .ok_or("No content")?;

        let parsed: ExtractedJobs = serde_json::from_str(strip_code_fence(&first_choice))?;

        Ok(parsed
            .jobs
            .into_iter()
            .filter(|job| job.job_title.len() > 3 && job.job_url.starts_with("http"))
            .map(|job| JobPosting {
                job_title: job.job_title,
                job_url: job.job_url,
                description: job.description,
            })
            .collect())
    }
}

/// Models occasionally wrap JSON replies in markdown fences.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

/// Length-cap page text before sending it to the model.
pub fn cap_text(text: &str, cap: usize) -> String {
    text.chars().take(cap).collect()
}
