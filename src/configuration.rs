use serde_aux::field_attributes::deserialize_number_from_string;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub crawler: CrawlerSettings,
    pub api_keys: ApiKeySettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApiKeySettings {
    pub openai: String,
}

#[derive(serde::Deserialize, Clone)]
pub struct CrawlerSettings {
    pub webdriver_url: String,
    pub render_api_url: Option<String>,
    pub render_api_token: Option<String>,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_render_timeout_secs")]
    pub render_timeout_secs: u64,
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,
    #[serde(default = "default_selector_wait_millis")]
    pub selector_wait_millis: u64,
    #[serde(default = "default_settle_millis")]
    pub settle_millis: u64,
    #[serde(default = "default_min_content_bytes")]
    pub min_content_bytes: usize,
    #[serde(default = "default_max_scroll_iterations")]
    pub max_scroll_iterations: u32,
    #[serde(default = "default_max_tabs")]
    pub max_tabs: usize,
    #[serde(default = "default_max_iframes")]
    pub max_iframes: usize,
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_ai_text_cap")]
    pub ai_text_cap: usize,
    #[serde(default)]
    pub extra_ats_domains: Vec<String>,
    #[serde(default)]
    pub extra_aggregator_hosts: Vec<String>,
    #[serde(default)]
    pub extra_job_keywords: Vec<String>,
    #[serde(default)]
    pub extra_exclusion_keywords: Vec<String>,
    #[serde(default)]
    pub extra_no_jobs_phrases: Vec<String>,
}

impl Default for CrawlerSettings {
    fn default() -> Self {
        CrawlerSettings {
            webdriver_url: "http://localhost:9515".to_string(),
            render_api_url: None,
            render_api_token: None,
            http_timeout_secs: default_http_timeout_secs(),
            render_timeout_secs: default_render_timeout_secs(),
            step_timeout_secs: default_step_timeout_secs(),
            selector_wait_millis: default_selector_wait_millis(),
            settle_millis: default_settle_millis(),
            min_content_bytes: default_min_content_bytes(),
            max_scroll_iterations: default_max_scroll_iterations(),
            max_tabs: default_max_tabs(),
            max_iframes: default_max_iframes(),
            max_candidates: default_max_candidates(),
            worker_count: default_worker_count(),
            ai_text_cap: default_ai_text_cap(),
            extra_ats_domains: vec![],
            extra_aggregator_hosts: vec![],
            extra_job_keywords: vec![],
            extra_exclusion_keywords: vec![],
            extra_no_jobs_phrases: vec![],
        }
    }
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_render_timeout_secs() -> u64 {
    90
}

fn default_step_timeout_secs() -> u64 {
    20
}

fn default_selector_wait_millis() -> u64 {
    2000
}

fn default_settle_millis() -> u64 {
    750
}

fn default_min_content_bytes() -> usize {
    500
}

fn default_max_scroll_iterations() -> u32 {
    5
}

fn default_max_tabs() -> usize {
    10
}

fn default_max_iframes() -> usize {
    3
}

fn default_max_candidates() -> usize {
    50
}

fn default_worker_count() -> usize {
    5
}

fn default_ai_text_cap() -> usize {
    8000
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");

    let settings = config::Config::builder()
        .add_source(config::File::from(base_path.join("configuration.yaml")))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
