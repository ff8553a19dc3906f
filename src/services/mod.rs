pub mod assembler;
pub mod browser;
pub mod classifier;
pub mod crawler;
pub mod fetcher;
pub mod navigator;
pub mod openai_client;
pub mod telemetry;

pub use browser::*;
pub use crawler::*;
pub use fetcher::*;
pub use openai_client::*;
pub use telemetry::*;
