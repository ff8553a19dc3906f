use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::page::{FetchMethod, PatternTag};

/// Coarse progress events for the logging sink. Emission is fire-and-forget;
/// a missing or dead sink never affects crawl outcome.
#[derive(Debug)]
pub enum TelemetryEvent {
    CrawlStarted {
        run_id: Uuid,
        company_name: String,
        careers_url: String,
    },
    FetchSucceeded {
        run_id: Uuid,
        method: FetchMethod,
        byte_length: usize,
    },
    FetchFailed {
        run_id: Uuid,
        careers_url: String,
    },
    PatternsDetected {
        run_id: Uuid,
        patterns: Vec<PatternTag>,
    },
    CandidatesAssembled {
        run_id: Uuid,
        count: usize,
    },
    CrawlFinished {
        run_id: Uuid,
        status: &'static str,
    },
}

#[derive(Clone)]
pub struct TelemetrySender {
    sender: mpsc::UnboundedSender<TelemetryEvent>,
}

impl TelemetrySender {
    pub fn new(sender: mpsc::UnboundedSender<TelemetryEvent>) -> Self {
        TelemetrySender { sender }
    }

    pub fn emit(&self, event: TelemetryEvent) {
        if self.sender.send(event).is_err() {
            log::debug!("Telemetry sink is gone, dropping event");
        }
    }
}

pub async fn telemetry_handler(mut receiver: mpsc::UnboundedReceiver<TelemetryEvent>) {
    log::info!("Started telemetry handler");

    while let Some(event) = receiver.recv().await {
        match event {
            TelemetryEvent::CrawlStarted {
                run_id,
                company_name,
                careers_url,
            } => log::info!("[{}] Crawling {} for {}", run_id, careers_url, company_name),
            TelemetryEvent::FetchSucceeded {
                run_id,
                method,
                byte_length,
            } => log::info!("[{}] Fetched via {} ({} bytes)", run_id, method.as_str(), byte_length),
            TelemetryEvent::FetchFailed { run_id, careers_url } => {
                log::warn!("[{}] All fetch stages failed for {}", run_id, careers_url)
            }
            TelemetryEvent::PatternsDetected { run_id, patterns } => {
                log::info!("[{}] Detected patterns: {:?}", run_id, patterns)
            }
            TelemetryEvent::CandidatesAssembled { run_id, count } => {
                log::info!("[{}] Assembled {} job candidates", run_id, count)
            }
            TelemetryEvent::CrawlFinished { run_id, status } => {
                log::info!("[{}] Crawl finished: {}", run_id, status)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emitting_into_a_dead_sink_is_harmless() {
        let (sender, receiver) = mpsc::unbounded_channel();
        drop(receiver);
        let telemetry = TelemetrySender::new(sender);
        telemetry.emit(TelemetryEvent::CandidatesAssembled {
            run_id: Uuid::new_v4(),
            count: 3,
        });
    }
}
