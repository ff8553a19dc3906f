use std::net::TcpListener;

use anyhow::Context;
use env_logger::Env;
use magnet::{
    configuration::get_configuration,
    services::{telemetry_handler, OpenaiClient, TelemetrySender},
    startup::run,
};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = get_configuration().expect("Failed to read configuration.");

    let (telemetry_sender, telemetry_receiver) = mpsc::unbounded_channel();
    tokio::spawn(async move { telemetry_handler(telemetry_receiver).await });

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address).with_context(|| format!("Failed to bind {}", address))?;
    let openai_client = OpenaiClient::new(configuration.api_keys.openai.clone());
    let telemetry = TelemetrySender::new(telemetry_sender);

    run(listener, configuration, openai_client, telemetry)?.await?;
    Ok(())
}
