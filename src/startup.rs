use std::net::TcpListener;

use actix_web::{
    dev::Server,
    middleware::Logger,
    web::{self, Data},
    App, HttpServer,
};

use crate::{
    configuration::Settings,
    routes::{default_route, job_route},
    services::{OpenaiClient, TelemetrySender},
};

pub fn run(
    listener: TcpListener,
    settings: Settings,
    openai_client: OpenaiClient,
    telemetry: TelemetrySender,
) -> Result<Server, std::io::Error> {
    let settings = Data::new(settings);
    let openai_client = Data::new(openai_client);
    let telemetry = Data::new(telemetry);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .service(default_route::health)
            .service(web::scope("/jobs").service(job_route::discover_jobs))
            .app_data(settings.clone())
            .app_data(openai_client.clone())
            .app_data(telemetry.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
