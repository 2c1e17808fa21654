use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use plategate::config::Settings;
use plategate::detection::PlaceholderDetector;
use plategate::gateway::Gateway;
use plategate::server;
use plategate::util::init_tracing;
use std::path::PathBuf;
use std::sync::Arc;
use std::{env, process};
use tracing::info;

const USAGE: &str = "usage: ./plategate [config file]";

fn get_args() -> Option<PathBuf> {
    let args: Vec<String> = env::args().collect();
    if args.len() > 2 {
        println!("{USAGE}");
        process::exit(1);
    }

    args.get(1).map(PathBuf::from)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config_file = get_args();
    let settings = Settings::load(config_file.as_deref()).context("failed to load settings")?;
    init_tracing(&settings.log);

    let gateway = web::Data::new(Gateway::from_settings(
        &settings,
        Arc::new(PlaceholderDetector),
    ));
    info!("starting plategate with {gateway:?}");
    info!(
        "serving static files from {}",
        settings.server.static_root.display()
    );

    let app_settings = settings.clone();
    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(server::cors())
            .wrap(middleware::Logger::default())
            .configure(server::configure_from_settings(
                &app_settings,
                gateway.clone(),
            ))
    });
    if settings.server.workers > 0 {
        server = server.workers(settings.server.workers);
    }

    let addr = settings.bind_addr();
    info!("listening on {}:{}", addr.0, addr.1);
    server
        .bind(addr)
        .context("failed to bind")?
        .run()
        .await?;

    Ok(())
}
