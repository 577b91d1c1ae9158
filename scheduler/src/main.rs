use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use clap::Parser;

use g8s_scheduler::binder::ApiBinder;
use g8s_scheduler::cache::ClusterCache;
use g8s_scheduler::config::Config;
use g8s_scheduler::metrics::ArchimedesMetrics;
use g8s_scheduler::sched::Scheduler;

/// Per-call timeout for bind RPCs issued at statement commit.
const BIND_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::parse();
    if let Err(err) = config.check() {
        tracing::error!(%err, "Invalid configuration");
        std::process::exit(1);
    }
    let conf = match config.load_scheduler_conf() {
        Ok(conf) => conf,
        Err(err) => {
            tracing::error!(%err, "Cannot load scheduler configuration");
            std::process::exit(1);
        }
    };
    let metrics = match ArchimedesMetrics::new(&config.archimedes) {
        Ok(metrics) => metrics,
        Err(err) => {
            tracing::error!(%err, "Cannot initialize telemetry");
            std::process::exit(1);
        }
    };
    metrics.clone().start();

    let cache = ClusterCache::new(&config.scheduler_name, &config.default_queue);
    ClusterCache::run(cache.clone(), &config.master);

    tokio::spawn(serve_http(normalize_addr(&config.healthz_bind_address))?);
    tokio::spawn(serve_http(normalize_addr(&config.listen_address))?);

    let binder = Arc::new(ApiBinder::new(&config.master, BIND_TIMEOUT));
    let scheduler = Scheduler::new(cache, config, conf, metrics, binder);
    scheduler.run().await;
    Ok(())
}

/// `":8080"`-style addresses bind on all interfaces.
fn normalize_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}

fn serve_http(addr: String) -> std::io::Result<actix_web::dev::Server> {
    tracing::info!(%addr, "Serving HTTP");
    let server = HttpServer::new(|| {
        App::new()
            .route("/", web::get().to(root_handler))
            .route("/healthz", web::get().to(healthz_handler))
    })
    .workers(1)
    .bind(addr)?
    .run();
    Ok(server)
}

async fn root_handler() -> impl Responder {
    HttpResponse::Ok().body("g8s-scheduler")
}

async fn healthz_handler() -> impl Responder {
    HttpResponse::Ok().body("ok")
}
