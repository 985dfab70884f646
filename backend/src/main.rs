use actix_cors::Cors;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{http::header, web, App, HttpServer};
use log::{info, warn};

use cardio_backend::{get_gateway, routes, ServerConfig};

fn build_cors(config: &ServerConfig) -> Cors {
    if config.cors_allowed_origins.is_empty() {
        return Cors::permissive();
    }

    config
        .cors_allowed_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["GET", "POST"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .format_module_path(false)
        .init();

    let config = ServerConfig::from_env();
    info!("Starting cardiac-risk prediction API");

    let gateway = get_gateway(&config.model_path);
    let warm = gateway.clone();
    if web::block(move || warm.is_ready()).await.unwrap_or(false) {
        info!("Model ready: {}", config.model_path.display());
    } else {
        warn!(
            "Model unavailable ({}); /predict will answer 503",
            config.model_path.display()
        );
    }
    let gateway = web::Data::from(gateway);

    let bind_address = config.bind_address();
    info!("Listening on http://{}", bind_address);
    info!("Workers: {}", config.workers);
    info!("Endpoints:");
    info!("   GET  /healthz     - liveness");
    info!("   GET  /readyz      - model readiness");
    info!("   GET  /model-info  - artifact description");
    info!("   POST /predict     - single or batch prediction");

    let workers = config.workers;
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(DefaultHeaders::new().add(("X-Content-Type-Options", "nosniff")))
            .wrap(build_cors(&config))
            .app_data(gateway.clone())
            .configure(routes::configure(config.json_limit))
            .default_service(web::route().to(routes::not_found))
    })
    .workers(workers)
    .bind(&bind_address)?
    .run()
    .await
}
