use std::sync::Arc;

use actix_web::{middleware::NormalizePath, web, App, HttpServer};
use contact_relay::{
    background_task::BackgroundTasks,
    constants::mark_process_start,
    graceful_shutdown::shutdown_signal,
    mail::smtp::SmtpMailer,
    routes::configure_routes,
    settings::{AppConfig, LogFormat, ProcessEnv},
    AppState,
};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    mark_process_start();

    let config = match AppConfig::new() {
        Ok(cfg) => cfg,
        Err(e) => {
            init_tracing(LogFormat::Pretty);
            tracing::error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(config.log_format);
    tracing::info!("Loaded configuration: {:?}", config);

    let mailer = Arc::new(SmtpMailer::new(config.smtp_timeout()));
    let (state, worker) = AppState::build(config, mailer, Arc::new(ProcessEnv))?;
    let app_state = web::Data::new(state);

    let tasks = BackgroundTasks::spawn(&app_state, worker);

    let config = &app_state.config;
    let server_addr = format!("{}:{}", config.host, config.port);
    let max_body_bytes = config.max_body_bytes;

    tracing::info!(
        "🚀 Starting {} v{} on {}",
        config.name,
        env!("CARGO_PKG_VERSION"),
        server_addr
    );

    let data = app_state.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(NormalizePath::trim())
            .wrap(TracingLogger::default())
            .configure(|cfg| configure_routes(cfg, max_body_bytes))
    })
    .workers(config.worker_count)
    .bind(&server_addr)?
    .disable_signals()
    .run();

    let handle = server.handle();

    let result = tokio::select! {
        res = server => res.map_err(anyhow::Error::from),
        _ = shutdown_signal() => {
            handle.stop(true).await;
            Ok(())
        }
    };

    tasks.shutdown();
    result
}
