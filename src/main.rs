use std::{future::IntoFuture, process, sync::Arc};

use microblog::{
    application::error::AppError,
    config,
    infra::{
        backend::{self, Backend},
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let backend = Backend::init(&settings.storage).await?;
    let cache = backend::build_post_cache(&settings.cache)?;
    let microblog = backend.microblog(cache, settings.pagination);

    info!(
        target = "microblog::main",
        storage = backend.name(),
        default_page_size = settings.pagination.default_size,
        max_page_size = settings.pagination.max_size,
        "microblog core ready"
    );

    serve_http(&settings, HttpState { microblog, backend }).await
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    backend::migrate(&settings.storage).await?;
    Ok(())
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "microblog::main",
        addr = %settings.server.addr,
        "listening"
    );

    let stop = Arc::new(Notify::new());
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown({
            let stop = stop.clone();
            async move { stop.notified().await }
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            return result.map_err(|err| AppError::unexpected(format!("server error: {err}")));
        }
        () = shutdown_signal() => {}
    }

    // In-flight requests get the configured grace period, then the process exits.
    stop.notify_one();
    match tokio::time::timeout(settings.server.graceful_shutdown, server).await {
        Ok(result) => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?
        }
        Err(_) => warn!(
            target = "microblog::main",
            grace_seconds = settings.server.graceful_shutdown.as_secs(),
            "graceful shutdown timed out"
        ),
    }

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!(target = "microblog::main", "shutdown requested"),
        Err(err) => {
            warn!(
                target = "microblog::main",
                error = %err,
                "cannot listen for shutdown signal"
            );
            std::future::pending::<()>().await;
        }
    }
}
