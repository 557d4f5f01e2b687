use std::{process, sync::Arc};

use payslip::{
    application::{
        chat::ChatHistoryService,
        error::AppError,
        identity::IdentityService,
        report::{ProcessRenderer, RendererConfig, ReportRenderer, ReportService},
        repos::{ChatHistoryRepo, WorkersRepo},
    },
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        startup, telemetry,
    },
};
use sqlx::PgPool;
use tokio::sync::watch;
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
    startup::ensure_renderer_dir(&settings.renderer.working_dir).await?;

    let pool = connect_pool(&settings).await?;
    if settings.database.run_migrations {
        PostgresRepositories::run_migrations(&pool)
            .await
            .map_err(InfraError::from)?;
    } else {
        info!(target = "payslip::startup", "skipping migrations on startup");
    }

    let repositories = Arc::new(PostgresRepositories::new(pool));
    let state = build_http_state(repositories, &settings);

    serve_http(&settings, state).await
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let pool = connect_pool(&settings).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;
    info!(target = "payslip::migrate", "migrations applied");
    Ok(())
}

async fn connect_pool(settings: &config::Settings) -> Result<PgPool, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))
}

fn build_http_state(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> HttpState {
    let workers_repo: Arc<dyn WorkersRepo> = repositories.clone();
    let chat_repo: Arc<dyn ChatHistoryRepo> = repositories.clone();

    let renderer: Arc<dyn ReportRenderer> = Arc::new(ProcessRenderer::new(
        RendererConfig::from(&settings.renderer),
    ));
    let reports = ReportService::new(IdentityService::new(workers_repo), renderer);

    HttpState {
        reports: Arc::new(reports),
        chat: Arc::new(ChatHistoryService::new(chat_repo)),
        db: repositories,
    }
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "payslip::startup",
        addr = %settings.server.addr,
        "listening"
    );

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let server = async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async move {
                wait_for_shutdown_signal().await;
                let _ = stop_tx.send(true);
            })
            .await
    };

    let grace = settings.server.graceful_shutdown;
    let drain_deadline = async move {
        while !*stop_rx.borrow_and_update() {
            if stop_rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
            info!(target = "payslip::shutdown", "server stopped");
        }
        _ = drain_deadline => {
            warn!(
                target = "payslip::shutdown",
                grace_secs = grace.as_secs(),
                "graceful shutdown window elapsed with requests still in flight"
            );
        }
    }

    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            Err(err) => {
                warn!(
                    target = "payslip::shutdown",
                    error = %err,
                    "failed to register SIGTERM handler; waiting for Ctrl-C only"
                );
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!(target = "payslip::shutdown", "shutdown signal received");
}
