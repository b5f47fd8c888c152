mod config;
mod handler;
mod method;
mod query;
mod report;
mod silly;

use crate::config::{Config, FileEnum, FindConfigError};
use crate::handler::{inspect, AppState, ArcState};
use crate::report::Sink;
use crate::silly::*;
use anyhow::{Context, Result};
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::{from_fn_with_state, Next},
    response::Response,
    Router,
};
use owo_colors::{OwoColorize, Stream::Stderr};
use std::{net::SocketAddr, path, process::ExitCode, str::FromStr, sync::Arc};
use tokio::{net::TcpListener, signal, time::Instant};
use tower::limit::ConcurrencyLimitLayer;
use tracing::level_filters::LevelFilter;
#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_PATH: &str = "req-inspect.log";

async fn logger(
    State(state): State<ArcState>,
    connect_info: ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let ip = if state.config.http.behind_proxy {
        get_ip(request.headers())
    } else {
        None
    }
    .unwrap_or_else(|| connect_info.ip().to_string());

    let path = request.uri().path().to_owned();
    let method = request.method().to_owned();

    let start = Instant::now();
    let response = next.run(request).await;
    let elapsed = start.elapsed();

    let status_code = response.status().as_u16();

    info!(
        "({}) {} {} {} ({:#?})",
        ip,
        status_code.if_supports_color(Stderr, |text| text
            .style(color_status_code(status_code).bold())),
        method.if_supports_color(Stderr, |text| text.bold()),
        path,
        elapsed
    );

    response
}

fn app(state: ArcState) -> Router {
    let app = Router::new()
        .fallback(inspect)
        .layer(from_fn_with_state(state.clone(), logger))
        .with_state(state.clone());

    if state.config.http.concurrency_limit != 0 {
        app.layer(ConcurrencyLimitLayer::new(state.config.http.concurrency_limit))
    } else {
        app
    }
}

async fn load_config() -> Result<Config> {
    match config::load().await {
        Ok((config, path)) => {
            eprintln!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        Err(error) => match error.downcast_ref::<FindConfigError>() {
            Some(FindConfigError::NoneFoundError) => {
                eprintln!("No configuration file found, using default configuration");
                Ok(Config::default())
            }
            _ => Err(error.context("Error loading configuration")),
        },
    }
}

/// The returned guard flushes the file log when dropped.
fn init_logging(config: &Config) -> Result<Option<WorkerGuard>> {
    let level = LevelFilter::from_str(&config.logging.level)
        .with_context(|| format!("invalid log level {:?}", config.logging.level))?;

    let file = match &config.logging.file {
        FileEnum::Boolean(true) => Some(DEFAULT_LOG_PATH),
        FileEnum::Boolean(false) => None,
        FileEnum::Path(value) => Some(value.as_str()),
    };

    let (file_layer, guard) = match file {
        Some(file) => {
            let file = path::Path::new(file);
            let directory = file
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .unwrap_or_else(|| path::Path::new("."));
            let file_name = file
                .file_name()
                .with_context(|| format!("log file path {} has no file name", file.display()))?;
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(level)
        .with(if config.logging.stderr {
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        } else {
            None
        })
        .with(file_layer)
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(guard)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Error while listening for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!("Error while listening for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutting down");
}

async fn run(config: Config) -> Result<()> {
    debug!("{:#?}", &config);

    let state = Arc::new(AppState {
        config: config.clone(),
        sink: Sink::stdout(),
    });

    let address = (config.http.host.as_str(), config.http.port);
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("binding to {}:{}", config.http.host, config.http.port))?;
    let local_addr = listener.local_addr()?;
    info!(
        "listening on http://{}:{}",
        local_addr.ip().bold(),
        local_addr.port().bold()
    );

    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = match load_config().await {
        Ok(config) => config,
        Err(error) => {
            eprintln!("{:#}", error);
            return ExitCode::FAILURE;
        }
    };

    let _guard = match init_logging(&config) {
        Ok(guard) => guard,
        Err(error) => {
            eprintln!("Error setting up logging: {:#}", error);
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{:#}", error);
            ExitCode::FAILURE
        }
    }
}
