//! s3mon Lambda entry point.
//!
//! Forwards every S3 notification the function receives to the Snowplow
//! collector named in the function's description. Any error fails the
//! invocation so the platform's retry and redrive policy applies.

use std::sync::Arc;

use anyhow::Context as _;
use aws_lambda_events::event::s3::S3Event;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use s3mon_core::{EmissionOutcome, ErrorCategory};
use s3mon_handler::{Config, Invocation, LambdaMetadata, NotificationHandler};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::load().context("s3mon configuration is invalid")?;
    init_tracing(&config.rust_log)?;

    info!(
        schema = %config.schema_uri,
        app_id = %config.app_id,
        namespace = %config.namespace,
        max_events_per_request = ?config.max_events_per_request,
        "Starting s3mon"
    );

    let interrupt = CancellationToken::new();
    tokio::spawn({
        let interrupt = interrupt.clone();
        async move {
            shutdown_signal().await;
            interrupt.cancel();
        }
    });

    let handler = NotificationHandler::new(&config, Arc::new(LambdaMetadata::new()))?
        .with_interrupt(interrupt);
    let handler = &handler;

    run(service_fn(move |event: LambdaEvent<S3Event>| async move {
        handle_event(handler, event).await
    }))
    .await
}

async fn handle_event(
    handler: &NotificationHandler,
    event: LambdaEvent<S3Event>,
) -> Result<EmissionOutcome, Error> {
    let (notification, context) = event.into_parts();
    let invocation = Invocation::from(&context);

    handler.handle(notification, invocation).await.map_err(|e| {
        error!(
            request_id = %context.request_id,
            category = %ErrorCategory::from(&e),
            fatal = e.is_fatal(),
            error = %e,
            "invocation failed"
        );
        Error::from(e)
    })
}

/// Waits for shutdown signal (CTRL+C or SIGTERM).
///
/// A handler that cannot be installed never fires; the other still can.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL+C signal, aborting in-flight emissions");
        },
        () = terminate => {
            info!("Received SIGTERM signal, aborting in-flight emissions");
        },
    }
}

/// Initializes tracing, preferring `RUST_LOG` over the configured filter.
///
/// Plain fmt output without ANSI colours so CloudWatch shows lines verbatim.
fn init_tracing(default_filter: &str) -> Result<(), Error> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .context("invalid log filter")?;

    let fmt_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .without_time();

    tracing_subscriber::registry().with(filter).with(fmt_layer).try_init()?;
    Ok(())
}
