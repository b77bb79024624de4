use crate::components::google_calendar::report::{
    write_created, write_listing_header, write_upcoming,
};
use crate::components::google_calendar::{flow_for, CalendarClient};
use crate::config::Config;
use crate::error::{CalResult, Error};
use std::io::{self, Write};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn")),
        )
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Config(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load the application config
pub fn load_config() -> miette::Result<Config> {
    Config::load().map_err(|e| {
        tracing::error!("Failed to load configuration: {:?}", e);
        e.into()
    })
}

/// Cancel the token when the process receives Ctrl-C or SIGTERM
pub fn cancel_on_signal() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.cancel();
    });
    cancel
}

#[cfg(unix)]
async fn wait_for_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM, cancelling"),
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C, cancelling"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl-C, cancelling");
    }
}

/// Authorize, book the configured event if any, then list upcoming events.
///
/// A signal aborts the run at any point with `Error::Cancelled`.
pub async fn run(config: Config, cancel: CancellationToken) -> miette::Result<()> {
    tokio::select! {
        result = book_and_list(&config, cancel.clone()) => result?,
        _ = cancel.cancelled() => {
            info!("Run cancelled");
            return Err(Error::Cancelled.into());
        }
    }

    Ok(())
}

async fn book_and_list(config: &Config, cancel: CancellationToken) -> CalResult<()> {
    let flow = flow_for(config, cancel);
    let mut client = CalendarClient::connect(config, flow.as_ref()).await?;
    let mut stdout = io::stdout();

    if let Some(event) = config.booking_instance()? {
        if client.capability().can_write() {
            let created = client.create_event(&event).await?;
            write_created(&mut stdout, &created)?;
        } else {
            warn!(
                "Skipping booking of '{}': calendar access is read-only",
                event.template.summary
            );
        }
    }

    write_listing_header(&mut stdout)?;
    let upcoming = client.list_upcoming_events().await?;
    write_upcoming(&mut stdout, &upcoming)?;

    writeln!(stdout, "Done")?;
    Ok(())
}
