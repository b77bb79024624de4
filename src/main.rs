use gcal_sender::startup;
use tracing::info;

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize logging
    startup::init_logging()?;

    info!("Starting gcal-sender");

    // Load configuration
    let config = startup::load_config()?;

    // Ctrl-C aborts a pending authorization
    let cancel = startup::cancel_on_signal();

    startup::run(config, cancel).await
}
