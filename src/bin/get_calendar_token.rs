use gcal_sender::components::google_calendar::{flow_for, TokenManager};
use gcal_sender::startup;
use tracing::info;

#[tokio::main]
async fn main() -> miette::Result<()> {
    startup::init_logging()?;

    // Load configuration
    let config = startup::load_config()?;
    let cancel = startup::cancel_on_signal();

    let token_manager = TokenManager::new(
        config.token_path.clone(),
        config.credentials_path.clone(),
        config.capability.scopes(),
    );

    // Always run the flow, replacing whatever token is stored
    let flow = flow_for(&config, cancel);
    let credential = token_manager.authorize(flow.as_ref()).await?;

    info!("Granted scopes: {}", credential.scopes.join(", "));
    println!(
        "Token successfully saved to {}!",
        token_manager.store().path().display()
    );

    Ok(())
}
