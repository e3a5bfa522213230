//! `hotpot-agent` -- notification listener for the rental backend.
//!
//! Logs in (or reuses the stored session), loads the first page of
//! notifications, then follows the notification hub and logs every push
//! until interrupted.
//!
//! # Environment variables
//!
//! | Variable                      | Required | Default                     |
//! |-------------------------------|----------|-----------------------------|
//! | `HOTPOT_API_URL`              | no       | `http://localhost:5000/api` |
//! | `HOTPOT_HUB_URL`              | no       | `http://localhost:5000`     |
//! | `HOTPOT_SESSION_FILE`         | no       | `.hotpot/session.json`      |
//! | `HOTPOT_REQUEST_TIMEOUT_SECS` | no       | `30`                        |
//! | `HOTPOT_EMAIL`                | no       | --                          |
//! | `HOTPOT_PASSWORD`             | no       | --                          |
//! | `HOTPOT_PAGE_SIZE`            | no       | `20`                        |

use anyhow::Context;
use hotpot_agent::config::AgentConfig;
use hotpot_agent::runner;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "hotpot_agent=info,hotpot_hub=info,hotpot_client=info,hotpot_notifications=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AgentConfig::from_env().context("invalid configuration")?;

    tracing::info!(
        api_url = %config.client.api_base_url,
        hub_url = %config.client.hub_base_url,
        session_file = %config.client.session_file.display(),
        "Starting hotpot-agent",
    );

    runner::run(config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    })
    .await?;

    Ok(())
}
