use anyhow::Context;
use clap::Parser;
use teeswap::config::{Cli, SessionConfig};
use teeswap::hotplug::{Session, Termination};
use teeswap::observability::init_subscriber;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let config = SessionConfig::from(Cli::parse());
    let session = Session::new(config.clone())
        .with_context(|| format!("failed to build a session for {}", config.uri))?;

    let termination = session.run().await;
    tracing::debug!(?termination, "session finished");
    if let Termination::StartFailed(err) = termination {
        return Err(err).with_context(|| format!("failed to start playing {}", config.uri));
    }
    Ok(())
}
