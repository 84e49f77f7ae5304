// Zenoh command endpoints and status echo
//
// A peer can either `put` the command byte on the command topic (no reply),
// or `get` the ack topic with the command byte as payload and receive "ok" or
// an error reply.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::ingest::Ingestor;
use crate::messages::{Command, InvalidCommand, RoverStatus};
use crate::state::CommandState;

/// Ingest one payload and log the outcome
pub fn handle_payload(
    ingest: &Ingestor,
    source: &str,
    payload: &[u8],
) -> Result<Command, InvalidCommand> {
    match ingest.ingest_payload(payload) {
        Ok(command) => {
            debug!("{}: accepted {:?}", source, command);
            Ok(command)
        }
        Err(e) => {
            warn!("{}: rejected command write: {}", source, e);
            Err(e)
        }
    }
}

/// Serve fire-and-forget command writes until the session closes
pub async fn serve_commands(
    session: zenoh::Session,
    key: String,
    ingest: Ingestor,
) -> zenoh::Result<()> {
    let subscriber = session.declare_subscriber(key.clone()).await?;
    info!("Subscribed to: {}", key);

    while let Ok(sample) = subscriber.recv_async().await {
        let payload = sample.payload().to_bytes();
        let _ = handle_payload(&ingest, &key, &payload);
    }
    Ok(())
}

/// Serve acknowledged command writes until the session closes
pub async fn serve_acked_commands(
    session: zenoh::Session,
    key: String,
    ingest: Ingestor,
) -> zenoh::Result<()> {
    let queryable = session.declare_queryable(key.clone()).await?;
    info!("Answering command queries on: {}", key);

    while let Ok(query) = queryable.recv_async().await {
        let payload = query
            .payload()
            .map(|p| p.to_bytes().into_owned())
            .unwrap_or_default();

        let reply = match handle_payload(&ingest, &key, &payload) {
            Ok(_) => query.reply(query.key_expr().clone(), "ok").await,
            Err(e) => query.reply_err(e.to_string()).await,
        };
        if let Err(e) = reply {
            warn!("Failed to answer command query: {}", e);
        }
    }
    Ok(())
}

/// Publish the status echo whenever it changes
pub async fn publish_status(
    session: zenoh::Session,
    key: String,
    state: Arc<CommandState>,
    period: Duration,
) -> zenoh::Result<()> {
    let publisher = session.declare_publisher(key.clone()).await?;
    info!("Publishing status to: {}", key);

    let mut tick = interval(period);
    let mut last: Option<RoverStatus> = None;
    loop {
        tick.tick().await;
        let status = RoverStatus::from(&state.snapshot());
        if last.as_ref() != Some(&status) {
            let status_json = serde_json::to_string(&status)?;
            publisher.put(status_json).await?;
            last = Some(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Motion;

    #[test]
    fn test_handle_payload_accepts_single_byte() {
        let ingest = Ingestor::new(Arc::new(CommandState::new()));
        assert_eq!(
            handle_payload(&ingest, "rover/cmd", &[2]),
            Ok(Command::MoveBackward)
        );
        assert_eq!(ingest.state().snapshot().motion(), Some(Motion::Backward));
    }

    #[test]
    fn test_handle_payload_rejects_multi_byte() {
        let ingest = Ingestor::new(Arc::new(CommandState::new()));
        assert_eq!(
            handle_payload(&ingest, "rover/cmd", b"1\n"),
            Err(InvalidCommand::BadLength(2))
        );
        assert_eq!(ingest.state().snapshot().motion(), Some(Motion::Idle));
    }
}
