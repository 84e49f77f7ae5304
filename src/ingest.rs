// Command ingestion: raw bytes from a transport -> shared command state
//
// Called from transport tasks and threads. Never blocks and never touches
// the hardware.

use std::sync::Arc;

use tracing::{debug, info};

use crate::messages::{Command, InvalidCommand};
use crate::state::CommandState;

/// Cheap, cloneable handle given to every command source
#[derive(Debug, Clone)]
pub struct Ingestor {
    state: Arc<CommandState>,
}

impl Ingestor {
    pub fn new(state: Arc<CommandState>) -> Self {
        Self { state }
    }

    /// Validate a single command byte and apply it.
    /// On error the state is left untouched.
    pub fn ingest(&self, raw: u8) -> Result<Command, InvalidCommand> {
        let command = Command::try_from(raw)?;
        self.apply(command);
        Ok(command)
    }

    /// Validate a transport payload, which must carry exactly one byte
    pub fn ingest_payload(&self, payload: &[u8]) -> Result<Command, InvalidCommand> {
        match payload {
            [raw] => self.ingest(*raw),
            _ => Err(InvalidCommand::BadLength(payload.len())),
        }
    }

    pub fn apply(&self, command: Command) {
        match command.motion() {
            Some(motion) => {
                if self.state.set_motion(motion) {
                    info!("Motion command changed to {:?}", motion);
                } else {
                    debug!("Repeated motion command {:?}", motion);
                }
            }
            None => {
                let active = command == Command::ActivateTurbo;
                if active {
                    info!("Activating turbo");
                } else {
                    info!("Deactivating turbo");
                }
                self.state.set_turbo(active);
            }
        }
    }

    pub fn state(&self) -> &Arc<CommandState> {
        &self.state
    }
}
