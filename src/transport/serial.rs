// Serial command link
//
// A serial Bluetooth/RF modem forwards whatever the remote peer sends, one
// byte per command. Reads block, so the link runs on its own thread.

use std::io::{ErrorKind, Read};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::ingest::Ingestor;

pub const READ_TIMEOUT_MS: u64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum SerialLinkError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Open `port` and feed every received byte to the ingestor from a
/// dedicated thread
pub fn spawn(port: &str, baudrate: u32, ingest: Ingestor) -> Result<JoinHandle<()>, SerialLinkError> {
    let mut link = serialport::new(port, baudrate)
        .timeout(Duration::from_millis(READ_TIMEOUT_MS))
        .open()?;
    info!("Listening for command bytes on {} at {} baud", port, baudrate);

    let name = port.to_string();
    let handle = std::thread::Builder::new()
        .name("serial-link".into())
        .spawn(move || match read_commands(&mut link, &ingest) {
            Ok(()) => info!("Serial link {} closed", name),
            Err(e) => error!("Serial link {} failed: {}", name, e),
        })?;
    Ok(handle)
}

/// Read bytes until end of stream. Every byte is one command write; read
/// timeouts just mean the peer is quiet.
pub fn read_commands<R: Read + ?Sized>(reader: &mut R, ingest: &Ingestor) -> std::io::Result<()> {
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Ok(()),
            Ok(_) => {
                if let Err(e) = ingest.ingest(byte[0]) {
                    warn!("serial: rejected command byte: {}", e);
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {}
            Err(e) => return Err(e),
        }
    }
}
