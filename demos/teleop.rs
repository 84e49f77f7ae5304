// Keyboard teleop: W/S/A/D move, space idle, T/G turbo on/off, Q quit
//
// Every key press publishes one command byte on the command topic. The rover
// keeps its last motion, so nothing is sent while no key is pressed.
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use rover_runtime::config::TOPIC_CMD;
use rover_runtime::messages::Command;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let topic = std::env::args().nth(1).unwrap_or_else(|| TOPIC_CMD.to_string());

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(topic.clone()).await?;

    info!("Publishing command bytes to: {}", topic);
    info!("Controls: WASD=move, SPACE=idle, T/G=turbo on/off, Q=quit");

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    // Leave the rover standing still
    publisher.put(vec![Command::Idle.as_byte()]).await?;
    result
}

fn key_command(code: KeyCode) -> Option<Command> {
    match code {
        KeyCode::Char('w') => Some(Command::MoveForward),
        KeyCode::Char('s') => Some(Command::MoveBackward),
        KeyCode::Char('a') => Some(Command::MoveLeft),
        KeyCode::Char('d') => Some(Command::MoveRight),
        KeyCode::Char(' ') => Some(Command::Idle),
        KeyCode::Char('t') => Some(Command::ActivateTurbo),
        KeyCode::Char('g') => Some(Command::DeactivateTurbo),
        _ => None,
    }
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut last: Option<Command> = None;

    loop {
        if !event::poll(Duration::from_millis(20))? {
            continue;
        }
        let Event::Key(KeyEvent { code, kind, .. }) = event::read()? else {
            continue;
        };
        if kind != KeyEventKind::Press {
            continue;
        }
        if matches!(code, KeyCode::Char('q') | KeyCode::Esc) {
            break;
        }

        if let Some(command) = key_command(code) {
            publisher.put(vec![command.as_byte()]).await?;
            if last != Some(command) {
                info!("Sent {:?}", command);
                last = Some(command);
            }
        }
    }

    Ok(())
}
