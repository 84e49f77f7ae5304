// Drive control loop and process wiring
//
// Every tick the loop reads the shared command state. A changed motion first
// stops all four wheels and holds them for the settle time, so an H-bridge is
// never reversed while driven. Then the motion pattern of the current motion
// is applied through the duty policy.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::{Cli, RoverConfig, STATUS_PERIOD};
use crate::ingest::Ingestor;
use crate::messages::Motion;
use crate::motor::{wheel_states, HwError, SimHardware, SysfsHardware, WheelActuator, WheelHardware};
use crate::state::CommandState;
use crate::transport::{serial, zenoh_link};

pub struct DriveLoop<H: WheelHardware> {
    state: Arc<CommandState>,
    actuator: WheelActuator<H>,
    tick: Duration,
    settle: Duration,
    applied: Option<(Motion, bool)>,
}

impl<H: WheelHardware> DriveLoop<H> {
    /// `actuator` must already be initialized
    pub fn new(
        state: Arc<CommandState>,
        actuator: WheelActuator<H>,
        tick: Duration,
        settle: Duration,
    ) -> Self {
        Self {
            state,
            actuator,
            tick,
            settle,
            applied: None,
        }
    }

    /// One loop iteration, without the tick wait
    pub async fn step(&mut self) -> Result<(), HwError> {
        let mut snapshot = self.state.snapshot();

        if snapshot.changed {
            info!("Motion change requested, stopping for {:?}", self.settle);
            self.actuator.stop_all()?;
            self.applied = None;
            sleep(self.settle).await;
            // Drive exactly what the settle covered; later writes raise the flag again
            snapshot = self.state.acknowledge_change();
        }

        let motion = match snapshot.motion() {
            Some(motion) => motion,
            None => {
                error!(
                    "Invalid motion code {} in command state, falling back to idle",
                    snapshot.raw_motion()
                );
                self.state.reset_invalid_motion();
                Motion::Idle
            }
        };

        if self.applied != Some((motion, snapshot.turbo)) {
            info!("Applying {:?} (turbo: {})", motion, snapshot.turbo);
            self.applied = Some((motion, snapshot.turbo));
        }
        self.actuator.apply(&wheel_states(motion), snapshot.turbo)
    }

    /// Run until `shutdown` resolves, then stop every wheel.
    ///
    /// A hardware error ends the loop immediately. Every wheel that still
    /// responds is stopped before the error is returned; the caller must not
    /// keep running.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) -> Result<(), HwError> {
        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            let stepped = tokio::select! {
                _ = &mut shutdown => None,
                result = async {
                    ticker.tick().await;
                    self.step().await
                } => Some(result),
            };
            match stepped {
                Some(Ok(())) => {}
                Some(Err(e)) => {
                    error!("Hardware error in drive loop: {}", e);
                    let _ = self.actuator.stop_all();
                    return Err(e);
                }
                None => break,
            }
        }

        info!("Shutdown requested, stopping all wheels");
        self.actuator.stop_all()
    }

    pub fn actuator(&self) -> &WheelActuator<H> {
        &self.actuator
    }
}

/// Spawn a transport task; its failure is logged but does not stop the wheels
fn spawn_endpoint(
    name: &'static str,
    endpoint: impl Future<Output = zenoh::Result<()>> + Send + 'static,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = endpoint.await {
            error!("Zenoh {} failed: {}", name, e);
        }
    })
}

/// Configure the wheels and run the drive loop until ctrl-c
async fn drive<H: WheelHardware>(
    hw: H,
    config: &RoverConfig,
    state: Arc<CommandState>,
) -> Result<(), HwError> {
    let mut actuator = WheelActuator::new(hw, config.duty_policy());
    actuator.initialize()?;

    let mut drive_loop = DriveLoop::new(state, actuator, config.tick(), config.settle());
    info!(
        "Drive loop started: {}ms tick, {}ms settle",
        config.tick_ms, config.settle_ms
    );
    drive_loop
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
}

pub async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = cli.load_config()?;
    let state = Arc::new(CommandState::new());
    let ingest = Ingestor::new(Arc::clone(&state));

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up command endpoints...");
    let endpoints = [
        spawn_endpoint(
            "command subscriber",
            zenoh_link::serve_commands(session.clone(), config.command_topic.clone(), ingest.clone()),
        ),
        spawn_endpoint(
            "command queryable",
            zenoh_link::serve_acked_commands(session.clone(), config.ack_topic.clone(), ingest.clone()),
        ),
        spawn_endpoint(
            "status publisher",
            zenoh_link::publish_status(
                session.clone(),
                config.status_topic.clone(),
                Arc::clone(&state),
                STATUS_PERIOD,
            ),
        ),
    ];

    if let Some(port) = &cli.serial {
        serial::spawn(port, cli.baud, ingest.clone())?;
    }

    let result = if cli.simulate {
        info!("Simulation mode: driving an in-memory board");
        drive(SimHardware::new(config.max_duty), &config, state).await
    } else {
        drive(SysfsHardware::from_config(&config), &config, state).await
    };

    for endpoint in endpoints {
        endpoint.abort();
    }
    session.close().await?;
    result?;
    info!("Runtime stopped");
    Ok(())
}
