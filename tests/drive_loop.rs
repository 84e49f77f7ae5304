// End-to-end drive behaviour against the simulated board
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{sleep, Instant};

use rover_runtime::config::{BASE_DUTY, LOOP_TICK, MAX_DUTY, SETTLE_TIME};
use rover_runtime::ingest::Ingestor;
use rover_runtime::messages::Motion;
use rover_runtime::motor::{Direction, DutyPolicy, HwCall, HwError, SimHardware, Wheel, WheelActuator};
use rover_runtime::runtime::DriveLoop;
use rover_runtime::state::CommandState;

struct Rig {
    drive_loop: DriveLoop<SimHardware>,
    ingest: Ingestor,
    sim: SimHardware,
}

fn rig() -> Rig {
    let sim = SimHardware::recording(MAX_DUTY);
    let mut actuator = WheelActuator::new(sim.clone(), DutyPolicy::default());
    actuator.initialize().unwrap();
    sim.clear_calls();

    let state = Arc::new(CommandState::new());
    let ingest = Ingestor::new(Arc::clone(&state));
    let drive_loop = DriveLoop::new(state, actuator, LOOP_TICK, SETTLE_TIME);
    Rig {
        drive_loop,
        ingest,
        sim,
    }
}

fn duties(sim: &SimHardware) -> [u16; 4] {
    Wheel::ALL.map(|w| sim.duty(w))
}

#[tokio::test(start_paused = true)]
async fn test_forward_nudges_then_holds_base_duty() {
    let mut rig = rig();
    rig.ingest.ingest(1).unwrap();

    rig.drive_loop.step().await.unwrap();
    assert_eq!(duties(&rig.sim), [BASE_DUTY + 5; 4]);
    for wheel in Wheel::ALL {
        assert_eq!(rig.sim.pins(wheel), (true, false));
    }

    rig.drive_loop.step().await.unwrap();
    assert_eq!(duties(&rig.sim), [BASE_DUTY; 4]);
}

#[tokio::test(start_paused = true)]
async fn test_left_pattern() {
    let mut rig = rig();
    rig.ingest.ingest(3).unwrap();
    rig.drive_loop.step().await.unwrap();

    assert_eq!(rig.sim.duty(Wheel::FrontLeft), 225);
    assert_eq!(rig.sim.pins(Wheel::FrontLeft), (false, true));
    assert_eq!(rig.sim.duty(Wheel::FrontRight), 0);
    assert_eq!(rig.sim.duty(Wheel::BackLeft), 0);
    assert_eq!(rig.sim.duty(Wheel::BackRight), 225);
    assert_eq!(rig.sim.pins(Wheel::BackRight), (true, false));
}

#[tokio::test(start_paused = true)]
async fn test_turbo_forward_runs_at_max() {
    let mut rig = rig();
    rig.ingest.ingest(5).unwrap();
    rig.ingest.ingest(1).unwrap();
    rig.drive_loop.step().await.unwrap();
    assert_eq!(duties(&rig.sim), [MAX_DUTY; 4]);

    rig.drive_loop.step().await.unwrap();
    assert_eq!(duties(&rig.sim), [MAX_DUTY; 4]);
}

#[tokio::test(start_paused = true)]
async fn test_turbo_toggle_does_not_settle() {
    let mut rig = rig();
    rig.ingest.ingest(1).unwrap();
    rig.drive_loop.step().await.unwrap();
    rig.drive_loop.step().await.unwrap();
    assert_eq!(duties(&rig.sim), [BASE_DUTY; 4]);

    rig.ingest.ingest(5).unwrap();
    let start = Instant::now();
    rig.drive_loop.step().await.unwrap();
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(duties(&rig.sim), [MAX_DUTY; 4]);

    rig.ingest.ingest(6).unwrap();
    rig.drive_loop.step().await.unwrap();
    assert_eq!(duties(&rig.sim), [BASE_DUTY; 4]);
}

#[tokio::test(start_paused = true)]
async fn test_reversal_stops_every_wheel_before_new_direction() {
    let mut rig = rig();
    rig.ingest.ingest(1).unwrap();
    rig.drive_loop.step().await.unwrap();
    rig.sim.clear_calls();

    rig.ingest.ingest(2).unwrap();
    let start = Instant::now();
    rig.drive_loop.step().await.unwrap();
    assert!(start.elapsed() >= SETTLE_TIME);

    let calls = rig.sim.calls();
    let first_direction = calls
        .iter()
        .position(|c| matches!(c, HwCall::SetDirection(_, Direction::Backward)))
        .unwrap();
    for wheel in Wheel::ALL {
        let stopped = calls[..first_direction]
            .iter()
            .position(|c| *c == HwCall::SetDuty(wheel, 0))
            .unwrap();
        assert!(calls[stopped..first_direction].contains(&HwCall::CommitDuty(wheel)));
    }
    for wheel in Wheel::ALL {
        assert_eq!(rig.sim.pins(wheel), (false, true));
        assert_eq!(rig.sim.duty(wheel), 225);
        assert!(!rig.sim.both_high_seen(wheel));
    }
}

#[tokio::test(start_paused = true)]
async fn test_command_during_settle_is_driven_after_it() {
    let mut rig = rig();
    rig.ingest.ingest(1).unwrap();
    let ingest = rig.ingest.clone();

    let start = Instant::now();
    let (stepped, _) = tokio::join!(rig.drive_loop.step(), async {
        sleep(SETTLE_TIME / 2).await;
        ingest.ingest(2).unwrap();
    });
    stepped.unwrap();
    let elapsed = start.elapsed();
    assert!(elapsed >= SETTLE_TIME && elapsed < SETTLE_TIME * 2);
    for wheel in Wheel::ALL {
        assert_eq!(rig.sim.pins(wheel), (false, true));
        assert_eq!(rig.sim.duty(wheel), 225);
    }

    // The wheels were already stopped for the newer command, no second settle
    let start = Instant::now();
    rig.drive_loop.step().await.unwrap();
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert!(!rig.ingest.state().snapshot().changed);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_command_does_not_settle_again() {
    let mut rig = rig();
    rig.ingest.ingest(4).unwrap();
    rig.drive_loop.step().await.unwrap();

    rig.ingest.ingest(4).unwrap();
    let start = Instant::now();
    rig.drive_loop.step().await.unwrap();
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(rig.sim.duty(Wheel::FrontRight), BASE_DUTY);
    assert_eq!(rig.sim.duty(Wheel::BackLeft), BASE_DUTY);
}

#[tokio::test(start_paused = true)]
async fn test_idle_after_motion_stops_wheels() {
    let mut rig = rig();
    rig.ingest.ingest(1).unwrap();
    rig.drive_loop.step().await.unwrap();

    rig.ingest.ingest(0).unwrap();
    rig.drive_loop.step().await.unwrap();
    assert_eq!(duties(&rig.sim), [0; 4]);
    assert_eq!(rig.ingest.state().snapshot().motion(), Some(Motion::Idle));
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_wheels_on_shutdown() {
    let mut rig = rig();
    let (tx, rx) = oneshot::channel::<()>();
    let sim = rig.sim.clone();
    let ingest = rig.ingest.clone();

    let (result, _) = tokio::join!(
        rig.drive_loop.run(async {
            let _ = rx.await;
        }),
        async move {
            ingest.ingest(1).unwrap();
            sleep(SETTLE_TIME + LOOP_TICK * 5).await;
            assert_eq!(duties(&sim), [BASE_DUTY; 4]);
            tx.send(()).unwrap();
        }
    );
    result.unwrap();
    assert_eq!(duties(&rig.sim), [0; 4]);
}

#[tokio::test(start_paused = true)]
async fn test_hardware_fault_is_reported() {
    let mut rig = rig();
    rig.sim.inject_fault(Wheel::BackLeft);
    rig.ingest.ingest(1).unwrap();
    assert!(matches!(
        rig.drive_loop.step().await,
        Err(HwError::Fault {
            wheel: Wheel::BackLeft
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_fatal_fault_leaves_healthy_wheels_stopped() {
    let mut rig = rig();
    rig.ingest.ingest(1).unwrap();
    rig.drive_loop.step().await.unwrap();
    rig.drive_loop.step().await.unwrap();
    assert_eq!(duties(&rig.sim), [BASE_DUTY; 4]);

    rig.sim.inject_fault(Wheel::FrontLeft);
    assert!(rig.drive_loop.step().await.is_err());
    let sim = rig.sim.clone();
    drop(rig);

    assert_eq!(sim.duty(Wheel::FrontRight), 0);
    assert_eq!(sim.duty(Wheel::BackLeft), 0);
    assert_eq!(sim.duty(Wheel::BackRight), 0);
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_healthy_wheels_on_fault() {
    let mut rig = rig();
    let sim = rig.sim.clone();
    let ingest = rig.ingest.clone();

    let (result, _) = tokio::join!(
        rig.drive_loop.run(std::future::pending::<()>()),
        async move {
            ingest.ingest(2).unwrap();
            sleep(SETTLE_TIME + LOOP_TICK * 5).await;
            assert_eq!(duties(&sim), [BASE_DUTY; 4]);
            sim.inject_fault(Wheel::BackLeft);
        }
    );
    assert!(matches!(
        result,
        Err(HwError::Fault {
            wheel: Wheel::BackLeft
        })
    ));
    assert_eq!(rig.sim.duty(Wheel::FrontLeft), 0);
    assert_eq!(rig.sim.duty(Wheel::FrontRight), 0);
    assert_eq!(rig.sim.duty(Wheel::BackRight), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_bytes_leave_state_alone() {
    let mut rig = rig();
    rig.ingest.ingest(2).unwrap();
    rig.drive_loop.step().await.unwrap();

    assert!(rig.ingest.ingest(7).is_err());
    assert!(rig.ingest.ingest_payload(&[1, 2]).is_err());
    let start = Instant::now();
    rig.drive_loop.step().await.unwrap();
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(rig.sim.pins(Wheel::FrontLeft), (false, true));
}
