//! Fault injection: misbehaving hardware and a slow link.
//!
//! The serial link has no framing or timeout, so faults on the link itself
//! (lost or corrupted bytes) are out of scope; TCP under turmoil delivers
//! every byte. What can go wrong is timing and the doorway sensor.

use std::time::Duration;

use latchkey_control::{ErrorKind, MotorCommand, MotorDirection};
use latchkey_core::{LinkState, Sender, SessionPhase};
use latchkey_harness::{OperatorScript, Scenario, ScenarioError, SensorBehavior};
use latchkey_proto::Opcode;

fn check(condition: bool, message: &str) -> Result<(), ScenarioError> {
    if condition { Ok(()) } else { Err(ScenarioError::violation(message)) }
}

#[test]
fn stuck_sensor_surfaces_as_hardware_stall() {
    let budget = 200;
    let world = Scenario::new()
        .with_script(OperatorScript::new().enroll("12345").open_door("12345"))
        .with_sensor(SensorBehavior::Stuck)
        .with_sensor_budget(budget)
        .oracle(Box::new(|world| {
            world.check_grammar()?;
            check(world.control().error == Some(ErrorKind::HardwareStall), "stall reported")?;
            check(
                world.position_of(Sender::Control, Opcode::Cleared.into()).is_none(),
                "cleared never sent",
            )?;
            check(world.motor().last() == Some(&MotorCommand::STOP), "motor left stopped")?;
            check(world.alarm().last() == Some(&false), "alarm left off")
        }))
        .run()
        .expect("stall scenario");

    // The first poll plus one per budgeted retry.
    assert_eq!(world.sensor_polls(), budget + 1);
    assert_eq!(world.control().phase, SessionPhase::DoorRequest);
}

#[test]
fn door_flow_survives_link_latency() {
    Scenario::new()
        .with_script(OperatorScript::new().enroll("12345").open_door("12345"))
        .with_latency(Duration::from_millis(40))
        .oracle(Box::new(|world| {
            check(world.check_grammar()? == LinkState::READY, "conversation completes")?;
            let forward = world.motor().iter().filter(|c| c.direction == MotorDirection::Forward);
            check(forward.count() == 1, "one door cycle")?;
            check(world.control().error.is_none(), "no control error")
        }))
        .run()
        .expect("latency scenario");
}

#[test]
fn slow_doorway_delays_but_completes() {
    Scenario::new()
        .with_script(OperatorScript::new().enroll("12345").open_door("12345"))
        .with_sensor(SensorBehavior::ClearAfter(2_000))
        .oracle(Box::new(|world| {
            check(world.check_grammar()? == LinkState::READY, "conversation completes")?;
            check(world.sensor_polls() == 2_001, "waited out the doorway")
        }))
        .run()
        .expect("slow doorway scenario");
}
