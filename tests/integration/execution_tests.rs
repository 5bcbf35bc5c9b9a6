//! Integration tests for job execution: drill import and G-code programs
//! driven through the execution sub-machine on mock axes.

use crate::mock_hw::MockMachine;

use solderstation::app::ports::{AxisId, MotionPort};
use solderstation::config::ExecutionConfig;
use solderstation::drill::{DrillImport, parse_drill};
use solderstation::error::ProgramError;
use solderstation::execution::{ExecSubState, ExecutionSource, ExecutionSubMachine, JobFault};
use solderstation::gcode::parser::MAX_PROGRAM_BYTES;

const TICK_MS: u64 = 20;

fn small_machine() -> ExecutionConfig {
    ExecutionConfig {
        safe_z: 400,
        soldering_z: 600,
        max_steps_per_tick: 100,
        ..ExecutionConfig::default()
    }
}

fn powered() -> MockMachine {
    let mut hw = MockMachine::new();
    hw.enable_all(true);
    hw
}

/// Run the job to completion, checking the Z discipline on every tick.
/// Returns the number of ticks spent at soldering height.
fn run_checked(
    job: &mut ExecutionSubMachine,
    hw: &mut MockMachine,
    config: &ExecutionConfig,
) -> Result<u32, JobFault> {
    let mut now = 0;
    let mut lowered_ticks = 0;
    for _ in 0..50_000 {
        let xy = (hw.axis_ref(AxisId::X).position, hw.axis_ref(AxisId::Y).position);
        let state = job.step(hw, now)?;
        let z = hw.axis_ref(AxisId::Z).position;
        let moved = xy != (hw.axis_ref(AxisId::X).position, hw.axis_ref(AxisId::Y).position);
        if moved {
            assert!(config.z_is_clear(z), "XY moved with Z at {z}");
        }
        if z == config.soldering_z {
            lowered_ticks += 1;
        }
        if state == ExecSubState::Complete {
            return Ok(lowered_ticks);
        }
        now += TICK_MS;
    }
    panic!("job did not complete");
}

#[test]
fn drill_file_becomes_a_finished_job() {
    let drill = "\
M48
METRIC
T1C0.8
T2C3.0
%
T1
X1.0Y1.0
X2.0Y1.0
X3.0Y1.0
T2
X10.0Y10.0
M30
";
    let config = small_machine();
    let import = DrillImport {
        scale: config,
        solder_duration_ms: 200,
        ..DrillImport::default()
    };
    let points = parse_drill(drill, &import);
    assert_eq!(points.len(), 3);

    let mut job = ExecutionSubMachine::new(config, TICK_MS as u32, ExecutionSource::points(points));
    let mut hw = powered();
    let lowered = run_checked(&mut job, &mut hw, &config).unwrap();
    assert_eq!(job.completed_count(), 3);
    assert!(lowered > 0);
    assert_eq!(hw.axis_ref(AxisId::Z).position, config.home_z);
    assert!(!hw.axis_ref(AxisId::Feed).enabled);
}

#[test]
fn program_skips_bad_lines_and_keeps_going() {
    let program = b"\
; header
G0 X1 Y1 F1200
G0 Z1
S15
G0 Xnope
G99 X2
G0 X2 Z1
S
G4 T1
M104 S300
G0 X0 Y0
";
    let config = small_machine();
    let mut job = ExecutionSubMachine::with_program(config, TICK_MS as u32, program).unwrap();
    let mut hw = powered();
    run_checked(&mut job, &mut hw, &config).unwrap();
    assert_eq!(job.completed_count(), 2);
}

#[test]
fn program_ending_lowered_raises_before_home() {
    let config = small_machine();
    let mut job =
        ExecutionSubMachine::with_program(config, TICK_MS as u32, b"G0 X1 Y1\nG0 Z1\n").unwrap();
    let mut hw = powered();
    let lowered = run_checked(&mut job, &mut hw, &config).unwrap();
    assert!(lowered > 0);
    assert_eq!(job.completed_count(), 0);
    assert!(config.z_is_clear(hw.axis_ref(AxisId::Z).position));
}

#[test]
fn oversized_programs_are_rejected_whole() {
    let big = vec![b';'; MAX_PROGRAM_BYTES + 1];
    assert!(matches!(
        ExecutionSource::program(&big),
        Err(ProgramError::TooLarge { .. })
    ));
    assert!(matches!(
        ExecutionSource::program(b""),
        Err(ProgramError::Empty)
    ));
}

#[test]
fn released_axis_stalls_the_job() {
    let config = small_machine();
    let points = vec![solderstation::execution::SolderPoint::new(300, 0, 0, true, 100)];
    let mut job = ExecutionSubMachine::with_points(config, TICK_MS as u32, points);
    let mut hw = MockMachine::new();
    // Drivers never enabled: nothing moves.
    let result = run_checked(&mut job, &mut hw, &config);
    assert_eq!(result, Err(JobFault::AxisStalled(AxisId::Z)));
}
