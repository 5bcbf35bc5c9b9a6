//! Integration tests for the AppService → FSM → execution → ports pipeline.
//!
//! These run on the host (x86_64) and drive the full control loop tick by
//! tick against mock hardware and a manual clock.

use crate::mock_hw::{ManualClock, MockMachine, RecordingSink};

use solderstation::app::commands::AppCommand;
use solderstation::app::events::AppEvent;
use solderstation::app::ports::AxisId;
use solderstation::app::service::AppService;
use solderstation::config::SystemConfig;
use solderstation::diagnostics::FaultCause;
use solderstation::error::{Error, ProgramError, SensorFault};
use solderstation::events::{EVENT_QUEUE_DEPTH, Event};
use solderstation::execution::{ExecSubState, SolderPoint};
use solderstation::fsm::SystemState;
use solderstation::upload::ProgramUpload;

struct Harness {
    app: AppService<ManualClock>,
    hw: MockMachine,
    sink: RecordingSink,
    clock: ManualClock,
    tick_ms: u64,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(SystemConfig::default())
    }

    /// Started, InitDone consumed, sitting in Idle.
    fn with_config(config: SystemConfig) -> Self {
        let clock = ManualClock::new();
        let tick_ms = u64::from(config.tick_rate_ms);
        let mut app = AppService::new(config, clock.clone()).unwrap();
        let mut hw = MockMachine::new();
        let mut sink = RecordingSink::new();
        app.start(&mut hw, &mut sink);
        assert!(app.post_event(Event::InitDone));
        let mut h = Self {
            app,
            hw,
            sink,
            clock,
            tick_ms,
        };
        h.tick();
        assert_eq!(h.app.current_state(), SystemState::Idle);
        h
    }

    fn tick(&mut self) {
        self.clock.advance(self.tick_ms);
        self.app.tick(&mut self.hw, &mut self.sink);
        // Heater is never driven outside Heating / Executing.
        if !self.app.current_state().heater_allowed() {
            assert_eq!(self.hw.heater(), 0, "heater on in {}", self.app.current_state());
        }
    }

    fn post(&mut self, event: Event) {
        assert!(self.app.post_event(event), "queue refused {event}");
    }

    /// Tick until `state` is reached.  Panics after `max_ticks`.
    fn run_until(&mut self, state: SystemState, max_ticks: usize) {
        for _ in 0..max_ticks {
            if self.app.current_state() == state {
                return;
            }
            self.tick();
        }
        assert_eq!(self.app.current_state(), state, "did not reach {state}");
    }

    /// Idle → Calibration → Ready with a point job staged.
    fn stage_and_calibrate(&mut self, points: Vec<SolderPoint>) {
        self.app.stage_points(points).unwrap();
        self.post(Event::TaskSent);
        self.run_until(SystemState::Ready, 200);
    }

    /// Ready → Heating → Executing with the tip already at temperature.
    fn approve_and_heat(&mut self) {
        self.hw.temperature = Ok(self.app.config().target_temperature_c);
        self.post(Event::TaskApproved);
        self.run_until(SystemState::Executing, 500);
    }
}

fn two_points() -> Vec<SolderPoint> {
    vec![
        SolderPoint::new(800, 1_600, 18_000, true, 300),
        SolderPoint::new(1_600, 800, 18_000, true, 300),
    ]
}

// ── Happy path ────────────────────────────────────────────────

#[test]
fn point_job_runs_end_to_end() {
    let mut h = Harness::new();
    h.stage_and_calibrate(two_points());
    assert_eq!(h.hw.axis_ref(AxisId::Z).calibrations, 1);
    assert_eq!(h.hw.axis_ref(AxisId::X).calibrations, 1);
    assert_eq!(h.hw.axis_ref(AxisId::Y).calibrations, 1);

    h.approve_and_heat();
    h.run_until(SystemState::NormalExit, 5_000);
    assert_eq!(h.hw.heater(), 0);
    assert!(!h.hw.any_axis_enabled());

    // Tip cools.
    h.hw.temperature = Ok(35.0);
    h.run_until(SystemState::Idle, 10);

    let stats = h.app.get_statistics();
    assert_eq!(stats.task_completed_count, 1);
    assert_eq!(stats.error_count, 0);
    assert_eq!(stats.state(SystemState::Executing).enter_count, 1);
    assert!(h.sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::JobCompleted { total: 1 })));

    let path: Vec<_> = h.sink.transitions().into_iter().map(|(_, to)| to).collect();
    assert_eq!(
        path,
        [
            "Idle",
            "Calibration",
            "Ready",
            "Heating",
            "Executing",
            "NormalExit",
            "Idle"
        ]
    );

    // Machine back home.
    assert_eq!(h.hw.axis_ref(AxisId::X).position, 0);
    assert_eq!(h.hw.axis_ref(AxisId::Y).position, 0);
    assert_eq!(h.hw.axis_ref(AxisId::Z).position, 0);
}

#[test]
fn heater_is_driven_while_heating() {
    let mut h = Harness::new();
    h.stage_and_calibrate(two_points());
    h.hw.temperature = Ok(150.0);
    h.post(Event::TaskApproved);
    h.run_until(SystemState::Heating, 5);
    h.tick();
    assert!(h.hw.heater() > 0);
    assert!(h.app.heater_power() > 0);
}

#[test]
fn axis_steps_stay_bounded_per_tick() {
    let mut h = Harness::new();
    h.stage_and_calibrate(two_points());
    h.approve_and_heat();
    h.run_until(SystemState::NormalExit, 5_000);
    let max = h.app.config().execution.max_steps_per_tick;
    for id in AxisId::ALL {
        assert!(h.hw.axis_ref(id).max_burst <= max, "{} moved too far", id.name());
    }
}

#[test]
fn program_job_from_upload() {
    static UPLOAD: ProgramUpload = ProgramUpload::new();
    UPLOAD
        .store(b"; two joints\nG0 X10 Y20 F600\nG0 Z1\nS20\nG0 X12.5\nG0 Z1\nS\nM104 S300\n")
        .unwrap();

    let mut h = Harness::new();
    h.app.stage_from_upload(&UPLOAD).unwrap();
    h.post(Event::TaskSent);
    h.run_until(SystemState::Ready, 200);
    h.approve_and_heat();
    h.run_until(SystemState::NormalExit, 10_000);
    assert_eq!(h.app.telemetry().points_completed, 2);
    assert!(!h.hw.axis_ref(AxisId::Feed).enabled);
    // S20 then a bare S: 2.0 mm + 5.0 mm at 120 steps/mm.
    assert_eq!(h.hw.axis_ref(AxisId::Feed).position, 840);

    h.hw.temperature = Ok(30.0);
    h.run_until(SystemState::Idle, 10);
    assert!(h
        .sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::JobCompleted { total: 1 })));
    let stats = h.app.get_statistics();
    assert_eq!(stats.task_completed_count, 1);
    assert_eq!(stats.error_count, 0);
    assert_eq!(h.hw.axis_ref(AxisId::X).position, 0);
    assert_eq!(h.hw.axis_ref(AxisId::Y).position, 0);
    assert_eq!(h.hw.axis_ref(AxisId::Z).position, 0);
}

// ── Cancellation, pause, resume ───────────────────────────────

#[test]
fn cancel_during_execution_cools_down_without_counting() {
    let mut h = Harness::new();
    h.stage_and_calibrate(two_points());
    h.approve_and_heat();
    h.tick();
    h.post(Event::CancelTask);
    h.run_until(SystemState::NormalExit, 5);
    assert!(h.app.exec_state().is_none());

    h.hw.temperature = Ok(20.0);
    h.run_until(SystemState::Idle, 10);
    assert_eq!(h.app.get_statistics().task_completed_count, 0);
}

#[test]
fn cancel_in_ready_returns_to_idle_and_drops_the_job() {
    let mut h = Harness::new();
    h.stage_and_calibrate(two_points());
    h.post(Event::CancelTask);
    h.run_until(SystemState::Idle, 5);
    assert!(!h.app.has_staged_job());
}

#[test]
fn calibration_without_job_returns_to_idle() {
    let mut h = Harness::new();
    h.post(Event::RequestCalibration);
    h.run_until(SystemState::Ready, 200);
    h.run_until(SystemState::Idle, 5);
    assert_eq!(h.hw.axis_ref(AxisId::Z).calibrations, 1);
}

#[test]
fn pause_keeps_the_job_and_resume_finishes_it() {
    let mut h = Harness::new();
    h.stage_and_calibrate(two_points());
    h.approve_and_heat();
    for _ in 0..30 {
        h.tick();
    }
    let before = h.app.exec_state();
    assert!(before.is_some());

    h.post(Event::PauseRequest);
    h.run_until(SystemState::Paused, 5);
    for _ in 0..20 {
        h.tick();
    }
    assert_eq!(h.hw.heater(), 0);
    assert_eq!(h.app.exec_state(), before);

    h.post(Event::ContinueTask);
    h.run_until(SystemState::Heating, 5);
    h.run_until(SystemState::Executing, 500);
    h.run_until(SystemState::NormalExit, 5_000);

    h.hw.temperature = Ok(25.0);
    h.run_until(SystemState::Idle, 10);
    assert_eq!(h.app.get_statistics().task_completed_count, 1);
}

#[test]
fn pause_while_soldering_keeps_the_remaining_contact_time() {
    const SOLDER_MS: u64 = 2_000;
    let mut h = Harness::new();
    h.stage_and_calibrate(vec![SolderPoint::new(400, 400, 18_000, true, SOLDER_MS)]);
    h.approve_and_heat();
    for _ in 0..5_000 {
        if h.app.exec_state() == Some(ExecSubState::Soldering) {
            break;
        }
        h.tick();
    }
    assert_eq!(h.app.exec_state(), Some(ExecSubState::Soldering));
    h.tick();
    h.tick();

    h.post(Event::PauseRequest);
    h.run_until(SystemState::Paused, 5);
    for _ in 0..200 {
        h.tick();
    }

    h.post(Event::ContinueTask);
    h.run_until(SystemState::Executing, 500);
    let mut soldering_ticks = 0;
    while h.app.exec_state() == Some(ExecSubState::Soldering) {
        h.tick();
        soldering_ticks += 1;
        assert!(soldering_ticks < 1_000, "soldering never finished");
    }
    // At most a handful of ticks were spent before the pause.
    assert!(
        soldering_ticks * h.tick_ms >= SOLDER_MS - 5 * h.tick_ms,
        "only {soldering_ticks} ticks of contact after resume"
    );
    h.run_until(SystemState::NormalExit, 5_000);
    assert!(h
        .sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::JobCompleted { total: 1 })));
}

#[test]
fn exit_request_while_heating() {
    let mut h = Harness::new();
    h.stage_and_calibrate(two_points());
    h.hw.temperature = Ok(100.0);
    h.post(Event::TaskApproved);
    h.run_until(SystemState::Heating, 5);
    h.post(Event::ExitRequest);
    h.run_until(SystemState::NormalExit, 5);
    assert_eq!(h.hw.heater(), 0);
}

// ── Faults and reset ──────────────────────────────────────────

#[test]
fn missing_endpoint_is_a_calibration_error() {
    let mut h = Harness::new();
    h.hw.axis_mut(AxisId::X).no_endpoint = true;
    h.app.stage_points(two_points()).unwrap();
    h.post(Event::TaskSent);
    h.run_until(SystemState::CalibrationError, 20);

    let fault = h.app.last_fault().unwrap();
    assert_eq!(fault.cause, FaultCause::NoEndpoint(AxisId::X));
    assert_eq!(fault.state, SystemState::Calibration);
    assert!(h.app.is_in_error());
    assert!(!h.hw.any_axis_enabled());
    assert!(h.sink.faults() >= 1);
}

#[test]
fn heating_timeout_is_a_heating_error() {
    let mut config = SystemConfig::default();
    config.heating_timeout_ms = 2_000;
    let mut h = Harness::with_config(config);
    h.stage_and_calibrate(two_points());
    h.hw.temperature = Ok(80.0);
    h.post(Event::TaskApproved);
    h.run_until(SystemState::HeatingError, 200);
    assert_eq!(h.app.last_fault().unwrap().cause, FaultCause::HeatingTimeout);
    assert_eq!(h.hw.heater(), 0);
}

#[test]
fn over_temperature_while_heating() {
    let mut h = Harness::new();
    h.stage_and_calibrate(two_points());
    h.hw.temperature = Ok(500.0);
    h.post(Event::TaskApproved);
    h.run_until(SystemState::HeatingError, 5);
    assert_eq!(h.app.last_fault().unwrap().cause, FaultCause::OverTemperature);
}

#[test]
fn persistent_sensor_fault_locks_and_reset_recovers() {
    let mut h = Harness::new();
    h.stage_and_calibrate(two_points());
    h.approve_and_heat();
    h.hw.temperature = Err(SensorFault::OpenCircuit);
    h.run_until(SystemState::DataError, 5);
    h.run_until(SystemState::Locked, 5);

    let stats = h.app.get_statistics();
    assert_eq!(stats.error_count, 2);
    assert_eq!(
        stats.last_fault().unwrap().cause,
        FaultCause::Sensor(SensorFault::OpenCircuit)
    );
    assert_eq!(
        h.app.temperature(),
        Err(Error::Sensor(SensorFault::OpenCircuit))
    );

    // Locked ignores everything but reset.
    h.post(Event::InitDone);
    h.tick();
    assert_eq!(h.app.current_state(), SystemState::Locked);

    h.hw.temperature = Ok(25.0);
    h.app
        .handle_command(AppCommand::Reset, &mut h.hw, &mut h.sink)
        .unwrap();
    assert_eq!(h.app.current_state(), SystemState::Init);
    h.run_until(SystemState::Idle, 5);
    assert_eq!(h.app.temperature(), Ok(25.0));
    assert!(h
        .sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::Reset { from: SystemState::Locked })));
}

#[test]
fn jammed_axis_is_a_data_error() {
    let mut h = Harness::new();
    h.stage_and_calibrate(two_points());
    h.hw.axis_mut(AxisId::Y).frozen = true;
    h.approve_and_heat();
    h.run_until(SystemState::DataError, 500);
    assert_eq!(
        h.app.last_fault().unwrap().cause,
        FaultCause::AxisStalled(AxisId::Y)
    );
}

#[test]
fn reset_is_refused_outside_errors() {
    let mut h = Harness::new();
    let err = h.app.reset(&mut h.hw, &mut h.sink).unwrap_err();
    assert_eq!(err, Error::Busy(SystemState::Idle));
}

// ── Commands and the event queue ──────────────────────────────

#[test]
fn staging_is_only_accepted_while_idle() {
    let mut h = Harness::new();
    assert_eq!(
        h.app.stage_points(Vec::new()),
        Err(Error::Program(ProgramError::Empty))
    );
    h.stage_and_calibrate(two_points());
    assert_eq!(
        h.app.stage_points(two_points()),
        Err(Error::Busy(SystemState::Ready))
    );
    assert_eq!(
        h.app.stage_program(b"G0 X1\n"),
        Err(Error::Busy(SystemState::Ready))
    );
}

#[test]
fn jog_requires_manual_control_and_is_clamped() {
    let mut h = Harness::new();
    let jog = AppCommand::Jog {
        axis: AxisId::X,
        steps: 50,
    };
    assert_eq!(
        h.app.handle_command(jog.clone(), &mut h.hw, &mut h.sink),
        Err(Error::Busy(SystemState::Idle))
    );

    h.post(Event::SelectManual);
    h.run_until(SystemState::ManualControl, 5);
    h.app.handle_command(jog, &mut h.hw, &mut h.sink).unwrap();
    assert_eq!(h.hw.axis_ref(AxisId::X).position, 50);

    let max = h.app.config().execution.max_steps_per_tick as i32;
    h.app.jog(&mut h.hw, AxisId::X, -10_000).unwrap();
    assert_eq!(h.hw.axis_ref(AxisId::X).position, 50 - max);

    h.post(Event::ExitManual);
    h.run_until(SystemState::Idle, 5);
    assert!(!h.hw.any_axis_enabled());
}

#[test]
fn jog_with_an_unbounded_step_budget() {
    let mut config = SystemConfig::default();
    config.execution.max_steps_per_tick = u32::MAX;
    let mut h = Harness::with_config(config);
    h.post(Event::SelectManual);
    h.run_until(SystemState::ManualControl, 5);

    h.app.jog(&mut h.hw, AxisId::X, 10).unwrap();
    assert_eq!(h.hw.axis_ref(AxisId::X).position, 10);
    h.app.jog(&mut h.hw, AxisId::X, -4).unwrap();
    assert_eq!(h.hw.axis_ref(AxisId::X).position, 6);
    h.app.jog(&mut h.hw, AxisId::Y, i32::MIN).unwrap();
    assert_eq!(h.hw.axis_ref(AxisId::Y).position, -i32::MAX);
}

#[test]
fn unexpected_events_are_counted_and_ignored() {
    let mut h = Harness::new();
    h.post(Event::TaskApproved);
    h.tick();
    assert_eq!(h.app.current_state(), SystemState::Idle);
    assert_eq!(h.app.get_statistics().invalid_transitions, 1);
    assert_eq!(h.sink.rejected(), 1);
}

#[test]
fn queue_overflow_is_counted() {
    let h = Harness::new();
    for _ in 0..EVENT_QUEUE_DEPTH {
        assert!(h.app.post_event(Event::PauseRequest));
    }
    assert!(!h.app.post_event(Event::PauseRequest));
    assert_eq!(h.app.get_statistics().events_dropped, 1);
}

#[test]
fn stopped_service_refuses_events() {
    let mut h = Harness::new();
    h.app.stop(&mut h.hw);
    assert!(!h.app.is_running());
    assert!(!h.app.post_event(Event::SelectManual));
    h.tick();
    assert_eq!(h.app.current_state(), SystemState::Idle);
}

#[test]
fn config_update_is_validated() {
    let mut h = Harness::new();
    let mut bad = SystemConfig::default();
    bad.execution.safe_z = bad.execution.soldering_z;
    assert!(matches!(
        h.app.handle_command(AppCommand::UpdateConfig(bad), &mut h.hw, &mut h.sink),
        Err(Error::Config(_))
    ));

    let mut good = SystemConfig::default();
    good.target_temperature_c = 300.0;
    h.app
        .handle_command(AppCommand::UpdateConfig(good), &mut h.hw, &mut h.sink)
        .unwrap();
    assert_eq!(h.app.config().target_temperature_c, 300.0);
}

#[test]
fn telemetry_follows_the_interval() {
    let mut h = Harness::new();
    let before = h
        .sink
        .events
        .iter()
        .filter(|e| matches!(e, AppEvent::Telemetry(_)))
        .count();
    let ticks = h.app.config().telemetry_interval_ms / h.tick_ms;
    for _ in 0..ticks {
        h.tick();
    }
    let telemetry: Vec<_> = h
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::Telemetry(t) => Some(t.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(telemetry.len(), before + 1);
    let last = telemetry.last().unwrap();
    assert_eq!(last.state, SystemState::Idle);
    assert_eq!(last.temperature_c, Some(25.0));
    assert_eq!(last.exec_state, None::<ExecSubState>);
}

#[test]
fn statistics_reset_clears_counters() {
    let mut h = Harness::new();
    h.post(Event::TaskApproved);
    h.tick();
    h.app
        .handle_command(AppCommand::ResetStatistics, &mut h.hw, &mut h.sink)
        .unwrap();
    let stats = h.app.get_statistics();
    assert_eq!(stats.invalid_transitions, 0);
    assert_eq!(stats.events_dropped, 0);
}
