//! Interactive prompt — a thin dispatch layer over the session and control
//! traits. Commands never block on a running sync campaign; long-running
//! work stays on its worker threads and reports through the log stream.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::device::{prop, CameraControl, PropertyCode};
use crate::format;
use crate::monitor::Monitor;
use crate::shutdown::Shutdown;
use crate::transfer::SyncSession;
use crate::types::SyncScope;

/// Button timings mirroring a careful human press: half-press settle, full
/// press, release, and metering release.
const HALF_PRESS_SETTLE: Duration = Duration::from_millis(500);
const SHUTTER_PRESS: Duration = Duration::from_millis(35);
const POST_SHOT_HOLD: Duration = Duration::from_millis(1000);
const FOCUS_HOLD: Duration = Duration::from_millis(1000);
const RECORD_SETTLE: Duration = Duration::from_millis(500);

/// Connection-scoped objects the REPL dispatches against, swapped by the
/// outer loop on reconnect while the prompt thread lives on.
pub struct ShellState {
    session: Mutex<Option<Arc<SyncSession>>>,
    control: Mutex<Option<Arc<dyn CameraControl>>>,
}

impl ShellState {
    pub fn new() -> Arc<ShellState> {
        Arc::new(ShellState {
            session: Mutex::new(None),
            control: Mutex::new(None),
        })
    }

    pub fn set_connection(&self, session: Arc<SyncSession>, control: Arc<dyn CameraControl>) {
        *self.session.lock() = Some(session);
        *self.control.lock() = Some(control);
    }

    pub fn clear_connection(&self) {
        *self.session.lock() = None;
        *self.control.lock() = None;
    }

    fn session(&self) -> Option<Arc<SyncSession>> {
        self.session.lock().clone()
    }

    fn control(&self) -> Option<Arc<dyn CameraControl>> {
        self.control.lock().clone()
    }
}

pub struct ReplContext {
    pub state: Arc<ShellState>,
    pub shutdown: Arc<Shutdown>,
    pub monitor: Arc<Monitor>,
    pub monitor_out: PathBuf,
}

enum Outcome {
    Continue,
    Quit,
}

/// Split on whitespace, honoring double quotes.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut quoted = false;
    for c in line.chars() {
        if c == '"' {
            quoted = !quoted;
            continue;
        }
        if !quoted && c.is_whitespace() {
            if !cur.is_empty() {
                out.push(std::mem::take(&mut cur));
            }
        } else {
            cur.push(c);
        }
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SyncCommand {
    Count(u32),
    All,
    On,
    Off,
    Stop,
}

pub(crate) fn parse_sync_args(args: &[String]) -> Option<SyncCommand> {
    if args.len() < 2 {
        return Some(SyncCommand::Count(1));
    }
    let sub = args[1].to_ascii_lowercase();
    match sub.as_str() {
        "on" => Some(SyncCommand::On),
        "off" => Some(SyncCommand::Off),
        "all" => Some(SyncCommand::All),
        "stop" => Some(SyncCommand::Stop),
        _ => sub.parse::<u32>().ok().map(|n| SyncCommand::Count(n.max(1))),
    }
}

/// Run the prompt loop until quit, shutdown, or EOF.
pub fn run(ctx: ReplContext) {
    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        if ctx.shutdown.is_stopped() {
            break;
        }

        print!("camshell> ");
        let _ = std::io::stdout().flush();

        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => {
                // EOF at the prompt quits, like Ctrl-D in a login shell.
                ctx.shutdown.request_stop();
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("stdin read failed: {}", e);
                ctx.shutdown.request_stop();
                break;
            }
        }

        let args = tokenize(line.trim());
        if args.is_empty() {
            continue;
        }
        match dispatch(&ctx, &args) {
            Outcome::Continue => {}
            Outcome::Quit => {
                ctx.shutdown.request_stop();
                break;
            }
        }
    }
}

fn dispatch(ctx: &ReplContext, args: &[String]) -> Outcome {
    match args[0].as_str() {
        "shoot" | "trigger" => cmd_shoot(ctx),
        "focus" => cmd_focus(ctx),
        "record" => cmd_record(ctx, args),
        "status" => cmd_status(ctx),
        "exposure" => cmd_exposure(ctx, args),
        "sync" => cmd_sync(ctx, args),
        "monitor" => cmd_monitor(ctx, args),
        "poweroff" => cmd_poweroff(ctx),
        "quit" | "exit" => return Outcome::Quit,
        other => {
            tracing::error!("Unknown command: {}", other);
            Outcome::Continue
        }
    }
}

fn with_control(ctx: &ReplContext, f: impl FnOnce(&dyn CameraControl) -> Outcome) -> Outcome {
    match ctx.state.control() {
        Some(control) => f(control.as_ref()),
        None => {
            tracing::error!("Camera handle unavailable");
            Outcome::Continue
        }
    }
}

fn cmd_shoot(ctx: &ReplContext) -> Outcome {
    with_control(ctx, |control| {
        tracing::debug!("Capture image...");
        if let Err(e) = control.set_half_press(true) {
            tracing::error!("Failed to half-press shutter: {}", e);
            return Outcome::Continue;
        }
        std::thread::sleep(HALF_PRESS_SETTLE);

        if let Err(e) = control.press_shutter(true) {
            tracing::error!("Shutter down failed: {}", e);
        }
        std::thread::sleep(SHUTTER_PRESS);

        if let Err(e) = control.press_shutter(false) {
            tracing::error!("Shutter up failed: {}", e);
        }

        std::thread::sleep(POST_SHOT_HOLD);
        if let Err(e) = control.set_half_press(false) {
            tracing::error!("Failed to release half-press: {}", e);
        }
        Outcome::Continue
    })
}

fn cmd_focus(ctx: &ReplContext) -> Outcome {
    with_control(ctx, |control| {
        tracing::debug!("Half-press focus...");
        if let Err(e) = control.set_half_press(true) {
            tracing::error!("Failed to half-press shutter: {}", e);
            return Outcome::Continue;
        }
        std::thread::sleep(FOCUS_HOLD);
        if let Err(e) = control.set_half_press(false) {
            tracing::error!("Failed to release half-press: {}", e);
            return Outcome::Continue;
        }
        tracing::debug!("Focus complete.");
        Outcome::Continue
    })
}

fn cmd_record(ctx: &ReplContext, args: &[String]) -> Outcome {
    let want_start = match args.get(1).map(|s| s.to_ascii_lowercase()).as_deref() {
        Some("start") => true,
        Some("stop") => false,
        _ => {
            tracing::error!("usage: record start|stop");
            return Outcome::Continue;
        }
    };

    with_control(ctx, |control| {
        let state = control.get_property(PropertyCode::MovieRecordingState).ok();
        if let Some(state) = state {
            if want_start && state == prop::RECORDING_RECORDING {
                tracing::info!("Record: already recording.");
                return Outcome::Continue;
            }
            if !want_start && state == prop::RECORDING_NOT_RECORDING {
                tracing::info!("Record: already stopped.");
                return Outcome::Continue;
            }
        }

        tracing::info!(
            "{}",
            if want_start {
                "Record: starting video..."
            } else {
                "Record: stopping video..."
            }
        );
        if let Err(e) = control.press_record_button() {
            tracing::error!("Record button failed: {}", e);
            return Outcome::Continue;
        }
        std::thread::sleep(RECORD_SETTLE);

        match control.get_property(PropertyCode::MovieRecordingState) {
            Ok(state) => {
                tracing::info!("Record: camera state {}", format::recording_state(state));
                if want_start && state != prop::RECORDING_RECORDING {
                    tracing::warn!("Record: camera did not report Recording state.");
                }
                if !want_start && state == prop::RECORDING_RECORDING {
                    tracing::warn!("Record: camera still reports Recording; retry stop if needed.");
                }
            }
            Err(e) => tracing::warn!("Record: unable to confirm state: {}", e),
        }
        Outcome::Continue
    })
}

fn cmd_status(ctx: &ReplContext) -> Outcome {
    with_control(ctx, |control| {
        let read = |code| control.get_property(code).unwrap_or(0);

        let iso = format::iso_value(read(PropertyCode::IsoSensitivity));
        let iso_actual = format::iso_current(read(PropertyCode::IsoCurrent));
        let mut iso_display = iso.clone();
        if !iso_actual.is_empty() && iso_actual != iso {
            iso_display = format!("{} [{}]", iso, iso_actual);
        }

        tracing::info!("Status:");
        tracing::info!(
            "  Exposure: {}  {}  {}; Mode: {}",
            format::f_number(read(PropertyCode::FNumber)),
            format::shutter_speed(read(PropertyCode::ShutterSpeed)),
            iso_display,
            format::exposure_program(read(PropertyCode::ExposureProgram))
        );
        tracing::info!(
            "  EV: {}; Recording: {}; Power: {}",
            format::exposure_compensation(read(PropertyCode::ExposureCompensation)),
            format::recording_state(read(PropertyCode::MovieRecordingState)),
            format::power_status(read(PropertyCode::CameraPowerStatus))
        );
        Outcome::Continue
    })
}

fn log_exposure_usage() {
    tracing::error!("usage: exposure iso|shutter|fnumber|ev|mode [value]");
}

fn cmd_exposure(ctx: &ReplContext, args: &[String]) -> Outcome {
    let sub = match args.get(1) {
        Some(s) => s.to_ascii_lowercase(),
        None => {
            log_exposure_usage();
            return Outcome::Continue;
        }
    };
    let value = args.get(2).map(|s| s.as_str());

    with_control(ctx, |control| {
        let set = |code: PropertyCode, raw: u64, shown: String| {
            match control.set_property(code, raw) {
                Ok(()) => tracing::info!("Exposure: set to {}", shown),
                Err(e) => tracing::error!("Exposure: set failed: {}", e),
            }
        };

        match (sub.as_str(), value) {
            ("iso", None) => tracing::info!(
                "{}",
                format::iso_value(control.get_property(PropertyCode::IsoSensitivity).unwrap_or(0))
            ),
            ("iso", Some(v)) => match format::parse_iso(v) {
                Some(raw) => set(
                    PropertyCode::IsoSensitivity,
                    u64::from(raw),
                    format::iso_value(u64::from(raw)),
                ),
                None => tracing::error!("exposure iso: cannot parse {:?}", v),
            },
            ("shutter", None) => tracing::info!(
                "{}",
                format::shutter_speed(
                    control.get_property(PropertyCode::ShutterSpeed).unwrap_or(0)
                )
            ),
            ("shutter", Some(v)) => match format::parse_shutter(v) {
                Some(raw) => set(
                    PropertyCode::ShutterSpeed,
                    u64::from(raw),
                    format::shutter_speed(u64::from(raw)),
                ),
                None => tracing::error!("exposure shutter: cannot parse {:?}", v),
            },
            ("fnumber" | "aperture" | "f", None) => tracing::info!(
                "{}",
                format::f_number(control.get_property(PropertyCode::FNumber).unwrap_or(0))
            ),
            ("fnumber" | "aperture" | "f", Some(v)) => match format::parse_f_number(v) {
                Some(raw) => set(
                    PropertyCode::FNumber,
                    u64::from(raw),
                    format::f_number(u64::from(raw)),
                ),
                None => tracing::error!("exposure fnumber: cannot parse {:?}", v),
            },
            ("ev" | "comp", None) => tracing::info!(
                "{}",
                format::exposure_compensation(
                    control
                        .get_property(PropertyCode::ExposureCompensation)
                        .unwrap_or(0)
                )
            ),
            ("ev" | "comp", Some(v)) => match format::parse_exposure_compensation(v) {
                Some(milli) => {
                    let raw = u64::from(milli as i16 as u16);
                    set(
                        PropertyCode::ExposureCompensation,
                        raw,
                        format::exposure_compensation(raw),
                    )
                }
                None => tracing::error!("exposure ev: cannot parse {:?}", v),
            },
            ("mode", None) => tracing::info!(
                "{}",
                format::exposure_program(
                    control
                        .get_property(PropertyCode::ExposureProgram)
                        .unwrap_or(0)
                )
            ),
            ("mode", Some(v)) => match format::parse_exposure_program(v) {
                Some(program) => set(
                    PropertyCode::ExposureProgram,
                    program.code(),
                    program.label().to_string(),
                ),
                None => tracing::error!("exposure mode: unknown mode {:?}", v),
            },
            _ => log_exposure_usage(),
        }
        Outcome::Continue
    })
}

fn cmd_sync(ctx: &ReplContext, args: &[String]) -> Outcome {
    let command = match parse_sync_args(args) {
        Some(c) => c,
        None => {
            tracing::error!("usage: sync [count|all|on|off|stop]");
            return Outcome::Continue;
        }
    };
    let session = match ctx.state.session() {
        Some(s) => s,
        None => {
            tracing::error!("Camera handle unavailable");
            return Outcome::Continue;
        }
    };
    match command {
        SyncCommand::On => session.set_auto_sync(true),
        SyncCommand::Off => session.set_auto_sync(false),
        SyncCommand::Stop => session.stop_campaign(),
        SyncCommand::All => session.start_campaign(SyncScope::All),
        SyncCommand::Count(n) => session.start_campaign(SyncScope::Latest(n)),
    }
    Outcome::Continue
}

fn cmd_monitor(ctx: &ReplContext, args: &[String]) -> Outcome {
    match args.get(1).map(|s| s.to_ascii_lowercase()).as_deref() {
        Some("start") => {
            if let Some(control) = ctx.state.control() {
                ctx.monitor.start(control, ctx.monitor_out.clone());
            } else {
                tracing::error!("Camera handle unavailable");
            }
        }
        Some("stop") => ctx.monitor.stop(),
        _ => tracing::error!("usage: monitor start|stop"),
    }
    Outcome::Continue
}

fn cmd_poweroff(ctx: &ReplContext) -> Outcome {
    with_control(ctx, |control| {
        tracing::info!("Sending power-off command to camera...");
        if let Err(e) = control.power_off() {
            tracing::error!("Power-off command failed: {}", e);
            return Outcome::Continue;
        }
        // Poll briefly; bodies without remote power-off stay PowerOn.
        let deadline = std::time::Instant::now() + Duration::from_secs(3);
        let mut last = None;
        while std::time::Instant::now() < deadline {
            match control.get_property(PropertyCode::CameraPowerStatus) {
                Ok(status) => {
                    last = Some(status);
                    if status != prop::POWER_ON {
                        break;
                    }
                }
                Err(_) => break,
            }
            std::thread::sleep(Duration::from_millis(200));
        }
        if let Some(status) = last {
            tracing::info!("Camera power status: {}", format::power_status(status));
            if status == prop::POWER_ON {
                tracing::warn!(
                    "Camera still reports PowerOn; enable remote power-off on the body to allow remote shutdown."
                );
            }
        }
        tracing::info!("Power-off command sent; waiting for camera to disconnect...");
        Outcome::Continue
    })
}
