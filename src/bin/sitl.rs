use serde::Serialize;
use sitl_host::bridge::{BridgeStatus, SimulatorBridge, SocketLink};
use sitl_host::config::{self, CliOutcome};
use sitl_host::lifecycle::{self, LaunchArgs};
use sitl_host::scheduler::TaskStats;
use sitl_host::{platform, HostContext, SystemRequest, TaskId, TaskTable};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use tracing::{debug, info, warn, Level};

const CONTROL_TASK_PERIOD_US: u32 = 1_000;
const STATUS_INTERVAL_MS: u32 = 10_000;

type SharedBridge = Arc<Mutex<SimulatorBridge>>;

#[derive(Serialize)]
struct HostStatus<'a> {
    uptime_ms: u32,
    control_cycles: u64,
    sim_io_ticks_dropped: u64,
    bridge: &'a BridgeStatus,
    tasks: &'a TaskStats,
}

fn main() {
    // Stash argv so a reset can re-exec exactly like the board reboots
    let args = LaunchArgs::capture();
    init_logging(args.as_slice().iter().any(|a| a == "--verbose"));

    let settings = match config::parse_args(args.as_slice().iter().cloned()) {
        CliOutcome::Run(settings) => settings,
        CliOutcome::Exit { code, message } => {
            // clap prints --version itself and leaves the message empty
            if !message.is_empty() {
                if code == 0 {
                    println!("{}", message);
                } else {
                    eprintln!("{}", message);
                }
            }
            std::process::exit(code);
        }
    };

    info!("{}", platform::version_banner());
    info!("[SYSTEM] Init...");

    let ctx = Arc::new(HostContext::new(settings, args));
    info!("[EEPROM] Using {}", ctx.settings().config_path.display());

    let mut tasks = TaskTable::new();
    if let Err(e) = tasks.register(TaskId::Control, CONTROL_TASK_PERIOD_US) {
        lifecycle::fatal(e);
    }

    let mut bridge = SimulatorBridge::new(ctx.settings().bridge.clone());
    bridge.start(SocketLink::new(), &mut tasks);
    let io_enabled = bridge.io_enabled();
    let bridge = Arc::new(Mutex::new(bridge));

    let sim_io = if io_enabled {
        Some(spawn_simulator_io(Arc::clone(&ctx), Arc::clone(&bridge)))
    } else {
        None
    };

    let request = run(&ctx, &mut tasks, &bridge, sim_io.as_ref());
    info!("[SYSTEM] Performing {:?}", request);
    request.perform()
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn lock_bridge(bridge: &Mutex<SimulatorBridge>) -> std::sync::MutexGuard<'_, SimulatorBridge> {
    bridge.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Simulator I/O runs beside the scheduler and shares the main-loop guard
/// with the control task. It services the bridge once per tick sent by the
/// `SimulatorIo` task, so the task table owns its cadence.
fn spawn_simulator_io(ctx: Arc<HostContext>, bridge: SharedBridge) -> SyncSender<()> {
    let (ticks, rx) = mpsc::sync_channel(1);

    let spawned = thread::Builder::new()
        .name("sim-io".to_string())
        .spawn(move || simulator_io(&ctx, &bridge, &rx));

    if let Err(e) = spawned {
        lifecycle::fatal(&format!("Unable to start simulator I/O thread: {}", e));
    }
    ticks
}

fn simulator_io(ctx: &HostContext, bridge: &Mutex<SimulatorBridge>, ticks: &Receiver<()>) {
    for () in ticks.iter() {
        if let Some(_permit) = ctx.guard().try_lock() {
            // failures are counted by the bridge and retried next tick
            let _ = lock_bridge(bridge).service();
        }
    }
    debug!("[SIM] I/O thread stopped");
}

/// Scheduler loop. Returns only when a reset or shutdown was requested.
fn run(
    ctx: &HostContext,
    tasks: &mut TaskTable,
    bridge: &Mutex<SimulatorBridge>,
    sim_io: Option<&SyncSender<()>>,
) -> SystemRequest {
    let clock = ctx.clock();
    let mut control_cycles: u64 = 0;
    let mut sim_io_ticks_dropped: u64 = 0;
    let mut last_status_ms = clock.now_millis();

    loop {
        if let Some(request) = ctx.take_request() {
            return request;
        }

        for task in tasks.due_tasks(clock.now_micros()) {
            match task {
                TaskId::Control => match ctx.guard().try_lock() {
                    // firmware control step runs under the permit
                    Some(_permit) => control_cycles += 1,
                    None => tasks.record_guarded_skip(),
                },
                TaskId::SimulatorIo => match sim_io.map(|tx| tx.try_send(())) {
                    // previous exchange still in flight
                    Some(Err(TrySendError::Full(()))) => sim_io_ticks_dropped += 1,
                    Some(Err(TrySendError::Disconnected(()))) => {
                        warn!("[SIM] I/O thread gone, dropping tick");
                        sim_io_ticks_dropped += 1;
                    }
                    Some(Ok(())) | None => {}
                },
                // no hosted serial ports to poll
                TaskId::Serial => {}
            }
        }

        let now_ms = clock.now_millis();
        if sitl_host::clock::millis_since(now_ms, last_status_ms) >= STATUS_INTERVAL_MS {
            last_status_ms = now_ms;
            let bridge_status = lock_bridge(bridge).status();
            let status = HostStatus {
                uptime_ms: now_ms,
                control_cycles,
                sim_io_ticks_dropped,
                bridge: &bridge_status,
                tasks: tasks.stats(),
            };
            log_status(&status);
        }

        let idle_us = tasks.idle_time_us(clock.now_micros());
        if idle_us > 0 {
            clock.sleep_micros(idle_us);
        }
    }
}

fn log_status(status: &HostStatus<'_>) {
    match serde_json::to_string(status) {
        Ok(json) => info!("📡 STATUS: {}", json),
        Err(e) => warn!("Failed to serialize status: {}", e),
    }
}
