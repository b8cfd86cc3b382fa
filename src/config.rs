//! Command-line configuration of the hosted build.

use crate::bridge::{BridgeConfig, SimulatorBackend, DEFAULT_SIM_HOST};
use crate::chanmap::{ChannelMapping, MappingError};
use clap::{App, Arg, ArgMatches, ErrorKind};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_CONFIG_FILE: &str = "eeprom.bin";
pub const MAX_CONFIG_PATH_LEN: usize = 256;

const CHANMAP_HELP: &str = "\
CHANNEL MAPPING:
    Maps motor and servo PWM outputs to the simulator's virtual receiver outputs.
    Format: M(otor)|S(ervo)<OUTPUT>-<RECEIVER-OUTPUT>,...  All numbers have two digits.
    Map motor 1 to receiver output 1, servo 1 to output 2 and servo 2 to output 3:
        --chanmap=M01-01,S01-02,S02-03";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config file path: {0}")]
    InvalidPath(String),

    #[error("[SIM] Invalid channel mapping string: {0}")]
    Mapping(#[from] MappingError),
}

/// Everything the command line decides, fixed for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSettings {
    pub bridge: BridgeConfig,
    pub config_path: PathBuf,
    pub verbose: bool,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            bridge: BridgeConfig::default(),
            config_path: PathBuf::from(DEFAULT_CONFIG_FILE),
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliOutcome {
    Run(HostSettings),
    /// Stop before the scheduler starts. `message` goes to stdout for a
    /// zero code and to stderr otherwise.
    Exit { code: i32, message: String },
}

pub fn build_cli() -> App<'static, 'static> {
    App::new("sitl")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Flight-controller firmware hosted as a process, flying against an external simulator")
        .after_help(CHANMAP_HELP)
        .arg(
            Arg::with_name("sim")
                .long("sim")
                .value_name("rf|xp")
                .help("Simulator interface: rf = RealFlight, xp = X-Plane")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("simip")
                .long("simip")
                .value_name("HOST")
                .help("Address of the simulator host [default: 127.0.0.1]")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("simport")
                .long("simport")
                .value_name("PORT")
                .help("Port of the simulator host [default: backend specific]")
                .takes_value(true)
                .validator(|v| {
                    v.parse::<u16>()
                        .map(|_| ())
                        .map_err(|_| "Port must be a number between 0 and 65535".to_string())
                }),
        )
        .arg(
            Arg::with_name("useimu")
                .long("useimu")
                .help("Use IMU data from the simulator instead of its attitude (experimental)"),
        )
        .arg(
            Arg::with_name("chanmap")
                .long("chanmap")
                .value_name("MAP")
                .help("Channel mapping, see below")
                .takes_value(true)
                .use_delimiter(false),
        )
        .arg(
            Arg::with_name("path")
                .long("path")
                .value_name("FILE")
                .help("Path of the persisted configuration file [default: ./eeprom.bin]")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("verbose")
                .long("verbose")
                .help("Enable debug logging"),
        )
}

/// Parse a full argv, program name first.
pub fn parse_args<I, T>(args: I) -> CliOutcome
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = match build_cli().get_matches_from_safe(args) {
        Ok(matches) => matches,
        Err(e) => {
            let code = match e.kind {
                ErrorKind::HelpDisplayed | ErrorKind::VersionDisplayed => 0,
                _ => 1,
            };
            return CliOutcome::Exit {
                code,
                message: e.message,
            };
        }
    };

    match settings_from_matches(&matches) {
        Ok(settings) => CliOutcome::Run(settings),
        Err(e) => CliOutcome::Exit {
            code: 1,
            message: format!("{}\n\n{}", e, usage()),
        },
    }
}

pub fn settings_from_matches(matches: &ArgMatches<'_>) -> Result<HostSettings, ConfigError> {
    let backend = match matches.value_of("sim") {
        Some(name) => SimulatorBackend::from_cli_name(name).unwrap_or_else(|| {
            warn!("[SIM] Unsupported simulator {}.", name);
            SimulatorBackend::None
        }),
        None => SimulatorBackend::None,
    };

    // a bad map only matters when there is a simulator to drive
    let mapping = match matches.value_of("chanmap").map(ChannelMapping::parse) {
        Some(Ok(mapping)) => mapping,
        Some(Err(e)) if backend != SimulatorBackend::None => return Err(e.into()),
        Some(Err(e)) => {
            debug!("[SIM] Ignoring channel mapping without simulator: {}", e);
            ChannelMapping::new()
        }
        None => ChannelMapping::new(),
    };

    Ok(HostSettings {
        bridge: BridgeConfig {
            backend,
            host: matches.value_of("simip").unwrap_or(DEFAULT_SIM_HOST).to_string(),
            port: matches.value_of("simport").and_then(|v| v.parse().ok()),
            use_imu: matches.is_present("useimu"),
            mapping,
        },
        config_path: resolve_config_path(matches.value_of("path")),
        verbose: matches.is_present("verbose"),
    })
}

/// The requested config file path, or the default when it cannot be used.
pub fn resolve_config_path(requested: Option<&str>) -> PathBuf {
    match requested.map(validate_config_path) {
        Some(Ok(path)) => path,
        Some(Err(e)) => {
            warn!("[EEPROM] {}, using eeprom file in program directory", e);
            PathBuf::from(DEFAULT_CONFIG_FILE)
        }
        None => PathBuf::from(DEFAULT_CONFIG_FILE),
    }
}

pub fn validate_config_path(requested: &str) -> Result<PathBuf, ConfigError> {
    if requested.is_empty() || requested.len() >= MAX_CONFIG_PATH_LEN {
        return Err(ConfigError::InvalidPath(requested.to_string()));
    }

    let path = Path::new(requested);
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.is_dir() => {
            Err(ConfigError::InvalidPath(requested.to_string()))
        }
        _ => Ok(path.to_path_buf()),
    }
}

fn usage() -> String {
    let mut buf = Vec::new();
    match build_cli().write_help(&mut buf) {
        Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
        Err(_) => CHANMAP_HELP.to_string(),
    }
}
