use sitl_host::bridge::SimulatorBackend;
use sitl_host::chanmap::OutputTarget;
use sitl_host::config::*;
use std::path::PathBuf;

fn run(args: &[&str]) -> HostSettings {
    let argv = std::iter::once("sitl").chain(args.iter().copied());
    match parse_args(argv) {
        CliOutcome::Run(settings) => settings,
        CliOutcome::Exit { code, message } => panic!("unexpected exit {}: {}", code, message),
    }
}

fn exit_code(args: &[&str]) -> i32 {
    let argv = std::iter::once("sitl").chain(args.iter().copied());
    match parse_args(argv) {
        CliOutcome::Run(settings) => panic!("expected exit, got {:?}", settings),
        CliOutcome::Exit { code, .. } => code,
    }
}

#[test]
fn test_defaults() {
    let settings = run(&[]);
    assert_eq!(settings.bridge.backend, SimulatorBackend::None);
    assert_eq!(settings.bridge.host, "127.0.0.1");
    assert_eq!(settings.bridge.port, None);
    assert!(!settings.bridge.use_imu);
    assert!(settings.bridge.mapping.is_empty());
    assert_eq!(settings.config_path, PathBuf::from(DEFAULT_CONFIG_FILE));
    assert!(!settings.verbose);
}

#[test]
fn test_full_xplane_command_line() {
    let settings = run(&[
        "--sim=xp",
        "--simip",
        "10.0.0.7",
        "--simport=49001",
        "--useimu",
        "--chanmap=M01-01,S01-02,S02-03",
    ]);

    assert_eq!(settings.bridge.backend, SimulatorBackend::XPlane);
    assert_eq!(settings.bridge.host, "10.0.0.7");
    assert_eq!(settings.bridge.port, Some(49001));
    assert!(settings.bridge.use_imu);
    assert_eq!(settings.bridge.mapping.count(), 3);
    assert_eq!(settings.bridge.mapping.get(0), Some(OutputTarget::Motor(0)));
}

#[test]
fn test_unknown_simulator_stays_unselected() {
    let settings = run(&["--sim", "flightgear"]);
    assert_eq!(settings.bridge.backend, SimulatorBackend::None);
}

#[test]
fn test_bad_map_with_simulator_exits_nonzero() {
    assert_eq!(exit_code(&["--sim", "rf", "--chanmap", "M1-01"]), 1);
    // option order does not matter
    assert_eq!(exit_code(&["--chanmap", "X01-01", "--sim", "xp"]), 1);
}

#[test]
fn test_bad_map_without_simulator_is_ignored() {
    let settings = run(&["--chanmap", "M01-00"]);
    assert!(settings.bridge.mapping.is_empty());

    let settings = run(&["--sim", "nope", "--chanmap", "M01-00"]);
    assert!(settings.bridge.mapping.is_empty());
}

#[test]
fn test_bad_map_exit_message_carries_usage() {
    let argv = ["sitl", "--sim", "rf", "--chanmap", "Q01-01"];
    match parse_args(argv) {
        CliOutcome::Exit { code, message } => {
            assert_eq!(code, 1);
            assert!(message.contains("Invalid channel mapping"));
            assert!(message.contains("--chanmap"));
        }
        other => panic!("expected exit, got {:?}", other),
    }
}

#[test]
fn test_help_and_version_exit_zero() {
    assert_eq!(exit_code(&["--help"]), 0);
    assert_eq!(exit_code(&["--version"]), 0);
}

#[test]
fn test_argument_errors_exit_nonzero() {
    assert_eq!(exit_code(&["--simport", "not-a-port"]), 1);
    assert_eq!(exit_code(&["--simport", "70000"]), 1);
    assert_eq!(exit_code(&["--no-such-option"]), 1);
}

#[test]
fn test_config_path_validation() {
    let dir = std::env::temp_dir();
    let inside = dir.join("sitl-host-eeprom.bin");
    let inside = inside.to_str().unwrap();

    assert_eq!(resolve_config_path(Some(inside)), PathBuf::from(inside));
    assert_eq!(resolve_config_path(Some("local.bin")), PathBuf::from("local.bin"));
    assert_eq!(
        resolve_config_path(Some("/definitely/not/here/eeprom.bin")),
        PathBuf::from(DEFAULT_CONFIG_FILE)
    );
    assert_eq!(resolve_config_path(Some("")), PathBuf::from(DEFAULT_CONFIG_FILE));
    assert_eq!(resolve_config_path(None), PathBuf::from(DEFAULT_CONFIG_FILE));

    let long = "a".repeat(MAX_CONFIG_PATH_LEN);
    assert!(matches!(validate_config_path(&long), Err(ConfigError::InvalidPath(_))));
}

#[test]
fn test_path_option_applied() {
    let settings = run(&["--path", "custom.bin", "--verbose"]);
    assert_eq!(settings.config_path, PathBuf::from("custom.bin"));
    assert!(settings.verbose);
}
