use std::process::{Command, Output, Stdio};

fn sitl(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sitl"))
        .args(args)
        .stdin(Stdio::null())
        .output()
        .unwrap()
}

#[test]
fn test_bad_map_with_simulator_exits_one() {
    let output = sitl(&["--sim", "rf", "--chanmap", "M1-01"]);
    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid channel mapping"), "stderr: {}", stderr);
    assert!(stderr.contains("--chanmap"), "usage missing: {}", stderr);
}

#[test]
fn test_version_exits_zero() {
    let output = sitl(&["--version"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_exits_zero() {
    let output = sitl(&["--help"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("CHANNEL MAPPING"));
}

#[test]
fn test_unknown_option_exits_one() {
    let output = sitl(&["--bogus"]);
    assert_eq!(output.status.code(), Some(1));
}
