use assert_cmd::Command;

#[test]
fn help_lists_subcommands() {
    let output = Command::cargo_bin("hostk8s")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for subcommand in [
        "start", "stop", "restart", "status", "build", "sync", "suspend", "resume", "deploy",
        "remove", "up", "down", "secrets",
    ] {
        assert!(stdout.contains(subcommand), "missing '{}'", subcommand);
    }
}

#[test]
fn unknown_subcommand_fails() {
    Command::cargo_bin("hostk8s")
        .unwrap()
        .arg("frobnicate")
        .assert()
        .failure();
}
