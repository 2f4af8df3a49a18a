use assert_cmd::Command;

#[test]
fn help_lists_subcommands() {
    let output = Command::cargo_bin("folio-cli")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();

    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).unwrap();
    for command in ["tour", "find", "set-price", "delete", "stats", "indexes", "explain"] {
        assert!(text.contains(command), "missing subcommand {command}");
    }
}

#[test]
fn malformed_arguments_fail_before_connecting() {
    Command::cargo_bin("folio-cli")
        .unwrap()
        .args(["find", "--sort", "price", "--page", "2"])
        .assert()
        .failure();

    Command::cargo_bin("folio-cli")
        .unwrap()
        .args(["find", "--page-size", "3"])
        .assert()
        .failure();

    Command::cargo_bin("folio-cli")
        .unwrap()
        .args(["set-price", "Book One", "cheap"])
        .assert()
        .failure();
}
