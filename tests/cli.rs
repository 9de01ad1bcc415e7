use assert_cmd::Command;
use predicates::prelude::*;

fn linkscribe() -> Command {
    Command::cargo_bin("linkscribe").unwrap()
}

#[test]
fn platforms_lists_every_supported_site() {
    linkscribe()
        .arg("platforms")
        .assert()
        .success()
        .stdout(predicate::str::contains("bilibili"))
        .stdout(predicate::str::contains("youtube"))
        .stdout(predicate::str::contains("direct-link"));
}

#[test]
fn help_describes_subcommands() {
    linkscribe()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("transcribe"))
        .stdout(predicate::str::contains("serve"));
}

#[test]
fn transcribe_requires_a_link() {
    linkscribe()
        .arg("transcribe")
        .assert()
        .failure()
        .stderr(predicate::str::contains("URL_OR_TEXT"));
}

#[test]
fn unknown_task_is_rejected() {
    linkscribe()
        .args(["transcribe", "https://youtu.be/dQw4w9WgXcQ", "--task", "translate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}
