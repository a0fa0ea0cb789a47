mod common;

use std::fs;

use herder::utils::pidfile::{is_alive, read_pid};
use predicates::prelude::*;

fn write_herd(dir: &std::path::Path, body: &str) {
  fs::write(dir.join("herd.toml"), body).unwrap();
}

#[test]
fn help_lists_subcommands() {
  let dir = common::tempdir();
  common::herder(dir.path())
    .arg("--help")
    .assert()
    .success()
    .stdout(
      predicate::str::contains("up")
        .and(predicate::str::contains("down"))
        .and(predicate::str::contains("list")),
    );
}

#[test]
fn missing_herd_file_fails() {
  let dir = common::tempdir();
  common::herder(dir.path())
    .arg("list")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("no herd.toml found"));
}

#[test]
fn invalid_record_is_reported_before_anything_runs() {
  let dir = common::tempdir();
  write_herd(
    dir.path(),
    "[[daemon]]\nname = \"x\"\nexec = \"/bin/sleep\"\neval = \"/bin/sleep\"\n",
  );
  common::herder(dir.path())
    .arg("up")
    .assert()
    .failure()
    .stderr(predicate::str::contains("mutually exclusive"));
}

#[test]
fn unknown_keys_are_warned_about() {
  let dir = common::tempdir();
  write_herd(
    dir.path(),
    "tmp_dir = \"x\"\n[[daemon]]\nname = \"x\"\nstart_command = \"true\"\nstop_command = \"true\"\n",
  );
  common::herder(dir.path())
    .arg("list")
    .assert()
    .success()
    .stderr(predicate::str::contains("unknown config key 'tmp_dir'"));
}

#[test]
fn list_shows_declared_daemons() {
  let dir = common::tempdir();
  let tmp = dir.path().join("run");
  fs::create_dir_all(&tmp).unwrap();
  write_herd(
    dir.path(),
    &format!(
      "temp_dir = \"{}\"\n[[daemon]]\nname = \"db\"\nstart_command = \"true\"\nstop_command = \"true\"\n[[daemon]]\nname = \"web\"\nidentifier = \"frontend\"\nstart_command = \"true\"\nstop_command = \"true\"\n",
      tmp.display()
    ),
  );
  common::herder(dir.path())
    .arg("list")
    .assert()
    .success()
    .stdout(
      predicate::str::contains("DAEMON")
        .and(predicate::str::contains("db"))
        .and(predicate::str::contains("frontend"))
        .and(predicate::str::contains("stopped"))
        .and(predicate::str::contains(tmp.join("db.output").display().to_string())),
    );
}

#[test]
fn explicit_config_flag_wins() {
  let dir = common::tempdir();
  write_herd(dir.path(), "[[daemon]]\nname = \"local\"\nstart_command = \"true\"\nstop_command = \"true\"\n");
  fs::write(
    dir.path().join("other.toml"),
    "[[daemon]]\nname = \"other\"\nstart_command = \"true\"\nstop_command = \"true\"\n",
  )
  .unwrap();
  common::herder(dir.path())
    .args(["list", "-c", "other.toml"])
    .assert()
    .success()
    .stdout(predicate::str::contains("other").and(predicate::str::contains("local").not()));
}

#[test]
fn up_with_failing_start_command_fails() {
  let dir = common::tempdir();
  let tmp = dir.path().join("run");
  fs::create_dir_all(&tmp).unwrap();
  write_herd(
    dir.path(),
    &format!(
      "temp_dir = \"{}\"\n[[daemon]]\nname = \"x\"\nstart_command = \"false\"\nstop_command = \"true\"\n",
      tmp.display()
    ),
  );
  common::herder(dir.path())
    .arg("up")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("command for 'x' failed"));
}

#[test]
fn up_and_down_drive_the_runner() {
  if common::running_as_root() {
    // Root needs a user per daemon, which needs sudo.
    return;
  }
  let dir = common::tempdir();
  let tmp = dir.path().join("run");
  fs::create_dir_all(&tmp).unwrap();
  let slow = common::write_script(
    dir.path(),
    "slow-exit",
    "trap 'sleep 0.5; exit 0' TERM\nwhile :; do sleep 0.05; done",
  );
  write_herd(
    dir.path(),
    &format!(
      "temp_dir = \"{}\"\nrunner = \"{}\"\n[[daemon]]\nname = \"first\"\nexec = \"/bin/sleep 30\"\n[[daemon]]\nname = \"second\"\nexec = \"/bin/sleep\"\nargs = [\"30\"]\n[[daemon]]\nname = \"third\"\nexec = \"{}\"\n",
      tmp.display(),
      common::runner_bin(),
      slow.display()
    ),
  );

  common::herder(dir.path())
    .arg("up")
    .assert()
    .success()
    .stdout(
      predicate::str::contains("Started 'first'")
        .and(predicate::str::contains("Started 'second'"))
        .and(predicate::str::contains("Started 'third'")),
    );
  let pids: Vec<i32> = ["first", "second", "third"]
    .iter()
    .map(|name| {
      read_pid(&tmp.join(format!("{name}.pid")))
        .unwrap()
        .expect("pid file written")
    })
    .collect();
  assert!(pids.iter().all(|pid| is_alive(*pid)));

  common::herder(dir.path())
    .arg("list")
    .assert()
    .success()
    .stdout(predicate::str::contains("running"));

  common::herder(dir.path())
    .arg("down")
    .assert()
    .success()
    .stdout(predicate::str::contains("Stopped 'first'"));

  // `down` returns only once every daemon is gone.
  for (name, pid) in ["first", "second", "third"].iter().zip(&pids) {
    assert!(!tmp.join(format!("{name}.pid")).exists(), "{name} pid file left");
    assert!(!is_alive(*pid), "{name} still running after down");
  }
}

#[test]
fn init_writes_template_once() {
  let dir = common::tempdir();
  common::herder(dir.path())
    .arg("init")
    .assert()
    .success()
    .stdout(predicate::str::contains("Created"));
  let text = fs::read_to_string(dir.path().join("herd.toml")).unwrap();
  assert!(text.contains("[[daemon]]"));

  common::herder(dir.path())
    .arg("list")
    .assert()
    .success()
    .stdout(predicate::str::contains("DAEMON"));

  common::herder(dir.path())
    .arg("init")
    .assert()
    .failure()
    .stderr(predicate::str::contains("already exists"));
}
