//! `clockke` binary: exit codes and output

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use clockke_config::parse;
use clockke_types::Manifest;
use tempfile::tempdir;

/// Run the binary with a private HOME and no manifest override in the environment.
fn clockke(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_clockke"))
        .args(args)
        .env("HOME", home)
        .env_remove("CLOCKKE_MANIFEST")
        .env("RUST_LOG", "warn")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn run_ticks(home: &Path, out: &Path, extra: &[&str]) -> Output {
    let out = out.to_str().unwrap();
    let mut args = vec!["run", "--tick-ms", "1", "--ticks", "3", "--noise", "0", "--out", out];
    args.extend_from_slice(extra);
    clockke(home, &args)
}

#[test]
fn run_then_verify_succeeds() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("stamps.csv");

    let run = run_ticks(dir.path(), &out, &[]);
    assert!(run.status.success(), "{}", String::from_utf8_lossy(&run.stderr));
    let lines: Vec<_> = stdout(&run).lines().map(str::to_owned).collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("0001  "));
    assert!(lines[0].contains("align=+0.020000000"));

    let verify = clockke(dir.path(), &["verify", out.to_str().unwrap()]);
    assert_eq!(verify.status.code(), Some(0));
    assert!(stdout(&verify).starts_with("VERIFIED rows=3 manifest=CLOCKKE.DEFAULT.V2_1 hash=sha256 head="));
}

#[test]
fn rerun_refuses_then_resume_extends() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("stamps.jsonl");

    assert!(run_ticks(dir.path(), &out, &[]).status.success());
    assert_eq!(run_ticks(dir.path(), &out, &[]).status.code(), Some(2));
    assert!(run_ticks(dir.path(), &out, &["--resume"]).status.success());

    let verify = clockke(dir.path(), &["verify", out.to_str().unwrap()]);
    assert_eq!(verify.status.code(), Some(0));
    assert!(stdout(&verify).starts_with("VERIFIED rows=6 "));
}

#[test]
fn tampered_file_exits_one() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("stamps.csv");
    assert!(run_ticks(dir.path(), &out, &[]).status.success());

    let text = fs::read_to_string(&out).unwrap();
    let tampered = text.replacen(",C,", ",B,", 1);
    assert_ne!(text, tampered);
    fs::write(&out, tampered).unwrap();

    let verify = clockke(dir.path(), &["verify", out.to_str().unwrap()]);
    assert_eq!(verify.status.code(), Some(1));
    let report = stdout(&verify);
    assert!(report.starts_with("INVALID row=1 reason=BandMismatch"), "{report}");
    assert!(report.contains("row=3 reason=ChainBroken downstream_of=1 locally_linked=true"));
}

#[test]
fn empty_file_verifies_as_empty() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("stamps.csv");
    fs::write(&out, "").unwrap();
    let verify = clockke(dir.path(), &["verify", out.to_str().unwrap()]);
    assert_eq!(verify.status.code(), Some(0));
    assert_eq!(stdout(&verify).trim_end(), "VERIFIED rows=0 (empty sequence)");
}

#[test]
fn io_and_config_errors_exit_two() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.csv");
    assert_eq!(
        clockke(dir.path(), &["verify", missing.to_str().unwrap()]).status.code(),
        Some(2)
    );

    let bad = dir.path().join("bad.toml");
    fs::write(&bad, "[manifest]\ndecay_w = 2.0\n").unwrap();
    let output = clockke(dir.path(), &["manifest", "--manifest", bad.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("decay_w"));

    assert_eq!(clockke(dir.path(), &["bogus"]).status.code(), Some(2));
}

#[test]
fn manifest_write_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("manifest.toml");

    let printed = clockke(dir.path(), &["manifest"]);
    assert!(printed.status.success());

    let written = clockke(dir.path(), &["manifest", "--write", path.to_str().unwrap()]);
    assert!(written.status.success());
    let text = fs::read_to_string(&path).unwrap();
    assert_eq!(text, stdout(&printed));

    let (manifest, _) = parse(&text, &path).unwrap();
    assert_eq!(manifest, Manifest::default());
}

#[test]
fn home_manifest_is_picked_up() {
    let dir = tempdir().unwrap();
    let config_dir = dir.path().join(".clockke");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("manifest.toml"),
        "[manifest]\nmanifest_id = \"HOME.1\"\nstamp_hash = \"crc32\"\n",
    )
    .unwrap();

    let out = dir.path().join("stamps.csv");
    assert!(run_ticks(dir.path(), &out, &[]).status.success());
    let verify = clockke(dir.path(), &["verify", out.to_str().unwrap()]);
    assert_eq!(verify.status.code(), Some(0));
    assert!(stdout(&verify).starts_with("VERIFIED rows=3 manifest=HOME.1 hash=crc32 "));
}

#[test]
fn unusable_manifest_cadence_exits_two() {
    for tick_ms in ["1e-7", "1e30"] {
        let dir = tempdir().unwrap();
        let manifest = dir.path().join("manifest.toml");
        fs::write(&manifest, format!("[manifest]\ntick_ms = {tick_ms}\n")).unwrap();

        let out = dir.path().join("stamps.csv");
        let output = clockke(
            dir.path(),
            &[
                "run",
                "--manifest",
                manifest.to_str().unwrap(),
                "--ticks",
                "1",
                "--out",
                out.to_str().unwrap(),
            ],
        );
        assert_eq!(output.status.code(), Some(2), "tick_ms = {tick_ms}");
        assert!(String::from_utf8_lossy(&output.stderr).contains("tick_ms"));
        assert!(!out.exists());
    }
}
