//! Integration tests for inspect-runner

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;

    /// Variables that would leak the developer's setup into a test run
    pub const AMBIENT_ENV: [&str; 9] = [
        "INSPECT_CONFIG",
        "INSPECT_PROFILE",
        "INSPECT_WORKDIR",
        "INSPECT_ARCHES",
        "INSPECT_RELEASE",
        "INSPECT_IS_MODULE",
        "INSPECT_TESTS",
        "INSPECT_LOG_FORMAT",
        "RUST_LOG",
    ];

    pub fn inspect_runner() -> Command {
        let mut cmd = cargo_bin_cmd!("inspect-runner");
        for var in AMBIENT_ENV {
            cmd.env_remove(var);
        }
        cmd
    }

    #[test]
    fn help_displays() {
        inspect_runner()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("differential package inspections"))
            .stdout(predicate::str::contains("<PREVIOUS_TAG>"));
    }

    #[test]
    fn version_displays() {
        inspect_runner()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("inspect-runner"));
    }

    #[test]
    fn missing_arguments_fail() {
        inspect_runner()
            .args(["12345", "f37-updates-candidate"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("TEST_NAME"));
    }
}

#[cfg(unix)]
mod task_tests {
    use super::cli_tests::{inspect_runner, AMBIENT_ENV};
    use predicates::prelude::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::process::{Child, Command as StdCommand, Stdio};
    use std::thread;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    const KOJI: &str = r#"#!/bin/sh
case "$1" in
  call)
    echo '[{"build_id": 2001, "nvr": "foo-1.2-3.fc37", "task_id": 12345}]'
    ;;
  list-tagged)
    case "$*" in
      *--latest-n=1*)
        echo "foo-1.2-3.fc37    f37-updates-candidate    bodhi"
        ;;
      *)
        echo "foo-1.2-3.fc37    f37-updates-candidate    bodhi"
        echo "foo-1.1-2.fc37    f37                      releng"
        ;;
    esac
    ;;
  *)
    exit 1
    ;;
esac
"#;

    const ENGINE: &str = r#"#!/bin/sh
dir=$(dirname "$0")
echo run >> "$dir/engine_runs"
echo "$@" > "$dir/engine_args"
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; fi
  shift
done
cat > "$out" <<'JSON'
{
  "license": [{"result": "OK", "message": "License tags are valid"}],
  "changedfiles": [{"result": "BAD", "message": "/usr/lib64/libfoo.so.1 removed"}],
  "badfuncs": [{"result": "VERIFY", "message": "gethostbyname called"}]
}
JSON
exit 1
"#;

    /// Stalls on its first run only, so a step can be interrupted mid-run
    const STALLING_ENGINE: &str = r#"#!/bin/sh
dir=$(dirname "$0")
echo run >> "$dir/engine_runs"
if [ "$(wc -l < "$dir/engine_runs")" -eq 1 ]; then
  sleep 30
fi
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; fi
  shift
done
echo '{"license": [{"result": "OK", "message": "License tags are valid"}]}' > "$out"
"#;

    struct Setup {
        dir: TempDir,
        config: PathBuf,
    }

    impl Setup {
        fn new(koji: &str) -> Self {
            Self::with_engine(koji, ENGINE)
        }

        fn with_engine(koji: &str, engine: &str) -> Self {
            let dir = TempDir::new().unwrap();
            let koji_path = script(dir.path(), "koji", koji);
            let engine_path = script(dir.path(), "engine", engine);
            let config = dir.path().join("config.toml");
            fs::write(
                &config,
                format!(
                    r#"
[build_system]
command = "{}"
retries = 0
retry_delay_secs = 0

[engine]
command = "{}"

[cache]
lock_timeout_secs = 10

[inspections]
badfuncs = false

[descriptions]
license = "Verify license tags"
"#,
                    koji_path.display(),
                    engine_path.display()
                ),
            )
            .unwrap();
            Self { dir, config }
        }

        fn step(&self, test_name: &str) -> assert_cmd::assert::Assert {
            inspect_runner()
                .arg("--config")
                .arg(&self.config)
                .arg("--workdir")
                .arg(self.dir.path().join("work"))
                .args(["12345", "f37-updates-candidate", test_name])
                .assert()
        }

        fn spawn_step(&self, test_name: &str) -> Child {
            let mut cmd = StdCommand::new(env!("CARGO_BIN_EXE_inspect-runner"));
            for var in AMBIENT_ENV {
                cmd.env_remove(var);
            }
            cmd.arg("--config")
                .arg(&self.config)
                .arg("--workdir")
                .arg(self.dir.path().join("work"))
                .args(["12345", "f37-updates-candidate", test_name])
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .unwrap()
        }

        fn engine_runs(&self) -> usize {
            fs::read_to_string(self.dir.path().join("engine_runs"))
                .map(|s| s.lines().count())
                .unwrap_or(0)
        }
    }

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn steps_share_one_engine_run() {
        let setup = Setup::new(KOJI);

        setup
            .step("license")
            .code(0)
            .stdout(predicate::str::contains("foo-1.2-3.fc37"))
            .stdout(predicate::str::contains("foo-1.1-2.fc37"))
            .stdout(predicate::str::contains("Verify license tags"))
            .stdout(predicate::str::contains("license: PASSED"));

        setup
            .step("changedfiles")
            .code(1)
            .stdout(predicate::str::contains("BAD: /usr/lib64/libfoo.so.1 removed"))
            .stdout(predicate::str::contains("changedfiles: FAILED"));

        assert_eq!(setup.engine_runs(), 1);

        let args = fs::read_to_string(setup.dir.path().join("engine_args")).unwrap();
        assert!(args.trim_end().ends_with("foo-1.1-2.fc37 foo-1.2-3.fc37"));

        let task_dir = setup.dir.path().join("work/12345");
        assert!(task_dir.join("cached").exists());
        let events = fs::read_to_string(task_dir.join("events.log")).unwrap();
        assert!(events.contains("lineage.resolved"));
    }

    #[test]
    fn disabled_inspection_passes() {
        let setup = Setup::new(KOJI);

        setup
            .step("badfuncs")
            .code(0)
            .stdout(predicate::str::contains("badfuncs inspection is disabled"));
    }

    #[test]
    fn missing_inspection_is_skipped() {
        let setup = Setup::new(KOJI);

        setup
            .step("kmod")
            .code(0)
            .stdout(predicate::str::contains("kmod inspection was skipped"));
    }

    #[test]
    fn lookup_failure_is_infra_error() {
        let setup = Setup::new("#!/bin/sh\necho 'connection refused' >&2\nexit 1\n");

        setup
            .step("license")
            .code(2)
            .stderr(predicate::str::contains("Lineage lookup failed"))
            .stderr(predicate::str::contains("Hint:"));

        assert_eq!(setup.engine_runs(), 0);
        assert!(!setup.dir.path().join("work/12345/cached").exists());
    }

    #[test]
    fn terminated_step_reports_infra_error() {
        let setup = Setup::with_engine(KOJI, STALLING_ENGINE);
        let child = setup.spawn_step("license");

        let started = Instant::now();
        while setup.engine_runs() == 0 {
            assert!(
                started.elapsed() < Duration::from_secs(20),
                "engine never started"
            );
            thread::sleep(Duration::from_millis(50));
        }

        // SAFETY: plain syscall on a child we spawned and have not reaped.
        let rc = unsafe { libc::kill(child.id() as libc::pid_t, libc::SIGTERM) };
        assert_eq!(rc, 0);

        let output = child.wait_with_output().unwrap();
        assert_eq!(output.status.code(), Some(2));
        assert!(String::from_utf8_lossy(&output.stderr).contains("Interrupted by SIGTERM"));

        let task_dir = setup.dir.path().join("work/12345");
        assert!(!task_dir.join("cached").exists());

        // The run lock is free again: the next step claims and completes the run
        setup
            .step("license")
            .code(0)
            .stdout(predicate::str::contains("license: PASSED"));
        assert_eq!(setup.engine_runs(), 2);
        assert!(task_dir.join("cached").exists());
    }
}
