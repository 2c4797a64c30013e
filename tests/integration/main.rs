//! Integration tests for swift-sh

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    use predicates::prelude::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    /// Stand-in for the Swift toolchain
    ///
    /// `swift run --repl ...` prints a REPL line like the real driver; any
    /// other call prints its arguments, echoes piped scripts, and exits 3.
    const FAKE_SWIFT: &str = r#"#!/bin/sh
if [ "$1" = "run" ]; then
    mkdir -p .build
    echo "Building for debugging..."
    echo "swift-frontend: repl -I $PWD/.build/debug -L $PWD/.build/debug -lSwiftSH_Deps"
    exit 0
fi
echo "ARGS: $*"
for a in "$@"; do
    if [ "$a" = "-" ]; then cat; fi
done
exit 3
"#;

    struct Sandbox {
        dir: TempDir,
    }

    impl Sandbox {
        fn new() -> Self {
            Self::with_swift(FAKE_SWIFT)
        }

        fn with_swift(fake: &str) -> Self {
            let dir = TempDir::new().unwrap();
            let swift = dir.path().join("swift");
            std::fs::write(&swift, fake).unwrap();
            std::fs::set_permissions(&swift, std::fs::Permissions::from_mode(0o755)).unwrap();
            std::fs::write(
                dir.path().join("config.toml"),
                format!(
                    "[toolchain]\nswift_path = \"{}\"\n\n[cache]\nroot = \"{}\"\n",
                    swift.display(),
                    dir.path().join("cache").display()
                ),
            )
            .unwrap();
            Self { dir }
        }

        fn path(&self) -> &Path {
            self.dir.path()
        }

        fn cache(&self) -> PathBuf {
            self.path().join("cache")
        }

        fn script(&self, name: &str, content: &str) -> PathBuf {
            let path = self.path().join(name);
            std::fs::write(&path, content).unwrap();
            path
        }

        fn cmd(&self) -> Command {
            let mut cmd = swift_sh();
            cmd.env_remove("SWIFT_SH_CONFIG")
                .env_remove("RUST_LOG")
                .arg("--config")
                .arg(self.path().join("config.toml"));
            cmd
        }
    }

    fn swift_sh() -> Command {
        cargo_bin_cmd!("swift-sh")
    }

    #[test]
    fn help_displays() {
        swift_sh()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Run Swift scripts"));
    }

    #[test]
    fn version_displays() {
        swift_sh()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("swift-sh"));
    }

    #[test]
    fn config_path() {
        let sandbox = Sandbox::new();
        sandbox
            .cmd()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let sandbox = Sandbox::new();
        sandbox
            .cmd()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[toolchain]"))
            .stdout(predicate::str::contains("staleness_hours = 168"));
    }

    #[test]
    fn invalid_config_exits_with_config_code() {
        let sandbox = Sandbox::new();
        std::fs::write(sandbox.path().join("config.toml"), "[cache\n").unwrap();
        sandbox
            .cmd()
            .args(["config", "show"])
            .assert()
            .code(5)
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn directory_script_is_rejected() {
        let sandbox = Sandbox::new();
        sandbox
            .cmd()
            .arg(sandbox.path())
            .assert()
            .code(2)
            .stderr(predicate::str::contains("is a directory"));
    }

    #[test]
    fn missing_script_is_rejected() {
        let sandbox = Sandbox::new();
        sandbox
            .cmd()
            .arg(sandbox.path().join("nope.swift"))
            .assert()
            .code(2)
            .stderr(predicate::str::contains("Script not found"));
    }

    #[test]
    fn script_without_dependencies_runs_directly() {
        let sandbox = Sandbox::new();
        let script = sandbox.script("hello.swift", "print(\"hi\")\n");

        sandbox
            .cmd()
            .arg(&script)
            .args(["--flag", "value"])
            .assert()
            .code(3)
            .stdout(predicate::str::contains(format!(
                "ARGS: {} --flag value",
                script.display()
            )));

        assert!(!sandbox.cache().join("store").exists());
    }

    #[test]
    fn script_with_dependencies_gets_resolved_invocation() {
        let sandbox = Sandbox::new();
        let script = sandbox.script(
            "deps.swift",
            "import Foundation\nimport ArgumentParser // apple/swift-argument-parser ~> 1.2\n",
        );

        sandbox
            .cmd()
            .arg(&script)
            .arg("first")
            .assert()
            .code(3)
            .stdout(predicate::str::contains("-lSwiftSH_Deps"))
            .stdout(predicate::str::contains(format!("{} first", script.display())));

        let entries: Vec<_> = std::fs::read_dir(sandbox.cache().join("store"))
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
        let markers: Vec<_> = std::fs::read_dir(sandbox.cache().join("markers"))
            .unwrap()
            .collect();
        assert_eq!(markers.len(), 1);
    }

    #[test]
    fn stdin_script_is_piped_through() {
        let sandbox = Sandbox::new();
        sandbox
            .cmd()
            .arg("-")
            .write_stdin("print(\"from stdin\")\n")
            .assert()
            .code(3)
            .stdout(predicate::str::contains("ARGS: -"))
            .stdout(predicate::str::contains("print(\"from stdin\")"));
    }

    #[test]
    fn missing_toolchain_is_reported() {
        let sandbox = Sandbox::new();
        let script = sandbox.script("hello.swift", "print(1)\n");
        sandbox
            .cmd()
            .args(["--swift-path", "/nonexistent/swift"])
            .arg(&script)
            .assert()
            .code(3)
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn build_rejects_script_without_extension() {
        let sandbox = Sandbox::new();
        let script = sandbox.script("tool", "print(1)\n");
        sandbox
            .cmd()
            .arg("build")
            .arg(&script)
            .assert()
            .code(2)
            .stderr(predicate::str::contains("does not have an extension"));
    }

    #[test]
    fn clean_all_removes_cache() {
        let sandbox = Sandbox::new();
        let script = sandbox.script("deps.swift", "import Foo // @alice/foo ~> 1.0\n");
        sandbox.cmd().arg(&script).assert().code(3);
        assert!(sandbox.cache().exists());

        sandbox
            .cmd()
            .args(["clean", "all", "--dry-run"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Dry run"));
        assert!(sandbox.cache().exists());

        sandbox.cmd().args(["clean", "all"]).assert().success();
        assert!(!sandbox.cache().exists());
    }

    #[test]
    fn clean_empty_cache() {
        let sandbox = Sandbox::new();
        sandbox
            .cmd()
            .arg("clean")
            .assert()
            .success()
            .stdout(predicate::str::contains("Nothing to clean"));
    }

    #[test]
    fn completions_generate() {
        swift_sh()
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("swift-sh"));
    }

    #[test]
    fn terminated_during_resolution_cleans_up() {
        let sandbox = Sandbox::with_swift(
            "#!/bin/sh\nif [ \"$1\" = \"run\" ]; then\n    echo $$ > \"$RESOLVER_PID_FILE\"\n    exec sleep 30\nfi\nexit 3\n",
        );
        let tmp = sandbox.path().join("tmp");
        std::fs::create_dir(&tmp).unwrap();
        let pid_file = sandbox.path().join("swift.pid");

        let mut child = std::process::Command::new(env!("CARGO_BIN_EXE_swift-sh"))
            .env_remove("SWIFT_SH_CONFIG")
            .env_remove("RUST_LOG")
            .env("TMPDIR", &tmp)
            .env("RESOLVER_PID_FILE", &pid_file)
            .arg("--config")
            .arg(sandbox.path().join("config.toml"))
            .args(["-c", "import Foo // @alice/foo ~> 1.0\n"])
            .stdin(std::process::Stdio::null())
            .spawn()
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(30);
        let resolver = loop {
            let pid = std::fs::read_to_string(&pid_file)
                .ok()
                .and_then(|s| s.trim().parse::<i32>().ok());
            if let Some(pid) = pid {
                break Pid::from_raw(pid);
            }
            assert!(Instant::now() < deadline, "resolution never started");
            std::thread::sleep(Duration::from_millis(20));
        };

        kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM).unwrap();
        let status = child.wait().unwrap();

        assert_eq!(status.code(), Some(143));
        assert!(kill(resolver, None).is_err());
        let leftovers: Vec<_> = std::fs::read_dir(&tmp)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("swift-sh-inline-content-"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
