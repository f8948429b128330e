use std::ffi::{OsStr, OsString};
use std::process::{Command, Stdio};

use crate::buildid::warn::{self, WarnCode, WarnEvent};

/// `$0` seen by probe scripts; it prefixes the shell's own diagnostics, so it
/// must stay fixed for "not found" text to be reproducible.
pub const PROBE_SCRIPT_NAME: &str = "build-id-probe";

/// Runs one external tool and returns everything it printed.
pub trait ProbeRunner {
    /// Stdout and stderr come back as one stream in the order written. Never
    /// fails: spawn errors and non-zero exits are reported as text.
    fn run(&self, command: &OsStr, args: &[&str]) -> Vec<u8>;
}

#[derive(Debug, Clone)]
pub struct ShellProbeRunner {
    shell: String,
    verbose: bool,
}

impl ShellProbeRunner {
    pub fn new(shell: impl Into<String>, verbose: bool) -> Self {
        Self {
            shell: shell.into(),
            verbose,
        }
    }

    /// The configured command is spliced in unquoted, the same way a
    /// Makefile expands `$(CC)`.
    fn script(command: &OsStr) -> OsString {
        let mut script = OsString::from("exec 2>&1\n");
        script.push(command);
        script.push(" \"$@\"");
        script
    }

    fn describe(command: &OsStr, args: &[&str]) -> String {
        let command = command.to_string_lossy();
        let mut parts = vec![command.trim()];
        parts.extend_from_slice(args);
        parts.join(" ")
    }
}

impl ProbeRunner for ShellProbeRunner {
    fn run(&self, command: &OsStr, args: &[&str]) -> Vec<u8> {
        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(Self::script(command))
            .arg(PROBE_SCRIPT_NAME)
            .args(args)
            .stdin(Stdio::null())
            .output();

        let output = match output {
            Ok(output) => output,
            Err(err) => {
                if self.verbose {
                    warn::emit(WarnEvent {
                        code: WarnCode::W001ProbeSpawnFailed,
                        stage: "probe",
                        probe: &Self::describe(command, args),
                        status: "spawn-failed",
                        reason: &err.to_string(),
                    });
                }
                return format!("{PROBE_SCRIPT_NAME}: cannot run {}: {err}\n", self.shell)
                    .into_bytes();
            }
        };

        if self.verbose && !output.status.success() {
            warn::emit(WarnEvent {
                code: WarnCode::W002ProbeNonZeroExit,
                stage: "probe",
                probe: &Self::describe(command, args),
                status: &output.status.to_string(),
                reason: "output-captured",
            });
        }

        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);
        combined
    }
}
