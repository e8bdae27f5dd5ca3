use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use wait_timeout::ChildExt;

use crate::layout::InstallLayout;

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
pub const VENV_TIMEOUT: Duration = Duration::from_secs(120);
pub const PIP_TIMEOUT: Duration = Duration::from_secs(300);
pub const PLATFORM_SETUP_TIMEOUT: Duration = Duration::from_secs(30);
pub const MEMORY_CHECK_TIMEOUT: Duration = Duration::from_secs(60);

const PLATFORM_SETUP_SCRIPT: [&str; 4] =
    ["skills", "plugin-discovery", "scripts", "platform_setup.py"];
const MEMORY_BOOT_SCRIPT: [&str; 2] = ["execution", "session_boot.py"];

const OUTPUT_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOptions {
    pub timeout: Duration,
    pub stdin: Option<String>,
}

impl ProcessOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            stdin: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub success: bool,
    pub timed_out: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn failure_reason(&self) -> String {
        if self.timed_out {
            return "timed out".to_string();
        }
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            "exited with a failure status".to_string()
        } else {
            stderr.lines().last().unwrap_or(stderr).to_string()
        }
    }
}

/// Runs a child process to completion or until the timeout, killing it in
/// the latter case. Output is read on detached threads; whatever has not
/// arrived shortly after the child exits is dropped.
pub fn run_process(command: &mut Command, options: &ProcessOptions) -> Result<ProcessOutput> {
    let program = command.get_program().to_string_lossy().into_owned();
    command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if options.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

    let mut child = command
        .spawn()
        .with_context(|| format!("{program}: command failed to start"))?;

    if let (Some(input), Some(mut stdin)) = (options.stdin.as_deref(), child.stdin.take()) {
        stdin
            .write_all(input.as_bytes())
            .with_context(|| format!("{program}: failed to write stdin"))?;
    }

    let stdout_reader = child.stdout.take().map(spawn_pipe_reader);
    let stderr_reader = child.stderr.take().map(spawn_pipe_reader);

    let (success, timed_out) = match child
        .wait_timeout(options.timeout)
        .with_context(|| format!("{program}: failed waiting for process"))?
    {
        Some(status) => (status.success(), false),
        None => {
            tracing::warn!(program = %program, timeout = ?options.timeout, "process timed out");
            let _ = child.kill();
            let _ = child.wait();
            (false, true)
        }
    };

    // Grandchildren may still hold the pipes open after the child is gone.
    let deadline = if timed_out {
        Instant::now()
    } else {
        Instant::now() + OUTPUT_GRACE
    };
    let stdout = collect_pipe(stdout_reader, deadline);
    let stderr = collect_pipe(stderr_reader, deadline);

    Ok(ProcessOutput {
        success,
        timed_out,
        stdout,
        stderr,
    })
}

fn spawn_pipe_reader<P>(mut pipe: P) -> Receiver<String>
where
    P: Read + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = String::new();
        let _ = pipe.read_to_string(&mut buf);
        let _ = sender.send(buf);
    });
    receiver
}

fn collect_pipe(reader: Option<Receiver<String>>, deadline: Instant) -> String {
    reader
        .and_then(|receiver| {
            let remaining = deadline.saturating_duration_since(Instant::now());
            receiver.recv_timeout(remaining).ok()
        })
        .unwrap_or_default()
}

pub fn venv_python(layout: &InstallLayout) -> PathBuf {
    if cfg!(windows) {
        layout.venv_dir().join("Scripts").join("python.exe")
    } else {
        layout.venv_dir().join("bin").join("python3")
    }
}

fn venv_pip(layout: &InstallLayout) -> PathBuf {
    if cfg!(windows) {
        layout.venv_dir().join("Scripts").join("pip.exe")
    } else {
        layout.venv_dir().join("bin").join("pip")
    }
}

pub fn activate_hint() -> &'static str {
    if cfg!(windows) {
        ".venv\\Scripts\\activate"
    } else {
        "source .venv/bin/activate"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PythonEnvOutcome {
    AlreadyPresent,
    NoRequirements,
    InterpreterMissing { manual: Vec<String> },
    VenvFailed { reason: String, manual: Vec<String> },
    Ready { dependencies_installed: bool, manual: Vec<String> },
}

/// Creates `.venv` and installs `requirements.txt`. Never fails the run:
/// every problem turns into an outcome with the commands to run by hand.
pub fn bootstrap_python_env<R>(layout: &InstallLayout, mut run: R) -> PythonEnvOutcome
where
    R: FnMut(&mut Command, &ProcessOptions) -> Result<ProcessOutput>,
{
    if layout.venv_dir().exists() {
        return PythonEnvOutcome::AlreadyPresent;
    }
    if !layout.requirements_path().is_file() {
        return PythonEnvOutcome::NoRequirements;
    }

    let interpreter = ["python3", "python"].into_iter().find(|candidate| {
        run(
            Command::new(candidate).arg("--version"),
            &ProcessOptions::with_timeout(PROBE_TIMEOUT),
        )
        .map(|output| output.success)
        .unwrap_or(false)
    });
    let Some(interpreter) = interpreter else {
        return PythonEnvOutcome::InterpreterMissing {
            manual: vec![
                "python3 -m venv .venv".to_string(),
                activate_hint().to_string(),
                "pip install -r requirements.txt".to_string(),
            ],
        };
    };

    let venv = run(
        Command::new(interpreter)
            .arg("-m")
            .arg("venv")
            .arg(layout.venv_dir()),
        &ProcessOptions::with_timeout(VENV_TIMEOUT),
    );
    match venv {
        Ok(output) if output.success => {}
        Ok(output) => {
            return PythonEnvOutcome::VenvFailed {
                reason: output.failure_reason(),
                manual: vec![format!("{interpreter} -m venv .venv")],
            };
        }
        Err(err) => {
            return PythonEnvOutcome::VenvFailed {
                reason: format!("{err:#}"),
                manual: vec![format!("{interpreter} -m venv .venv")],
            };
        }
    }

    let pip = run(
        Command::new(venv_pip(layout))
            .arg("install")
            .arg("-r")
            .arg(layout.requirements_path()),
        &ProcessOptions::with_timeout(PIP_TIMEOUT),
    );
    let dependencies_installed = matches!(pip, Ok(ref output) if output.success);
    let manual = if dependencies_installed {
        Vec::new()
    } else {
        let pip_hint = if cfg!(windows) {
            ".venv\\Scripts\\pip"
        } else {
            ".venv/bin/pip"
        };
        vec![format!("{pip_hint} install -r requirements.txt")]
    };

    PythonEnvOutcome::Ready {
        dependencies_installed,
        manual,
    }
}

fn python_for(layout: &InstallLayout) -> PathBuf {
    let venv = venv_python(layout);
    if venv.exists() {
        venv
    } else {
        PathBuf::from("python3")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformSetupOutcome {
    NotInstalled,
    Completed { stdout: String },
    Failed { reason: String, manual: String },
}

/// Runs the platform setup wizard with `--auto`; when that is rejected the
/// wizard is retried once, answering its confirmation on stdin.
pub fn run_platform_setup<R>(layout: &InstallLayout, mut run: R) -> PlatformSetupOutcome
where
    R: FnMut(&mut Command, &ProcessOptions) -> Result<ProcessOutput>,
{
    let script = PLATFORM_SETUP_SCRIPT
        .iter()
        .fold(layout.root().to_path_buf(), |path, part| path.join(part));
    if !script.is_file() {
        return PlatformSetupOutcome::NotInstalled;
    }
    let python = python_for(layout);

    let auto = run(
        Command::new(&python)
            .arg(&script)
            .arg("--project-dir")
            .arg(layout.root())
            .arg("--auto"),
        &ProcessOptions::with_timeout(PLATFORM_SETUP_TIMEOUT),
    );
    let first_reason = match auto {
        Ok(output) if output.success => {
            return PlatformSetupOutcome::Completed {
                stdout: output.stdout,
            };
        }
        Ok(output) => output.failure_reason(),
        Err(err) => format!("{err:#}"),
    };
    tracing::debug!(reason = %first_reason, "platform setup --auto failed, retrying with stdin");

    let retry = run(
        Command::new(&python)
            .arg(&script)
            .arg("--project-dir")
            .arg(layout.root()),
        &ProcessOptions {
            timeout: PLATFORM_SETUP_TIMEOUT,
            stdin: Some("y\n".to_string()),
        },
    );
    let reason = match retry {
        Ok(output) if output.success => {
            return PlatformSetupOutcome::Completed {
                stdout: output.stdout,
            };
        }
        Ok(output) => output.failure_reason(),
        Err(err) => format!("{err:#}"),
    };

    PlatformSetupOutcome::Failed {
        reason,
        manual: "python3 skills/plugin-discovery/scripts/platform_setup.py --project-dir ."
            .to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryCheckOutcome {
    Skipped,
    Ready,
    NotReady { reason: String },
}

pub fn verify_memory_system<R>(layout: &InstallLayout, mut run: R) -> MemoryCheckOutcome
where
    R: FnMut(&mut Command, &ProcessOptions) -> Result<ProcessOutput>,
{
    let script = MEMORY_BOOT_SCRIPT
        .iter()
        .fold(layout.root().to_path_buf(), |path, part| path.join(part));
    if !script.is_file() {
        return MemoryCheckOutcome::Skipped;
    }

    let output = run(
        Command::new(python_for(layout))
            .arg(&script)
            .arg("--auto-fix")
            .current_dir(layout.root()),
        &ProcessOptions::with_timeout(MEMORY_CHECK_TIMEOUT),
    );
    match output {
        Ok(output) if output.success => MemoryCheckOutcome::Ready,
        Ok(output) => MemoryCheckOutcome::NotReady {
            reason: output.failure_reason(),
        },
        Err(err) => MemoryCheckOutcome::NotReady {
            reason: format!("{err:#}"),
        },
    }
}
