use std::io::{BufRead, Write};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::app::EngineEvent;
use crate::config::EngineConfig;
use crate::models::{ResultKind, RunSummary, TestEntry, TestNode, TestOutcome};

use super::{LoadResult, TestEngine};

/// A running engine host. Dropping it SIGKILLs the host's process group, so
/// workers the host forked go down with it.
struct HostProcess {
    child: Option<Child>,
    #[cfg(unix)]
    group: Option<libc::pid_t>,
}

impl HostProcess {
    fn new(child: Child) -> Self {
        Self {
            #[cfg(unix)]
            group: child.id().and_then(|id| libc::pid_t::try_from(id).ok()),
            child: Some(child),
        }
    }

    /// Reap the host after it exits on its own. Nothing is killed afterwards.
    async fn wait(&mut self) -> Result<ExitStatus> {
        let Some(mut child) = self.child.take() else {
            bail!("engine process already reaped");
        };
        child.wait().await.context("failed to wait for engine")
    }
}

impl Drop for HostProcess {
    fn drop(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        #[cfg(unix)]
        if let Some(group) = self.group {
            // The host leads its own group (`process_group(0)` at spawn).
            unsafe { libc::killpg(group, libc::SIGKILL) };
        }
        let _ = child.start_kill();
    }
}

/// Engine adapter that drives an external test host speaking NDJSON.
///
/// `<command> list <assemblies>` prints the test tree as one JSON document.
/// `<command> run --tests <file> <assemblies>` runs the full names listed in
/// `file` and reports progress as one JSON event per stdout line. Any other
/// output, on stdout or stderr, is treated as text written by the tests.
pub struct ProcessEngine {
    config: EngineConfig,
}

impl ProcessEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    fn command(&self, verb: &str) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .arg(verb)
            .current_dir(&self.config.working_dir)
            .kill_on_drop(true);
        cmd
    }

    /// Write the planned full names to a temp file, one per line.
    fn write_selection(&self, plan: &[TestEntry]) -> Result<tempfile::NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix("runway-selection-")
            .suffix(".txt")
            .tempfile()
            .context("failed to create selection file")?;
        for entry in plan {
            writeln!(file, "{}", entry.full_name).context("failed to write selection file")?;
        }
        file.flush().context("failed to flush selection file")?;
        Ok(file)
    }

    /// Start the host with stdout and stderr on one pipe, so text a test writes
    /// to either stream stays in order with the events around it. Lines are
    /// read on a blocking task and handed over in order.
    fn spawn_host(
        &self,
        mut cmd: Command,
    ) -> Result<(HostProcess, mpsc::UnboundedReceiver<String>)> {
        let (reader, writer) = std::io::pipe().context("failed to create engine output pipe")?;
        let err_writer = writer.try_clone().context("failed to duplicate engine output pipe")?;

        // Own process group so stopping the run also takes out forked workers.
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }
        tracing::debug!(command = ?cmd.as_std(), "spawning engine");

        let child = cmd
            .stdin(Stdio::null())
            .stdout(writer)
            .stderr(err_writer)
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.config.program))?;
        // The command still holds the write ends; EOF needs them closed.
        drop(cmd);

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::task::spawn_blocking(move || {
            for line in std::io::BufReader::new(reader).lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to read engine output");
                        break;
                    }
                }
            }
        });

        Ok((HostProcess::new(child), rx))
    }
}

#[async_trait]
impl TestEngine for ProcessEngine {
    async fn discover(&self) -> Result<TestNode> {
        let output = self
            .command("list")
            .args(&self.config.assemblies)
            .output()
            .await
            .with_context(|| format!("failed to run `{} list`", self.config.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("test discovery failed: {}", stderr.trim());
        }

        serde_json::from_slice(&output.stdout).context("failed to parse engine test tree")
    }

    async fn load(&self, plan: &[TestEntry]) -> Result<LoadResult> {
        if plan.is_empty() {
            bail!("nothing to load");
        }
        for assembly in &self.config.assemblies {
            if !assembly.is_file() {
                bail!("test assembly {} is missing", assembly.display());
            }
        }
        Ok(LoadResult {
            test_count: plan.len(),
        })
    }

    async fn run(
        &self,
        plan: &[TestEntry],
        tx: mpsc::UnboundedSender<EngineEvent>,
        cancel: CancellationToken,
    ) -> Result<RunSummary> {
        let selection = self.write_selection(plan)?;

        let mut cmd = self.command("run");
        cmd.arg("--tests")
            .arg(selection.path())
            .args(&self.config.assemblies);
        let (mut host, mut output) = self.spawn_host(cmd)?;

        let mut tally = RunSummary::default();
        let mut in_flight: Option<String> = None;
        let mut cancelling = false;
        let mut finished: Option<RunSummary> = None;
        let mut failure: Option<String> = None;

        loop {
            let line = tokio::select! {
                biased;
                _ = cancel.cancelled(), if !cancelling => {
                    cancelling = true;
                    match in_flight {
                        Some(ref id) => {
                            tracing::debug!(
                                test = %id,
                                "cancellation requested, letting test finish"
                            );
                            continue;
                        }
                        None => break,
                    }
                }
                line = output.recv() => match line {
                    Some(line) => line,
                    None => break,
                },
            };

            tracing::trace!(line = %line, "engine");
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let Ok(event) = serde_json::from_str::<WireEvent>(trimmed) else {
                let _ = tx.send(EngineEvent::Output { text: line });
                continue;
            };

            match event {
                WireEvent::RunStarted { total } => {
                    let _ = tx.send(EngineEvent::RunStarted { total });
                }
                WireEvent::TestStarted { id } => {
                    if cancelling {
                        break;
                    }
                    in_flight = Some(id.clone());
                    let _ = tx.send(EngineEvent::TestStarted { id });
                }
                WireEvent::TestFinished(finished_test) => {
                    in_flight = None;
                    let outcome = finished_test.into_outcome();
                    tally.record(outcome.kind, outcome.elapsed);
                    let _ = tx.send(EngineEvent::TestFinished { outcome });
                    if cancelling {
                        break;
                    }
                }
                WireEvent::RunFinished(summary) => {
                    finished = Some(summary);
                }
                WireEvent::RunFailed { message } => {
                    let _ = tx.send(EngineEvent::RunFailed {
                        message: message.clone(),
                    });
                    failure = Some(message);
                }
            }
        }

        if cancelling {
            // Stop the host before it gets any further.
            drop(host);
            tracing::debug!(completed = tally.total, "engine stopped after cancellation");
            let _ = tx.send(EngineEvent::RunFinished { summary: tally });
            return Ok(tally);
        }

        let status = host.wait().await?;
        // The selection file must outlive the host.
        drop(selection);

        if let Some(message) = failure {
            bail!(message);
        }
        if finished.is_none() && !status.success() {
            bail!(
                "{} exited with code {}",
                self.config.program,
                status.code().unwrap_or(-1)
            );
        }

        let summary = finished.unwrap_or(tally);
        let _ = tx.send(EngineEvent::RunFinished { summary });
        Ok(summary)
    }

    fn name(&self) -> &str {
        &self.config.program
    }
}

// --- NDJSON deserialization types ---

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum WireEvent {
    RunStarted { total: usize },
    TestStarted { id: String },
    TestFinished(WireOutcome),
    RunFinished(RunSummary),
    RunFailed { message: String },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireOutcome {
    id: String,
    full_name: String,
    #[serde(default)]
    fixture: String,
    #[serde(default)]
    method: String,
    #[serde(default)]
    description: Option<String>,
    result: ResultKind,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    stack_trace: Option<String>,
    /// Seconds.
    #[serde(default)]
    duration: Option<f64>,
}

impl WireOutcome {
    fn into_outcome(self) -> TestOutcome {
        let stack_trace = match self.result {
            ResultKind::Error => self.stack_trace.map(|s| strip_ansi(&s)),
            _ => None,
        };
        TestOutcome {
            test_id: self.id,
            full_name: self.full_name,
            fixture_name: self.fixture,
            method_name: self.method,
            description: self.description.unwrap_or_default(),
            kind: self.result,
            message: strip_ansi(&self.message.unwrap_or_default()),
            stack_trace,
            elapsed: self
                .duration
                .and_then(|d| Duration::try_from_secs_f64(d).ok())
                .unwrap_or_default(),
        }
    }
}

/// Remove terminal escape sequences: CSI runs (`ESC [`, parameters, one final
/// byte in `@..=~`) and two-byte escapes.
fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find('\x1b') {
        out.push_str(&rest[..start]);
        let seq = &rest[start + 1..];
        let skip = match seq.strip_prefix('[') {
            Some(csi) => csi
                .find(|c: char| ('@'..='~').contains(&c))
                .map_or(seq.len(), |end| end + 2),
            None => seq.chars().next().map_or(0, char::len_utf8),
        };
        rest = &seq[skip..];
    }
    out.push_str(rest);
    out
}
