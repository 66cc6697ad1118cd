//! Subprocess sandbox for untrusted code
//!
//! Every run gets a fresh process group inside a temporary working directory with a
//! cleared environment. Limits are applied with `ulimit` by a `sh` trampoline that then
//! `exec`s the target program. The wall-clock timer, output overflow and request
//! cancellation all kill the whole process group.

use crate::config::constants::sandbox as sandbox_defaults;
use crate::config::{NetworkIsolation, SandboxConfig};
use crate::context::RequestContext;
use crate::languages::{ExecutionResult, LanguageError, LimitKind, ResourceLimits, ResourceUsage};
use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::{Pid, getuid};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};

const SIGKILL: i32 = 9;
const SIGXCPU: i32 = 24;
const SIGXFSZ: i32 = 25;
const READ_CHUNK: usize = 8 * 1024;
const REAP_TIMEOUT: Duration = Duration::from_secs(2);

/// Temporary working directory of one execution; removed on drop
#[derive(Debug)]
pub struct SandboxWorkspace {
    dir: tempfile::TempDir,
}

impl SandboxWorkspace {
    pub fn create() -> Result<Self, LanguageError> {
        let dir = tempfile::Builder::new()
            .prefix("coding-expert-run-")
            .tempdir()
            .map_err(|e| LanguageError::Sandbox(format!("failed to create workspace: {e}")))?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub async fn write_file(&self, name: &str, contents: &str) -> Result<PathBuf, LanguageError> {
        let path = self.dir.path().join(name);
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| LanguageError::Sandbox(format!("failed to write {name}: {e}")))?;
        Ok(path)
    }
}

/// Program invocation plus the limits it runs under
#[derive(Debug, Clone)]
pub struct SandboxCommand {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    stdin: Option<String>,
    limits: ResourceLimits,
    wall_timeout: Duration,
    limit_address_space: bool,
    allow_network: bool,
}

impl SandboxCommand {
    pub fn new(program: impl Into<String>, limits: ResourceLimits, wall_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            stdin: None,
            limits,
            wall_timeout,
            limit_address_space: true,
            allow_network: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, stdin: Option<String>) -> Self {
        self.stdin = stdin;
        self
    }

    /// Runtimes that reserve large virtual address ranges (Go, V8, rustc) cannot
    /// run under `ulimit -v`; their memory is bounded by their own flags instead
    pub fn without_address_space_limit(mut self) -> Self {
        self.limit_address_space = false;
        self
    }

    pub fn allow_network(mut self, allow: bool) -> Self {
        self.allow_network = allow;
        self
    }

    /// `ulimit` trampoline. `tasks_in_use` is what the uid already runs: the process
    /// limit counts every task of the user, so the run's own allowance sits on top.
    fn script(&self, tasks_in_use: u64) -> String {
        let limits = &self.limits;
        let mut script = format!(
            "ulimit -t {cpu} 2>/dev/null; ulimit -f {file} 2>/dev/null; \
             ulimit -u {procs} 2>/dev/null || ulimit -p {procs} 2>/dev/null; ",
            cpu = limits.max_cpu_seconds.max(1),
            file = (limits.max_file_bytes / 1024).max(1),
            procs = tasks_in_use + u64::from(limits.max_processes.max(1)),
        );
        if self.limit_address_space {
            script.push_str(&format!(
                "ulimit -v {} 2>/dev/null; ",
                (limits.max_memory_bytes / 1024).max(1)
            ));
        }
        script.push_str("exec \"$@\"");
        script
    }
}

/// Shared stdout/stderr byte budget
struct OutputBudget {
    remaining: AtomicUsize,
    truncated: AtomicBool,
    exceeded: Notify,
}

impl OutputBudget {
    fn new(bytes: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(bytes),
            truncated: AtomicBool::new(false),
            exceeded: Notify::new(),
        }
    }

    /// Reserve up to `wanted` bytes, returning how many may be kept
    fn take(&self, wanted: usize) -> usize {
        let previous = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                Some(left.saturating_sub(wanted))
            })
            .unwrap_or(0);
        previous.min(wanted)
    }

    fn mark_truncated(&self) {
        if !self.truncated.swap(true, Ordering::SeqCst) {
            self.exceeded.notify_one();
        }
    }

    fn is_truncated(&self) -> bool {
        self.truncated.load(Ordering::SeqCst)
    }
}

async fn drain<R>(mut reader: R, budget: Arc<OutputBudget>) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut kept = Vec::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let take = budget.take(n);
                kept.extend_from_slice(&buf[..take]);
                if take < n {
                    budget.mark_truncated();
                }
            }
        }
    }
    kept
}

enum Outcome {
    Exited(ExitStatus),
    TimeLimit(Duration),
    OutputLimit,
    Cancelled,
}

/// Process sandbox shared by all language providers
#[derive(Debug, Clone)]
pub struct Sandbox {
    network_isolated: bool,
    cache_dir: PathBuf,
    defaults: ResourceLimits,
}

impl Sandbox {
    pub fn new(cache_dir: PathBuf, network_isolated: bool, defaults: ResourceLimits) -> Self {
        Self {
            network_isolated,
            cache_dir,
            defaults,
        }
    }

    /// Build from configuration, probing `unshare` when isolation is `auto`
    pub async fn from_config(config: &SandboxConfig) -> Self {
        let network_isolated = match config.network_isolation {
            NetworkIsolation::None => false,
            NetworkIsolation::Unshare => true,
            NetworkIsolation::Auto => {
                let available = Self::unshare_works().await;
                if !available {
                    warn!("unshare is unavailable; code executions will not be network isolated");
                }
                available
            }
        };
        let defaults = ResourceLimits {
            max_memory_bytes: config.max_memory_bytes,
            max_cpu_seconds: config.max_cpu_seconds,
            max_processes: config.max_processes,
            max_output_bytes: config.max_output_bytes,
            max_file_bytes: sandbox_defaults::DEFAULT_MAX_FILE_BYTES,
            network: false,
            filesystem: false,
        };
        Self::new(config.resolved_cache_dir(), network_isolated, defaults)
    }

    /// Whether unprivileged network namespaces work on this host
    pub async fn unshare_works() -> bool {
        if find_executable("unshare").is_none() {
            return false;
        }
        let status = Command::new("unshare")
            .args(["--net", "--map-root-user", "true"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();
        matches!(
            tokio::time::timeout(Duration::from_secs(5), status).await,
            Ok(Ok(status)) if status.success()
        )
    }

    pub fn network_isolated(&self) -> bool {
        self.network_isolated
    }

    /// Persistent directory for build caches, created on demand
    pub fn cache_dir(&self, subdir: &str) -> PathBuf {
        let dir = self.cache_dir.join(subdir);
        if let Err(err) = std::fs::create_dir_all(&dir) {
            warn!(path = %dir.display(), error = %err, "failed to create sandbox cache dir");
        }
        dir
    }

    pub fn default_limits(&self) -> ResourceLimits {
        self.defaults
    }

    /// Run `command` inside `workspace`.
    ///
    /// Limit violations are reported in the result (non-zero exit code plus a
    /// `[sandbox]` notice on stderr), not as errors. Cancellation of `ctx` kills the
    /// process group and yields [`LanguageError::Cancelled`].
    pub async fn run(
        &self,
        ctx: &RequestContext,
        workspace: &SandboxWorkspace,
        command: &SandboxCommand,
    ) -> Result<ExecutionResult, LanguageError> {
        if ctx.is_cancelled() {
            return Err(LanguageError::Cancelled);
        }
        let isolate = self.network_isolated && !command.allow_network;
        let script = command.script(user_task_count().unwrap_or(0));

        let mut process = if isolate {
            let mut process = Command::new("unshare");
            process.args(["--net", "--map-root-user", "sh", "-c", script.as_str(), "sandbox"]);
            process
        } else {
            let mut process = Command::new("sh");
            process.args(["-c", script.as_str(), "sandbox"]);
            process
        };

        let path_env =
            std::env::var_os("PATH").unwrap_or_else(|| "/usr/local/bin:/usr/bin:/bin".into());
        process
            .arg(&command.program)
            .args(&command.args)
            .current_dir(workspace.path())
            .env_clear()
            .env("PATH", path_env)
            .env("HOME", workspace.path())
            .env("TMPDIR", workspace.path())
            .env("LANG", "C.UTF-8")
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(if command.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .process_group(0);

        let started = Instant::now();
        let mut child = process.spawn().map_err(|e| {
            LanguageError::Sandbox(format!("failed to spawn {}: {e}", command.program))
        })?;
        let pid = child.id();

        if let (Some(mut pipe), Some(input)) = (child.stdin.take(), command.stdin.clone()) {
            tokio::spawn(async move {
                // The program may exit without reading; a broken pipe is expected then
                let _ = pipe.write_all(input.as_bytes()).await;
                let _ = pipe.shutdown().await;
            });
        }

        let budget_bytes = command
            .limits
            .max_output_bytes
            .saturating_sub(sandbox_defaults::NOTICE_RESERVE_BYTES)
            .max(1);
        let budget = Arc::new(OutputBudget::new(budget_bytes));
        let stdout_task = child
            .stdout
            .take()
            .map(|pipe| tokio::spawn(drain(pipe, budget.clone())));
        let stderr_task = child
            .stderr
            .take()
            .map(|pipe| tokio::spawn(drain(pipe, budget.clone())));

        let wall = command.wall_timeout.min(ctx.remaining());
        let outcome = tokio::select! {
            status = child.wait() => match status {
                Ok(status) => Outcome::Exited(status),
                Err(e) => {
                    kill_group(pid);
                    return Err(LanguageError::Sandbox(format!("failed to wait for child: {e}")));
                }
            },
            _ = tokio::time::sleep(wall) => Outcome::TimeLimit(wall),
            _ = budget.exceeded.notified() => Outcome::OutputLimit,
            _ = ctx.token().cancelled() => Outcome::Cancelled,
        };

        // Reap the group either way so no stragglers keep the pipes open
        let _ = child.start_kill();
        kill_group(pid);
        let status = match &outcome {
            Outcome::Exited(status) => Some(*status),
            _ => tokio::time::timeout(REAP_TIMEOUT, child.wait())
                .await
                .ok()
                .and_then(Result::ok),
        };
        let elapsed = started.elapsed();

        let stdout = join_output(stdout_task).await;
        let mut stderr = join_output(stderr_task).await;

        if matches!(outcome, Outcome::Cancelled) {
            return Err(LanguageError::Cancelled);
        }

        let signal = status.and_then(|status| status.signal());
        let mut exit_code = status
            .and_then(|status| status.code())
            .unwrap_or_else(|| 128 + signal.unwrap_or(SIGKILL));

        let stderr_text = String::from_utf8_lossy(&stderr).into_owned();
        let (limit, notice) = match outcome {
            Outcome::TimeLimit(limit) => {
                exit_code = 128 + SIGKILL;
                (
                    Some(LimitKind::WallTime),
                    Some(format!(
                        "cpu-time exceeded: time limit of {:.1}s reached, process killed",
                        limit.as_secs_f64()
                    )),
                )
            }
            Outcome::OutputLimit => {
                if exit_code == 0 {
                    exit_code = 128 + SIGKILL;
                }
                (
                    Some(LimitKind::Output),
                    Some(format!(
                        "output limit exceeded: more than {budget_bytes} bytes written, \
                         process killed"
                    )),
                )
            }
            Outcome::Exited(_) => classify_exit(signal, &stderr_text, &command.limits),
            Outcome::Cancelled => (None, None),
        };

        if let Some(notice) = &notice {
            if !stderr.is_empty() && !stderr.ends_with(b"\n") {
                stderr.push(b'\n');
            }
            stderr.extend_from_slice(format!("[sandbox] {notice}\n").as_bytes());
        }

        let output_bytes = stdout.len() + stderr.len();
        debug!(
            program = %command.program,
            exit_code,
            duration_ms = elapsed.as_millis() as u64,
            output_bytes,
            limit = limit.map(|l| l.as_str()),
            "sandbox run finished"
        );

        Ok(ExecutionResult {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code,
            duration_ms: elapsed.as_millis() as u64,
            truncated: budget.is_truncated(),
            resource_usage: ResourceUsage {
                wall_time_ms: elapsed.as_millis() as u64,
                build_time_ms: None,
                output_bytes,
                limit_exceeded: limit,
                signal,
                network_isolated: isolate,
            },
        })
    }
}

fn classify_exit(
    signal: Option<i32>,
    stderr: &str,
    limits: &ResourceLimits,
) -> (Option<LimitKind>, Option<String>) {
    match signal {
        Some(SIGXCPU) => (
            Some(LimitKind::CpuTime),
            Some(format!(
                "cpu-time exceeded: CPU limit of {}s reached",
                limits.max_cpu_seconds
            )),
        ),
        Some(SIGXFSZ) => (
            Some(LimitKind::FileSize),
            Some(format!(
                "file-size limit exceeded: files are capped at {} bytes",
                limits.max_file_bytes
            )),
        ),
        Some(SIGKILL) => (
            Some(LimitKind::Memory),
            Some("process killed, memory limit likely exceeded".to_string()),
        ),
        _ if looks_out_of_memory(stderr) => (
            Some(LimitKind::Memory),
            Some(format!(
                "memory limit exceeded: limit is {} bytes",
                limits.max_memory_bytes
            )),
        ),
        _ => (None, None),
    }
}

fn looks_out_of_memory(stderr: &str) -> bool {
    ["MemoryError", "out of memory", "heap out of memory", "memory allocation of"]
        .iter()
        .any(|marker| stderr.contains(marker))
}

async fn join_output(task: Option<tokio::task::JoinHandle<Vec<u8>>>) -> Vec<u8> {
    let Some(task) = task else {
        return Vec::new();
    };
    match tokio::time::timeout(REAP_TIMEOUT, task).await {
        Ok(Ok(bytes)) => bytes,
        _ => Vec::new(),
    }
}

/// Kill every process in the group led by `pid`
fn kill_group(pid: Option<u32>) {
    let Some(pid) = pid.and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(errno) => debug!(pid, error = %errno, "failed to kill process group"),
    }
}

/// Tasks currently owned by this process's real uid, threads included
fn user_task_count() -> Option<u64> {
    let uid = getuid().as_raw();
    let mut total = 0;
    for entry in std::fs::read_dir("/proc").ok()?.flatten() {
        let is_pid = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.bytes().all(|b| b.is_ascii_digit()));
        if !is_pid {
            continue;
        }
        // Processes may exit between listing and reading
        let Ok(status) = std::fs::read_to_string(entry.path().join("status")) else {
            continue;
        };
        if status_field(&status, "Uid:") == Some(u64::from(uid)) {
            total += status_field(&status, "Threads:").unwrap_or(1);
        }
    }
    Some(total)
}

/// First number of a `/proc/<pid>/status` line
fn status_field(status: &str, key: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix(key))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|value| value.parse().ok())
}

/// Locate `program` on `PATH`
pub fn find_executable(program: &str) -> Option<PathBuf> {
    if program.contains('/') {
        let path = PathBuf::from(program);
        return is_executable(&path).then_some(path);
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Fail with `ToolchainUnavailable` unless `program` is on `PATH`
pub fn require_toolchain(language: &str, program: &str) -> Result<PathBuf, LanguageError> {
    find_executable(program).ok_or_else(|| LanguageError::ToolchainUnavailable {
        language: language.to_string(),
        program: program.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max_output_bytes: usize) -> ResourceLimits {
        ResourceLimits {
            max_memory_bytes: 256 * 1024 * 1024,
            max_cpu_seconds: 10,
            max_processes: 256,
            max_output_bytes,
            max_file_bytes: 1024 * 1024,
            network: false,
            filesystem: false,
        }
    }

    fn sandbox() -> Sandbox {
        Sandbox::new(std::env::temp_dir(), false, limits(64 * 1024))
    }

    fn shell(script: &str, limits: ResourceLimits, wall: Duration) -> SandboxCommand {
        SandboxCommand::new("sh", limits, wall).args(["-c", script])
    }

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let ctx = RequestContext::new(Duration::from_secs(10));
        let workspace = SandboxWorkspace::create().unwrap();
        let result = sandbox()
            .run(
                &ctx,
                &workspace,
                &shell("echo hi; echo oops >&2; exit 3", limits(4096), Duration::from_secs(5)),
            )
            .await
            .unwrap();
        assert_eq!(result.stdout, "hi\n");
        assert_eq!(result.stderr, "oops\n");
        assert_eq!(result.exit_code, 3);
        assert!(!result.truncated);
        assert_eq!(result.resource_usage.limit_exceeded, None);
    }

    #[tokio::test]
    async fn environment_is_cleared_and_home_is_workspace() {
        let ctx = RequestContext::new(Duration::from_secs(10));
        let workspace = SandboxWorkspace::create().unwrap();
        let result = sandbox()
            .run(
                &ctx,
                &workspace,
                &shell(
                    "echo \"$HOME|${CARGO:-unset}\"",
                    limits(4096),
                    Duration::from_secs(5),
                ),
            )
            .await
            .unwrap();
        let expected = format!("{}|unset\n", workspace.path().display());
        assert_eq!(result.stdout, expected);
    }

    #[tokio::test]
    async fn stdin_is_forwarded() {
        let ctx = RequestContext::new(Duration::from_secs(10));
        let workspace = SandboxWorkspace::create().unwrap();
        let command = SandboxCommand::new("cat", limits(4096), Duration::from_secs(5))
            .stdin(Some("ping\n".to_string()));
        let result = sandbox().run(&ctx, &workspace, &command).await.unwrap();
        assert_eq!(result.stdout, "ping\n");
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn wall_clock_limit_kills_busy_loop() {
        let ctx = RequestContext::new(Duration::from_secs(30));
        let workspace = SandboxWorkspace::create().unwrap();
        let result = sandbox()
            .run(
                &ctx,
                &workspace,
                &shell("while :; do :; done", limits(4096), Duration::from_secs(1)),
            )
            .await
            .unwrap();
        assert_ne!(result.exit_code, 0);
        assert!(result.stderr.contains("cpu-time exceeded"), "{}", result.stderr);
        assert!(result.duration_ms >= 900 && result.duration_ms < 3000);
        assert_eq!(result.resource_usage.limit_exceeded, Some(LimitKind::WallTime));
    }

    #[tokio::test]
    async fn cpu_limit_is_enforced_by_ulimit() {
        let ctx = RequestContext::new(Duration::from_secs(30));
        let workspace = SandboxWorkspace::create().unwrap();
        let mut tight = limits(4096);
        tight.max_cpu_seconds = 1;
        let result = sandbox()
            .run(
                &ctx,
                &workspace,
                &shell("while :; do :; done", tight, Duration::from_secs(10)),
            )
            .await
            .unwrap();
        assert_ne!(result.exit_code, 0);
        assert!(result.duration_ms < 9000);
        assert!(result.stderr.contains("exceeded"), "{}", result.stderr);
    }

    #[tokio::test]
    async fn output_is_truncated_within_budget() {
        let ctx = RequestContext::new(Duration::from_secs(10));
        let workspace = SandboxWorkspace::create().unwrap();
        let max = 1024;
        let result = sandbox()
            .run(
                &ctx,
                &workspace,
                &shell(
                    "i=0; while [ $i -lt 5000 ]; do echo line-$i; i=$((i+1)); done",
                    limits(max),
                    Duration::from_secs(10),
                ),
            )
            .await
            .unwrap();
        assert!(result.truncated);
        assert!(result.stdout.len() + result.stderr.len() <= max);
        assert!(result.stdout.starts_with("line-0\n"));
        assert_eq!(result.resource_usage.limit_exceeded, Some(LimitKind::Output));
    }

    #[tokio::test]
    async fn cancellation_kills_the_child() {
        let ctx = RequestContext::new(Duration::from_secs(30));
        let workspace = SandboxWorkspace::create().unwrap();
        let token = ctx.token().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            token.cancel();
        });
        let started = std::time::Instant::now();
        let result = sandbox()
            .run(
                &ctx,
                &workspace,
                &shell("sleep 20", limits(4096), Duration::from_secs(20)),
            )
            .await;
        assert_eq!(result, Err(LanguageError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn missing_toolchain_is_reported() {
        let err =
            require_toolchain("Brainfuck", "definitely-not-a-real-binary-xyz").unwrap_err();
        assert!(matches!(err, LanguageError::ToolchainUnavailable { .. }));
        assert!(find_executable("sh").is_some());
    }

    #[test]
    fn process_limit_is_headroom_over_tasks_in_use() {
        let command = shell("true", limits(4096), Duration::from_secs(1));
        assert!(command.script(40).contains("ulimit -u 296 "));
        assert!(command.script(0).contains("ulimit -u 256 "));
    }

    #[test]
    fn proc_status_fields_are_parsed() {
        let status = "Name:\tsh\nUid:\t1000\t1000\t1000\t1000\nThreads:\t3\n";
        assert_eq!(status_field(status, "Uid:"), Some(1000));
        assert_eq!(status_field(status, "Threads:"), Some(3));
        assert_eq!(status_field(status, "VmRSS:"), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn own_tasks_are_counted() {
        assert!(user_task_count().unwrap() >= 1);
    }

    #[test]
    fn killing_a_finished_group_is_harmless() {
        kill_group(None);
        kill_group(Some(u32::MAX));
    }
}
