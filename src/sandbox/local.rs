//! Directory-backed sandbox service
//!
//! Each sandbox is a directory under `root_dir`, optionally seeded from
//! `templates_dir/<template_id>`. A JSON metadata file beside the directory
//! records when the sandbox was last used so the idle window survives
//! process restarts.

use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use super::{CommandResult, LiveSandbox, SandboxHandle, SandboxService};
use crate::error::{Result, SandloopError};
use crate::id::generate_sandbox_id;

/// Settings for [`LocalSandboxService`]
#[derive(Debug, Clone)]
pub struct LocalSandboxConfig {
    /// Directory holding one subdirectory per sandbox
    pub root_dir: PathBuf,

    /// Directory of templates; `None` starts every sandbox empty
    pub templates_dir: Option<PathBuf>,

    pub idle_timeout: Duration,

    /// Upper bound for a single command
    pub command_timeout: Duration,

    /// Domain used to build external host names
    pub host_domain: String,
}

impl Default for LocalSandboxConfig {
    fn default() -> Self {
        Self {
            root_dir: std::env::temp_dir().join("sandloop").join("sandboxes"),
            templates_dir: None,
            idle_timeout: Duration::from_secs(30 * 60),
            command_timeout: Duration::from_secs(120),
            host_domain: "sandbox.local".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SandboxMeta {
    sandbox_id: String,
    template_id: String,
    created_at: DateTime<Utc>,
    last_active: DateTime<Utc>,
}

/// Sandbox service running commands with `sh -c` inside a local directory.
#[derive(Debug, Clone)]
pub struct LocalSandboxService {
    config: LocalSandboxConfig,
}

impl LocalSandboxService {
    pub fn new(config: LocalSandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LocalSandboxConfig {
        &self.config
    }

    /// Working directory of a sandbox
    pub fn sandbox_dir(&self, sandbox_id: &str) -> PathBuf {
        self.config.root_dir.join(sandbox_id)
    }

    fn meta_path(&self, sandbox_id: &str) -> PathBuf {
        self.config.root_dir.join(format!("{}.json", sandbox_id))
    }

    fn load_meta(&self, sandbox_id: &str) -> Result<SandboxMeta> {
        let path = self.meta_path(sandbox_id);
        if !path.exists() {
            return Err(SandloopError::SandboxNotFound(sandbox_id.to_string()));
        }
        let raw = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn save_meta(&self, meta: &SandboxMeta) -> Result<()> {
        let raw = serde_json::to_string_pretty(meta)?;
        std::fs::write(self.meta_path(&meta.sandbox_id), raw)?;
        Ok(())
    }

    fn live(&self, meta: &SandboxMeta) -> LiveSandbox {
        let expires_at = chrono::Duration::from_std(self.config.idle_timeout)
            .ok()
            .and_then(|idle| meta.last_active.checked_add_signed(idle))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        LiveSandbox {
            sandbox_id: meta.sandbox_id.clone(),
            expires_at,
        }
    }

    /// Map a tool-supplied path into the sandbox, refusing anything that escapes it.
    fn resolve_path(&self, sandbox: &LiveSandbox, path: &str) -> Result<PathBuf> {
        let root = self.sandbox_dir(&sandbox.sandbox_id);
        let candidate = Path::new(path);

        let relative = if candidate.is_absolute() {
            candidate
                .strip_prefix(&root)
                .map_err(|_| SandloopError::InvalidInput(format!("Path {} escapes the sandbox", path)))?
        } else {
            candidate
        };

        let escapes = relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
        if escapes || relative.as_os_str().is_empty() {
            return Err(SandloopError::InvalidInput(format!("Path {} escapes the sandbox", path)));
        }

        Ok(root.join(relative))
    }
}

fn copy_dir(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

#[async_trait]
impl SandboxService for LocalSandboxService {
    async fn create_sandbox(&self, template_id: &str) -> Result<SandboxHandle> {
        let sandbox_id = generate_sandbox_id();
        let dir = self.sandbox_dir(&sandbox_id);

        std::fs::create_dir_all(&self.config.root_dir).map_err(|e| {
            SandloopError::Provisioning(format!("cannot create {}: {}", self.config.root_dir.display(), e))
        })?;

        match &self.config.templates_dir {
            Some(templates) => {
                let template = templates.join(template_id);
                if !template.is_dir() {
                    return Err(SandloopError::Provisioning(format!(
                        "template {} not found in {}",
                        template_id,
                        templates.display()
                    )));
                }
                copy_dir(&template, &dir)
                    .map_err(|e| SandloopError::Provisioning(format!("cannot seed sandbox {}: {}", sandbox_id, e)))?;
            }
            None => {
                std::fs::create_dir_all(&dir)
                    .map_err(|e| SandloopError::Provisioning(format!("cannot create sandbox {}: {}", sandbox_id, e)))?;
            }
        }

        let now = Utc::now();
        self.save_meta(&SandboxMeta {
            sandbox_id: sandbox_id.clone(),
            template_id: template_id.to_string(),
            created_at: now,
            last_active: now,
        })
        .map_err(|e| SandloopError::Provisioning(e.to_string()))?;

        log::debug!("Created local sandbox at {}", dir.display());
        Ok(SandboxHandle {
            sandbox_id,
            template_id: template_id.to_string(),
        })
    }

    async fn resume_sandbox(&self, sandbox_id: &str) -> Result<LiveSandbox> {
        let mut meta = self.load_meta(sandbox_id)?;
        let now = Utc::now();

        let idle_ms = (now - meta.last_active).num_milliseconds().max(0) as u64;
        if idle_ms > self.config.idle_timeout.as_millis() as u64 {
            log::warn!("Sandbox {} expired after {}ms idle", sandbox_id, idle_ms);
            return Err(SandloopError::ExpiredSandbox {
                sandbox_id: sandbox_id.to_string(),
                idle_ms,
            });
        }

        meta.last_active = now;
        self.save_meta(&meta)?;
        Ok(self.live(&meta))
    }

    async fn exec_command(
        &self,
        sandbox: &LiveSandbox,
        command: &str,
        on_stdout: &mut (dyn for<'a> FnMut(&'a str) + Send),
        on_stderr: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<CommandResult> {
        let root = self.sandbox_dir(&sandbox.sandbox_id);
        log::debug!("[{}] $ {}", sandbox.sandbox_id, command);

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SandloopError::ToolExecution(format!("failed to spawn command: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SandloopError::ToolExecution("stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SandloopError::ToolExecution("stderr not captured".to_string()))?;

        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();
        let mut out_buf = String::new();
        let mut err_buf = String::new();

        let collect = async {
            let (mut out_done, mut err_done) = (false, false);
            while !(out_done && err_done) {
                tokio::select! {
                    line = out_lines.next_line(), if !out_done => match line? {
                        Some(line) => {
                            let chunk = format!("{}\n", line);
                            on_stdout(&chunk);
                            out_buf.push_str(&chunk);
                        }
                        None => out_done = true,
                    },
                    line = err_lines.next_line(), if !err_done => match line? {
                        Some(line) => {
                            let chunk = format!("{}\n", line);
                            on_stderr(&chunk);
                            err_buf.push_str(&chunk);
                        }
                        None => err_done = true,
                    },
                }
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>(status)
        };

        let timeout_ms = self.config.command_timeout.as_millis() as u64;
        let status = tokio::time::timeout(self.config.command_timeout, collect)
            .await
            .map_err(|_| SandloopError::ToolExecution(format!("Command timed out after {}ms", timeout_ms)))?
            .map_err(|e| SandloopError::ToolExecution(e.to_string()))?;

        Ok(CommandResult {
            exit_code: status.code().unwrap_or(-1),
            stdout: out_buf,
            stderr: err_buf,
        })
    }

    async fn write_file(&self, sandbox: &LiveSandbox, path: &str, content: &str) -> Result<()> {
        let target = self.resolve_path(sandbox, path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SandloopError::ToolExecution(format!("cannot create directory for {}: {}", path, e)))?;
        }
        tokio::fs::write(&target, content)
            .await
            .map_err(|e| SandloopError::ToolExecution(format!("cannot write {}: {}", path, e)))
    }

    async fn read_file(&self, sandbox: &LiveSandbox, path: &str) -> Result<String> {
        let target = self.resolve_path(sandbox, path)?;
        tokio::fs::read_to_string(&target).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SandloopError::ToolExecution(format!("File not found: {}", path)),
            _ => SandloopError::ToolExecution(format!("cannot read {}: {}", path, e)),
        })
    }

    fn external_host(&self, sandbox: &LiveSandbox, port: u16) -> String {
        format!("{}-{}.{}", port, sandbox.sandbox_id, self.config.host_domain)
    }
}
