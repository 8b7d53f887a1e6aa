//! Command Filter: wraps an external command invocation whose captured
//! stdout/stderr becomes the input file for an embedded `EventFilter` (used
//! for snapshot sources such as `dmesg`).

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use crate::error::{Result, SichekError};
use crate::event_filter::EventFilter;
use crate::file_loader::FileLoader;
use crate::registry::RegexRegistry;
use crate::result::CheckResult;
use crate::rule::EventRule;
use crate::scheduler::LoadScheduler;

pub struct CommandFilter {
    agent_name: String,
    command: Vec<String>,
    sink_path: PathBuf,
    rules: Vec<EventRule>,
    cache_size: usize,
    regex_registry: Arc<RegexRegistry>,
    scheduler: Arc<LoadScheduler>,
    filter: Option<EventFilter>,
    sink_loader: Option<Arc<FileLoader>>,
}

impl CommandFilter {
    /// `command` is `[cmd, args...]`. The sink path is
    /// `/tmp/<agent_name>.<cmd>.log`; every rule's `log_files` is rewritten to
    /// that single sink path at construction, so captured rules target the
    /// synthesized file regardless of what they originally named.
    pub fn new(
        agent_name: impl Into<String>,
        command: Vec<String>,
        rules: Vec<EventRule>,
        regex_registry: Arc<RegexRegistry>,
        scheduler: Arc<LoadScheduler>,
        cache_size: usize,
    ) -> Result<Self> {
        let agent_name = agent_name.into();
        let cmd_name = command
            .first()
            .cloned()
            .unwrap_or_else(|| "cmd".to_string());
        let sink_path = PathBuf::from(format!("/tmp/{agent_name}.{cmd_name}.log"));

        let rewritten: Vec<EventRule> = rules
            .into_iter()
            .map(|mut r| {
                r.log_files = sink_path.display().to_string();
                r
            })
            .collect();

        if command.is_empty() {
            return Err(SichekError::Config("command filter requires a command".into()));
        }

        Ok(CommandFilter {
            agent_name,
            command,
            sink_path,
            rules: rewritten,
            cache_size,
            regex_registry,
            scheduler,
            filter: None,
            sink_loader: None,
        })
    }

    pub fn sink_path(&self) -> &std::path::Path {
        &self.sink_path
    }

    /// Truncates the sink file, runs the command with stdout+stderr
    /// redirected into it, loads the freshly captured lines, and delegates
    /// classification to an embedded `EventFilter` over the sink. Invocation
    /// failure is logged and yields `Ok(None)` rather than an error; callers
    /// that need a hard failure should inspect the logs, not the return
    /// value.
    pub async fn check(&mut self) -> Result<Option<CheckResult>> {
        let sink = match std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.sink_path)
        {
            Ok(f) => f,
            Err(err) => {
                tracing::warn!(
                    path = %self.sink_path.display(),
                    error = %err,
                    "command filter: could not open sink file"
                );
                return Ok(None);
            }
        };
        let sink_err = sink.try_clone()?;

        let program = &self.command[0];
        let args = &self.command[1..];
        let status = tokio::process::Command::new(program)
            .args(args)
            .stdout(Stdio::from(sink))
            .stderr(Stdio::from(sink_err))
            .status()
            .await;

        let status = match status {
            Ok(s) => s,
            Err(err) => {
                tracing::warn!(
                    agent = %self.agent_name,
                    command = ?self.command,
                    error = %err,
                    "command filter: failed to spawn command"
                );
                return Ok(None);
            }
        };
        if !status.success() {
            tracing::warn!(
                agent = %self.agent_name,
                command = ?self.command,
                status = ?status.code(),
                "command filter: command exited non-zero"
            );
            return Ok(None);
        }

        if self.filter.is_none() {
            let loader = self
                .scheduler
                .get_or_create_loader(&self.sink_path, self.cache_size, 0)?;
            let filter = EventFilter::new(
                format!("{}::{}", self.agent_name, self.command[0]),
                None,
                self.rules.clone(),
                &self.regex_registry,
                self.scheduler.clone(),
                self.cache_size,
                0,
            )?;
            self.filter = Some(filter);
            self.sink_loader = Some(loader);
        }

        // The embedded filter only classifies lines its loader has read; the
        // loader never reads on its own (that is the background scheduler's
        // job, which this synchronous, one-shot capture never starts), so the
        // freshly captured output has to be pulled in here before delegating.
        self.sink_loader.as_ref().unwrap().load()?;

        Ok(Some(self.filter.as_mut().unwrap().check()?))
    }
}

impl Drop for CommandFilter {
    fn drop(&mut self) {
        if self.sink_loader.take().is_some() {
            self.scheduler.release_interest(&self.sink_path);
        }
    }
}
