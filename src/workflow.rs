//! The fetch → merge → edit → confirm → apply loop
//!
//! # Stages
//!
//! ```text
//! Fetching → Merging → Written → Editing → Confirming ─┬→ Applying
//!                                                      └→ Aborted
//! ```
//!
//! Every stage finishes before the next starts. The only concurrent work is
//! the optional public IP probe, spawned while merging. Its output may
//! interleave with the rule listing, and it is settled before the editor
//! takes over the terminal: awaited for at most its own timeout, then
//! cancelled. It has no effect on the outcome.
//!
//! # Scratch artifact
//!
//! The merged rules are written to a fresh `firewall-*.json` file. Apply
//! always re-reads that file, so whatever is on disk at that moment is what
//! gets submitted. The file is deleted only after a successful apply; on
//! abort, editor failure or a remote error it stays for
//! `lhfw firewall -f <file>`.
//!
//! Concurrent runs against the same instance are not coordinated.

use crate::core::error::Result;
use crate::core::firewall::{FirewallRule, InstanceFirewallRules};
use crate::core::merge::{expand, merge};
use crate::editor::{Editor, Prompt, resume_command};
use crate::gateway::RemoteAuthority;
use crate::probe::Probe;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// The only answer that lets the workflow apply.
pub const AFFIRMATIVE: &str = "yes";

pub const CONFIRM_QUESTION: &str = "Apply the edited firewall rules? Type 'yes' to confirm: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Stage {
    Fetching,
    Merging,
    Written,
    Editing,
    Confirming,
    Applying,
    Aborted,
}

/// Result of a successful modify call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    pub instance_id: String,
    /// Number of single-protocol rules submitted after expansion
    pub rules: usize,
    pub request_id: String,
}

/// How a workflow run ended, when it did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Rules were submitted and the artifact removed.
    Applied(ApplyReport),
    /// The operator declined; nothing was submitted.
    Aborted { artifact: PathBuf },
    /// The editor could not be run; nothing was submitted.
    EditorUnavailable { artifact: PathBuf, reason: String },
}

/// Whether a raw prompt answer is the affirmative token. Only the line
/// terminator is stripped.
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim_end_matches(&['\r', '\n'][..]) == AFFIRMATIVE
}

/// Unified diff between the written and the edited artifact, or `None`
/// when the operator saved it unchanged.
pub fn render_diff(written: &str, edited: &str) -> Option<String> {
    if written == edited {
        return None;
    }
    Some(
        similar::TextDiff::from_lines(written, edited)
            .unified_diff()
            .context_radius(3)
            .header("fetched", "edited")
            .to_string(),
    )
}

/// Creates a uniquely named artifact in `dir` holding `text`. The file is
/// kept on disk (mode 0600 on Unix) until explicitly removed.
pub fn write_artifact(dir: &Path, text: &str) -> std::io::Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix("firewall-")
        .suffix(".json")
        .tempfile_in(dir)?;
    file.write_all(text.as_bytes())?;
    file.flush()?;
    let (_, path) = file.keep()?;
    Ok(path)
}

/// Reads an edited artifact from disk, expands it and replaces the
/// instance's rule set with it.
///
/// The instance id comes from the file itself. The edited content is not
/// validated beyond parsing; a protocol listed twice is submitted twice.
pub async fn apply_file(gateway: &dyn RemoteAuthority, path: &Path) -> Result<ApplyReport> {
    let text = tokio::fs::read_to_string(path).await?;
    let desired = InstanceFirewallRules::from_json(&text)?;
    let expanded = expand(&desired.rules);

    info!(
        instance_id = %desired.instance_id,
        rules = expanded.len(),
        "Submitting firewall rules from {}",
        path.display()
    );
    let ack = gateway
        .modify_rules(&desired.instance_id, &expanded)
        .await?;

    Ok(ApplyReport {
        instance_id: desired.instance_id,
        rules: expanded.len(),
        request_id: ack.request_id,
    })
}

/// Waits for a running probe so none of its output lands in the editor.
async fn settle_probe(mut task: JoinHandle<()>, limit: Duration) {
    if tokio::time::timeout(limit, &mut task).await.is_err() {
        debug!("Public IP probe still running after {limit:?}, cancelling");
        task.abort();
    }
}

/// One reconciliation run. The gateway, editor and prompt are owned by the
/// caller.
pub struct Workflow<'a> {
    gateway: &'a dyn RemoteAuthority,
    editor: &'a dyn Editor,
    prompt: &'a mut dyn Prompt,
    scratch_dir: PathBuf,
    program: String,
    probe: Option<Probe>,
    stage: Stage,
}

impl<'a> Workflow<'a> {
    pub fn new(
        gateway: &'a dyn RemoteAuthority,
        editor: &'a dyn Editor,
        prompt: &'a mut dyn Prompt,
    ) -> Self {
        Self {
            gateway,
            editor,
            prompt,
            scratch_dir: std::env::temp_dir(),
            program: "lhfw".to_string(),
            probe: None,
            stage: Stage::Fetching,
        }
    }

    /// Directory for the scratch artifact (default: the system temp dir).
    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    /// Program name used in the printed resume command.
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Runs the public IP probe alongside the workflow.
    pub fn probe(mut self, probe: Probe) -> Self {
        self.probe = Some(probe);
        self
    }

    fn enter(&mut self, stage: Stage) {
        debug!("{} → {}", self.stage, stage);
        self.stage = stage;
    }

    pub async fn run(mut self, instance_id: &str) -> Result<Outcome> {
        self.enter(Stage::Fetching);
        let fetched = self.gateway.describe_rules(instance_id).await?;
        info!(instance_id, count = fetched.len(), "Fetched firewall rules");

        self.enter(Stage::Merging);
        let probe_task = self.probe.take().map(|probe| {
            let limit = probe.timeout();
            let task = tokio::spawn(async move {
                probe.run().await;
            });
            (task, limit)
        });
        let single: Vec<FirewallRule> = fetched.into_iter().map(FirewallRule::from).collect();
        let merged = InstanceFirewallRules::new(instance_id, merge(&single));
        debug!(
            before = single.len(),
            after = merged.rules.len(),
            "Merged protocol variants"
        );

        self.enter(Stage::Written);
        let written = merged.to_pretty_json()?;
        let artifact = write_artifact(&self.scratch_dir, &written)?;
        let resume = resume_command(&self.program, &artifact);

        println!("Firewall rules of {instance_id}:");
        for rule in &merged.rules {
            println!("  {rule}");
        }
        println!("Rules written to {}", artifact.display());
        info!("cmd: {resume}");

        if let Some((task, limit)) = probe_task {
            settle_probe(task, limit).await;
        }

        self.enter(Stage::Editing);
        if let Err(e) = self.editor.edit(&artifact).await {
            warn!("{e}");
            println!("Edit {} by hand, then apply it with:", artifact.display());
            println!("  {resume}");
            return Ok(Outcome::EditorUnavailable {
                artifact,
                reason: e.to_string(),
            });
        }

        self.enter(Stage::Confirming);
        let edited = tokio::fs::read_to_string(&artifact).await?;
        match render_diff(&written, &edited) {
            Some(diff) => print!("{diff}"),
            None => println!("No changes to the fetched rules."),
        }

        let answer = self.prompt.ask(CONFIRM_QUESTION).await?;
        if !is_affirmative(&answer) {
            self.enter(Stage::Aborted);
            println!("Not applied. The edited rules are kept at {}", artifact.display());
            println!("Apply them later with:");
            println!("  {resume}");
            return Ok(Outcome::Aborted { artifact });
        }

        self.enter(Stage::Applying);
        let report = match apply_file(self.gateway, &artifact).await {
            Ok(report) => report,
            Err(e) => {
                error!("Apply failed, rules kept at {}", artifact.display());
                println!("Retry with:");
                println!("  {resume}");
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::remove_file(&artifact).await {
            warn!("Could not remove {}: {e}", artifact.display());
        }
        Ok(Outcome::Applied(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affirmative_token_is_exact() {
        assert!(is_affirmative("yes"));
        assert!(is_affirmative("yes\n"));
        assert!(is_affirmative("yes\r\n"));

        assert!(!is_affirmative("y"));
        assert!(!is_affirmative("YES"));
        assert!(!is_affirmative("Yes"));
        assert!(!is_affirmative(" yes"));
        assert!(!is_affirmative("yes please"));
        assert!(!is_affirmative("no"));
        assert!(!is_affirmative(""));
    }

    #[test]
    fn test_render_diff() {
        assert_eq!(render_diff("a\nb\n", "a\nb\n"), None);

        let diff = render_diff("a\nb\n", "a\nc\n").unwrap();
        assert!(diff.contains("--- fetched"));
        assert!(diff.contains("+++ edited"));
        assert!(diff.contains("-b"));
        assert!(diff.contains("+c"));
    }

    #[test]
    fn test_write_artifact_unique_and_kept() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_artifact(dir.path(), "{}\n").unwrap();
        let second = write_artifact(dir.path(), "{}\n").unwrap();

        assert_ne!(first, second);
        assert!(first.exists());
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "{}\n");

        let name = first.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("firewall-"));
        assert!(name.ends_with(".json"));
    }
}
