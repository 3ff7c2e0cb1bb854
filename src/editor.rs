//! Operator interaction: the external editor and the confirmation prompt
//!
//! # Editor selection
//!
//! - `LHFW_EDITOR`: editor for rule files only
//! - `VISUAL`, then `EDITOR`: the usual conventions
//! - `vi` when none of the above is set
//!
//! The value is split on whitespace, so `LHFW_EDITOR="code --wait"` works;
//! the scratch artifact path is appended as the one extra argument. The
//! editor must block until the file is closed.
//!
//! # Security
//!
//! The editor is spawned directly, without a shell. The resume command shown
//! to the operator is shell-quoted.

use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::process::ExitStatus;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

pub const EDITOR_ENV: &str = "LHFW_EDITOR";
pub const FALLBACK_EDITOR: &str = "vi";

/// Error type for editor launches
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("Editor command is empty")]
    EmptyCommand,

    #[error("Editor '{0}' not found in PATH")]
    NotFound(String),

    #[error("Failed to launch editor '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Editor '{program}' exited with {status}")]
    Failed { program: String, status: ExitStatus },
}

/// Hands the scratch artifact to the operator and waits until they are done.
#[async_trait]
pub trait Editor: Send + Sync {
    async fn edit(&self, path: &Path) -> Result<(), EditorError>;
}

/// Asks the operator a question and returns the raw answer line.
#[async_trait]
pub trait Prompt: Send {
    async fn ask(&mut self, question: &str) -> io::Result<String>;
}

/// Picks the editor command from an environment lookup.
pub fn editor_command_from(lookup: impl Fn(&str) -> Option<String>) -> Vec<String> {
    [EDITOR_ENV, "VISUAL", "EDITOR"]
        .into_iter()
        .filter_map(&lookup)
        .map(|value| {
            value
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .find(|words| !words.is_empty())
        .unwrap_or_else(|| vec![FALLBACK_EDITOR.to_string()])
}

/// Checks if a binary exists in PATH
fn binary_exists(name: &str) -> bool {
    std::env::var_os("PATH")
        .and_then(|paths| {
            std::env::split_paths(&paths).find_map(|dir| {
                let full_path = dir.join(name);
                if full_path.is_file() {
                    Some(full_path)
                } else {
                    None
                }
            })
        })
        .is_some()
}

/// Runs a real editor process.
#[derive(Debug, Clone)]
pub struct ExternalEditor {
    program: String,
    args: Vec<String>,
}

impl ExternalEditor {
    pub fn new(command: Vec<String>) -> Result<Self, EditorError> {
        let mut words = command.into_iter();
        let program = words.next().ok_or(EditorError::EmptyCommand)?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }

    pub fn from_env() -> Result<Self, EditorError> {
        Self::new(editor_command_from(|name| std::env::var(name).ok()))
    }

    fn is_available(&self) -> bool {
        let program = Path::new(&self.program);
        if program.components().count() > 1 {
            program.is_file()
        } else {
            binary_exists(&self.program)
        }
    }
}

#[async_trait]
impl Editor for ExternalEditor {
    async fn edit(&self, path: &Path) -> Result<(), EditorError> {
        if !self.is_available() {
            return Err(EditorError::NotFound(self.program.clone()));
        }

        debug!(program = %self.program, path = %path.display(), "Launching editor");
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .status()
            .await
            .map_err(|source| EditorError::Launch {
                program: self.program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(EditorError::Failed {
                program: self.program.clone(),
                status,
            })
        }
    }
}

/// Reads answers from standard input.
#[derive(Debug, Default)]
pub struct StdinPrompt;

#[async_trait]
impl Prompt for StdinPrompt {
    async fn ask(&mut self, question: &str) -> io::Result<String> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(question.as_bytes()).await?;
        stdout.flush().await?;

        let mut line = String::new();
        tokio::io::BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await?;
        Ok(line)
    }
}

/// The command that applies an edited artifact later, quoted for a POSIX shell.
pub fn resume_command(program: &str, path: &Path) -> String {
    format!(
        "{} firewall -f {}",
        shell_words::quote(program),
        shell_words::quote(&path.to_string_lossy())
    )
}

/// Name this binary was invoked as, for [`resume_command`].
pub fn current_program() -> String {
    std::env::args_os()
        .next()
        .map_or_else(|| "lhfw".to_string(), |arg| arg.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_editor_precedence() {
        let env = lookup(&[("EDITOR", "nano"), ("VISUAL", "vim"), (EDITOR_ENV, "code --wait")]);
        assert_eq!(editor_command_from(env), vec!["code", "--wait"]);

        let env = lookup(&[("EDITOR", "nano"), ("VISUAL", "vim")]);
        assert_eq!(editor_command_from(env), vec!["vim"]);

        let env = lookup(&[("EDITOR", "nano")]);
        assert_eq!(editor_command_from(env), vec!["nano"]);
    }

    #[test]
    fn test_blank_editor_falls_through() {
        let env = lookup(&[(EDITOR_ENV, "   "), ("EDITOR", "nano")]);
        assert_eq!(editor_command_from(env), vec!["nano"]);
        assert_eq!(editor_command_from(lookup(&[])), vec![FALLBACK_EDITOR]);
    }

    #[test]
    fn test_empty_command_rejected() {
        assert!(matches!(
            ExternalEditor::new(Vec::new()),
            Err(EditorError::EmptyCommand)
        ));
    }

    #[test]
    fn test_resume_command_quotes_path() {
        let cmd = resume_command("lhfw", Path::new("/tmp/my rules.json"));
        assert_eq!(cmd, "lhfw firewall -f '/tmp/my rules.json'");

        let cmd = resume_command("lhfw", Path::new("/tmp/firewall-abc.json"));
        assert_eq!(cmd, "lhfw firewall -f /tmp/firewall-abc.json");
    }

    #[tokio::test]
    async fn test_missing_editor_reports_not_found() {
        let editor =
            ExternalEditor::new(vec!["lhfw-no-such-editor-binary".to_string()]).unwrap();
        let err = editor.edit(Path::new("/tmp/x.json")).await.unwrap_err();
        assert!(matches!(err, EditorError::NotFound(ref p) if p == "lhfw-no-such-editor-binary"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_editor_exit_status_is_checked() {
        let ok = ExternalEditor::new(vec!["true".to_string()]).unwrap();
        assert!(ok.edit(Path::new("/tmp/x.json")).await.is_ok());

        let failing = ExternalEditor::new(vec!["false".to_string()]).unwrap();
        assert!(matches!(
            failing.edit(Path::new("/tmp/x.json")).await,
            Err(EditorError::Failed { .. })
        ));
    }
}
