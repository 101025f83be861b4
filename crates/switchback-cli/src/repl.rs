//! REPL mode for interactive conversations.

use std::fs;
use std::future::Future;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use switchback::{
    CoreError, ModelClient, Orchestrator, RespondResult, Session, SessionSnapshot, SharedSession,
    ToolRegistry,
};

use crate::config::CliConfig;
use crate::display::{display_assistant, display_error, display_item, display_usage};

/// Everything the REPL drives.
pub struct Repl<C: ModelClient> {
    pub orchestrator: Orchestrator<C>,
    pub session: SharedSession,
    pub tools: ToolRegistry,
}

impl<C: ModelClient> Repl<C> {
    /// Runs the REPL loop until Ctrl-D.
    ///
    /// # Errors
    ///
    /// Returns an error if the line editor cannot be initialized.
    pub async fn run(&self) -> Result<()> {
        println!("{}", "Switchback REPL".bright_magenta().bold());
        println!("{}", "Type :help for commands, Ctrl-D to exit".dimmed());
        println!();

        let mut rl = DefaultEditor::new()?;
        let history_path = CliConfig::history_path();
        if let Some(path) = &history_path
            && rl.load_history(path).is_err()
        {
            log::debug!("No previous history at {}", path.display());
        }

        loop {
            match rl.readline(&format!("{} ", ">".bright_green())) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(line);

                    if line == ":retry" {
                        self.retry().await;
                        continue;
                    }

                    if let Some(command) = line.strip_prefix(':') {
                        if let Err(e) = self.handle_command(command) {
                            display_error(format!("{e:#}"));
                        }
                        continue;
                    }

                    self.send(line).await;
                }
                Err(ReadlineError::Interrupted) => {
                    println!("Interrupted");
                }
                Err(ReadlineError::Eof) => {
                    println!("Exiting");
                    break;
                }
                Err(err) => {
                    display_error(err);
                    break;
                }
            }
        }

        if let Some(path) = &history_path {
            if let Some(dir) = path.parent() {
                let _ = fs::create_dir_all(dir);
            }
            if let Err(e) = rl.save_history(path) {
                log::warn!("Failed to save history: {e}");
            }
        }
        Ok(())
    }

    /// Sends one user turn; Ctrl-C cancels the in-flight round.
    async fn send(&self, line: &str) {
        let respond = self.session.respond(&self.orchestrator, line);
        self.finish(respond).await;
    }

    /// Reruns the last unanswered turn.
    async fn retry(&self) {
        let retry = self.session.retry(&self.orchestrator);
        self.finish(retry).await;
    }

    async fn finish(&self, call: impl Future<Output = RespondResult>) {
        tokio::pin!(call);

        let result = tokio::select! {
            result = &mut call => result,
            _ = tokio::signal::ctrl_c() => {
                self.session.cancel();
                call.await
            }
        };

        match result {
            Ok(reply) => {
                match reply.final_text() {
                    Some(text) => display_assistant(text),
                    None => println!("{}", "(no answer)".dimmed()),
                }
                display_usage(&reply.usage);
            }
            Err(e) => {
                for text in &e.partial.assistant_turns {
                    display_assistant(text);
                }
                match e.error {
                    CoreError::Cancelled => println!("{}", "Cancelled".yellow()),
                    error => {
                        let retryable = error.is_retryable();
                        display_error(error);
                        if retryable {
                            println!("{}", "Type :retry to try again".dimmed());
                        }
                    }
                }
            }
        }
    }

    fn handle_command(&self, command: &str) -> Result<()> {
        let parts: Vec<&str> = command.split_whitespace().collect();
        match parts.as_slice() {
            ["help"] => print_help(),
            ["history"] => {
                let snapshot = self.session.snapshot()?;
                if snapshot.items.is_empty() {
                    println!("No messages in this session");
                }
                for (index, item) in snapshot.items.iter().enumerate() {
                    display_item(index, item);
                }
            }
            ["save", path] => {
                save_snapshot(&self.session.snapshot()?, Path::new(path))?;
                println!("{} Saved session to {path}", "✓".bright_green());
            }
            ["load", path] => {
                let snapshot = load_snapshot(Path::new(path))?;
                let count = snapshot.items.len();
                self.session
                    .replace(Session::restore(snapshot, self.tools.clone()))?;
                println!("{} Loaded {count} item(s) from {path}", "✓".bright_green());
            }
            _ => {
                anyhow::bail!(
                    "Unknown command: :{}\nType :help for available commands",
                    parts.join(" ")
                );
            }
        }
        Ok(())
    }
}

fn print_help() {
    println!("{}", "REPL Commands:".bright_cyan().bold());
    println!("  {} - Show the conversation log", ":history".bright_yellow());
    println!("  {} - Resend the last unanswered turn", ":retry".bright_yellow());
    println!("  {} - Save the session as JSON", ":save <path>".bright_yellow());
    println!("  {} - Replace the session from a saved file", ":load <path>".bright_yellow());
    println!("  {} - Show this help message", ":help".bright_yellow());
    println!("  {} - Cancel the running request", "Ctrl-C".bright_yellow());
    println!("  {} - Exit the REPL", "Ctrl-D".bright_yellow());
    println!();
}

/// Writes a session snapshot as pretty JSON.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn save_snapshot(snapshot: &SessionSnapshot, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// Reads a session snapshot written by [`save_snapshot`].
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a snapshot.
pub fn load_snapshot(path: &Path) -> Result<SessionSnapshot> {
    let json =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("{} is not a saved session", path.display()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use switchback::ConversationItem;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_snapshot_file_round_trip() {
        let path = std::env::temp_dir().join(format!("switchback-{}.json", Uuid::new_v4()));
        let session = Session::new().with_instructions("Be brief.");
        let mut snapshot = session.snapshot();
        snapshot.items.push(ConversationItem::user("Hello"));

        save_snapshot(&snapshot, &path).unwrap();
        let loaded = load_snapshot(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(loaded.items, snapshot.items);
        assert_eq!(loaded.instructions.as_deref(), Some("Be brief."));
    }

    #[test]
    fn test_load_rejects_other_json() {
        let path = std::env::temp_dir().join(format!("switchback-{}.json", Uuid::new_v4()));
        fs::write(&path, r#"{"hello": "world"}"#).unwrap();
        let err = load_snapshot(&path).unwrap_err();
        let _ = fs::remove_file(&path);

        assert!(err.to_string().contains("is not a saved session"));
    }
}
