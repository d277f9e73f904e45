// Command line surface over the conversation store

use crate::config::{StoreConfig, DEFAULT_EXPORT_FILE};
use crate::image::load_attachment;
use crate::models::{Conversation, ConversationInput};
use crate::state::AppState;
use anyhow::{Context, Result};
use chrono::DateTime;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "portkey", version, about = "Local conversation history store")]
pub struct Cli {
    /// Database file (defaults to $PORTKEY_DB_PATH, then the local data directory)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the database if it does not exist yet
    Init,
    /// Store one conversation
    Add {
        #[arg(short, long, default_value = "")]
        message: String,
        /// Image file to attach
        #[arg(long)]
        image: Option<PathBuf>,
        /// Response payload as JSON; plain text is stored as a JSON string
        #[arg(long)]
        response: Option<String>,
        /// Milliseconds since epoch; defaults to now
        #[arg(long)]
        timestamp: Option<i64>,
    },
    /// List conversations, newest first
    List,
    /// Print one conversation as JSON
    Show { id: i64 },
    /// Write all conversations as JSON ("-" for stdout)
    Export {
        #[arg(short, long, default_value = DEFAULT_EXPORT_FILE)]
        output: PathBuf,
    },
    /// Add conversations from an exported JSON file
    Import { input: PathBuf },
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = StoreConfig::resolve(cli.db)?;
    let state = AppState::new(config);
    let stdout = std::io::stdout();
    execute(&state, cli.command, &mut stdout.lock()).await
}

pub async fn execute<W: Write>(state: &AppState, command: Command, out: &mut W) -> Result<()> {
    let store = &state.store;
    match command {
        Command::Init => {
            store.initialize().await?;
            writeln!(out, "Database ready at {}", store.config().database_path.display())?;
        }
        Command::Add {
            message,
            image,
            response,
            timestamp,
        } => {
            let mut input = ConversationInput::new(message, parse_response(response));
            if let Some(path) = image {
                let attachment = load_attachment(&path).await?;
                input = input.with_image(attachment.data_uri, attachment.filename);
            }
            if let Some(ts) = timestamp {
                input = input.with_timestamp(ts);
            }
            let id = store.add(input).await?;
            writeln!(out, "{}", id)?;
        }
        Command::List => {
            let conversations = store.list_all().await?;
            if conversations.is_empty() {
                writeln!(out, "No conversation history yet.")?;
            }
            for conversation in &conversations {
                writeln!(out, "{}", history_line(conversation))?;
            }
        }
        Command::Show { id } => match store.get_by_id(id).await? {
            Some(conversation) => {
                writeln!(out, "{}", serde_json::to_string_pretty(&conversation)?)?;
            }
            None => {
                log::warn!("Conversation not found: {}", id);
                writeln!(out, "Conversation {} not found", id)?;
            }
        },
        Command::Export { output } => {
            let text = store.export_as_text().await?;
            if output.as_os_str() == "-" {
                writeln!(out, "{}", text)?;
            } else {
                tokio::fs::write(&output, text)
                    .await
                    .context(format!("Failed to write export to '{}'", output.display()))?;
                writeln!(out, "Exported to {}", output.display())?;
            }
        }
        Command::Import { input } => {
            let text = tokio::fs::read_to_string(&input)
                .await
                .context(format!("Failed to read import file '{}'", input.display()))?;
            let imported = store
                .try_import_from_text(&text)
                .await
                .context(format!("Failed to import '{}'", input.display()))?;
            writeln!(out, "Imported {} conversations", imported)?;
        }
    }
    Ok(())
}

fn parse_response(raw: Option<String>) -> Value {
    match raw {
        Some(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        None => Value::Null,
    }
}

fn history_line(conversation: &Conversation) -> String {
    let when = DateTime::from_timestamp_millis(conversation.timestamp)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| conversation.timestamp.to_string());
    let marker = if conversation.has_image() { " [image]" } else { "" };
    format!("{}\t{}\t{}{}", conversation.id, when, conversation.preview(), marker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn test_state(dir: &TempDir) -> AppState {
        AppState::new(StoreConfig::in_dir(dir.path()))
    }

    async fn exec(state: &AppState, args: &[&str]) -> Result<String> {
        let cli = Cli::try_parse_from(std::iter::once("portkey").chain(args.iter().copied()))?;
        let mut out = Vec::new();
        execute(state, cli.command, &mut out).await?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn response_argument_accepts_json_or_text() {
        assert_eq!(parse_response(Some(r#"{"a":1}"#.into())), json!({"a": 1}));
        assert_eq!(parse_response(Some("plain words".into())), json!("plain words"));
        assert_eq!(parse_response(None), Value::Null);
    }

    #[tokio::test]
    async fn add_list_and_show() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);

        let id = exec(&state, &["add", "-m", "hello", "--timestamp", "0"]).await.unwrap();
        assert_eq!(id.trim(), "1");

        let listed = exec(&state, &["list"]).await.unwrap();
        assert_eq!(listed, "1\t1970-01-01 00:00:00\thello\n");

        let shown = exec(&state, &["show", "1"]).await.unwrap();
        let conversation: Conversation = serde_json::from_str(&shown).unwrap();
        assert_eq!(conversation.message, "hello");

        let missing = exec(&state, &["show", "5"]).await.unwrap();
        assert_eq!(missing.trim(), "Conversation 5 not found");
    }

    #[tokio::test]
    async fn add_with_image_marks_history_line() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let image_path = dir.path().join("pic.gif");
        std::fs::write(&image_path, b"GIF89a").unwrap();

        exec(&state, &["add", "--image", image_path.to_str().unwrap()]).await.unwrap();

        let stored = state.store.get_by_id(1).await.unwrap().unwrap();
        assert_eq!(stored.image_filename.as_deref(), Some("pic.gif"));
        assert!(stored.image.unwrap().starts_with("data:image/gif;base64,"));
        assert!(exec(&state, &["list"]).await.unwrap().trim_end().ends_with("[image]"));
    }

    #[tokio::test]
    async fn export_file_imports_back() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        exec(&state, &["add", "-m", "one", "--response", r#"{"ok":true}"#]).await.unwrap();
        exec(&state, &["add", "-m", "two"]).await.unwrap();

        let file = dir.path().join("out.json");
        exec(&state, &["export", "-o", file.to_str().unwrap()]).await.unwrap();
        let imported = exec(&state, &["import", file.to_str().unwrap()]).await.unwrap();

        assert_eq!(imported.trim(), "Imported 2 conversations");
        assert_eq!(state.store.count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn import_of_malformed_file_fails() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        let file = dir.path().join("bad.json");
        std::fs::write(&file, "not json").unwrap();

        assert!(exec(&state, &["import", file.to_str().unwrap()]).await.is_err());
        assert_eq!(state.store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_history_has_placeholder() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir);
        assert_eq!(exec(&state, &["list"]).await.unwrap(), "No conversation history yet.\n");
    }
}
