//! File-based conversation store.
//!
//! Each conversation is a pretty-printed JSON file named after the
//! conversation, e.g. `~/.benchmate/history/Segment_nuclei.json`. Writes go
//! to a temporary file first and are renamed into place.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use benchmate_core::error::PersistenceError;
use benchmate_core::message::Conversation;
use benchmate_core::store::{ConversationStore, LoadReport, SkippedConversation};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const EXTENSION: &str = "json";

pub struct FileStore {
    dir: PathBuf,
    /// Serializes writers so a save and a delete never interleave.
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `name`.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, PersistenceError> {
        let stem = file_stem(name);
        if stem.is_empty() {
            return Err(PersistenceError::Invalid {
                name: name.to_string(),
                reason: "conversation name must contain a letter or digit".into(),
            });
        }
        Ok(self.dir.join(format!("{stem}.{EXTENSION}")))
    }

    async fn read_file(path: &Path) -> Result<Conversation, PersistenceError> {
        let source = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let text = tokio::fs::read_to_string(path).await.map_err(|e| io_error(path, e))?;
        let conversation: Conversation =
            serde_json::from_str(&text).map_err(|e| PersistenceError::Corrupt {
                name: source.clone(),
                reason: e.to_string(),
            })?;
        conversation
            .validate()
            .map_err(|reason| PersistenceError::Invalid { name: source, reason })?;
        Ok(conversation)
    }

    /// Refuse to touch a file that holds a different conversation whose
    /// name sanitizes to the same path. Unreadable files are not guarded.
    async fn check_owner(path: &Path, name: &str) -> Result<(), PersistenceError> {
        if !tokio::fs::try_exists(path).await.map_err(|e| io_error(path, e))? {
            return Ok(());
        }
        match Self::read_file(path).await {
            Ok(existing) if existing.name != name => Err(PersistenceError::Invalid {
                name: name.to_string(),
                reason: format!(
                    "file {} already holds conversation '{}'",
                    path.display(),
                    existing.name
                ),
            }),
            _ => Ok(()),
        }
    }

    async fn json_files(&self) -> Result<Vec<PathBuf>, PersistenceError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.dir, e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(&self.dir, e))? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == EXTENSION) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Letters, digits, `-` and `_` survive; anything else becomes `_`.
fn file_stem(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.chars().any(char::is_alphanumeric) {
        stem
    } else {
        String::new()
    }
}

fn io_error(path: &Path, e: std::io::Error) -> PersistenceError {
    PersistenceError::Io {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

#[async_trait]
impl ConversationStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), PersistenceError> {
        conversation.validate().map_err(|reason| PersistenceError::Invalid {
            name: conversation.name.clone(),
            reason,
        })?;
        let path = self.path_for(&conversation.name)?;
        let json = serde_json::to_string_pretty(conversation).map_err(|e| PersistenceError::Corrupt {
            name: conversation.name.clone(),
            reason: e.to_string(),
        })?;

        let _guard = self.write_lock.lock().await;
        Self::check_owner(&path, &conversation.name).await?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, e))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(|e| io_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| io_error(&path, e))?;

        debug!(name = %conversation.name, turns = conversation.turns.len(), path = %path.display(), "Conversation saved");
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<Conversation, PersistenceError> {
        let path = self.path_for(name)?;
        if !tokio::fs::try_exists(&path).await.map_err(|e| io_error(&path, e))? {
            return Err(PersistenceError::NotFound(name.to_string()));
        }
        let conversation = Self::read_file(&path).await?;
        if conversation.name != name {
            // Two names that sanitize to the same file.
            return Err(PersistenceError::NotFound(name.to_string()));
        }
        Ok(conversation)
    }

    async fn load_all(&self) -> Result<LoadReport, PersistenceError> {
        let mut report = LoadReport::default();
        for path in self.json_files().await? {
            match Self::read_file(&path).await {
                Ok(conversation) => report.conversations.push(conversation),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable conversation");
                    report.skipped.push(SkippedConversation {
                        source: path.display().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        debug!(
            loaded = report.conversations.len(),
            skipped = report.skipped.len(),
            "Loaded conversation history"
        );
        Ok(report)
    }

    async fn list(&self) -> Result<Vec<String>, PersistenceError> {
        let report = self.load_all().await?;
        let mut names: Vec<String> = report.conversations.into_iter().map(|c| c.name).collect();
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<bool, PersistenceError> {
        let path = self.path_for(name)?;
        let _guard = self.write_lock.lock().await;
        if Self::check_owner(&path, name).await.is_err() {
            return Ok(false);
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(name, "Conversation deleted");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchmate_core::message::{Memory, MemoryType, Turn};
    use benchmate_core::tool::ToolCall;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample(name: &str) -> Conversation {
        let mut conv = Conversation::new(name, "You are a microscopy assistant.");
        conv.push(Turn::visible(Memory::user("Blur the image")));
        conv.push(Turn::new(
            Some("Running Gaussian Blur".into()),
            Memory::Ai {
                content: String::new(),
                tool_calls: vec![ToolCall::new(
                    "call_1",
                    "runCommand",
                    json!({"menuPath": "Process>Filters>Gaussian Blur..."}),
                )],
            },
        ));
        conv.push(Turn::hidden(Memory::tool_result("call_1", "Ran 'Gaussian Blur'.")));
        conv
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("history"));
        let conv = sample("Blur test");

        store.save(&conv).await.unwrap();
        assert!(tmp.path().join("history/Blur_test.json").exists());

        let loaded = store.load("Blur test").await.unwrap();
        assert_eq!(loaded, conv);
        let types: Vec<MemoryType> = loaded.memories().map(Memory::memory_type).collect();
        assert_eq!(
            types,
            vec![MemoryType::System, MemoryType::User, MemoryType::Ai, MemoryType::ToolResult]
        );
    }

    #[tokio::test]
    async fn corrupt_file_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().to_path_buf());
        store.save(&sample("good")).await.unwrap();
        std::fs::write(tmp.path().join("broken.json"), "{ not json").unwrap();
        std::fs::write(
            tmp.path().join("odd.json"),
            r#"{"name":"odd","systemMessage":"s","turns":[{"displayText":null,"memory":{"type":"ROBOT","content":"x"},"timestamp":"2026-01-01T00:00:00Z"}]}"#,
        )
        .unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let report = store.load_all().await.unwrap();
        assert_eq!(report.conversations.len(), 1);
        assert_eq!(report.conversations[0].name, "good");
        assert_eq!(report.skipped.len(), 2);
        assert!(report.skipped.iter().any(|s| s.source.ends_with("broken.json")));
    }

    #[tokio::test]
    async fn conversation_without_system_turn_is_invalid() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().to_path_buf());
        let mut conv = sample("bad");
        conv.turns.remove(0);

        let err = store.save(&conv).await.unwrap_err();
        assert!(matches!(err, PersistenceError::Invalid { .. }));
    }

    #[tokio::test]
    async fn missing_directory_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("nope"));
        let report = store.load_all().await.unwrap();
        assert!(report.conversations.is_empty());
        assert!(store.list().await.unwrap().is_empty());
        assert!(matches!(store.load("x").await.unwrap_err(), PersistenceError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_and_list() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().to_path_buf());
        store.save(&sample("b")).await.unwrap();
        store.save(&sample("a")).await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec!["a", "b"]);

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert_eq!(store.list().await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn colliding_names_do_not_overwrite() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().to_path_buf());
        store.save(&sample("a_b")).await.unwrap();

        let err = store.save(&sample("a b")).await.unwrap_err();
        assert!(matches!(err, PersistenceError::Invalid { ref name, .. } if name == "a b"));
        assert!(!store.delete("a b").await.unwrap());

        let kept = store.load("a_b").await.unwrap();
        assert_eq!(kept.name, "a_b");
        assert_eq!(kept.turns.len(), 4);
        // Saving the owner again still works.
        store.save(&sample("a_b")).await.unwrap();
    }

    #[test]
    fn names_are_sanitized() {
        assert_eq!(file_stem("../etc/passwd"), "___etc_passwd");
        assert_eq!(file_stem("  ..  "), "");
        let store = FileStore::new(PathBuf::from("/h"));
        assert!(store.path_for("///").is_err());
    }
}
