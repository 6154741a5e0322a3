//! Context items: pieces of workbench state rendered for the model.
//!
//! Two items are the same item when their kind, label and content match;
//! selection ranges and diagnostics do not take part in equality.

use std::hash::{Hash, Hasher};

use benchmate_core::error::MergeError;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::range::{LineRange, merge_ranges};

pub const KIND_SCRIPT: &str = "Script";
pub const KIND_IMAGE: &str = "Image";
pub const KIND_SETTINGS: &str = "Settings";

/// An excerpt of a script document, mergeable with other excerpts of the
/// same document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptExcerpt {
    pub merge_key: String,
    pub name: String,
    pub language: String,
    /// Selected lines; empty means the whole document.
    pub ranges: Vec<LineRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Plain,
    Script(ScriptExcerpt),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextItem {
    kind: String,
    label: String,
    content: String,
    payload: Payload,
}

impl ContextItem {
    pub fn plain(kind: impl Into<String>, label: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            label: label.into(),
            content: content.into(),
            payload: Payload::Plain,
        }
    }

    /// A script excerpt. `content` is the full document text; `ranges`
    /// selects lines within it (none selects the whole document).
    pub fn script(
        merge_key: impl Into<String>,
        name: impl Into<String>,
        language: impl Into<String>,
        content: impl Into<String>,
        ranges: Vec<LineRange>,
        errors: Option<String>,
    ) -> Self {
        let excerpt = ScriptExcerpt {
            merge_key: merge_key.into(),
            name: name.into(),
            language: language.into(),
            ranges: merge_ranges(ranges),
            errors: errors.filter(|e| !e.trim().is_empty()),
        };
        Self {
            kind: KIND_SCRIPT.to_string(),
            label: script_label(&excerpt.name, &excerpt.ranges),
            content: content.into(),
            payload: Payload::Script(excerpt),
        }
    }

    pub fn image(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::plain(KIND_IMAGE, title, description)
    }

    pub fn settings(label: impl Into<String>, content: impl Into<String>) -> Self {
        Self::plain(KIND_SETTINGS, label, content)
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn merge_key(&self) -> Option<&str> {
        match &self.payload {
            Payload::Plain => None,
            Payload::Script(excerpt) => Some(&excerpt.merge_key),
        }
    }

    /// Selected ranges as `"start-end"` strings; empty for plain items and
    /// whole-document excerpts.
    pub fn range_list(&self) -> Vec<String> {
        match &self.payload {
            Payload::Plain => Vec::new(),
            Payload::Script(excerpt) => excerpt.ranges.iter().map(ToString::to_string).collect(),
        }
    }

    /// Human-readable block: a kind/label header followed by the body.
    pub fn render(&self) -> String {
        let mut out = format!("### {}: {}\n", self.kind, self.label);
        match &self.payload {
            Payload::Plain => {
                out.push_str(&self.content);
            }
            Payload::Script(excerpt) => {
                if !excerpt.ranges.is_empty() {
                    out.push_str("Selected lines: ");
                    out.push_str(&self.range_list().join(", "));
                    out.push('\n');
                }
                out.push_str(&format!("```{}\n{}", excerpt.language, self.content));
                if !self.content.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str("```");
                if let Some(errors) = &excerpt.errors {
                    out.push_str("\nErrors:\n");
                    out.push_str(errors);
                }
            }
        }
        out
    }

    /// Fold `others` into this item.
    ///
    /// Only script excerpts merge. Inputs with a different merge key are
    /// ignored. The last input is the most recent one: it supplies the
    /// document text and name, and the most recent non-empty error text wins.
    pub fn merge_with(&self, others: &[ContextItem]) -> Result<ContextItem, MergeError> {
        let Payload::Script(base) = &self.payload else {
            return Err(MergeError::Unsupported {
                kind: self.kind.clone(),
            });
        };

        let mut inputs = vec![(self, base)];
        for other in others {
            match &other.payload {
                Payload::Script(excerpt) if excerpt.merge_key == base.merge_key => {
                    inputs.push((other, excerpt));
                }
                _ => debug!(
                    key = %base.merge_key,
                    label = %other.label,
                    "Skipping context item with a different merge key"
                ),
            }
        }

        let whole_document = inputs.iter().any(|(_, e)| e.ranges.is_empty());
        let ranges = if whole_document {
            Vec::new()
        } else {
            inputs.iter().flat_map(|(_, e)| e.ranges.iter().copied()).collect()
        };
        let errors = inputs.iter().rev().find_map(|(_, e)| e.errors.clone());
        let (latest, latest_excerpt) = inputs[inputs.len() - 1];

        Ok(ContextItem::script(
            base.merge_key.clone(),
            latest_excerpt.name.clone(),
            latest_excerpt.language.clone(),
            latest.content.clone(),
            ranges,
            errors,
        ))
    }
}

fn script_label(name: &str, ranges: &[LineRange]) -> String {
    if ranges.is_empty() {
        return name.to_string();
    }
    let list: Vec<String> = ranges.iter().map(ToString::to_string).collect();
    format!("{name} (lines {})", list.join(", "))
}

impl PartialEq for ContextItem {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.label == other.label && self.content == other.content
    }
}

impl Eq for ContextItem {}

impl Hash for ContextItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.label.hash(state);
        self.content.hash(state);
    }
}
