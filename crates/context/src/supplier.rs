//! Context suppliers and the workspace view they read from.
//!
//! A supplier turns one kind of workbench state into context items. The
//! host passes its current state in as a [`Workspace`] at call time.

use std::collections::BTreeMap;

use benchmate_core::error::MergeError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::item::{ContextItem, KIND_IMAGE, KIND_SCRIPT, KIND_SETTINGS};
use crate::range::LineRange;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SupplierError {
    #[error("{kind} supplier failed: {reason}")]
    Host { kind: String, reason: String },

    #[error(transparent)]
    Merge(#[from] MergeError),
}

/// A script document open in an editor tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptDocument {
    pub editor_id: usize,
    pub tab: usize,
    pub name: String,
    pub language: String,
    pub text: String,
    #[serde(default)]
    pub selection: Option<LineRange>,
    #[serde(default)]
    pub errors: Option<String>,
}

impl ScriptDocument {
    pub fn merge_key(&self) -> String {
        format!("script:{}:{}", self.editor_id, self.tab)
    }

    /// The document as a context item: the current selection when there is
    /// one, otherwise the whole document.
    pub fn to_item(&self) -> ContextItem {
        ContextItem::script(
            self.merge_key(),
            &self.name,
            &self.language,
            &self.text,
            self.selection.into_iter().collect(),
            self.errors.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub slices: u32,
    pub bit_depth: u8,
}

impl ImageInfo {
    pub fn to_item(&self) -> ContextItem {
        let mut description = format!("{}-bit, {}x{} pixels", self.bit_depth, self.width, self.height);
        if self.slices > 1 {
            description.push_str(&format!(", {} slices", self.slices));
        }
        ContextItem::image(&self.title, description)
    }
}

/// The host state suppliers read from.
pub trait Workspace: Send + Sync {
    /// Every open script document, in editor/tab order.
    fn scripts(&self) -> Vec<ScriptDocument>;

    /// The document in the focused editor tab.
    fn active_script(&self) -> Option<ScriptDocument>;

    fn images(&self) -> Vec<ImageInfo>;

    fn active_image(&self) -> Option<ImageInfo>;

    fn settings(&self) -> BTreeMap<String, String>;

    /// Open a script editor unless one is open already; returns its id.
    fn ensure_script_editor(&self) -> Result<usize, String>;
}

/// A source of context items of one kind.
pub trait ContextSupplier: Send + Sync {
    fn kind(&self) -> &str;

    /// Items that could be attached. Must not change host state.
    fn list_available(&self, workspace: &dyn Workspace) -> Result<Vec<ContextItem>, SupplierError>;

    /// The item for the host's current focus, if any. May open host UI, but
    /// repeated calls must not open it again.
    fn create_active_item(&self, workspace: &dyn Workspace) -> Result<Option<ContextItem>, SupplierError>;
}

pub struct ScriptSupplier;

impl ContextSupplier for ScriptSupplier {
    fn kind(&self) -> &str {
        KIND_SCRIPT
    }

    fn list_available(&self, workspace: &dyn Workspace) -> Result<Vec<ContextItem>, SupplierError> {
        Ok(workspace.scripts().iter().map(ScriptDocument::to_item).collect())
    }

    fn create_active_item(&self, workspace: &dyn Workspace) -> Result<Option<ContextItem>, SupplierError> {
        let editor = workspace
            .ensure_script_editor()
            .map_err(|reason| SupplierError::Host {
                kind: KIND_SCRIPT.into(),
                reason,
            })?;
        debug!(editor, "Script editor ready");
        Ok(workspace.active_script().map(|doc| doc.to_item()))
    }
}

pub struct ImageSupplier;

impl ContextSupplier for ImageSupplier {
    fn kind(&self) -> &str {
        KIND_IMAGE
    }

    fn list_available(&self, workspace: &dyn Workspace) -> Result<Vec<ContextItem>, SupplierError> {
        Ok(workspace.images().iter().map(ImageInfo::to_item).collect())
    }

    fn create_active_item(&self, workspace: &dyn Workspace) -> Result<Option<ContextItem>, SupplierError> {
        Ok(workspace.active_image().map(|image| image.to_item()))
    }
}

pub struct SettingsSupplier;

impl SettingsSupplier {
    fn item(workspace: &dyn Workspace) -> Option<ContextItem> {
        let settings = workspace.settings();
        if settings.is_empty() {
            return None;
        }
        let body = settings
            .iter()
            .map(|(k, v)| format!("{k} = {v}"))
            .collect::<Vec<_>>()
            .join("\n");
        Some(ContextItem::settings("Workbench settings", body))
    }
}

impl ContextSupplier for SettingsSupplier {
    fn kind(&self) -> &str {
        KIND_SETTINGS
    }

    fn list_available(&self, workspace: &dyn Workspace) -> Result<Vec<ContextItem>, SupplierError> {
        Ok(Self::item(workspace).into_iter().collect())
    }

    fn create_active_item(&self, workspace: &dyn Workspace) -> Result<Option<ContextItem>, SupplierError> {
        Ok(Self::item(workspace))
    }
}

/// Everything the suppliers can offer. A failing supplier is logged and
/// skipped.
pub fn gather_available(suppliers: &[&dyn ContextSupplier], workspace: &dyn Workspace) -> Vec<ContextItem> {
    let mut items = Vec::new();
    for supplier in suppliers {
        match supplier.list_available(workspace) {
            Ok(found) => items.extend(found),
            Err(e) => warn!(kind = supplier.kind(), error = %e, "Context supplier failed, skipping"),
        }
    }
    items
}

#[derive(Debug, Default)]
struct WorkspaceState {
    scripts: Vec<ScriptDocument>,
    active_script: Option<usize>,
    images: Vec<ImageInfo>,
    active_image: Option<usize>,
    settings: BTreeMap<String, String>,
    editors: usize,
}

/// A workspace held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryWorkspace {
    state: RwLock<WorkspaceState>,
}

impl InMemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a document; it becomes the active one. Opening a document
    /// implies an open editor.
    pub fn open_script(&self, doc: ScriptDocument) {
        let mut state = self.state.write();
        state.editors = state.editors.max(doc.editor_id + 1);
        state.scripts.push(doc);
        state.active_script = Some(state.scripts.len() - 1);
    }

    /// Select lines in the named document.
    pub fn select(&self, name: &str, selection: Option<LineRange>) -> bool {
        let mut state = self.state.write();
        match state.scripts.iter_mut().find(|d| d.name == name) {
            Some(doc) => {
                doc.selection = selection;
                true
            }
            None => false,
        }
    }

    pub fn open_image(&self, image: ImageInfo) {
        let mut state = self.state.write();
        state.images.push(image);
        state.active_image = Some(state.images.len() - 1);
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.state.write().settings.insert(key.into(), value.into());
    }

    pub fn editor_count(&self) -> usize {
        self.state.read().editors
    }
}

impl Workspace for InMemoryWorkspace {
    fn scripts(&self) -> Vec<ScriptDocument> {
        self.state.read().scripts.clone()
    }

    fn active_script(&self) -> Option<ScriptDocument> {
        let state = self.state.read();
        state.active_script.and_then(|i| state.scripts.get(i).cloned())
    }

    fn images(&self) -> Vec<ImageInfo> {
        self.state.read().images.clone()
    }

    fn active_image(&self) -> Option<ImageInfo> {
        let state = self.state.read();
        state.active_image.and_then(|i| state.images.get(i).cloned())
    }

    fn settings(&self) -> BTreeMap<String, String> {
        self.state.read().settings.clone()
    }

    fn ensure_script_editor(&self) -> Result<usize, String> {
        let mut state = self.state.write();
        if state.editors == 0 {
            state.editors = 1;
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str, tab: usize, selection: Option<LineRange>) -> ScriptDocument {
        ScriptDocument {
            editor_id: 0,
            tab,
            name: name.into(),
            language: "python".into(),
            text: "import imagej\n".into(),
            selection,
            errors: None,
        }
    }

    struct Broken;

    impl ContextSupplier for Broken {
        fn kind(&self) -> &str {
            "Broken"
        }
        fn list_available(&self, _: &dyn Workspace) -> Result<Vec<ContextItem>, SupplierError> {
            Err(SupplierError::Host {
                kind: "Broken".into(),
                reason: "host went away".into(),
            })
        }
        fn create_active_item(&self, _: &dyn Workspace) -> Result<Option<ContextItem>, SupplierError> {
            Ok(None)
        }
    }

    #[test]
    fn script_items_use_editor_and_tab_key() {
        let ws = InMemoryWorkspace::new();
        ws.open_script(doc("doc.py", 1, Some(LineRange::new(3, 5).unwrap())));
        let item = ScriptSupplier.create_active_item(&ws).unwrap().unwrap();
        assert_eq!(item.merge_key(), Some("script:0:1"));
        assert_eq!(item.range_list(), vec!["3-5"]);
    }

    #[test]
    fn ensure_script_editor_is_idempotent() {
        let ws = InMemoryWorkspace::new();
        assert!(ScriptSupplier.create_active_item(&ws).unwrap().is_none());
        assert!(ScriptSupplier.create_active_item(&ws).unwrap().is_none());
        assert_eq!(ws.editor_count(), 1);
    }

    #[test]
    fn failing_supplier_is_skipped() {
        let ws = InMemoryWorkspace::new();
        ws.open_script(doc("a.py", 0, None));
        ws.open_image(ImageInfo {
            title: "blobs.gif".into(),
            width: 256,
            height: 254,
            slices: 1,
            bit_depth: 8,
        });
        ws.set("units", "micron");

        let items = gather_available(&[&ScriptSupplier, &Broken, &ImageSupplier, &SettingsSupplier], &ws);
        let kinds: Vec<&str> = items.iter().map(|i| i.kind()).collect();
        assert_eq!(kinds, vec!["Script", "Image", "Settings"]);
        assert_eq!(items[1].content(), "8-bit, 256x254 pixels");
    }

    #[test]
    fn settings_supplier_absent_when_empty() {
        let ws = InMemoryWorkspace::new();
        assert!(SettingsSupplier.create_active_item(&ws).unwrap().is_none());
        ws.set("b", "2");
        ws.set("a", "1");
        let item = SettingsSupplier.create_active_item(&ws).unwrap().unwrap();
        assert_eq!(item.content(), "a = 1\nb = 2");
    }
}
