//! Script editor capability: read, create and rewrite scripts in the
//! workbench's script editor.

use std::sync::Arc;

use benchmate_core::capability::{Action, ActionOutput, Arguments, Capability, ParamType};
use benchmate_core::error::ActionError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// A script open in the host's editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub name: String,
    pub language: String,
    pub text: String,
}

/// Host side of the script editor.
pub trait ScriptHost: Send + Sync {
    /// Names of the open scripts, active one first.
    fn list(&self) -> Vec<String>;

    /// A script by name, or the active script when `name` is `None`.
    fn read(&self, name: Option<&str>) -> Result<Script, String>;

    /// Open a new script and make it active.
    fn create(&self, script: Script) -> Result<(), String>;

    /// Replace the text of a script (the active one when `name` is `None`).
    fn replace_text(&self, name: Option<&str>, text: &str) -> Result<(), String>;
}

pub struct ScriptEditorCapability {
    host: Arc<dyn ScriptHost>,
}

impl ScriptEditorCapability {
    pub fn new(host: Arc<dyn ScriptHost>) -> Self {
        Self { host }
    }
}

impl Capability for ScriptEditorCapability {
    fn display_name(&self) -> &str {
        "Script Editor"
    }

    fn usage(&self) -> &str {
        "Inspect and edit scripts open in the script editor. Read a script before \
         changing it; updates replace the whole script text."
    }

    fn actions(&self) -> Vec<Action> {
        let list_host = self.host.clone();
        let read_host = self.host.clone();
        let create_host = self.host.clone();
        let update_host = self.host.clone();

        vec![
            Action::new("listScripts", "List the scripts open in the editor.", move |_args, _cancel| {
                let host = list_host.clone();
                async move {
                    let names = on_host(host, |host| Ok(host.list())).await?;
                    if names.is_empty() {
                        Ok(ActionOutput::text("No scripts are open."))
                    } else {
                        Ok(ActionOutput::text(names.join("\n")))
                    }
                }
            }),
            Action::new(
                "readScript",
                "Read a script's source. Reads the active script when no name is given.",
                move |args: Arguments, _cancel| {
                    let host = read_host.clone();
                    async move {
                        let name = args.opt_str("name").map(str::to_string);
                        let script = on_host(host, move |host| {
                            host.read(name.as_deref()).map_err(ActionError::Failed)
                        })
                        .await?;
                        Ok(ActionOutput::text(format!(
                            "// {} ({})\n{}",
                            script.name, script.language, script.text
                        )))
                    }
                },
            )
            .optional("name", ParamType::String, "Script name"),
            Action::new(
                "createScript",
                "Open a new script in the editor.",
                move |args: Arguments, _cancel| {
                    let host = create_host.clone();
                    async move { on_host(host, move |host| create_script(host, &args)).await }
                },
            )
            .required("name", ParamType::String, "File name, e.g. 'segment.py'")
            .required("language", ParamType::String, "Script language, e.g. 'python'")
            .optional("content", ParamType::String, "Initial source"),
            Action::new(
                "updateScript",
                "Replace the full text of a script. Updates the active script when no name is given.",
                move |args: Arguments, _cancel| {
                    let host = update_host.clone();
                    async move { on_host(host, move |host| update_script(host, &args)).await }
                },
            )
            .required("content", ParamType::String, "New script source")
            .optional("name", ParamType::String, "Script name"),
        ]
    }
}

/// Run a synchronous editor call on the blocking pool so a slow or
/// panicking host stays inside the dispatcher's bounded wait.
async fn on_host<T, F>(host: Arc<dyn ScriptHost>, call: F) -> Result<T, ActionError>
where
    T: Send + 'static,
    F: FnOnce(&dyn ScriptHost) -> Result<T, ActionError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || call(host.as_ref()))
        .await
        .map_err(|e| ActionError::failed(format!("script editor call failed: {e}")))?
}

fn create_script(host: &dyn ScriptHost, args: &Arguments) -> Result<ActionOutput, ActionError> {
    let script = Script {
        name: args.str("name")?.trim().to_string(),
        language: args.str("language")?.trim().to_string(),
        text: args.opt_str("content").unwrap_or_default().to_string(),
    };
    let name = script.name.clone();
    host.create(script).map_err(ActionError::Failed)?;
    Ok(ActionOutput::text(format!("Created script '{name}'.")))
}

fn update_script(host: &dyn ScriptHost, args: &Arguments) -> Result<ActionOutput, ActionError> {
    let content = args.str("content")?;
    host.replace_text(args.opt_str("name"), content)
        .map_err(ActionError::Failed)?;
    Ok(ActionOutput::text("Script updated."))
}

/// Scripts held in memory; the most recently created one is active.
#[derive(Debug, Default)]
pub struct InMemoryScripts {
    scripts: Mutex<Vec<Script>>,
}

impl InMemoryScripts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(self, name: &str, language: &str, text: &str) -> Self {
        self.scripts.lock().insert(
            0,
            Script {
                name: name.into(),
                language: language.into(),
                text: text.into(),
            },
        );
        self
    }
}

impl ScriptHost for InMemoryScripts {
    fn list(&self) -> Vec<String> {
        self.scripts.lock().iter().map(|s| s.name.clone()).collect()
    }

    fn read(&self, name: Option<&str>) -> Result<Script, String> {
        let scripts = self.scripts.lock();
        match name {
            Some(name) => scripts.iter().find(|s| s.name == name).cloned(),
            None => scripts.first().cloned(),
        }
        .ok_or_else(|| match name {
            Some(name) => format!("No open script named '{name}'"),
            None => "No script is open".to_string(),
        })
    }

    fn create(&self, script: Script) -> Result<(), String> {
        let mut scripts = self.scripts.lock();
        if scripts.iter().any(|s| s.name == script.name) {
            return Err(format!("A script named '{}' is already open", script.name));
        }
        scripts.insert(0, script);
        Ok(())
    }

    fn replace_text(&self, name: Option<&str>, text: &str) -> Result<(), String> {
        let mut scripts = self.scripts.lock();
        let target = match name {
            Some(name) => scripts.iter_mut().find(|s| s.name == name),
            None => scripts.first_mut(),
        };
        match target {
            Some(script) => {
                script.text = text.to_string();
                Ok(())
            }
            None => Err("No matching script is open".to_string()),
        }
    }
}
