//! Built-in capability providers.
//!
//! Each provider is written against a small host trait so the workbench
//! (or a test) supplies the actual commands and scripts.

pub mod commands;
pub mod scripts;

pub use commands::{CommandHost, CommandInfo, CommandsCapability, MenuCommands};
pub use scripts::{InMemoryScripts, Script, ScriptEditorCapability, ScriptHost};
