pub mod call;
pub mod catalog;
pub mod config_cmd;
pub mod context;
pub mod history;
pub mod host;
pub mod providers;
