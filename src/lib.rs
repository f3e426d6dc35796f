// Library root
// -----------
// This crate exposes the upload machinery behind the interactive CLI. The
// binary (`main.rs`) wires these modules together.
//
// Module responsibilities:
// - `config`: the persisted JSON document (remote URL, token, tags).
// - `layout`: the fixed directory convention under the base directory.
// - `git`: the version-control gateway over the `git` executable.
// - `upload`: validation, naming and the copy/commit/push workflow.
// - `ui`: the terminal form that drives an upload.
// - `error`: error kinds shown to the user.
pub mod config;
pub mod error;
pub mod git;
pub mod layout;
pub mod ui;
pub mod upload;

pub use error::{Error, Result};
