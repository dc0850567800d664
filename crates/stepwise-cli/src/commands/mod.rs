//! CLI commands module.

pub mod completions;
pub mod down;
pub mod list;
pub mod new;
pub mod status;
pub mod up;
pub mod validate;
