//! Headless terminal client for Cutroom project chat.
//!
//! A thin shell over [`cutroom_app::Driver`] that provides line-based
//! terminal I/O. All orchestration logic lives in the generic
//! [`cutroom_app::Runtime`]; this crate only parses prompt lines, prints the
//! chat and owns the real socket.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod command;
pub mod system_env;
pub mod terminal;
pub mod view;

pub use command::{Command, CommandError};
pub use system_env::SystemEnv;
pub use terminal::{TerminalDriver, TerminalError};
pub use view::ChatView;
