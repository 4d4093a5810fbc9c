//! # rdesk-client: desktop window side of a session
//!
//! Frames and session events are produced on worker threads (decoder,
//! clipboard sync, session negotiation) but the desktop window may only
//! be touched on the UI thread. This crate bridges the two:
//!
//! | Module | Role |
//! |---|---|
//! | `task_runner` | `TaskRunner` trait and the UI thread's task queue |
//! | `window` | `DesktopWindow` and `DesktopControl` traits |
//! | `proxy` | `DesktopWindowProxy` delivery facade and `WindowHost` |
//! | `headless` | a window that records instead of rendering |
//! | `loopback` | in-process host side used by the binary |
//! | `config` | TOML configuration |

pub mod config;
pub mod headless;
pub mod loopback;
pub mod proxy;
pub mod task_runner;
pub mod window;

pub use proxy::{DesktopWindowProxy, WindowHost};
pub use task_runner::{Task, TaskRunner, UiTaskQueue, UiTaskRunner};
pub use window::{DesktopControl, DesktopWindow};
