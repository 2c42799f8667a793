pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod filter;
pub mod registrar;
pub mod render;
pub mod watcher;

pub use dispatch::{DispatchStats, Dispatcher};
pub use error::{ParseOpError, TemplateError, WatchError};
pub use events::{Event, Op};
pub use filter::{matches, EventFilter};
pub use registrar::{register_all, register_path, WatchRegistry};
pub use render::{Renderer, Template};
pub use watcher::{Backend, EventSink, EventStreams, WatchSession};
