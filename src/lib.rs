pub mod applet;
pub mod config;
pub mod constants;
pub mod driver;
pub mod error;
pub mod mode;
pub mod namespace;
pub mod runner;
pub mod script;

pub use driver::{Callback, Event, Host, HostGlue, SketchDriver, HOST_BINDING};
pub use error::{RendererChange, SketchError};
pub use mode::ExecutionMode;
pub use script::{Script, Session};
