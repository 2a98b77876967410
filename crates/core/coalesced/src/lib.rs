#[macro_use]
extern crate log;

mod config;
mod entry;
mod error;
mod registry;
mod service;

pub mod hooks;
pub mod interceptor;
pub mod key;
pub mod method;
pub mod request;
pub mod transport;
pub mod window;

pub use config::CoalescionServiceConfig;
pub use entry::{Outcome, PendingEntry};
pub use error::Error;
pub use hooks::{CountingStats, EventListener, Hooks, StatsSink};
pub use interceptor::{CollapsingInterceptor, Context};
pub use key::{derive_identity, RequestIdentity};
pub use method::is_collapsible;
pub use registry::{Acquired, CoalescingRegistry, Follower, Leader};
pub use request::Request;
pub use service::CoalescionService;
pub use transport::{CollapsingTransport, Transport};
pub use window::WindowScheduler;
