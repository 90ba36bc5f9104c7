//! e2e-builder
//!
//! Runs an end-to-end test runner against an application, optionally
//! starting the application's dev server through the host first.
//!
//! # Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 E2eBuilder::execute(options)                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  options.url_source()        baseUrl xor devServerTarget    │
//! │    ├── Explicit(url) ──────────────────────────┐            │
//! │    ├── Unset ──────────────────────────────────┤            │
//! │    └── DevServer(target)                       │            │
//! │          ├── host.get_target_options()         │            │
//! │          ├── host.schedule_target(overrides)   │            │
//! │          ├── server.result()                   │            │
//! │          ├── derive_base_url() ────────────────┤            │
//! │          │                                     ▼            │
//! │          │               launcher.launch()  (child process) │
//! │          └── server.stop()   on every path                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod base_url;
pub mod builder;
pub mod error;
pub mod launcher;
pub mod options;
pub mod server;

pub use builder::E2eBuilder;
pub use error::{BuilderError, BuilderResult, LaunchError, LaunchResult};
pub use launcher::{ForkLauncher, LaunchRequest, RunnerLauncher, RunnerModule};
pub use options::{RunOptions, RunnerOverrides, UrlSource};
pub use server::{ServerOptions, ServerOverrides};
