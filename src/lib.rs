// Library surface for headless/integration tests and reuse.
// The terminal front end lives in main.rs and ui.rs.
pub mod app_dirs;
pub mod config;
pub mod error;
pub mod game;
pub mod logging;
pub mod notifier;
pub mod random;
pub mod record;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod tap_policy;
pub mod tap_rate;

pub use game::Session;
pub use session::{FingerMode, ModeKind, Phase, SessionConfig, SessionSnapshot, Side};
