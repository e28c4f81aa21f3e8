pub mod controller;
pub mod gateway;
pub mod runtime;

pub use controller::{BoundSubtask, PomodoroController, TimerDurations, TimerError};
pub use gateway::{GatewayError, PgPomodoroGateway, PomodoroGateway};
pub use runtime::{spawn_ticker, TerminalBell, TimerService};
