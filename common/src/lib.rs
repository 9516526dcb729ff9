pub mod button;
pub mod config;
pub mod health;
pub mod indicator;
pub mod platform;
pub mod topics;
pub mod uptime;

pub use button::ButtonPublisher;
pub use config::{NetworkConfig, NodeConfig, RuntimeConfig};
pub use health::{ConnectivityState, DiagnosticsSnapshot, HealthMonitor};
pub use indicator::AlertIndicator;
pub use platform::{IndicatorDriver, MessagingClient, Qos, SystemInfo};
pub use topics::*;
pub use uptime::format_uptime;
