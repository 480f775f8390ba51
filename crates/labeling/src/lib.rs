pub mod profitable;
pub mod risk_monitor;
pub mod swing;

pub use profitable::{ProfitableLabeler, ProfitableParams};
pub use risk_monitor::RiskMonitorLabeler;
pub use swing::SwingLabeler;
