pub mod click_monitor;

pub use click_monitor::ClickMonitor;
