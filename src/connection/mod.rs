pub mod registry;

pub use registry::MonitoredConnection;
