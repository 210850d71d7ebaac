pub mod runner;

pub use runner::Scheduler;
