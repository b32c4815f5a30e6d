mod log;

pub use log::RecordLog;
