pub mod alert;
pub mod scanner;
pub mod schedule;
pub mod signal_log;

pub use alert::{AlertSink, LogAlertSink, TelegramAlertSink};
pub use scanner::{CycleReport, Scanner};
pub use signal_log::CsvSignalLog;
