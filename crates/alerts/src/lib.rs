pub mod monitor;
pub mod schedule;
pub mod storage;
pub mod store;

pub use monitor::{AlertMonitor, CheckOutcome, MonitorConfig};
pub use schedule::{Clock, DailySchedule, LocalClock};
pub use storage::{AlertStorage, JsonFileStorage, MemoryStorage};
pub use store::{AlertStore, AlertUpdate};
