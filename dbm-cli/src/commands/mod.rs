// 命令实现模块

mod backup;
mod connection;
mod schedule;
mod serve;

pub use backup::{list_backups, remove_backup};
pub use connection::{add_connection, list_connections, remove_connection, test_connection};
pub use schedule::{
    add_schedule, disable_schedule, enable_schedule, list_schedules, remove_schedule,
    run_schedule_now,
};
pub use serve::run_serve;
