//! 平台后端：所有系统命令的调用和输出解析都在这里，编排层只看到 traits。

pub mod command;
pub mod mock;
pub mod netsh;
pub mod nmcli;
pub mod utils;

pub use command::SystemRunner;
