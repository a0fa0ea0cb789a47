pub mod log;
pub mod pidfile;
pub mod term;
pub mod which;
