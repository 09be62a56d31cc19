//! Runtime module — process lifecycle: boot, attach, shutdown, dump.

pub mod boot;
pub mod dump;
pub mod run;
pub mod stop;
