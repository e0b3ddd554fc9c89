pub mod config;
pub mod economy;
pub mod run;
mod session;
