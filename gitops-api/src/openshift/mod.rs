mod cluster_version;
mod console;
mod deployment_config;
mod route;

pub use cluster_version::*;
pub use console::*;
pub use deployment_config::*;
pub use route::*;
