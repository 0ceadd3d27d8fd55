mod constants;
mod crs;
mod fake;
mod objs;

pub use constants::*;
pub use crs::*;
pub use fake::*;
pub use objs::*;
