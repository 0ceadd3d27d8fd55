mod env;
mod resolve;

pub use env::*;
pub use resolve::*;

use crate::errors::*;

err_impl! {pub ConfigError,
    #[error("invalid label selector {0:?}: only a single key=value term is supported")]
    InvalidLabelSelector(String),

    #[error("invalid version string: {0:?}")]
    InvalidVersion(String),
}

#[cfg(test)]
mod tests;
