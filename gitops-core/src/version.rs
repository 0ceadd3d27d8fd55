use std::fmt;

use crate::config::ConfigError;

// OpenShift versions are only ever compared on major.minor; patch levels and pre-release or
// build suffixes (`4.15.0-ec.1`, `4.16.3+abc`) are ignored.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct OcpVersion {
    pub major: u64,
    pub minor: u64,
}

impl OcpVersion {
    pub fn parse(s: &str) -> anyhow::Result<OcpVersion> {
        let trimmed = s.trim().trim_start_matches('v');
        let core = trimmed.split(['-', '+']).next().unwrap_or_default();
        let mut parts = core.split('.');

        let major = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| ConfigError::invalid_version(s))?;
        let minor = match parts.next() {
            Some(p) => p.parse().map_err(|_| ConfigError::invalid_version(s))?,
            None => 0,
        };
        if let Some(patch) = parts.next()
            && patch.parse::<u64>().is_err()
        {
            return Err(ConfigError::invalid_version(s));
        }

        Ok(OcpVersion { major, minor })
    }

    pub fn is_at_least(&self, start: &OcpVersion) -> bool {
        !(self.major < start.major || (self.major == start.major && self.minor < start.minor))
    }

    pub fn is_minor(&self, major: u64, minor: u64) -> bool {
        self.major == major && self.minor == minor
    }
}

impl fmt::Display for OcpVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
