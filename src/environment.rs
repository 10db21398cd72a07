//! The fixed set of deployment environments every project occupies.
//!
//! Every project exists in all three environments simultaneously; the
//! registry order is the fan-out order everywhere (`live` goes last so its
//! vhost is written after `dev`/`test` have validated the template).

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// One of the three deployment stages a project occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Environment {
    Dev,
    Test,
    Live,
}

impl Environment {
    /// The full registry, in fan-out order.
    pub const REGISTRY: [Environment; 3] =
        [Environment::Dev, Environment::Test, Environment::Live];

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Test => "test",
            Environment::Live => "live",
        }
    }

    /// `live` vhost and job filenames carry a `000_` prefix so lexical
    /// sorting places them predictably among the server's vhost files.
    pub fn is_live(self) -> bool {
        matches!(self, Environment::Live)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "test" => Ok(Environment::Test),
            "live" => Ok(Environment::Live),
            other => Err(Error::InvalidArgument(format!(
                "unknown environment '{}' (expected dev, test, or live)",
                other
            ))),
        }
    }
}
