use std::fmt;

use serde::{Deserialize, Serialize};

/// Name and version of a running cachefs binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub name: String,
    pub version: String,
    pub profile: String,
}

impl BuildInfo {
    pub fn new(name: &str, version: &str) -> Self {
        let profile = if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        };
        Self {
            name: name.to_string(),
            version: version.to_string(),
            profile: profile.to_string(),
        }
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.name, self.version, self.profile)
    }
}

/// Build info for the crate invoking the macro.
#[macro_export]
macro_rules! build_info {
    () => {
        $crate::version::BuildInfo::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_build_info_macro() {
        let info = build_info!();
        assert_eq!(info.name, "cachefs-common");
        assert!(info.to_string().starts_with("cachefs-common "));
    }
}
