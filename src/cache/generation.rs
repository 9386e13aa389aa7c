//! Cache Generation Module
//!
//! Versioned snapshots of cached content and their naming scheme.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

// == Generation Kind ==
/// Which family of content a generation holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationKind {
    /// App shell pages, stylesheets, scripts, icons
    Static,
    /// Images and API responses
    Dynamic,
}

impl GenerationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationKind::Static => "static",
            GenerationKind::Dynamic => "dynamic",
        }
    }
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "static" => Ok(GenerationKind::Static),
            "dynamic" => Ok(GenerationKind::Dynamic),
            other => Err(Error::Internal(format!("Unknown generation kind: {}", other))),
        }
    }
}

// == Cache Generation ==
/// One versioned, internally consistent snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheGeneration {
    pub name: String,
    pub kind: GenerationKind,
    pub created_at: DateTime<Utc>,
}

// == Generation Names ==
/// Derives generation names from a deployment prefix and version.
#[derive(Debug, Clone)]
pub struct GenerationNames {
    prefix: String,
    version: String,
}

impl GenerationNames {
    pub fn new(prefix: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            version: version.into(),
        }
    }

    /// `{prefix}-{kind}-v{version}`
    pub fn name_for(&self, kind: GenerationKind) -> String {
        format!("{}-{}-v{}", self.prefix, kind, self.version)
    }

    pub fn static_name(&self) -> String {
        self.name_for(GenerationKind::Static)
    }

    pub fn dynamic_name(&self) -> String {
        self.name_for(GenerationKind::Dynamic)
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_names() {
        let names = GenerationNames::new("bella-vista", "1.0.0");
        assert_eq!(names.static_name(), "bella-vista-static-v1.0.0");
        assert_eq!(names.dynamic_name(), "bella-vista-dynamic-v1.0.0");
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("static".parse::<GenerationKind>().unwrap(), GenerationKind::Static);
        assert_eq!("dynamic".parse::<GenerationKind>().unwrap(), GenerationKind::Dynamic);
        assert!("legacy".parse::<GenerationKind>().is_err());
    }
}
