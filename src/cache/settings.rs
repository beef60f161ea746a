//! Shared Cache Settings
//!
//! Node-level settings the region pools are sized from. Loaded from YAML
//! and/or command-line flags; changing them requires a restart because the
//! on-disk layout is derived from them.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{SMALL_REGION_SIZE, TINY_REGION_SIZE};
use crate::error::{Error, Result};

/// Default large region size (16MB)
pub const DEFAULT_REGION_SIZE: u64 = 16 * 1024 * 1024;

/// Default share of the cache given to small regions
pub const DEFAULT_SMALL_REGION_SHARE: f64 = 0.1;

/// Default share of the cache given to tiny regions
pub const DEFAULT_TINY_REGION_SHARE: f64 = 0.01;

// =============================================================================
// Byte Size
// =============================================================================

/// A number of bytes, parsed from either an integer or a string such as `"4mb"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub const fn kib(n: u64) -> Self {
        Self(n * 1024)
    }

    pub const fn mib(n: u64) -> Self {
        Self(n * 1024 * 1024)
    }

    pub const fn gib(n: u64) -> Self {
        Self(n * 1024 * 1024 * 1024)
    }

    #[inline]
    pub fn bytes(&self) -> u64 {
        self.0
    }
}

impl FromStr for ByteSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(s.len());
        let (digits, unit) = s.split_at(split);

        let value: u64 = digits
            .parse()
            .map_err(|_| Error::Config(format!("invalid byte size: '{}'", s)))?;

        let multiplier: u64 = match unit.trim() {
            "" | "b" => 1,
            "k" | "kb" => 1024,
            "m" | "mb" => 1024 * 1024,
            "g" | "gb" => 1024 * 1024 * 1024,
            "t" | "tb" => 1024 * 1024 * 1024 * 1024,
            other => {
                return Err(Error::Config(format!(
                    "unknown byte size unit '{}' in '{}'",
                    other, s
                )))
            }
        };

        value
            .checked_mul(multiplier)
            .map(ByteSize)
            .ok_or_else(|| Error::Config(format!("byte size '{}' overflows", s)))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [(u64, &str); 4] = [
            (1024 * 1024 * 1024 * 1024, "tb"),
            (1024 * 1024 * 1024, "gb"),
            (1024 * 1024, "mb"),
            (1024, "kb"),
        ];
        for (size, unit) in UNITS {
            if self.0 >= size && self.0 % size == 0 {
                return write!(f, "{}{}", self.0 / size, unit);
            }
        }
        write!(f, "{}b", self.0)
    }
}

impl Serialize for ByteSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(ByteSize(n)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Settings for the shared snapshot cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedCacheSettings {
    /// Total size of the cache file (0 disables the cache)
    pub cache_size: ByteSize,
    /// Size of a large region
    pub region_size: ByteSize,
    /// Fraction of the cache devoted to small regions
    pub small_region_share: f64,
    /// Fraction of the cache devoted to tiny regions
    pub tiny_region_share: f64,
}

impl Default for SharedCacheSettings {
    fn default() -> Self {
        Self {
            cache_size: ByteSize(0),
            region_size: ByteSize(DEFAULT_REGION_SIZE),
            small_region_share: DEFAULT_SMALL_REGION_SHARE,
            tiny_region_share: DEFAULT_TINY_REGION_SHARE,
        }
    }
}

impl SharedCacheSettings {
    /// Settings for a cache of the given total size, defaults elsewhere
    pub fn with_cache_size(cache_size: ByteSize) -> Self {
        Self {
            cache_size,
            ..Default::default()
        }
    }

    /// Parse settings from a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let settings: Self = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&contents)
    }

    /// Check the settings are internally consistent
    pub fn validate(&self) -> Result<()> {
        for (name, share) in [
            ("small_region_share", self.small_region_share),
            ("tiny_region_share", self.tiny_region_share),
        ] {
            if !(0.0..1.0).contains(&share) {
                return Err(Error::InvalidArgument(format!(
                    "{} must be in [0, 1), got {}",
                    name, share
                )));
            }
        }
        if self.small_region_share + self.tiny_region_share >= 1.0 {
            return Err(Error::InvalidArgument(format!(
                "small_region_share + tiny_region_share must be below 1, got {}",
                self.small_region_share + self.tiny_region_share
            )));
        }
        if self.region_size.bytes() == 0 {
            return Err(Error::InvalidArgument(
                "region_size must be greater than 0".to_string(),
            ));
        }
        if self.region_size.bytes() < SMALL_REGION_SIZE {
            return Err(Error::InvalidArgument(format!(
                "region_size [{}] must not be smaller than the small region size [{}]",
                self.region_size,
                ByteSize(SMALL_REGION_SIZE)
            )));
        }
        if self.region_size.bytes() % TINY_REGION_SIZE != 0 {
            return Err(Error::InvalidArgument(format!(
                "region_size [{}] must be a multiple of the tiny region size [{}]",
                self.region_size,
                ByteSize(TINY_REGION_SIZE)
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
