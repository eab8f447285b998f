//! Producer versions and build flags
//!
//! Every serialized file records the version of the tool that produced it
//! (e.g. `5.6.1f1`) and the platform it was built for. Together they decide
//! which fields an asset carries on disk.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Release channel of a producer version, ordered alpha < beta < final < patch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VersionKind {
    Alpha,
    Beta,
    Final,
    Patch,
}

impl VersionKind {
    fn from_char(c: char) -> Option<Self> {
        match c {
            'a' => Some(Self::Alpha),
            'b' => Some(Self::Beta),
            'f' => Some(Self::Final),
            'p' => Some(Self::Patch),
            _ => None,
        }
    }

    fn as_char(self) -> char {
        match self {
            Self::Alpha => 'a',
            Self::Beta => 'b',
            Self::Final => 'f',
            Self::Patch => 'p',
        }
    }
}

/// Producer tool version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    pub kind: VersionKind,
    pub build: u8,
}

impl Version {
    /// Lowest version of the `major.minor.patch` series (`x.y.za0`).
    ///
    /// Used for policy thresholds so that every pre-release of a series
    /// already counts as that series.
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
            kind: VersionKind::Alpha,
            build: 0,
        }
    }

    pub const fn with_build(self, kind: VersionKind, build: u8) -> Self {
        Self {
            major: self.major,
            minor: self.minor,
            patch: self.patch,
            kind,
            build,
        }
    }

    fn key(&self) -> (u16, u16, u16, VersionKind, u8) {
        (self.major, self.minor, self.patch, self.kind, self.build)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}{}{}",
            self.major,
            self.minor,
            self.patch,
            self.kind.as_char(),
            self.build
        )
    }
}

impl FromStr for Version {
    type Err = Error;

    /// Parse `major.minor.patch[kind build]`, e.g. `2017.4.3f1` or `5.0.0`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidVersion(s.to_string());

        let mut parts = s.trim().splitn(3, '.');
        let major = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
        let minor = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
        let rest = parts.next().ok_or_else(invalid)?;

        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let patch = rest[..digits_end].parse().map_err(|_| invalid())?;

        let suffix = &rest[digits_end..];
        let (kind, build) = match suffix.chars().next() {
            None => (VersionKind::Final, 0),
            Some(c) => {
                let kind = VersionKind::from_char(c).ok_or_else(invalid)?;
                // Custom builds append text after the build number ("5.6.3p2-custom")
                let tail = &suffix[1..];
                let build_end = tail
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(tail.len());
                let build = if build_end == 0 {
                    0
                } else {
                    tail[..build_end].parse().map_err(|_| invalid())?
                };
                (kind, build)
            }
        };

        Ok(Self {
            major,
            minor,
            patch,
            kind,
            build,
        })
    }
}

/// Serialization flags active when a file was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BuildFlags(u32);

impl BuildFlags {
    pub const NONE: Self = Self(0);

    /// Player build: editor-only data is stripped
    pub const SERIALIZE_GAME_RELEASE: Self = Self(0x100);

    /// Platform id written by the editor for files without a build target
    pub const NO_TARGET_PLATFORM: i32 = -2;

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn is_release(self) -> bool {
        self.contains(Self::SERIALIZE_GAME_RELEASE)
    }

    /// Flags implied by a container's target platform
    pub const fn for_platform(platform: i32) -> Self {
        if platform == Self::NO_TARGET_PLATFORM {
            Self::NONE
        } else {
            Self::SERIALIZE_GAME_RELEASE
        }
    }
}

impl fmt::Display for BuildFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_release() {
            write!(f, "release (0x{:x})", self.0)
        } else {
            write!(f, "editor (0x{:x})", self.0)
        }
    }
}
