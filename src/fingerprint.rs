//! # Fingerprint: dedup key for a physical source configuration.
//!
//! A [`Fingerprint`] identifies *which physical register* a reader process is
//! wired to. It is a pure function of the pin wiring and register width — and
//! of nothing else. In particular the per-session observed bit index is
//! excluded, which is exactly what lets any number of sessions watching
//! different bits of the same register share one reader process.
//!
//! ## Rules
//! - Equal [`SourceConfig`]s produce equal fingerprints.
//! - Total and pure: no failure modes, no ambient state.
//! - The rendered form is `74HC165-<hex digest>` and is stable across runs,
//!   so it can double as an external store key or log correlation id.

use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::config::SourceConfig;

/// Chip label prefixed to every fingerprint.
const CHIP_NAME: &str = "74HC165";

/// Stable dedup key derived from a [`SourceConfig`].
///
/// Cheap to clone (`Arc<str>` internally); usable as a `HashMap` key.
///
/// ## Example
/// ```
/// use pinwatch::{Fingerprint, SourceConfig};
///
/// let a = SourceConfig { serial_out: 11, load_data: 13, clock: 15, bits: 8 };
/// let b = a.clone();
/// assert_eq!(Fingerprint::of(&a), Fingerprint::of(&b));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint(Arc<str>);

impl Fingerprint {
    /// Derives the fingerprint for a source configuration.
    ///
    /// The digest input is the ordered wiring fields, keyed field-by-field so
    /// that `serial_out=1, load_data=13` can never collide with
    /// `serial_out=11, load_data=3`.
    pub fn of(source: &SourceConfig) -> Self {
        let material = format!(
            "serialOut:{}|loadData:{}|clock:{}|bits:{}",
            source.serial_out, source.load_data, source.clock, source.bits
        );

        let digest = Sha256::digest(material.as_bytes());
        let mut rendered = String::with_capacity(CHIP_NAME.len() + 1 + digest.len() * 2);
        rendered.push_str(CHIP_NAME);
        rendered.push('-');
        for byte in digest {
            rendered.push_str(&format!("{byte:02x}"));
        }

        Self(rendered.into())
    }

    /// Returns the rendered key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SourceConfig {
        SourceConfig {
            serial_out: 11,
            load_data: 13,
            clock: 15,
            bits: 8,
        }
    }

    #[test]
    fn test_equal_sources_equal_fingerprints() {
        assert_eq!(Fingerprint::of(&source()), Fingerprint::of(&source()));
    }

    #[test]
    fn test_any_field_change_changes_fingerprint() {
        let base = Fingerprint::of(&source());

        let mut other = source();
        other.serial_out = 12;
        assert_ne!(base, Fingerprint::of(&other));

        let mut other = source();
        other.bits = 16;
        assert_ne!(base, Fingerprint::of(&other));
    }

    #[test]
    fn test_field_boundaries_do_not_collide() {
        let a = SourceConfig {
            serial_out: 1,
            load_data: 13,
            clock: 15,
            bits: 8,
        };
        let b = SourceConfig {
            serial_out: 11,
            load_data: 3,
            clock: 15,
            bits: 8,
        };
        assert_ne!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn test_rendered_form() {
        let fp = Fingerprint::of(&source());
        assert!(fp.as_str().starts_with("74HC165-"));
        // sha-256 digest, hex-rendered
        assert_eq!(fp.as_str().len(), "74HC165-".len() + 64);
    }
}
