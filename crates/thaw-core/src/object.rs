//! Object, bucket and restore-status types shared by every component.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Storage class of an object as reported by the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StorageClass {
    /// Immediately retrievable.
    Standard,
    /// Archive tier (`GLACIER`): content must be recalled before it can be read.
    Archive,
    /// Deep archive tier (`DEEP_ARCHIVE`), recalled the same way as `Archive`.
    DeepArchive,
    /// Any other class, kept verbatim.
    Other(String),
}

impl StorageClass {
    /// Parses the service's storage class string.
    ///
    /// `GLACIER` and `DEEP_ARCHIVE` are archive tier; a missing class is
    /// treated as `STANDARD`, which is what S3 omits it for.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "" | "STANDARD" => Self::Standard,
            "GLACIER" => Self::Archive,
            "DEEP_ARCHIVE" => Self::DeepArchive,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the service spelling of this class.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Standard => "STANDARD",
            Self::Archive => "GLACIER",
            Self::DeepArchive => "DEEP_ARCHIVE",
            Self::Other(raw) => raw,
        }
    }

    /// Returns true when the object must be recalled before reading.
    #[must_use]
    pub fn is_archive(&self) -> bool {
        matches!(self, Self::Archive | Self::DeepArchive)
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable snapshot of one object produced by the inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
    /// Object key.
    pub key: String,
    /// Size in bytes.
    pub size: u64,
    /// Storage class at listing time.
    pub storage_class: StorageClass,
    /// Last modification time, when the service reported one.
    pub last_modified: Option<DateTime<Utc>>,
}

/// A bucket as returned by the bucket listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketDescriptor {
    /// Bucket name.
    pub name: String,
    /// Creation time, when the service reported one.
    pub created: Option<DateTime<Utc>>,
}

/// Recall status of an object, parsed from the service's restore header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreStatus {
    /// No recall has been requested (no restore header).
    NotRequested,
    /// A recall is still running.
    InProgress,
    /// The recall finished; the temporary copy expires at `expiry`.
    Completed {
        /// Raw expiry date from the header, if present.
        expiry: Option<String>,
    },
}

impl RestoreStatus {
    /// Parses a restore header such as
    /// `ongoing-request="false", expiry-date="Fri, 21 Dec 2012 00:00:00 GMT"`.
    #[must_use]
    pub fn parse(header: Option<&str>) -> Self {
        let Some(header) = header else {
            return Self::NotRequested;
        };
        if header.contains("ongoing-request=\"true\"") {
            return Self::InProgress;
        }
        let expiry = header
            .split_once("expiry-date=\"")
            .and_then(|(_, rest)| rest.split_once('"'))
            .map(|(date, _)| date.to_string());
        Self::Completed { expiry }
    }

    /// Returns true while the recall is still running.
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

/// Result of a status (head) query for one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStatus {
    /// Object key.
    pub key: String,
    /// Size in bytes.
    pub size: u64,
    /// Current storage class.
    pub storage_class: StorageClass,
    /// Last modification time.
    pub last_modified: Option<DateTime<Utc>>,
    /// Raw restore header, kept for display.
    pub restore_header: Option<String>,
    /// Parsed recall status.
    pub restore: RestoreStatus,
}

/// Which objects an operation applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySelector {
    /// Exactly one key.
    Key(String),
    /// Every key starting with the prefix.
    Prefix(String),
}

impl KeySelector {
    /// Builds a selector from optional key and prefix parameters.
    ///
    /// A key wins over a prefix when both are given; empty strings count as
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when neither is given.
    pub fn from_parts(key: Option<&str>, prefix: Option<&str>) -> Result<Self> {
        match (
            key.filter(|k| !k.is_empty()),
            prefix.filter(|p| !p.is_empty()),
        ) {
            (Some(key), _) => Ok(Self::Key(key.to_string())),
            (None, Some(prefix)) => Ok(Self::Prefix(prefix.to_string())),
            (None, None) => Err(Error::configuration("must specify either key or prefix")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_class_parsing() {
        assert_eq!(StorageClass::parse("GLACIER"), StorageClass::Archive);
        assert_eq!(StorageClass::parse("DEEP_ARCHIVE"), StorageClass::DeepArchive);
        assert!(StorageClass::parse("DEEP_ARCHIVE").is_archive());
        assert_eq!(StorageClass::parse("DEEP_ARCHIVE").as_str(), "DEEP_ARCHIVE");
        assert_eq!(StorageClass::parse("GLACIER").as_str(), "GLACIER");
        assert_eq!(StorageClass::parse("STANDARD"), StorageClass::Standard);
        assert_eq!(StorageClass::parse(""), StorageClass::Standard);
        assert_eq!(
            StorageClass::parse("GLACIER_IR"),
            StorageClass::Other("GLACIER_IR".into())
        );
        assert_eq!(StorageClass::parse("GLACIER_IR").as_str(), "GLACIER_IR");
    }

    #[test]
    fn restore_header_parsing() {
        assert_eq!(RestoreStatus::parse(None), RestoreStatus::NotRequested);
        assert_eq!(
            RestoreStatus::parse(Some("ongoing-request=\"true\"")),
            RestoreStatus::InProgress
        );
        assert_eq!(
            RestoreStatus::parse(Some(
                "ongoing-request=\"false\", expiry-date=\"Fri, 21 Dec 2012 00:00:00 GMT\""
            )),
            RestoreStatus::Completed {
                expiry: Some("Fri, 21 Dec 2012 00:00:00 GMT".into())
            }
        );
        assert_eq!(
            RestoreStatus::parse(Some("ongoing-request=\"false\"")),
            RestoreStatus::Completed { expiry: None }
        );
    }

    #[test]
    fn selector_prefers_key() {
        assert_eq!(
            KeySelector::from_parts(Some("a/b"), Some("a/")).unwrap(),
            KeySelector::Key("a/b".into())
        );
        assert_eq!(
            KeySelector::from_parts(Some(""), Some("a/")).unwrap(),
            KeySelector::Prefix("a/".into())
        );
        let err = KeySelector::from_parts(None, Some("")).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }
}
