//! Selector matching: narrow a candidate list to exactly one record.
//!
//! Every matcher returns a [`Resolution`] rather than an error so callers
//! can branch on "nothing" vs "too much" directly; [`Resolution::into_result`]
//! converts to the crate error when that's all the caller wants.

use crate::error::{FwError, Result};
use crate::model::{DeviceRecord, FirmwareRecord};

/// Outcome of matching a selector against a candidate list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    Found(T),
    NotFound,
    /// Labels of every candidate that matched.
    Ambiguous(Vec<String>),
}

impl<T> Resolution<T> {
    fn from_matches(mut matches: Vec<T>, label: impl Fn(&T) -> String) -> Self {
        match matches.len() {
            0 => Resolution::NotFound,
            1 => Resolution::Found(matches.remove(0)),
            _ => Resolution::Ambiguous(matches.iter().map(label).collect()),
        }
    }

    /// `kind` names the record type ("device"), `selector` describes what
    /// was searched for ("name 14").
    pub fn into_result(self, kind: &'static str, selector: impl Into<String>) -> Result<T> {
        match self {
            Resolution::Found(t) => Ok(t),
            Resolution::NotFound => Err(FwError::NotFound { kind, selector: selector.into() }),
            Resolution::Ambiguous(candidates) => Err(FwError::Ambiguous {
                kind,
                selector: selector.into(),
                candidates,
            }),
        }
    }

    pub fn found(self) -> Option<T> {
        match self {
            Resolution::Found(t) => Some(t),
            _ => None,
        }
    }
}

// ── Devices ───────────────────────────────────────────────────────────────────

/// Case-insensitive "contains" match on the display name. A fragment shared
/// by several names is ambiguous; there is no best-pick.
pub fn device_by_name<'a>(devices: &'a [DeviceRecord], name: &str) -> Resolution<&'a DeviceRecord> {
    let needle = name.to_lowercase();
    let matches = devices
        .iter()
        .filter(|d| d.name.to_lowercase().contains(&needle))
        .collect();
    Resolution::from_matches(matches, |d| d.name.clone())
}

/// Case-insensitive exact match on the identifier.
pub fn device_by_identifier<'a>(
    devices:    &'a [DeviceRecord],
    identifier: &str,
) -> Resolution<&'a DeviceRecord> {
    let needle = identifier.to_lowercase();
    let matches = devices
        .iter()
        .filter(|d| d.identifier.to_lowercase() == needle)
        .collect();
    Resolution::from_matches(matches, |d| d.identifier.clone())
}

// ── Firmwares ─────────────────────────────────────────────────────────────────

/// Case-sensitive exact match on the version string; several builds sharing
/// a version come back as `Ambiguous` with their build ids.
pub fn firmware_by_version<'a>(
    firmwares: &'a [FirmwareRecord],
    version:   &str,
) -> Resolution<&'a FirmwareRecord> {
    let matches = firmwares.iter().filter(|f| f.version == version).collect();
    Resolution::from_matches(matches, |f| f.buildid.clone())
}

/// Case-insensitive exact match on the build id.
pub fn firmware_by_buildid<'a>(
    firmwares: &'a [FirmwareRecord],
    buildid:   &str,
) -> Resolution<&'a FirmwareRecord> {
    let needle = buildid.to_lowercase();
    let matches = firmwares
        .iter()
        .filter(|f| f.buildid.to_lowercase() == needle)
        .collect();
    Resolution::from_matches(matches, |f| f.buildid.clone())
}

/// Which firmware the caller asked for. At least one field must be set; the
/// build id wins when both are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirmwareSelector {
    pub version: Option<String>,
    pub buildid: Option<String>,
}

/// A firmware selector after precedence has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareQuery<'a> {
    BuildId(&'a str),
    Version(&'a str),
}

impl FirmwareSelector {
    pub fn version(version: impl Into<String>) -> Self {
        Self { version: Some(version.into()), buildid: None }
    }

    pub fn buildid(buildid: impl Into<String>) -> Self {
        Self { version: None, buildid: Some(buildid.into()) }
    }

    /// Apply precedence. Empty strings count as absent.
    pub fn query(&self) -> Result<FirmwareQuery<'_>> {
        fn present(s: &Option<String>) -> Option<&str> {
            s.as_deref().filter(|v| !v.is_empty())
        }
        if let Some(b) = present(&self.buildid) {
            Ok(FirmwareQuery::BuildId(b))
        } else if let Some(v) = present(&self.version) {
            Ok(FirmwareQuery::Version(v))
        } else {
            Err(FwError::Usage("either firmware version or buildid must be provided".into()))
        }
    }
}

impl FirmwareQuery<'_> {
    pub fn resolve<'f>(&self, firmwares: &'f [FirmwareRecord]) -> Resolution<&'f FirmwareRecord> {
        match *self {
            FirmwareQuery::BuildId(b) => firmware_by_buildid(firmwares, b),
            FirmwareQuery::Version(v) => firmware_by_version(firmwares, v),
        }
    }

    /// Human description used in resolution errors ("version 16.0").
    pub fn describe(&self) -> String {
        match self {
            FirmwareQuery::BuildId(b) => format!("buildid {b}"),
            FirmwareQuery::Version(v) => format!("version {v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::fixtures;

    fn devices() -> Vec<DeviceRecord> {
        serde_json::from_value(json!([
            { "name": "iPhone 14",     "identifier": "iPhone14,7" },
            { "name": "iPhone 14 Pro", "identifier": "iPhone14,2" },
            { "name": "iPad Pro (12.9-inch) (6th generation)", "identifier": "iPad14,5" },
        ]))
        .unwrap()
    }

    fn firmwares() -> Vec<FirmwareRecord> {
        serde_json::from_value(json!([
            fixtures::firmware("iPhone14,7", "16.0", "20A362"),
            fixtures::firmware("iPhone14,7", "16.0", "20A371"),
            fixtures::firmware("iPhone14,7", "16.1", "20B82"),
        ]))
        .unwrap()
    }

    #[test]
    fn name_fragment_shared_by_two_is_ambiguous() {
        let d = devices();
        match device_by_name(&d, "14") {
            Resolution::Ambiguous(names) => {
                assert_eq!(names, vec!["iPhone 14".to_string(), "iPhone 14 Pro".to_string()]);
            }
            other => panic!("expected ambiguous, got {other:?}"),
        }
        let err = device_by_name(&d, "14").into_result("device", "name 14").unwrap_err();
        assert!(err.to_string().contains("iPhone 14, iPhone 14 Pro"), "{err}");
    }

    #[test]
    fn unique_fragment_resolves() {
        let d = devices();
        let hit = device_by_name(&d, "14 Pro").found().unwrap();
        assert_eq!(hit.identifier, "iPhone14,2");
    }

    #[test]
    fn exact_name_is_case_insensitive() {
        let d = devices();
        let hit = device_by_name(&d, "IPHONE 14 PRO").found().unwrap();
        assert_eq!(hit.identifier, "iPhone14,2");
    }

    #[test]
    fn exact_name_still_ambiguous_when_substring_of_another() {
        let d = devices();
        assert!(matches!(device_by_name(&d, "iphone 14"), Resolution::Ambiguous(_)));
    }

    #[test]
    fn unknown_name_not_found() {
        let d = devices();
        let err = device_by_name(&d, "Pixel").into_result("device", "name Pixel").unwrap_err();
        assert_eq!(err.to_string(), "no device found with name Pixel");
    }

    #[test]
    fn identifier_is_exact_and_case_insensitive() {
        let d = devices();
        assert_eq!(device_by_identifier(&d, "IPHONE14,7").found().unwrap().name, "iPhone 14");
        assert_eq!(device_by_identifier(&d, "iPhone14"), Resolution::NotFound);
        assert_eq!(device_by_identifier(&d, "iPhone14,"), Resolution::NotFound);
    }

    #[test]
    fn shared_version_lists_buildids() {
        let f = firmwares();
        assert_eq!(
            firmware_by_version(&f, "16.0"),
            Resolution::Ambiguous(vec!["20A362".into(), "20A371".into()])
        );
        assert_eq!(firmware_by_version(&f, "16.1").found().unwrap().buildid, "20B82");
    }

    #[test]
    fn version_match_is_exact() {
        let f = firmwares();
        assert_eq!(firmware_by_version(&f, "16"), Resolution::NotFound);
        assert_eq!(firmware_by_version(&f, "16.1 "), Resolution::NotFound);
    }

    #[test]
    fn buildid_is_case_insensitive_exact() {
        let f = firmwares();
        assert_eq!(firmware_by_buildid(&f, "20a371").found().unwrap().buildid, "20A371");
        assert_eq!(firmware_by_buildid(&f, "20A3"), Resolution::NotFound);
    }

    #[test]
    fn buildid_takes_precedence_over_version() {
        let sel = FirmwareSelector {
            version: Some("16.0".into()),
            buildid: Some("20B82".into()),
        };
        assert_eq!(sel.query().unwrap(), FirmwareQuery::BuildId("20B82"));
        assert_eq!(sel.query().unwrap().resolve(&firmwares()).found().unwrap().version, "16.1");
    }

    #[test]
    fn empty_selector_is_usage_error() {
        assert!(matches!(FirmwareSelector::default().query(), Err(FwError::Usage(_))));
        let sel = FirmwareSelector { version: Some(String::new()), buildid: None };
        assert!(matches!(sel.query(), Err(FwError::Usage(_))));
        assert_eq!(
            FirmwareSelector { version: Some("16.0".into()), buildid: Some(String::new()) }
                .query()
                .unwrap(),
            FirmwareQuery::Version("16.0")
        );
    }
}
