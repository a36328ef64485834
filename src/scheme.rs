//! Amplicon scheme reference resolution.
//!
//! A scheme is either a built-in identifier of the form
//! `name/length/version` (e.g. `artic-inrb-mpox/2500/v1.0.0`), fetched by
//! downstream steps from the scheme repository, or a free-form name paired
//! with an explicit local path to the scheme definition files.

use crate::error::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

lazy_static! {
    static ref BUILTIN_SCHEME_REGEX: Regex =
        Regex::new(r"^\S*/\d{3,}/v\d\.\d\.\d(-\S+)?$").unwrap();
}

/// A resolved amplicon scheme reference. Every sample sheet row carries
/// the same scheme.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq, Debug)]
pub struct SchemeRef {
    pub name: String,
    /// For a built-in scheme this is the identifier itself (resolved to
    /// files downstream); for a custom scheme, the local path.
    pub path: String,
    pub custom: bool,
}

impl SchemeRef {
    /// Resolve `amplicon_scheme`, preferring `custom_scheme_path` when one
    /// is supplied. Workflow engines hand us the literal strings `""` and
    /// `"null"` for an unset path; both mean "use the built-in lookup".
    pub fn resolve(amplicon_scheme: &str, custom_scheme_path: Option<&str>) -> Result<SchemeRef> {
        match custom_scheme_path {
            Some(raw) if !raw.is_empty() && raw != "null" => {
                let path = PathBuf::from(raw);
                if !path.exists() {
                    return Err(Error::CustomSchemeNotFound(path));
                }
                Ok(SchemeRef {
                    name: amplicon_scheme.to_string(),
                    path: raw.to_string(),
                    custom: true,
                })
            }
            _ => {
                if !BUILTIN_SCHEME_REGEX.is_match(amplicon_scheme) {
                    return Err(Error::SchemeNotFound(amplicon_scheme.to_string()));
                }
                Ok(SchemeRef {
                    name: amplicon_scheme.to_string(),
                    path: amplicon_scheme.to_string(),
                    custom: false,
                })
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builtin_scheme() {
        let s = SchemeRef::resolve("artic-inrb-mpox/2500/v1.0.0", None).unwrap();
        assert_eq!(s.name, "artic-inrb-mpox/2500/v1.0.0");
        assert_eq!(s.path, "artic-inrb-mpox/2500/v1.0.0");
        assert!(!s.custom);
    }

    #[test]
    fn test_builtin_scheme_with_suffix() {
        assert!(SchemeRef::resolve("artic-sars-cov-2/400/v5.4.2-custom", None).is_ok());
    }

    #[test]
    fn test_unrecognized_scheme() {
        for bad in ["mpox", "mpox/25/v1.0.0", "mpox/2500/1.0.0", "mpox/2500/v1.0"] {
            let err = SchemeRef::resolve(bad, None).unwrap_err();
            assert!(matches!(err, Error::SchemeNotFound(_)), "{bad}");
        }
    }

    #[test]
    fn test_custom_scheme_path() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().to_str().unwrap();
        let s = SchemeRef::resolve("my-local-scheme", Some(raw)).unwrap();
        assert_eq!(s.name, "my-local-scheme");
        assert_eq!(s.path, raw);
        assert!(s.custom);
    }

    #[test]
    fn test_custom_scheme_path_missing() {
        let err = SchemeRef::resolve("my-local-scheme", Some("/nonexistent/scheme")).unwrap_err();
        assert!(matches!(err, Error::CustomSchemeNotFound(_)));
    }

    #[test]
    fn test_empty_and_null_custom_path_fall_back() {
        // An unset custom path must not mask a bad built-in identifier.
        for unset in ["", "null"] {
            let err = SchemeRef::resolve("not-a-scheme", Some(unset)).unwrap_err();
            assert!(matches!(err, Error::SchemeNotFound(_)));
        }
    }
}
