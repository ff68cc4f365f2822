//! Loading the SPDX License List Data JSON files into leaf records.

use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use thiserror::Error;

use crate::store::{LeafKind, LicenseStore, NewLeaf, StoreError};

/// File holding the license list within a License List Data `json/` dir.
pub const LICENSES_FILE: &str = "licenses.json";
/// File holding the exception list, loaded when present.
pub const EXCEPTIONS_FILE: &str = "exceptions.json";

/// Errors raised while reading the license list.
#[derive(Debug, Error)]
pub enum LicenseListError {
    /// The file could not be read.
    #[error("couldn't open license list file {path}: {source}")]
    Io {
        /// File being read.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// The file is not valid License List Data JSON.
    #[error("error parsing license list file {path}: {source}")]
    Json {
        /// File being read.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

/// One entry of `licenses.json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpdxLicense {
    /// Short identifier, e.g. `Apache-2.0`.
    pub license_id: String,
    /// Full name.
    pub name: String,
    /// Link to the license's HTML page.
    #[serde(default)]
    pub reference: String,
    /// Position in the list.
    #[serde(default)]
    pub reference_number: u32,
    /// Link to the license's JSON details.
    #[serde(default)]
    pub details_url: String,
    /// Whether the identifier is deprecated.
    #[serde(default, rename = "isDeprecatedLicenseId")]
    pub is_deprecated: bool,
    /// Whether the OSI approves the license.
    #[serde(default)]
    pub is_osi_approved: bool,
}

/// One entry of `exceptions.json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpdxException {
    /// Short identifier, e.g. `Classpath-exception-2.0`.
    pub license_exception_id: String,
    /// Full name.
    pub name: String,
    /// Whether the identifier is deprecated.
    #[serde(default, rename = "isDeprecatedLicenseId")]
    pub is_deprecated: bool,
}

/// The SPDX license list, optionally with its exceptions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseList {
    /// Version of the list, e.g. `3.21`.
    pub license_list_version: String,
    /// Release date of the list.
    #[serde(default)]
    pub release_date: String,
    /// Licenses on the list.
    pub licenses: Vec<SpdxLicense>,
    /// Exceptions, empty unless loaded from `exceptions.json`.
    #[serde(default)]
    pub exceptions: Vec<SpdxException>,
}

#[derive(Deserialize)]
struct ExceptionList {
    exceptions: Vec<SpdxException>,
}

impl LicenseList {
    /// Read `licenses.json`, and `exceptions.json` if present, from `dir`.
    ///
    /// # Errors
    /// Returns [`LicenseListError`] when `licenses.json` is missing or
    /// either file fails to parse.
    pub fn load_dir(dir: &Utf8Path) -> Result<Self, LicenseListError> {
        let mut list: Self = read_json(&dir.join(LICENSES_FILE))?;
        let exceptions = dir.join(EXCEPTIONS_FILE);
        if exceptions.is_file() {
            let extra: ExceptionList = read_json(&exceptions)?;
            list.exceptions.extend(extra.exceptions);
        }
        log::info!(
            "read SPDX license list {} with {} licenses and {} exceptions",
            list.license_list_version,
            list.licenses.len(),
            list.exceptions.len()
        );
        Ok(list)
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Utf8Path) -> Result<T, LicenseListError> {
    let text = fs::read_to_string(path).map_err(|source| LicenseListError::Io {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| LicenseListError::Json {
        path: path.to_owned(),
        source,
    })
}

/// Insert SPDX leaves for every license and exception in `list` that the
/// store does not hold yet, returning how many were inserted.
///
/// # Errors
/// Returns [`StoreError`] when a lookup or insert fails.
pub fn provision_license_list<S>(store: &mut S, list: &LicenseList) -> Result<usize, StoreError>
where
    S: LicenseStore + ?Sized,
{
    let licenses = list
        .licenses
        .iter()
        .map(|l| (l.license_id.as_str(), l.name.as_str(), LeafKind::License));
    let exceptions = list
        .exceptions
        .iter()
        .map(|e| (e.license_exception_id.as_str(), e.name.as_str(), LeafKind::Exception));
    let mut inserted = 0;
    for (identifier, name, kind) in licenses.chain(exceptions) {
        if store.leaf_id(identifier)?.is_some() {
            continue;
        }
        store.insert_leaf(NewLeaf {
            identifier: identifier.to_owned(),
            name: name.to_owned(),
            is_spdx: true,
            kind,
        })?;
        inserted += 1;
    }
    log::info!(
        "provisioned {inserted} leaves from SPDX license list {}",
        list.license_list_version
    );
    Ok(inserted)
}
