//! Path resolution for the extraction command running inside the job sandbox.

use std::path::{Path, PathBuf};

use crate::BridgeError;

/// Set by the job service for every process it runs on behalf of a work item.
pub const WORKITEM_ENV_VAR: &str = "DAS_WORKITEM_ID";

/// Property filter consumed by the export step.
pub const FILTER_FILE: &str = "filter.json";

/// Extension of the produced package.
pub const PACKAGE_EXTENSION: &str = "collaboration";

/// Asset name used when the drawing is unnamed.
pub const DEFAULT_ASSET: &str = "House";

/// Host lookup of support files (search paths, app bundle contents).
pub trait FileResolver {
    fn find_file(&self, name: &str) -> Option<PathBuf>;
}

/// Locates the filter file.
///
/// `workitem_id` is the value of [`WORKITEM_ENV_VAR`], if set. Inside the
/// sandbox the host resolver is authoritative
/// and a miss is an error. Outside it the file sits next to the drawing.
pub fn resolve_filter_path(
    workitem_id: Option<&str>,
    working_dir: &Path,
    resolver: &dyn FileResolver,
) -> Result<PathBuf, BridgeError> {
    match workitem_id {
        Some(_) => resolver.find_file(FILTER_FILE).ok_or_else(|| {
            BridgeError::Setup(format!("{FILTER_FILE} not found by host resolver"))
        }),
        None => Ok(working_dir.join(FILTER_FILE)),
    }
}

/// Output package path, `<working_dir>/<asset>.collaboration`.
pub fn package_path(working_dir: &Path, asset_name: Option<&str>) -> PathBuf {
    let asset = asset_name.filter(|a| !a.is_empty()).unwrap_or(DEFAULT_ASSET);
    working_dir.join(format!("{asset}.{PACKAGE_EXTENSION}"))
}
