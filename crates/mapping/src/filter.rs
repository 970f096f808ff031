//! Requested field normalization

use recmap_core::{Error, Result, Schema};
use std::collections::BTreeSet;
use tracing::debug;

/// Normalize a requested field list against `schema`
///
/// Each entry keeps only its top-level segment (`"main_item.slot"` selects
/// `main_item`). Unknown names are logged and skipped. An empty request means
/// "every field" and yields `None`.
///
/// # Errors
///
/// Returns `Validation` when the request is non-empty but names no known
/// field, since the resulting command would have nothing to act on.
pub fn field_filter(schema: &Schema, requested: &[&str]) -> Result<Option<BTreeSet<String>>> {
    if requested.is_empty() {
        return Ok(None);
    }
    let mut names = BTreeSet::new();
    for path in requested {
        let top = path.split('.').next().unwrap_or(path);
        if schema.field_by_name(top).is_some() {
            names.insert(top.to_string());
        } else {
            debug!(
                target: "recmap::mapping",
                record = schema.full_name(),
                field = *path,
                "skipping unknown field in filter"
            );
        }
    }
    if names.is_empty() {
        return Err(Error::Validation(format!(
            "no known field among {:?} in {}",
            requested,
            schema.full_name()
        )));
    }
    Ok(Some(names))
}

#[cfg(test)]
mod tests {
    use super::*;
    use recmap_core::testing::player_schema;

    #[test]
    fn test_empty_means_all() {
        assert_eq!(field_filter(&player_schema(), &[]).unwrap(), None);
    }

    #[test]
    fn test_dotted_paths_use_top_segment() {
        let filter = field_filter(&player_schema(), &["main_item.slot", "main_item.count", "name"])
            .unwrap()
            .unwrap();
        assert_eq!(filter.into_iter().collect::<Vec<_>>(), vec!["main_item", "name"]);
    }

    #[test]
    fn test_unknown_names_skipped() {
        let filter = field_filter(&player_schema(), &["name", "nope"]).unwrap().unwrap();
        assert_eq!(filter.len(), 1);
        assert!(filter.contains("name"));
    }

    #[test]
    fn test_only_unknown_names_rejected() {
        let err = field_filter(&player_schema(), &["nope", "also.nope"]).unwrap_err();
        assert!(err.is_validation());
    }
}
