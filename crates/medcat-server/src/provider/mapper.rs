//! Provider listing item + metadata -> [`ExternalDataset`]

use super::{DatasetMetadata, ListingItem};
use crate::extraction::EntityParser;
use crate::models::{
    truncate_chars, ExternalDataset, LICENSE_MAX_LEN, PATH_MAX_LEN, TITLE_MAX_LEN,
};

/// Build the local dataset shape for one provider item.
///
/// Tags are not part of the result; the caller links them from the listing item.
pub fn map_external(
    item: &ListingItem,
    metadata: &DatasetMetadata,
    parser: &dyn EntityParser,
) -> ExternalDataset {
    let license = match item.license_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => Some(name.to_string()),
        _ if metadata.license_names.is_empty() => None,
        _ => Some(metadata.license_names.join(",")),
    }
    .map(|license| truncate_chars(&license, LICENSE_MAX_LEN));

    let area_candidates = metadata
        .description
        .as_deref()
        .map(|text| parser.parse(text).organs)
        .unwrap_or_default()
        .into_iter()
        .filter(|name| !name.trim().is_empty())
        .collect();

    ExternalDataset {
        title: truncate_chars(&item.title, TITLE_MAX_LEN),
        description: metadata.description.clone(),
        license,
        external_path: item
            .url
            .as_deref()
            .map(|url| truncate_chars(url, PATH_MAX_LEN)),
        local_path: None,
        record_count: None,
        size: item.total_bytes,
        area_candidates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{EntityHints, KeywordEntityParser};

    struct NoEntities;

    impl EntityParser for NoEntities {
        fn parse(&self, _text: &str) -> EntityHints {
            EntityHints::default()
        }
    }

    fn item() -> ListingItem {
        ListingItem {
            reference: "owner/slug".to_string(),
            title: "Chest scans".to_string(),
            url: Some("https://www.kaggle.com/datasets/owner/slug".to_string()),
            license_name: Some("CC0-1.0".to_string()),
            total_bytes: Some(2048),
            tags: Vec::new(),
        }
    }

    #[test]
    fn test_basic_mapping() {
        let metadata = DatasetMetadata {
            description: Some("Kidney and liver ultrasound".to_string()),
            license_names: vec!["other".to_string()],
        };
        let parser = KeywordEntityParser::new().unwrap();
        let mapped = map_external(&item(), &metadata, &parser);

        assert_eq!(mapped.title, "Chest scans");
        assert_eq!(mapped.description.as_deref(), Some("Kidney and liver ultrasound"));
        assert_eq!(mapped.license.as_deref(), Some("CC0-1.0"));
        assert_eq!(mapped.size, Some(2048));
        assert_eq!(mapped.local_path, None);
        assert_eq!(mapped.record_count, None);
        assert_eq!(mapped.area_candidates, vec!["kidney", "liver"]);
    }

    #[test]
    fn test_license_falls_back_to_metadata() {
        let mut listing = item();
        listing.license_name = Some(" ".to_string());
        let metadata = DatasetMetadata {
            description: None,
            license_names: vec!["CC-BY-4.0".to_string(), "ODbL".to_string()],
        };
        let mapped = map_external(&listing, &metadata, &NoEntities);
        assert_eq!(mapped.license.as_deref(), Some("CC-BY-4.0,ODbL"));

        let mapped = map_external(&listing, &DatasetMetadata::default(), &NoEntities);
        assert_eq!(mapped.license, None);
    }

    #[test]
    fn test_long_fields_truncated() {
        let mut listing = item();
        listing.title = "t".repeat(750);
        listing.url = Some(format!("https://example.org/{}", "p".repeat(2000)));

        let mapped = map_external(&listing, &DatasetMetadata::default(), &NoEntities);
        assert_eq!(mapped.title.chars().count(), TITLE_MAX_LEN);
        assert_eq!(
            mapped.external_path.map(|p| p.chars().count()),
            Some(PATH_MAX_LEN)
        );
    }

    #[test]
    fn test_long_licenses_truncated() {
        let mut listing = item();
        listing.license_name = None;
        let metadata = DatasetMetadata {
            description: None,
            license_names: (0..30).map(|i| format!("License-Number-{:02}", i)).collect(),
        };
        let joined_len = metadata.license_names.join(",").chars().count();
        assert!(joined_len > LICENSE_MAX_LEN);

        let mapped = map_external(&listing, &metadata, &NoEntities);
        let license = mapped.license.unwrap();
        assert_eq!(license.chars().count(), LICENSE_MAX_LEN);
        assert!(license.starts_with("License-Number-00,License-Number-01"));

        listing.license_name = Some("x".repeat(400));
        let mapped = map_external(&listing, &DatasetMetadata::default(), &NoEntities);
        assert_eq!(mapped.license.map(|l| l.chars().count()), Some(LICENSE_MAX_LEN));
    }

    #[test]
    fn test_no_description_means_no_candidates() {
        let parser = KeywordEntityParser::new().unwrap();
        let mapped = map_external(&item(), &DatasetMetadata::default(), &parser);
        assert!(mapped.area_candidates.is_empty());
    }
}
