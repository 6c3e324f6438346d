//! Markdown README generation for datasets

use crate::models::{Dataset, LookupEntry};
use chrono::Utc;

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Human readable size with 1024-based units, e.g. `1.50 KB`.
pub fn format_size(size: Option<i64>) -> String {
    let bytes = match size {
        None | Some(0) => return "N/A".to_string(),
        Some(b) if b < 0 => return "0 B".to_string(),
        Some(b) => b,
    };

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, SIZE_UNITS[unit])
}

fn field(value: Option<&str>, default: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}

fn bullet_list(items: impl IntoIterator<Item = String>, empty: &str) -> String {
    let lines: Vec<String> = items.into_iter().map(|item| format!("- {}", item)).collect();
    if lines.is_empty() {
        format!("- {}", empty)
    } else {
        lines.join("\n")
    }
}

fn names(entries: &[LookupEntry]) -> impl Iterator<Item = String> + '_ {
    entries.iter().map(|e| e.name.clone())
}

pub fn generate(dataset: &Dataset) -> String {
    let record_count = dataset
        .record_count
        .map(|c| c.to_string())
        .unwrap_or_else(|| "N/A".to_string());
    let local = dataset.local_path.as_deref().unwrap_or("");
    let external = dataset.external_path.as_deref().unwrap_or("");

    let lines = [
        format!("# {}\n", dataset.title),
        "## Description".to_string(),
        format!("{}\n", field(dataset.description.as_deref(), "No description provided")),
        "## Metadata".to_string(),
        format!(
            "- **Anatomical area**: {}",
            field(dataset.anatomical_area_name.as_deref(), "Not specified")
        ),
        format!("- **Records**: {}", record_count),
        format!("- **Size**: {}", format_size(dataset.size)),
        format!(
            "- **External source**: {}",
            field(dataset.external_path.as_deref(), "Not specified")
        ),
        format!(
            "- **Local path**: {}",
            field(dataset.local_path.as_deref(), "Not specified")
        ),
        format!("- **Created**: {}", dataset.created_at.format(TIMESTAMP_FORMAT)),
        format!("- **Last updated**: {}\n", dataset.updated_at.format(TIMESTAMP_FORMAT)),
        "## Modalities".to_string(),
        format!("{}\n", bullet_list(names(&dataset.modalities), "Not specified")),
        "## Machine learning".to_string(),
        "**Supported tasks**:".to_string(),
        format!("{}\n", bullet_list(names(&dataset.ml_tasks), "Not specified")),
        "## Tags".to_string(),
        format!(
            "{}\n",
            bullet_list(names(&dataset.tags).map(|t| format!("`{}`", t)), "No tags")
        ),
        "## Usage".to_string(),
        "```python".to_string(),
        "import pandas as pd".to_string(),
        String::new(),
        format!("if '{}':", local),
        format!("    df = pd.read_csv('{}')", field(Some(local), "path/to/dataset.csv")),
        format!("elif '{}':", external),
        format!(
            "    df = pd.read_csv('{}')",
            field(Some(external), "https://example.com/dataset.csv")
        ),
        "```\n".to_string(),
        "---".to_string(),
        format!("*README generated automatically {}*", Utc::now().format(TIMESTAMP_FORMAT)),
    ];

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dataset() -> Dataset {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        Dataset {
            id: 7,
            title: "Lung CT".to_string(),
            description: None,
            external_path: Some("https://example.org/lung".to_string()),
            local_path: None,
            record_count: Some(120),
            size: Some(1536),
            license: None,
            anatomical_area: Some(1),
            anatomical_area_name: Some("lung".to_string()),
            modalities: vec![LookupEntry::new(1, "CT")],
            ml_tasks: Vec::new(),
            tags: vec![LookupEntry::new(3, "oncology")],
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(None), "N/A");
        assert_eq!(format_size(Some(0)), "N/A");
        assert_eq!(format_size(Some(-5)), "0 B");
        assert_eq!(format_size(Some(512)), "512.00 B");
        assert_eq!(format_size(Some(1536)), "1.50 KB");
        assert_eq!(format_size(Some(5 * 1024 * 1024)), "5.00 MB");
        assert_eq!(format_size(Some(2048 * 1024_i64.pow(4))), "2048.00 TB");
    }

    #[test]
    fn test_generate_sections() {
        let readme = generate(&dataset());

        assert!(readme.starts_with("# Lung CT\n"));
        assert!(readme.contains("No description provided"));
        assert!(readme.contains("- **Anatomical area**: lung"));
        assert!(readme.contains("- **Records**: 120"));
        assert!(readme.contains("- **Size**: 1.50 KB"));
        assert!(readme.contains("- **Local path**: Not specified"));
        assert!(readme.contains("- **Created**: 2024-03-01 12:30"));
        assert!(readme.contains("- CT"));
        assert!(readme.contains("- `oncology`"));
        assert!(readme.contains("pd.read_csv('https://example.org/lung')"));
        assert!(readme.contains("pd.read_csv('path/to/dataset.csv')"));
    }

    #[test]
    fn test_empty_lists() {
        let mut ds = dataset();
        ds.modalities.clear();
        ds.tags.clear();
        let readme = generate(&ds);
        assert!(readme.contains("## Modalities\n- Not specified"));
        assert!(readme.contains("## Tags\n- No tags"));
    }
}
