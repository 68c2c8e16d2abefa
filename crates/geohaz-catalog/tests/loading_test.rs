//! Catalog file loading.

use geohaz_catalog::{Catalog, CatalogError, DEFAULT_BASE_ASSETS_PATH};
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn write_catalog(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(text.as_bytes()).expect("write catalog");
    file
}

fn shipped_catalog() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config/datasets.yaml")
}

const TWO_DATASETS: &str = r##"
datasets:
  test_dataset:
    asset_id: test_asset
    image_filename: test.json
    description: Test dataset
    mosaic: false
    source_name: Test Source
    source_url: https://test.com
    threshold: 1.0
    color_palette: ["#FF0000", "#00FF00"]
  mosaic_dataset:
    asset_id: projects/other/assets/mosaic_asset
    image_filename: mosaic.json
    description: Mosaic dataset
    mosaic: true
    source_name: Mosaic Source
    source_url: https://mosaic.com
    color_palette: ["#00f"]
"##;

#[test]
fn test_load_preserves_order_and_prefixes_assets() {
    let file = write_catalog(TWO_DATASETS);
    let catalog = Catalog::load(file.path(), DEFAULT_BASE_ASSETS_PATH).expect("catalog loads");

    let ids: Vec<&str> = catalog.ids().collect();
    assert_eq!(ids, vec!["test_dataset", "mosaic_dataset"]);

    let test = catalog.get_dataset("test_dataset").unwrap();
    assert_eq!(test.asset_id, "projects/unicef-ccri/assets/test_asset");
    assert_eq!(test.threshold, Some(1.0));
    assert_eq!(test.color_palette[0].as_str(), "#ff0000");

    let mosaic = catalog.get_dataset("mosaic_dataset").unwrap();
    assert!(mosaic.mosaic);
    assert_eq!(mosaic.asset_id, "projects/other/assets/mosaic_asset");
    assert_eq!(mosaic.threshold, None);
    assert_eq!(
        catalog.find_by_asset("projects/other/assets/mosaic_asset").map(|d| d.id.as_str()),
        Some("mosaic_dataset")
    );
}

#[test]
fn test_unknown_dataset_lists_available_ids() {
    let file = write_catalog(TWO_DATASETS);
    let catalog = Catalog::load(file.path(), DEFAULT_BASE_ASSETS_PATH).unwrap();

    match catalog.get_dataset("nonexistent_dataset") {
        Err(CatalogError::UnknownDataset { id, available }) => {
            assert_eq!(id, "nonexistent_dataset");
            assert_eq!(available, vec!["test_dataset", "mosaic_dataset"]);
        }
        other => panic!("expected UnknownDataset, got {:?}", other),
    }
}

#[test]
fn test_missing_required_field_fails() {
    let text = TWO_DATASETS.replace("    source_url: https://test.com\n", "");
    let file = write_catalog(&text);
    let err = Catalog::load(file.path(), DEFAULT_BASE_ASSETS_PATH).unwrap_err();
    match err {
        CatalogError::InvalidDataset { dataset, message } => {
            assert_eq!(dataset, "test_dataset");
            assert!(message.contains("source_url"), "message: {}", message);
        }
        other => panic!("expected InvalidDataset, got {:?}", other),
    }
}

#[test]
fn test_unknown_field_fails() {
    let text = TWO_DATASETS.replace("    mosaic: true\n", "    mosaic: true\n    colour: red\n");
    let file = write_catalog(&text);
    assert!(matches!(
        Catalog::load(file.path(), DEFAULT_BASE_ASSETS_PATH),
        Err(CatalogError::InvalidDataset { dataset, .. }) if dataset == "mosaic_dataset"
    ));
}

#[test]
fn test_bad_color_names_dataset_and_value() {
    let text = TWO_DATASETS.replace("\"#00f\"", "\"blue\"");
    let file = write_catalog(&text);
    let err = Catalog::load(file.path(), DEFAULT_BASE_ASSETS_PATH).unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid color 'blue' in dataset 'mosaic_dataset' (expected #RGB or #RRGGBB)"
    );
}

#[test]
fn test_empty_palette_and_missing_file() {
    let text = TWO_DATASETS.replace("[\"#00f\"]", "[]");
    let file = write_catalog(&text);
    assert!(Catalog::load(file.path(), DEFAULT_BASE_ASSETS_PATH).is_err());

    let missing = PathBuf::from("/nonexistent/datasets.yaml");
    assert!(matches!(
        Catalog::load(&missing, DEFAULT_BASE_ASSETS_PATH),
        Err(CatalogError::Io { .. })
    ));
}

#[test]
fn test_empty_document_fails() {
    let file = write_catalog("");
    assert!(matches!(
        Catalog::load(file.path(), DEFAULT_BASE_ASSETS_PATH),
        Err(CatalogError::Yaml(_))
    ));
}

#[test]
fn test_shipped_catalog_river_flood() {
    let catalog =
        Catalog::load(&shipped_catalog(), DEFAULT_BASE_ASSETS_PATH).expect("shipped catalog");
    let flood = catalog.get_dataset("river_flood").unwrap();
    assert_eq!(flood.color_palette.len(), 5);
    assert_eq!(flood.threshold, Some(0.01));
    assert_eq!(
        catalog.get_dataset("agricultural_drought").unwrap().valid_max,
        Some(100.0)
    );

    // Descriptors serialize without the optional fields they lack.
    let children = catalog.get_dataset("children_population").unwrap();
    let children = serde_json::to_value(children).unwrap();
    assert!(children.get("threshold").is_none());
}
