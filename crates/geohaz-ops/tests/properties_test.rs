//! Algebraic properties of the pipeline, checked on evaluated rasters.

mod support;

use ee_expr::{Comparison, Image, Reducer, Remote, SerializedHandle};
use geohaz_ops::{AreaType, OpsError};
use serde_json::json;
use support::*;

fn binary(pipeline: &geohaz_ops::Pipeline, asset: &str, threshold: f64) -> SerializedHandle {
    pipeline
        .filter_image_by_threshold(&Image::load(asset).encode(), threshold, Some(Comparison::Gt))
        .unwrap()
}

#[test]
fn test_union_and_intersection_are_idempotent() {
    let (pipeline, gateway) = pipeline();
    let a = binary(&pipeline, RIVER_FLOOD, 0.35);
    let expected = gateway.image(&a);

    assert_eq!(gateway.image(&pipeline.union_binary_images(&a, &a).unwrap()), expected);
    assert_eq!(gateway.image(&pipeline.intersect_binary_images(&a, &a).unwrap()), expected);
}

#[test]
fn test_union_and_intersection_commute() {
    let (pipeline, gateway) = pipeline();
    let a = binary(&pipeline, RIVER_FLOOD, 0.35);
    let b = binary(&pipeline, DROUGHT, 20.0);

    assert_eq!(
        gateway.image(&pipeline.union_binary_images(&a, &b).unwrap()),
        gateway.image(&pipeline.union_binary_images(&b, &a).unwrap())
    );
    assert_eq!(
        gateway.image(&pipeline.intersect_binary_images(&a, &b).unwrap()),
        gateway.image(&pipeline.intersect_binary_images(&b, &a).unwrap())
    );
}

#[test]
fn test_zero_buffer_is_identity() {
    let (pipeline, gateway) = pipeline();
    let region = rectangle(-3.0, -2.0, 4.0, 6.0);

    let same = pipeline.get_zone_of_area(&region, 0.0).unwrap();
    assert_eq!(same, region);
    assert_eq!(gateway.geometry(&same), gateway.geometry(&region));

    let negative_zero = pipeline.get_zone_of_area(&region, -0.0).unwrap();
    assert_eq!(gateway.geometry(&negative_zero), gateway.geometry(&region));
}

#[test]
fn test_threshold_boundary_depends_on_comparison() {
    let (pipeline, gateway) = pipeline();
    let flood = Image::load(RIVER_FLOOD).encode();

    // Exactly one column has depth 0.1.
    let ones = |cmp| {
        let handle = pipeline.filter_image_by_threshold(&flood, 0.1, Some(cmp)).unwrap();
        gateway.image(&handle).count_where(|v| v == Some(1.0))
    };
    assert_eq!(ones(Comparison::Gte) - ones(Comparison::Gt), GRID);
    assert_eq!(ones(Comparison::Lte) - ones(Comparison::Lt), GRID);
    assert_eq!(ones(Comparison::Eq), GRID);
}

#[test]
fn test_every_comparison_yields_binary_output() {
    let (pipeline, gateway) = pipeline();
    let flood = Image::load(RIVER_FLOOD).encode();

    for cmp in [Comparison::Gt, Comparison::Gte, Comparison::Lt, Comparison::Lte, Comparison::Eq] {
        let handle = pipeline.filter_image_by_threshold(&flood, 0.5, Some(cmp)).unwrap();
        let raster = gateway.image(&handle);
        assert_eq!(
            raster.count_where(|v| v == Some(0.0) || v == Some(1.0)),
            GRID * GRID,
            "{cmp}"
        );
    }
}

#[test]
fn test_merge_concatenates_in_order() {
    let (pipeline, gateway) = pipeline();
    let two = collection(&[
        (Rect::new(0.0, 0.0, 1.0, 1.0), json!({"i": 0})),
        (Rect::new(1.0, 0.0, 2.0, 1.0), json!({"i": 1})),
    ]);
    let three = collection(&[
        (Rect::new(2.0, 0.0, 3.0, 1.0), json!({"i": 2})),
        (Rect::new(3.0, 0.0, 4.0, 1.0), json!({"i": 3})),
        (Rect::new(4.0, 0.0, 5.0, 1.0), json!({"i": 4})),
    ]);

    let merged = gateway.features(&pipeline.merge_feature_collections(&two, &three).unwrap());
    assert_eq!(merged.len(), 5);
    for (i, feature) in merged.iter().enumerate() {
        assert_eq!(feature.properties["i"], json!(i));
    }
}

#[test]
fn test_flood_exposure_within_country() {
    let (pipeline, gateway) = pipeline();

    let flood = pipeline.get_dataset_image("river_flood").unwrap();
    let threshold = flood.metadata.threshold.unwrap();
    let flooded = pipeline.filter_image_by_threshold(&flood.image, threshold, None).unwrap();

    let kenya = pipeline.get_admin_boundary("KEN", AreaType::Country).unwrap();
    let outline = pipeline.collection_geometry(&kenya).unwrap();
    let masked = pipeline.mask_image(&flooded, &outline).unwrap();

    // Kenya spans 0..5 E: depths 0.0..0.4, of which four columns exceed 0.01, over ten rows.
    let flooded_cells = pipeline.reduce_image(&masked, &outline, Reducer::Sum, None).unwrap();
    assert_eq!(flooded_cells.scalar(), Some(40.0));

    let all_cells = pipeline.reduce_image(&masked, &outline, Reducer::Count, None).unwrap();
    assert_eq!(all_cells.scalar(), Some(50.0));

    // One asset lookup for the dataset, one compute per reduction.
    assert_eq!(gateway.asset_calls(), 1);
    assert_eq!(gateway.compute_calls(), 2);
}

#[test]
fn test_validation_happens_before_any_remote_call() {
    let (pipeline, gateway) = pipeline();
    let image = Image::load(RIVER_FLOOD).encode();
    let region = rectangle(0.0, 0.0, 1.0, 1.0);
    let fc = collection(&[(Rect::new(0.0, 0.0, 1.0, 1.0), json!({}))]);

    let failures: Vec<OpsError> = vec![
        pipeline.get_dataset_image("nope").unwrap_err(),
        pipeline.mask_image(&fc, &region).unwrap_err(),
        pipeline.filter_image_by_threshold(&image, f64::INFINITY, None).unwrap_err(),
        pipeline.union_binary_images(&image, &region).unwrap_err(),
        pipeline.intersect_feature_collections(&fc, &image).unwrap_err(),
        pipeline.reduce_image(&image, &region, Reducer::Mean, Some(-1.0)).unwrap_err(),
        pipeline.reduce_image(&region, &region, Reducer::Mean, None).unwrap_err(),
        pipeline.get_zone_of_area(&image, 10.0).unwrap_err(),
        pipeline.get_admin_boundary("12", AreaType::Country).unwrap_err(),
        pipeline.collection_geometry(&region).unwrap_err(),
    ];

    for err in &failures {
        assert_eq!(err.category(), geohaz_ops::ErrorCategory::Validation, "{err}");
    }
    assert_eq!(gateway.calls(), 0);
}
