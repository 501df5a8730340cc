//! Sweep to TopoJSON on the 4×4 fixture.

use geo::Coord;
use popsplit_algo::{sweep_lambda, LambdaValue, NoopObserver, PartitionSolver, SweepResult};
use popsplit_core::fixtures::SCATTERED_VS_BLOCK_4X4;
use popsplit_core::{GeometryConfig, PopsplitError, SweepConfig};
use popsplit_geo::fixtures::grid_layer;
use popsplit_geo::{
    build_graph_attributes, export_topojson, is_valid_multipolygon, postprocess_sweep, TopoJson,
    UnitLayer,
};
use tempfile::tempdir;

fn layer() -> UnitLayer {
    grid_layer(4, 4, &SCATTERED_VS_BLOCK_4X4)
}

fn sweep(layer: &UnitLayer) -> SweepResult {
    let (attrs, _) = build_graph_attributes(layer).unwrap();
    let config = SweepConfig {
        max_workers: 1,
        ..SweepConfig::default()
    };
    sweep_lambda(
        &PartitionSolver::default(),
        &attrs,
        Some(&[0.0, 0.5][..]),
        &config,
        &NoopObserver,
    )
    .unwrap()
}

fn has_vertex(ring: &[Coord<f64>], x: f64, y: f64) -> bool {
    ring.iter().any(|c| c.x == x && c.y == y)
}

#[test]
fn regions_follow_the_sweep() {
    let layer = layer();
    let sweep = sweep(&layer);
    let processed = postprocess_sweep(&layer, &sweep, &GeometryConfig::default()).unwrap();

    assert!(processed.failures.is_empty());
    assert_eq!(processed.regions.len(), 2);
    let scattered = &processed.regions[0];
    assert_eq!(scattered.num_parts, 3);
    assert_eq!(scattered.area, 3.0);
    assert_eq!(scattered.population_selected, 39);
    let block = &processed.regions[1];
    assert_eq!(block.num_parts, 1);
    assert_eq!(block.area, 4.0);
    assert_eq!(block.population_selected, 40);
    assert_eq!(processed.stats.len(), 2);
}

#[test]
fn simplified_regions_stay_valid_and_pinned() {
    let layer = layer();
    let sweep = sweep(&layer);
    let processed = postprocess_sweep(&layer, &sweep, &GeometryConfig::default()).unwrap();

    for region in &processed.regions {
        assert!(is_valid_multipolygon(&region.geometry), "λ = {}", region.lambda);
    }
    // Block [0, 2]²: corners shared with unselected neighbours survive.
    let ring = &processed.regions[1].geometry.0[0].exterior().0;
    assert!(has_vertex(ring, 2.0, 1.0));
    assert!(has_vertex(ring, 1.0, 2.0));
    assert!(has_vertex(ring, 2.0, 2.0));
}

#[test]
fn document_carries_reference_and_properties() {
    let layer = layer();
    let sweep = sweep(&layer);
    let processed = postprocess_sweep(&layer, &sweep, &GeometryConfig::default()).unwrap();
    let document = &processed.document;

    assert_eq!(document.kind, "Topology");
    assert_eq!(document.reference.total_population, layer.total_population());
    assert_eq!(document.reference.total_area, 16.0);
    let names: Vec<&str> = document.objects.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["lambda_0.00", "lambda_0.50"]);

    let block = &document.objects["lambda_0.50"];
    assert_eq!(block.kind, "MultiPolygon");
    assert_eq!(block.properties.num_parts, 1);
    assert_eq!(block.properties.population_selected, 40);
    assert_eq!(block.properties.total_area_all, 16.0);
    assert!(block.properties.converged);

    // Decoded rings close and stay within a quantization step of the input.
    let rings = document.decode_object("lambda_0.50").unwrap();
    let exterior = &rings[0][0];
    assert_eq!(exterior.first(), exterior.last());
    let step = document.transform.scale[0];
    assert!(exterior
        .iter()
        .any(|c| (c.x - 2.0).abs() <= step && (c.y - 1.0).abs() <= step));
}

#[test]
fn export_writes_readable_file() {
    let layer = layer();
    let sweep = sweep(&layer);
    let dir = tempdir().unwrap();
    let out = dir.path().join("regions.topojson");

    let summary = export_topojson(&layer, &sweep, &GeometryConfig::default(), &out).unwrap();
    assert_eq!(summary.objects, 2);
    assert!(summary.failed.is_empty());
    assert!(summary.simplified_vertices <= summary.original_vertices);

    let document = TopoJson::read(&out).unwrap();
    assert_eq!(document.objects.len(), 2);
    assert_eq!(document.arcs.len(), summary.arcs);
}

#[test]
fn mismatched_layer_is_rejected() {
    let layer = layer();
    let sweep = sweep(&layer);
    let other = grid_layer(3, 3, &[1; 9]);
    assert!(matches!(
        postprocess_sweep(&other, &sweep, &GeometryConfig::default()),
        Err(PopsplitError::Validation(_))
    ));
}

#[test]
fn invalid_geometry_config_is_rejected() {
    let layer = layer();
    let sweep = sweep(&layer);
    let config = GeometryConfig {
        quantization: 1.0,
        ..GeometryConfig::default()
    };
    assert!(matches!(
        postprocess_sweep(&layer, &sweep, &config),
        Err(PopsplitError::Configuration(_))
    ));
}

#[test]
fn fine_lambda_steps_export_every_region() {
    let layer = layer();
    let (attrs, _) = build_graph_attributes(&layer).unwrap();
    let config = SweepConfig {
        lambda_step: 0.005,
        lambda_max: 0.02,
        max_workers: 1,
        ..SweepConfig::default()
    };
    let sweep = sweep_lambda(&PartitionSolver::default(), &attrs, None, &config, &NoopObserver)
        .unwrap();
    assert_eq!(sweep.lambda_values, vec![0.0, 0.005, 0.01, 0.015]);

    let processed = postprocess_sweep(&layer, &sweep, &GeometryConfig::default()).unwrap();
    assert_eq!(processed.regions.len(), 4);
    let names: Vec<&str> = processed.document.objects.keys().map(String::as_str).collect();
    assert_eq!(
        names,
        vec!["lambda_0.00", "lambda_0.005", "lambda_0.01", "lambda_0.015"]
    );
    assert_eq!(
        processed.document.objects["lambda_0.005"].properties.lambda_value,
        0.005
    );
}

#[test]
fn empty_selection_fails_only_its_own_lambda() {
    let layer = layer();
    let mut sweep = sweep(&layer);
    let key = LambdaValue::new(0.0).unwrap();
    sweep.results.get_mut(&key).unwrap().search.result.mask = vec![false; layer.len()];

    let processed = postprocess_sweep(&layer, &sweep, &GeometryConfig::default()).unwrap();
    assert_eq!(processed.failures.len(), 1);
    assert_eq!(processed.failures[0].lambda, 0.0);
    assert!(processed.failures[0].error.contains("empty selection"));

    assert_eq!(processed.regions.len(), 1);
    assert_eq!(processed.regions[0].lambda, 0.5);
    assert_eq!(processed.stats.len(), 1);
    let names: Vec<&str> = processed.document.objects.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["lambda_0.50"]);
}

#[test]
fn all_empty_selections_are_a_geometry_error() {
    let layer = layer();
    let mut sweep = sweep(&layer);
    for entry in sweep.results.values_mut() {
        entry.search.result.mask = vec![false; layer.len()];
    }
    assert!(matches!(
        postprocess_sweep(&layer, &sweep, &GeometryConfig::default()),
        Err(PopsplitError::Geometry(_))
    ));
}
