//! Payload to chart geometry, using only the public API.

use lapse::force::{label_nodes, ForceParams, ForceSimulation};
use lapse::geometry::evenly_spaced_indices;
use lapse::layout::{snake_layout, snake_segments, year_nodes, ProjectionLayout};
use lapse::models::RawResult;
use lapse::text::{wrap_by_width, FixedWidthMeasure, GlyphTableMeasure};
use lapse::{normalize, NormalizedResult};
use serde_json::json;

fn payload() -> RawResult {
    serde_json::from_value(json!({
        "neighbors": {
            "2000": ["dna", {"token": "rna", "tag_id": "gene_1"}, "protein"],
            "2001": ["rna", "dna"],
            "2002": [],
            "2003": ["genome", "dna", "allele"]
        },
        "frequency": [
            {"year": 2000, "frequency": 120, "normalized_frequency": 0.01},
            {"year": "2001", "frequency": null, "normalized_frequency": null}
        ],
        "changepoints": ["2000-2001", [2001, 2003]],
        "umap": [
            {"token": "gene", "umap_x_coord": -2.0, "umap_y_coord": 1.0, "year": 2000},
            {"token": "dna", "umap_x_coord": 0.5, "umap_y_coord": 0.5, "year": 2000},
            {"token": "gene", "umap_x_coord": 0.0, "umap_y_coord": 3.0, "year": 2001},
            {"token": "gene", "umap_x_coord": 2.0, "umap_y_coord": -1.0, "year": 2003},
            {"token": "allele", "umap_x_coord": 1.5, "umap_y_coord": -2.0, "year": 2003}
        ]
    }))
    .unwrap()
}

fn normalized() -> NormalizedResult {
    normalize(&payload(), "gene")
}

// ============================================================
// Normalization
// ============================================================

#[test]
fn normalization_is_deterministic() {
    let raw = payload();
    assert_eq!(normalize(&raw, "gene"), normalize(&raw, "gene"));
    assert_eq!(
        serde_json::to_string(&normalize(&raw, "gene")).unwrap(),
        serde_json::to_string(&normalize(&raw, "gene")).unwrap()
    );
}

#[test]
fn unique_neighbors_rank_by_year_count_then_word() {
    let result = normalized();
    let ranked: Vec<(&str, usize)> = result
        .unique_neighbors
        .iter()
        .map(|n| (n.word.as_str(), n.year_count))
        .collect();
    assert_eq!(
        ranked,
        vec![("dna", 3), ("rna", 2), ("allele", 1), ("genome", 1), ("protein", 1)]
    );
    assert!(result.unique_neighbors[1].tagged);
}

#[test]
fn empty_years_are_dropped_and_years_sorted() {
    let result = normalized();
    assert_eq!(result.years(), vec!["2000", "2001", "2003"]);
}

#[test]
fn changepoints_and_frequency_normalize_both_shapes() {
    let result = normalized();
    assert_eq!(
        result.changepoints,
        vec![
            ("2000".to_string(), "2001".to_string()),
            ("2001".to_string(), "2003".to_string())
        ]
    );
    assert_eq!(result.frequency_series[0].frequency, 120.0);
    assert_eq!(result.frequency_series[1].year, "2001");
    assert_eq!(result.frequency_series[1].frequency, 0.0);
}

// ============================================================
// Layout
// ============================================================

#[test]
fn snake_covers_every_year_with_one_turn() {
    let result = normalized();
    let nodes = year_nodes(&result, 2);
    let points = snake_layout(&nodes, 2, 100.0, 50.0);
    let years: Vec<&str> = points.iter().map(|p| p.item.year.as_str()).collect();
    assert_eq!(years, vec!["2000", "2001", "2003"]);
    assert_eq!(points[0].item.neighbors, vec!["dna".to_string(), "rna".to_string()]);

    let segments = snake_segments(&points);
    assert_eq!(segments.len(), 2);
    assert!(!segments[0].curved);
    assert!(segments[1].curved);
}

#[test]
fn projection_stays_inside_viewport() {
    let layout = ProjectionLayout::build(&normalized(), 400.0, 300.0);
    assert_eq!(layout.trajectory.len(), 3);
    assert_eq!(layout.neighbors.len(), 2);
    assert_eq!(layout.arrows.len(), 2);
    assert_eq!(layout.year_labels.len(), 3);

    for label in layout.trajectory.iter().chain(&layout.neighbors) {
        assert!((0.0..=400.0).contains(&label.position.x), "{:?}", label);
        // y runs 0..-height
        assert!((-300.0..=0.0).contains(&label.position.y), "{:?}", label);
    }
    let years: Vec<&str> = layout.year_labels.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(years, vec!["2000", "2001", "2003"]);
}

#[test]
fn projection_labels_settle() {
    let layout = ProjectionLayout::build(&normalized(), 400.0, 300.0);
    let labels = label_nodes(&layout.neighbors, 10.0, &GlyphTableMeasure);
    let mut simulation = ForceSimulation::new(labels, ForceParams::default());
    simulation.run(2_000);
    assert!(simulation.is_settled());

    for node in &simulation.state().nodes {
        assert!(node.position.x.is_finite() && node.position.y.is_finite());
    }
}

#[test]
fn empty_result_lays_out_nothing() {
    let result = normalize(&RawResult::default(), "gene");
    assert!(year_nodes(&result, 5).is_empty());
    assert_eq!(ProjectionLayout::build(&result, 400.0, 300.0), ProjectionLayout::default());
}

// ============================================================
// Text wrapping
// ============================================================

#[test]
fn wrap_never_drops_or_reorders_content() {
    let words: Vec<String> = (0..60)
        .map(|i| "x".repeat(1 + (i * 7) % 13))
        .collect();
    let measure = FixedWidthMeasure { em: 1.0 };

    for budget in [0.0, 1.0, 5.0, 12.5, 40.0, 1_000.0] {
        let lines = wrap_by_width(&words, |w| w.as_str(), budget, 1.0, &measure);
        let flattened: Vec<&String> = lines.iter().flatten().copied().collect();
        let expected: Vec<&String> = words.iter().collect();
        assert_eq!(flattened, expected, "budget {}", budget);

        for line in &lines {
            assert!(!line.is_empty());
            let width: usize = line.iter().map(|w| w.len()).sum();
            assert!(line.len() == 1 || width as f64 <= budget, "budget {}", budget);
        }
    }
}

#[test]
fn axis_ticks_include_both_ends() {
    for (count, max) in [(2, 10), (5, 21), (8, 7), (3, 100)] {
        let ticks = evenly_spaced_indices(count, max);
        assert_eq!(ticks.first(), Some(&0));
        assert_eq!(ticks.last(), Some(&max));
        assert!(ticks.windows(2).all(|w| w[0] < w[1]));
    }
}
