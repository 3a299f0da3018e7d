use std::fs;
use std::path::PathBuf;

use set_edge::assemble::Side;
use set_edge::config::EngineConfig;
use set_edge::pipeline::{MatchInput, predict_match, predict_slate, summarize};
use set_edge::weights::WeightProfile;

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn slate() -> Vec<MatchInput> {
    serde_json::from_str(&read_fixture("slate.json")).expect("slate fixture should parse")
}

fn find<'a>(slate: &'a [MatchInput], id: &str) -> &'a MatchInput {
    slate
        .iter()
        .find(|m| m.match_id == id)
        .expect("match id present in fixture")
}

fn config() -> EngineConfig {
    EngineConfig::new(WeightProfile::baseline(), 2025)
}

#[test]
fn clear_hard_court_favorite_is_kept() {
    let slate = slate();
    let p = predict_match(find(&slate, "hard-regular"), &config());

    assert!(!p.skipped);
    assert!(p.skip_reason.is_none());
    assert_eq!(p.favored, Side::PlayerA);
    assert_eq!(p.surface, "Hard");
    assert!(p.set_probability > 0.50 && p.set_probability < 0.73);
    assert!(p.match_probability <= 0.73);
    assert_eq!(
        p.confidence_capped,
        p.set_probability >= 0.73 || p.match_probability >= 0.73
    );
    assert!((p.raw_diff - 0.15).abs() < 1e-9);
    let breakdown_sum: f64 = p.factor_breakdown.values().sum();
    assert!((breakdown_sum - p.raw_diff).abs() < 1e-12);
    assert_eq!(p.signals.ranking_gap, Some(5));
}

#[test]
fn indoor_close_utr_is_skipped_without_aggregation() {
    let slate = slate();
    let p = predict_match(find(&slate, "indoor-close-utr"), &config());

    assert!(p.skipped);
    assert_eq!(p.surface, "Hardcourt indoor");
    assert_eq!(p.skip_rule.as_deref(), Some("indoor_close_utr"));
    let reason = p.skip_reason.as_deref().unwrap_or_default();
    assert!(reason.contains("indoor close UTR"), "{reason}");
    assert!(reason.contains("0.27"), "{reason}");
    assert!(p.confidence > 0.50 && p.confidence < 0.73);
}

#[test]
fn aggregation_turns_indoor_match_into_hard() {
    let slate = slate();
    let cfg = config().with_aggregate_indoor_outdoor(true);
    let p = predict_match(find(&slate, "indoor-close-utr"), &cfg);

    assert_eq!(p.surface, "Hard");
    assert!(!p.signals.indoor);
    assert!(!p.skipped);
}

#[test]
fn thin_history_degrades_to_a_skip() {
    let slate = slate();
    let p = predict_match(find(&slate, "thin-history"), &config());

    assert!(p.skipped);
    assert_eq!(p.skip_rule.as_deref(), Some("min_sample_size"));
    assert!(p.factor_breakdown.is_empty());
    assert!(
        p.signals
            .data_issues
            .iter()
            .any(|issue| issue.starts_with("player_b:"))
    );
}

#[test]
fn unknown_surface_passes_through_with_flag() {
    let slate = slate();
    let p = predict_match(find(&slate, "odd-surface"), &config());

    assert_eq!(p.surface, "Carpet");
    assert!(p.risk_flags.contains("unknown_surface:Carpet"));
}

#[test]
fn amplification_toggle_is_identity_when_off() {
    let slate = slate();
    let cfg = config().with_amplification(false);
    let p = predict_match(find(&slate, "hard-regular"), &cfg);
    assert_eq!(p.amplified_diff, p.raw_diff);
    assert!(p.set_probability < predict_match(find(&slate, "hard-regular"), &config()).set_probability);
}

#[test]
fn lower_cap_binds_every_prediction() {
    let slate = slate();
    let cfg = config().with_confidence_cap(0.60).expect("valid cap");
    for p in predict_slate(&slate, &cfg) {
        assert!(p.set_probability <= 0.60);
        assert!(p.match_probability <= 0.60);
    }
}

#[test]
fn whole_slate_never_fails() {
    let slate = slate();
    let predictions = predict_slate(&slate, &config());
    assert_eq!(predictions.len(), slate.len());
    for p in &predictions {
        assert_eq!(p.skipped, p.skip_reason.is_some());
    }
    let summary = summarize(&predictions);
    assert_eq!(summary.total, 4);
    assert_eq!(summary.skipped, 2);
}

#[test]
fn predictions_serialize_with_factor_names() {
    let slate = slate();
    let p = predict_match(find(&slate, "hard-regular"), &config());
    let json = serde_json::to_value(&p).expect("prediction serializes");
    assert!(json["factor_breakdown"]["set_performance"].is_number());
    assert!(json["skip_reason"].is_null());
}
