use jsonschema::JSONSchema;
use serde_json::json;

use dog_market::pipeline::processing::aggregate::MetricsSnapshot;

fn compiled() -> JSONSchema {
    let schema = include_str!("../schemas/metrics_snapshot.v1.json");
    let schema_json: serde_json::Value = serde_json::from_str(schema).unwrap();
    let schema_static: &'static serde_json::Value = Box::leak(Box::new(schema_json));
    JSONSchema::options().compile(schema_static).unwrap()
}

fn example() -> serde_json::Value {
    serde_json::from_str(include_str!("resources/metrics_snapshot.json")).unwrap()
}

#[test]
fn example_snapshot_is_valid() {
    assert!(compiled().is_valid(&example()));
}

#[test]
fn example_snapshot_deserializes_into_the_typed_shape() {
    let snapshot: MetricsSnapshot = serde_json::from_value(example()).unwrap();
    assert_eq!(snapshot.summary.unique_puppies, 20);
    assert_eq!(snapshot.cross_platform_duplicates.get(&2), Some(&1));
    assert_eq!(snapshot.freshness["pets4homes"].days_7_30.count, 0);

    // Serializing back keeps the document valid
    let round_tripped = serde_json::to_value(&snapshot).unwrap();
    assert!(compiled().is_valid(&round_tripped));
}

#[test]
fn wrong_schema_version_is_rejected() {
    let mut invalid = example();
    invalid["schema_version"] = json!("metrics_snapshot.v2");
    assert!(!compiled().is_valid(&invalid));
}

#[test]
fn unknown_platform_key_is_rejected() {
    let mut invalid = example();
    invalid["platforms"]["craigslist"] = invalid["platforms"]["gumtree"].clone();
    assert!(!compiled().is_valid(&invalid), "platform keys are a closed set");
}

#[test]
fn percentages_are_bounded() {
    let mut invalid = example();
    invalid["puppies_vs_adults"]["under_1yr_pct"] = json!(140.0);
    assert!(!compiled().is_valid(&invalid));
}

#[test]
fn missing_qa_section_is_rejected() {
    let mut invalid = example();
    invalid.as_object_mut().unwrap().remove("qa");
    assert!(!compiled().is_valid(&invalid));
}

#[test]
fn unknown_availability_state_is_rejected() {
    let mut invalid = example();
    invalid["qa"]["availability_states"]["maybe_soon"] = json!(1);
    assert!(!compiled().is_valid(&invalid));
}

#[test]
fn run_id_must_be_a_uuid() {
    let mut invalid = example();
    invalid["run_id"] = json!("run-42");
    assert!(!compiled().is_valid(&invalid));
}
