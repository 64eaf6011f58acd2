use ngff::v04::{Axis, Dataset, MultiscaleAttrs, MultiscaleMetadata, SpaceUnit};

use proptest::prelude::*;
use serde_json::{json, Value};

// A document using every optional field, written the way it comes off the
// wire: floats spelled with a decimal point, keys in emission order.
const FIXTURE: &str = r#"{"version":"0.4","name":"pyramid","type":"gaussian","metadata":{"sigma":2.0},"datasets":[{"path":"s0","coordinateTransformations":[{"type":"scale","scale":[1.0,1.0]},{"type":"translation","translation":[0.0,0.0]}]},{"path":"s1","coordinateTransformations":[{"type":"scale","scale":[2.0,2.0]},{"type":"translation","translation":[0.5,0.5]}]}],"axes":[{"name":"y","type":"space","unit":"micrometer"},{"name":"x","type":"space","unit":"micrometer"}],"coordinateTransformations":[{"type":"scale","scale":[1.0,1.0]}]}"#;

const MINIMAL: &str = r#"{"version":"0.4","datasets":[{"path":"0","coordinateTransformations":[{"type":"identity"}]}],"axes":[{"name":"a"},{"name":"b"}]}"#;

#[test]
fn documents_round_trip_byte_for_byte() {
    let meta: MultiscaleMetadata = serde_json::from_str(FIXTURE).unwrap();
    assert_eq!(serde_json::to_string(&meta).unwrap(), FIXTURE);

    let meta: MultiscaleMetadata = serde_json::from_str(MINIMAL).unwrap();
    assert_eq!(serde_json::to_string(&meta).unwrap(), MINIMAL);
}

#[test]
fn axes_emit_a_fixed_key_order() {
    let axis = Axis::space("x", SpaceUnit::Micrometer).unwrap();
    assert_eq!(
        serde_json::to_string(&axis).unwrap(),
        r#"{"name":"x","type":"space","unit":"micrometer"}"#
    );
    let axis = Axis::new("c", None, None).unwrap();
    assert_eq!(serde_json::to_string(&axis).unwrap(), r#"{"name":"c"}"#);
}

#[test]
fn unknown_keys_fail_the_whole_document() {
    let mut doc: Value = serde_json::from_str(FIXTURE).unwrap();
    doc["datasets"][0]["scale"] = json!([1.0]);
    assert!(serde_json::from_value::<MultiscaleMetadata>(doc).is_err());

    let mut doc: Value = serde_json::from_str(FIXTURE).unwrap();
    doc["axes"][1]["axes"] = json!([]);
    assert!(serde_json::from_value::<MultiscaleMetadata>(doc).is_err());
}

#[test]
fn foreign_attribute_keys_survive_a_value_round_trip() {
    let src = json!({
        "multiscales": serde_json::from_str::<Value>(&format!("[{}]", FIXTURE)).unwrap(),
        "omero": {"channels": [{"label": "DAPI"}]},
        "_creator": {"name": "scope", "version": "1.2"},
    });
    let attrs: MultiscaleAttrs = serde_json::from_value(src.clone()).unwrap();
    assert_eq!(serde_json::to_value(&attrs).unwrap(), src);
}

fn document_strat() -> impl Strategy<Value = MultiscaleMetadata> {
    (2usize..=5, 1usize..4).prop_flat_map(|(ndim, levels)| {
        let vector = proptest::collection::vec(1e-3f64..1e3, ndim);
        (
            proptest::collection::vec((vector.clone(), vector), levels),
            proptest::option::of("[a-z0-9 ]{1,12}"),
        )
            .prop_map(move |(tforms, name)| {
                let names = ["a", "b", "c", "d", "e"];
                let axes = names[..ndim]
                    .iter()
                    .map(|n| Axis::new(*n, Some("space"), None).unwrap())
                    .collect();
                let datasets = tforms
                    .into_iter()
                    .enumerate()
                    .map(|(i, (scale, translation))| {
                        Dataset::from_scale_translation(format!("s{}", i), scale, translation)
                            .unwrap()
                    })
                    .collect();
                let mut meta = MultiscaleMetadata::new(axes, datasets, None).unwrap();
                meta.name = name;
                meta
            })
    })
}

#[test]
fn generated_documents_survive_serde() {
    proptest!(ProptestConfig::with_cases(256), |(meta in document_strat())| {
        let text = serde_json::to_string(&meta).unwrap();
        let back: MultiscaleMetadata = serde_json::from_str(&text).unwrap();
        prop_assert_eq!(back, meta);
    });
}
