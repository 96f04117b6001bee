use descriptor_infer::{
    training_examples, OracleClassifier, RuleBasedClassifier, ScriptedClient, TrainedClassifier,
    TypeModel, TypeOracle,
};
use descriptor_model::SemanticTypeTag;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;

fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        (-1.0e6f64..1.0e6).prop_map(|f| json!(f)),
        ".{0,24}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            proptest::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn rules_always_answer_with_a_vocabulary_tag(field in "[a-zA-Z_]{1,12}", value in json_value()) {
        let inference = runtime().block_on(RuleBasedClassifier::new().classify(&field, &value));
        prop_assert!(SemanticTypeTag::ALL.contains(&inference.tag));
        if inference.is_fallback() {
            prop_assert_eq!(inference.tag, SemanticTypeTag::Text);
        }
    }

    #[test]
    fn oracle_answers_are_permitted_or_text(raw in ".{0,40}", value in json_value()) {
        let classifier = OracleClassifier::new(Arc::new(ScriptedClient::always(&raw)));
        let inference = runtime().block_on(classifier.classify("field", &value));
        prop_assert!(SemanticTypeTag::ORACLE_CHOICES.contains(&inference.tag));
        if inference.is_fallback() {
            prop_assert_eq!(inference.tag, SemanticTypeTag::Text);
        }
    }
}

#[tokio::test]
async fn test_train_from_documents_and_reload() {
    let documents = [
        json!({
            "dataSample": {
                "type": "Feature",
                "properties": {"name": "Kali Temple", "district": "Sonipat", "visitors": 1200},
                "geometry": {"type": "Point", "coordinates": [76.4, 29.1]}
            },
            "dataDescriptor": {
                "name": {"type": ["ValueDescriptor"], "description": "Name", "dataSchema": "iudx:Text"},
                "district": {"type": ["ValueDescriptor"], "description": "District", "dataSchema": "iudx:Text"},
                "visitors": {"type": ["ValueDescriptor"], "description": "Visitors", "dataSchema": "iudx:Integer"},
                "geometry": {"type": ["ValueDescriptor"], "description": "Location", "dataSchema": "iudx:Point"}
            }
        }),
        json!({
            "dataSample": {"stationName": "Anand Vihar", "pm10": 41.5, "pm2p5": 22.75, "isActive": true},
            "dataDescriptor": {
                "stationName": {"type": ["ValueDescriptor"], "description": "Station", "dataSchema": "iudx:Text"},
                "pm10": {"type": ["ValueDescriptor"], "description": "PM10", "dataSchema": "iudx:Number"},
                "pm2p5": {"type": ["ValueDescriptor"], "description": "PM2.5", "dataSchema": "iudx:Number"},
                "isActive": {"type": ["ValueDescriptor"], "description": "Active", "dataSchema": "iudx:Boolean"}
            }
        }),
    ];

    let examples: Vec<_> = documents.iter().flat_map(training_examples).collect();
    assert_eq!(examples.len(), 8);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("type-model.json");
    TypeModel::fit(&examples).unwrap().save(&path).unwrap();

    let classifier = TrainedClassifier::open(&path);
    assert!(classifier.is_ready());
    assert_eq!(classifier.name(), "trained");

    let inference = classifier
        .classify("geometry", &json!({"type": "Point", "coordinates": [77.2, 28.6]}))
        .await;
    assert_eq!(inference.tag, SemanticTypeTag::Point);
    assert!(!inference.is_fallback());
}
