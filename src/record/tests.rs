use super::*;
use serde_json::json;

fn sample_record() -> ChunkRecord {
    let mut metadata = HashMap::new();
    metadata.insert("source_file".to_string(), json!("notes.md"));
    metadata.insert("chunk_index".to_string(), json!(0));
    ChunkRecord::new("Some chunk content", metadata).with_embedding(vec![0.1, 0.2, 0.3])
}

#[test]
fn new_assigns_id_and_timestamp() {
    let record = ChunkRecord::new("text", HashMap::new());
    assert!(!record.id.is_empty());
    assert!(record.embedding.is_empty());
    assert_eq!(record.content, "text");
}

#[test]
fn json_round_trip_preserves_fields() {
    let record = sample_record();
    let json = record.to_json_pretty().expect("serializes");
    let parsed = ChunkRecord::from_json_bytes("test", json.as_bytes()).expect("parses");

    assert_eq!(parsed.id, record.id);
    assert_eq!(parsed.content, record.content);
    assert_eq!(parsed.embedding, record.embedding);
    assert_eq!(parsed.metadata, record.metadata);
    assert_eq!(parsed.created_at, record.created_at);
}

#[test]
fn serialized_field_names_are_pascal_case() {
    let record = sample_record();
    let json = record.to_json_pretty().expect("serializes");

    assert!(json.contains("\"Id\""));
    assert!(json.contains("\"Content\""));
    assert!(json.contains("\"Embedding\""));
    assert!(json.contains("\"Metadata\""));
    assert!(json.contains("\"CreatedAt\""));
}

#[test]
fn unknown_fields_survive_round_trip() {
    let json = r#"{
        "Id": "abc",
        "Content": "hello",
        "Embedding": [1.0, 0.0],
        "Metadata": {},
        "CreatedAt": "2024-06-01T12:00:00Z",
        "FutureField": {"nested": true}
    }"#;

    let parsed = ChunkRecord::from_json_bytes("test", json.as_bytes()).expect("parses");
    assert_eq!(parsed.extra.get("FutureField"), Some(&json!({"nested": true})));

    let rewritten = parsed.to_json_pretty().expect("serializes");
    assert!(rewritten.contains("FutureField"));
}

#[test]
fn truncated_json_is_rejected() {
    let truncated = br#"{"Id":"partial","Content":"...","Metadata":{"#;
    let result = ChunkRecord::from_json_bytes("partial", truncated);
    assert!(matches!(result, Err(crate::StoreError::CorruptRecord(_))));
}

#[test]
fn empty_bytes_are_rejected() {
    let result = ChunkRecord::from_json_bytes("empty", b"");
    assert!(matches!(result, Err(crate::StoreError::CorruptRecord(_))));
}

#[test]
fn validate_embedding_enforces_dimension() {
    let record = sample_record();
    assert!(record.validate_embedding(3).is_ok());
    assert!(matches!(
        record.validate_embedding(768),
        Err(crate::StoreError::DimensionMismatch {
            expected: 768,
            got: 3
        })
    ));

    let empty = ChunkRecord::new("no embedding", HashMap::new());
    assert!(empty.validate_embedding(768).is_ok());
}
