use super::*;
use crate::similarity::{cosine, l2_norm};

fn encode(text: &str) -> Vec<f32> {
    HashEncoder::default().encode_one(text)
}

#[test]
fn output_has_default_dimension() {
    let vector = encode("hello world");
    assert_eq!(vector.len(), EMBEDDING_DIMENSION);
}

#[test]
fn output_is_unit_normalized() {
    let norm = l2_norm(&encode("some sentence about nothing in particular"));
    assert!((norm - 1.0).abs() < 1e-5);
}

#[test]
fn encoding_is_deterministic() {
    assert_eq!(encode("stable input"), encode("stable input"));
}

#[test]
fn shared_vocabulary_scores_higher() {
    let query = encode("login and security");
    let related = encode("User authentication and login functionality");
    let unrelated = encode("Database connection and data management");

    let related_score = cosine(&query, &related).expect("same dimensions");
    let unrelated_score = cosine(&query, &unrelated).expect("same dimensions");
    assert!(related_score > unrelated_score);
    assert!(related_score > 0.5);
}

#[test]
fn tokenization_ignores_case_and_punctuation() {
    let a = encode("Hello, World!");
    let b = encode("hello world");
    let score = cosine(&a, &b).expect("same dimensions");
    assert!((score - 1.0).abs() < 1e-5);
}

#[test]
fn punctuation_only_input_still_encodes() {
    let vector = encode("!!!");
    assert_eq!(vector.len(), EMBEDDING_DIMENSION);
    assert!((l2_norm(&vector) - 1.0).abs() < 1e-5);
}

#[test]
fn custom_dimension_is_respected() {
    let encoder = HashEncoder::new(64);
    let vector = encoder.encode_one("short");
    assert_eq!(vector.len(), 64);
}

#[tokio::test]
async fn batch_preserves_input_order() {
    let encoder = HashEncoder::default();
    let texts = vec![
        "first text".to_string(),
        "second text".to_string(),
        "third text".to_string(),
    ];

    let batch = encoder.encode_batch(&texts).await.expect("encodes");
    assert_eq!(batch.len(), 3);
    assert_eq!(batch[0], encoder.encode_one("first text"));
    assert_eq!(batch[2], encoder.encode_one("third text"));
}
