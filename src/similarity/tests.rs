use super::*;

fn unit(v: Vec<f32>) -> Vec<f32> {
    let norm = l2_norm(&v);
    v.into_iter().map(|x| x / norm).collect()
}

#[test]
fn cosine_identical_vectors() {
    let v = vec![0.3, -0.5, 0.8, 0.1];
    let score = cosine(&v, &v).expect("equal lengths");
    assert!((score - 1.0).abs() < 1e-6);
}

#[test]
fn cosine_orthogonal_vectors() {
    let a = vec![1.0, 0.0, 0.0];
    let b = vec![0.0, 1.0, 0.0];
    let score = cosine(&a, &b).expect("equal lengths");
    assert!(score.abs() < 1e-6);
}

#[test]
fn cosine_opposite_vectors() {
    let a = vec![1.0, 2.0, 3.0];
    let b = vec![-1.0, -2.0, -3.0];
    let score = cosine(&a, &b).expect("equal lengths");
    assert!((score + 1.0).abs() < 1e-6);
}

#[test]
fn cosine_zero_norm_is_zero() {
    let a = vec![1.0, 2.0, 3.0];
    let zero = vec![0.0, 0.0, 0.0];
    assert_eq!(cosine(&a, &zero).expect("equal lengths"), 0.0);
    assert_eq!(cosine(&zero, &a).expect("equal lengths"), 0.0);
}

#[test]
fn cosine_dimension_mismatch() {
    let a = vec![1.0, 2.0];
    let b = vec![1.0, 2.0, 3.0];
    let result = cosine(&a, &b);
    assert!(matches!(
        result,
        Err(crate::StoreError::DimensionMismatch {
            expected: 2,
            got: 3
        })
    ));
}

#[test]
fn cosine_is_symmetric() {
    let a = unit(vec![0.2, 0.9, -0.1, 0.4, 0.7, -0.3, 0.5, 0.6, 0.1]);
    let b = unit(vec![-0.4, 0.3, 0.8, 0.2, -0.6, 0.1, 0.9, -0.2, 0.5]);
    let ab = cosine(&a, &b).expect("equal lengths");
    let ba = cosine(&b, &a).expect("equal lengths");
    assert!((ab - ba).abs() < 1e-6);
    assert!(ab.abs() <= 1.0 + 1e-6);
}

#[test]
fn simd_matches_scalar_accumulation() {
    // 19 elements exercises both the SIMD lanes and the scalar tail.
    let a: Vec<f32> = (0..19).map(|i| (i as f32 * 0.37).sin()).collect();
    let b: Vec<f32> = (0..19).map(|i| (i as f32 * 0.61).cos()).collect();

    let scalar: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    assert!((dot(&a, &b) - scalar).abs() < 1e-5);
}

#[test]
fn top_k_orders_by_descending_score() {
    let query = vec![1.0, 0.0, 0.0];
    let close = vec![0.9, 0.1, 0.0];
    let closer = vec![1.0, 0.01, 0.0];
    let far = vec![0.0, 1.0, 0.0];

    let candidates: Vec<(&str, &[f32])> = vec![
        ("far", far.as_slice()),
        ("close", close.as_slice()),
        ("closer", closer.as_slice()),
    ];

    let results = top_k(&query, candidates, 2).expect("uniform dimensions");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, "closer");
    assert_eq!(results[1].0, "close");
    assert!(results[0].1 > results[1].1);
}

#[test]
fn top_k_breaks_ties_by_ascending_id() {
    let query = vec![1.0, 0.0];
    let same = vec![1.0, 0.0];

    let candidates: Vec<(&str, &[f32])> = vec![
        ("charlie", same.as_slice()),
        ("alpha", same.as_slice()),
        ("bravo", same.as_slice()),
    ];

    let results = top_k(&query, candidates, 2).expect("uniform dimensions");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, "alpha");
    assert_eq!(results[1].0, "bravo");
}

#[test]
fn top_k_with_fewer_candidates_than_k() {
    let query = vec![1.0, 0.0];
    let only = vec![0.5, 0.5];
    let candidates: Vec<(&str, &[f32])> = vec![("only", only.as_slice())];

    let results = top_k(&query, candidates, 10).expect("uniform dimensions");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0, "only");
}

#[test]
fn top_k_zero_k_is_empty() {
    let query = vec![1.0, 0.0];
    let v = vec![1.0, 0.0];
    let candidates: Vec<(&str, &[f32])> = vec![("a", v.as_slice())];
    assert!(
        top_k(&query, candidates, 0)
            .expect("uniform dimensions")
            .is_empty()
    );
}
