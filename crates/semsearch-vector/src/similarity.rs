/// Cosine similarity of two equal-length vectors, accumulated in `f64`.
///
/// A zero-magnitude vector scores `0.0` against everything instead of
/// producing NaN, and so does any input that would yield NaN (a NaN or
/// infinite component). The result is clamped to `[-1, 1]`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len(), "cosine_similarity on vectors of different length");
    let (mut dot, mut norm_a, mut norm_b) = (0f64, 0f64, 0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let score = dot / (norm_a.sqrt() * norm_b.sqrt());
    if score.is_nan() {
        return 0.0;
    }
    let score = score.clamp(-1.0, 1.0);
    // -0.0 and 0.0 must rank alike under total_cmp.
    if score == 0.0 { 0.0 } else { score }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn self_similarity_is_one() {
        let v = [0.3f32, -1.2, 4.0, 0.0, 7.5];
        assert!(close(cosine_similarity(&v, &v), 1.0));
    }

    #[test]
    fn opposite_is_minus_one() {
        let v = [0.3f32, -1.2, 4.0];
        let neg: Vec<f32> = v.iter().map(|x| -x).collect();
        assert!(close(cosine_similarity(&v, &neg), -1.0));
    }

    #[test]
    fn symmetric() {
        let a = [1.0f32, 2.0, 3.0];
        let b = [-0.5f32, 4.0, 0.25];
        assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
    }

    #[test]
    fn orthogonal_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, -1.0]), 0.0);
    }

    #[test]
    fn zero_vector_scores_zero_not_nan() {
        let zero = [0.0f32; 4];
        let v = [1.0f32, 2.0, 3.0, 4.0];
        assert_eq!(cosine_similarity(&zero, &v), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn non_finite_components_score_zero() {
        let v = [1.0f32, 0.0];
        assert_eq!(cosine_similarity(&[f32::NAN, 0.0], &v), 0.0);
        assert_eq!(cosine_similarity(&[f32::INFINITY, 0.0], &v), 0.0);
        assert_eq!(cosine_similarity(&v, &[0.0, f32::NEG_INFINITY]), 0.0);
    }

    #[test]
    fn high_dimensional_large_values_stay_finite() {
        // 1e30 squared overflows f32 but not f64.
        let v = vec![1e30f32; 3072];
        assert!(close(cosine_similarity(&v, &v), 1.0));
    }

    #[test]
    fn scale_invariant() {
        let a = [1.0f32, 2.0, 3.0];
        let b: Vec<f32> = a.iter().map(|x| x * 1000.0).collect();
        assert!(close(cosine_similarity(&a, &b), 1.0));
    }
}
