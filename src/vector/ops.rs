//! Vector Operations
//!
//! Distance helpers shared by the embedded index.
//!
//! # Performance Considerations
//! - Uses f32 storage (embeddings rarely need f64 precision)
//! - Iterator-based loops so the compiler can autovectorize

/// Dot product of two equally sized vectors.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Euclidean norm.
#[inline]
pub fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Compute cosine distance between two vectors.
///
/// Formula: d(a, b) = 1 - (a · b) / (||a|| * ||b||)
///
/// Returns a value in [0, 2] where:
/// - 0 = identical direction
/// - 1 = orthogonal
/// - 2 = opposite direction
///
/// # Edge Cases
/// - Returns 1.0 if either vector is zero (no direction to compare)
/// - Returns `f32::INFINITY` for mismatched dimensions
#[inline]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }

    let denom = norm(a) * norm(b);
    if denom < 1e-10 {
        return 1.0;
    }

    (1.0 - dot(a, b) / denom).clamp(0.0, 2.0)
}

/// Scale to unit length. Zero vectors are returned unchanged.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let n = norm(v);
    if n > 1e-10 {
        v.iter().map(|x| x / n).collect()
    } else {
        v.to_vec()
    }
}
