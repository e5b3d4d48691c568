//! Vector similarity helpers.

/// L2-normalize a vector in place. Zero vectors are left untouched.
pub fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity of two vectors of equal length.
///
/// Returns 0.0 when either vector is zero or the lengths differ.
pub fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

/// Indices and scores of the `k` rows most similar to `query`, best first.
///
/// Scores are clamped to [0, 1].
pub fn top_k<'a, I>(query: &[f32], rows: I, k: usize) -> Vec<(usize, f32)>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut scored: Vec<(usize, f32)> = rows
        .into_iter()
        .enumerate()
        .map(|(i, row)| (i, cosine_sim(query, row).clamp(0.0, 1.0)))
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored
}
