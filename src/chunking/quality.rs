//! Chunk quality scoring.

/// Scores `text` as the ratio of alphanumeric characters to non-whitespace
/// characters, rounded to three decimals. Empty text scores `0.0`.
#[must_use]
pub fn quality_score(text: &str) -> f64 {
    let mut alnum = 0usize;
    let mut non_whitespace = 0usize;
    for c in text.chars() {
        if c.is_whitespace() {
            continue;
        }
        non_whitespace += 1;
        if c.is_alphanumeric() {
            alnum += 1;
        }
    }
    if non_whitespace == 0 {
        return 0.0;
    }
    let raw = f64::from(u32::try_from(alnum).unwrap_or(u32::MAX))
        / f64::from(u32::try_from(non_whitespace).unwrap_or(u32::MAX));
    (raw * 1000.0).round() / 1000.0
}
