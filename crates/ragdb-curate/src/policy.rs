/// Word count above which a message gets the widest result count.
pub const LONG_TEXT_WORDS: usize = 60;
/// Lower bound (inclusive) of the medium band.
pub const MEDIUM_TEXT_WORDS: usize = 30;
pub const HIGH_RISK: f32 = 0.80;

/// How many results to request for a message: 7 for long or high-risk
/// messages, 5 for medium ones, 3 otherwise.
pub fn dynamic_k(text: &str, risk_score: f32) -> usize {
    let words = text.split_whitespace().count();
    if words > LONG_TEXT_WORDS || risk_score >= HIGH_RISK {
        7
    } else if words >= MEDIUM_TEXT_WORDS {
        5
    } else {
        3
    }
}
