/// BM25 scoring.
///
/// score(t, d) = idf(t) * (k1 + 1) * tf / (K + tf)
/// K           = k1 * ((1 - b) + b * docLen / avgDocLen)
/// idf(t)      = ln((N - f_t + 0.5) / (f_t + 0.5))
///
/// idf goes negative for terms in more than half the corpus; that is
/// part of the ranking contract and is not clamped.
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Bm25Params { k1: 1.2, b: 0.75 }
    }
}

/// idf component.
///
/// * `n`   - total number of documents
/// * `f_t` - number of documents containing the term
pub fn idf(n: u32, f_t: u32) -> f64 {
    let n = n as f64;
    let f_t = f_t as f64;
    ((n - f_t + 0.5) / (f_t + 0.5)).ln()
}

/// BM25 contribution of one term to one document.
///
/// * `tf`          - term frequency in the document
/// * `doc_len`     - document length (distinct-term count)
/// * `avg_doc_len` - mean document length over the corpus
pub fn term_score(
    tf: u32,
    doc_len: f64,
    avg_doc_len: f64,
    n: u32,
    f_t: u32,
    params: &Bm25Params,
) -> f64 {
    let tf = tf as f64;
    let k = params.k1 * ((1.0 - params.b) + params.b * doc_len / avg_doc_len);
    idf(n, f_t) * (params.k1 + 1.0) * tf / (k + tf)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_idf_rare_term_positive() {
        // term in 1 of 1000 docs
        let value = idf(1000, 1);
        assert!((value - (999.5f64 / 1.5).ln()).abs() < EPS);
        assert!(value > 0.0);
    }

    #[test]
    fn test_idf_common_term_negative_unclamped() {
        // term in 900 of 1000 docs
        assert!(idf(1000, 900) < 0.0);
    }

    #[test]
    fn test_single_doc_single_term_score() {
        // N = 1, f_t = 1, tf = 1, docLen = avgDocLen = 1:
        // K = 1.2, score = idf * 2.2 / 2.2 = ln(0.5/1.5)
        let params = Bm25Params::default();
        let score = term_score(1, 1.0, 1.0, 1, 1, &params);
        assert!((score - (0.5f64 / 1.5).ln()).abs() < EPS);
    }

    #[test]
    fn test_score_grows_with_tf_but_saturates() {
        let params = Bm25Params::default();
        let s1 = term_score(1, 10.0, 10.0, 1000, 5, &params);
        let s2 = term_score(2, 10.0, 10.0, 1000, 5, &params);
        let s20 = term_score(20, 10.0, 10.0, 1000, 5, &params);
        assert!(s2 > s1);
        assert!(s20 > s2);
        // saturation: doubling tf from 10x gains less than from 1x
        assert!(s20 - s2 < (s2 - s1) * 10.0);
    }

    #[test]
    fn test_longer_docs_score_lower() {
        let params = Bm25Params::default();
        let short = term_score(2, 5.0, 10.0, 1000, 5, &params);
        let long = term_score(2, 50.0, 10.0, 1000, 5, &params);
        assert!(short > long);
    }

    #[test]
    fn test_k_formula_against_hand_computation() {
        let params = Bm25Params::default();
        // docLen 8, avg 4 -> K = 1.2 * (0.25 + 0.75 * 2) = 2.1
        let expected = idf(100, 10) * 2.2 * 3.0 / (2.1 + 3.0);
        let actual = term_score(3, 8.0, 4.0, 100, 10, &params);
        assert!((actual - expected).abs() < EPS);
    }
}
