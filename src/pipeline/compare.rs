//! Byte-level sample comparison.
//!
//! This is a coarse heuristic over the submitted bytes: size ratio, exact
//! SHA-256 equality, and positional agreement over a leading prefix. It is
//! **not** a biometric matcher and gives no cryptographic guarantee. Two
//! captures of the same finger will usually not match; two different images
//! of identical size and header layout can score well above zero.
//!
//! Score layout (defaults from [`MatchConfig`]):
//!
//! | component | value |
//! |-----------|-------|
//! | size      | `min(len) / max(len) * 0.2` |
//! | hash      | `0.8` when the SHA-256 digests agree, else 0 |
//! | content   | on hash mismatch: `min(2 * equal_fraction, 0.7) * 0.3` over the first `min(1000, min_len)` bytes |
//!
//! A pair matches when the total reaches the threshold (0.75). If either
//! buffer is empty the result is a non-match with score 0.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::diagnostic::{default_sink, DiagnosticEvent, DiagnosticSink, SharedSink, Stage};
use super::guard::run_guarded;
use super::intake::hash::sha256_digest;
use crate::config::MatchConfig;

/// What the comparator needs from one buffer. Lets a host keep the digest
/// of an enrolled sample instead of its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleDigest {
    pub len: usize,
    pub sha256: [u8; 32],
    /// Leading bytes, at most the prefix length it was built with.
    pub prefix: Vec<u8>,
}

impl SampleDigest {
    pub fn from_bytes(bytes: &[u8], prefix_len: usize) -> Self {
        Self {
            len: bytes.len(),
            sha256: sha256_digest(bytes),
            prefix: bytes[..prefix_len.min(bytes.len())].to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub size_ratio: f64,
    pub size_score: f64,
    pub hash_match: bool,
    pub hash_score: f64,
    /// Doubled and capped positional agreement; 0 on a hash match.
    pub content_similarity: f64,
    pub content_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub is_match: bool,
    pub score: f64,
    pub threshold: f64,
    pub breakdown: ScoreBreakdown,
}

impl ComparisonResult {
    /// Score as a percentage, one decimal.
    pub fn confidence(&self) -> f64 {
        (self.score * 1000.0).round() / 10.0
    }

    pub fn message(&self) -> &'static str {
        if self.is_match {
            "Fingerprints match"
        } else {
            "Fingerprints do not match"
        }
    }

    fn no_match(threshold: f64) -> Self {
        Self {
            is_match: false,
            score: 0.0,
            threshold,
            breakdown: ScoreBreakdown {
                size_ratio: 0.0,
                size_score: 0.0,
                hash_match: false,
                hash_score: 0.0,
                content_similarity: 0.0,
                content_score: 0.0,
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Comparator
// ═══════════════════════════════════════════════════════════

pub struct Comparator {
    config: MatchConfig,
    sink: SharedSink,
}

impl Default for Comparator {
    fn default() -> Self {
        Self::new(MatchConfig::default())
    }
}

impl Comparator {
    pub fn new(config: MatchConfig) -> Self {
        Self {
            config,
            sink: default_sink(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Digest with this comparator's prefix length.
    pub fn digest(&self, bytes: &[u8]) -> SampleDigest {
        SampleDigest::from_bytes(bytes, self.config.content_prefix_len)
    }

    pub fn compare_bytes(&self, a: &[u8], b: &[u8]) -> ComparisonResult {
        self.compare_digests(&self.digest(a), &self.digest(b))
    }

    pub fn compare_digests(&self, a: &SampleDigest, b: &SampleDigest) -> ComparisonResult {
        let threshold = self.config.threshold;
        let result = run_guarded(
            Stage::Compare,
            self.sink.as_ref(),
            || ComparisonResult::no_match(threshold),
            || self.score(a, b),
        );

        debug!(
            score = result.score,
            is_match = result.is_match,
            len_a = a.len,
            len_b = b.len,
            "Samples compared"
        );
        self.sink.record(DiagnosticEvent::Compared {
            score: result.score,
            is_match: result.is_match,
        });
        result
    }

    fn score(&self, a: &SampleDigest, b: &SampleDigest) -> ComparisonResult {
        let c = &self.config;

        // Nothing to compare: never a match, even though empty digests agree.
        if a.len == 0 || b.len == 0 {
            return ComparisonResult::no_match(c.threshold);
        }

        let (min_len, max_len) = (a.len.min(b.len), a.len.max(b.len));
        let size_ratio = min_len as f64 / max_len as f64;
        let size_score = size_ratio * c.size_weight;

        let hash_match = a.sha256 == b.sha256;
        let hash_score = if hash_match { c.hash_weight } else { 0.0 };

        let content_similarity = if hash_match {
            0.0
        } else {
            positional_agreement(a, b, c.content_prefix_len)
                .map(|fraction| (fraction * 2.0).min(c.content_cap))
                .unwrap_or(0.0)
        };
        let content_score = content_similarity * c.content_weight;

        let score = size_score + hash_score + content_score;
        ComparisonResult {
            is_match: score >= c.threshold,
            score,
            threshold: c.threshold,
            breakdown: ScoreBreakdown {
                size_ratio,
                size_score,
                hash_match,
                hash_score,
                content_similarity,
                content_score,
            },
        }
    }
}

/// Fraction of equal bytes over the shared leading window. `None` when
/// either side is empty.
fn positional_agreement(a: &SampleDigest, b: &SampleDigest, prefix_len: usize) -> Option<f64> {
    let n = prefix_len
        .min(a.len.min(b.len))
        .min(a.prefix.len().min(b.prefix.len()));
    if n == 0 {
        return None;
    }
    let equal = a.prefix[..n]
        .iter()
        .zip(&b.prefix[..n])
        .filter(|(x, y)| x == y)
        .count();
    Some(equal as f64 / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::diagnostic::{MemorySink, NullSink};

    fn comparator() -> Comparator {
        Comparator::default().with_sink(Arc::new(NullSink))
    }

    #[test]
    fn identical_buffers_score_one() {
        let bytes: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        let r = comparator().compare_bytes(&bytes, &bytes);
        assert!(r.is_match);
        assert!((r.score - 1.0).abs() < 1e-12);
        assert!(r.breakdown.hash_match);
        assert_eq!(r.breakdown.content_similarity, 0.0);
        assert_eq!(r.confidence(), 100.0);
        assert_eq!(r.message(), "Fingerprints match");
    }

    #[test]
    fn very_different_sizes_do_not_match() {
        let a = vec![1u8; 100];
        let b = vec![2u8; 100_000];
        let r = comparator().compare_bytes(&a, &b);
        assert!(!r.is_match);
        assert!(r.breakdown.size_score < 0.001);
        assert!(r.score < 0.75);
    }

    #[test]
    fn one_differing_byte_caps_content() {
        let a = vec![7u8; 2000];
        let mut b = a.clone();
        b[10] = 8;
        let r = comparator().compare_bytes(&a, &b);

        // 0.2 size + 0 hash + 0.3 * min(2 * 0.999, 0.7)
        assert!((r.score - 0.41).abs() < 1e-9, "score {}", r.score);
        assert!((r.breakdown.content_similarity - 0.7).abs() < 1e-12);
        assert!(!r.is_match);
    }

    #[test]
    fn low_agreement_is_doubled() {
        let a: Vec<u8> = vec![0u8; 1000];
        let b: Vec<u8> = (0..1000).map(|i| if i < 100 { 0 } else { 1 }).collect();
        let r = comparator().compare_bytes(&a, &b);
        // 10% equal, doubled to 0.2
        assert!((r.breakdown.content_similarity - 0.2).abs() < 1e-12);
        assert!((r.score - (0.2 + 0.06)).abs() < 1e-9);
    }

    #[test]
    fn empty_buffers_never_match() {
        let r = comparator().compare_bytes(&[], &[]);
        assert!(!r.is_match);
        assert_eq!(r.score, 0.0);
        assert!(!r.breakdown.hash_match);
        assert_eq!(r.message(), "Fingerprints do not match");

        let r = comparator().compare_bytes(&[], &[1, 2, 3]);
        assert_eq!(r.score, 0.0);
        assert!(!r.is_match);
    }

    #[test]
    fn digests_agree_with_bytes() {
        let c = comparator();
        let a: Vec<u8> = (0..3000u32).map(|i| (i * 7 % 256) as u8).collect();
        let b: Vec<u8> = (0..2500u32).map(|i| (i * 5 % 256) as u8).collect();

        let from_bytes = c.compare_bytes(&a, &b);
        let from_digests = c.compare_digests(&c.digest(&a), &c.digest(&b));
        assert_eq!(from_bytes, from_digests);
        assert_eq!(c.digest(&a).prefix.len(), 1000);
    }

    #[test]
    fn comparison_is_recorded() {
        let sink = Arc::new(MemorySink::new());
        let c = Comparator::default().with_sink(sink.clone());
        c.compare_bytes(b"abc", b"abc");
        assert_eq!(
            sink.events(),
            vec![DiagnosticEvent::Compared {
                score: 1.0,
                is_match: true
            }]
        );
    }
}
