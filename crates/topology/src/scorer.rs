//! 신뢰도 점수 — 독립 증거의 결합
//!
//! 증거 가중치 `w_i`를 `1 − Π(1 − w_i)`로 결합합니다. 같은 보고자/프로토콜
//! 증거는 링크 안에서 이미 하나로 합쳐져 있으므로 중복 계산되지 않습니다.

use topowatch_core::config::ScoringConfig;

use crate::link::Evidence;

/// 가중치 집합을 하나의 신뢰도로 결합합니다.
///
/// 결과는 `[0, 1]`로 고정됩니다. 빈 입력은 0입니다.
pub fn combine(weights: impl IntoIterator<Item = f64>) -> f64 {
    let miss: f64 = weights
        .into_iter()
        .map(|w| 1.0 - w.clamp(0.0, 1.0))
        .product();
    (1.0 - miss).clamp(0.0, 1.0)
}

/// 설정된 프로토콜 가중치로 링크 신뢰도를 계산합니다.
#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    weights: ScoringConfig,
}

impl ConfidenceScorer {
    /// 점수 설정으로 스코어러를 생성합니다.
    pub fn new(weights: ScoringConfig) -> Self {
        Self { weights }
    }

    /// 증거 목록의 결합 신뢰도
    pub fn score(&self, evidence: &[Evidence]) -> f64 {
        combine(evidence.iter().map(|e| self.weights.weight(e.protocol)))
    }

    /// 충돌 상태를 반영한 신뢰도
    pub fn score_with_conflict(&self, evidence: &[Evidence], conflicting: bool) -> f64 {
        let base = self.score(evidence);
        if conflicting { self.penalize(base) } else { base }
    }

    /// 충돌 패널티를 적용합니다.
    pub fn penalize(&self, confidence: f64) -> f64 {
        (confidence * self.weights.conflict_penalty).clamp(0.0, 1.0)
    }

    /// 점수 설정
    pub fn weights(&self) -> &ScoringConfig {
        &self.weights
    }
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}
