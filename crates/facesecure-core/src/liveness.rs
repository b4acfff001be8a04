use serde::{Deserialize, Serialize};

/// Client-reported anti-spoofing measurements for one capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivenessSignals {
    pub motion_detected: bool,
    pub motion_score: f64,
    pub texture_valid: bool,
    pub texture_score: f64,
    pub challenge_passed: bool,
    #[serde(default)]
    pub challenge_type: String,
    pub quality_score: f64,
}

/// Thresholds for the liveness sub-checks.
///
/// Injected explicitly wherever liveness is evaluated so tests can override
/// thresholds without process-level state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LivenessPolicy {
    pub min_motion_score: f64,
    pub min_texture_score: f64,
    pub min_quality_score: f64,
}

impl Default for LivenessPolicy {
    fn default() -> Self {
        LivenessPolicy {
            min_motion_score: 0.7,
            min_texture_score: 0.8,
            min_quality_score: 0.75,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LivenessVerdict {
    Pass,
    Fail { reason: String },
}

impl LivenessVerdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, LivenessVerdict::Pass)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            LivenessVerdict::Pass => None,
            LivenessVerdict::Fail { reason } => Some(reason),
        }
    }
}

/// Evaluate liveness signals against a policy.
///
/// Checks run in a fixed order (motion, texture, challenge, quality) and the
/// first failing check short-circuits with its reason. The order only affects
/// which reason is reported, never the accept/reject outcome.
pub fn evaluate(signals: &LivenessSignals, policy: &LivenessPolicy) -> LivenessVerdict {
    if !signals.motion_detected || signals.motion_score < policy.min_motion_score {
        return fail("Motion detection failed");
    }

    if !signals.texture_valid || signals.texture_score < policy.min_texture_score {
        return fail("Texture analysis failed");
    }

    if !signals.challenge_passed {
        return fail("Challenge-response failed");
    }

    if signals.quality_score < policy.min_quality_score {
        return fail("Image quality too low");
    }

    LivenessVerdict::Pass
}

fn fail(reason: &str) -> LivenessVerdict {
    LivenessVerdict::Fail {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn good_signals() -> LivenessSignals {
        LivenessSignals {
            motion_detected: true,
            motion_score: 0.9,
            texture_valid: true,
            texture_score: 0.95,
            challenge_passed: true,
            challenge_type: "blink".to_string(),
            quality_score: 0.9,
        }
    }

    #[test]
    fn all_checks_passing_yields_pass() {
        let verdict = evaluate(&good_signals(), &LivenessPolicy::default());
        assert_eq!(verdict, LivenessVerdict::Pass);
    }

    #[test]
    fn low_motion_score_fails_with_motion_reason() {
        let mut signals = good_signals();
        signals.motion_score = 0.5;
        let verdict = evaluate(&signals, &LivenessPolicy::default());
        assert_eq!(verdict.reason(), Some("Motion detection failed"));
    }

    #[test]
    fn motion_flag_false_fails_even_with_high_score() {
        let mut signals = good_signals();
        signals.motion_detected = false;
        let verdict = evaluate(&signals, &LivenessPolicy::default());
        assert_eq!(verdict.reason(), Some("Motion detection failed"));
    }

    #[test]
    fn low_texture_score_fails_with_texture_reason() {
        let mut signals = good_signals();
        signals.texture_score = 0.4;
        let verdict = evaluate(&signals, &LivenessPolicy::default());
        assert_eq!(verdict.reason(), Some("Texture analysis failed"));
    }

    #[test]
    fn failed_challenge_fails_with_challenge_reason() {
        let mut signals = good_signals();
        signals.challenge_passed = false;
        let verdict = evaluate(&signals, &LivenessPolicy::default());
        assert_eq!(verdict.reason(), Some("Challenge-response failed"));
    }

    #[test]
    fn low_quality_fails_with_quality_reason() {
        let mut signals = good_signals();
        signals.quality_score = 0.1;
        let verdict = evaluate(&signals, &LivenessPolicy::default());
        assert_eq!(verdict.reason(), Some("Image quality too low"));
    }

    #[test]
    fn first_failing_check_in_fixed_order_wins() {
        // Motion and quality both fail; motion is checked first.
        let mut signals = good_signals();
        signals.motion_score = 0.0;
        signals.quality_score = 0.0;
        let verdict = evaluate(&signals, &LivenessPolicy::default());
        assert_eq!(verdict.reason(), Some("Motion detection failed"));

        // Texture and challenge both fail; texture is checked first.
        let mut signals = good_signals();
        signals.texture_valid = false;
        signals.challenge_passed = false;
        let verdict = evaluate(&signals, &LivenessPolicy::default());
        assert_eq!(verdict.reason(), Some("Texture analysis failed"));
    }

    #[test]
    fn per_test_policy_override() {
        let mut signals = good_signals();
        signals.quality_score = 0.5;
        let relaxed = LivenessPolicy {
            min_quality_score: 0.4,
            ..LivenessPolicy::default()
        };
        assert!(evaluate(&signals, &relaxed).is_pass());
    }
}
