// Response validation: clamps an untrusted decision into the safe envelope.
use crate::decision::types::DecisionResponse;

pub const DURATION_MS_RANGE: (i64, i64) = (50, 1200);
pub const NEXT_CAPTURE_MS_RANGE: (i64, i64) = (300, 5000);

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Returns a copy of `resp` with every coordinate and confidence in `[0, 1]`,
/// `duration_ms` in `[50, 1200]` and `next_capture_ms` in `[300, 5000]`.
/// The action is left untouched; unknown verbs are no-ops at execution.
pub fn validate(resp: &DecisionResponse) -> DecisionResponse {
    DecisionResponse {
        action: resp.action.clone(),
        x_norm: clamp_unit(resp.x_norm),
        y_norm: clamp_unit(resp.y_norm),
        swipe_to_x_norm: clamp_unit(resp.swipe_to_x_norm),
        swipe_to_y_norm: clamp_unit(resp.swipe_to_y_norm),
        duration_ms: resp.duration_ms.clamp(DURATION_MS_RANGE.0, DURATION_MS_RANGE.1),
        next_capture_ms: resp
            .next_capture_ms
            .clamp(NEXT_CAPTURE_MS_RANGE.0, NEXT_CAPTURE_MS_RANGE.1),
        goal_id: resp.goal_id.clone(),
        confidence: clamp_unit(resp.confidence),
        reason: resp.reason.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::types::DecisionAction;

    fn in_envelope(r: &DecisionResponse) -> bool {
        [r.x_norm, r.y_norm, r.swipe_to_x_norm, r.swipe_to_y_norm, r.confidence]
            .iter()
            .all(|v| (0.0..=1.0).contains(v))
            && (50..=1200).contains(&r.duration_ms)
            && (300..=5000).contains(&r.next_capture_ms)
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let raw = DecisionResponse {
            action: DecisionAction::Swipe,
            x_norm: -0.5,
            y_norm: 1.7,
            swipe_to_x_norm: 42.0,
            swipe_to_y_norm: -1e9,
            duration_ms: -10,
            next_capture_ms: 99_999,
            confidence: 3.0,
            ..DecisionResponse::default()
        };
        let safe = validate(&raw);
        assert_eq!(safe.x_norm, 0.0);
        assert_eq!(safe.y_norm, 1.0);
        assert_eq!(safe.swipe_to_x_norm, 1.0);
        assert_eq!(safe.swipe_to_y_norm, 0.0);
        assert_eq!(safe.duration_ms, 50);
        assert_eq!(safe.next_capture_ms, 5000);
        assert_eq!(safe.confidence, 1.0);
        assert_eq!(safe.action, DecisionAction::Swipe);
    }

    #[test]
    fn envelope_holds_for_extreme_inputs() {
        let extremes = [f64::NEG_INFINITY, -1.0, 0.0, 0.3, 1.0, 2.0, f64::INFINITY, f64::NAN];
        let ints = [i64::MIN, -1, 0, 60, 1199, 5001, i64::MAX];
        for &f in &extremes {
            for &i in &ints {
                let raw = DecisionResponse {
                    x_norm: f,
                    y_norm: f,
                    swipe_to_x_norm: f,
                    swipe_to_y_norm: f,
                    confidence: f,
                    duration_ms: i,
                    next_capture_ms: i,
                    ..DecisionResponse::default()
                };
                assert!(in_envelope(&validate(&raw)), "f={f} i={i}");
            }
        }
    }

    #[test]
    fn in_range_values_pass_through() {
        let raw = DecisionResponse {
            action: DecisionAction::Tap,
            x_norm: 0.25,
            y_norm: 0.75,
            duration_ms: 200,
            next_capture_ms: 900,
            confidence: 0.6,
            reason: "open bag".into(),
            ..DecisionResponse::default()
        };
        assert_eq!(validate(&raw), raw);
    }
}
