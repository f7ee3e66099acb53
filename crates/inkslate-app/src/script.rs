//! Gesture scripts: recorded pen input and editing commands replayed against a session.

use inkslate_core::{Eraser, Mode, PenStyle, RawSample};
use serde::{Deserialize, Serialize};

/// Milliseconds between generated sample timestamps.
const SAMPLE_INTERVAL_MS: i64 = 8;

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Mode { mode: Mode },
    Pen { pen: PenStyle },
    Eraser { eraser: Eraser },
    /// Pen-down to pen-up in screen space. Each point is `[x, y, pressure]`.
    Gesture { points: Vec<[f64; 3]> },
    Undo,
    Redo,
    Scroll { offset: i32 },
    MoveSelection { dx: f64, dy: f64 },
    CutSelection,
    CommitSelection,
    /// Commit pending strokes as one undo group without waiting for the debounce window.
    Commit,
    /// Switch to another stored page.
    Load { page_id: String },
    /// Delete a stored page. Deleting the open page leaves it empty.
    DeletePage { page_id: String },
    /// Sleep, letting the debounce window elapse.
    Wait { ms: u64 },
}

impl Step {
    /// Samples for a gesture step, with timestamps spaced at the digitizer rate.
    pub fn samples(points: &[[f64; 3]]) -> Vec<RawSample> {
        points
            .iter()
            .enumerate()
            .map(|(i, &[x, y, pressure])| RawSample::new(x, y, pressure, i as i64 * SAMPLE_INTERVAL_MS))
            .collect()
    }
}

/// A replayable script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Script {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_steps() {
        let json = r#"{
            "steps": [
                {"action": "mode", "mode": "Erase"},
                {"action": "eraser", "eraser": {"Area": {"radius": 8.0}}},
                {"action": "gesture", "points": [[0, 0, 1], [10, 10, 2]]},
                {"action": "move_selection", "dx": 0, "dy": 25},
                {"action": "undo"},
                {"action": "wait", "ms": 20},
                {"action": "delete_page", "page_id": "old"}
            ]
        }"#;
        let script = Script::from_json(json).unwrap();
        assert_eq!(script.steps.len(), 7);
        assert_eq!(script.steps[0], Step::Mode { mode: Mode::Erase });
        assert_eq!(script.steps[1], Step::Eraser { eraser: Eraser::Area { radius: 8.0 } });
        assert_eq!(script.steps[4], Step::Undo);
        assert_eq!(script.steps[6], Step::DeletePage { page_id: "old".into() });
    }

    #[test]
    fn test_samples_get_increasing_timestamps() {
        let samples = Step::samples(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        assert_eq!(samples[0], RawSample::new(1.0, 2.0, 3.0, 0));
        assert_eq!(samples[1].timestamp, SAMPLE_INTERVAL_MS);
    }

    #[test]
    fn test_unknown_action_rejected() {
        assert!(Script::from_json(r#"{"steps": [{"action": "fly"}]}"#).is_err());
    }
}
