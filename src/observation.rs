use anyhow::{ensure, Result};
use ndarray::{Array1, Array2, Array3, Array4, Axis};
use serde_json::{json, Map, Value};

pub const CAM_CONTEXT_KEY: &str = "video.cam_context";
pub const CAM_WRIST_KEY: &str = "video.cam_wrist";
pub const SINGLE_ARM_KEY: &str = "state.single_arm";
pub const GRIPPER_KEY: &str = "state.gripper";
pub const TASK_DESCRIPTION_KEY: &str = "annotation.human.action.task_description";

pub const NUM_JOINTS: usize = 6;

/// A joint-target command for one dispatch, in radians.
pub type Action = Array1<f64>;

/// Reverses the channel order and prepends a batch axis:
/// (H, W, 3) RGB becomes (1, H, W, 3) BGR.
pub fn batch_bgr(frame: &Array3<u8>) -> Array4<u8> {
    let mut bgr = frame.clone();
    bgr.invert_axis(Axis(2));
    bgr.insert_axis(Axis(0))
}

pub struct JointState {
    pub single_arm: Array2<f64>,
    pub gripper: Array2<f64>,
}

/// Splits a joint read into the (1, 5) arm row and the (1, 1) gripper row.
pub fn split_joint_state(angles: &[f64]) -> Result<JointState> {
    ensure!(
        angles.len() == NUM_JOINTS,
        "Expected {} joint angles, the robot reported {}",
        NUM_JOINTS,
        angles.len()
    );

    let single_arm =
        Array2::from_shape_vec((1, NUM_JOINTS - 1), angles[..NUM_JOINTS - 1].to_vec())?;
    let gripper = Array2::from_shape_vec((1, 1), vec![angles[NUM_JOINTS - 1]])?;

    Ok(JointState {
        single_arm,
        gripper,
    })
}

pub struct Observation {
    pub cam_context: Option<Array4<u8>>,
    pub cam_wrist: Option<Array4<u8>>,
    pub single_arm: Array2<f64>,
    pub gripper: Array2<f64>,
    pub task_description: String,
}

impl Observation {
    /// The JSON map sent to the policy server. A video key is omitted
    /// entirely when its camera produced no frame.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();

        if let Some(frames) = &self.cam_context {
            map.insert(CAM_CONTEXT_KEY.to_string(), frames_value(frames));
        }
        if let Some(frames) = &self.cam_wrist {
            map.insert(CAM_WRIST_KEY.to_string(), frames_value(frames));
        }

        map.insert(SINGLE_ARM_KEY.to_string(), rows_value(&self.single_arm));
        map.insert(GRIPPER_KEY.to_string(), rows_value(&self.gripper));
        map.insert(
            TASK_DESCRIPTION_KEY.to_string(),
            json!([self.task_description]),
        );

        Value::Object(map)
    }
}

fn frames_value(frames: &Array4<u8>) -> Value {
    json!(frames
        .outer_iter()
        .map(|image| {
            image
                .outer_iter()
                .map(|row| {
                    row.outer_iter()
                        .map(|pixel| pixel.to_vec())
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>())
}

fn rows_value(rows: &Array2<f64>) -> Value {
    json!(rows.outer_iter().map(|row| row.to_vec()).collect::<Vec<_>>())
}
