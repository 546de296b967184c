use std::{thread, time::Duration};

use anyhow::{Context, Result};
use log::{debug, warn};
use ndarray::Array4;

use crate::{
    camera::FrameSource,
    observation::{batch_bgr, split_joint_state, Observation},
    policy::ActionSource,
    robot::RobotApi,
};

/// The control loop: grab frames, read joint state, sample actions from
/// the policy server, dispatch each action to the robot. Fully sequential;
/// every failure beyond a camera yielding no frame propagates and ends the
/// process.
pub struct ControlLoop<S, R, P> {
    context_camera: S,
    wrist_camera: S,
    robot: R,
    policy: P,
    task_description: String,
    dispatch_period: Duration,
}

impl<S, R, P> ControlLoop<S, R, P>
where
    S: FrameSource,
    R: RobotApi,
    P: ActionSource,
{
    pub fn new(
        context_camera: S,
        wrist_camera: S,
        robot: R,
        policy: P,
        task_description: String,
        action_rate_hz: f64,
    ) -> Self {
        ControlLoop {
            context_camera,
            wrist_camera,
            robot,
            policy,
            task_description,
            dispatch_period: Duration::from_secs_f64(1.0 / action_rate_hz),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        loop {
            self.cycle()?;
        }
    }

    pub fn cycle(&mut self) -> Result<()> {
        let cam_context = grab_batched(&mut self.context_camera, "context")?;
        let cam_wrist = grab_batched(&mut self.wrist_camera, "wrist")?;

        let angles = self
            .robot
            .read_joints()
            .context("Failed to read joint state")?;
        let state = split_joint_state(&angles)?;

        let observation = Observation {
            cam_context,
            cam_wrist,
            single_arm: state.single_arm,
            gripper: state.gripper,
            task_description: self.task_description.clone(),
        };

        debug!("policy server ping: {}", self.policy.ping());

        let actions = self
            .policy
            .sample_actions(&observation)
            .context("Action sampling failed")?;

        for action in &actions {
            self.robot
                .write_joints(action)
                .context("Failed to write joint targets")?;

            // Cap the dispatch rate. A flat post-send sleep; the time spent
            // in the request itself is not compensated for.
            thread::sleep(self.dispatch_period);
        }

        Ok(())
    }
}

fn grab_batched(camera: &mut impl FrameSource, name: &str) -> Result<Option<Array4<u8>>> {
    let frame = camera
        .grab_frame()
        .with_context(|| format!("Failed to grab a frame from the {} camera", name))?;

    match frame {
        Some(frame) => Ok(Some(batch_bgr(&frame))),
        None => {
            warn!("{} camera produced no frame", name);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{cell::RefCell, rc::Rc, time::Instant};

    use ndarray::{array, Array3};
    use serde_json::{json, Value};

    use crate::observation::{
        Action, CAM_CONTEXT_KEY, CAM_WRIST_KEY, GRIPPER_KEY, SINGLE_ARM_KEY, TASK_DESCRIPTION_KEY,
    };
    use crate::robot::JointsWriteRequest;

    struct ScriptedCamera {
        frame: Option<Array3<u8>>,
    }

    impl FrameSource for ScriptedCamera {
        fn grab_frame(&mut self) -> Result<Option<Array3<u8>>> {
            Ok(self.frame.clone())
        }
    }

    struct ScriptedRobot {
        angles: Vec<f64>,
        writes: Rc<RefCell<Vec<Value>>>,
        write_times: Rc<RefCell<Vec<Instant>>>,
    }

    impl RobotApi for ScriptedRobot {
        fn read_joints(&self) -> Result<Vec<f64>> {
            Ok(self.angles.clone())
        }

        fn write_joints(&self, action: &Action) -> Result<()> {
            self.writes
                .borrow_mut()
                .push(serde_json::to_value(JointsWriteRequest::new(action)).unwrap());
            self.write_times.borrow_mut().push(Instant::now());
            Ok(())
        }
    }

    struct ScriptedPolicy {
        actions: Vec<Action>,
        observations: Rc<RefCell<Vec<Value>>>,
    }

    impl ActionSource for ScriptedPolicy {
        fn ping(&self) -> bool {
            true
        }

        fn sample_actions(&self, observation: &Observation) -> Result<Vec<Action>> {
            self.observations.borrow_mut().push(observation.to_value());
            Ok(self.actions.clone())
        }
    }

    struct Recorders {
        writes: Rc<RefCell<Vec<Value>>>,
        write_times: Rc<RefCell<Vec<Instant>>>,
        observations: Rc<RefCell<Vec<Value>>>,
    }

    fn control_loop(
        context_frame: Option<Array3<u8>>,
        wrist_frame: Option<Array3<u8>>,
        actions: Vec<Action>,
        action_rate_hz: f64,
    ) -> (
        ControlLoop<ScriptedCamera, ScriptedRobot, ScriptedPolicy>,
        Recorders,
    ) {
        let recorders = Recorders {
            writes: Rc::new(RefCell::new(Vec::new())),
            write_times: Rc::new(RefCell::new(Vec::new())),
            observations: Rc::new(RefCell::new(Vec::new())),
        };

        let control = ControlLoop::new(
            ScriptedCamera {
                frame: context_frame,
            },
            ScriptedCamera { frame: wrist_frame },
            ScriptedRobot {
                angles: vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6],
                writes: recorders.writes.clone(),
                write_times: recorders.write_times.clone(),
            },
            ScriptedPolicy {
                actions,
                observations: recorders.observations.clone(),
            },
            "stack the cups".to_string(),
            action_rate_hz,
        );

        (control, recorders)
    }

    fn rgb_frame() -> Array3<u8> {
        Array3::from_shape_fn((240, 320, 3), |(y, x, c)| (y * 3 + x * 5 + c * 7) as u8)
    }

    #[test]
    fn full_cycle_observes_once_and_dispatches_each_action() {
        let actions = vec![
            array![0.1, 0.2, 0.3, 0.4, 0.5, 0.6],
            array![1.1, 1.2, 1.3, 1.4, 1.5, 1.6],
        ];
        let (mut control, recorders) =
            control_loop(Some(rgb_frame()), Some(rgb_frame()), actions, 30.0);

        let started = Instant::now();
        control.cycle().unwrap();
        let elapsed = started.elapsed();

        let observations = recorders.observations.borrow();
        assert_eq!(observations.len(), 1);

        let map = observations[0].as_object().unwrap();
        assert_eq!(map.len(), 5);
        for key in [
            CAM_CONTEXT_KEY,
            CAM_WRIST_KEY,
            SINGLE_ARM_KEY,
            GRIPPER_KEY,
            TASK_DESCRIPTION_KEY,
        ] {
            assert!(map.contains_key(key), "missing {}", key);
        }

        let writes = recorders.writes.borrow();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0]["angles"], json!([0.1, 0.2, 0.3, 0.4, 0.5, 0.6]));
        assert_eq!(writes[1]["angles"], json!([1.1, 1.2, 1.3, 1.4, 1.5, 1.6]));
        for write in writes.iter() {
            assert_eq!(write["unit"], "rad");
            assert_eq!(write["joints_ids"], json!([1, 2, 3, 4, 5, 6]));
        }

        // One dispatch period after each send, so consecutive sends are at
        // least a period apart and the cycle spans at least two.
        let write_times = recorders.write_times.borrow();
        assert!(write_times[1] - write_times[0] >= Duration::from_millis(33));
        assert!(elapsed >= Duration::from_millis(66));
    }

    #[test]
    fn missing_camera_skips_its_key_and_continues() {
        let (mut control, recorders) = control_loop(Some(rgb_frame()), None, Vec::new(), 1000.0);

        control.cycle().unwrap();

        let observations = recorders.observations.borrow();
        let map = observations[0].as_object().unwrap();

        assert_eq!(map.len(), 4);
        assert!(map.contains_key(CAM_CONTEXT_KEY));
        assert!(!map.contains_key(CAM_WRIST_KEY));
    }

    #[test]
    fn both_cameras_missing_still_sends_state() {
        let (mut control, recorders) = control_loop(None, None, Vec::new(), 1000.0);

        control.cycle().unwrap();

        let observations = recorders.observations.borrow();
        let map = observations[0].as_object().unwrap();

        assert_eq!(map.len(), 3);
        assert!(map.contains_key(SINGLE_ARM_KEY));
        assert!(map.contains_key(GRIPPER_KEY));
        assert!(map.contains_key(TASK_DESCRIPTION_KEY));
    }

    #[test]
    fn observation_splits_the_joint_read() {
        let (mut control, recorders) = control_loop(None, None, Vec::new(), 1000.0);

        control.cycle().unwrap();

        let observations = recorders.observations.borrow();
        assert_eq!(
            observations[0][SINGLE_ARM_KEY],
            json!([[0.1, 0.2, 0.3, 0.4, 0.5]])
        );
        assert_eq!(observations[0][GRIPPER_KEY], json!([[0.6]]));
    }

    #[test]
    fn no_actions_means_no_writes() {
        let (mut control, recorders) = control_loop(None, None, Vec::new(), 1000.0);

        control.cycle().unwrap();

        assert!(recorders.writes.borrow().is_empty());
    }
}
