use policy_runner::camera::{FrameSource, OpenCvCamera};

const PROBE_IDS: std::ops::Range<i32> = 0..4;
const FRAME_WIDTH: i32 = 320;
const FRAME_HEIGHT: i32 = 240;

fn main() {
    env_logger::init();

    for camera_id in PROBE_IDS {
        let mut camera = match OpenCvCamera::open(camera_id, FRAME_WIDTH, FRAME_HEIGHT) {
            Ok(camera) => camera,
            Err(error) => {
                println!("camera {}: {}", camera_id, error);
                continue;
            }
        };

        match camera.grab_frame() {
            Ok(Some(frame)) => println!("camera {}: frame {:?}", camera_id, frame.shape()),
            Ok(None) => println!("camera {}: no frame", camera_id),
            Err(error) => println!("camera {}: {}", camera_id, error),
        }
    }
}
