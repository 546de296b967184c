use std::{env, thread, time::Duration};

use anyhow::{Context, Result};

use policy_runner::{
    camera::OpenCvCamera, config::Config, pipeline::ControlLoop, policy::PolicyClient,
    robot::HttpRobot,
};

fn main() -> Result<()> {
    env_logger::init();

    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_string());

    let Some(config) = Config::load_or_init(&config_path)? else {
        println!("Wrote a default configuration to {}.", config_path);
        println!("Fill in the policy server host before running again.");
        return Ok(());
    };

    config.validate().context("Invalid configuration")?;

    let context_camera = OpenCvCamera::open(
        config.context_camera_id,
        config.frame_width,
        config.frame_height,
    )?;
    let wrist_camera = OpenCvCamera::open(
        config.wrist_camera_id,
        config.frame_width,
        config.frame_height,
    )?;

    // Give the cameras time to warm up before the first grab.
    thread::sleep(Duration::from_secs(3));

    let robot = HttpRobot::new(config.robot_api_url, config.robot_id);
    let policy = PolicyClient::new(&config.policy_host, config.policy_port, config.action_keys);

    let mut control = ControlLoop::new(
        context_camera,
        wrist_camera,
        robot,
        policy,
        config.task_description,
        config.action_rate_hz,
    );

    control.run()
}
