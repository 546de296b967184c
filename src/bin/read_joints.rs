use policy_runner::{
    config::Config,
    robot::{HttpRobot, RobotApi},
};

fn main() {
    env_logger::init();

    let config = Config::load_or_init("config.json")
        .unwrap()
        .expect("config.json was just created; fill it in and rerun");

    let robot = HttpRobot::new(config.robot_api_url, config.robot_id);
    let angles = robot.read_joints().unwrap();

    println!("{:?}", angles);
}
