use std::{fs::File, path::Path};

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

/// Host value shipped in the default config; running with it still in
/// place is a configuration error.
pub const HOST_PLACEHOLDER: &str = "YOUR_SERVER_IP";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub policy_host: String,
    pub policy_port: u16,
    pub action_keys: Vec<String>,
    pub robot_api_url: String,
    pub robot_id: u32,
    pub context_camera_id: i32,
    pub wrist_camera_id: i32,
    pub frame_width: i32,
    pub frame_height: i32,
    pub task_description: String,
    pub action_rate_hz: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            policy_host: HOST_PLACEHOLDER.to_string(),
            policy_port: 8080,
            action_keys: vec![
                "action.single_arm".to_string(),
                "action.gripper".to_string(),
            ],
            robot_api_url: "http://localhost:8020".to_string(),
            robot_id: 1,
            context_camera_id: 0,
            wrist_camera_id: 1,
            frame_width: 320,
            frame_height: 240,
            task_description:
                "Pick up the orange lego brick from the table and put it in the black container."
                    .to_string(),
            action_rate_hz: 30.0,
        }
    }
}

impl Config {
    /// Reads the config file. When the file does not exist yet, writes a
    /// default template in its place and returns `None` so the caller can
    /// prompt the user to fill it in.
    pub fn load_or_init(path: impl AsRef<Path>) -> Result<Option<Config>> {
        let path = path.as_ref();

        if !path.exists() {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            serde_json::to_writer_pretty(file, &Config::default())
                .with_context(|| format!("Failed to write {}", path.display()))?;

            return Ok(None);
        }

        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let config = serde_json::from_reader(file)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        Ok(Some(config))
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.policy_host != HOST_PLACEHOLDER,
            "policy_host is still \"{}\"; set it to the IP or URL of the machine running the policy server",
            HOST_PLACEHOLDER
        );
        ensure!(
            self.action_rate_hz > 0.0,
            "action_rate_hz must be positive, got {}",
            self.action_rate_hz
        );

        Ok(())
    }
}
