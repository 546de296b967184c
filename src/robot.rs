use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::observation::Action;

/// Joint identifiers for the arm plus gripper, in wire order.
pub const JOINT_IDS: [u8; 6] = [1, 2, 3, 4, 5, 6];

pub trait RobotApi {
    fn read_joints(&self) -> Result<Vec<f64>>;
    fn write_joints(&self, action: &Action) -> Result<()>;
}

#[derive(Deserialize)]
struct JointsReadResponse {
    angles: Vec<f64>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct JointsWriteRequest {
    pub angles: Vec<f64>,
    pub unit: &'static str,
    pub joints_ids: [u8; 6],
}

impl JointsWriteRequest {
    pub fn new(action: &Action) -> Self {
        JointsWriteRequest {
            angles: action.to_vec(),
            unit: "rad",
            joints_ids: JOINT_IDS,
        }
    }
}

/// Client for the robot-control HTTP API.
pub struct HttpRobot {
    base_url: String,
    robot_id: u32,
    http: Client,
}

impl HttpRobot {
    pub fn new(base_url: impl Into<String>, robot_id: u32) -> Self {
        HttpRobot {
            base_url: base_url.into(),
            robot_id,
            http: Client::new(),
        }
    }
}

impl RobotApi for HttpRobot {
    fn read_joints(&self) -> Result<Vec<f64>> {
        let response: JointsReadResponse = self
            .http
            .post(format!("{}/joints/read", self.base_url))
            .send()
            .context("Failed to reach the joint read endpoint")?
            .error_for_status()
            .context("Joint read request was rejected")?
            .json()
            .context("Failed to parse the joint read response")?;

        Ok(response.angles)
    }

    fn write_joints(&self, action: &Action) -> Result<()> {
        self.http
            .post(format!("{}/joints/write", self.base_url))
            .query(&[("robot_id", self.robot_id)])
            .header("accept", "application/json")
            .json(&JointsWriteRequest::new(action))
            .send()
            .context("Failed to reach the joint write endpoint")?
            .error_for_status()
            .context("Joint write request was rejected")?;

        Ok(())
    }
}
