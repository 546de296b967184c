use std::collections::HashMap;

use anyhow::{anyhow, ensure, Context, Result};
use ndarray::Array1;
use reqwest::blocking::Client;

use crate::observation::{Action, Observation};

pub trait ActionSource {
    /// Liveness check. Diagnostic only; the result never gates execution.
    fn ping(&self) -> bool;

    fn sample_actions(&self, observation: &Observation) -> Result<Vec<Action>>;
}

/// Client for the remote action-inference server.
pub struct PolicyClient {
    base_url: String,
    action_keys: Vec<String>,
    http: Client,
}

impl PolicyClient {
    pub fn new(host: &str, port: u16, action_keys: Vec<String>) -> Self {
        PolicyClient {
            base_url: format!("http://{}:{}", host, port),
            action_keys,
            http: Client::new(),
        }
    }
}

impl ActionSource for PolicyClient {
    fn ping(&self) -> bool {
        self.http
            .get(format!("{}/ping", self.base_url))
            .send()
            .map(|response| response.status().is_success())
            .unwrap_or(false)
    }

    fn sample_actions(&self, observation: &Observation) -> Result<Vec<Action>> {
        let response: HashMap<String, Vec<Vec<f64>>> = self
            .http
            .post(format!("{}/act", self.base_url))
            .json(&observation.to_value())
            .send()
            .context("Failed to reach the policy server")?
            .error_for_status()
            .context("Action sampling request was rejected")?
            .json()
            .context("Failed to parse the action sampling response")?;

        assemble_actions(&response, &self.action_keys)
    }
}

/// Concatenates each step's rows across the configured action keys, in
/// key order, into one action per step.
fn assemble_actions(
    response: &HashMap<String, Vec<Vec<f64>>>,
    action_keys: &[String],
) -> Result<Vec<Action>> {
    let mut num_steps = None;

    for key in action_keys {
        let steps = response
            .get(key)
            .ok_or_else(|| anyhow!("Policy response is missing action key {:?}", key))?;

        match num_steps {
            None => num_steps = Some(steps.len()),
            Some(expected) => ensure!(
                steps.len() == expected,
                "Action key {:?} returned {} steps, expected {}",
                key,
                steps.len(),
                expected
            ),
        }
    }

    let num_steps = num_steps.unwrap_or(0);
    let mut actions = Vec::with_capacity(num_steps);

    for step in 0..num_steps {
        let mut values = Vec::new();
        for key in action_keys {
            values.extend_from_slice(&response[key][step]);
        }
        actions.push(Array1::from(values));
    }

    Ok(actions)
}
