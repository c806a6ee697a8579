#![allow(dead_code)]

use atm_controller::application::Collaborators;
use atm_controller::application::session::Terminal;
use atm_controller::config::AtmConfig;
use atm_controller::infrastructure::in_memory::InMemoryRemoteStore;
use atm_controller::infrastructure::simulated::{
    ManualClock, ScriptedInput, SimulatedActuator, StaticFacialVerifier,
};
use serde_json::{Value, json};
use std::sync::Arc;

pub const USERS: &str = "/ATM/Users";

/// Simulated terminal hardware around one in-memory blackboard.
pub struct Rig {
    pub store: InMemoryRemoteStore,
    pub input: ScriptedInput,
    pub actuator: SimulatedActuator,
    pub clock: ManualClock,
    pub config: AtmConfig,
    pub facial: StaticFacialVerifier,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_config(AtmConfig::default())
    }

    pub fn with_config(config: AtmConfig) -> Self {
        Self {
            store: InMemoryRemoteStore::new(),
            input: ScriptedInput::new(),
            actuator: SimulatedActuator::new(),
            clock: ManualClock::new(),
            config,
            facial: StaticFacialVerifier::default(),
        }
    }

    pub async fn seed(&self, key: &str, record: Value) -> &Self {
        self.store.insert(&format!("{USERS}/{key}"), record).await;
        self
    }

    /// Seeds a record with a top-level PIN.
    pub async fn account(&self, key: &str, number: &str, pin: &str, balance: u64) -> &Self {
        self.seed(
            key,
            json!({ "accountNumber": number, "PIN": pin, "balance": balance.to_string() }),
        )
        .await
    }

    pub async fn keys(&self, script: &str) -> &Self {
        self.input.push_keys(script).await.unwrap();
        self
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            store: Arc::new(self.store.clone()),
            input: Arc::new(self.input.clone()),
            actuator: Arc::new(self.actuator.clone()),
            clock: Arc::new(self.clock.clone()),
            facial: Arc::new(self.facial),
        }
    }

    pub fn terminal(&self) -> Terminal {
        Terminal::new(self.collaborators(), self.config.clone())
    }

    pub async fn field(&self, key: &str, name: &str) -> Option<String> {
        self.store.text(&format!("{USERS}/{key}/{name}")).await
    }

    pub async fn global(&self, path: &str) -> Option<String> {
        self.store.text(path).await
    }

    /// Number of `Fail` codes published on the global tri-state path.
    pub async fn fail_pulses(&self) -> usize {
        self.store
            .writes_to("/ATM/Verification")
            .await
            .iter()
            .filter(|code| *code == "2")
            .count()
    }
}
