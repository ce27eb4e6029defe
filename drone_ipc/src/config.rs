use std::time::Duration;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub board_size: f64,
    pub detection_radius: f64,
    pub miss_threshold: u32,
    pub ping_delay_ms: u64,
    pub loop_period_ms: u64,
    pub display_period_ms: u64,
    pub obstacle_regen_secs: u64,
    pub reap_timeout_ms: u64,
    pub log_dir: String,
    pub shm_name: String,
    pub sem_name: String,
    pub mass: f64,
    pub damping: f64,
    pub time_step: f64,
    pub force_step: f64,
    /// Command prefix the input role is wrapped in, e.g. `["konsole", "-e"]`.
    pub input_terminal: Vec<String>,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            board_size: 100.0,
            detection_radius: 2.0,
            miss_threshold: 6,
            ping_delay_ms: 50,
            loop_period_ms: 1000,
            display_period_ms: 200,
            obstacle_regen_secs: 10,
            reap_timeout_ms: 2000,
            log_dir: "log".to_string(),
            shm_name: "/drone_sim_shm".to_string(),
            sem_name: "/drone_sim_sem".to_string(),
            mass: 1.0,
            damping: 1.0,
            time_step: 0.5,
            force_step: 1.0,
            input_terminal: Vec::new(),
        }
    }
}

impl SimConfig {
    pub fn ping_delay(&self) -> Duration {
        Duration::from_millis(self.ping_delay_ms)
    }

    pub fn loop_period(&self) -> Duration {
        Duration::from_millis(self.loop_period_ms)
    }

    pub fn display_period(&self) -> Duration {
        Duration::from_millis(self.display_period_ms)
    }

    pub fn obstacle_regen(&self) -> Duration {
        Duration::from_secs(self.obstacle_regen_secs)
    }

    pub fn reap_timeout(&self) -> Duration {
        Duration::from_millis(self.reap_timeout_ms)
    }

    pub fn board_center(&self) -> (f64, f64) {
        (self.board_size / 2.0, self.board_size / 2.0)
    }
}
