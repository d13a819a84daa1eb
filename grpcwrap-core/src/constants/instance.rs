use super::state_table;

state_table! {
    /// What started a workflow instance.
    InstanceTrigger {
        Schedule = 1 => "schedule",
        /// Manual runs and test runs.
        Manual = 2 => "manual",
        Supplementary = 3 => "supplementary data",
    }
}

state_table! {
    /// Lifecycle state of a workflow instance.
    InstanceState {
        Pending = 1 => "pending",
        /// Set once the job manager accepts the run.
        Running = 2 => "running",
        Suspended = 3 => "suspended",
        Stopped = 4 => "stopped",
        /// Reported by the job manager.
        Succeed = 5 => "succeed",
        /// Reported by the job manager.
        Failed = 6 => "failed",
    }
}

impl InstanceState {
    /// Whether the instance has reached a final state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            InstanceState::Stopped | InstanceState::Succeed | InstanceState::Failed
        )
    }
}
