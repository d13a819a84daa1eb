use super::state_table;

state_table! {
    /// Release status of a workflow.
    FlowReleaseStatus {
        Active = 1 => "active",
        Suspended = 2 => "suspended",
    }
}

state_table! {
    /// Kind of job a workflow runs.
    FlowType {
        StreamSql = 1 => "stream works with SQL",
        StreamJar = 2 => "stream works with JAR ball",
        StreamOperator = 3 => "stream works with operator choreography",
    }
}

state_table! {
    /// Scheduling priority, highest first.
    FlowPriority {
        Highest = 1 => "highest",
        High = 2 => "high",
        Medium = 3 => "medium",
        Low = 4 => "low",
        Lowest = 5 => "lowest",
    }
}

state_table! {
    /// What happens to a workflow when one of its node tasks fails.
    FlowFailureStrategy {
        Continue = 1 => "continue",
        Suspend = 2 => "suspend",
    }
}

state_table! {
    /// How a scheduled run depends on previous runs.
    FlowDependStrategy {
        None = 1 => "none",
        Last = 2 => "last",
    }
}

state_table! {
    FlowScheduleStrategy {
        Loop = 1 => "loop",
    }
}

state_table! {
    /// Events that trigger a workflow notification.
    FlowNotifyStrategy {
        FlowStarted = 1 => "flow started",
        FlowSucceed = 2 => "flow succeed",
        FlowFailed = 3 => "flow failed",
        NodeStarted = 4 => "node started",
        NodeSucceed = 5 => "node succeed",
        NodeRetried = 6 => "node retried",
        NodeFailed = 7 => "node failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_start_at_one() {
        assert_eq!(FlowReleaseStatus::Active.code(), 1);
        assert_eq!(FlowType::StreamSql.code(), 1);
        assert_eq!(FlowPriority::Highest.code(), 1);
        assert_eq!(FlowPriority::Lowest.code(), 5);
        assert_eq!(FlowNotifyStrategy::NodeFailed.code(), 7);
    }

    #[test]
    fn test_try_from_round_trip() {
        for priority in FlowPriority::ALL {
            assert_eq!(FlowPriority::try_from(priority.code()), Ok(*priority));
        }
    }

    #[test]
    fn test_unknown_code() {
        let err = FlowType::try_from(0).unwrap_err();
        assert_eq!(err.table, "FlowType");
        assert_eq!(err.code, 0);
        assert_eq!(err.to_string(), "unknown FlowType code: 0");
        assert!(FlowScheduleStrategy::try_from(2).is_err());
    }

    #[test]
    fn test_labels() {
        assert_eq!(FlowFailureStrategy::Suspend.label(), "suspend");
        assert_eq!(FlowDependStrategy::Last.to_string(), "last");
    }
}
