//! Resource sizing and retry policy for pipeline tasks.
//!
//! The job runner asks two questions per attempt: what resources to
//! request, and what to do with a non-zero exit status. Both answers are
//! pure table lookups, with one linear escalation rule: every dimension
//! that scales does so proportionally to the attempt number.

use log::warn;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GIB: u64 = 1 << 30;
const HOUR: u64 = 3600;

/// Number of extra attempts granted to a transiently failing task under
/// the default strategy.
pub const DEFAULT_MAX_RETRIES: u32 = 1;

/// Resource-sizing tier for a unit of work.
#[derive(Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[serde(rename_all = "snake_case")]
pub enum TaskClass {
    Single,
    Low,
    Medium,
    High,
}

/// Overrides one dimension of the base tier; the others keep the tier's
/// value for that attempt.
#[derive(Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[serde(rename_all = "snake_case")]
pub enum TaskModifier {
    /// Wall time 20h per attempt.
    Long,
    /// Memory 200 GiB per attempt.
    HighMemory,
}

/// Concrete resource request for one attempt.
#[derive(Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Debug)]
pub struct ResourceEnvelope {
    pub cpus: u32,
    pub memory_bytes: u64,
    pub wall_time: Duration,
}

impl TaskClass {
    /// (cpus, GiB, hours) at attempt 1.
    fn base(self) -> (u32, u64, u64) {
        match self {
            TaskClass::Single => (1, 6, 4),
            TaskClass::Low => (2, 12, 4),
            TaskClass::Medium => (6, 36, 8),
            TaskClass::High => (12, 72, 16),
        }
    }
}

/// Resources to request for `attempt` (numbered from 1) of a task in
/// `class`, scaled linearly per attempt. `Single` keeps one cpu on retry;
/// everything else grows with the attempt number.
pub fn envelope(class: TaskClass, modifiers: &[TaskModifier], attempt: u32) -> ResourceEnvelope {
    let attempt = attempt.max(1);
    let a = u64::from(attempt);
    let (cpus, mem_gib, hours) = class.base();

    let cpus = if class == TaskClass::Single {
        1
    } else {
        cpus * attempt
    };
    let mut memory_bytes = mem_gib * GIB * a;
    let mut secs = hours * HOUR * a;
    for m in modifiers {
        match m {
            TaskModifier::Long => secs = 20 * HOUR * a,
            TaskModifier::HighMemory => memory_bytes = 200 * GIB * a,
        }
    }

    ResourceEnvelope {
        cpus,
        memory_bytes,
        wall_time: Duration::from_secs(secs),
    }
}

/// Exit statuses that indicate a transient failure: the signal range
/// 130-145 (SIGINT through SIGTERM and the OOM kills in between), 104
/// (connection reset) and 175 (scheduler preemption). Worth retrying with
/// the next-larger envelope.
pub fn is_transient(status: i32) -> bool {
    (130..=145).contains(&status) || status == 104 || status == 175
}

/// What the runner does with a failed attempt.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RetryDecision {
    /// Re-run with the next attempt number.
    Retry,
    /// Mark this branch failed and report it; sibling work continues.
    Finish,
    /// Log the failure and treat the branch as successfully skipped.
    Ignore,
}

/// Per-task override of the default error handling.
#[derive(Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStrategy {
    /// Retry transient statuses up to [`DEFAULT_MAX_RETRIES`]; finish on
    /// anything else.
    #[default]
    Default,
    /// Retry any failure up to the given cap.
    Retry { max_retries: u32 },
    /// Never retry; always ignore the failure.
    Ignore,
}

/// Decide what to do after an attempt exits with non-zero `status`.
/// `attempt` is the attempt that just failed, numbered from 1.
pub fn classify(status: i32, attempt: u32, strategy: ErrorStrategy) -> RetryDecision {
    match strategy {
        ErrorStrategy::Ignore => RetryDecision::Ignore,
        ErrorStrategy::Retry { max_retries } => {
            if attempt < max_retries + 1 {
                RetryDecision::Retry
            } else {
                RetryDecision::Finish
            }
        }
        ErrorStrategy::Default => {
            if is_transient(status) && attempt < DEFAULT_MAX_RETRIES + 1 {
                RetryDecision::Retry
            } else {
                RetryDecision::Finish
            }
        }
    }
}

/// Lifecycle of one task attempt.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed(i32),
    Finished,
    Ignored,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Finished | TaskState::Ignored
        )
    }
}

/// Tracks one task through the attempt state machine:
/// `Pending -> Running -> Succeeded | Failed(status)`, where a failure
/// either re-enters `Pending` with the next attempt number or lands in
/// `Finished`/`Ignored` per [`classify`].
#[derive(Debug, Clone)]
pub struct TaskAttempt {
    class: TaskClass,
    modifiers: Vec<TaskModifier>,
    strategy: ErrorStrategy,
    attempt: u32,
    state: TaskState,
}

impl TaskAttempt {
    pub fn new(class: TaskClass) -> TaskAttempt {
        TaskAttempt {
            class,
            modifiers: Vec::new(),
            strategy: ErrorStrategy::Default,
            attempt: 1,
            state: TaskState::Pending,
        }
    }

    pub fn with_modifiers(mut self, modifiers: &[TaskModifier]) -> TaskAttempt {
        self.modifiers = modifiers.to_vec();
        self
    }

    pub fn with_strategy(mut self, strategy: ErrorStrategy) -> TaskAttempt {
        self.strategy = strategy;
        self
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// The envelope to request for the current attempt.
    pub fn resources(&self) -> ResourceEnvelope {
        envelope(self.class, &self.modifiers, self.attempt)
    }

    pub fn start(&mut self) {
        debug_assert_eq!(self.state, TaskState::Pending);
        self.state = TaskState::Running;
    }

    /// Record the attempt's exit status and advance the state machine.
    /// Returns the new state; `Pending` means the runner should launch the
    /// next attempt with [`TaskAttempt::resources`].
    pub fn complete(&mut self, status: i32) -> TaskState {
        if status == 0 {
            self.state = TaskState::Succeeded;
            return self.state;
        }
        self.state = TaskState::Failed(status);
        match classify(status, self.attempt, self.strategy) {
            RetryDecision::Retry => {
                warn!(
                    "attempt {} exited with status {status}; retrying with a larger envelope",
                    self.attempt
                );
                self.attempt += 1;
                self.state = TaskState::Pending;
            }
            RetryDecision::Finish => self.state = TaskState::Finished,
            RetryDecision::Ignore => {
                warn!("attempt {} exited with status {status}; ignoring", self.attempt);
                self.state = TaskState::Ignored;
            }
        }
        self.state
    }
}

/// Global cap on independent branch failures for a whole run. The default
/// cap is unlimited.
#[derive(Debug, Clone, Default)]
pub struct ErrorBudget {
    max_errors: Option<u32>,
    seen: u32,
}

impl ErrorBudget {
    pub fn new(max_errors: Option<u32>) -> ErrorBudget {
        ErrorBudget {
            max_errors,
            seen: 0,
        }
    }

    /// Record one failed branch; returns true when the run must abort.
    pub fn record_failure(&mut self) -> bool {
        self.seen += 1;
        self.max_errors.is_some_and(|cap| self.seen > cap)
    }

    pub fn failures(&self) -> u32 {
        self.seen
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_medium_attempt_3() {
        let r = envelope(TaskClass::Medium, &[], 3);
        assert_eq!(r.cpus, 18);
        assert_eq!(r.memory_bytes, 108 * GIB);
        assert_eq!(r.wall_time, Duration::from_secs(24 * HOUR));
    }

    #[test]
    fn test_single_keeps_one_cpu() {
        let r = envelope(TaskClass::Single, &[], 2);
        assert_eq!(r.cpus, 1);
        assert_eq!(r.memory_bytes, 12 * GIB);
        assert_eq!(r.wall_time, Duration::from_secs(8 * HOUR));
    }

    #[test]
    fn test_modifiers_override_one_dimension() {
        let r = envelope(TaskClass::High, &[TaskModifier::Long], 1);
        assert_eq!(r.cpus, 12);
        assert_eq!(r.memory_bytes, 72 * GIB);
        assert_eq!(r.wall_time, Duration::from_secs(20 * HOUR));

        let r = envelope(TaskClass::Low, &[TaskModifier::HighMemory], 2);
        assert_eq!(r.cpus, 4);
        assert_eq!(r.memory_bytes, 400 * GIB);
        assert_eq!(r.wall_time, Duration::from_secs(8 * HOUR));
    }

    #[test]
    fn test_transient_statuses() {
        for s in [130, 137, 145, 104, 175] {
            assert!(is_transient(s), "{s}");
        }
        for s in [1, 2, 103, 129, 146, 174, 176, 255] {
            assert!(!is_transient(s), "{s}");
        }
    }

    #[test]
    fn test_sigkill_retries_then_finishes() {
        let mut task = TaskAttempt::new(TaskClass::Medium);
        task.start();
        assert_eq!(task.complete(137), TaskState::Pending);
        assert_eq!(task.attempt(), 2);
        assert_eq!(task.resources().cpus, 12);

        task.start();
        assert_eq!(task.complete(137), TaskState::Finished);
        assert!(task.state().is_terminal());
    }

    #[test]
    fn test_fatal_status_finishes_immediately() {
        let mut task = TaskAttempt::new(TaskClass::Low);
        task.start();
        assert_eq!(task.complete(1), TaskState::Finished);
        assert_eq!(task.attempt(), 1);
    }

    #[test]
    fn test_success() {
        let mut task = TaskAttempt::new(TaskClass::Single);
        task.start();
        assert_eq!(task.complete(0), TaskState::Succeeded);
    }

    #[test]
    fn test_always_retry_strategy() {
        let mut task = TaskAttempt::new(TaskClass::Low)
            .with_strategy(ErrorStrategy::Retry { max_retries: 2 });
        task.start();
        // Fatal status, but the strategy retries anything.
        assert_eq!(task.complete(1), TaskState::Pending);
        task.start();
        assert_eq!(task.complete(1), TaskState::Pending);
        task.start();
        assert_eq!(task.complete(1), TaskState::Finished);
    }

    #[test]
    fn test_ignore_strategy() {
        let mut task = TaskAttempt::new(TaskClass::Low).with_strategy(ErrorStrategy::Ignore);
        task.start();
        assert_eq!(task.complete(137), TaskState::Ignored);
    }

    #[test]
    fn test_error_budget() {
        let mut unlimited = ErrorBudget::default();
        for _ in 0..100 {
            assert!(!unlimited.record_failure());
        }

        let mut capped = ErrorBudget::new(Some(2));
        assert!(!capped.record_failure());
        assert!(!capped.record_failure());
        assert!(capped.record_failure());
        assert_eq!(capped.failures(), 3);
    }
}
