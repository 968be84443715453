//! Per-step status and log trail

use chrono::{DateTime, Local};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum StepId {
    CreateAdapter,
    AdapterState,
    UnfilteredScan,
    FilteredScan,
    Connect,
    Discover,
    Validate,
}

impl StepId {
    pub const ALL: [StepId; 7] = [
        StepId::CreateAdapter,
        StepId::AdapterState,
        StepId::UnfilteredScan,
        StepId::FilteredScan,
        StepId::Connect,
        StepId::Discover,
        StepId::Validate,
    ];

    /// 1-based step number shown to the operator
    pub fn number(self) -> usize {
        self as usize + 1
    }

    pub fn from_number(n: usize) -> Option<Self> {
        n.checked_sub(1).and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn title(self) -> &'static str {
        match self {
            StepId::CreateAdapter => "Create BLE manager",
            StepId::AdapterState => "Check adapter state",
            StepId::UnfilteredScan => "Scan (no filter)",
            StepId::FilteredScan => "Scan (service UUID filter)",
            StepId::Connect => "Connect",
            StepId::Discover => "Discover services",
            StepId::Validate => "Validate characteristics",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum StepStatus {
    Pending,
    Running,
    Pass,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LogEntry {
    pub at: DateTime<Local>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StepResult {
    pub step: StepId,
    pub status: StepStatus,
    pub log: Vec<LogEntry>,
}

impl StepResult {
    fn new(step: StepId) -> Self {
        Self {
            step,
            status: StepStatus::Pending,
            log: Vec::new(),
        }
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.log.iter().map(|e| e.message.as_str())
    }
}

/// Status and log of all seven steps.
///
/// Starting a step clears only that step's slot. A step finishes at most once
/// per start; late `finish` calls on a step that is not running are ignored.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StepBoard {
    results: Vec<StepResult>,
}

impl StepBoard {
    pub fn new() -> Self {
        Self {
            results: StepId::ALL.into_iter().map(StepResult::new).collect(),
        }
    }

    pub fn get(&self, step: StepId) -> &StepResult {
        &self.results[step as usize]
    }

    pub fn status(&self, step: StepId) -> StepStatus {
        self.get(step).status
    }

    pub fn iter(&self) -> impl Iterator<Item = &StepResult> {
        self.results.iter()
    }

    pub(crate) fn start(&mut self, step: StepId) {
        let slot = &mut self.results[step as usize];
        slot.status = StepStatus::Running;
        slot.log.clear();
        log::debug!("step {} started", step.number());
    }

    pub(crate) fn log(&mut self, step: StepId, message: impl Into<String>) {
        let message = message.into();
        log::info!("[{}] {}", step.number(), message);
        self.results[step as usize].log.push(LogEntry {
            at: Local::now(),
            message,
        });
    }

    pub(crate) fn pass(&mut self, step: StepId) {
        self.finish(step, StepStatus::Pass);
    }

    /// Logs `message` and marks the step failed.
    pub(crate) fn fail(&mut self, step: StepId, message: impl Into<String>) {
        let message = message.into();
        log::warn!("[{}] {}", step.number(), message);
        self.results[step as usize].log.push(LogEntry {
            at: Local::now(),
            message,
        });
        self.finish(step, StepStatus::Fail);
    }

    fn finish(&mut self, step: StepId, status: StepStatus) {
        let slot = &mut self.results[step as usize];
        if slot.status != StepStatus::Running {
            log::debug!(
                "ignoring {status:?} for step {} ({:?})",
                step.number(),
                slot.status
            );
            return;
        }
        slot.status = status;
    }

    pub(crate) fn reset(&mut self, step: StepId) {
        let slot = &mut self.results[step as usize];
        slot.status = StepStatus::Pending;
        slot.log.clear();
    }

    /// Whether the operator may trigger `step` now. Steps 1-4 are always
    /// available; later ones need the previous step to have passed.
    pub fn is_enabled(&self, step: StepId) -> bool {
        match step {
            StepId::Discover => self.status(StepId::Connect) == StepStatus::Pass,
            StepId::Validate => self.status(StepId::Discover) == StepStatus::Pass,
            _ => true,
        }
    }

    pub fn can_disconnect(&self) -> bool {
        self.status(StepId::Connect) == StepStatus::Pass
    }

    pub fn any_failed(&self) -> bool {
        self.results.iter().any(|r| r.status == StepStatus::Fail)
    }
}

impl Default for StepBoard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbering() {
        assert_eq!(StepId::CreateAdapter.number(), 1);
        assert_eq!(StepId::Validate.number(), 7);
        assert_eq!(StepId::from_number(5), Some(StepId::Connect));
        assert_eq!(StepId::from_number(0), None);
        assert_eq!(StepId::from_number(8), None);
    }

    #[test]
    fn restart_clears_only_own_slot() {
        let mut board = StepBoard::new();
        board.start(StepId::UnfilteredScan);
        board.log(StepId::UnfilteredScan, "first");
        board.pass(StepId::UnfilteredScan);
        board.start(StepId::FilteredScan);
        board.fail(StepId::FilteredScan, "nothing");

        board.start(StepId::UnfilteredScan);
        assert_eq!(board.status(StepId::UnfilteredScan), StepStatus::Running);
        assert!(board.get(StepId::UnfilteredScan).log.is_empty());
        assert_eq!(board.status(StepId::FilteredScan), StepStatus::Fail);
        assert_eq!(
            board.get(StepId::FilteredScan).messages().collect::<Vec<_>>(),
            vec!["nothing"]
        );
    }

    #[test]
    fn finish_only_from_running() {
        let mut board = StepBoard::new();
        board.pass(StepId::Connect);
        assert_eq!(board.status(StepId::Connect), StepStatus::Pending);

        board.start(StepId::Connect);
        board.fail(StepId::Connect, "boom");
        board.pass(StepId::Connect);
        assert_eq!(board.status(StepId::Connect), StepStatus::Fail);
    }

    #[test]
    fn gating() {
        let mut board = StepBoard::new();
        assert!(board.is_enabled(StepId::CreateAdapter));
        assert!(board.is_enabled(StepId::FilteredScan));
        assert!(!board.is_enabled(StepId::Discover));
        assert!(!board.is_enabled(StepId::Validate));
        assert!(!board.can_disconnect());

        board.start(StepId::Connect);
        board.pass(StepId::Connect);
        assert!(board.is_enabled(StepId::Discover));
        assert!(!board.is_enabled(StepId::Validate));
        assert!(board.can_disconnect());

        board.start(StepId::Discover);
        board.pass(StepId::Discover);
        assert!(board.is_enabled(StepId::Validate));
    }

    #[test]
    fn serializes_for_reports() {
        let mut board = StepBoard::new();
        board.start(StepId::CreateAdapter);
        board.log(StepId::CreateAdapter, "BLE manager created");
        board.pass(StepId::CreateAdapter);

        let json = serde_json::to_value(&board).unwrap();
        let first = &json["results"][0];
        assert_eq!(first["step"], "CreateAdapter");
        assert_eq!(first["status"], "Pass");
        assert_eq!(first["log"][0]["message"], "BLE manager created");
        assert_eq!(json["results"][6]["status"], "Pending");
    }
}
