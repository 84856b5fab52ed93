//! The tick scheduler: read-parse-deliver cycles per category
//!
//! One [`CategoryState`] per configured category, owned by its own task; no
//! hidden globals. Each tick resolves the active log file, reads only newly
//! appended lines, parses them through the category grammar, and hands the
//! events to the delivery sink in source order. The checkpoint advances as
//! soon as the read succeeds, independent of delivery outcome, so an
//! unreachable sink can never grow an unbounded re-read backlog.

pub mod checkpoint;
pub mod reader;
pub mod resolver;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::grammar::Grammar;
use crate::normalize;
use crate::relay::{DeliveryOutcome, DeliverySink};

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use reader::{LogEncoding, ReadBatch};
pub use resolver::{resolve_active_file, LogFileHandle};

/// Static description of one category, derived from configuration.
#[derive(Debug, Clone)]
pub struct CategorySpec {
    /// Category name; also the log filename prefix and checkpoint key
    pub name: String,
    /// Directory the server writes this category's logs into
    pub log_dir: PathBuf,
    /// Channel the events are relayed to
    pub channel_id: String,
    pub encoding: LogEncoding,
}

/// Counters reported by a category after each tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryStats {
    pub ticks: u64,
    pub lines_read: u64,
    pub events_relayed: u64,
    pub events_failed: u64,
    pub last_line_number: u64,
}

/// Per-category counters shared with the status board.
pub type SharedStats = Arc<Mutex<HashMap<String, CategoryStats>>>;

/// What a single tick accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub lines_read: usize,
    pub events_parsed: usize,
    pub events_delivered: usize,
    pub events_failed: usize,
}

/// All mutable state one category owns: its grammar, its checkpoint, and
/// nothing shared with any other category.
pub struct CategoryState {
    spec: CategorySpec,
    grammar: Grammar,
    store: CheckpointStore,
    checkpoint: Option<Checkpoint>,
    /// A missing log directory is logged once, not every tick
    idle_logged: bool,
}

impl CategoryState {
    /// Build the state for a category: compile its grammar and load any
    /// persisted checkpoint. Grammar problems surface here, at startup.
    pub fn new(spec: CategorySpec, store: CheckpointStore) -> Result<Self, RelayError> {
        let grammar = Grammar::builtin(&spec.name)?;
        let checkpoint = store.load(&spec.name);
        Ok(Self {
            spec,
            grammar,
            store,
            checkpoint,
            idle_logged: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn last_line_number(&self) -> u64 {
        self.checkpoint
            .as_ref()
            .map(|c| c.last_line_number)
            .unwrap_or(0)
    }

    /// Run one read-parse-deliver pass.
    ///
    /// A tick that finds no active file or no new lines is a no-op and does
    /// not touch the checkpoint store.
    pub async fn run_tick(&mut self, sink: &dyn DeliverySink) -> Result<TickOutcome, RelayError> {
        let mut outcome = TickOutcome::default();

        let Some(handle) = resolve_active_file(&self.spec.log_dir, &self.spec.name)? else {
            if !self.idle_logged {
                debug!(
                    "No log file for '{}' in {}, category idle",
                    self.spec.name,
                    self.spec.log_dir.display()
                );
                self.idle_logged = true;
            }
            return Ok(outcome);
        };
        self.idle_logged = false;

        let active_path = handle.path.to_string_lossy().to_string();
        let from_line = match &self.checkpoint {
            None => {
                // First run: seek past the historical backlog without
                // emitting anything, to avoid a delivery flood.
                let total = reader::count_lines(&handle.path, self.spec.encoding)?;
                info!(
                    "First run for '{}': skipping {} existing lines in {}",
                    self.spec.name, total, active_path
                );
                self.persist(active_path, total)?;
                return Ok(outcome);
            }
            Some(cp) if cp.current_log_file == active_path => cp.last_line_number,
            Some(cp) => {
                info!(
                    "Log rotation for '{}': {} -> {}",
                    self.spec.name, cp.current_log_file, active_path
                );
                0
            }
        };

        let mut batch = reader::read_new_lines(&handle.path, from_line, self.spec.encoding)?;
        if batch.total_lines < from_line {
            // Same path but shorter than the checkpoint: truncated in place.
            info!(
                "Log file for '{}' shrank ({} < {}), re-reading from start",
                self.spec.name, batch.total_lines, from_line
            );
            batch = reader::read_new_lines(&handle.path, 0, self.spec.encoding)?;
        }

        if batch.new_lines.is_empty() {
            return Ok(outcome);
        }
        outcome.lines_read = batch.new_lines.len();

        // The read succeeded: advance the checkpoint now, before delivery.
        self.persist(active_path, batch.total_lines)?;

        for line in &batch.new_lines {
            let Some(event) = self.grammar.parse_line(line) else {
                continue;
            };
            outcome.events_parsed += 1;
            let event = normalize::normalize(event);
            match sink.deliver(&self.spec.channel_id, &event).await {
                DeliveryOutcome::Sent => outcome.events_delivered += 1,
                DeliveryOutcome::Failed => outcome.events_failed += 1,
            }
        }

        Ok(outcome)
    }

    fn persist(&mut self, active_path: String, last_line_number: u64) -> Result<(), RelayError> {
        let checkpoint = Checkpoint::new(active_path, last_line_number);
        self.store.save(&self.spec.name, &checkpoint)?;
        self.checkpoint = Some(checkpoint);
        Ok(())
    }
}

/// Drive one category until shutdown.
///
/// Errors never escape: the scheduler maps them to log levels centrally
/// (transient I/O at debug, everything else as a warning) and retries on the
/// next tick.
pub async fn run_category(
    mut state: CategoryState,
    sink: Arc<dyn DeliverySink>,
    interval: Duration,
    stats: SharedStats,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        "Category '{}' started (interval: {:?})",
        state.name(),
        interval
    );
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                match state.run_tick(sink.as_ref()).await {
                    Ok(outcome) => {
                        if outcome.lines_read > 0 {
                            debug!(
                                "Tick for '{}': {} lines, {} events, {} delivered",
                                state.name(),
                                outcome.lines_read,
                                outcome.events_parsed,
                                outcome.events_delivered
                            );
                        }
                        let mut stats = stats.lock().expect("stats lock poisoned");
                        let entry = stats.entry(state.name().to_string()).or_default();
                        entry.ticks += 1;
                        entry.lines_read += outcome.lines_read as u64;
                        entry.events_relayed += outcome.events_delivered as u64;
                        entry.events_failed += outcome.events_failed as u64;
                        entry.last_line_number = state.last_line_number();
                    }
                    Err(e) if e.is_transient() => {
                        debug!("Tick for '{}' deferred: {}", state.name(), e);
                    }
                    Err(e) => {
                        warn!("Tick for '{}' failed: {}", state.name(), e);
                    }
                }
            }
        }
    }

    info!("Category '{}' stopped", state.name());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Event;
    use async_trait::async_trait;
    use std::path::Path;
    use tempfile::tempdir;

    /// Sink test double that records deliveries in call order.
    struct RecordingSink {
        events: Mutex<Vec<Event>>,
        outcome: DeliveryOutcome,
    }

    impl RecordingSink {
        fn sending() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                outcome: DeliveryOutcome::Sent,
            }
        }

        fn failing() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                outcome: DeliveryOutcome::Failed,
            }
        }

        fn victims(&self) -> Vec<String> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.attr("victim").unwrap_or_default().to_string())
                .collect()
        }
    }

    #[async_trait]
    impl DeliverySink for RecordingSink {
        async fn deliver(&self, _channel_id: &str, event: &Event) -> DeliveryOutcome {
            self.events.lock().unwrap().push(event.clone());
            self.outcome
        }
    }

    fn kill_line(victim: &str) -> String {
        format!(
            "2024.06.01-18.02.11: Alice (76561198000000001) killed {victim} (76561198000000002) with Weapon_AK47"
        )
    }

    fn state_for(log_dir: &Path, checkpoint_dir: &Path) -> CategoryState {
        let spec = CategorySpec {
            name: "kills".to_string(),
            log_dir: log_dir.to_path_buf(),
            channel_id: "123".to_string(),
            encoding: LogEncoding::Utf8,
        };
        CategoryState::new(spec, CheckpointStore::new(checkpoint_dir)).unwrap()
    }

    fn append(path: &Path, lines: &[String]) {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
    }

    #[tokio::test]
    async fn test_first_run_emits_nothing_and_records_total() {
        let logs = tempdir().unwrap();
        let cps = tempdir().unwrap();
        let log = logs.path().join("kills_20240601.log");
        let lines: Vec<String> = (0..10_000).map(|i| kill_line(&format!("Bob{i}"))).collect();
        append(&log, &lines);

        let mut state = state_for(logs.path(), cps.path());
        let sink = RecordingSink::sending();
        let outcome = state.run_tick(&sink).await.unwrap();

        assert_eq!(outcome.events_delivered, 0);
        assert!(sink.victims().is_empty());

        let cp = CheckpointStore::new(cps.path()).load("kills").unwrap();
        assert_eq!(cp.last_line_number, 10_000);
    }

    #[tokio::test]
    async fn test_lines_are_never_parsed_twice() {
        let logs = tempdir().unwrap();
        let cps = tempdir().unwrap();
        let log = logs.path().join("kills_20240601.log");
        append(&log, &[kill_line("Seed")]);

        let mut state = state_for(logs.path(), cps.path());
        let sink = RecordingSink::sending();

        // First tick swallows the backlog, later ticks see only appends
        state.run_tick(&sink).await.unwrap();
        append(&log, &[kill_line("One"), kill_line("Two")]);
        state.run_tick(&sink).await.unwrap();
        append(&log, &[kill_line("Three")]);
        let before = state.last_line_number();
        state.run_tick(&sink).await.unwrap();

        assert_eq!(sink.victims(), vec!["One", "Two", "Three"]);
        assert!(state.last_line_number() >= before);
        assert_eq!(state.last_line_number(), 4);
    }

    #[tokio::test]
    async fn test_events_delivered_in_source_order() {
        let logs = tempdir().unwrap();
        let cps = tempdir().unwrap();
        let log = logs.path().join("kills_20240601.log");
        std::fs::File::create(&log).unwrap();

        let mut state = state_for(logs.path(), cps.path());
        let sink = RecordingSink::sending();
        state.run_tick(&sink).await.unwrap();

        append(&log, &[kill_line("A"), kill_line("B"), kill_line("C")]);
        state.run_tick(&sink).await.unwrap();

        assert_eq!(sink.victims(), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_rotation_resets_to_new_file_line_zero() {
        let logs = tempdir().unwrap();
        let cps = tempdir().unwrap();
        let old = logs.path().join("kills_20240601.log");
        append(&old, &(0..50).map(|i| kill_line(&format!("Old{i}"))).collect::<Vec<_>>());

        let store = CheckpointStore::new(cps.path());
        store
            .save("kills", &Checkpoint::new(old.to_string_lossy(), 50))
            .unwrap();

        // A newer file appears; its three lines must be read from line 0
        std::thread::sleep(Duration::from_millis(20));
        let new = logs.path().join("kills_20240701.log");
        append(&new, &[kill_line("N1"), kill_line("N2"), kill_line("N3")]);

        let mut state = state_for(logs.path(), cps.path());
        let sink = RecordingSink::sending();
        state.run_tick(&sink).await.unwrap();

        assert_eq!(sink.victims(), vec!["N1", "N2", "N3"]);
        let cp = store.load("kills").unwrap();
        assert_eq!(cp.current_log_file, new.to_string_lossy());
        assert_eq!(cp.last_line_number, 3);
    }

    #[tokio::test]
    async fn test_worked_example_unmatched_line_advances_checkpoint() {
        let logs = tempdir().unwrap();
        let cps = tempdir().unwrap();
        let log = logs.path().join("kills_2024.log");
        let mut lines: Vec<String> = (0..100).map(|i| kill_line(&format!("Hist{i}"))).collect();
        lines.push(kill_line("X"));
        lines.push(kill_line("Y"));
        lines.push("2024.06.01-18.02.12: server heartbeat ok".to_string());
        append(&log, &lines);

        let store = CheckpointStore::new(cps.path());
        store
            .save("kills", &Checkpoint::new(log.to_string_lossy(), 100))
            .unwrap();

        let mut state = state_for(logs.path(), cps.path());
        let sink = RecordingSink::sending();
        let outcome = state.run_tick(&sink).await.unwrap();

        assert_eq!(outcome.events_delivered, 2);
        assert_eq!(sink.victims(), vec!["X", "Y"]);
        assert_eq!(store.load("kills").unwrap().last_line_number, 103);
    }

    #[tokio::test]
    async fn test_no_new_lines_does_not_write_checkpoint() {
        let logs = tempdir().unwrap();
        let cps = tempdir().unwrap();
        let log = logs.path().join("kills_20240601.log");
        append(&log, &[kill_line("Seed")]);

        let mut state = state_for(logs.path(), cps.path());
        let sink = RecordingSink::sending();
        state.run_tick(&sink).await.unwrap();

        // Remove the persisted checkpoint; an idle tick must not recreate it
        let store = CheckpointStore::new(cps.path());
        std::fs::remove_file(store.path_for("kills")).unwrap();
        state.run_tick(&sink).await.unwrap();
        assert!(!store.path_for("kills").exists());
    }

    #[tokio::test]
    async fn test_checkpoint_advances_when_delivery_fails() {
        let logs = tempdir().unwrap();
        let cps = tempdir().unwrap();
        let log = logs.path().join("kills_20240601.log");
        std::fs::File::create(&log).unwrap();

        let mut state = state_for(logs.path(), cps.path());
        let sink = RecordingSink::failing();
        state.run_tick(&sink).await.unwrap();

        append(&log, &[kill_line("A"), kill_line("B")]);
        let outcome = state.run_tick(&sink).await.unwrap();

        assert_eq!(outcome.events_delivered, 0);
        assert_eq!(outcome.events_failed, 2);
        // Read succeeded, so the checkpoint still advances
        assert_eq!(
            CheckpointStore::new(cps.path()).load("kills").unwrap().last_line_number,
            2
        );
    }

    #[tokio::test]
    async fn test_missing_log_dir_is_idle_not_error() {
        let cps = tempdir().unwrap();
        let missing = cps.path().join("no-logs");

        let mut state = state_for(&missing, cps.path());
        let sink = RecordingSink::sending();
        let outcome = state.run_tick(&sink).await.unwrap();

        assert_eq!(outcome, TickOutcome::default());
        assert!(!CheckpointStore::new(cps.path()).path_for("kills").exists());
    }

    #[tokio::test]
    async fn test_corrupt_checkpoint_falls_back_to_first_run() {
        let logs = tempdir().unwrap();
        let cps = tempdir().unwrap();
        let log = logs.path().join("kills_20240601.log");
        append(&log, &[kill_line("A"), kill_line("B")]);

        let store = CheckpointStore::new(cps.path());
        std::fs::create_dir_all(cps.path()).unwrap();
        std::fs::write(store.path_for("kills"), "{broken").unwrap();

        let mut state = state_for(logs.path(), cps.path());
        let sink = RecordingSink::sending();
        let outcome = state.run_tick(&sink).await.unwrap();

        // First-run policy: no replay of the existing two lines
        assert_eq!(outcome.events_delivered, 0);
        assert_eq!(store.load("kills").unwrap().last_line_number, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_category_stops_on_shutdown() {
        let logs = tempdir().unwrap();
        let cps = tempdir().unwrap();
        let state = state_for(logs.path(), cps.path());
        let stats: SharedStats = Arc::new(Mutex::new(HashMap::new()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run_category(
            state,
            Arc::new(RecordingSink::sending()),
            Duration::from_secs(60),
            stats,
            shutdown_rx,
        ));

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
