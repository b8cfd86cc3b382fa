use heapless::Vec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const MAX_TASKS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskId {
    Control,
    Serial,
    SimulatorIo,
}

/// The seam through which the host substrate adjusts task cadence.
pub trait TaskScheduler {
    fn reschedule(&mut self, task: TaskId, period_us: u32);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSlot {
    pub id: TaskId,
    pub period_us: u32,
    pub last_run_us: u64,
    pub run_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TaskStats {
    pub cycles: u64,
    pub tasks_run: u64,
    pub guarded_skips: u64,
}

/// Fixed-rate task table for the hosted entry point.
#[derive(Debug)]
pub struct TaskTable {
    tasks: Vec<TaskSlot, MAX_TASKS>,
    stats: TaskStats,
}

impl TaskTable {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            stats: TaskStats::default(),
        }
    }

    /// Add a task, or change its period if it is already registered.
    pub fn register(&mut self, id: TaskId, period_us: u32) -> Result<(), &'static str> {
        if period_us == 0 {
            return Err("Task period must be non-zero");
        }

        if let Some(slot) = self.tasks.iter_mut().find(|slot| slot.id == id) {
            slot.period_us = period_us;
            return Ok(());
        }

        self.tasks
            .push(TaskSlot {
                id,
                period_us,
                last_run_us: 0,
                run_count: 0,
            })
            .map_err(|_| "Task table full")
    }

    pub fn period_of(&self, id: TaskId) -> Option<u32> {
        self.tasks.iter().find(|slot| slot.id == id).map(|slot| slot.period_us)
    }

    /// Tasks whose period has elapsed, in registration order. Returned
    /// tasks are marked as run at `now_us`.
    pub fn due_tasks(&mut self, now_us: u64) -> Vec<TaskId, MAX_TASKS> {
        let mut due: Vec<TaskId, MAX_TASKS> = Vec::new();

        for slot in self.tasks.iter_mut() {
            let elapsed = now_us.saturating_sub(slot.last_run_us);
            if slot.run_count == 0 || elapsed >= u64::from(slot.period_us) {
                slot.last_run_us = now_us;
                slot.run_count = slot.run_count.saturating_add(1);
                // due can hold every slot
                let _ = due.push(slot.id);
            }
        }

        self.stats.cycles += 1;
        self.stats.tasks_run += due.len() as u64;
        due
    }

    /// Microseconds until the earliest task is due, zero if one already is.
    pub fn idle_time_us(&self, now_us: u64) -> u64 {
        self.tasks
            .iter()
            .map(|slot| {
                if slot.run_count == 0 {
                    0
                } else {
                    (slot.last_run_us + u64::from(slot.period_us)).saturating_sub(now_us)
                }
            })
            .min()
            .unwrap_or(0)
    }

    /// A guarded task lost the main-loop guard and skipped its cycle.
    pub fn record_guarded_skip(&mut self) {
        self.stats.guarded_skips += 1;
    }

    pub fn stats(&self) -> &TaskStats {
        &self.stats
    }

    pub fn tasks(&self) -> &[TaskSlot] {
        &self.tasks
    }
}

impl Default for TaskTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskScheduler for TaskTable {
    fn reschedule(&mut self, task: TaskId, period_us: u32) {
        match self.register(task, period_us) {
            Ok(()) => debug!(?task, period_us, "task rescheduled"),
            Err(e) => warn!(?task, period_us, "cannot reschedule task: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_creation() {
        let table = TaskTable::new();
        assert!(table.tasks().is_empty());
        assert_eq!(table.stats().cycles, 0);
    }

    #[test]
    fn test_new_tasks_run_immediately() {
        let mut table = TaskTable::new();
        table.register(TaskId::Control, 1000).unwrap();
        table.register(TaskId::Serial, 500).unwrap();

        let due = table.due_tasks(0);
        assert_eq!(due.as_slice(), &[TaskId::Control, TaskId::Serial]);
    }

    #[test]
    fn test_tasks_respect_period() {
        let mut table = TaskTable::new();
        table.register(TaskId::Control, 1000).unwrap();
        table.register(TaskId::Serial, 500).unwrap();
        table.due_tasks(0);

        assert!(table.due_tasks(499).is_empty());
        assert_eq!(table.due_tasks(500).as_slice(), &[TaskId::Serial]);
        assert_eq!(table.due_tasks(1000).as_slice(), &[TaskId::Control, TaskId::Serial]);
        assert_eq!(table.stats().tasks_run, 5);
    }

    #[test]
    fn test_reschedule_updates_existing_task() {
        let mut table = TaskTable::new();
        table.register(TaskId::SimulatorIo, 20_000).unwrap();
        table.reschedule(TaskId::SimulatorIo, 5_000);

        assert_eq!(table.tasks().len(), 1);
        assert_eq!(table.period_of(TaskId::SimulatorIo), Some(5_000));
    }

    #[test]
    fn test_zero_period_rejected() {
        let mut table = TaskTable::new();
        assert!(table.register(TaskId::Serial, 0).is_err());
        table.reschedule(TaskId::Serial, 0);
        assert_eq!(table.period_of(TaskId::Serial), None);
    }

    #[test]
    fn test_idle_time() {
        let mut table = TaskTable::new();
        assert_eq!(table.idle_time_us(0), 0);

        table.register(TaskId::Control, 1000).unwrap();
        table.register(TaskId::Serial, 400).unwrap();
        table.due_tasks(100);
        assert_eq!(table.idle_time_us(200), 300);
        assert_eq!(table.idle_time_us(600), 0);
    }
}
