use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    AccrualTick,
    ReadySignal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

#[derive(Debug)]
struct Entry {
    handle: TaskHandle,
    task: Task,
    due: Instant,
    period: Option<Duration>,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    next_id: u64,
    entries: Vec<Entry>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, task: Task, due: Instant, period: Option<Duration>) -> TaskHandle {
        self.next_id += 1;
        let handle = TaskHandle(self.next_id);
        self.entries.push(Entry {
            handle,
            task,
            due,
            period,
        });
        handle
    }

    pub fn every(&mut self, now: Instant, period: Duration, task: Task) -> TaskHandle {
        self.push(task, now + period, Some(period))
    }

    pub fn once(&mut self, now: Instant, delay: Duration, task: Task) -> TaskHandle {
        self.push(task, now + delay, None)
    }

    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.handle != handle);
        self.entries.len() != before
    }

    pub fn is_scheduled(&self, handle: TaskHandle) -> bool {
        self.entries.iter().any(|entry| entry.handle == handle)
    }

    // A periodic task that fell more than a period behind fires once; the
    // missed occurrences are dropped.
    pub fn due(&mut self, now: Instant) -> Vec<(TaskHandle, Task)> {
        let mut fired: Vec<(Instant, TaskHandle, Task)> = Vec::new();
        self.entries.retain_mut(|entry| {
            if entry.due > now {
                return true;
            }
            fired.push((entry.due, entry.handle, entry.task));
            match entry.period {
                Some(period) => {
                    let next = entry.due + period;
                    entry.due = if next <= now { now + period } else { next };
                    true
                }
                None => false,
            }
        });
        fired.sort_by_key(|(due, handle, _)| (*due, handle.0));
        fired
            .into_iter()
            .map(|(_, handle, task)| (handle, task))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn periodic_task_fires_once_per_period() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        let handle = scheduler.every(start, SECOND, Task::AccrualTick);

        assert!(scheduler.due(start + Duration::from_millis(999)).is_empty());
        assert_eq!(
            scheduler.due(start + SECOND),
            vec![(handle, Task::AccrualTick)]
        );
        assert!(scheduler.due(start + Duration::from_millis(1_500)).is_empty());
        assert_eq!(scheduler.due(start + Duration::from_millis(2_100)).len(), 1);
        assert!(scheduler.is_scheduled(handle));
    }

    #[test]
    fn frequent_pumps_keep_the_cadence() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.every(start, SECOND, Task::AccrualTick);

        let mut fired = 0;
        let mut now = start;
        for _ in 0..50 {
            now += Duration::from_millis(130);
            fired += scheduler.due(now).len();
        }
        // 6.5 s elapsed, pumped often enough that no tick is lost.
        assert_eq!(fired, 6);
    }

    #[test]
    fn stalled_loop_drops_missed_ticks() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.every(start, SECOND, Task::AccrualTick);

        assert_eq!(scheduler.due(start + Duration::from_secs(10)).len(), 1);
        assert!(scheduler.due(start + Duration::from_millis(10_500)).is_empty());
        assert_eq!(scheduler.due(start + Duration::from_secs(11)).len(), 1);
    }

    #[test]
    fn one_shot_fires_exactly_once() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        let handle = scheduler.once(start, Duration::from_millis(500), Task::ReadySignal);

        assert!(scheduler.due(start + Duration::from_millis(499)).is_empty());
        assert_eq!(
            scheduler.due(start + Duration::from_millis(500)),
            vec![(handle, Task::ReadySignal)]
        );
        assert!(scheduler.due(start + Duration::from_secs(5)).is_empty());
        assert!(!scheduler.is_scheduled(handle));
    }

    #[test]
    fn cancelled_tasks_never_fire() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        let handle = scheduler.every(start, SECOND, Task::AccrualTick);

        assert!(scheduler.cancel(handle));
        assert!(!scheduler.cancel(handle));
        assert!(scheduler.due(start + Duration::from_secs(3)).is_empty());
    }

    #[test]
    fn due_tasks_come_out_in_deadline_order() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.every(start, SECOND, Task::AccrualTick);
        scheduler.once(start, Duration::from_millis(500), Task::ReadySignal);

        let tasks: Vec<Task> = scheduler
            .due(start + Duration::from_millis(1_200))
            .into_iter()
            .map(|(_, task)| task)
            .collect();
        assert_eq!(tasks, vec![Task::ReadySignal, Task::AccrualTick]);
    }
}
