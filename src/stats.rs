//! Aggregations over the task collection: per-status counts for the
//! dashboard and status columns for the flow board.

use crate::fields::Status;
use crate::task::Task;

/// Number of tasks in each status. Every status is always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    counts: [usize; Status::ALL.len()],
}

impl StatusCounts {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut counts = StatusCounts::default();
        for task in tasks {
            counts.counts[task.status.index()] += 1;
        }
        counts
    }

    pub fn get(&self, status: Status) -> usize {
        self.counts[status.index()]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// `(status, count)` pairs in board order.
    pub fn iter(&self) -> impl Iterator<Item = (Status, usize)> + '_ {
        Status::ALL.iter().map(|&s| (s, self.get(s)))
    }

    /// Whole-number percentage of tasks that are complete.
    pub fn completion_percent(&self) -> u16 {
        let total = self.total();
        if total == 0 {
            return 0;
        }
        (self.get(Status::Complete) * 100 / total) as u16
    }
}

/// One flow board column per status, in board order. Tasks keep their
/// collection order inside a column.
pub fn group_by_status(tasks: &[Task]) -> [(Status, Vec<&Task>); 4] {
    Status::ALL.map(|status| {
        let column = tasks.iter().filter(|t| t.status == status).collect();
        (status, column)
    })
}
