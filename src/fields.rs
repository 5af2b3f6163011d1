//! Enumerations and field types for tasks.
//!
//! Status and priority serialize with their display strings ("In Progress"),
//! which is also the layout the persisted slot has always used.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Task progress status. Declaration order is the flow board column order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
    #[serde(rename = "Incomplete")]
    Incomplete,
    #[serde(rename = "In Progress", alias = "InProgress")]
    InProgress,
    #[serde(rename = "Due")]
    Due,
    #[serde(rename = "Complete")]
    Complete,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Incomplete,
        Status::InProgress,
        Status::Due,
        Status::Complete,
    ];

    /// Position of this status in [`Status::ALL`].
    pub fn index(self) -> usize {
        match self {
            Status::Incomplete => 0,
            Status::InProgress => 1,
            Status::Due => 2,
            Status::Complete => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::Incomplete => "Incomplete",
            Status::InProgress => "In Progress",
            Status::Due => "Due",
            Status::Complete => "Complete",
        }
    }

    /// Next status in board order, wrapping around.
    pub fn cycle(self) -> Status {
        Status::ALL[(self.index() + 1) % Status::ALL.len()]
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// Task importance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// Sorting options for task lists.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortKey {
    /// Collection order.
    Created,
    Due,
    Priority,
    Status,
}

/// Filtering options for tasks based on due dates.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DueFilter {
    Today,
    ThisWeek,
    Overdue,
}
