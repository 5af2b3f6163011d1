//! Parent/child forest derived from the tasks' `parent_id` fields.
//!
//! [`HierarchyIndex`] maps each parent id to its children in collection
//! order. Traversal keeps a visited set, so malformed parent chains (self
//! parents, loops) terminate and every task is emitted exactly once.

use std::collections::{HashMap, HashSet};

use crate::task::Task;

/// Columns of indentation per hierarchy level.
pub const INDENT: usize = 2;

/// Why a row sits at the top level of the forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Regular node: a root without parent, or a child under its parent.
    Plain,
    /// Its parent id refers to a task that does not exist.
    Orphan,
    /// Not reachable from any root because its parent chain loops.
    Cycle,
}

/// One line of the flattened forest.
#[derive(Debug, Clone, Copy)]
pub struct TreeRow<'a> {
    pub task: &'a Task,
    pub depth: usize,
    pub child_count: usize,
    pub marker: Marker,
}

/// Adjacency index over a task slice.
pub struct HierarchyIndex<'a> {
    tasks: &'a [Task],
    positions: HashMap<&'a str, usize>,
    children: HashMap<&'a str, Vec<usize>>,
    top_level: Vec<(usize, Marker)>,
}

impl<'a> HierarchyIndex<'a> {
    pub fn build(tasks: &'a [Task]) -> Self {
        let mut positions = HashMap::with_capacity(tasks.len());
        for (i, t) in tasks.iter().enumerate() {
            positions.entry(t.id.as_str()).or_insert(i);
        }

        let mut children: HashMap<&str, Vec<usize>> = HashMap::new();
        let mut top_level = Vec::new();
        for (i, t) in tasks.iter().enumerate() {
            match t.parent_id.as_deref() {
                None => top_level.push((i, Marker::Plain)),
                Some(p) if !positions.contains_key(p) => top_level.push((i, Marker::Orphan)),
                Some(p) => children.entry(p).or_default().push(i),
            }
        }

        HierarchyIndex {
            tasks,
            positions,
            children,
            top_level,
        }
    }

    /// Tasks without a parent, in collection order.
    pub fn roots(&self) -> impl Iterator<Item = &'a Task> + '_ {
        self.top_level
            .iter()
            .filter(|(_, m)| *m == Marker::Plain)
            .map(|&(i, _)| &self.tasks[i])
    }

    /// Direct children of `id`, in collection order.
    pub fn children(&self, id: &str) -> impl Iterator<Item = &'a Task> + '_ {
        self.child_positions(id).iter().map(|&i| &self.tasks[i])
    }

    pub fn child_count(&self, id: &str) -> usize {
        self.child_positions(id).len()
    }

    /// All transitive descendants of `id`.
    pub fn descendants(&self, id: &str) -> HashSet<&'a str> {
        let mut out = HashSet::new();
        let mut stack: Vec<&str> = vec![id];
        while let Some(current) = stack.pop() {
            for &c in self.child_positions(current) {
                let cid = self.tasks[c].id.as_str();
                if cid != id && out.insert(cid) {
                    stack.push(cid);
                }
            }
        }
        out
    }

    /// Depth-first, pre-order rows of the whole forest.
    pub fn walk(&self) -> Vec<TreeRow<'a>> {
        let mut visited = vec![false; self.tasks.len()];
        let mut rows = Vec::with_capacity(self.tasks.len());

        for &(i, marker) in &self.top_level {
            self.visit(i, marker, &mut visited, &mut rows);
        }

        // Whatever is left hangs off a loop in the parent chain.
        for i in 0..self.tasks.len() {
            if !visited[i] {
                let entry = self.cycle_entry(i);
                self.visit(entry, Marker::Cycle, &mut visited, &mut rows);
                if !visited[i] {
                    self.visit(i, Marker::Cycle, &mut visited, &mut rows);
                }
            }
        }
        rows
    }

    fn visit(&self, start: usize, marker: Marker, visited: &mut [bool], rows: &mut Vec<TreeRow<'a>>) {
        let mut stack = vec![(start, 0usize, marker)];
        while let Some((i, depth, marker)) = stack.pop() {
            if visited[i] {
                continue;
            }
            visited[i] = true;
            let task = &self.tasks[i];
            let kids = self.child_positions(&task.id);
            rows.push(TreeRow {
                task,
                depth,
                child_count: kids.len(),
                marker,
            });
            for &c in kids.iter().rev() {
                if !visited[c] {
                    stack.push((c, depth + 1, Marker::Plain));
                }
            }
        }
    }

    /// First task on the loop reached by following parents up from `i`.
    fn cycle_entry(&self, i: usize) -> usize {
        let mut seen = HashSet::new();
        let mut current = i;
        while seen.insert(current) {
            let next = self.tasks[current]
                .parent_id
                .as_deref()
                .and_then(|p| self.positions.get(p).copied());
            match next {
                Some(n) => current = n,
                None => return current,
            }
        }
        current
    }

    fn child_positions(&self, id: &str) -> &[usize] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Leading whitespace for a row at `depth`.
pub fn indent(depth: usize) -> String {
    " ".repeat(depth * INDENT)
}
