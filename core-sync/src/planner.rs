//! # Sync Planner
//!
//! Reconciles the local candidate files against the names already present
//! remotely or already waiting in the queue.
//!
//! Planning is a pure function of its inputs, so what is offered for upload
//! never depends on when the remote listing was last refreshed. A stale
//! listing can re-offer a file uploaded in an earlier session; within a
//! session the queued set still blocks double enqueue.

use bridge_traits::FileRef;
use std::collections::HashSet;

/// Decides which local files are eligible for upload.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncPlanner;

impl SyncPlanner {
    pub fn new() -> Self {
        Self
    }

    /// The ordered subsequence of `local_files` whose name is in neither
    /// `remote_names` nor `queued_names`.
    ///
    /// Duplicate names in `local_files` are kept as distinct handles.
    pub fn plan(
        &self,
        local_files: &[FileRef],
        remote_names: &HashSet<String>,
        queued_names: &HashSet<String>,
    ) -> Vec<FileRef> {
        local_files
            .iter()
            .filter(|file| {
                !remote_names.contains(&file.name) && !queued_names.contains(&file.name)
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(names: &[&str]) -> Vec<FileRef> {
        names
            .iter()
            .map(|name| FileRef::new(*name, format!("/cam/{}", name), 100))
            .collect()
    }

    fn names(names: &[&str]) -> HashSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn plan_names(plan: &[FileRef]) -> Vec<&str> {
        plan.iter().map(|file| file.name.as_str()).collect()
    }

    #[test]
    fn test_plan_with_empty_remote_returns_everything() {
        let local = files(&["a.jpg", "b.jpg"]);
        let plan = SyncPlanner::new().plan(&local, &HashSet::new(), &HashSet::new());
        assert_eq!(plan, local);
    }

    #[test]
    fn test_plan_excludes_remote_and_queued_preserving_order() {
        let local = files(&["d.jpg", "a.jpg", "c.jpg", "b.jpg", "e.jpg"]);
        let plan = SyncPlanner::new().plan(&local, &names(&["a.jpg"]), &names(&["b.jpg", "x.jpg"]));
        assert_eq!(plan_names(&plan), vec!["d.jpg", "c.jpg", "e.jpg"]);
    }

    #[test]
    fn test_plan_keeps_duplicate_handles() {
        let mut local = files(&["a.jpg", "b.jpg"]);
        local.push(FileRef::new("a.jpg", "/other/a.jpg", 7));

        let plan = SyncPlanner::new().plan(&local, &HashSet::new(), &names(&["b.jpg"]));
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].path, local[0].path);
        assert_eq!(plan[1].path, local[2].path);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let local = files(&["a.jpg", "b.jpg", "c.jpg"]);
        let remote = names(&["b.jpg"]);
        let planner = SyncPlanner::new();
        assert_eq!(
            planner.plan(&local, &remote, &HashSet::new()),
            planner.plan(&local, &remote, &HashSet::new())
        );
    }

    #[test]
    fn test_plan_everything_present() {
        let local = files(&["a.jpg"]);
        assert!(SyncPlanner::new()
            .plan(&local, &names(&["a.jpg"]), &HashSet::new())
            .is_empty());
    }
}
