//! Task tree structure: attachment, removal, lookup and traversal.
//!
//! Path names are recomputed whenever a node is attached, so they always
//! reflect the current attachment point. Iterators borrow the tree
//! immutably; the borrow checker rules out structural mutation while a
//! traversal is alive.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;

use crate::error::{Result, SpecError};
use crate::task::TaskNode;

impl TaskNode {
    /// Create a child task named `name` and return it.
    pub fn add_task(&mut self, name: impl Into<String>) -> Result<&mut TaskNode> {
        self.attach(TaskNode::new(name))
    }

    /// Attach an existing subtree as a child, re-basing every path name in it.
    pub fn attach(&mut self, mut node: TaskNode) -> Result<&mut TaskNode> {
        if self.child(&node.name).is_some() {
            return Err(SpecError::DuplicateName {
                parent: self.path_name.clone(),
                name: node.name,
            });
        }
        node.rebase(&self.path_name);
        tracing::debug!(task = %node.path_name, "attached task");
        self.children.push(node);
        let last = self.children.len() - 1;
        Ok(&mut self.children[last])
    }

    /// Detach and drop the subtree rooted at the named child.
    pub fn delete_child(&mut self, name: &str) -> Result<()> {
        let pos = self
            .children
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| SpecError::NotFound(format!("{}/{}", self.path_name, name)))?;
        let removed = self.children.remove(pos);
        tracing::debug!(task = %removed.path_name, "deleted task subtree");
        Ok(())
    }

    pub(crate) fn rebase(&mut self, parent_path: &str) {
        self.path_name = format!("{}/{}", parent_path, self.name);
        let path = self.path_name.clone();
        for child in &mut self.children {
            child.rebase(&path);
        }
    }

    /// Child by name.
    pub fn child(&self, name: &str) -> Option<&TaskNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Child by name, mutably.
    pub fn child_mut(&mut self, name: &str) -> Option<&mut TaskNode> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// First-generation children.
    pub fn children(&self) -> &[TaskNode] {
        &self.children
    }

    /// Iterate over the first-generation children.
    pub fn child_task_iter(&self) -> std::slice::Iter<'_, TaskNode> {
        self.children.iter()
    }

    /// Depth-first pre-order traversal: this task, then every descendant.
    ///
    /// Each call starts a fresh traversal.
    pub fn task_iter(&self) -> TaskIter<'_> {
        TaskIter { stack: vec![self] }
    }

    /// Path names of this task and its descendants, pre-order.
    pub fn list_path_names(&self) -> Vec<&str> {
        self.task_iter().map(TaskNode::path_name).collect()
    }

    /// Names of this task and its descendants, pre-order.
    pub fn list_names(&self) -> Vec<&str> {
        self.task_iter().map(TaskNode::name).collect()
    }

    /// Apply `f` to this task and every descendant, pre-order.
    pub fn visit_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut TaskNode),
    {
        f(self);
        for child in &mut self.children {
            child.visit_mut(f);
        }
    }

    fn check_sibling_names(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for child in &self.children {
            if !seen.insert(child.name.as_str()) {
                return Err(SpecError::DuplicateName {
                    parent: self.path_name.clone(),
                    name: child.name.clone(),
                });
            }
            child.check_sibling_names()?;
        }
        Ok(())
    }
}

/// Pre-order iterator over a task and its descendants.
pub struct TaskIter<'a> {
    stack: Vec<&'a TaskNode>,
}

impl<'a> Iterator for TaskIter<'a> {
    type Item = &'a TaskNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// A tree of tasks rooted at one top-level task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskTree {
    root: TaskNode,
}

impl TaskTree {
    /// Create a tree with an empty root task.
    pub fn new(root_name: impl Into<String>) -> Self {
        Self::from_root(TaskNode::new(root_name))
    }

    /// Wrap an existing task as the root, re-basing its path names.
    pub fn from_root(mut root: TaskNode) -> Self {
        root.rebase("");
        Self { root }
    }

    /// Wrap a task read from storage as the root; sibling names must be unique
    /// at every level.
    pub fn from_checked_root(root: TaskNode) -> Result<Self> {
        root.check_sibling_names()?;
        Ok(Self::from_root(root))
    }

    /// Name of the root task, which also names the workload.
    pub fn name(&self) -> &str {
        self.root.name()
    }

    /// Root task.
    pub fn root(&self) -> &TaskNode {
        &self.root
    }

    /// Root task, mutably.
    pub fn root_mut(&mut self) -> &mut TaskNode {
        &mut self.root
    }

    /// Find a task by path name.
    pub fn find(&self, path: &str) -> Option<&TaskNode> {
        let mut segments = split_path(path);
        if segments.next()? != self.root.name {
            return None;
        }
        segments.try_fold(&self.root, |node, name| node.child(name))
    }

    /// Find a task by path name, mutably.
    pub fn find_mut(&mut self, path: &str) -> Option<&mut TaskNode> {
        let mut segments = split_path(path);
        if segments.next()? != self.root.name {
            return None;
        }
        segments.try_fold(&mut self.root, |node, name| node.child_mut(name))
    }

    /// Add a child below the task at `parent_path`.
    pub fn add_task(&mut self, parent_path: &str, name: impl Into<String>) -> Result<&mut TaskNode> {
        self.find_mut(parent_path)
            .ok_or_else(|| SpecError::NotFound(parent_path.to_string()))?
            .add_task(name)
    }

    /// Remove the named child of the task at `parent_path`.
    pub fn delete_child(&mut self, parent_path: &str, name: &str) -> Result<()> {
        self.find_mut(parent_path)
            .ok_or_else(|| SpecError::NotFound(parent_path.to_string()))?
            .delete_child(name)
    }

    /// Pre-order traversal of every task, root first.
    pub fn iter(&self) -> TaskIter<'_> {
        self.root.task_iter()
    }

    /// Path names of every task, pre-order.
    pub fn list_path_names(&self) -> Vec<&str> {
        self.root.list_path_names()
    }

    /// Names of every task, pre-order.
    pub fn list_names(&self) -> Vec<&str> {
        self.root.list_names()
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

impl Serialize for TaskTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.root.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TaskTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let root = TaskNode::deserialize(deserializer)?;
        Self::from_checked_root(root).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskType;

    fn sample_tree() -> TaskTree {
        let mut tree = TaskTree::new("ReReco");
        let root = tree.root_mut();
        root.set_task_type(TaskType::Processing);
        let merge = root.add_task("MergeAOD").unwrap();
        merge.set_task_type(TaskType::Merge);
        merge.add_task("HarvestDQM").unwrap();
        root.add_task("LogCollect").unwrap();
        tree
    }

    #[test]
    fn test_path_names() {
        let tree = sample_tree();
        assert_eq!(
            tree.list_path_names(),
            vec![
                "/ReReco",
                "/ReReco/MergeAOD",
                "/ReReco/MergeAOD/HarvestDQM",
                "/ReReco/LogCollect",
            ]
        );
        assert_eq!(tree.list_names(), vec!["ReReco", "MergeAOD", "HarvestDQM", "LogCollect"]);
    }

    #[test]
    fn test_path_names_stable_after_more_additions() {
        let mut tree = sample_tree();
        tree.add_task("/ReReco/LogCollect", "Cleanup").unwrap();
        tree.add_task("/ReReco", "Skim").unwrap();

        for node in tree.iter() {
            for child in node.children() {
                assert_eq!(child.path_name(), format!("{}/{}", node.path_name(), child.name()));
            }
        }
    }

    #[test]
    fn test_duplicate_sibling() {
        let mut tree = sample_tree();
        let err = tree.add_task("/ReReco", "MergeAOD").unwrap_err();
        assert_eq!(
            err,
            SpecError::DuplicateName {
                parent: "/ReReco".to_string(),
                name: "MergeAOD".to_string()
            }
        );
        // Same name under a different parent is fine
        assert!(tree.add_task("/ReReco/LogCollect", "MergeAOD").is_ok());
    }

    #[test]
    fn test_delete_removes_subtree() {
        let mut tree = sample_tree();
        tree.delete_child("/ReReco", "MergeAOD").unwrap();

        assert!(tree.iter().all(|t| !t.path_name().starts_with("/ReReco/MergeAOD")));
        assert!(tree.find("/ReReco/MergeAOD/HarvestDQM").is_none());
        assert_eq!(tree.list_path_names(), vec!["/ReReco", "/ReReco/LogCollect"]);
    }

    #[test]
    fn test_delete_missing_child() {
        let mut tree = sample_tree();
        assert!(matches!(
            tree.delete_child("/ReReco", "Nope"),
            Err(SpecError::NotFound(_))
        ));
        assert!(matches!(
            tree.add_task("/Other", "X"),
            Err(SpecError::NotFound(_))
        ));
    }

    #[test]
    fn test_attach_rebases_subtree() {
        let mut detached = TaskNode::new("Skim");
        detached.add_task("SkimMerge").unwrap();
        assert_eq!(detached.children()[0].path_name(), "/Skim/SkimMerge");

        let mut tree = sample_tree();
        tree.find_mut("/ReReco/MergeAOD").unwrap().attach(detached).unwrap();

        assert!(tree.find("/ReReco/MergeAOD/Skim/SkimMerge").is_some());
        assert_eq!(
            tree.find("/ReReco/MergeAOD/Skim/SkimMerge").unwrap().path_name(),
            "/ReReco/MergeAOD/Skim/SkimMerge"
        );
    }

    #[test]
    fn test_iterators_restart_and_children_only() {
        let tree = sample_tree();
        assert_eq!(tree.iter().count(), 4);
        assert_eq!(tree.iter().count(), 4);

        let children: Vec<_> = tree.root().child_task_iter().map(TaskNode::name).collect();
        assert_eq!(children, vec!["MergeAOD", "LogCollect"]);
    }

    #[test]
    fn test_json_round_trip() {
        let mut tree = sample_tree();
        tree.root_mut().add_notification("ops@example.org");
        tree.root_mut().set_site_whitelist(["T1_US_FNAL", "T2_CH_CERN"]);

        let json = serde_json::to_string(&tree).unwrap();
        let back: TaskTree = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tree);
    }

    #[test]
    fn test_deserialize_rejects_duplicate_siblings() {
        let mut tree = sample_tree();
        tree.root_mut().children.push(TaskNode::new("LogCollect"));

        let json = serde_json::to_string(&tree).unwrap();
        assert!(serde_json::from_str::<TaskTree>(&json).is_err());

        let root: TaskNode = serde_json::from_str(&json).unwrap();
        assert_eq!(
            TaskTree::from_checked_root(root).unwrap_err(),
            SpecError::DuplicateName {
                parent: "/ReReco".to_string(),
                name: "LogCollect".to_string()
            }
        );
    }
}
