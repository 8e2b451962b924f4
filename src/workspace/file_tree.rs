// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Directory snapshots for the editor's file browser.
//!
//! Trees are rebuilt on every request; nothing is cached or watched. A
//! directory whose `children` is `None` was not expanded (shallow listing,
//! depth limit, or a symlink back to one of its own ancestors), while `Some(vec![])`
//! is an expanded empty directory.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::error::WorkspaceError;
use super::path_security::PathSandbox;

/// Default bound on recursive expansion.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Kind of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    /// Anything that is not a directory.
    File,
    /// A directory.
    Directory,
}

/// One filesystem entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTreeNode {
    /// Final path component.
    pub name: String,
    /// Absolute, normalized path.
    pub path: String,
    /// File or directory.
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Sorted children of an expanded directory. Always `None` for files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Self>>,
}

/// Which entries a shallow listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    /// Only subdirectories.
    DirectoriesOnly,
    /// Files and subdirectories.
    All,
}

/// A directory entry that passed the sandbox checks.
struct Entry {
    name: String,
    path: PathBuf,
    canonical: PathBuf,
    node_type: NodeType,
}

impl Entry {
    fn leaf(&self) -> FileTreeNode {
        FileTreeNode {
            name: self.name.clone(),
            path: self.path.to_string_lossy().into_owned(),
            node_type: self.node_type,
            children: None,
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.to_string_lossy().into_owned(),
        |name| name.to_string_lossy().into_owned(),
    )
}

/// Builds [`FileTreeNode`] snapshots below a sandbox root.
#[derive(Debug, Clone)]
pub struct FileTreeBuilder {
    sandbox: PathSandbox,
    max_depth: usize,
}

impl FileTreeBuilder {
    /// Creates a builder with the default depth bound.
    #[must_use]
    pub const fn new(sandbox: PathSandbox) -> Self {
        Self {
            sandbox,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Overrides how many directory levels `build_recursive` expands.
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// The sandbox this builder reads through.
    #[must_use]
    pub const fn sandbox(&self) -> &PathSandbox {
        &self.sandbox
    }

    /// Lists the direct entries of a directory, sorted by name. Directories
    /// in the result are not expanded.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::SecurityViolation`] for paths outside the
    /// root, [`WorkspaceError::NotFound`] if the path does not exist and
    /// [`WorkspaceError::NotADirectory`] if it is a file.
    pub fn list_immediate_children(
        &self,
        path: impl AsRef<Path>,
        mode: ListMode,
    ) -> Result<Vec<FileTreeNode>, WorkspaceError> {
        let root = self.open_directory(path.as_ref())?;
        let nodes = self
            .read_children(&root.path)?
            .iter()
            .filter(|entry| mode == ListMode::All || entry.node_type == NodeType::Directory)
            .map(Entry::leaf)
            .collect();
        Ok(nodes)
    }

    /// Builds the full subtree of a directory, depth first.
    ///
    /// Expansion stops at the depth bound, and a directory whose real
    /// location is one of its own ancestors is not expanded, so symlink
    /// loops terminate. Entries that disappear while walking are skipped.
    ///
    /// # Errors
    ///
    /// Same as [`Self::list_immediate_children`], plus
    /// [`WorkspaceError::Io`] for unreadable directories.
    pub fn build_recursive(&self, path: impl AsRef<Path>) -> Result<FileTreeNode, WorkspaceError> {
        let root = self.open_directory(path.as_ref())?;
        let mut ancestors = HashSet::new();
        let node = self.expand(&root, 0, &mut ancestors)?;
        debug!("Built tree for {}", root.path.display());
        Ok(node)
    }

    /// Returns the directory at `path` either fully expanded or with one
    /// level of children.
    ///
    /// # Errors
    ///
    /// Same as [`Self::build_recursive`].
    pub fn list_tree(
        &self,
        path: impl AsRef<Path>,
        recursive: bool,
    ) -> Result<FileTreeNode, WorkspaceError> {
        let path = path.as_ref();
        if recursive {
            return self.build_recursive(path);
        }
        let root = self.open_directory(path)?;
        let children = self
            .read_children(&root.path)?
            .iter()
            .map(Entry::leaf)
            .collect();
        Ok(FileTreeNode {
            children: Some(children),
            ..root.leaf()
        })
    }

    fn open_directory(&self, requested: &Path) -> Result<Entry, WorkspaceError> {
        let path = self.sandbox.resolve(requested)?;
        let canonical = self.sandbox.resolve_existing(requested)?;
        let metadata =
            fs::metadata(&canonical).map_err(|e| WorkspaceError::io("inspect", &path, e))?;
        if !metadata.is_dir() {
            return Err(WorkspaceError::NotADirectory { path });
        }
        Ok(Entry {
            name: display_name(&path),
            path,
            canonical,
            node_type: NodeType::Directory,
        })
    }

    fn expand(
        &self,
        directory: &Entry,
        depth: usize,
        ancestors: &mut HashSet<PathBuf>,
    ) -> Result<FileTreeNode, WorkspaceError> {
        let mut node = directory.leaf();
        if depth >= self.max_depth {
            trace!("Depth bound reached at {}", directory.path.display());
            return Ok(node);
        }
        if !ancestors.insert(directory.canonical.clone()) {
            debug!("Not expanding {} inside itself", directory.path.display());
            return Ok(node);
        }
        let children = self.expand_children(directory, depth, ancestors);
        ancestors.remove(&directory.canonical);
        node.children = Some(children?);
        Ok(node)
    }

    fn expand_children(
        &self,
        directory: &Entry,
        depth: usize,
        ancestors: &mut HashSet<PathBuf>,
    ) -> Result<Vec<FileTreeNode>, WorkspaceError> {
        let entries = match self.read_children(&directory.path) {
            Ok(entries) => entries,
            // Vanished between listing the parent and reading it.
            Err(WorkspaceError::NotFound { .. }) if depth > 0 => Vec::new(),
            Err(e) => return Err(e),
        };

        let mut children = Vec::with_capacity(entries.len());
        for entry in &entries {
            let child = match entry.node_type {
                NodeType::File => entry.leaf(),
                NodeType::Directory => self.expand(entry, depth + 1, ancestors)?,
            };
            children.push(child);
        }
        Ok(children)
    }

    fn read_children(&self, directory: &Path) -> Result<Vec<Entry>, WorkspaceError> {
        let reader =
            fs::read_dir(directory).map_err(|e| WorkspaceError::io("list", directory, e))?;

        let mut entries = Vec::new();
        for entry in reader {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(WorkspaceError::io("list", directory, e)),
            };
            if let Some(classified) = self.classify(entry.path())? {
                entries.push(classified);
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Returns `None` for entries that vanished, dangle, or point outside the
    /// sandbox.
    fn classify(&self, path: PathBuf) -> Result<Option<Entry>, WorkspaceError> {
        let canonical = match path.canonicalize() {
            Ok(canonical) => canonical,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                trace!("Skipping vanished or dangling entry {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(WorkspaceError::io("resolve", &path, e)),
        };
        if !self.sandbox.contains_canonical(&canonical)? {
            debug!("Skipping symlink leaving the root: {}", path.display());
            return Ok(None);
        }

        let metadata = match fs::metadata(&canonical) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(WorkspaceError::io("inspect", &path, e)),
        };
        let node_type = if metadata.is_dir() {
            NodeType::Directory
        } else {
            NodeType::File
        };

        Ok(Some(Entry {
            name: display_name(&path),
            path,
            canonical,
            node_type,
        }))
    }
}

/// Lists `relative_path` below `root`, shallow or fully expanded.
///
/// # Errors
///
/// See [`FileTreeBuilder::list_tree`].
pub fn list_tree(
    root: &Path,
    relative_path: &Path,
    recursive: bool,
) -> Result<FileTreeNode, WorkspaceError> {
    FileTreeBuilder::new(PathSandbox::new(root)?).list_tree(relative_path, recursive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use tempfile::TempDir;

    fn setup_project() -> Result<(TempDir, FileTreeBuilder)> {
        let dir = TempDir::new()?;
        let root = dir.path().canonicalize()?;
        fs::create_dir_all(root.join("configs/nested"))?;
        fs::create_dir_all(root.join("empty"))?;
        fs::write(root.join("b.xml"), "<Configuration/>")?;
        fs::write(root.join("a.txt"), "notes")?;
        fs::write(root.join("configs/main.xml"), "<Configuration/>")?;
        fs::write(root.join("configs/nested/deep.xml"), "<Configuration/>")?;
        Ok((dir, FileTreeBuilder::new(PathSandbox::new(root)?)))
    }

    fn names(nodes: &[FileTreeNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.name.as_str()).collect()
    }

    fn child<'a>(node: &'a FileTreeNode, name: &str) -> Result<&'a FileTreeNode> {
        node.children
            .as_deref()
            .unwrap_or_default()
            .iter()
            .find(|n| n.name == name)
            .ok_or_else(|| anyhow!("no child named {name}"))
    }

    #[test]
    fn test_immediate_children_sorted() -> Result<()> {
        let (_dir, builder) = setup_project()?;
        let nodes = builder.list_immediate_children("", ListMode::All)?;
        assert_eq!(names(&nodes), ["a.txt", "b.xml", "configs", "empty"]);
        assert!(nodes.iter().all(|n| n.children.is_none()));
        Ok(())
    }

    #[test]
    fn test_directories_only_mode() -> Result<()> {
        let (_dir, builder) = setup_project()?;
        let nodes = builder.list_immediate_children(".", ListMode::DirectoriesOnly)?;
        assert_eq!(names(&nodes), ["configs", "empty"]);
        Ok(())
    }

    #[test]
    fn test_recursive_tree_shape() -> Result<()> {
        let (_dir, builder) = setup_project()?;
        let tree = builder.build_recursive("")?;
        assert_eq!(tree.node_type, NodeType::Directory);

        let configs = child(&tree, "configs")?;
        let nested = child(configs, "nested")?;
        let deep = child(nested, "deep.xml")?;
        assert_eq!(deep.node_type, NodeType::File);
        assert!(deep.children.is_none());
        assert!(deep.path.ends_with("configs/nested/deep.xml"));

        assert_eq!(child(&tree, "empty")?.children, Some(Vec::new()));
        Ok(())
    }

    #[test]
    fn test_shallow_list_tree_has_one_level() -> Result<()> {
        let (_dir, builder) = setup_project()?;
        let tree = builder.list_tree("configs", false)?;
        assert_eq!(tree.name, "configs");
        assert_eq!(child(&tree, "nested")?.children, None);
        Ok(())
    }

    #[test]
    fn test_file_is_not_a_directory() -> Result<()> {
        let (_dir, builder) = setup_project()?;
        let result = builder.list_tree("b.xml", true);
        assert!(matches!(result, Err(WorkspaceError::NotADirectory { .. })));
        Ok(())
    }

    #[test]
    fn test_missing_directory_is_not_found() -> Result<()> {
        let (_dir, builder) = setup_project()?;
        let result = builder.list_immediate_children("nope", ListMode::All);
        assert!(matches!(result, Err(WorkspaceError::NotFound { .. })));
        Ok(())
    }

    #[test]
    fn test_escape_is_security_violation() -> Result<()> {
        let (_dir, builder) = setup_project()?;
        let result = builder.list_tree("../", false);
        assert!(matches!(
            result,
            Err(WorkspaceError::SecurityViolation { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_depth_bound_leaves_directories_unexpanded() -> Result<()> {
        let (_dir, builder) = setup_project()?;
        let builder = builder.with_max_depth(1);
        let tree = builder.build_recursive("")?;
        let configs = child(&tree, "configs")?;
        assert_eq!(configs.children, None);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_terminates() -> Result<()> {
        use std::os::unix::fs as unix_fs;

        let (_dir, builder) = setup_project()?;
        let root = builder.sandbox().root().to_path_buf();
        unix_fs::symlink(&root, root.join("configs/loop"))?;

        let tree = builder.build_recursive("")?;
        let looped = child(child(&tree, "configs")?, "loop")?;
        assert_eq!(looped.node_type, NodeType::Directory);
        assert_eq!(looped.children, None);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_real_directory_expands_after_link_to_it() -> Result<()> {
        use std::os::unix::fs as unix_fs;

        let dir = TempDir::new()?;
        let root = dir.path().canonicalize()?;
        fs::create_dir_all(root.join("z_real"))?;
        fs::write(root.join("z_real/file.xml"), "<Configuration/>")?;
        unix_fs::symlink(root.join("z_real"), root.join("a_link"))?;
        let builder = FileTreeBuilder::new(PathSandbox::new(&root)?);

        let tree = builder.build_recursive("")?;
        for name in ["a_link", "z_real"] {
            let node = child(&tree, name)?;
            let children = node.children.as_deref().map(names);
            assert_eq!(children, Some(vec!["file.xml"]), "{name}");
        }
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_leaving_root_are_hidden() -> Result<()> {
        use std::os::unix::fs as unix_fs;

        let (_dir, builder) = setup_project()?;
        let outside = TempDir::new()?;
        let root = builder.sandbox().root().to_path_buf();
        unix_fs::symlink(outside.path(), root.join("outside"))?;
        unix_fs::symlink(root.join("gone.xml"), root.join("dangling"))?;

        let nodes = builder.list_immediate_children("", ListMode::All)?;
        assert!(!names(&nodes).contains(&"outside"));
        assert!(!names(&nodes).contains(&"dangling"));
        Ok(())
    }

    #[test]
    fn test_serialized_shape() -> Result<()> {
        let node = FileTreeNode {
            name: "a.xml".into(),
            path: "/p/a.xml".into(),
            node_type: NodeType::File,
            children: None,
        };
        let json = serde_json::to_value(&node)?;
        assert_eq!(
            json,
            serde_json::json!({"name": "a.xml", "path": "/p/a.xml", "type": "FILE"})
        );

        let dir = FileTreeNode {
            node_type: NodeType::Directory,
            children: Some(Vec::new()),
            ..node
        };
        assert_eq!(serde_json::to_value(&dir)?["children"], serde_json::json!([]));
        assert_eq!(serde_json::to_value(&dir)?["type"], "DIRECTORY");
        Ok(())
    }

    #[test]
    fn test_list_tree_function() -> Result<()> {
        let (dir, _builder) = setup_project()?;
        let tree = list_tree(dir.path(), Path::new("configs"), true)?;
        assert_eq!(names(tree.children.as_deref().unwrap_or_default()), ["main.xml", "nested"]);
        Ok(())
    }
}
