//! Note discovery and the publish queue
//!
//! [`ContentTree`] walks the content root for markdown notes; the
//! [`SelectionTracker`] holds which of them are queued. The queue is purely
//! in-memory and is cleared on refresh.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, error};
use walkdir::{DirEntry, WalkDir};

/// A directory or markdown file under the content root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub path: PathBuf,
    pub name: String,
    pub is_dir: bool,
    /// Directories first, then files, case-insensitive by name
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// All markdown files under this node, in tree order
    pub fn files(&self) -> Vec<PathBuf> {
        let mut out = Vec::new();
        self.collect_files(&mut out);
        out
    }

    fn collect_files(&self, out: &mut Vec<PathBuf>) {
        if !self.is_dir {
            out.push(self.path.clone());
            return;
        }
        for child in &self.children {
            child.collect_files(out);
        }
    }

    /// Depth-first search for the node at `path`
    pub fn find(&self, path: &Path) -> Option<&TreeNode> {
        if self.path == path {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(path))
    }
}

/// Markdown notes discovered under a root directory
#[derive(Debug, Clone)]
pub struct ContentTree {
    root: TreeNode,
}

impl ContentTree {
    /// Scan `root`, skipping hidden entries and directories without notes
    pub fn scan(root: &Path) -> Self {
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());
        let children = scan_dir(root);
        debug!("Scanned {} top-level entries under {}", children.len(), root.display());
        Self {
            root: TreeNode {
                path: root.to_path_buf(),
                name,
                is_dir: true,
                children,
            },
        }
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// Every note in the tree, in discovery order
    pub fn files(&self) -> Vec<PathBuf> {
        self.root.files()
    }

    /// Notes transitively under `dir`; a file path yields just that file
    pub fn files_under(&self, dir: &Path) -> Vec<PathBuf> {
        self.root.find(dir).map(TreeNode::files).unwrap_or_default()
    }
}

fn scan_dir(dir: &Path) -> Vec<TreeNode> {
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by(|a, b| {
            let a_dir = a.file_type().is_dir();
            let b_dir = b.file_type().is_dir();
            b_dir.cmp(&a_dir).then_with(|| {
                a.file_name()
                    .to_string_lossy()
                    .to_lowercase()
                    .cmp(&b.file_name().to_string_lossy().to_lowercase())
            })
        });

    let mut nodes = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                error!("Error accessing directory {}: {}", dir.display(), e);
                continue;
            }
        };
        if is_hidden(&entry) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();

        if entry.file_type().is_dir() {
            let children = scan_dir(entry.path());
            if !children.is_empty() {
                nodes.push(TreeNode {
                    path: entry.into_path(),
                    name,
                    is_dir: true,
                    children,
                });
            }
        } else if is_markdown(entry.path()) {
            nodes.push(TreeNode {
                path: entry.into_path(),
                name,
                is_dir: false,
                children: Vec::new(),
            });
        }
    }
    nodes
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            ext == "md" || ext == "markdown"
        })
        .unwrap_or(false)
}

/// The set of queued notes
///
/// Membership is a set; iteration order is the order files were added, so
/// batches publish in a stable, predictable order.
#[derive(Debug, Default, Clone)]
pub struct SelectionTracker {
    order: Vec<PathBuf>,
    members: HashSet<PathBuf>,
    generation: u64,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip one file in or out of the queue; returns true if now queued
    pub fn toggle_file(&mut self, path: &Path) -> bool {
        let queued = if self.members.remove(path) {
            self.order.retain(|p| p != path);
            false
        } else {
            self.members.insert(path.to_path_buf());
            self.order.push(path.to_path_buf());
            true
        };
        self.generation += 1;
        queued
    }

    /// All-or-nothing toggle for every note under a directory.
    ///
    /// If every file is already queued they are all removed; otherwise the
    /// missing ones are added. Returns true if the subtree is now queued.
    pub fn toggle_directory(&mut self, files: &[PathBuf]) -> bool {
        if files.is_empty() {
            return false;
        }

        let all_selected = files.iter().all(|f| self.members.contains(f));
        if all_selected {
            let removing: HashSet<&PathBuf> = files.iter().collect();
            self.order.retain(|p| !removing.contains(p));
            for file in files {
                self.members.remove(file);
            }
        } else {
            for file in files {
                if self.members.insert(file.clone()) {
                    self.order.push(file.clone());
                }
            }
        }
        self.generation += 1;
        !all_selected
    }

    /// Toggle a node of the content tree, file or directory
    pub fn toggle_path(&mut self, tree: &ContentTree, path: &Path) -> bool {
        match tree.root().find(path) {
            Some(node) if node.is_dir => self.toggle_directory(&node.files()),
            _ => self.toggle_file(path),
        }
    }

    pub fn is_selected(&self, path: &Path) -> bool {
        self.members.contains(path)
    }

    /// The queued files in the order they were added
    pub fn snapshot(&self) -> Vec<PathBuf> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Bumped on every mutation; cached probe results compare against it
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Empty the queue (explicit refresh)
    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("posts/2024")).unwrap();
        fs::create_dir_all(root.join("drafts")).unwrap();
        fs::create_dir_all(root.join("images")).unwrap();
        fs::create_dir_all(root.join(".obsidian")).unwrap();
        fs::write(root.join("b.md"), "b").unwrap();
        fs::write(root.join("A.markdown"), "a").unwrap();
        fs::write(root.join("notes.txt"), "skip").unwrap();
        fs::write(root.join("posts/first.md"), "1").unwrap();
        fs::write(root.join("posts/2024/second.md"), "2").unwrap();
        fs::write(root.join("drafts/wip.md"), "w").unwrap();
        fs::write(root.join("images/logo.png"), "png").unwrap();
        fs::write(root.join(".obsidian/hidden.md"), "h").unwrap();
        dir
    }

    #[test]
    fn test_scan_orders_dirs_first_and_skips_noise() {
        let dir = fixture();
        let tree = ContentTree::scan(dir.path());

        let names: Vec<&str> = tree.root().children.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["drafts", "posts", "A.markdown", "b.md"]);

        let files = tree.files();
        assert_eq!(files.len(), 5);
        assert!(files.iter().all(|f| !f.to_string_lossy().contains(".obsidian")));
    }

    #[test]
    fn test_files_under_directory() {
        let dir = fixture();
        let tree = ContentTree::scan(dir.path());

        let files = tree.files_under(&dir.path().join("posts"));
        assert_eq!(
            files,
            vec![
                dir.path().join("posts/2024/second.md"),
                dir.path().join("posts/first.md"),
            ]
        );
        assert!(tree.files_under(&dir.path().join("images")).is_empty());
    }

    #[test]
    fn test_toggle_file_flips_membership() {
        let mut selection = SelectionTracker::new();
        let a = PathBuf::from("a.md");

        assert!(selection.toggle_file(&a));
        assert!(selection.is_selected(&a));
        assert!(!selection.toggle_file(&a));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_directory_toggle_is_all_or_nothing() {
        let mut selection = SelectionTracker::new();
        let files = vec![PathBuf::from("d/1.md"), PathBuf::from("d/2.md"), PathBuf::from("d/3.md")];

        // Partially selected subtree gets completed, not cleared.
        selection.toggle_file(&files[1]);
        assert!(selection.toggle_directory(&files));
        assert_eq!(selection.len(), 3);
        assert_eq!(
            selection.snapshot(),
            vec![files[1].clone(), files[0].clone(), files[2].clone()]
        );

        // Fully selected subtree gets cleared.
        assert!(!selection.toggle_directory(&files));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_directory_toggle_twice_restores_state() {
        let mut selection = SelectionTracker::new();
        let outside = PathBuf::from("other.md");
        let files = vec![PathBuf::from("d/1.md"), PathBuf::from("d/2.md")];
        selection.toggle_file(&outside);
        let before = selection.snapshot();

        selection.toggle_directory(&files);
        selection.toggle_directory(&files);

        assert_eq!(selection.snapshot(), before);
    }

    #[test]
    fn test_toggle_path_resolves_directories() {
        let dir = fixture();
        let tree = ContentTree::scan(dir.path());
        let mut selection = SelectionTracker::new();

        selection.toggle_path(&tree, &dir.path().join("posts"));
        selection.toggle_path(&tree, &dir.path().join("b.md"));

        assert_eq!(selection.len(), 3);
        assert!(selection.is_selected(&dir.path().join("posts/2024/second.md")));
    }

    #[test]
    fn test_generation_tracks_mutations() {
        let mut selection = SelectionTracker::new();
        let start = selection.generation();
        selection.toggle_file(Path::new("a.md"));
        selection.clear();
        assert_eq!(selection.generation(), start + 2);
        assert!(selection.is_empty());
    }
}
