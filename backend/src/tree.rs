//! Depth-first queries and in-place mutations over the folder tree.
//!
//! Everything here is pure: no I/O, no locking. [`crate::store::TreeStore`]
//! wraps these with persistence.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    humanize::{format_size, simulated_size},
    models::{
        dashboard::{DashboardStats, KindCounts},
        files::FileListing,
        folders::{FolderContents, FolderListing, FolderRef, FolderStats, FolderSummary},
        nodes::{FileKind, FileNode, FolderNode, Node, ROOT_ID},
    },
};

const RECENT_FILES: usize = 3;

impl FolderNode {
    pub fn root() -> Self {
        Self {
            id: ROOT_ID.into(),
            name: ROOT_ID.into(),
            children: Vec::new(),
        }
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            children: Vec::new(),
        }
    }

    pub fn folder_ref(&self) -> FolderRef {
        FolderRef {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }

    pub fn find_folder(&self, id: &str) -> Option<&FolderNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| match child {
            Node::Folder(folder) => folder.find_folder(id),
            Node::File(_) => None,
        })
    }

    pub fn find_folder_mut(&mut self, id: &str) -> Option<&mut FolderNode> {
        if self.id == id {
            return Some(self);
        }
        for child in &mut self.children {
            if let Node::Folder(folder) = child
                && let Some(found) = folder.find_folder_mut(id)
            {
                return Some(found);
            }
        }
        None
    }

    pub fn find_file(&self, id: &str) -> Option<FileNode> {
        for child in &self.children {
            match child {
                Node::File(file) if file.id == id => {
                    let mut found = file.clone();
                    found.parent_id = Some(self.id.clone());
                    return Some(found);
                }
                Node::File(_) => {}
                Node::Folder(folder) => {
                    if let Some(found) = folder.find_file(id) {
                        return Some(found);
                    }
                }
            }
        }
        None
    }

    fn find_file_mut(&mut self, id: &str) -> Option<&mut FileNode> {
        for child in &mut self.children {
            match child {
                Node::File(file) if file.id == id => return Some(file),
                Node::File(_) => {}
                Node::Folder(folder) => {
                    if let Some(found) = folder.find_file_mut(id) {
                        return Some(found);
                    }
                }
            }
        }
        None
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.id == id
            || self.children.iter().any(|child| match child {
                Node::Folder(folder) => folder.contains_id(id),
                Node::File(file) => file.id == id,
            })
    }

    pub fn all_files(&self) -> Vec<FileListing> {
        let mut files = Vec::new();
        self.collect_files(&mut files);
        files
    }

    fn collect_files(&self, out: &mut Vec<FileListing>) {
        for child in &self.children {
            match child {
                Node::File(file) => out.push(self.listing(file)),
                Node::Folder(folder) => folder.collect_files(out),
            }
        }
    }

    fn listing(&self, file: &FileNode) -> FileListing {
        let mut file = file.clone();
        file.parent_id = Some(self.id.clone());
        let size = format_size(simulated_size(&file.name));
        FileListing {
            file,
            folder: self.folder_ref(),
            size,
        }
    }

    pub fn all_folders(&self) -> Vec<FolderListing> {
        let mut folders = Vec::new();
        self.collect_folders(None, &mut folders);
        folders
    }

    fn collect_folders(&self, prefix: Option<&str>, out: &mut Vec<FolderListing>) {
        for child in &self.children {
            if let Node::Folder(folder) = child {
                let display_name = match prefix {
                    Some(prefix) => format!("{prefix}/{}", folder.name),
                    None => folder.name.clone(),
                };
                out.push(FolderListing {
                    id: folder.id.clone(),
                    name: folder.name.clone(),
                    display_name: display_name.clone(),
                    parent_id: self.id.clone(),
                });
                folder.collect_folders(Some(&display_name), out);
            }
        }
    }

    pub fn stats(&self) -> FolderStats {
        let (file_count, total_bytes) = self.tally();
        FolderStats {
            file_count,
            total_bytes,
            size: format_size(total_bytes),
        }
    }

    fn tally(&self) -> (usize, u64) {
        self.children
            .iter()
            .fold((0, 0), |(count, bytes), child| match child {
                Node::File(file) => (count + 1, bytes + simulated_size(&file.name)),
                Node::Folder(folder) => {
                    let (nested_count, nested_bytes) = folder.tally();
                    (count + nested_count, bytes + nested_bytes)
                }
            })
    }

    pub fn path_to(&self, id: &str) -> Vec<FolderRef> {
        let mut path = Vec::new();
        if self.walk_path(id, &mut path) {
            path
        } else {
            Vec::new()
        }
    }

    fn walk_path(&self, id: &str, path: &mut Vec<FolderRef>) -> bool {
        path.push(self.folder_ref());
        if self.id == id {
            return true;
        }
        for child in &self.children {
            if let Node::Folder(folder) = child
                && folder.walk_path(id, path)
            {
                return true;
            }
        }
        path.pop();
        false
    }

    pub fn contents(&self) -> FolderContents {
        let mut folders = Vec::new();
        let mut files = Vec::new();
        for child in &self.children {
            match child {
                Node::Folder(folder) => {
                    let stats = folder.stats();
                    folders.push(FolderSummary {
                        id: folder.id.clone(),
                        name: folder.name.clone(),
                        file_count: stats.file_count,
                        size: stats.size,
                    });
                }
                Node::File(file) => files.push(self.listing(file)),
            }
        }
        FolderContents {
            folder: self.folder_ref(),
            folders,
            files,
        }
    }

    pub fn files_of_kind(&self, kind: FileKind) -> Vec<FileListing> {
        self.all_files()
            .into_iter()
            .filter(|listing| listing.file.kind == kind)
            .collect()
    }

    pub fn dashboard(&self) -> DashboardStats {
        let mut files = self.all_files();
        let mut kinds = KindCounts::default();
        let mut total_bytes = 0;
        for listing in &files {
            total_bytes += simulated_size(&listing.file.name);
            match listing.file.kind {
                FileKind::Image => kinds.images += 1,
                FileKind::Video => kinds.videos += 1,
                FileKind::Audio => kinds.audios += 1,
                FileKind::Document => kinds.documents += 1,
                FileKind::Unknown => kinds.others += 1,
            }
        }
        let total_files = files.len();

        files.sort_by(|a, b| b.file.last_updated.cmp(&a.file.last_updated));
        files.truncate(RECENT_FILES);

        DashboardStats {
            total_files,
            total_size: format_size(total_bytes),
            kinds,
            recent_files: files,
        }
    }

    pub fn insert_child(&mut self, parent_id: &str, node: Node) -> Result<(), Node> {
        match self.find_folder_mut(parent_id) {
            Some(parent) => {
                parent.children.push(node);
                Ok(())
            }
            None => Err(node),
        }
    }

    pub fn rename_folder(&mut self, id: &str, name: &str) -> bool {
        match self.find_folder_mut(id) {
            Some(folder) => {
                folder.name = name.to_string();
                true
            }
            None => false,
        }
    }

    pub fn rename_file(&mut self, id: &str, name: &str, now: DateTime<Utc>) -> bool {
        match self.find_file_mut(id) {
            Some(file) => {
                file.name = name.to_string();
                file.last_updated = now;
                true
            }
            None => false,
        }
    }

    pub fn remove_folder(&mut self, id: &str) -> Option<FolderNode> {
        match self.detach(&|node| matches!(node, Node::Folder(folder) if folder.id == id)) {
            Some(Node::Folder(folder)) => Some(folder),
            _ => None,
        }
    }

    pub fn remove_file(&mut self, id: &str) -> Option<FileNode> {
        match self.detach(&|node| matches!(node, Node::File(file) if file.id == id)) {
            Some(Node::File(file)) => Some(file),
            _ => None,
        }
    }

    fn detach(&mut self, matches: &dyn Fn(&Node) -> bool) -> Option<Node> {
        if let Some(pos) = self.children.iter().position(matches) {
            return Some(self.children.remove(pos));
        }
        self.children.iter_mut().find_map(|child| match child {
            Node::Folder(folder) => folder.detach(matches),
            Node::File(_) => None,
        })
    }

    pub fn first_duplicate_id(&self) -> Option<String> {
        let mut seen = HashSet::from([self.id.as_str()]);
        self.find_duplicate(&mut seen).map(str::to_string)
    }

    fn find_duplicate<'a>(&'a self, seen: &mut HashSet<&'a str>) -> Option<&'a str> {
        for child in &self.children {
            let (id, folder) = match child {
                Node::Folder(folder) => (folder.id.as_str(), Some(folder)),
                Node::File(file) => (file.id.as_str(), None),
            };
            if !seen.insert(id) {
                return Some(id);
            }
            if let Some(found) = folder.and_then(|folder| folder.find_duplicate(seen)) {
                return Some(found);
            }
        }
        None
    }

    pub fn relink_parents(&mut self) -> usize {
        let id = self.id.clone();
        self.children
            .iter_mut()
            .map(|child| match child {
                Node::File(file) if file.parent_id.as_deref() != Some(id.as_str()) => {
                    file.parent_id = Some(id.clone());
                    1
                }
                Node::File(_) => 0,
                Node::Folder(folder) => folder.relink_parents(),
            })
            .sum()
    }
}
