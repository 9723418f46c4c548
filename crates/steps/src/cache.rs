//! Bookmark cache for step lookups
//!
//! Stores one bookmark per visited paragraph recording the number of steps
//! from the root to the first step inside that paragraph, plus a bucketed
//! `step -> bookmark` index so a lookup never walks more than roughly one
//! bucket of positions.
//!
//! The cache tracks damage instead of discarding entries: structural edits
//! lower a watermark (`last_undamaged_step`) and every bookmark past it is
//! ignored until a later walk re-visits the region and repairs it. Repair
//! also evicts bookmarks whose paragraph has left the tree.

use std::collections::HashMap;

use tracing::debug;

use dom::{NodeId, PositionIterator, Tree};

type BookmarkId = usize;

/// Slab slot of the document-start base point
const BASE: BookmarkId = 0;

#[derive(Debug)]
struct Bookmark {
    steps: usize,
    node: NodeId,
    previous: Option<BookmarkId>,
    next: Option<BookmarkId>,
}

/// Where a cached point anchors in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAnchor {
    /// First walkable position in the document
    DocumentStart,
    /// First walkable position inside the paragraph
    BeforeParagraph(NodeId),
}

/// A resolved cache lookup: the anchor plus the steps it represents
#[derive(Debug, Clone, Copy)]
pub struct CachePoint {
    pub steps: usize,
    pub anchor: CacheAnchor,
}

pub struct StepsCache {
    root: NodeId,
    bucket_size: usize,
    /// Slot 0 is the base point; evicted slots are never reused
    bookmarks: Vec<Bookmark>,
    /// Bucketed index: ceil-bucket of a bookmark's steps -> bookmark
    step_to_dom_point: HashMap<usize, BookmarkId>,
    node_to_bookmark: HashMap<NodeId, BookmarkId>,
    /// Steps at or before this are trustworthy; `None` means no damage
    last_undamaged_step: Option<usize>,
}

impl StepsCache {
    pub fn new(root: NodeId, bucket_size: usize) -> Self {
        assert!(bucket_size > 0, "bucket size must be positive");
        Self {
            root,
            bucket_size,
            bookmarks: vec![Bookmark {
                steps: 0,
                node: root,
                previous: None,
                next: None,
            }],
            step_to_dom_point: HashMap::new(),
            node_to_bookmark: HashMap::new(),
            last_undamaged_step: None,
        }
    }

    /// Closest quantized step at or before `steps`
    fn bucket(&self, steps: usize) -> usize {
        steps / self.bucket_size * self.bucket_size
    }

    /// Closest quantized step at or after `steps`
    fn destination_bucket(&self, steps: usize) -> usize {
        self.bucket(steps + self.bucket_size - 1)
    }

    fn point(&self, id: BookmarkId) -> CachePoint {
        let bookmark = &self.bookmarks[id];
        CachePoint {
            steps: bookmark.steps,
            anchor: if id == BASE {
                CacheAnchor::DocumentStart
            } else {
                CacheAnchor::BeforeParagraph(bookmark.node)
            },
        }
    }

    /// Closest bookmark at or before `steps`
    fn closest_bookmark(&self, steps: usize) -> BookmarkId {
        let mut bucket = self.bucket(steps);
        let mut found = None;
        while found.is_none() && bucket != 0 {
            found = self.step_to_dom_point.get(&bucket).copied();
            bucket -= self.bucket_size;
        }
        let mut current = found.unwrap_or(BASE);
        while let Some(next) = self.bookmarks[current].next {
            if self.bookmarks[next].steps > steps {
                break;
            }
            current = next;
        }
        current
    }

    /// Walk back over the chain until a bookmark below the damage watermark
    fn undamaged(&self, id: BookmarkId) -> BookmarkId {
        match self.last_undamaged_step {
            Some(limit) => {
                let mut current = Some(id);
                while let Some(b) = current {
                    if self.bookmarks[b].steps <= limit {
                        return b;
                    }
                    current = self.bookmarks[b].previous;
                }
                BASE
            }
            None => id,
        }
    }

    fn unlink(&mut self, id: BookmarkId) {
        let (previous, next) = (self.bookmarks[id].previous, self.bookmarks[id].next);
        if let Some(p) = previous {
            self.bookmarks[p].next = next;
        }
        if let Some(n) = next {
            self.bookmarks[n].previous = previous;
        }
        self.bookmarks[id].previous = None;
        self.bookmarks[id].next = None;
    }

    fn link_after(&mut self, previous: BookmarkId, id: BookmarkId) {
        if previous == id || self.bookmarks[previous].next == Some(id) {
            return;
        }
        self.unlink(id);
        let next = self.bookmarks[previous].next;
        self.bookmarks[id].next = next;
        self.bookmarks[id].previous = Some(previous);
        self.bookmarks[previous].next = Some(id);
        if let Some(n) = next {
            self.bookmarks[n].previous = Some(id);
        }
    }

    /// Repair damage up to (and including) `step`, evicting bookmarks whose
    /// nodes left the tree. Returns the closest good bookmark at or before
    /// `step`.
    fn repair_cache_up_to_step(&mut self, tree: &Tree, step: usize) -> BookmarkId {
        match self.last_undamaged_step {
            Some(limit) if limit < step => {
                let mut closest = self.closest_bookmark(limit);
                let mut current = self.bookmarks[closest].next;
                while let Some(id) = current {
                    if self.bookmarks[id].steps > step {
                        break;
                    }
                    let next = self.bookmarks[id].next;
                    let node = self.bookmarks[id].node;
                    if !tree.is_attached(node) {
                        let bucket = self.destination_bucket(self.bookmarks[id].steps);
                        if self.step_to_dom_point.get(&bucket).copied() == Some(id) {
                            // relocate before unlinking, the previous link is
                            // about to be cleared
                            match self.bookmarks[id].previous {
                                Some(previous) => {
                                    self.step_to_dom_point.insert(bucket, previous);
                                }
                                None => {
                                    self.step_to_dom_point.remove(&bucket);
                                }
                            }
                        }
                        self.unlink(id);
                        self.node_to_bookmark.remove(&node);
                        debug!(steps = self.bookmarks[id].steps, "evicted stale bookmark");
                    } else {
                        closest = id;
                    }
                    current = next;
                }
                // everything at or before `step` is now trustworthy
                self.last_undamaged_step = Some(step);
                closest
            }
            _ => self.closest_bookmark(step),
        }
    }

    /// Record (or refresh) the bookmark for a paragraph whose first inner
    /// step is `steps`. Callers must visit positions in document order so
    /// damaged regions are repaired as they are crossed.
    pub fn update_bookmark(&mut self, tree: &Tree, steps: usize, node: NodeId) {
        let closest_prior = self.repair_cache_up_to_step(tree, steps);
        let id = match self.node_to_bookmark.get(&node).copied() {
            Some(existing) => {
                self.bookmarks[existing].steps = steps;
                existing
            }
            None => {
                let id = self.bookmarks.len();
                self.bookmarks.push(Bookmark {
                    steps,
                    node,
                    previous: None,
                    next: None,
                });
                self.node_to_bookmark.insert(node, id);
                id
            }
        };
        self.link_after(closest_prior, id);
        let bucket = self.destination_bucket(steps);
        match self.step_to_dom_point.get(&bucket).copied() {
            Some(existing) if self.bookmarks[existing].steps >= steps => {}
            _ => {
                self.step_to_dom_point.insert(bucket, id);
            }
        }
    }

    /// Closest known position at or before the requested step
    pub fn set_to_closest_step(&self, steps: usize) -> CachePoint {
        self.point(self.undamaged(self.closest_bookmark(steps)))
    }

    /// Closest known position at or before the requested tree point
    pub fn set_to_closest_dom_point(&self, tree: &Tree, node: NodeId, offset: usize) -> CachePoint {
        let found = if node == self.root && offset == 0 {
            Some(BASE)
        } else if node == self.root && offset == tree.child_count(self.root) {
            // end of document: highest bookmark in the bucket index
            let mut best = BASE;
            for &id in self.step_to_dom_point.values() {
                if self.bookmarks[id].steps > self.bookmarks[best].steps {
                    best = id;
                }
            }
            Some(best)
        } else {
            let target = tree.children(node).get(offset).copied().unwrap_or(node);
            let mut found = self.find_bookmarked_ancestor(tree, target);
            if found.is_none() {
                // crawl backwards until some bookmarked node is passed
                let mut iter = PositionIterator::new(self.root);
                iter.set_unfiltered_position(tree, node, offset);
                while found.is_none() && iter.previous_position(tree) {
                    found = self.find_bookmarked_ancestor(tree, iter.container());
                }
            }
            found
        };
        self.point(self.undamaged(found.unwrap_or(BASE)))
    }

    fn find_bookmarked_ancestor(&self, tree: &Tree, node: NodeId) -> Option<BookmarkId> {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == self.root {
                break;
            }
            if let Some(&id) = self.node_to_bookmark.get(&n) {
                return Some(id);
            }
            current = tree.parent(n);
        }
        None
    }

    /// Mark every step beyond `inflection_step` as untrustworthy
    pub fn damage_cache_after_step(&mut self, inflection_step: usize) {
        self.last_undamaged_step = Some(match self.last_undamaged_step {
            Some(current) => current.min(inflection_step),
            None => inflection_step,
        });
    }
}
