//! Document tree arena

use smallvec::SmallVec;

use crate::QName;

/// Stable node identifier. Indices are never reused, so an id held across
/// mutations can be re-validated with [`Tree::is_attached`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Node payload
#[derive(Debug, Clone)]
pub enum NodeKind {
    Element {
        name: QName,
        attrs: Vec<(QName, String)>,
        children: SmallVec<[NodeId; 8]>,
    },
    Text {
        data: String,
    },
}

#[derive(Debug, Clone)]
struct NodeData {
    parent: Option<NodeId>,
    kind: NodeKind,
}

/// The document tree. Owns all nodes; everything else holds ids.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl Tree {
    /// Create a tree with a single root element
    pub fn new(root_name: QName) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        let root = tree.alloc(NodeKind::Element {
            name: root_name,
            attrs: Vec::new(),
            children: SmallVec::new(),
        });
        tree.root = root;
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData { parent: None, kind });
        id
    }

    fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.index()]
    }

    /// Create a detached element node
    pub fn create_element(&mut self, name: QName) -> NodeId {
        self.alloc(NodeKind::Element {
            name,
            attrs: Vec::new(),
            children: SmallVec::new(),
        })
    }

    /// Create a detached text node
    pub fn create_text(&mut self, data: &str) -> NodeId {
        self.alloc(NodeKind::Text {
            data: data.to_string(),
        })
    }

    // ── structure ────────────────────────────────────────────────────

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.node(id).kind {
            NodeKind::Element { children, .. } => children,
            NodeKind::Text { .. } => &[],
        }
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).len()
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).last().copied()
    }

    /// Offset of `id` within its parent's child list
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let idx = self.index_in_parent(id)?;
        self.children(parent).get(idx + 1).copied()
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let idx = self.index_in_parent(id)?;
        if idx == 0 {
            None
        } else {
            self.children(parent).get(idx - 1).copied()
        }
    }

    /// True if `id` is the root or reachable from the root
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            match self.parent(current) {
                Some(p) => current = p,
                None => return false,
            }
        }
    }

    /// True if `node` is `ancestor` or lies beneath it
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = node;
        loop {
            if current == ancestor {
                return true;
            }
            match self.parent(current) {
                Some(p) => current = p,
                None => return false,
            }
        }
    }

    /// Append `child` as the last child of `parent`, detaching it first
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Insert `child` into `parent` before `before` (or at the end)
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, before: Option<NodeId>) {
        debug_assert!(!self.contains(child, parent), "cycle in tree insert");
        self.detach(child);
        let idx = match before {
            Some(b) => self
                .index_in_parent(b)
                .expect("insert_before reference is not a child of parent"),
            None => self.child_count(parent),
        };
        match &mut self.node_mut(parent).kind {
            NodeKind::Element { children, .. } => children.insert(idx, child),
            NodeKind::Text { .. } => panic!("text node cannot have children"),
        }
        self.node_mut(child).parent = Some(parent);
    }

    /// Detach `id` from its parent. The subtree stays intact but is no
    /// longer reachable from the root.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.parent(id) {
            if let NodeKind::Element { children, .. } = &mut self.node_mut(parent).kind {
                children.retain(|c| *c != id);
            }
            self.node_mut(id).parent = None;
        }
    }

    // ── element accessors ────────────────────────────────────────────

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Element { .. })
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Text { .. })
    }

    pub fn name(&self, id: NodeId) -> Option<&QName> {
        match &self.node(id).kind {
            NodeKind::Element { name, .. } => Some(name),
            NodeKind::Text { .. } => None,
        }
    }

    pub fn attribute(&self, id: NodeId, name: &QName) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str()),
            NodeKind::Text { .. } => None,
        }
    }

    pub fn set_attribute(&mut self, id: NodeId, name: QName, value: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.node_mut(id).kind {
            match attrs.iter_mut().find(|(n, _)| *n == name) {
                Some((_, v)) => *v = value.to_string(),
                None => attrs.push((name, value.to_string())),
            }
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &QName) {
        if let NodeKind::Element { attrs, .. } = &mut self.node_mut(id).kind {
            attrs.retain(|(n, _)| n != name);
        }
    }

    // ── text accessors ───────────────────────────────────────────────

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Text { data } => Some(data),
            NodeKind::Element { .. } => None,
        }
    }

    /// Character length of a text node (0 for elements)
    pub fn text_len(&self, id: NodeId) -> usize {
        self.text(id).map(|t| t.chars().count()).unwrap_or(0)
    }

    fn byte_offset(data: &str, char_offset: usize) -> usize {
        data.char_indices()
            .nth(char_offset)
            .map(|(b, _)| b)
            .unwrap_or(data.len())
    }

    /// Insert `text` at character `offset` of a text node
    pub fn insert_text(&mut self, id: NodeId, offset: usize, text: &str) {
        if let NodeKind::Text { data } = &mut self.node_mut(id).kind {
            let byte = Self::byte_offset(data, offset);
            data.insert_str(byte, text);
        }
    }

    /// Delete `len` characters starting at character `offset` of a text node
    pub fn delete_text(&mut self, id: NodeId, offset: usize, len: usize) {
        if let NodeKind::Text { data } = &mut self.node_mut(id).kind {
            let start = Self::byte_offset(data, offset);
            let end = Self::byte_offset(data, offset + len);
            data.replace_range(start..end, "");
        }
    }

    /// Split a text node at character `offset`; the tail becomes a new text
    /// node inserted as the next sibling, which is returned.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> NodeId {
        let tail = {
            let data = self.text(id).expect("split_text on non-text node");
            let byte = Self::byte_offset(data, offset);
            data[byte..].to_string()
        };
        if let NodeKind::Text { data } = &mut self.node_mut(id).kind {
            let byte = Self::byte_offset(data, offset);
            data.truncate(byte);
        }
        let tail_node = self.create_text(&tail);
        let parent = self.parent(id).expect("split_text on detached node");
        let next = self.next_sibling(id);
        self.insert_before(parent, tail_node, next);
        tail_node
    }

    /// Merge runs of adjacent text children of `parent` and drop empty ones
    pub fn normalize_text(&mut self, parent: NodeId) {
        let mut i = 0;
        while i < self.child_count(parent) {
            let child = self.children(parent)[i];
            if !self.is_text(child) {
                i += 1;
                continue;
            }
            if self.text_len(child) == 0 {
                self.detach(child);
                continue;
            }
            // absorb following text siblings
            while let Some(next) = self.children(parent).get(i + 1).copied() {
                if !self.is_text(next) {
                    break;
                }
                let absorbed = self.text(next).unwrap_or("").to_string();
                let len = self.text_len(child);
                self.insert_text(child, len, &absorbed);
                self.detach(next);
            }
            i += 1;
        }
    }

    /// Deep-clone the subtree rooted at `id`; the clone is detached
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let clone = match self.node(id).kind.clone() {
            NodeKind::Element { name, attrs, .. } => {
                let e = self.create_element(name);
                if let NodeKind::Element { attrs: a, .. } = &mut self.node_mut(e).kind {
                    *a = attrs;
                }
                e
            }
            NodeKind::Text { data } => self.create_text(&data),
        };
        let children: Vec<NodeId> = self.children(id).to_vec();
        for child in children {
            let child_clone = self.clone_subtree(child);
            self.append_child(clone, child_clone);
        }
        clone
    }

    /// Clone an element without its children (attributes kept)
    pub fn clone_shallow(&mut self, id: NodeId) -> NodeId {
        match self.node(id).kind.clone() {
            NodeKind::Element { name, attrs, .. } => {
                let e = self.create_element(name);
                if let NodeKind::Element { attrs: a, .. } = &mut self.node_mut(e).kind {
                    *a = attrs;
                }
                e
            }
            NodeKind::Text { data } => self.create_text(&data),
        }
    }

    /// Concatenated text content of the subtree
    pub fn text_content(&self, id: NodeId) -> String {
        match &self.node(id).kind {
            NodeKind::Text { data } => data.clone(),
            NodeKind::Element { children, .. } => {
                children.iter().map(|c| self.text_content(*c)).collect()
            }
        }
    }
}
