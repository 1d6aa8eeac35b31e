//! # Copy-on-Write B+Tree
//!
//! The tree never mutates a persisted page. Every write path copies the
//! affected root-to-leaf spine: a modification produces a fresh node (built
//! in a double-page buffer), the splitter cuts it into one to three
//! page-sized pieces, and the parent is rebuilt to reference the pieces. Old
//! pages are handed back to the pager with `dealloc` and stay readable until
//! the transaction machinery decides they are unreachable.
//!
//! ## Sentinel
//!
//! The first entry ever inserted is preceded by a synthetic empty key, so
//! the root covers the whole key space and `lookup_le` always lands on a
//! containing node. The sentinel is an ordinary entry as far as the codec is
//! concerned; it only matters to lookups by being smaller than every real
//! key.
//!
//! ## Split contract
//!
//! A node grown past one page splits at most into three: an insertion adds
//! at most one entry (≤ 4014 encoded bytes) to content that already fit a
//! page, so after the first halving only the left half can still overflow,
//! and only once.
//!
//! ## Delete contract
//!
//! A shrunken child merges with its closest sibling when the result fits a
//! page and the child dropped below a quarter page. A child that empties
//! entirely is only possible when it was an only child; the parent then
//! empties too and the root handler prunes tree height.

use eyre::{ensure, Result};
use smallvec::{smallvec, SmallVec};

use crate::config::{MAX_KEY_SIZE, MAX_VALUE_SIZE, NODE_HEADER, PAGE_SIZE};
use crate::error::StoreError;
use crate::storage::{PageNum, PageRead, PageStore};

use super::iter::TreeIter;
use super::node::{Node, NodeBuf, NodeType};

/// B+tree rooted at a page number. Zero means the tree is empty.
///
/// All operations go through a pager capability: [`PageRead`] for lookups,
/// [`PageStore`] for mutations. The tree owns no pages itself.
#[derive(Debug, Clone, Copy)]
pub struct BTree {
    root: PageNum,
}

enum DeleteOutcome {
    NotFound,
    Updated(NodeBuf),
}

enum MergeDir {
    Left,
    Right,
}

impl BTree {
    pub fn new(root: PageNum) -> Self {
        BTree { root }
    }

    pub fn root(&self) -> PageNum {
        self.root
    }

    /// Point lookup.
    pub fn get<S: PageRead>(&self, store: &S, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if self.root == 0 {
            return Ok(None);
        }
        let mut ptr = self.root;
        loop {
            let node = Node::from_page(store.page(ptr)?)?;
            let idx = node.lookup_le(key)?;
            match node.node_type() {
                NodeType::Leaf => {
                    if node.key(idx)? == key {
                        return Ok(Some(node.value(idx)?.to_vec()));
                    }
                    return Ok(None);
                }
                NodeType::Internal => ptr = node.child(idx)?,
            }
        }
    }

    /// Inserts or replaces `key`.
    pub fn insert<S: PageStore>(&mut self, store: &mut S, key: &[u8], val: &[u8]) -> Result<()> {
        check_limits(key, Some(val))?;

        if self.root == 0 {
            // First insert: seed the leaf with the empty sentinel so every
            // later lookup finds a containing node.
            let mut root = NodeBuf::new();
            root.set_header(NodeType::Leaf, 2);
            root.append_kv(0, 0, b"", b"");
            root.append_kv(1, 0, key, val);
            self.root = store.alloc(root.into_page()?)?;
            return Ok(());
        }

        let old_root = self.root;
        let root_copy = Node::from_page(store.page(old_root)?)?.to_buf();
        let updated = insert_rec(store, root_copy.as_node(), key, val)?;
        let pieces = split_three(updated)?;
        store.dealloc(old_root);

        if pieces.len() == 1 {
            let piece = pieces.into_iter().next().unwrap();
            self.root = store.alloc(piece.into_page()?)?;
        } else {
            // Root split: grow the tree by one level, one entry per piece.
            let mut root = NodeBuf::new();
            root.set_header(NodeType::Internal, pieces.len() as u16);
            for (i, piece) in pieces.into_iter().enumerate() {
                let first = piece.as_node().key(0)?.to_vec();
                let ptr = store.alloc(piece.into_page()?)?;
                root.append_kv(i as u16, ptr, &first, b"");
            }
            self.root = store.alloc(root.into_page()?)?;
        }
        Ok(())
    }

    /// Removes `key`, reporting whether it was present.
    pub fn delete<S: PageStore>(&mut self, store: &mut S, key: &[u8]) -> Result<bool> {
        check_limits(key, None)?;
        if self.root == 0 {
            return Ok(false);
        }

        let root_copy = Node::from_page(store.page(self.root)?)?.to_buf();
        match delete_rec(store, root_copy.as_node(), key)? {
            DeleteOutcome::NotFound => Ok(false),
            DeleteOutcome::Updated(new_root) => {
                store.dealloc(self.root);
                let view = new_root.as_node();
                if view.node_type() == NodeType::Internal && view.nkeys() == 1 {
                    // A lone child makes the root redundant; shrink height.
                    self.root = view.child(0)?;
                } else if view.nkeys() == 0 {
                    self.root = 0;
                } else {
                    self.root = store.alloc(new_root.into_page()?)?;
                }
                Ok(true)
            }
        }
    }

    /// Positions an iterator at the greatest key ≤ `key`.
    pub fn seek_le<'s, S: PageRead>(&self, store: &'s S, key: &[u8]) -> Result<TreeIter<'s, S>> {
        TreeIter::seek_le(store, self.root, key)
    }
}

pub(crate) fn check_limits(key: &[u8], val: Option<&[u8]>) -> Result<()> {
    if key.len() > MAX_KEY_SIZE {
        return Err(StoreError::KeyTooLarge {
            size: key.len(),
            max: MAX_KEY_SIZE,
        }
        .into());
    }
    if let Some(val) = val {
        if val.len() > MAX_VALUE_SIZE {
            return Err(StoreError::ValueTooLarge {
                size: val.len(),
                max: MAX_VALUE_SIZE,
            }
            .into());
        }
    }
    Ok(())
}

fn insert_rec<S: PageStore>(store: &mut S, node: Node<'_>, key: &[u8], val: &[u8]) -> Result<NodeBuf> {
    let idx = node.lookup_le(key)?;
    match node.node_type() {
        NodeType::Leaf => {
            if node.key(idx)? == key {
                leaf_update(&node, idx, key, val)
            } else {
                leaf_insert(&node, idx + 1, key, val)
            }
        }
        NodeType::Internal => {
            let kptr = node.child(idx)?;
            let child = Node::from_page(store.page(kptr)?)?.to_buf();
            let updated = insert_rec(store, child.as_node(), key, val)?;
            let pieces = split_three(updated)?;
            store.dealloc(kptr);
            replace_children(store, &node, idx, pieces)
        }
    }
}

/// Rebuilds `parent` with entry `idx` replaced by one entry per piece.
fn replace_children<S: PageStore>(
    store: &mut S,
    parent: &Node<'_>,
    idx: u16,
    pieces: SmallVec<[NodeBuf; 3]>,
) -> Result<NodeBuf> {
    let inc = pieces.len() as u16;
    let mut new = NodeBuf::new();
    new.set_header(NodeType::Internal, parent.nkeys() + inc - 1);
    new.append_range(parent, 0, 0, idx)?;
    for (i, piece) in pieces.into_iter().enumerate() {
        let first = piece.as_node().key(0)?.to_vec();
        let ptr = store.alloc(piece.into_page()?)?;
        new.append_kv(idx + i as u16, ptr, &first, b"");
    }
    new.append_range(parent, idx + inc, idx + 1, parent.nkeys() - (idx + 1))?;
    Ok(new)
}

fn leaf_insert(old: &Node<'_>, idx: u16, key: &[u8], val: &[u8]) -> Result<NodeBuf> {
    let mut new = NodeBuf::new();
    new.set_header(NodeType::Leaf, old.nkeys() + 1);
    new.append_range(old, 0, 0, idx)?;
    new.append_kv(idx, 0, key, val);
    new.append_range(old, idx + 1, idx, old.nkeys() - idx)?;
    Ok(new)
}

fn leaf_update(old: &Node<'_>, idx: u16, key: &[u8], val: &[u8]) -> Result<NodeBuf> {
    let mut new = NodeBuf::new();
    new.set_header(NodeType::Leaf, old.nkeys());
    new.append_range(old, 0, 0, idx)?;
    new.append_kv(idx, 0, key, val);
    new.append_range(old, idx + 1, idx + 1, old.nkeys() - (idx + 1))?;
    Ok(new)
}

fn leaf_delete(old: &Node<'_>, idx: u16) -> Result<NodeBuf> {
    let mut new = NodeBuf::new();
    new.set_header(NodeType::Leaf, old.nkeys() - 1);
    new.append_range(old, 0, 0, idx)?;
    new.append_range(old, idx, idx + 1, old.nkeys() - (idx + 1))?;
    Ok(new)
}

/// Splits an oversized node in two, biasing toward the midpoint and then
/// nudging the boundary until the right half fits. The right half always
/// fits afterwards; the left half may still overflow by one oversized entry
/// and is split again by [`split_three`].
fn split_two(old: &Node<'_>) -> Result<(NodeBuf, NodeBuf)> {
    ensure!(old.nkeys() >= 2, "cannot split a node with {} keys", old.nkeys());

    let left_bytes =
        |nleft: u16| NODE_HEADER + 10 * nleft as usize + old.offset(nleft) as usize;
    let right_bytes = |nleft: u16| old.nbytes() - left_bytes(nleft) + NODE_HEADER;

    let mut nleft = old.nkeys() / 2;
    while left_bytes(nleft) > PAGE_SIZE {
        nleft -= 1;
    }
    assert!(nleft >= 1, "left split half cannot be empty");
    while right_bytes(nleft) > PAGE_SIZE {
        nleft += 1;
    }
    assert!(nleft < old.nkeys(), "right split half cannot be empty");
    let nright = old.nkeys() - nleft;

    let mut left = NodeBuf::new();
    let mut right = NodeBuf::new();
    left.set_header(old.node_type(), nleft);
    right.set_header(old.node_type(), nright);
    left.append_range(old, 0, 0, nleft)?;
    right.append_range(old, 0, nleft, nright)?;

    debug_assert!(right.nbytes() <= PAGE_SIZE);
    Ok((left, right))
}

/// Cuts a freshly built node into one, two, or three page-sized pieces.
fn split_three(node: NodeBuf) -> Result<SmallVec<[NodeBuf; 3]>> {
    if node.nbytes() <= PAGE_SIZE {
        return Ok(smallvec![node]);
    }
    let (left, right) = split_two(&node.as_node())?;
    if left.nbytes() <= PAGE_SIZE {
        return Ok(smallvec![left, right]);
    }
    let (leftmost, middle) = split_two(&left.as_node())?;
    assert!(
        leftmost.nbytes() <= PAGE_SIZE,
        "split produced an oversized piece"
    );
    Ok(smallvec![leftmost, middle, right])
}

fn merge_nodes(left: &Node<'_>, right: &Node<'_>) -> Result<NodeBuf> {
    let mut new = NodeBuf::new();
    new.set_header(left.node_type(), left.nkeys() + right.nkeys());
    new.append_range(left, 0, 0, left.nkeys())?;
    new.append_range(right, left.nkeys(), 0, right.nkeys())?;
    Ok(new)
}

/// Rebuilds `parent` with the adjacent entries `idx` and `idx + 1` replaced
/// by a single entry for the merged child.
fn replace_two(parent: &Node<'_>, idx: u16, ptr: PageNum, key: &[u8]) -> Result<NodeBuf> {
    let mut new = NodeBuf::new();
    new.set_header(NodeType::Internal, parent.nkeys() - 1);
    new.append_range(parent, 0, 0, idx)?;
    new.append_kv(idx, ptr, key, b"");
    new.append_range(parent, idx + 1, idx + 2, parent.nkeys() - (idx + 2))?;
    Ok(new)
}

/// A replacement child qualifies for merging when it shrank below a quarter
/// page and the closest sibling (left preferred) can absorb it within one
/// page.
fn merge_candidate<S: PageRead>(
    store: &S,
    parent: &Node<'_>,
    idx: u16,
    updated: &NodeBuf,
) -> Result<Option<(MergeDir, NodeBuf)>> {
    if updated.nbytes() > PAGE_SIZE / 4 {
        return Ok(None);
    }
    if idx > 0 {
        let sibling = Node::from_page(store.page(parent.child(idx - 1)?)?)?;
        if sibling.nbytes() + updated.nbytes() - NODE_HEADER <= PAGE_SIZE {
            return Ok(Some((MergeDir::Left, sibling.to_buf())));
        }
    }
    if idx + 1 < parent.nkeys() {
        let sibling = Node::from_page(store.page(parent.child(idx + 1)?)?)?;
        if sibling.nbytes() + updated.nbytes() - NODE_HEADER <= PAGE_SIZE {
            return Ok(Some((MergeDir::Right, sibling.to_buf())));
        }
    }
    Ok(None)
}

fn delete_rec<S: PageStore>(store: &mut S, node: Node<'_>, key: &[u8]) -> Result<DeleteOutcome> {
    let idx = node.lookup_le(key)?;
    match node.node_type() {
        NodeType::Leaf => {
            if node.key(idx)? != key {
                return Ok(DeleteOutcome::NotFound);
            }
            Ok(DeleteOutcome::Updated(leaf_delete(&node, idx)?))
        }
        NodeType::Internal => delete_from_child(store, node, idx, key),
    }
}

fn delete_from_child<S: PageStore>(
    store: &mut S,
    parent: Node<'_>,
    idx: u16,
    key: &[u8],
) -> Result<DeleteOutcome> {
    let kptr = parent.child(idx)?;
    let child = Node::from_page(store.page(kptr)?)?.to_buf();
    let updated = match delete_rec(store, child.as_node(), key)? {
        DeleteOutcome::NotFound => return Ok(DeleteOutcome::NotFound),
        DeleteOutcome::Updated(buf) => buf,
    };
    store.dealloc(kptr);

    let new = match merge_candidate(&*store, &parent, idx, &updated)? {
        Some((MergeDir::Left, sibling)) => {
            let merged = merge_nodes(&sibling.as_node(), &updated.as_node())?;
            store.dealloc(parent.child(idx - 1)?);
            let first = merged.as_node().key(0)?.to_vec();
            let ptr = store.alloc(merged.into_page()?)?;
            replace_two(&parent, idx - 1, ptr, &first)?
        }
        Some((MergeDir::Right, sibling)) => {
            let merged = merge_nodes(&updated.as_node(), &sibling.as_node())?;
            store.dealloc(parent.child(idx + 1)?);
            let first = merged.as_node().key(0)?.to_vec();
            let ptr = store.alloc(merged.into_page()?)?;
            replace_two(&parent, idx, ptr, &first)?
        }
        None if updated.nkeys() == 0 => {
            // The child emptied; that can only happen to an only child, so
            // the parent empties with it and the root handler prunes.
            assert!(
                parent.nkeys() == 1 && idx == 0,
                "child emptied while siblings remain"
            );
            let mut new = NodeBuf::new();
            new.set_header(NodeType::Internal, 0);
            new
        }
        None => replace_children(store, &parent, idx, smallvec![updated])?,
    };
    Ok(DeleteOutcome::Updated(new))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::testutil::MemStore;

    /// Walks every reachable node checking the persisted-node invariants:
    /// encoded size within a page, strictly increasing keys, size limits,
    /// and child subtree key ranges.
    fn check_subtree(
        store: &MemStore,
        ptr: PageNum,
        lower: &[u8],
        upper: Option<&[u8]>,
    ) -> (usize, usize) {
        let page = store.page(ptr).unwrap();
        let node = Node::from_page(page).unwrap();
        assert!(node.nbytes() <= PAGE_SIZE);
        assert!(node.nkeys() >= 1);

        let mut pages = 1;
        let mut entries = 0;
        for i in 0..node.nkeys() {
            let key = node.key(i).unwrap();
            assert!(key.len() <= MAX_KEY_SIZE);
            if i == 0 {
                assert!(key >= lower);
            } else {
                assert!(key > node.key(i - 1).unwrap(), "keys must strictly increase");
            }
            if let Some(upper) = upper {
                assert!(key < upper);
            }
            match node.node_type() {
                NodeType::Leaf => {
                    assert!(node.value(i).unwrap().len() <= MAX_VALUE_SIZE);
                    entries += 1;
                }
                NodeType::Internal => {
                    let child_upper = if i + 1 < node.nkeys() {
                        Some(node.key(i + 1).unwrap())
                    } else {
                        upper
                    };
                    let (p, e) =
                        check_subtree(store, node.child(i).unwrap(), key, child_upper);
                    pages += p;
                    entries += e;
                }
            }
        }
        (pages, entries)
    }

    fn check_tree(store: &MemStore, tree: &BTree) -> (usize, usize) {
        if tree.root() == 0 {
            return (0, 0);
        }
        check_subtree(store, tree.root(), b"", None)
    }

    #[test]
    fn first_insert_seeds_sentinel() {
        let mut store = MemStore::new();
        let mut tree = BTree::new(0);

        tree.insert(&mut store, b"a", b"1").unwrap();

        let node = Node::from_page(store.page(tree.root()).unwrap()).unwrap();
        assert_eq!(node.node_type(), NodeType::Leaf);
        assert_eq!(node.nkeys(), 2);
        assert_eq!(node.key(0).unwrap(), b"");
        assert_eq!(node.key(1).unwrap(), b"a");
    }

    #[test]
    fn get_returns_last_inserted_value() {
        let mut store = MemStore::new();
        let mut tree = BTree::new(0);

        tree.insert(&mut store, b"k", b"v1").unwrap();
        tree.insert(&mut store, b"k", b"v2").unwrap();

        assert_eq!(tree.get(&store, b"k").unwrap(), Some(b"v2".to_vec()));
        assert_eq!(tree.get(&store, b"missing").unwrap(), None);
    }

    #[test]
    fn get_on_empty_tree_is_none() {
        let store = MemStore::new();
        let tree = BTree::new(0);

        assert_eq!(tree.get(&store, b"k").unwrap(), None);
    }

    #[test]
    fn insert_rejects_oversized_key_and_value() {
        let mut store = MemStore::new();
        let mut tree = BTree::new(0);

        let err = tree
            .insert(&mut store, &vec![0u8; MAX_KEY_SIZE + 1], b"v")
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::KeyTooLarge { size: 1001, .. })
        ));

        let err = tree
            .insert(&mut store, b"k", &vec![0u8; MAX_VALUE_SIZE + 1])
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::ValueTooLarge { .. })
        ));

        // nothing was allocated
        assert_eq!(tree.root(), 0);
        assert_eq!(store.page_count(), 0);
    }

    #[test]
    fn maximum_size_entry_is_accepted() {
        let mut store = MemStore::new();
        let mut tree = BTree::new(0);

        let key = vec![7u8; MAX_KEY_SIZE];
        let val = vec![9u8; MAX_VALUE_SIZE];
        tree.insert(&mut store, &key, &val).unwrap();

        assert_eq!(tree.get(&store, &key).unwrap(), Some(val));
        check_tree(&store, &tree);
    }

    #[test]
    fn delete_absent_key_returns_false() {
        let mut store = MemStore::new();
        let mut tree = BTree::new(0);

        assert!(!tree.delete(&mut store, b"nope").unwrap());

        tree.insert(&mut store, b"a", b"1").unwrap();
        let root_before = tree.root();
        assert!(!tree.delete(&mut store, b"nope").unwrap());
        assert_eq!(tree.root(), root_before);
    }

    #[test]
    fn delete_last_user_entry_leaves_sentinel() {
        let mut store = MemStore::new();
        let mut tree = BTree::new(0);

        tree.insert(&mut store, b"a", b"1").unwrap();
        assert!(tree.delete(&mut store, b"a").unwrap());

        let node = Node::from_page(store.page(tree.root()).unwrap()).unwrap();
        assert_eq!(node.nkeys(), 1);
        assert_eq!(node.key(0).unwrap(), b"");
        assert_eq!(tree.get(&store, b"a").unwrap(), None);
    }

    #[test]
    fn splits_keep_every_key_reachable() {
        let mut store = MemStore::new();
        let mut tree = BTree::new(0);

        let val = vec![0x5au8; 500];
        for i in 0..200 {
            let key = format!("key{i:04}");
            tree.insert(&mut store, key.as_bytes(), &val).unwrap();
        }

        let root = Node::from_page(store.page(tree.root()).unwrap()).unwrap();
        assert_eq!(root.node_type(), NodeType::Internal, "tree must have split");

        let (_, entries) = check_tree(&store, &tree);
        assert_eq!(entries, 200 + 1); // sentinel included

        for i in 0..200 {
            let key = format!("key{i:04}");
            assert_eq!(
                tree.get(&store, key.as_bytes()).unwrap(),
                Some(val.clone()),
                "{key} lost after splits"
            );
        }
    }

    #[test]
    fn descending_inserts_split_correctly() {
        let mut store = MemStore::new();
        let mut tree = BTree::new(0);

        let val = vec![1u8; 700];
        for i in (0..100).rev() {
            let key = format!("key{i:04}");
            tree.insert(&mut store, key.as_bytes(), &val).unwrap();
        }

        check_tree(&store, &tree);
        for i in 0..100 {
            let key = format!("key{i:04}");
            assert!(tree.get(&store, key.as_bytes()).unwrap().is_some());
        }
    }

    #[test]
    fn oversized_middle_insert_forces_three_way_split() {
        let mut store = MemStore::new();
        let mut tree = BTree::new(0);

        // Two ~2KB entries nearly fill the root leaf; a 3KB entry between
        // them cannot share a page with either, forcing a 3-way split.
        tree.insert(&mut store, b"a", &vec![1u8; 2000]).unwrap();
        tree.insert(&mut store, b"m", &vec![2u8; 2000]).unwrap();
        tree.insert(&mut store, b"g", &vec![3u8; MAX_VALUE_SIZE])
            .unwrap();

        let root = Node::from_page(store.page(tree.root()).unwrap()).unwrap();
        assert_eq!(root.node_type(), NodeType::Internal);
        assert_eq!(root.nkeys(), 3, "expected a 3-way split");

        let (_, entries) = check_tree(&store, &tree);
        assert_eq!(entries, 4);
        for key in [b"a" as &[u8], b"g", b"m"] {
            assert!(tree.get(&store, key).unwrap().is_some());
        }
    }

    #[test]
    fn deletes_merge_and_shrink_height() {
        let mut store = MemStore::new();
        let mut tree = BTree::new(0);

        let val = vec![3u8; 600];
        for i in 0..40 {
            let key = format!("key{i:04}");
            tree.insert(&mut store, key.as_bytes(), &val).unwrap();
        }
        let root = Node::from_page(store.page(tree.root()).unwrap()).unwrap();
        assert_eq!(root.node_type(), NodeType::Internal);

        for i in 0..39 {
            let key = format!("key{i:04}");
            assert!(tree.delete(&mut store, key.as_bytes()).unwrap());
            check_tree(&store, &tree);
        }

        // Merges must have collapsed the tree back to a single leaf.
        let root = Node::from_page(store.page(tree.root()).unwrap()).unwrap();
        assert_eq!(root.node_type(), NodeType::Leaf);
        assert_eq!(tree.get(&store, b"key0039").unwrap(), Some(val));
    }

    #[test]
    fn deleting_every_entry_empties_the_tree() {
        let mut store = MemStore::new();
        let mut tree = BTree::new(0);

        tree.insert(&mut store, b"a", b"1").unwrap();
        tree.insert(&mut store, b"b", b"2").unwrap();
        assert!(tree.delete(&mut store, b"a").unwrap());
        assert!(tree.delete(&mut store, b"b").unwrap());
        // removing the sentinel itself empties the root entirely
        assert!(tree.delete(&mut store, b"").unwrap());

        assert_eq!(tree.root(), 0);
        assert!(store.pages.is_empty(), "all pages must be deallocated");
    }

    #[test]
    fn collapsed_only_child_empties_internal_root() {
        let mut store = MemStore::new();

        // Hand-build the degenerate shape: an internal root with a single
        // leaf child holding just the sentinel.
        let mut leaf = NodeBuf::new();
        leaf.set_header(NodeType::Leaf, 1);
        leaf.append_kv(0, 0, b"", b"");
        let leaf_ptr = store.alloc(leaf.into_page().unwrap()).unwrap();

        let mut root = NodeBuf::new();
        root.set_header(NodeType::Internal, 1);
        root.append_kv(0, leaf_ptr, b"", b"");
        let root_ptr = store.alloc(root.into_page().unwrap()).unwrap();

        let mut tree = BTree::new(root_ptr);
        assert!(tree.delete(&mut store, b"").unwrap());
        assert_eq!(tree.root(), 0);
    }

    #[test]
    fn no_pages_leak_across_mixed_workload() {
        let mut store = MemStore::new();
        let mut tree = BTree::new(0);

        let val = vec![9u8; 400];
        for i in 0..120 {
            let key = format!("k{i:05}");
            tree.insert(&mut store, key.as_bytes(), &val).unwrap();
        }
        for i in (0..120).step_by(2) {
            let key = format!("k{i:05}");
            assert!(tree.delete(&mut store, key.as_bytes()).unwrap());
        }

        let (pages, entries) = check_tree(&store, &tree);
        assert_eq!(entries, 60 + 1);
        // every live page is reachable: the fake store drops deallocated
        // pages, so a leak shows up as a count mismatch
        assert_eq!(store.pages.len(), pages);
    }
}
