//! Flattening of grouped shape hierarchies.
//!
//! Shapes can be nested inside group shapes to any depth. The walker turns
//! such a hierarchy into a flat list of leaf shapes in document order, each
//! tagged with the index path that leads to it.

use crate::error::{Error, Result};

/// Maximum group nesting accepted before the tree is considered malformed.
pub const MAX_GROUP_DEPTH: usize = 64;

/// A node of a shape hierarchy.
pub trait ShapeNode {
    /// Child shapes when this node is a group, `None` for a leaf.
    fn child_shapes(&self) -> Option<Vec<&Self>>;
}

/// A leaf shape together with its position in the hierarchy.
#[derive(Debug)]
pub struct WalkedShape<'a, S> {
    pub shape: &'a S,
    /// Index of the shape within each enclosing collection, outermost first.
    pub path: Vec<usize>,
}

impl<'a, S> WalkedShape<'a, S> {
    /// Nesting depth; top-level shapes have depth 0.
    pub fn depth(&self) -> usize {
        self.path.len().saturating_sub(1)
    }
}

struct Frame<'a, S> {
    items: Vec<&'a S>,
    cursor: usize,
    prefix: Vec<usize>,
    group: Option<&'a S>,
}

/// Flatten `roots` depth-first, descending transparently into groups.
///
/// Uses an explicit work stack. A group nested deeper than
/// [`MAX_GROUP_DEPTH`] or one that contains itself is an error.
pub fn walk<'a, S: ShapeNode>(roots: Vec<&'a S>) -> Result<Vec<WalkedShape<'a, S>>> {
    let mut leaves = Vec::new();
    let mut stack = vec![Frame {
        items: roots,
        cursor: 0,
        prefix: Vec::new(),
        group: None,
    }];

    while let Some(frame) = stack.last_mut() {
        if frame.cursor >= frame.items.len() {
            stack.pop();
            continue;
        }
        let idx = frame.cursor;
        frame.cursor += 1;
        let node = frame.items[idx];
        let mut path = frame.prefix.clone();
        path.push(idx);

        match node.child_shapes() {
            Some(children) => {
                if stack.len() > MAX_GROUP_DEPTH {
                    return Err(Error::MalformedShapeTree(format!(
                        "group nesting exceeds {} levels at path {:?}",
                        MAX_GROUP_DEPTH, path
                    )));
                }
                let revisited = stack
                    .iter()
                    .filter_map(|f| f.group)
                    .any(|ancestor| std::ptr::eq(ancestor, node));
                if revisited {
                    return Err(Error::MalformedShapeTree(format!(
                        "group at path {:?} contains itself",
                        path
                    )));
                }
                stack.push(Frame {
                    items: children,
                    cursor: 0,
                    prefix: path,
                    group: Some(node),
                });
            }
            None => leaves.push(WalkedShape { shape: node, path }),
        }
    }

    Ok(leaves)
}
