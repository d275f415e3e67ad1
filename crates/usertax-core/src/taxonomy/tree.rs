//! Hierarchical term trees.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::term::Term;

/// A term together with its descendants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermNode {
    /// The term at this node.
    pub term: Term,
    /// Child nodes, in input order.
    pub children: Vec<TermNode>,
}

/// Build a forest from a flat term list.
///
/// The first pass indexes children by parent id; the second assembles nodes
/// from that index. Terms whose parent is not in the list become roots, and a
/// parent cycle is cut at the first revisited term.
pub fn build_term_tree(terms: &[Term]) -> Vec<TermNode> {
    let ids: HashSet<u64> = terms.iter().map(|t| t.term_id).collect();

    let mut children: HashMap<u64, Vec<usize>> = HashMap::new();
    let mut roots = Vec::new();
    for (idx, term) in terms.iter().enumerate() {
        if term.parent == 0 || term.parent == term.term_id || !ids.contains(&term.parent) {
            roots.push(idx);
        } else {
            children.entry(term.parent).or_default().push(idx);
        }
    }

    let mut visited = HashSet::new();
    let mut forest: Vec<TermNode> = roots
        .into_iter()
        .filter_map(|idx| assemble(terms, &children, idx, &mut visited))
        .collect();

    // Terms only reachable through a cycle never hang off a root.
    for (idx, term) in terms.iter().enumerate() {
        if !visited.contains(&term.term_id) {
            if let Some(node) = assemble(terms, &children, idx, &mut visited) {
                forest.push(node);
            }
        }
    }

    forest
}

fn assemble(
    terms: &[Term],
    children: &HashMap<u64, Vec<usize>>,
    idx: usize,
    visited: &mut HashSet<u64>,
) -> Option<TermNode> {
    let term = &terms[idx];
    if !visited.insert(term.term_id) {
        return None;
    }

    let kids = children
        .get(&term.term_id)
        .map(|indices| {
            indices
                .iter()
                .filter_map(|&child| assemble(terms, children, child, visited))
                .collect()
        })
        .unwrap_or_default();

    Some(TermNode {
        term: term.clone(),
        children: kids,
    })
}

impl TermNode {
    /// Number of terms in this subtree, including this node.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(TermNode::len).sum::<usize>()
    }

    /// Always false; a node holds at least its own term.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Visit the subtree depth-first with the depth of each node.
    pub fn walk<'a>(&'a self, depth: usize, visit: &mut impl FnMut(&'a Term, usize)) {
        visit(&self.term, depth);
        for child in &self.children {
            child.walk(depth + 1, visit);
        }
    }
}
