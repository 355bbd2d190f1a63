//! Rigid locking trees between elements.
//!
//! Each element has at most one lock parent and any number of lock children,
//! all stored as [`OpticsId`] handles inside the elements themselves. The
//! functions here operate on the element slice owned by the bench and keep
//! the parent and child links consistent with each other. The lock graph is
//! always a forest.

use log::debug;

use crate::optics::{Optics, OpticsId};

/// Slice index of the element with the given id.
pub fn find(optics: &[Optics], id: OpticsId) -> Option<usize> {
    optics.iter().position(|o| o.id() == id)
}

/// Root of the lock tree containing `id`.
pub fn root(optics: &[Optics], id: OpticsId) -> OpticsId {
    let mut current = id;
    // The depth is bounded by the element count, which also guards against
    // a malformed graph.
    for _ in 0..=optics.len() {
        match find(optics, current).and_then(|i| optics[i].lock_parent) {
            Some(parent) => current = parent,
            None => break,
        }
    }
    current
}

/// `id` and all its lock descendants, depth first.
pub fn subtree(optics: &[Optics], id: OpticsId) -> Vec<OpticsId> {
    let mut result = Vec::new();
    let mut stack = vec![id];
    while let Some(current) = stack.pop() {
        if result.contains(&current) {
            continue;
        }
        result.push(current);
        if let Some(i) = find(optics, current) {
            stack.extend(optics[i].lock_children.iter().rev().copied());
        }
    }
    result
}

/// Whether `candidate` is `ancestor` itself or one of its descendants.
pub fn is_descendant(optics: &[Optics], ancestor: OpticsId, candidate: OpticsId) -> bool {
    subtree(optics, ancestor).contains(&candidate)
}

/// Whether `a` and `b` belong to the same lock tree.
pub fn is_locked_to(optics: &[Optics], a: OpticsId, b: OpticsId) -> bool {
    is_descendant(optics, root(optics, a), b)
}

/// Lock `child` to `parent`, replacing any previous parent.
///
/// Fails without mutation when `parent` is already in the lock tree of
/// `child`, which would otherwise create a cycle.
pub fn relative_lock_to(optics: &mut [Optics], child: OpticsId, parent: OpticsId) -> bool {
    if find(optics, parent).is_none() || is_locked_to(optics, child, parent) {
        return false;
    }
    let Some(child_index) = find(optics, child) else {
        return false;
    };

    relative_unlock(optics, child);
    optics[child_index].lock_parent = Some(parent);
    optics[child_index].absolute_lock = false;
    if let Some(parent_index) = find(optics, parent) {
        optics[parent_index].lock_children.push(child);
    }
    debug!("Locked {} to {}", child, parent);
    true
}

/// Remove the lock parent of `id`. Returns false if it had none.
pub fn relative_unlock(optics: &mut [Optics], id: OpticsId) -> bool {
    let Some(index) = find(optics, id) else {
        return false;
    };
    let Some(parent) = optics[index].lock_parent.take() else {
        return false;
    };
    if let Some(parent_index) = find(optics, parent) {
        optics[parent_index].lock_children.retain(|&c| c != id);
    }
    true
}

/// Set or clear the absolute lock. Setting it drops the lock parent.
pub fn set_absolute_lock(optics: &mut [Optics], id: OpticsId, lock: bool) {
    if lock {
        relative_unlock(optics, id);
    }
    if let Some(index) = find(optics, id) {
        optics[index].absolute_lock = lock;
    }
}

/// Whether the tree containing `id` is pinned by an absolute lock.
pub fn tree_absolute_lock(optics: &[Optics], id: OpticsId) -> bool {
    find(optics, root(optics, id)).is_some_and(|i| optics[i].absolute_lock)
}

/// Move `id` to `position`, carrying its whole lock tree along.
///
/// Every element of the tree is shifted by the same signed offset. Returns
/// false without moving anything when the tree is absolutely locked and
/// `respect_absolute` is set.
pub fn move_tree(
    optics: &mut [Optics],
    id: OpticsId,
    position: f64,
    respect_absolute: bool,
) -> bool {
    let Some(index) = find(optics, id) else {
        return false;
    };
    if respect_absolute && tree_absolute_lock(optics, id) {
        return false;
    }
    let delta = position - optics[index].position();
    for member in subtree(optics, root(optics, id)) {
        if let Some(i) = find(optics, member) {
            let moved = if member == id {
                position
            } else {
                optics[i].position() + delta
            };
            optics[i].set_position(moved);
        }
    }
    true
}

/// Detach `id` from its tree before removal. Its children become roots.
pub fn detach(optics: &mut [Optics], id: OpticsId) {
    relative_unlock(optics, id);
    let Some(index) = find(optics, id) else {
        return;
    };
    let children = std::mem::take(&mut optics[index].lock_children);
    for child in children {
        if let Some(i) = find(optics, child) {
            optics[i].lock_parent = None;
        }
    }
}
