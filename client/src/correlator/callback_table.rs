use std::{collections::HashMap, sync::Arc};

use synthctl_shared::{OscMessage, Pattern, PatternItem};

pub type ResponseCallback = Arc<dyn Fn(&OscMessage) + Send + Sync>;

/// Identifies one registration so it can be removed later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackHandle(u64);

struct CallbackEntry {
    patterns: Vec<Pattern>,
    callback: ResponseCallback,
    once: bool,
}

#[derive(Default)]
struct TrieNode {
    handles: Vec<CallbackHandle>,
    children: HashMap<PatternItem, TrieNode>,
}

impl TrieNode {
    fn insert(&mut self, items: &[PatternItem], handle: CallbackHandle) {
        match items.split_first() {
            None => self.handles.push(handle),
            Some((first, rest)) => self
                .children
                .entry(first.clone())
                .or_default()
                .insert(rest, handle),
        }
    }

    /// Removes `handle` under `items`; prunes branches left empty.
    fn remove(&mut self, items: &[PatternItem], handle: CallbackHandle) {
        match items.split_first() {
            None => self.handles.retain(|existing| *existing != handle),
            Some((first, rest)) => {
                if let Some(child) = self.children.get_mut(first) {
                    child.remove(rest, handle);
                    if child.is_empty() {
                        self.children.remove(first);
                    }
                }
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.handles.is_empty() && self.children.is_empty()
    }
}

/// Reply callbacks indexed by pattern items
///
/// A message is matched by walking its address and then its arguments down
/// the trie; every registration found along the walk fires, so an
/// address-only registration sees every message at that address.
#[derive(Default)]
pub struct CallbackTable {
    root: TrieNode,
    entries: HashMap<CallbackHandle, CallbackEntry>,
    next_handle: u64,
}

impl CallbackTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        success: Pattern,
        failure: Option<Pattern>,
        callback: ResponseCallback,
        once: bool,
    ) -> CallbackHandle {
        let handle = CallbackHandle(self.next_handle);
        self.next_handle += 1;
        let mut patterns = vec![success];
        patterns.extend(failure);
        for pattern in &patterns {
            self.root.insert(pattern.items(), handle);
        }
        self.entries.insert(
            handle,
            CallbackEntry {
                patterns,
                callback,
                once,
            },
        );
        handle
    }

    /// Returns whether the handle was still registered.
    pub fn unregister(&mut self, handle: CallbackHandle) -> bool {
        let Some(entry) = self.entries.remove(&handle) else {
            return false;
        };
        for pattern in &entry.patterns {
            self.root.remove(pattern.items(), handle);
        }
        true
    }

    /// Collects the callbacks matching `message`, removing one-shot entries
    /// before they are handed out.
    pub fn take_matches(&mut self, message: &OscMessage) -> Vec<ResponseCallback> {
        let mut handles: Vec<CallbackHandle> = Vec::new();
        let address = PatternItem::Str(message.address.clone());
        if let Some(mut node) = self.root.children.get(&address) {
            handles.extend(node.handles.iter().copied());
            for argument in &message.arguments {
                let Some(item) = PatternItem::from_argument(argument) else {
                    break;
                };
                let Some(child) = node.children.get(&item) else {
                    break;
                };
                handles.extend(child.handles.iter().copied());
                node = child;
            }
        }

        let mut callbacks = Vec::with_capacity(handles.len());
        for handle in handles {
            let Some(entry) = self.entries.get(&handle) else {
                continue;
            };
            callbacks.push(entry.callback.clone());
            if entry.once {
                self.unregister(handle);
            }
        }
        callbacks
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.root = TrieNode::default();
        self.entries.clear();
    }
}
