//! Character-level trie for exact command lookup.
//!
//! Insert and lookup walk one node per character, so both are O(length of
//! the command) regardless of how many commands are registered. A node may
//! carry at most one binding; inserting the same command twice **overwrites**
//! the earlier binding. That overwrite is long-standing observable behavior
//! and is pinned by a test rather than rejected.

use std::collections::HashMap;

#[derive(Debug, Clone)]
struct TrieNode<T> {
    children: HashMap<char, TrieNode<T>>,
    binding: Option<T>,
}

impl<T> TrieNode<T> {
    fn new() -> Self {
        Self {
            children: HashMap::new(),
            binding: None,
        }
    }
}

/// A trie keyed by command strings (including the `/` prefix).
#[derive(Debug, Clone)]
pub struct CommandTrie<T> {
    root: TrieNode<T>,
    len: usize,
}

impl<T> Default for CommandTrie<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CommandTrie<T> {
    /// Creates an empty trie.
    pub fn new() -> Self {
        Self {
            root: TrieNode::new(),
            len: 0,
        }
    }

    /// Inserts a command, overwriting any existing binding for it.
    pub fn insert(&mut self, command: &str, binding: T) {
        let mut node = &mut self.root;
        for ch in command.chars() {
            node = node.children.entry(ch).or_insert_with(TrieNode::new);
        }
        if node.binding.is_none() {
            self.len += 1;
        }
        node.binding = Some(binding);
    }

    /// Looks up the binding for an exact command.
    ///
    /// An absent edge or a present-but-non-terminal node is a miss: prefixes
    /// of registered commands do not match.
    pub fn get(&self, command: &str) -> Option<&T> {
        let mut node = &self.root;
        for ch in command.chars() {
            node = node.children.get(&ch)?;
        }
        node.binding.as_ref()
    }

    /// Number of distinct commands stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no commands are stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
