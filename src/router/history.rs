/// The browsing environment a [`Router`](super::Router) drives.
///
/// Implementations own the current location hash and its history. Each
/// mutating call reports whether the hash actually changed, which is when a
/// real browser would fire a hash-change notification.
pub trait History: Send {
    /// Current hash, with or without a leading `#`.
    fn hash(&self) -> String;

    /// Add a history entry for `path`.
    fn push(&mut self, path: &str) -> bool;

    /// Change the current entry to `path` without adding a new one.
    fn replace(&mut self, path: &str) -> bool;

    fn back(&mut self) -> bool;

    fn forward(&mut self) -> bool;
}

/// Strip a leading `#`; an empty hash means `/`.
pub fn normalize_path(raw: &str) -> String {
    let path = raw.strip_prefix('#').unwrap_or(raw);
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

/// In-process history stack.
#[derive(Debug, Clone)]
pub struct MemoryHistory {
    entries: Vec<String>,
    index: usize,
}

impl MemoryHistory {
    /// History with a single empty entry.
    pub fn new() -> Self {
        Self::starting_at("")
    }

    pub fn starting_at(hash: &str) -> Self {
        Self {
            entries: vec![strip_hash(hash).to_string()],
            index: 0,
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn position(&self) -> usize {
        self.index
    }

    fn current(&self) -> &str {
        &self.entries[self.index]
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_hash(path: &str) -> &str {
    path.strip_prefix('#').unwrap_or(path)
}

impl History for MemoryHistory {
    fn hash(&self) -> String {
        self.current().to_string()
    }

    fn push(&mut self, path: &str) -> bool {
        let path = strip_hash(path);
        if self.current() == path {
            return false;
        }
        self.entries.truncate(self.index + 1);
        self.entries.push(path.to_string());
        self.index += 1;
        true
    }

    fn replace(&mut self, path: &str) -> bool {
        let path = strip_hash(path);
        if self.current() == path {
            return false;
        }
        self.entries[self.index] = path.to_string();
        true
    }

    fn back(&mut self) -> bool {
        if self.index == 0 {
            return false;
        }
        let before = self.index;
        self.index -= 1;
        self.entries[before] != self.entries[self.index]
    }

    fn forward(&mut self) -> bool {
        if self.index + 1 >= self.entries.len() {
            return false;
        }
        let before = self.index;
        self.index += 1;
        self.entries[before] != self.entries[self.index]
    }
}
