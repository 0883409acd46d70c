//! Level-structured breadth-first frontier.
//!
//! One value owns the whole crawl state: the current level, the next
//! level, and the visited set. URLs are marked visited the moment they are
//! enqueued, so two pages in the same level discovering the same link can
//! never enqueue it twice. Within a level, order is insertion order of
//! discovery; first-discovered wins.

use std::collections::HashSet;

#[derive(Debug)]
pub struct Frontier {
    visited: HashSet<String>,
    current: Vec<String>,
    next: Vec<String>,
    depth: usize,
}

impl Frontier {
    /// Start a frontier holding exactly the start URL at depth 0.
    pub fn seeded(start_url: &str) -> Self {
        Self {
            visited: HashSet::from([start_url.to_string()]),
            current: vec![start_url.to_string()],
            next: Vec::new(),
            depth: 0,
        }
    }

    /// Depth of the level currently being served.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Canonical URLs ever enqueued. Monotonically grows; never shrinks.
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// URLs discovered but not yet handed out.
    pub fn pending(&self) -> usize {
        self.current.len() + self.next.len()
    }

    /// Enqueue a novel URL for the next level. Duplicates (anything already
    /// visited or enqueued) are silently dropped; returns whether the URL
    /// was actually added.
    pub fn enqueue_next(&mut self, url: &str) -> bool {
        if self.visited.contains(url) {
            return false;
        }
        self.visited.insert(url.to_string());
        self.next.push(url.to_string());
        true
    }

    /// Take the full batch for the current minimum depth. When the current
    /// level is exhausted, the next level is promoted and the depth
    /// advances. Returns an empty batch once nothing is pending.
    pub fn take_level(&mut self) -> Vec<String> {
        if self.current.is_empty() && !self.next.is_empty() {
            self.current = std::mem::take(&mut self.next);
            self.depth += 1;
        }
        std::mem::take(&mut self.current)
    }

    /// Put back URLs from a level that was truncated (budget cutoff).
    /// They stay enqueued-but-not-dequeued for accounting purposes.
    pub fn restore_level(&mut self, urls: Vec<String>) {
        self.current = urls;
    }
}
