use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Opaque token for a registered clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClipHandle(u64);

impl ClipHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ClipHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "memo-{}", self.0)
    }
}

/// In-memory store for encoded clips.
///
/// Handles are issued once and never reused; `revoke` frees the bytes and is
/// safe to call on an already-revoked handle.
#[derive(Default)]
pub struct ClipRegistry {
    next_id: u64,
    clips: HashMap<ClipHandle, Arc<[u8]>>,
}

impl ClipRegistry {
    pub fn create(&mut self, bytes: Vec<u8>) -> ClipHandle {
        let handle = ClipHandle(self.next_id);
        self.next_id += 1;
        self.clips.insert(handle, bytes.into());
        tracing::debug!("Registered clip {} ({} bytes)", handle, self.len(handle));
        handle
    }

    pub fn get(&self, handle: ClipHandle) -> Option<Arc<[u8]>> {
        self.clips.get(&handle).cloned()
    }

    pub fn revoke(&mut self, handle: ClipHandle) {
        if self.clips.remove(&handle).is_some() {
            tracing::debug!("Revoked clip {}", handle);
        }
    }

    fn len(&self, handle: ClipHandle) -> usize {
        self.clips.get(&handle).map_or(0, |b| b.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_get() {
        let mut registry = ClipRegistry::default();
        let handle = registry.create(vec![1, 2, 3]);
        assert_eq!(registry.get(handle).unwrap().as_ref(), &[1, 2, 3]);
    }

    #[test]
    fn handles_are_distinct() {
        let mut registry = ClipRegistry::default();
        let a = registry.create(vec![1]);
        let b = registry.create(vec![2]);
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "memo-0");
        assert_eq!(b.to_string(), "memo-1");
    }

    #[test]
    fn revoke_frees_and_is_idempotent() {
        let mut registry = ClipRegistry::default();
        let handle = registry.create(vec![1, 2, 3]);
        registry.revoke(handle);
        assert!(registry.get(handle).is_none());
        registry.revoke(handle);
        assert!(registry.get(handle).is_none());
    }
}
