use std::collections::BTreeMap;

/// Copy-on-write view over a committed map.
///
/// Reads fall through to `base` until a key is written; writes land in a
/// staged map that is either handed back with [`Overlay::into_staged`] or
/// dropped, leaving `base` untouched.
#[derive(Debug)]
pub(crate) struct Overlay<'a, K: Ord, V> {
    base: &'a BTreeMap<K, V>,
    staged: BTreeMap<K, V>,
}

impl<'a, K: Ord + Clone, V: Clone> Overlay<'a, K, V> {
    pub(crate) fn new(base: &'a BTreeMap<K, V>) -> Self {
        Self {
            base,
            staged: BTreeMap::new(),
        }
    }

    pub(crate) fn get(&self, key: &K) -> Option<&V> {
        self.staged.get(key).or_else(|| self.base.get(key))
    }

    pub(crate) fn contains_key(&self, key: &K) -> bool {
        self.staged.contains_key(key) || self.base.contains_key(key)
    }

    pub(crate) fn insert(&mut self, key: K, value: V) {
        self.staged.insert(key, value);
    }

    /// Mutable access, copying the committed value into the stage on first touch.
    pub(crate) fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        if !self.staged.contains_key(key) {
            let committed = self.base.get(key)?.clone();
            self.staged.insert(key.clone(), committed);
        }
        self.staged.get_mut(key)
    }

    pub(crate) fn into_staged(self) -> BTreeMap<K, V> {
        self.staged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_do_not_reach_base() {
        let mut base = BTreeMap::new();
        base.insert("a", 1);
        let mut overlay = Overlay::new(&base);
        *overlay.get_mut(&"a").unwrap() += 10;
        overlay.insert("b", 2);

        assert_eq!(overlay.get(&"a"), Some(&11));
        assert!(overlay.contains_key(&"b"));
        assert_eq!(base.get(&"a"), Some(&1));

        let staged = overlay.into_staged();
        assert_eq!(staged.len(), 2);
    }

    #[test]
    fn get_mut_on_missing_key_stages_nothing() {
        let base: BTreeMap<&str, i32> = BTreeMap::new();
        let mut overlay = Overlay::new(&base);
        assert!(overlay.get_mut(&"x").is_none());
        assert!(overlay.into_staged().is_empty());
    }
}
