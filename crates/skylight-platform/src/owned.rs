use std::fmt;

/// A raw handle paired with its release function.
///
/// Moved, never copied; the release closure runs exactly once, when the
/// wrapper goes out of scope.
pub struct Owned<T: Copy> {
    raw: T,
    release: Option<Box<dyn FnOnce(T)>>,
}

impl<T: Copy> Owned<T> {
    pub fn new(raw: T, release: impl FnOnce(T) + 'static) -> Self {
        Self {
            raw,
            release: Some(Box::new(release)),
        }
    }

    pub fn raw(&self) -> T {
        self.raw
    }
}

impl<T: Copy> Drop for Owned<T> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(self.raw);
        }
    }
}

impl<T: Copy + fmt::Debug> fmt::Debug for Owned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Owned").field(&self.raw).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn release_runs_exactly_once_on_drop() {
        let released = Rc::new(Cell::new(0u32));
        {
            let counter = released.clone();
            let owned = Owned::new(7u64, move |raw| {
                assert_eq!(raw, 7);
                counter.set(counter.get() + 1);
            });
            assert_eq!(owned.raw(), 7);
        }
        assert_eq!(released.get(), 1);
    }
}
