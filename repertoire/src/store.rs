//! Observable state containers.

use std::sync::Arc;

use tokio::sync::watch;

/// A value published to any number of observers.
///
/// Writes are synchronous and visible to every subscriber as soon as they
/// return. Cloning a `Store` yields another handle to the same value.
pub struct Store<T> {
    inner: Arc<watch::Sender<T>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Default> Default for Store<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Store").field(&*self.inner.borrow()).finish()
    }
}

impl<T> Store<T> {
    pub fn new(value: T) -> Self {
        let (tx, _) = watch::channel(value);
        Self { inner: Arc::new(tx) }
    }

    /// Replace the whole value.
    pub fn set(&self, value: T) {
        self.inner.send_replace(value);
    }

    /// Mutate the value in place. Subscribers are notified afterwards.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.inner.send_modify(f);
    }

    /// Borrow the current value for the duration of `f`.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow())
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.inner.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.inner.subscribe()
    }
}
