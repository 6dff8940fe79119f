//! Observable value cells
//!
//! A thin wrapper over `tokio::sync::watch` giving the single-writer,
//! many-reader publish/subscribe cell the session is built on. Readers take a
//! snapshot with [`Observable::get`] or await changes through a
//! [`watch::Receiver`]; writers replace the value wholesale.

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug)]
pub struct Observable<T> {
    sender: Arc<watch::Sender<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
        }
    }
}

impl<T: Clone + Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone> Observable<T> {
    pub fn new(value: T) -> Self {
        let (sender, _receiver) = watch::channel(value);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Snapshot of the current value
    pub fn get(&self) -> T {
        self.sender.borrow().clone()
    }

    /// Replace the value and notify subscribers, returning the previous value
    pub fn set(&self, value: T) -> T {
        self.sender.send_replace(value)
    }

    /// Subscribe to future changes
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.sender.subscribe()
    }

    /// Run `f` against the current value without cloning it
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.sender.borrow())
    }
}

impl<T: Clone + PartialEq> Observable<T> {
    /// Replace the value only if it differs; returns whether subscribers were notified
    pub fn set_if_changed(&self, value: T) -> bool {
        self.sender.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_returns_previous_value() {
        let cell = Observable::new(1u32);
        assert_eq!(cell.set(2), 1);
        assert_eq!(cell.get(), 2);
    }

    #[test]
    fn test_set_if_changed_skips_equal_values() {
        let cell = Observable::new("a".to_string());
        let mut receiver = cell.subscribe();
        assert!(!cell.set_if_changed("a".to_string()));
        assert!(!receiver.has_changed().unwrap());
        assert!(cell.set_if_changed("b".to_string()));
        assert!(receiver.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_subscriber_sees_update() {
        let cell = Observable::new(0u8);
        let mut receiver = cell.subscribe();
        let writer = cell.clone();
        tokio::spawn(async move {
            writer.set(7);
        });
        receiver.changed().await.unwrap();
        assert_eq!(*receiver.borrow(), 7);
    }
}
