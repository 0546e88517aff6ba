//! Observable state container.
//!
//! Every store owns one `StateCell`. Consumers read snapshots or subscribe
//! to a `watch::Receiver`; only the owning store mutates.

use tokio::sync::watch;

pub struct StateCell<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone> StateCell<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Snapshot of the current value.
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Borrow the current value without cloning. Do not hold across `.await`.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.tx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.tx.send_modify(f);
    }

    /// Atomic check-and-set; subscribers are notified only when `f` returns true.
    pub fn update_if(&self, f: impl FnOnce(&mut T) -> bool) -> bool {
        self.tx.send_if_modified(f)
    }
}

impl<T: Clone + Default> Default for StateCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_updates() {
        let cell = StateCell::new(1_u32);
        let mut rx = cell.subscribe();

        cell.update(|value| *value += 1);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 2);
    }

    #[test]
    fn rejected_update_does_not_notify() {
        let cell = StateCell::new(false);
        let rx = cell.subscribe();

        assert!(!cell.update_if(|_| false));
        assert!(!rx.has_changed().unwrap());

        assert!(cell.update_if(|flag| {
            *flag = true;
            true
        }));
        assert!(rx.has_changed().unwrap());
        assert!(cell.get());
    }
}
