// Observable values for consumers that react to player state
//
// Every holder keeps only its latest value: a slow observer never sees a
// backlog, it sees whatever was set most recently.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

/// Returned by `changed` once the holder behind an observer has been dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("value holder was dropped")]
pub struct Closed;

/// A typed value that can be set, read and observed from any thread
pub struct LiveValue<T> {
    tx: watch::Sender<T>,
}

impl<T> LiveValue<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Replace the value and notify observers. Works with no observers attached.
    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Modify the value in place and notify observers
    pub fn update<F>(&self, modify: F)
    where
        F: FnOnce(&mut T),
    {
        self.tx.send_modify(modify);
    }

    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> Observer<T> {
        Observer {
            rx: self.tx.subscribe(),
        }
    }

    /// Observe a value derived from this one. Observers of the derived value
    /// are only woken when the derived value actually changes.
    pub fn map<U, F>(&self, map: F) -> MappedObserver<T, U>
    where
        U: Clone + PartialEq,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        MappedObserver::new(self.tx.subscribe(), Arc::new(map))
    }
}

impl<T: fmt::Debug> fmt::Debug for LiveValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LiveValue").field(&*self.tx.borrow()).finish()
    }
}

#[derive(Clone)]
pub struct Observer<T> {
    rx: watch::Receiver<T>,
}

impl<T: Clone> Observer<T> {
    pub fn get(&self) -> T {
        self.rx.borrow().clone()
    }

    /// True if a value was set since this observer last read with `changed`
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Wait for the next value
    pub async fn changed(&mut self) -> Result<T, Closed> {
        self.rx.changed().await.map_err(|_| Closed)?;
        Ok(self.rx.borrow_and_update().clone())
    }
}

type MapFn<T, U> = Arc<dyn Fn(&T) -> U + Send + Sync>;

pub struct MappedObserver<T, U> {
    rx: watch::Receiver<T>,
    map: MapFn<T, U>,
    last: U,
}

impl<T, U> MappedObserver<T, U>
where
    U: Clone + PartialEq,
{
    fn new(rx: watch::Receiver<T>, map: MapFn<T, U>) -> Self {
        let last = map(&rx.borrow());
        Self { rx, map, last }
    }

    pub fn get(&self) -> U {
        (self.map)(&self.rx.borrow())
    }

    /// Wait until the derived value differs from the one last delivered
    pub async fn changed(&mut self) -> Result<U, Closed> {
        loop {
            self.rx.changed().await.map_err(|_| Closed)?;
            let value = (self.map)(&self.rx.borrow_and_update());
            if value != self.last {
                self.last = value.clone();
                return Ok(value);
            }
        }
    }
}

impl<T, U: Clone> Clone for MappedObserver<T, U> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
            map: Arc::clone(&self.map),
            last: self.last.clone(),
        }
    }
}
