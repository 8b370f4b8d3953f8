//! Bridges a [`Deferred`] into a [`Future`] so it can be `.await`ed.
//!
//! The awaitable never keeps the deferred alive. It registers one success
//! and one failure observer that share a [`Completer`], and the first of them
//! to run fills the slot the future polls.
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use log::trace;

use crate::deferred::WeakDeferred;
use crate::{AwaitError, Deferred};

/// Future returned by [`Deferred::to_awaitable`].
///
/// Resolves to `Ok(value)` or `Err(AwaitError::Rejected(err))`. If every
/// handle to the deferred is dropped before it settles, resolves to
/// `Err(AwaitError::Dropped)`.
///
/// # Examples
///
/// ```
/// use deferred::{AwaitError, Deferred};
/// use futures::executor::block_on;
/// use std::thread;
///
/// let d = Deferred::<String, String>::new();
/// let waiter = d.to_awaitable();
/// let task1 = thread::spawn(move || block_on(waiter));
/// d.reject("Person is not found".into()).unwrap();
/// let outcome = task1.join().expect("The task1 thread has panicked.");
/// assert_eq!(outcome, Err(AwaitError::Rejected("Person is not found".into())));
/// ```
pub struct Awaitable<T, E> {
    slot: Arc<Mutex<Slot<T, E>>>,
}

struct Slot<T, E> {
    outcome: Outcome<T, E>,
    waker: Option<Waker>,
}

enum Outcome<T, E> {
    Waiting,
    Ready(Result<T, AwaitError<E>>),
    Taken,
}

fn lock<T, E>(slot: &Mutex<Slot<T, E>>) -> MutexGuard<'_, Slot<T, E>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fills the slot once. Dropping it unfired means its observer was
/// discarded, so the stored outcome decides what the slot gets.
struct Completer<T: Clone, E: Clone> {
    slot: Arc<Mutex<Slot<T, E>>>,
    deferred: WeakDeferred<T, E>,
}

impl<T: Clone, E: Clone> Completer<T, E> {
    fn complete(&self, outcome: Result<T, AwaitError<E>>) {
        let waker = {
            let mut slot = lock(&self.slot);
            if !matches!(slot.outcome, Outcome::Waiting) {
                return;
            }
            slot.outcome = Outcome::Ready(outcome);
            slot.waker.take()
        };
        if let Some(waker) = waker {
            trace!("waking awaitable");
            waker.wake()
        }
    }
}

impl<T: Clone, E: Clone> Drop for Completer<T, E> {
    fn drop(&mut self) {
        if !matches!(lock(&self.slot).outcome, Outcome::Waiting) {
            return;
        }
        // A panicking observer drops the ones queued after it even though the
        // deferred has settled.
        let outcome = match self.deferred.outcome() {
            Some(Ok(value)) => Ok(T::clone(&value)),
            Some(Err(err)) => Err(AwaitError::Rejected(E::clone(&err))),
            None => Err(AwaitError::Dropped),
        };
        self.complete(outcome);
    }
}

impl<T, E> Deferred<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Returns a future that completes when this deferred settles.
    ///
    /// Works the same whether the deferred has already settled or not, and
    /// each call gives an independent future.
    pub fn to_awaitable(&self) -> Awaitable<T, E> {
        let slot = Arc::new(Mutex::new(Slot {
            outcome: Outcome::Waiting,
            waker: None,
        }));
        let on_done = Arc::new(Completer {
            slot: slot.clone(),
            deferred: self.downgrade(),
        });
        let on_fail = on_done.clone();
        self.on_success(move |value| on_done.complete(Ok(value.clone())))
            .on_failure(move |err| on_fail.complete(Err(AwaitError::Rejected(err.clone()))));
        Awaitable { slot }
    }
}

impl<T, E> Future for Awaitable<T, E> {
    type Output = Result<T, AwaitError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = lock(&self.slot);
        match std::mem::replace(&mut slot.outcome, Outcome::Taken) {
            Outcome::Ready(outcome) => Poll::Ready(outcome),
            Outcome::Waiting => {
                slot.outcome = Outcome::Waiting;
                slot.waker = Some(cx.waker().clone());
                Poll::Pending
            }
            Outcome::Taken => panic!("`Awaitable` polled after completion"),
        }
    }
}

#[cfg(test)]
mod tests {
use futures::executor::block_on;
use futures::FutureExt;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use crate::{AwaitError, Deferred};

#[test]
fn test_awaitable_after_resolve() {
    let d = Deferred::<String, ()>::new();
    d.resolve("Mao Zedong".into()).unwrap();
    assert_eq!(block_on(d.to_awaitable()), Ok("Mao Zedong".to_string()));
}

#[test]
fn test_awaitable_after_reject() {
    let d = Deferred::<(), String>::new();
    d.reject("💥".into()).unwrap();
    assert_eq!(block_on(d.to_awaitable()), Err(AwaitError::Rejected("💥".to_string())));
}

#[test]
fn test_awaitable_before_resolve() {
    let d = Deferred::<String, String>::new();
    let op_a = d.to_awaitable();
    let op_b = d.to_awaitable();
    let task1 = thread::spawn(move || block_on(op_a));
    let task2 = thread::spawn(move || block_on(op_b));
    let task3 = thread::spawn(move || {
        d.resolve(String::from("🍓")).unwrap();
    });
    task3.join().expect("The task3 thread has panicked");
    assert_eq!(task1.join().expect("The task1 thread has panicked"), Ok("🍓".to_string()));
    assert_eq!(task2.join().expect("The task2 thread has panicked"), Ok("🍓".to_string()));
}

#[test]
fn test_awaitable_pending_until_settled() {
    let d = Deferred::<u32, ()>::new();
    let mut waiter = d.to_awaitable();
    assert!((&mut waiter).now_or_never().is_none());
    d.resolve(3).unwrap();
    assert_eq!(waiter.now_or_never(), Some(Ok(3)));
}

#[test]
fn test_awaitable_dropped_deferred() {
    let d = Deferred::<String, String>::new();
    let op_a = d.to_awaitable();
    let task1 = thread::spawn(move || block_on(op_a));
    let task2 = thread::spawn(move || {
        // Move the deferred here and never settle it.
        std::mem::drop(d);
    });
    task2.join().expect("The task2 thread has panicked");
    assert_eq!(task1.join().expect("The task1 thread has panicked"), Err(AwaitError::Dropped));
}

#[test]
fn test_awaitable_survives_clone_drop() {
    let d = Deferred::<u32, ()>::new();
    let producer = d.clone();
    let waiter = d.to_awaitable();
    drop(d);
    producer.resolve(5).unwrap();
    assert_eq!(block_on(waiter), Ok(5));
}

#[test]
fn test_awaitable_after_observer_panic() {
    let d = Deferred::<u32, ()>::new();
    d.on_success(|_| panic!("observer failed"));
    let waiter = d.to_awaitable();
    let settled = panic::catch_unwind(AssertUnwindSafe(|| d.resolve(7).is_ok()));
    assert!(settled.is_err());
    assert!(d.is_resolved());
    assert_eq!(waiter.now_or_never(), Some(Ok(7)));
}

#[test]
fn test_awaitable_after_failure_observer_panic() {
    let d = Deferred::<(), String>::new();
    d.on_failure(|_| panic!("observer failed"));
    let waiter = d.to_awaitable();
    let settled = panic::catch_unwind(AssertUnwindSafe(|| d.reject("💥".into()).is_ok()));
    assert!(settled.is_err());
    assert_eq!(block_on(waiter), Err(AwaitError::Rejected("💥".to_string())));
}
}
