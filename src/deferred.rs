use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::{debug, trace, warn};

use crate::{Error, SettlePolicy, Status};

type Observer<A> = Box<dyn FnOnce(&A) + Send>;

/// A value that becomes available exactly once, either as a `T` through
/// [`resolve`](Deferred::resolve) or as an `E` through
/// [`reject`](Deferred::reject).
///
/// Handles are cheap to clone and all clones share the same state, so the
/// producer can keep one to settle it while consumers hold others to
/// subscribe.
///
/// # Examples
///
/// ```
/// use deferred::Deferred;
/// use std::sync::{Arc, Mutex};
///
/// let seen = Arc::new(Mutex::new(vec![]));
/// let d = Deferred::<u32, String>::new();
///
/// let early = seen.clone();
/// d.on_success(move |v| early.lock().unwrap().push(*v));
/// d.resolve(42).unwrap();
///
/// // Late observers run right away with the stored value.
/// let late = seen.clone();
/// d.on_success(move |v| late.lock().unwrap().push(*v + 1));
///
/// assert!(d.is_resolved());
/// assert_eq!(*seen.lock().unwrap(), vec![42, 43]);
/// ```
pub struct Deferred<T, E> {
    promise: Arc<Mutex<Inner<T, E>>>,
    policy: SettlePolicy,
}

struct Inner<T, E> {
    state: State<T, E>,
    done: Vec<Observer<T>>,
    fail: Vec<Observer<E>>,
}

// Payloads sit behind `Arc` so observers can run after the lock is released.
enum State<T, E> {
    Pending,
    Resolved(Arc<T>),
    Rejected(Arc<E>),
}

impl<T, E> State<T, E> {
    fn status(&self) -> Status {
        match self {
            State::Pending => Status::Pending,
            State::Resolved(_) => Status::Resolved,
            State::Rejected(_) => Status::Rejected,
        }
    }

    fn value(&self) -> Option<Arc<T>> {
        match self {
            State::Resolved(value) => Some(value.clone()),
            _ => None,
        }
    }

    fn error(&self) -> Option<Arc<E>> {
        match self {
            State::Rejected(err) => Some(err.clone()),
            _ => None,
        }
    }
}

impl<T, E> Deferred<T, E> {
    pub fn new() -> Self {
        Self::with_policy(SettlePolicy::default())
    }

    /// Creates a pending deferred whose second settlement follows `policy`.
    pub fn with_policy(policy: SettlePolicy) -> Self {
        Self {
            promise: Arc::new(Mutex::new(Inner {
                state: State::Pending,
                done: vec![],
                fail: vec![],
            })),
            policy,
        }
    }

    /// Creates a pending deferred with one success and one failure observer
    /// already registered.
    ///
    /// Uses the default [`SettlePolicy`]. For another policy, build it with
    /// [`with_policy`](Self::with_policy) and register the observers on it.
    pub fn with_observers<D, F>(on_done: D, on_fail: F) -> Self
    where
        D: FnOnce(&T) + Send + 'static,
        F: FnOnce(&E) + Send + 'static,
    {
        let deferred = Self::new();
        deferred.on_success(on_done).on_failure(on_fail);
        deferred
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T, E>> {
        // Observers never run under the lock, so a poisoned lock still
        // holds a consistent state.
        self.promise.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> Status {
        self.lock().state.status()
    }

    pub fn policy(&self) -> SettlePolicy {
        self.policy
    }

    pub fn is_pending(&self) -> bool {
        self.status() == Status::Pending
    }

    pub fn is_resolved(&self) -> bool {
        self.status() == Status::Resolved
    }

    pub fn is_rejected(&self) -> bool {
        self.status() == Status::Rejected
    }

    /// The resolved value, if there is one.
    pub fn value(&self) -> Option<Arc<T>> {
        self.lock().state.value()
    }

    /// The rejection, if there is one.
    pub fn error(&self) -> Option<Arc<E>> {
        self.lock().state.error()
    }

    /// Registers `observer` to run once when this deferred resolves.
    ///
    /// If it is already resolved, `observer` runs before this returns. If it
    /// was rejected, `observer` is dropped without running.
    pub fn on_success<F>(&self, observer: F) -> &Self
    where
        F: FnOnce(&T) + Send + 'static,
    {
        let mut promise = self.lock();
        if matches!(promise.state, State::Pending) {
            promise.done.push(Box::new(observer));
            trace!("success observer #{} registered", promise.done.len());
            return self;
        }
        let value = promise.state.value();
        drop(promise);
        if let Some(value) = value {
            trace!("deferred already resolved, running success observer now");
            observer(&value);
        }
        self
    }

    /// Registers `observer` to run once when this deferred is rejected.
    ///
    /// Mirrors [`on_success`](Self::on_success).
    pub fn on_failure<F>(&self, observer: F) -> &Self
    where
        F: FnOnce(&E) + Send + 'static,
    {
        let mut promise = self.lock();
        if matches!(promise.state, State::Pending) {
            promise.fail.push(Box::new(observer));
            trace!("failure observer #{} registered", promise.fail.len());
            return self;
        }
        let err = promise.state.error();
        drop(promise);
        if let Some(err) = err {
            trace!("deferred already rejected, running failure observer now");
            observer(&err);
        }
        self
    }

    /// Settles this deferred with `value` and runs the success observers in
    /// the order they were registered.
    ///
    /// An observer that panics unwinds out of this call. The deferred stays
    /// resolved and the observers after it are dropped.
    pub fn resolve(&self, value: T) -> Result<&Self, Error> {
        let value = Arc::new(value);
        let (done, fail) = {
            let mut promise = self.lock();
            let status = promise.state.status();
            if status.is_settled() {
                drop(promise);
                return self.settle_again(status);
            }
            promise.state = State::Resolved(value.clone());
            (
                std::mem::take(&mut promise.done),
                std::mem::take(&mut promise.fail),
            )
        };
        drop(fail);
        debug!("deferred resolved, notifying {} observer(s)", done.len());
        for observer in done {
            observer(&value);
        }
        Ok(self)
    }

    /// Settles this deferred with `err` and runs the failure observers in
    /// the order they were registered.
    pub fn reject(&self, err: E) -> Result<&Self, Error> {
        let err = Arc::new(err);
        let (done, fail) = {
            let mut promise = self.lock();
            let status = promise.state.status();
            if status.is_settled() {
                drop(promise);
                return self.settle_again(status);
            }
            promise.state = State::Rejected(err.clone());
            (
                std::mem::take(&mut promise.done),
                std::mem::take(&mut promise.fail),
            )
        };
        drop(done);
        debug!("deferred rejected, notifying {} observer(s)", fail.len());
        for observer in fail {
            observer(&err);
        }
        Ok(self)
    }

    fn settle_again(&self, status: Status) -> Result<&Self, Error> {
        match self.policy {
            SettlePolicy::Strict => {
                warn!("refusing to settle a deferred that is already {}", status);
                Err(Error::InvalidState { status })
            }
            SettlePolicy::Lenient => {
                debug!("ignoring settlement of a deferred that is already {}", status);
                Ok(self)
            }
        }
    }
}

/// Non-owning handle that reads the outcome without keeping the deferred
/// alive.
pub(crate) struct WeakDeferred<T, E> {
    promise: Weak<Mutex<Inner<T, E>>>,
}

impl<T, E> Deferred<T, E> {
    pub(crate) fn downgrade(&self) -> WeakDeferred<T, E> {
        WeakDeferred {
            promise: Arc::downgrade(&self.promise),
        }
    }
}

impl<T, E> WeakDeferred<T, E> {
    /// `None` while pending or once every handle is gone.
    pub(crate) fn outcome(&self) -> Option<Result<Arc<T>, Arc<E>>> {
        let promise = self.promise.upgrade()?;
        let inner = promise.lock().unwrap_or_else(PoisonError::into_inner);
        let outcome = match &inner.state {
            State::Pending => None,
            State::Resolved(value) => Some(Ok(value.clone())),
            State::Rejected(err) => Some(Err(err.clone())),
        };
        drop(inner);
        outcome
    }
}

impl<T, E> Default for Deferred<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
            policy: self.policy,
        }
    }
}

impl<T, E> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let promise = self.lock();
        f.debug_struct("Deferred")
            .field("status", &promise.state.status())
            .field("policy", &self.policy)
            .field("done", &promise.done.len())
            .field("fail", &promise.fail.len())
            .finish()
    }
}
