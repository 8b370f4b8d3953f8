//! A single-assignment deferred value with success and failure observers.
//!
//! A [`Deferred`] starts out pending and is settled exactly once by its
//! producer, either with [`resolve`](Deferred::resolve) or with
//! [`reject`](Deferred::reject). Observers registered before settlement run
//! in registration order when it happens; observers registered after run
//! immediately. [`Deferred::to_awaitable`] turns it into a [`Future`].
//!
//! # Examples
//!
//! ```
//! use deferred::Deferred;
//! use futures::executor::block_on;
//! use std::thread;
//!
//! let person = Deferred::<(u32, String), String>::new();
//! let producer = person.clone();
//! let task1 = thread::spawn(move || {
//!     producer.resolve((10, "Marcus Aurelius".into())).unwrap();
//! });
//!
//! let value = block_on(person.to_awaitable()).unwrap();
//! assert_eq!(value, (10, "Marcus Aurelius".to_string()));
//! task1.join().expect("The task1 thread has panicked.");
//! ```
//!
//! [`Future`]: std::future::Future
mod awaitable;
mod deferred;
mod error;
mod status;

pub use awaitable::Awaitable;
pub use deferred::Deferred;
pub use error::{AwaitError, Error};
pub use status::{SettlePolicy, Status};
