use std::thread::{self, JoinHandle};

/// Joins the wrapped thread when dropped.
pub struct JoinOnDrop<T> {
    handle: Option<JoinHandle<T>>,
}

impl<T> JoinOnDrop<T> {
    pub fn new(handle: JoinHandle<T>) -> Self {
        Self {
            handle: Some(handle),
        }
    }
}

impl<T> Drop for JoinOnDrop<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            // A thread can end up dropping its own handle when it tears down the structure that
            // owns it; joining there would deadlock
            if handle.thread().id() != thread::current().id() {
                drop(handle.join());
            }
        }
    }
}
