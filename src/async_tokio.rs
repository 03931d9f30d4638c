// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Wrapper for asynchronous programming using Tokio.
//!
//! Reads block until the controller raises data-ready, so every call runs
//! on Tokio's blocking pool. Dropping a pending future does not release the
//! reader parked on its behalf; call [`AsyncHandle::cancel_read`] for that.

use std::io;

use futures::stream::{self, Stream};
use tokio::task::{self, JoinError};

use crate::device::Handle;
use crate::errors::{Error, Result};
use crate::hal::Hardware;
use crate::power::PowerState;
use crate::transfer::{Frame, MAX_TRANSFER_SIZE};

pub struct AsyncHandle<H: Hardware> {
    inner: Handle<H>,
}

impl<H: Hardware> Clone for AsyncHandle<H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

fn join_failed(err: JoinError) -> Error {
    Error::Io(io::Error::new(io::ErrorKind::Other, err))
}

async fn blocking<H, T, F>(handle: Handle<H>, f: F) -> Result<T>
where
    H: Hardware,
    T: Send + 'static,
    F: FnOnce(&Handle<H>) -> Result<T> + Send + 'static,
{
    task::spawn_blocking(move || f(&handle))
        .await
        .map_err(join_failed)?
}

fn read_at_most<H: Hardware>(handle: &Handle<H>, max_len: usize) -> Result<Frame> {
    let mut buf = [0u8; MAX_TRANSFER_SIZE];
    let len = max_len.min(MAX_TRANSFER_SIZE);
    let n = handle.read(&mut buf[..len])?;
    Ok(buf[..n].iter().copied().collect())
}

impl<H: Hardware> AsyncHandle<H> {
    pub fn new(handle: Handle<H>) -> Self {
        Self { inner: handle }
    }

    pub fn into_inner(self) -> Handle<H> {
        self.inner
    }

    pub async fn read_frame(&self) -> Result<Frame> {
        blocking(self.inner.clone(), Handle::read_frame).await
    }

    pub async fn write(&self, bytes: &[u8]) -> Result<usize> {
        let bytes = bytes.to_vec();
        blocking(self.inner.clone(), move |h| h.write(&bytes)).await
    }

    pub async fn control(&self, cmd: u32, arg: u64) -> Result<()> {
        blocking(self.inner.clone(), move |h| h.control(cmd, arg)).await
    }

    /// Power transitions sleep for their settling holds, so they also run
    /// on the blocking pool.
    pub async fn set_power(&self, target: PowerState) -> Result<()> {
        blocking(self.inner.clone(), move |h| h.set_power(target)).await
    }

    pub fn cancel_read(&self) {
        self.inner.cancel_read();
    }

    /// A stream of received messages of up to `max_len` bytes.
    ///
    /// The stream ends when a read is cancelled, and after yielding
    /// [`Error::Detached`]. Other errors are yielded and reading continues.
    pub fn frames(&self, max_len: usize) -> impl Stream<Item = Result<Frame>> + Send + 'static {
        stream::unfold(Some(self.inner.clone()), move |handle| async move {
            let handle = handle?;
            let next = blocking(handle.clone(), move |h| read_at_most(h, max_len)).await;
            match next {
                Err(Error::Cancelled) => None,
                Err(Error::Detached) => Some((Err(Error::Detached), None)),
                other => Some((other, Some(handle))),
            }
        })
    }
}
