//! Host test helpers: a blocking executor for the async seams and a
//! recording radio.

extern crate std;

use core::future::Future;
use core::pin::pin;
use core::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};
use std::collections::VecDeque;
use std::vec::Vec;

use crate::error::RadioError;
use crate::protocol::radio::{RadioLink, Received};
use crate::protocol::wire::Frame;

/// Run a future that never waits on real I/O.
pub fn block_on<F: Future>(f: F) -> F::Output {
    fn noop_raw_waker() -> RawWaker {
        fn noop(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            noop_raw_waker()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
        RawWaker::new(core::ptr::null(), &VTABLE)
    }

    // SAFETY: the vtable functions ignore the data pointer.
    let waker = unsafe { Waker::from_raw(noop_raw_waker()) };
    let mut cx = Context::from_waker(&waker);
    let mut f = pin!(f);
    match f.as_mut().poll(&mut cx) {
        Poll::Ready(out) => out,
        Poll::Pending => panic!("mock future returned Pending"),
    }
}

/// Radio that records sent frames and replays queued ones.
pub struct MockRadio {
    pub sent: Vec<Vec<u8>>,
    pub inbox: VecDeque<Vec<u8>>,
    pub fail_sends: bool,
    pub rssi: i16,
}

impl MockRadio {
    pub fn new() -> Self {
        Self {
            sent: Vec::new(),
            inbox: VecDeque::new(),
            fail_sends: false,
            rssi: -60,
        }
    }

    /// Every sent frame, decoded.
    pub fn decoded(&self) -> Vec<Frame> {
        self.sent
            .iter()
            .map(|raw| Frame::decode(raw).expect("sent frame decodes"))
            .collect()
    }
}

impl RadioLink for MockRadio {
    async fn send(&mut self, frame: &[u8]) -> Result<u32, RadioError> {
        if self.fail_sends {
            return Err(RadioError::Bus);
        }
        self.sent.push(frame.to_vec());
        Ok(1_500)
    }

    async fn receive(&mut self, buf: &mut [u8]) -> Result<Received, RadioError> {
        let frame = self.inbox.pop_front().ok_or(RadioError::Timeout)?;
        buf[..frame.len()].copy_from_slice(&frame);
        Ok(Received {
            len: frame.len(),
            rssi: self.rssi,
        })
    }

    fn last_rssi(&self) -> i16 {
        self.rssi
    }
}
