//! Host functions called from generated code.
//!
//! Generated code only sees two `extern "C"` entry points. The output sink
//! and the first fault of a run live in thread-locals, installed around the
//! native call by [`SinkGuard`].

use std::cell::{Cell, RefCell};
use std::io::{self, Write};
use std::marker::PhantomData;

/// Fault raised while native code was running.
#[derive(Debug)]
pub(crate) enum HostFault {
    /// The tape index the routine tried to move to.
    OutOfBounds(u64),
    Output(io::Error),
}

thread_local! {
    static SINK: Cell<Option<*mut (dyn Write + 'static)>> = const { Cell::new(None) };
    static FAULT: RefCell<Option<HostFault>> = const { RefCell::new(None) };
}

/// Routes [`host_put_byte`] to `out` until dropped.
pub(crate) struct SinkGuard<'a> {
    previous: Option<*mut (dyn Write + 'static)>,
    _out: PhantomData<&'a mut dyn Write>,
}

impl<'a> SinkGuard<'a> {
    pub(crate) fn install(out: &'a mut dyn Write) -> Self {
        let ptr: *mut (dyn Write + 'a) = out;
        // SAFETY: the guard borrows `out` for 'a and uninstalls it on drop,
        // so the pointer is never dereferenced after the borrow ends.
        let ptr: *mut (dyn Write + 'static) = unsafe { std::mem::transmute(ptr) };
        let previous = SINK.with(|sink| sink.replace(Some(ptr)));
        FAULT.with(|fault| fault.borrow_mut().take());
        Self {
            previous,
            _out: PhantomData,
        }
    }
}

impl Drop for SinkGuard<'_> {
    fn drop(&mut self) {
        SINK.with(|sink| sink.set(self.previous));
    }
}

fn record_fault(fault: HostFault) {
    FAULT.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_none() {
            *slot = Some(fault);
        }
    });
}

/// First fault recorded since the last [`SinkGuard::install`].
pub(crate) fn take_fault() -> Option<HostFault> {
    FAULT.with(|slot| slot.borrow_mut().take())
}

fn has_fault() -> bool {
    FAULT.with(|slot| slot.borrow().is_some())
}

/// Writes the low byte of `value` to the installed sink.
///
/// After a failed write further output is dropped; the fault is reported
/// once the routine returns.
pub(crate) extern "C" fn host_put_byte(value: u64) {
    if has_fault() {
        return;
    }
    let byte = value as u8;
    let result = SINK.with(|sink| match sink.get() {
        // SAFETY: installed by a live SinkGuard on this thread.
        Some(out) => unsafe { (*out).write_all(&[byte]) },
        None => Err(io::Error::other("no output sink installed")),
    });
    if let Err(err) = result {
        record_fault(HostFault::Output(err));
    }
}

/// Records a bounds fault. The routine returns right after this call.
pub(crate) extern "C" fn host_out_of_bounds(index: u64) {
    log::debug!("native code faulted at tape index {}", index as i64);
    record_fault(HostFault::OutOfBounds(index));
}

pub(crate) fn put_byte_address() -> u64 {
    host_put_byte as extern "C" fn(u64) as usize as u64
}

pub(crate) fn out_of_bounds_address() -> u64 {
    host_out_of_bounds as extern "C" fn(u64) as usize as u64
}
