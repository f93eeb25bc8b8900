use super::heap::Heap;
use std::{
    cell::RefCell,
    io::{self, Write},
};

/// Where `print`/`println` send their text during a run.
#[derive(Debug)]
pub enum Output {
    Stdout,
    Buffer(Vec<u8>),
}

impl Output {
    fn write_str(&mut self, text: &str) {
        match self {
            Output::Stdout => {
                let mut out = io::stdout().lock();
                if let Err(err) = out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
                    log::warn!("failed to write program output: {err}");
                }
            }
            Output::Buffer(buf) => buf.extend_from_slice(text.as_bytes()),
        }
    }

    pub fn into_string(self) -> String {
        match self {
            Output::Stdout => String::new(),
            Output::Buffer(buf) => String::from_utf8_lossy(&buf).into_owned(),
        }
    }
}

#[derive(Debug)]
struct Session {
    heap: Heap,
    output: Output,
}

thread_local! {
    static ACTIVE: RefCell<Option<Session>> = const { RefCell::new(None) };
}

/// Run `f` with a fresh heap and `output` installed for the native symbols.
/// The heap is released when `f` returns; the output sink is handed back.
pub fn scoped<T>(output: Output, f: impl FnOnce() -> T) -> (T, Output) {
    let session = Session {
        heap: Heap::new(),
        output,
    };
    let previous = ACTIVE.with(|active| active.replace(Some(session)));
    let result = f();
    let finished = ACTIVE.with(|active| active.replace(previous));
    let output = match finished {
        Some(session) => {
            log::debug!(
                "run released {} heap blocks ({} bytes)",
                session.heap.block_count(),
                session.heap.bytes_allocated()
            );
            session.output
        }
        None => Output::Stdout,
    };
    (result, output)
}

/// Borrow the active heap, if a run is in progress.
pub fn with_heap<T>(f: impl FnOnce(&mut Heap) -> T) -> Option<T> {
    ACTIVE.with(|active| active.borrow_mut().as_mut().map(|session| f(&mut session.heap)))
}

pub(crate) fn allocate(size: u64) -> *mut u8 {
    match with_heap(|heap| heap.allocate(size)) {
        Some(ptr) => ptr,
        None => {
            log::error!("allocation of {size} bytes requested outside a running program");
            std::process::abort()
        }
    }
}

pub(crate) fn write(text: &str) {
    ACTIVE.with(|active| match active.borrow_mut().as_mut() {
        Some(session) => session.output.write_str(text),
        None => Output::Stdout.write_str(text),
    });
}
