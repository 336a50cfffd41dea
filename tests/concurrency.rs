//! Concurrent access through one attached device

use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use embedded_hal::delay::DelayNs;
use lcdi2c::{Attribute, Builder, Device, DisplayInterface, Interrupt, Request};

/// Records every expander byte together with the thread that sent it
#[derive(Clone, Debug, Default)]
struct TaggedRecorder {
    log: Arc<Mutex<Vec<(ThreadId, u8)>>>,
}

impl DisplayInterface for TaggedRecorder {
    type Error = core::convert::Infallible;

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.log
            .lock()
            .unwrap()
            .push((thread::current().id(), byte));
        // Widen the window for another thread to sneak in
        thread::yield_now();
        Ok(())
    }
}

struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Bytes of one `write_char`: a DDRAM command and a data byte, each two
/// nibbles of three expander writes
const BYTES_PER_CHAR: usize = 2 * 2 * 3;

fn attach() -> (Device<TaggedRecorder, NoDelay>, TaggedRecorder) {
    let recorder = TaggedRecorder::default();
    let config = Builder::new().build().unwrap();
    let device = Device::attach(recorder.clone(), NoDelay, &config).unwrap();
    recorder.log.lock().unwrap().clear();
    (device, recorder)
}

/// Split the log into runs of bytes sent by the same thread
fn runs(log: &[(ThreadId, u8)]) -> Vec<(ThreadId, usize)> {
    let mut runs: Vec<(ThreadId, usize)> = Vec::new();
    for &(thread, _) in log {
        match runs.last_mut() {
            Some((last, len)) if *last == thread => *len += 1,
            _ => runs.push((thread, 1)),
        }
    }
    runs
}

#[test]
fn test_concurrent_writes_do_not_interleave() {
    let (device, recorder) = attach();
    let texts: [&[u8]; 4] = [b"aaaa", b"bbbb", b"cccc", b"dddd"];

    thread::scope(|scope| {
        for text in texts {
            let device = &device;
            scope.spawn(move || {
                let mut session = device.open(Interrupt::new()).unwrap();
                for _ in 0..10 {
                    session.write(text).unwrap();
                }
            });
        }
    });

    let log = recorder.log.lock().unwrap();
    assert_eq!(log.len(), 4 * 10 * 4 * BYTES_PER_CHAR);
    for (_, len) in runs(&log) {
        // A run may hold several whole operations of one thread, never a part
        assert_eq!(len % (4 * BYTES_PER_CHAR), 0);
    }
    assert_eq!(device.open_count(), 0);
}

#[test]
fn test_mixed_adapters_do_not_interleave() {
    let (device, recorder) = attach();
    let interrupt = Interrupt::new();

    thread::scope(|scope| {
        let device = &device;
        let interrupt = &interrupt;
        scope.spawn(move || {
            for _ in 0..20 {
                device.store(Attribute::Data, b"0123456789", interrupt).unwrap();
            }
        });
        scope.spawn(move || {
            for index in 0..20u8 {
                device
                    .ioctl(
                        Request::SetCustomChar {
                            index: index % 8,
                            bitmap: [index; 8],
                        },
                        interrupt,
                    )
                    .unwrap();
            }
        });
    });

    // Data flush: 32 cells of command plus data, then the cursor restore
    let flush = 32 * BYTES_PER_CHAR + BYTES_PER_CHAR / 2;
    // Glyph upload: CGRAM command plus eight rows
    let glyph = 9 * BYTES_PER_CHAR / 2;

    let log = recorder.log.lock().unwrap();
    assert_eq!(log.len(), 20 * flush + 20 * glyph);
    let writer = log[..]
        .iter()
        .map(|&(thread, _)| thread)
        .collect::<Vec<_>>();
    for (thread, len) in runs(&log) {
        let count = writer.iter().filter(|&&t| t == thread).count();
        let unit = if count == 20 * flush { flush } else { glyph };
        assert_eq!(len % unit, 0, "partial operation of {len} bytes");
    }
}

#[test]
fn test_interrupted_caller_leaves_state_untouched() {
    let (device, recorder) = attach();
    let interrupt = Interrupt::new();
    let held = device.lock(&interrupt).unwrap();

    let aborted = Interrupt::new();
    thread::scope(|scope| {
        let waiter = scope.spawn(|| device.store(Attribute::Clear, b"1", &aborted));
        thread::sleep(std::time::Duration::from_millis(30));
        aborted.raise();
        let result = waiter.join().unwrap();
        assert_eq!(result.unwrap_err().kind(), lcdi2c::ErrorKind::Interrupted);
    });

    drop(held);
    assert!(recorder.log.lock().unwrap().is_empty());
}
