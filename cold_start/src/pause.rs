use std::{thread, time::Duration};

use log::trace;

/// Timed wait between device commands.
pub trait Pause {
    fn pause(&mut self, duration: Duration);
}

/// Blocks the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&mut self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        trace!("pause for {duration:?}");
        thread::sleep(duration);
    }
}
