//! Backoff sleeping abstraction for testability

use std::time::Duration;

/// Delay before retry number `attempt + 1` (1s, 2s, 4s, ...)
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt))
}

/// Blocks the current thread between attempts
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Default implementation using `std::thread::sleep`
#[derive(Debug, Clone, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Sleeper recording requested delays instead of sleeping
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    pub struct RecordingSleeper {
        pub delays: Arc<Mutex<Vec<Duration>>>,
    }

    impl RecordingSleeper {
        pub fn new() -> Self {
            Self::default()
        }

        /// Recorded delays in whole seconds
        pub fn delays_secs(&self) -> Vec<u64> {
            self.delays.lock().unwrap().iter().map(|d| d.as_secs()).collect()
        }
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.delays.lock().unwrap().push(duration);
        }
    }
}
