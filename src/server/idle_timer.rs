use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

struct Armed {
    cycle: u64,
    deadline: Instant,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct Slot {
    armed: Option<Armed>,
    next_cycle: u64,
}

/// Single-shot, cancellable countdown to idle shutdown.
///
/// Arming an armed timer does nothing: the first arm of an idle period owns
/// the deadline, and only `cancel` followed by `arm` starts a new one.
/// The expiry check and `cancel` take the same lock, so once `cancel`
/// returns, the callback of the cancelled cycle cannot run. On expiry the
/// timer is already unarmed when the callback starts, so the callback may
/// arm it again.
///
/// Requires a Tokio runtime.
pub struct IdleTimer {
    slot: Arc<Mutex<Slot>>,
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl IdleTimer {
    /// Create an unarmed timer
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Start a countdown of `duration` that calls `on_expire` when it runs out.
    ///
    /// Returns `false` without touching the running countdown if one is
    /// already armed.
    pub fn arm<F>(&self, duration: Duration, on_expire: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = lock(&self.slot);
        if slot.armed.is_some() {
            return false;
        }

        let cycle = slot.next_cycle;
        slot.next_cycle += 1;

        let deadline = Instant::now() + duration;
        let shared = Arc::clone(&self.slot);

        let task = tokio::spawn(async move {
            time::sleep_until(deadline).await;

            {
                let mut slot = lock(&shared);
                match &slot.armed {
                    Some(armed) if armed.cycle == cycle => slot.armed = None,
                    _ => return,
                }
            }

            on_expire();
        });

        slot.armed = Some(Armed {
            cycle,
            deadline,
            task,
        });
        true
    }

    /// Disarm the countdown. Returns whether one was armed.
    pub fn cancel(&self) -> bool {
        let taken = lock(&self.slot).armed.take();
        match taken {
            Some(armed) => {
                armed.task.abort();
                true
            }
            None => false,
        }
    }

    /// Whether a countdown is running
    pub fn is_armed(&self) -> bool {
        lock(&self.slot).armed.is_some()
    }

    /// When the running countdown expires
    pub fn deadline(&self) -> Option<Instant> {
        lock(&self.slot).armed.as_ref().map(|a| a.deadline)
    }
}

impl Default for IdleTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IdleTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counter() -> (Arc<AtomicU32>, impl FnOnce() + Send + 'static) {
        let fired = Arc::new(AtomicU32::new(0));
        let hook = Arc::clone(&fired);
        (fired, move || {
            hook.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_does_not_move_deadline() {
        let timer = IdleTimer::new();
        let (fired, hook) = counter();
        let (second, second_hook) = counter();

        assert!(timer.arm(Duration::from_secs(10), hook));
        let deadline = timer.deadline().unwrap();

        time::sleep(Duration::from_secs(3)).await;
        assert!(!timer.arm(Duration::from_secs(10), second_hook));
        assert_eq!(timer.deadline(), Some(deadline));

        time::sleep(Duration::from_millis(7001)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_expiry() {
        let timer = IdleTimer::new();
        let (fired, hook) = counter();

        timer.arm(Duration::from_secs(5), hook);
        time::sleep(Duration::from_secs(4)).await;
        assert!(timer.cancel());
        assert!(!timer.cancel());

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_then_arm_starts_full_countdown() {
        let timer = IdleTimer::new();
        let (fired, hook) = counter();
        let (_, unused) = counter();

        timer.arm(Duration::from_secs(5), unused);
        time::sleep(Duration::from_secs(4)).await;
        timer.cancel();

        let rearmed_at = Instant::now();
        timer.arm(Duration::from_secs(5), hook);
        assert_eq!(timer.deadline(), Some(rearmed_at + Duration::from_secs(5)));

        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_secs(4)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_may_rearm() {
        let timer = Arc::new(IdleTimer::new());
        let (fired, hook) = counter();

        let inner = Arc::clone(&timer);
        timer.arm(Duration::from_secs(1), move || {
            assert!(!inner.is_armed());
            assert!(inner.arm(Duration::from_secs(1), hook));
        });

        time::sleep(Duration::from_millis(1500)).await;
        assert!(timer.is_armed());

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_armed());
    }
}
