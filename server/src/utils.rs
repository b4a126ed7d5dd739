use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Get current timestamp in milliseconds
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

/// Opaque player ID, unique for the lifetime of this process: epoch nanos
/// plus a process-wide counter so rapid joins on a coarse clock still
/// never collide.
pub fn next_player_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_nanos() as u64;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("p{}-{}", nanos, seq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_ids_are_distinct() {
        let a = next_player_id();
        let b = next_player_id();
        assert_ne!(a, b);
        assert!(a.starts_with('p'));
    }

    #[test]
    fn clock_is_monotonic_enough() {
        let t1 = now_millis();
        std::thread::sleep(Duration::from_millis(2));
        let t2 = now_millis();
        assert!(t2 > t1);
    }
}
