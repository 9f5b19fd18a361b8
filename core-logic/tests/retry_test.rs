use core_logic::{attempt_timeout, Entropy, RetryConfig, SystemEntropy, MAX_ATTEMPTS};
use std::time::Duration;

struct MaxJitter;

impl Entropy for MaxJitter {
    fn below(&mut self, upper: u64) -> u64 {
        upper.saturating_sub(1)
    }

    fn unit(&mut self) -> f64 {
        0.5
    }
}

#[test]
fn test_session_delay_bounds() {
    let config = RetryConfig::session();
    let mut entropy = SystemEntropy::seeded(42);

    for attempt in 0..2 {
        let delay = config.calculate_delay(attempt, &mut entropy);
        let floor = Duration::from_millis(u64::from(attempt + 1) * 2000);
        assert!(delay >= floor);
        assert!(delay < floor + Duration::from_millis(3000));
    }
}

#[test]
fn test_request_delay_upper_bound_with_max_jitter() {
    let config = RetryConfig::request();

    assert_eq!(
        config.calculate_delay(0, &mut MaxJitter),
        Duration::from_millis(4999)
    );
    assert_eq!(
        config.calculate_delay(1, &mut MaxJitter),
        Duration::from_millis(7999)
    );
}

#[test]
fn test_without_jitter_is_deterministic() {
    let config = RetryConfig::request().without_jitter();

    assert_eq!(config.calculate_delay(2, &mut MaxJitter), Duration::from_millis(6000));
}

#[test]
fn test_max_attempts_is_three() {
    assert_eq!(MAX_ATTEMPTS, 3);
    assert_eq!(RetryConfig::default().max_attempts, 3);
    assert_eq!(RetryConfig::session().max_attempts, 3);

    let retries = (0..10)
        .take_while(|&a| RetryConfig::request().has_retry_left(a))
        .count();
    assert_eq!(retries, 2);
}

#[test]
fn test_with_max_attempts_never_below_one() {
    let config = RetryConfig::request().with_max_attempts(0);
    assert_eq!(config.max_attempts, 1);
    assert!(!config.has_retry_left(0));
}

#[test]
fn test_timeouts_strictly_increase() {
    let base = Duration::from_millis(10_000);
    let timeouts: Vec<_> = (0..MAX_ATTEMPTS).map(|a| attempt_timeout(base, a)).collect();

    assert!(timeouts.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(timeouts[2], Duration::from_millis(30_000));
}
