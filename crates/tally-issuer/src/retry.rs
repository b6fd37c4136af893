use std::time::Duration;
use typed_builder::TypedBuilder;

pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// How often, and how patiently, a contended storage write is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
pub struct RetryPolicy {
    /// Total number of attempts, the first one included.
    #[builder(default = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,
    /// Fixed pause between two attempts.
    #[builder(default = DEFAULT_RETRY_DELAY)]
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.delay, Duration::from_millis(100));
    }

    #[test]
    fn builder_overrides() {
        let policy = RetryPolicy::builder()
            .max_retries(2)
            .delay(Duration::ZERO)
            .build();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.delay, Duration::ZERO);
    }
}
