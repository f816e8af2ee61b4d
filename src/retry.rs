//! Resume failure classification and bounded backoff.

use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use agent_runtime::RuntimeError;
use regex::Regex;

/// Total resume attempts, counting the first one.
pub const MAX_ATTEMPTS: u32 = 3;
/// Delay before the first retry; doubles for each further retry.
pub const BASE_DELAY_MS: u64 = 1000;

/// Why a resume attempt failed, as far as retry policy is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeErrorKind {
    /// The identifier is stale on the runtime side.
    SessionExpired,
    /// Credentials need out-of-band action.
    Authentication,
    NetworkTimeout,
    SessionNotReady,
    Unknown,
}

impl ResumeErrorKind {
    #[must_use]
    pub fn classify(error: &RuntimeError) -> Self {
        match error {
            RuntimeError::SessionNotFound { .. } => Self::SessionExpired,
            RuntimeError::Authentication { .. } => Self::Authentication,
            RuntimeError::Timeout { .. } => Self::NetworkTimeout,
            RuntimeError::NotReady { .. } => Self::SessionNotReady,
            RuntimeError::UnsupportedModel { .. } | RuntimeError::Unsupported { .. } => {
                Self::Unknown
            }
            RuntimeError::Other(message) => Self::classify_message(message),
        }
    }

    /// Classifies free-form runtime error text.
    #[must_use]
    pub fn classify_message(message: &str) -> Self {
        if expired_regex().is_match(message) {
            Self::SessionExpired
        } else if authentication_regex().is_match(message) {
            Self::Authentication
        } else if timeout_regex().is_match(message) {
            Self::NetworkTimeout
        } else if not_ready_regex().is_match(message) {
            Self::SessionNotReady
        } else {
            Self::Unknown
        }
    }

    /// `Unknown` is retried like a transient failure.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::NetworkTimeout | Self::SessionNotReady | Self::Unknown
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionExpired => "session_expired",
            Self::Authentication => "authentication",
            Self::NetworkTimeout => "network_timeout",
            Self::SessionNotReady => "session_not_ready",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ResumeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn expired_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(concat!(
            r"(?i)session\b.*\b(not.?found|expired|does not exist|unknown)",
            r"|(unknown|invalid|stale) session",
        ))
        .expect("expired regex must compile")
    })
}

fn authentication_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"(?i)unauthori[sz]ed|authenticat|forbidden|credential|not logged in|\b40[13]\b")
            .expect("authentication regex must compile")
    })
}

fn timeout_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(concat!(
            r"(?i)timed?.?out|etimedout|econnreset|econnrefused|network",
            r"|socket hang up|connection.?(reset|refused|closed)",
        ))
        .expect("timeout regex must compile")
    })
}

fn not_ready_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"(?i)not.?ready|still (starting|initiali[sz]ing)|warming up")
            .expect("not-ready regex must compile")
    })
}

/// Backoff before the retry that follows failed attempt `attempt` (1-based).
#[must_use]
pub fn retry_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(30);
    Duration::from_millis(BASE_DELAY_MS * 2u64.saturating_pow(exponent))
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    /// The failure class is never retried.
    FailFast,
    Exhausted,
}

/// Bookkeeping for one resume operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    attempt: u32,
    last_error: Option<ResumeErrorKind>,
    next_delay: Option<Duration>,
}

impl RetryState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the start of the next attempt and returns its 1-based number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    pub fn record_failure(&mut self, kind: ResumeErrorKind) -> RetryDecision {
        self.last_error = Some(kind);
        self.next_delay = None;

        if !kind.is_retryable() {
            return RetryDecision::FailFast;
        }
        if self.attempt >= MAX_ATTEMPTS {
            return RetryDecision::Exhausted;
        }

        let delay = retry_delay(self.attempt);
        self.next_delay = Some(delay);
        RetryDecision::RetryAfter(delay)
    }

    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    #[must_use]
    pub fn last_error(&self) -> Option<ResumeErrorKind> {
        self.last_error
    }

    #[must_use]
    pub fn next_delay(&self) -> Option<Duration> {
        self.next_delay
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use agent_runtime::RuntimeError;

    use super::{retry_delay, ResumeErrorKind, RetryDecision, RetryState, MAX_ATTEMPTS};

    #[test]
    fn typed_errors_map_to_their_class() {
        assert_eq!(
            ResumeErrorKind::classify(&RuntimeError::session_not_found("abc")),
            ResumeErrorKind::SessionExpired
        );
        assert_eq!(
            ResumeErrorKind::classify(&RuntimeError::authentication("token revoked")),
            ResumeErrorKind::Authentication
        );
        assert_eq!(
            ResumeErrorKind::classify(&RuntimeError::timeout("30s")),
            ResumeErrorKind::NetworkTimeout
        );
        assert_eq!(
            ResumeErrorKind::classify(&RuntimeError::not_ready("abc")),
            ResumeErrorKind::SessionNotReady
        );
    }

    #[test]
    fn free_form_messages_are_classified_by_text() {
        let cases = [
            ("Session abc not found", ResumeErrorKind::SessionExpired),
            ("invalid session id", ResumeErrorKind::SessionExpired),
            ("HTTP 401 Unauthorized", ResumeErrorKind::Authentication),
            ("request timed out after 30s", ResumeErrorKind::NetworkTimeout),
            ("read ECONNRESET", ResumeErrorKind::NetworkTimeout),
            ("server is not ready yet", ResumeErrorKind::SessionNotReady),
            ("something odd happened", ResumeErrorKind::Unknown),
        ];

        for (message, expected) in cases {
            assert_eq!(
                ResumeErrorKind::classify(&RuntimeError::other(message)),
                expected,
                "{message}"
            );
        }
    }

    #[test]
    fn only_transient_and_unknown_classes_retry() {
        assert!(ResumeErrorKind::NetworkTimeout.is_retryable());
        assert!(ResumeErrorKind::SessionNotReady.is_retryable());
        assert!(ResumeErrorKind::Unknown.is_retryable());
        assert!(!ResumeErrorKind::SessionExpired.is_retryable());
        assert!(!ResumeErrorKind::Authentication.is_retryable());
    }

    #[test]
    fn delays_double_from_one_second() {
        assert_eq!(retry_delay(1), Duration::from_secs(1));
        assert_eq!(retry_delay(2), Duration::from_secs(2));
        assert_eq!(retry_delay(3), Duration::from_secs(4));
    }

    #[test]
    fn state_allows_three_attempts_with_two_delays() {
        let mut state = RetryState::new();
        let mut delays = Vec::new();

        loop {
            state.begin_attempt();
            match state.record_failure(ResumeErrorKind::NetworkTimeout) {
                RetryDecision::RetryAfter(delay) => delays.push(delay),
                RetryDecision::Exhausted => break,
                RetryDecision::FailFast => panic!("timeouts must retry"),
            }
        }

        assert_eq!(state.attempt(), MAX_ATTEMPTS);
        assert_eq!(delays, vec![Duration::from_secs(1), Duration::from_secs(2)]);
        assert_eq!(state.last_error(), Some(ResumeErrorKind::NetworkTimeout));
        assert_eq!(state.next_delay(), None);
    }

    #[test]
    fn fail_fast_classes_stop_on_first_attempt() {
        let mut state = RetryState::new();
        state.begin_attempt();
        assert_eq!(
            state.record_failure(ResumeErrorKind::Authentication),
            RetryDecision::FailFast
        );
        assert_eq!(state.attempt(), 1);
    }
}
