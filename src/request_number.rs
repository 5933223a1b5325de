use chrono::{DateTime, Utc};

use crate::repository::RepositoryState;

/// Highest sequence that fits the six-digit suffix.
pub const MAX_SEQUENCE: i32 = 999_999;

/// RequestNumberGenerator
///
/// Produces `SOL-{year}-{NNNNNN}` identifiers by reading the highest sequence
/// already stored for the year and adding one.
///
/// The read and the later insert are not covered by one lock, so two concurrent
/// callers can compute the same number. `SurveyResponseRecorder` resolves that
/// collision against the unique constraint; the generator itself stays a plain
/// read.
#[derive(Clone)]
pub struct RequestNumberGenerator {
    repo: RepositoryState,
}

impl RequestNumberGenerator {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    pub async fn next(&self, year: i32) -> String {
        self.next_at(year, Utc::now()).await
    }

    /// next_at
    ///
    /// Same as `next`, with `now` supplying the timestamp fallback
    /// (`SOL-{yyyyMMdd}-{HHmmss}`). The fallback is used when the sequence query
    /// fails for any reason or the year's sequence has reached `MAX_SEQUENCE`.
    pub async fn next_at(&self, year: i32, now: DateTime<Utc>) -> String {
        match self.repo.max_request_sequence(year).await {
            Ok(max) if max >= MAX_SEQUENCE => {
                tracing::warn!(year, max, "request sequence exhausted, using timestamp");
                fallback_number(now)
            }
            Ok(max) => sequence_number(year, max + 1),
            Err(e) => {
                tracing::warn!("request sequence lookup failed, using timestamp: {}", e);
                fallback_number(now)
            }
        }
    }
}

pub fn sequence_number(year: i32, sequence: i32) -> String {
    format!("SOL-{year}-{sequence:06}")
}

pub fn fallback_number(now: DateTime<Utc>) -> String {
    format!("SOL-{}", now.format("%Y%m%d-%H%M%S"))
}
