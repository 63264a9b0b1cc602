//! Reading enrichment.
//!
//! Attaches processing metadata and a weather annotation to validated
//! readings before they are persisted.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use pipeline_core::{EnrichedReading, Reading, ReadingStatus, WeatherCondition};
use rand::seq::SliceRandom;
use std::sync::Arc;

/// Source of the weather annotation.
pub trait EnrichmentProvider: Send + Sync {
    fn current_condition(&self) -> WeatherCondition;
}

/// Picks a condition uniformly at random. Stand-in for a real weather feed.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomWeather;

impl EnrichmentProvider for RandomWeather {
    fn current_condition(&self) -> WeatherCondition {
        WeatherCondition::ALL
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(WeatherCondition::Sunny)
    }
}

/// Always reports the same condition.
#[derive(Debug, Clone, Copy)]
pub struct FixedWeather(pub WeatherCondition);

impl EnrichmentProvider for FixedWeather {
    fn current_condition(&self) -> WeatherCondition {
        self.0
    }
}

/// Wall clock used for `processed_at`.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Turns validated readings into enriched readings.
///
/// `processed_at` never goes backwards across calls, even if the clock
/// does.
pub struct Enricher {
    provider: Arc<dyn EnrichmentProvider>,
    clock: Clock,
    last_processed_at: Mutex<DateTime<Utc>>,
}

impl Enricher {
    /// Creates an enricher stamping readings with the system clock.
    pub fn new(provider: Arc<dyn EnrichmentProvider>) -> Self {
        Self::with_clock(provider, Arc::new(Utc::now))
    }

    pub fn with_clock(provider: Arc<dyn EnrichmentProvider>, clock: Clock) -> Self {
        Self {
            provider,
            clock,
            last_processed_at: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }

    /// Enriches a single reading. Never fails.
    pub fn enrich(&self, reading: Reading) -> EnrichedReading {
        let processed_at = {
            let mut last = self.last_processed_at.lock();
            let now = (self.clock)();
            if now > *last {
                *last = now;
            }
            *last
        };

        EnrichedReading {
            reading,
            processed_at,
            status: ReadingStatus::Processed,
            weather_condition: self.provider.current_condition(),
        }
    }
}

impl Default for Enricher {
    fn default() -> Self {
        Self::new(Arc::new(RandomWeather))
    }
}
