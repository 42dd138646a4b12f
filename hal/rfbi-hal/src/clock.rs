//! Clock gating and rate reporting
//!
//! The RFBI block runs from the interconnect (interface) clock; timing
//! registers count ticks of that clock, optionally divided by two.

/// Functional clock feeding the interface
///
/// `enable`/`disable` calls nest: the clock must stay running until every
/// `enable` has been matched by a `disable`.
pub trait FunctionalClock {
    /// Current clock rate in Hz
    ///
    /// The rate may change between calls (DVFS); callers query it each time
    /// they convert timings rather than caching it.
    fn rate_hz(&self) -> u32;

    /// Take a reference on the clock
    fn enable(&mut self);

    /// Drop a reference on the clock
    fn disable(&mut self);
}
