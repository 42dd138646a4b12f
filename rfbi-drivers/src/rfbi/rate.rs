//! Maximum transfer rate
//!
//! The interface cannot clock out a pixel on every L4 tick. How many ticks it
//! needs depends on the L4 and DSS1 clock pair and was only measured for a
//! few known pairs.

/// Known clock pairs: (L4 MHz, DSS1 MHz, minimum L4 ticks per pixel)
const RATE_TABLE: [(u32, u32, u32); 5] = [
    (55, 132, 7),   // 7.86 Mpix/s
    (110, 110, 12), // 9.16 Mpix/s
    (110, 132, 10), // 11 Mpix/s
    (120, 120, 10), // 12 Mpix/s
    (133, 133, 10), // 13.3 Mpix/s
];

/// Clock rates within this many MHz of a table entry match it
const MATCH_WINDOW_MHZ: u32 = 3;

/// Maximum pixel rate in pixels per second
///
/// Clock pairs outside the table get the unlimited L4 rate, which may be too
/// fast for tearing-effect synchronization.
pub fn max_tx_rate(l4_hz: u32, dss1_hz: u32) -> u32 {
    let l4_khz = l4_hz / 1000;
    let l4_mhz = l4_khz / 1000;
    let dss1_mhz = dss1_hz / 1_000_000;

    let entry = RATE_TABLE.iter().find(|(l4, dss1, _)| {
        l4.abs_diff(l4_mhz) < MATCH_WINDOW_MHZ && dss1.abs_diff(dss1_mhz) < MATCH_WINDOW_MHZ
    });

    match entry {
        Some(&(_, _, min_ticks)) => l4_khz * 1000 / min_ticks,
        None => {
            #[cfg(feature = "defmt")]
            defmt::warn!("unknown L4/DSS1 clock pair, transfer rate not limited");
            l4_khz * 1000
        }
    }
}
