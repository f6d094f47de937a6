use std::fmt;

use rand::TryRngCore;
use rand::rngs::OsRng;
use tracing::warn;

/// Supplies 64-bit seeds for the content and index generators.
pub trait SeedSource: Send + Sync {
    fn next_seed(&self) -> u64;
}

/// Reads seeds from the operating system's random source.
///
/// A failed read is logged and the seed degrades to 0; the fill keeps going
/// since the quality of the written bytes does not matter.
///
/// # Examples
///
/// ```
/// use diskfill::seed::{OsSeedSource, SeedSource};
///
/// let seeds = OsSeedSource;
/// let _ = seeds.next_seed();
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct OsSeedSource;

impl SeedSource for OsSeedSource {
    fn next_seed(&self) -> u64 {
        seed_or_zero(OsRng.try_next_u64())
    }
}

fn seed_or_zero<E: fmt::Display>(read: Result<u64, E>) -> u64 {
    match read {
        Ok(seed) => seed,
        Err(e) => {
            warn!("can not read random data: {}", e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_failed_read_degrades_to_zero() {
        assert_eq!(seed_or_zero(Ok::<u64, io::Error>(42)), 42);
        assert_eq!(seed_or_zero(Err(io::Error::other("entropy source gone"))), 0);
    }

    #[test]
    fn test_os_seeds_vary() {
        let seeds = OsSeedSource;
        let drawn: Vec<u64> = (0..4).map(|_| seeds.next_seed()).collect();
        assert!(drawn.windows(2).any(|w| w[0] != w[1]));
    }
}
