//! Fee resolution.
//!
//! A fee is requested as exact units, as whole coins, or as a tier of the
//! network fee table. Tiers resolve through
//! `fees[version][type name][tier]`; anything missing falls back to
//! [`FALLBACK_FEE`].

use tracing::debug;

use super::types::{coins_to_units, FeeSpec};
use crate::config::{NetworkConfig, FALLBACK_FEE};

/// Resolves `spec` to a fee in the smallest unit for a transaction of
/// format `version` whose fee table key is `fee_key`.
pub fn resolve_fee(spec: &FeeSpec, cfg: &NetworkConfig, version: u8, fee_key: &str) -> u64 {
    match spec {
        FeeSpec::Units(units) => *units,
        FeeSpec::Coins(coins) => coins_to_units(*coins),
        FeeSpec::Tier(tier) => match cfg.fee_for(version, fee_key, tier.as_str()) {
            Some(fee) => fee,
            None => {
                debug!(version, fee_key, %tier, fallback = FALLBACK_FEE, "no fee table entry, using fallback");
                FALLBACK_FEE
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::types::FeeTier;

    fn table() -> NetworkConfig {
        NetworkConfig::from_json(
            r#"{ "version": 30, "fees": { "1": { "transfer": { "avg": "10000000", "max": 25000000 } } } }"#,
        )
        .unwrap()
    }

    #[test]
    fn tier_resolves_from_table() {
        let cfg = table();
        assert_eq!(resolve_fee(&FeeSpec::Tier(FeeTier::Avg), &cfg, 1, "transfer"), 10_000_000);
        assert_eq!(resolve_fee(&FeeSpec::Tier(FeeTier::Max), &cfg, 1, "transfer"), 25_000_000);
    }

    #[test]
    fn missing_entries_fall_back() {
        let cfg = table();
        assert_eq!(resolve_fee(&FeeSpec::Tier(FeeTier::Min), &cfg, 1, "transfer"), FALLBACK_FEE);
        assert_eq!(resolve_fee(&FeeSpec::Tier(FeeTier::Avg), &cfg, 1, "vote"), FALLBACK_FEE);
        assert_eq!(resolve_fee(&FeeSpec::Tier(FeeTier::Avg), &cfg, 2, "transfer"), FALLBACK_FEE);
        assert_eq!(
            resolve_fee(&FeeSpec::Tier(FeeTier::Avg), &NetworkConfig::default(), 1, "transfer"),
            FALLBACK_FEE
        );
    }

    #[test]
    fn units_and_coins_ignore_the_table() {
        let cfg = table();
        assert_eq!(resolve_fee(&FeeSpec::Units(1), &cfg, 1, "transfer"), 1);
        assert_eq!(resolve_fee(&FeeSpec::Coins(0.25), &cfg, 1, "transfer"), 25_000_000);
    }
}
