//! Holder records and ranking.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Raw balances are in base units; KALE has 7 decimals.
pub const BASE_UNITS_PER_KALE: u64 = 10_000_000;

const WALLET_ADDRESS_LEN: usize = 56;
const WALLET_PREFIX: char = 'G';
const BASE32_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// One account holding KALE, as reported by a balance API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderRecord {
    address: String,
    raw_balance: u64,
}

impl HolderRecord {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn raw_balance(&self) -> u64 {
        self.raw_balance
    }

    /// Balance in whole KALE.
    pub fn balance(&self) -> f64 {
        self.raw_balance as f64 / BASE_UNITS_PER_KALE as f64
    }

    /// `GABCDE...UVWXYZ`
    pub fn short_address(&self) -> String {
        let len = self.address.len();
        if len <= 12 {
            return self.address.clone();
        }
        format!("{}...{}", &self.address[..6], &self.address[len - 6..])
    }
}

/// Whether `address` looks like a Stellar wallet (`G...`), as opposed to a
/// contract (`C...`) or garbage.
///
/// Only the shape is checked: length, prefix and base32 alphabet.
pub fn is_wallet_address(address: &str) -> bool {
    address.len() == WALLET_ADDRESS_LEN
        && address.starts_with(WALLET_PREFIX)
        && address.chars().all(|c| BASE32_ALPHABET.contains(c))
}

/// Pull `(address, balance)` out of one API entry.
///
/// Providers use `address` or `account` for the key and `balance` or
/// `amount` for the balance, in base units. It may be an integer, a float
/// with no fractional part or a numeric string. A fractional balance is not
/// a base unit count and yields `None`, like anything else.
fn parse_entry(entry: &Value) -> Option<(&str, u64)> {
    let address = entry
        .get("address")
        .or_else(|| entry.get("account"))?
        .as_str()?;
    let balance = entry.get("balance").or_else(|| entry.get("amount"))?;
    Some((address, parse_balance(balance)?))
}

fn parse_balance(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(integral_units)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral_units))
        }
        _ => None,
    }
}

/// `f` as a whole number of base units, if it is one.
fn integral_units(f: f64) -> Option<u64> {
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f < u64::MAX as f64).then(|| f as u64)
}

/// Keep wallet entries with a strictly positive balance.
pub fn filter_wallets(entries: &[Value]) -> Vec<HolderRecord> {
    entries
        .iter()
        .filter_map(parse_entry)
        .filter(|(address, balance)| *balance > 0 && is_wallet_address(address))
        .map(|(address, raw_balance)| HolderRecord {
            address: address.to_string(),
            raw_balance,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedHolder {
    pub rank: usize,
    #[serde(flatten)]
    pub record: HolderRecord,
    pub balance: f64,
    /// Share of `Leaderboard::total_supply`, in percent.
    pub percentage: f64,
}

/// Ranked wallet holders from one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Leaderboard {
    pub endpoint: String,
    pub fetched_at: DateTime<Utc>,
    /// Sum over the filtered wallet set, not over the raw response.
    pub total_supply: u128,
    pub holder_count: usize,
    pub holders: Vec<RankedHolder>,
}

impl Leaderboard {
    /// Rank `wallets` by balance, highest first. Ties keep source order.
    pub fn rank(endpoint: &str, mut wallets: Vec<HolderRecord>) -> Self {
        let total_supply: u128 = wallets.iter().map(|h| h.raw_balance as u128).sum();
        wallets.sort_by(|a, b| b.raw_balance.cmp(&a.raw_balance));

        let holders = wallets
            .into_iter()
            .enumerate()
            .map(|(i, record)| {
                let percentage = if total_supply == 0 {
                    0.0
                } else {
                    record.raw_balance as f64 / total_supply as f64 * 100.0
                };
                RankedHolder {
                    rank: i + 1,
                    balance: record.balance(),
                    percentage,
                    record,
                }
            })
            .collect::<Vec<_>>();

        Self {
            endpoint: endpoint.to_string(),
            fetched_at: Utc::now(),
            total_supply,
            holder_count: holders.len(),
            holders,
        }
    }

    /// A copy holding only the first `limit` holders.
    pub fn top(&self, limit: usize) -> Self {
        Self {
            endpoint: self.endpoint.clone(),
            fetched_at: self.fetched_at,
            total_supply: self.total_supply,
            holder_count: self.holder_count,
            holders: self.holders.iter().take(limit).cloned().collect(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// A distinct, well-formed wallet address for index `i` (< 32).
    pub(crate) fn wallet(i: usize) -> String {
        let c = BASE32_ALPHABET.as_bytes()[i] as char;
        format!("G{}", c.to_string().repeat(55))
    }

    #[test]
    fn test_wallet_address_shape() {
        assert!(is_wallet_address(&wallet(0)));
        assert!(is_wallet_address(
            "GCHPTWXMT3HYF4RLZHWBNRF4MPXLTJ76ISHMSYIWCCDXWUYOQG5MR2AB"
        ));

        // contract account
        assert!(!is_wallet_address(
            "CB23WRDQWGSP6YPMY4UV5C4OW5CBTXKYN3XEATG7KJEZCXMJBYEHOUOV"
        ));
        assert!(!is_wallet_address(&wallet(0)[..55]));
        assert!(!is_wallet_address(&format!("{}A", wallet(0))));
        assert!(!is_wallet_address(&format!("G{}", "a".repeat(55))));
        // 0, 1, 8 and 9 are outside base32
        assert!(!is_wallet_address(&format!("G{}1", "A".repeat(54))));
        assert!(!is_wallet_address(&format!("G{}8", "A".repeat(54))));
        assert!(!is_wallet_address(""));
    }

    #[test]
    fn test_filter_keeps_only_positive_wallets() {
        let entries = vec![
            json!({"address": wallet(0), "balance": 100}),
            json!({"account": wallet(1), "amount": "250"}),
            json!({"address": wallet(2), "balance": 0}),
            json!({"address": "CB23WRDQWGSP6YPMY4UV5C4OW5CBTXKYN3XEATG7KJEZCXMJBYEHOUOV", "balance": 9000}),
            json!({"address": "short", "balance": 5}),
            json!({"balance": 5}),
            json!({"address": wallet(3), "balance": "abc"}),
            json!({"address": wallet(4), "balance": -4}),
            json!({"address": wallet(5), "balance": 12.9}),
        ];

        let wallets = filter_wallets(&entries);
        let got: Vec<(&str, u64)> = wallets
            .iter()
            .map(|h| (h.address(), h.raw_balance()))
            .collect();

        assert_eq!(
            got,
            vec![
                (wallet(0).as_str(), 100),
                (wallet(1).as_str(), 250),
            ]
        );
        assert!(wallets
            .iter()
            .all(|h| is_wallet_address(h.address()) && h.raw_balance() > 0));
    }

    #[test]
    fn test_fractional_balances_are_rejected() {
        assert_eq!(parse_balance(&json!(12.9)), None);
        assert_eq!(parse_balance(&json!("12.9")), None);
        assert_eq!(parse_balance(&json!(0.5)), None);

        // integral floats are whole base units
        assert_eq!(parse_balance(&json!(12.0)), Some(12));
        assert_eq!(parse_balance(&json!("1.5e7")), Some(15_000_000));
        assert_eq!(parse_balance(&json!(" 250 ")), Some(250));
        assert_eq!(parse_balance(&json!(1e30)), None);

        let entries = vec![
            json!({"address": wallet(0), "balance": 12.9}),
            json!({"address": wallet(1), "balance": 40.0}),
        ];
        let wallets = filter_wallets(&entries);
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets[0].address(), wallet(1));
        assert_eq!(wallets[0].raw_balance(), 40);
    }

    #[test]
    fn test_percentages_ignore_excluded_entries() {
        let valid = vec![
            json!({"address": wallet(0), "balance": 300}),
            json!({"address": wallet(1), "balance": 100}),
        ];
        let mut noisy = valid.clone();
        noisy.push(json!({"address": "CB23WRDQWGSP6YPMY4UV5C4OW5CBTXKYN3XEATG7KJEZCXMJBYEHOUOV", "balance": 1_000_000}));
        noisy.push(json!({"address": wallet(2), "balance": 0}));

        let clean = Leaderboard::rank("x", filter_wallets(&valid));
        let dirty = Leaderboard::rank("x", filter_wallets(&noisy));

        assert_eq!(clean.total_supply, 400);
        assert_eq!(dirty.total_supply, 400);
        assert_eq!(clean.holders[0].percentage, 75.0);
        assert_eq!(dirty.holders[0].percentage, 75.0);
        assert_eq!(dirty.holders[1].percentage, 25.0);
    }

    #[test]
    fn test_rank_orders_by_balance() {
        let entries: Vec<Value> = [5u64, 50, 20, 50_000_000]
            .iter()
            .enumerate()
            .map(|(i, b)| json!({"address": wallet(i), "balance": b}))
            .collect();

        let board = Leaderboard::rank("x", filter_wallets(&entries));
        let balances: Vec<u64> = board.holders.iter().map(|h| h.record.raw_balance()).collect();

        assert_eq!(balances, vec![50_000_000, 50, 20, 5]);
        assert_eq!(board.holders[0].rank, 1);
        assert_eq!(board.holders[0].balance, 5.0);
        assert_eq!(board.holder_count, 4);

        let top = board.top(2);
        assert_eq!(top.holders.len(), 2);
        assert_eq!(top.holder_count, 4);
        assert_eq!(top.total_supply, board.total_supply);
    }

    #[test]
    fn test_short_address() {
        let record = HolderRecord {
            address: "GCHPTWXMT3HYF4RLZHWBNRF4MPXLTJ76ISHMSYIWCCDXWUYOQG5MR2AB".into(),
            raw_balance: 1,
        };
        assert_eq!(record.short_address(), "GCHPTW...5MR2AB");
    }
}
