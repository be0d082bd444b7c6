//! Response envelopes.
//!
//! Balance APIs disagree on where the holder array lives: some return it bare,
//! others nest it under `data`, `balances`, `records`, `leaderboard` or
//! `holders`, sometimes two levels deep (`{"data": {"balances": [...]}}`).

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

/// Envelopes are unwrapped at most this many levels deep.
const MAX_DEPTH: usize = 3;

/// One way of locating the holder array inside a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// The body itself is the array.
    Bare,
    /// The array is under this field of an object.
    Field(&'static str),
}

/// Fixed probing order when the endpoint gives no hint.
pub const DEFAULT_ORDER: [Envelope; 6] = [
    Envelope::Bare,
    Envelope::Field("data"),
    Envelope::Field("balances"),
    Envelope::Field("records"),
    Envelope::Field("leaderboard"),
    Envelope::Field("holders"),
];

impl Envelope {
    /// Apply one strategy to one level of the response.
    ///
    /// `Bare` yields the array if the value is one. `Field` yields whatever
    /// sits under the field, which may itself be another envelope.
    fn open<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        match self {
            Envelope::Bare => value.is_array().then_some(value),
            Envelope::Field(name) => value.as_object()?.get(*name),
        }
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Envelope::Bare => f.write_str("bare"),
            Envelope::Field(name) => f.write_str(name),
        }
    }
}

impl FromStr for Envelope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DEFAULT_ORDER
            .iter()
            .find(|e| e.to_string() == s.trim())
            .copied()
            .ok_or_else(|| {
                format!(
                    "unknown response shape, expected one of: {}",
                    DEFAULT_ORDER.map(|e| e.to_string()).join(", ")
                )
            })
    }
}

/// Locate the holder array in `body`.
///
/// The hinted envelope, if any, is tried first at every level, then the
/// default order. Returns `None` when no array is reachable.
pub fn unwrap_array<'a>(body: &'a Value, hint: Option<Envelope>) -> Option<&'a Vec<Value>> {
    let strategies: Vec<Envelope> = hint
        .into_iter()
        .chain(DEFAULT_ORDER.into_iter().filter(|e| Some(*e) != hint))
        .collect();

    let mut current = body;
    for _ in 0..MAX_DEPTH {
        if let Some(array) = current.as_array() {
            return Some(array);
        }
        current = strategies
            .iter()
            .filter(|e| **e != Envelope::Bare)
            .find_map(|e| e.open(current))?;
    }
    current.as_array()
}
