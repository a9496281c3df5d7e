//! Currency codes carried by calendar events.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// The currency (or economy) an economic event relates to.
///
/// The calendar page tags each event row with a category marker that holds
/// one of these ISO codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Jpy,
    Aud,
    Nzd,
    Cad,
    Chf,
    Cny,
    Hkd,
    Sgd,
    Sek,
    Nok,
    Dkk,
    Mxn,
    Zar,
    Try,
    Inr,
    Krw,
    Brl,
    Rub,
    Pln,
}

impl Currency {
    /// All known currencies, in declaration order.
    pub const ALL: [Currency; 22] = [
        Self::Usd,
        Self::Eur,
        Self::Gbp,
        Self::Jpy,
        Self::Aud,
        Self::Nzd,
        Self::Cad,
        Self::Chf,
        Self::Cny,
        Self::Hkd,
        Self::Sgd,
        Self::Sek,
        Self::Nok,
        Self::Dkk,
        Self::Mxn,
        Self::Zar,
        Self::Try,
        Self::Inr,
        Self::Krw,
        Self::Brl,
        Self::Rub,
        Self::Pln,
    ];

    /// Returns the ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
            Self::Jpy => "JPY",
            Self::Aud => "AUD",
            Self::Nzd => "NZD",
            Self::Cad => "CAD",
            Self::Chf => "CHF",
            Self::Cny => "CNY",
            Self::Hkd => "HKD",
            Self::Sgd => "SGD",
            Self::Sek => "SEK",
            Self::Nok => "NOK",
            Self::Dkk => "DKK",
            Self::Mxn => "MXN",
            Self::Zar => "ZAR",
            Self::Try => "TRY",
            Self::Inr => "INR",
            Self::Krw => "KRW",
            Self::Brl => "BRL",
            Self::Rub => "RUB",
            Self::Pln => "PLN",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = ModelError;

    /// Case-insensitive lookup on the trimmed ISO code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.code().eq_ignore_ascii_case(needle))
            .ok_or_else(|| ModelError::UnknownCurrency(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("USD".parse::<Currency>().unwrap(), Currency::Usd);
        assert_eq!("eur".parse::<Currency>().unwrap(), Currency::Eur);
        assert_eq!("  gbp ".parse::<Currency>().unwrap(), Currency::Gbp);
    }

    #[test]
    fn unknown_code_is_an_error() {
        let err = "XYZ".parse::<Currency>().unwrap_err();
        assert!(matches!(err, ModelError::UnknownCurrency(ref s) if s == "XYZ"));
        assert!("".parse::<Currency>().is_err());
    }

    #[test]
    fn every_code_round_trips_through_lookup() {
        for currency in Currency::ALL {
            assert_eq!(currency.code().parse::<Currency>().unwrap(), currency);
        }
    }

    #[test]
    fn serializes_as_iso_code() {
        let json = serde_json::to_string(&Currency::Chf).unwrap();
        assert_eq!(json, "\"CHF\"");
        let parsed: Currency = serde_json::from_str("\"NZD\"").unwrap();
        assert_eq!(parsed, Currency::Nzd);
    }
}
