//! Postal-code record model

use crate::error::{CepError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of digits in a CEP
pub const CEP_LEN: usize = 8;

/// A validated eight-digit CEP, the key of every record
///
/// Accepts `01310000` and `01310-000`; always holds the bare digits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cep(String);

impl Cep {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let digits: String = match trimmed.split_once('-') {
            Some((head, tail)) if head.len() == 5 && tail.len() == 3 => format!("{head}{tail}"),
            Some(_) => return Err(CepError::InvalidCep(raw.to_string())),
            None => trimmed.to_string(),
        };

        if digits.len() != CEP_LEN || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CepError::InvalidCep(raw.to_string()));
        }

        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Cep {
    type Err = CepError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Cep {
    type Error = CepError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Cep> for String {
    fn from(cep: Cep) -> Self {
        cep.0
    }
}

impl fmt::Display for Cep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One postal-code entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub cep: Cep,
    /// Logradouro
    pub street: Option<String>,
    pub complement: Option<String>,
    /// Bairro
    pub district: Option<String>,
    /// Localidade (city)
    pub locality: Option<String>,
    /// UF, the two-letter state code
    pub region: Option<String>,
    /// IBGE municipality code
    pub ibge_code: Option<String>,
}

impl Record {
    /// A record with only its key set
    pub fn new(cep: Cep) -> Self {
        Self {
            cep,
            street: None,
            complement: None,
            district: None,
            locality: None,
            region: None,
            ibge_code: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_and_hyphenated() {
        assert_eq!(Cep::parse("01310000").unwrap().as_str(), "01310000");
        assert_eq!(Cep::parse("01310-000").unwrap().as_str(), "01310000");
        assert_eq!(Cep::parse(" 01310-000 ").unwrap().as_str(), "01310000");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for raw in ["", "0131000", "013100000", "0131-0000", "01a10000", "01310-00-0"] {
            assert!(
                matches!(Cep::parse(raw), Err(CepError::InvalidCep(_))),
                "accepted {raw:?}"
            );
        }
    }

    #[test]
    fn test_record_serializes_cep_as_string() {
        let mut record = Record::new("01310000".parse().unwrap());
        record.district = Some("Bela Vista".to_string());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["cep"], "01310000");
        assert_eq!(json["district"], "Bela Vista");

        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
