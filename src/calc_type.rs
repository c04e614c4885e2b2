use std::fmt;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Type of oncvpsp calculation, each variant is a separate executable
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CalcType {
    NonRelativistic,
    ScalarRelativistic,
    FullyRelativistic
}

impl CalcType {
    /// Name of the oncvpsp executable built for this calculation type
    pub fn executable_name(&self) -> &'static str {
        match self {
            CalcType::NonRelativistic => "oncvpspnr.x",
            CalcType::ScalarRelativistic => "oncvpsp.x",
            CalcType::FullyRelativistic => "oncvpspr.x"
        }
    }
}

impl fmt::Display for CalcType {
      fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CalcType::NonRelativistic => write!(f, "non-relativistic"),
            CalcType::ScalarRelativistic => write!(f, "scalar-relativistic"),
            CalcType::FullyRelativistic => write!(f, "fully-relativistic")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_cli_value() {
        for calc_type in CalcType::value_variants() {
            let parsed = CalcType::from_str(&calc_type.to_string(), false).unwrap();
            assert_eq!(&parsed, calc_type);
        }
    }

    #[test]
    fn executables() {
        assert_eq!(CalcType::NonRelativistic.executable_name(), "oncvpspnr.x");
        assert_eq!(CalcType::ScalarRelativistic.executable_name(), "oncvpsp.x");
        assert_eq!(CalcType::FullyRelativistic.executable_name(), "oncvpspr.x");
    }
}
