// Aggregations the feature learners and the mapping preprocessor may use
// Author: Gabriel Demetrios Lafis

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::PipelineError;

/// Generate the aggregation enum together with its wire names.
macro_rules! define_aggregations {
    ($($ident:ident => $name:literal),* $(,)?) => {
        /// An aggregation as the engine names it
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Aggregation {
            $($ident),*
        }

        impl Aggregation {
            /// Every aggregation the engine knows
            pub const ALL: &'static [Aggregation] = &[$(Aggregation::$ident),*];

            /// The name used on the wire
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Aggregation::$ident => $name),*
                }
            }
        }
    };
}

#[rustfmt::skip]
define_aggregations!(
    Avg => "AVG",
    Count => "COUNT",
    CountDistinct => "COUNT DISTINCT",
    CountDistinctOverCount => "COUNT DISTINCT OVER COUNT",
    CountMinusCountDistinct => "COUNT MINUS COUNT DISTINCT",
    Ewma1S => "EWMA_1S",
    Ewma1M => "EWMA_1M",
    Ewma1H => "EWMA_1H",
    Ewma1D => "EWMA_1D",
    Ewma7D => "EWMA_7D",
    Ewma30D => "EWMA_30D",
    Ewma90D => "EWMA_90D",
    Ewma365D => "EWMA_365D",
    EwmaTrend1S => "EWMA_TREND_1S",
    EwmaTrend1M => "EWMA_TREND_1M",
    EwmaTrend1H => "EWMA_TREND_1H",
    EwmaTrend1D => "EWMA_TREND_1D",
    EwmaTrend7D => "EWMA_TREND_7D",
    EwmaTrend30D => "EWMA_TREND_30D",
    EwmaTrend90D => "EWMA_TREND_90D",
    EwmaTrend365D => "EWMA_TREND_365D",
    First => "FIRST",
    Kurtosis => "KURTOSIS",
    Last => "LAST",
    Max => "MAX",
    Median => "MEDIAN",
    Min => "MIN",
    Mode => "MODE",
    NumMax => "NUM MAX",
    NumMin => "NUM MIN",
    Q1 => "Q1",
    Q5 => "Q5",
    Q10 => "Q10",
    Q25 => "Q25",
    Q75 => "Q75",
    Q90 => "Q90",
    Q95 => "Q95",
    Q99 => "Q99",
    Skew => "SKEW",
    Stddev => "STDDEV",
    Sum => "SUM",
    TimeSinceFirstMaximum => "TIME SINCE FIRST MAXIMUM",
    TimeSinceFirstMinimum => "TIME SINCE FIRST MINIMUM",
    TimeSinceLastMaximum => "TIME SINCE LAST MAXIMUM",
    TimeSinceLastMinimum => "TIME SINCE LAST MINIMUM",
    Trend => "TREND",
    Var => "VAR",
    VariationCoefficient => "VARIATION COEFFICIENT",
);

impl Aggregation {
    /// Whether Multirel supports this aggregation
    pub fn is_multirel(&self) -> bool {
        MULTIREL_ALL.contains(self)
    }

    /// Whether the mapping preprocessor supports this aggregation
    pub fn is_mapping(&self) -> bool {
        MAPPING_ALL.contains(self)
    }
}

/// Aggregations FastProp uses unless told otherwise
pub const FASTPROP_DEFAULT: &[Aggregation] = &[
    Aggregation::Avg,
    Aggregation::Count,
    Aggregation::CountDistinct,
    Aggregation::CountMinusCountDistinct,
    Aggregation::First,
    Aggregation::Last,
    Aggregation::Max,
    Aggregation::Median,
    Aggregation::Min,
    Aggregation::Mode,
    Aggregation::Stddev,
    Aggregation::Sum,
    Aggregation::Trend,
];

pub const FASTPROP_MINIMAL: &[Aggregation] = &[
    Aggregation::Avg,
    Aggregation::Count,
    Aggregation::Max,
    Aggregation::Min,
    Aggregation::Sum,
];

/// Aggregations Multirel supports
pub const MULTIREL_ALL: &[Aggregation] = &[
    Aggregation::Avg,
    Aggregation::Count,
    Aggregation::CountDistinct,
    Aggregation::CountMinusCountDistinct,
    Aggregation::First,
    Aggregation::Last,
    Aggregation::Max,
    Aggregation::Median,
    Aggregation::Min,
    Aggregation::Stddev,
    Aggregation::Sum,
    Aggregation::Var,
];

/// Aggregations Multirel uses unless told otherwise
pub const MULTIREL_DEFAULT: &[Aggregation] = &[
    Aggregation::Avg,
    Aggregation::Count,
    Aggregation::Max,
    Aggregation::Min,
    Aggregation::Sum,
];

pub const MULTIREL_MINIMAL: &[Aggregation] = &[Aggregation::Avg, Aggregation::Count, Aggregation::Sum];

/// Aggregations the mapping preprocessor supports
pub const MAPPING_ALL: &[Aggregation] = &[
    Aggregation::Avg,
    Aggregation::Count,
    Aggregation::CountDistinct,
    Aggregation::CountDistinctOverCount,
    Aggregation::CountMinusCountDistinct,
    Aggregation::Kurtosis,
    Aggregation::Max,
    Aggregation::Median,
    Aggregation::Min,
    Aggregation::Mode,
    Aggregation::NumMax,
    Aggregation::NumMin,
    Aggregation::Q1,
    Aggregation::Q5,
    Aggregation::Q10,
    Aggregation::Q25,
    Aggregation::Q75,
    Aggregation::Q90,
    Aggregation::Q95,
    Aggregation::Q99,
    Aggregation::Skew,
    Aggregation::Stddev,
    Aggregation::Sum,
    Aggregation::Var,
    Aggregation::VariationCoefficient,
];

pub const MAPPING_DEFAULT: &[Aggregation] = &[Aggregation::Avg];

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Aggregation {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Aggregation::ALL
            .iter()
            .find(|agg| agg.as_str() == s)
            .copied()
            .ok_or_else(|| PipelineError::InvalidArgument(format!("Unknown aggregation: '{}'", s)))
    }
}

impl Serialize for Aggregation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Aggregation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Reject aggregations outside `supported`
pub(crate) fn check_aggregations(
    aggregation: &[Aggregation],
    supported: &[Aggregation],
    owner: &str,
) -> Result<(), PipelineError> {
    if aggregation.is_empty() {
        return Err(PipelineError::InvalidArgument(format!(
            "'aggregation' of {} must not be empty",
            owner
        )));
    }

    let unsupported = aggregation
        .iter()
        .filter(|agg| !supported.contains(agg))
        .map(Aggregation::as_str)
        .collect::<Vec<_>>();

    if unsupported.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::InvalidArgument(format!(
            "{} does not support these aggregations: {}",
            owner,
            unsupported.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        assert_eq!(Aggregation::CountMinusCountDistinct.as_str(), "COUNT MINUS COUNT DISTINCT");
        assert_eq!("EWMA_TREND_7D".parse::<Aggregation>().unwrap(), Aggregation::EwmaTrend7D);
        assert!("AVERAGE".parse::<Aggregation>().is_err());

        let json = serde_json::to_string(&[Aggregation::Q25, Aggregation::NumMax]).unwrap();
        assert_eq!(json, r#"["Q25","NUM MAX"]"#);
    }

    #[test]
    fn test_sets() {
        assert_eq!(Aggregation::ALL.len(), 48);
        assert!(MULTIREL_DEFAULT.iter().all(Aggregation::is_multirel));
        assert!(MAPPING_DEFAULT.iter().all(Aggregation::is_mapping));
        assert!(!Aggregation::Trend.is_multirel());

        assert!(check_aggregations(&[Aggregation::Avg], MULTIREL_ALL, "Multirel").is_ok());
        assert!(check_aggregations(&[Aggregation::Ewma1D], MULTIREL_ALL, "Multirel").is_err());
        assert!(check_aggregations(&[], MULTIREL_ALL, "Multirel").is_err());
    }
}
