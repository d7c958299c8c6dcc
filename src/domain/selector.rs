// ============================================================
// Layer 3 — Run Selectors
// ============================================================
// The two enumerated choices a run configuration makes: which
// detector architecture to train and how recordings are split
// into training and validation sets. Both parse from the names
// used in configuration files and on the command line; an
// unknown name is a configuration error.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::TrainingError;

/// Detector architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModelKind {
    Rnn,
    Cnn,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Rnn => "RNN",
            ModelKind::Cnn => "CNN",
        }
    }
}

impl FromStr for ModelKind {
    type Err = TrainingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RNN" => Ok(ModelKind::Rnn),
            "CNN" => Ok(ModelKind::Cnn),
            other => Err(TrainingError::config(format!(
                "invalid model name '{other}' (expected RNN or CNN)"
            ))),
        }
    }
}

/// How recordings are divided into train/validation subsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SplitMethod {
    /// Hold out whole recordings (conductor/year versions)
    Version,
    /// Hold out whole acts across every version
    Act,
}

impl SplitMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitMethod::Version => "version",
            SplitMethod::Act => "act",
        }
    }
}

impl FromStr for SplitMethod {
    type Err = TrainingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "version" => Ok(SplitMethod::Version),
            "act" => Ok(SplitMethod::Act),
            other => Err(TrainingError::config(format!(
                "invalid split method '{other}' (expected version or act)"
            ))),
        }
    }
}

macro_rules! string_conversions {
    ($ty:ty) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl TryFrom<String> for $ty {
            type Error = TrainingError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.as_str().to_string()
            }
        }
    };
}

string_conversions!(ModelKind);
string_conversions!(SplitMethod);
