//! Fixed live topics
//!
//! | Topic | Audience |
//! |-------|----------|
//! | `kitchen:{restaurant_id}` | 厨房显示屏 |
//! | `cashier:{restaurant_id}` | 收银台 |
//! | `customer:{bill_id}` | 下单顾客 |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Topic {
    Kitchen(i64),
    Cashier(i64),
    Customer(i64),
}

impl Topic {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Kitchen(_) => "kitchen",
            Self::Cashier(_) => "cashier",
            Self::Customer(_) => "customer",
        }
    }

    /// Restaurant id for staff topics, bill id for customer topics
    pub const fn key(&self) -> i64 {
        match self {
            Self::Kitchen(id) | Self::Cashier(id) | Self::Customer(id) => *id,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid topic: {0}")]
pub struct InvalidTopic(pub String);

impl FromStr for Topic {
    type Err = InvalidTopic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidTopic(s.to_string());
        let (kind, key) = s.split_once(':').ok_or_else(invalid)?;
        let key: i64 = key.parse().map_err(|_| invalid())?;
        match kind {
            "kitchen" => Ok(Self::Kitchen(key)),
            "cashier" => Ok(Self::Cashier(key)),
            "customer" => Ok(Self::Customer(key)),
            _ => Err(invalid()),
        }
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.to_string()
    }
}

impl TryFrom<String> for Topic {
    type Error = InvalidTopic;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
