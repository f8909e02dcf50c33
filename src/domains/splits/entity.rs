use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitDirection {
    Horizontal,
    Vertical,
}

impl SplitDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitDirection::Horizontal => "horizontal",
            SplitDirection::Vertical => "vertical",
        }
    }
}

impl fmt::Display for SplitDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SplitDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "horizontal" => Ok(SplitDirection::Horizontal),
            "vertical" => Ok(SplitDirection::Vertical),
            other => Err(format!("Invalid split direction: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitGroup {
    pub id: String,
    pub owner_id: String,
    pub direction: SplitDirection,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitMember {
    pub session_id: String,
    pub name: String,
    pub order: i64,
    pub size: f64,
}

/// A group together with its members in pane order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitLayout {
    pub group: SplitGroup,
    pub members: Vec<SplitMember>,
}

impl SplitLayout {
    pub fn member(&self, session_id: &str) -> Option<&SplitMember> {
        self.members.iter().find(|m| m.session_id == session_id)
    }

    pub fn total_size(&self) -> f64 {
        self.members.iter().map(|m| m.size).sum()
    }
}

/// One entry of an `update_layout` request; position in the list is the
/// new order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaneLayout {
    pub session_id: String,
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SplitRemoval {
    Redistributed { layout: SplitLayout },
    Dissolved {
        group_id: String,
        released_session_id: Option<String>,
    },
}
