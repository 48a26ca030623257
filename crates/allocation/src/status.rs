use serde::{Deserialize, Serialize};

/// Lifecycle of an applied credit or applied discount.
///
/// Records start `Active` and move to `Inactive` exactly once, on reversal.
/// There is no way back and no physical delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationStatus {
    Active,
    Inactive,
}

impl AllocationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AllocationStatus::Active => "active",
            AllocationStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(AllocationStatus::Active),
            "inactive" => Some(AllocationStatus::Inactive),
            _ => None,
        }
    }

    pub fn is_active(self) -> bool {
        self == AllocationStatus::Active
    }
}

/// What an allocation record (and its posted splits) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationKind {
    Credit,
    Discount,
}

impl AllocationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AllocationKind::Credit => "credit",
            AllocationKind::Discount => "discount",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "credit" => Some(AllocationKind::Credit),
            "discount" => Some(AllocationKind::Discount),
            _ => None,
        }
    }
}
