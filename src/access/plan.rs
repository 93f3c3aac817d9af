use std::{convert::Infallible, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Coarse privilege flag, independent of the plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    #[serde(other)]
    Member,
}

/// Subscription tier. A name we do not know maps to `Unknown`, which ranks
/// with `Guest`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Plan {
    #[default]
    Guest,
    Free,
    Basic,
    Pro,
    Admin,
    Unknown,
}

impl Plan {
    /// Exact lookup, as the identity provider spells plans.
    pub fn from_name(name: &str) -> Self {
        match name {
            "guest" => Plan::Guest,
            "free" => Plan::Free,
            "basic" => Plan::Basic,
            "pro" => Plan::Pro,
            "admin" => Plan::Admin,
            _ => Plan::Unknown,
        }
    }

    pub fn level(self) -> u8 {
        match self {
            Plan::Guest | Plan::Unknown => 0,
            Plan::Free => 1,
            Plan::Basic => 2,
            Plan::Pro => 3,
            Plan::Admin => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Plan::Guest => "guest",
            Plan::Free => "free",
            Plan::Basic => "basic",
            Plan::Pro => "pro",
            Plan::Admin => "admin",
            Plan::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Plan::from_name(&s.trim().to_ascii_lowercase()))
    }
}

/// `plan` keeps the provider's raw name so views echo it unchanged;
/// `User::plan` does the ranking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Current user as reported by the identity provider. Read-only here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Subscription>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    #[cfg(test)]
    pub fn new(role: Role, plan: Option<Plan>) -> Self {
        Self {
            role,
            subscription: Some(Subscription {
                plan: plan.map(|p| p.as_str().to_string()),
                extra: Map::new(),
            }),
            extra: Map::new(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn plan(&self) -> Plan {
        self.subscription
            .as_ref()
            .and_then(|s| s.plan.as_deref())
            .map(Plan::from_name)
            .unwrap_or(Plan::Guest)
    }
}
