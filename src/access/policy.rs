use serde::{Deserialize, Deserializer, Serialize};

use super::plan::{Plan, User};

/// What the gate knows about the caller at evaluation time.
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    pub is_authenticated: bool,
    pub user: Option<User>,
    pub is_loading: bool,
}

impl AuthState {
    #[cfg(test)]
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::default()
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(user: User) -> Self {
        Self {
            is_authenticated: true,
            user: Some(user),
            is_loading: false,
        }
    }
}

/// Requirement declared by a protected view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct AccessRequest {
    #[serde(default, rename = "plan", deserialize_with = "plan_name")]
    pub required_plan: Plan,
    #[serde(default)]
    pub admin_only: bool,
}

fn plan_name<'de, D: Deserializer<'de>>(d: D) -> Result<Plan, D::Error> {
    let name = String::deserialize(d)?;
    Ok(name.parse().unwrap_or(Plan::Unknown))
}

impl AccessRequest {
    pub fn plan(required_plan: Plan) -> Self {
        Self {
            required_plan,
            admin_only: false,
        }
    }

    pub fn admin_only() -> Self {
        Self {
            required_plan: Plan::Guest,
            admin_only: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Login,
    Dashboard,
    Upgrade,
}

impl Target {
    pub fn path(self) -> &'static str {
        match self {
            Target::Login => "/login",
            Target::Dashboard => "/dashboard",
            Target::Upgrade => "/upgrade",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Wait,
    Redirect(Target),
    Allow,
}

/// First matching rule wins:
/// loading, then signed out, then admin-only, then plan level.
///
/// The admin-only check runs before the plan check, so an admin-only view
/// turns away a non-admin whatever their plan. Admins skip the plan check.
pub fn evaluate(state: &AuthState, request: &AccessRequest) -> Decision {
    if state.is_loading {
        return Decision::Wait;
    }
    let user = match (&state.user, state.is_authenticated) {
        (Some(user), true) => user,
        _ => return Decision::Redirect(Target::Login),
    };
    if request.admin_only && !user.is_admin() {
        return Decision::Redirect(Target::Dashboard);
    }
    if !user.is_admin() && user.plan().level() < request.required_plan.level() {
        return Decision::Redirect(Target::Upgrade);
    }
    Decision::Allow
}
