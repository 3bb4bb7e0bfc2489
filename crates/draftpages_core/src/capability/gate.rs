//! Capability gate contract and role-based implementation.

use crate::capability::actor::{Actor, Role};
use crate::model::page::Page;
use crate::repo::criteria::{Criteria, PageField};
use serde::Serialize;

/// Permission oracle consulted by the overlay engine.
pub trait CapabilityGate {
    /// Whether `actor` may edit `page`.
    ///
    /// `None` asks for the general edit permission, used when the target
    /// page does not exist yet.
    fn can_edit(&self, actor: &Actor, page: Option<&Page>) -> bool;

    /// Whether `actor` may publish (commit drafts on) `page`.
    fn can_admin(&self, actor: &Actor, page: &Page) -> bool;

    /// Criteria restricting queries to pages `actor` may see, or only those
    /// it may edit when `editable_only` is set.
    fn permission_scope(&self, actor: &Actor, editable_only: bool) -> Criteria;
}

/// Per-page capability flags attached to query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PageCapabilities {
    pub can_edit: bool,
    pub can_admin: bool,
}

impl PageCapabilities {
    pub fn evaluate(gate: &dyn CapabilityGate, actor: &Actor, page: &Page) -> Self {
        Self {
            can_edit: gate.can_edit(actor, Some(page)),
            can_admin: gate.can_admin(actor, page),
        }
    }
}

/// Gate driven by `Actor::role` and page-level `editors` grants.
///
/// | role        | sees                         | edits             | commits |
/// |-------------|------------------------------|-------------------|---------|
/// | guest       | published                    | nothing           | no      |
/// | contributor | published + granted          | granted pages     | no      |
/// | editor      | everything                   | everything        | no      |
/// | admin       | everything                   | everything        | yes     |
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleCapabilityGate;

impl CapabilityGate for RoleCapabilityGate {
    fn can_edit(&self, actor: &Actor, page: Option<&Page>) -> bool {
        match actor.role {
            Role::Admin | Role::Editor => true,
            Role::Contributor => {
                page.is_some_and(|page| page.editors.iter().any(|id| *id == actor.id))
            }
            Role::Guest => false,
        }
    }

    fn can_admin(&self, actor: &Actor, _page: &Page) -> bool {
        actor.role == Role::Admin
    }

    fn permission_scope(&self, actor: &Actor, editable_only: bool) -> Criteria {
        match (actor.role, editable_only) {
            (Role::Admin | Role::Editor, _) => Criteria::Everything,
            (Role::Contributor, true) => Criteria::EditorsInclude(actor.id.clone()),
            (Role::Contributor, false) => Criteria::Or(vec![
                Criteria::IsTrue(PageField::Published),
                Criteria::EditorsInclude(actor.id.clone()),
            ]),
            (Role::Guest, true) => Criteria::Nothing,
            (Role::Guest, false) => Criteria::IsTrue(PageField::Published),
        }
    }
}
