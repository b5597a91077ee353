use super::capability::{Capability, Role};
use super::matrix::PermissionMatrix;
use crate::session::{ScopeLevel, SessionStore};

/// Role gate followed by scope gate; the more restrictive answer wins.
///
/// Borrows the store instead of caching, so every answer reflects the
/// store as it is at the moment of the call.
#[derive(Clone, Copy)]
pub struct AccessResolver<'a> {
    session: &'a SessionStore,
    matrix: &'a PermissionMatrix,
}

/// Root of the scope chain a role works under.
pub fn scope_root(role: Role) -> ScopeLevel {
    match role {
        Role::OrganizationManager => ScopeLevel::Organization,
        _ => ScopeLevel::Institute,
    }
}

impl<'a> AccessResolver<'a> {
    pub fn new(session: &'a SessionStore, matrix: &'a PermissionMatrix) -> Self {
        Self { session, matrix }
    }

    pub fn session(&self) -> &'a SessionStore {
        self.session
    }

    pub fn matrix(&self) -> &'a PermissionMatrix {
        self.matrix
    }

    /// Level that must be selected before `capability` is usable, or `None`
    /// when it is usable with no scope at all. Signed out, the institute
    /// root is reported.
    pub fn requires_scope(&self, capability: Capability) -> Option<ScopeLevel> {
        if capability.is_scope_free() {
            return None;
        }
        Some(
            self.session
                .role()
                .map(scope_root)
                .unwrap_or(ScopeLevel::Institute),
        )
    }

    pub fn has_root_scope(&self) -> bool {
        match self.session.role() {
            Some(role) => self.session.scope().is_set(scope_root(role)),
            None => false,
        }
    }

    pub fn can_access(&self, capability: Capability) -> bool {
        let Some(role) = self.session.role() else {
            return false;
        };
        if !self.matrix.has_permission(role, capability) {
            return false;
        }
        match self.requires_scope(capability) {
            Some(level) => self.session.scope().is_set(level),
            None => true,
        }
    }

    pub fn can_access_token(&self, capability: &str) -> bool {
        capability
            .parse::<Capability>()
            .map(|c| self.can_access(c))
            .unwrap_or(false)
    }
}
