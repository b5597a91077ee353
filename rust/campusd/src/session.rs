//! Session & scope store.
//!
//! Single owner of "who is signed in" and "which organizational unit they are
//! working in". Every mutation goes through a method here so the cascading
//! clear is applied in one step: callers never observe an institute cleared
//! with its class still set.
//!
//! Scope levels form two roots. `organization` sits above the institute
//! chain, so selecting or clearing it clears `institute > class > subject`,
//! but an institute may be selected without any organization. `child` is
//! outside both chains.
use serde::{Deserialize, Serialize};

use crate::access::capability::Role;
use crate::error::ScopeError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeLevel {
    Organization,
    Institute,
    Class,
    Subject,
    Child,
}

impl ScopeLevel {
    /// Cascade order; `Child` is not part of it.
    const CHAIN: [ScopeLevel; 4] = [
        ScopeLevel::Organization,
        ScopeLevel::Institute,
        ScopeLevel::Class,
        ScopeLevel::Subject,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ScopeLevel::Organization => "organization",
            ScopeLevel::Institute => "institute",
            ScopeLevel::Class => "class",
            ScopeLevel::Subject => "subject",
            ScopeLevel::Child => "child",
        }
    }

    /// The level that must already be set before this one can be selected.
    pub fn parent(self) -> Option<ScopeLevel> {
        match self {
            ScopeLevel::Class => Some(ScopeLevel::Institute),
            ScopeLevel::Subject => Some(ScopeLevel::Class),
            _ => None,
        }
    }

    fn below(self) -> &'static [ScopeLevel] {
        match Self::CHAIN.iter().position(|l| *l == self) {
            Some(idx) => &Self::CHAIN[idx + 1..],
            None => &[],
        }
    }
}

impl std::fmt::Display for ScopeLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScopeLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "organization" => Ok(ScopeLevel::Organization),
            "institute" => Ok(ScopeLevel::Institute),
            "class" => Ok(ScopeLevel::Class),
            "subject" => Ok(ScopeLevel::Subject),
            "child" => Ok(ScopeLevel::Child),
            _ => Err(format!("{:?} is not a scope level", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScopeSelection {
    pub organization: Option<ScopeRef>,
    pub institute: Option<ScopeRef>,
    pub class: Option<ScopeRef>,
    pub subject: Option<ScopeRef>,
    pub child: Option<ScopeRef>,
}

impl ScopeSelection {
    pub fn get(&self, level: ScopeLevel) -> Option<&ScopeRef> {
        match level {
            ScopeLevel::Organization => self.organization.as_ref(),
            ScopeLevel::Institute => self.institute.as_ref(),
            ScopeLevel::Class => self.class.as_ref(),
            ScopeLevel::Subject => self.subject.as_ref(),
            ScopeLevel::Child => self.child.as_ref(),
        }
    }

    fn slot(&mut self, level: ScopeLevel) -> &mut Option<ScopeRef> {
        match level {
            ScopeLevel::Organization => &mut self.organization,
            ScopeLevel::Institute => &mut self.institute,
            ScopeLevel::Class => &mut self.class,
            ScopeLevel::Subject => &mut self.subject,
            ScopeLevel::Child => &mut self.child,
        }
    }

    pub fn is_set(&self, level: ScopeLevel) -> bool {
        self.get(level).is_some()
    }

    pub fn is_empty(&self) -> bool {
        *self == ScopeSelection::default()
    }

    /// No level of the institute chain is set without the level above it.
    #[cfg(test)]
    pub fn is_consistent(&self) -> bool {
        [ScopeLevel::Class, ScopeLevel::Subject].iter().all(|l| {
            !self.is_set(*l) || l.parent().map(|p| self.is_set(p)).unwrap_or(true)
        })
    }
}

/// Snapshot of the store's generation counters, taken before an
/// asynchronous call. A response is applied only while the ticket is still
/// current. Hosts running their own scope-dependent fetches hold it as an
/// opaque value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchTicket {
    identity_epoch: u64,
    scope_epoch: Option<u64>,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    identity: Option<Identity>,
    scope: ScopeSelection,
    identity_epoch: u64,
    scope_epoch: u64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn role(&self) -> Option<Role> {
        self.identity.as_ref().map(|i| i.role)
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn scope(&self) -> &ScopeSelection {
        &self.scope
    }

    /// Replaces the identity and drops every scope selection.
    pub fn set_identity(&mut self, identity: Identity) {
        tracing::debug!(user = %identity.id, role = %identity.role, "identity set");
        self.identity = Some(identity);
        self.scope = ScopeSelection::default();
        self.identity_epoch += 1;
        self.scope_epoch += 1;
    }

    pub fn logout(&mut self) {
        if self.identity.is_some() {
            tracing::debug!("session cleared");
        }
        self.identity = None;
        self.scope = ScopeSelection::default();
        self.identity_epoch += 1;
        self.scope_epoch += 1;
    }

    pub fn select_scope(&mut self, level: ScopeLevel, value: ScopeRef) -> Result<(), ScopeError> {
        let Some(identity) = self.identity.as_ref() else {
            return Err(ScopeError::Unauthenticated);
        };
        if level == ScopeLevel::Child && identity.role != Role::Parent {
            return Err(ScopeError::ChildRequiresParent);
        }
        if let Some(parent) = level.parent() {
            if !self.scope.is_set(parent) {
                return Err(ScopeError::MissingParent { level, parent });
            }
        }

        // Build the next selection fully before swapping it in.
        let mut next = self.scope.clone();
        for lower in level.below() {
            *next.slot(*lower) = None;
        }
        tracing::debug!(level = %level, id = %value.id, "scope selected");
        *next.slot(level) = Some(value);
        self.scope = next;
        self.scope_epoch += 1;
        Ok(())
    }

    pub fn clear_scope(&mut self, level: ScopeLevel) {
        let mut next = self.scope.clone();
        *next.slot(level) = None;
        for lower in level.below() {
            *next.slot(*lower) = None;
        }
        if next != self.scope {
            tracing::debug!(level = %level, "scope cleared");
            self.scope = next;
            self.scope_epoch += 1;
        }
    }

    pub fn clear_child(&mut self) {
        self.clear_scope(ScopeLevel::Child);
    }

    /// `scoped = false` for data that belongs to the identity itself (such as
    /// own payments), which survives scope changes.
    pub fn ticket(&self, scoped: bool) -> FetchTicket {
        FetchTicket {
            identity_epoch: self.identity_epoch,
            scope_epoch: scoped.then_some(self.scope_epoch),
        }
    }

    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.identity_epoch == self.identity_epoch
            && ticket
                .scope_epoch
                .map(|e| e == self.scope_epoch)
                .unwrap_or(true)
    }
}
