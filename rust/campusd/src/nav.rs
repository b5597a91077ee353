//! Navigation surface derived from the access resolver.
use serde::Serialize;

use crate::access::{AccessResolver, Capability};
use crate::error::NavError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationEntry {
    pub key: &'static str,
    pub label: &'static str,
    pub capability: Option<Capability>,
    pub visible_when_no_scope: bool,
    pub route: &'static str,
}

const fn entry(
    key: &'static str,
    label: &'static str,
    capability: Option<Capability>,
    visible_when_no_scope: bool,
    route: &'static str,
) -> NavigationEntry {
    NavigationEntry {
        key,
        label,
        capability,
        visible_when_no_scope,
        route,
    }
}

/// Declaration order is display order.
#[rustfmt::skip]
pub const ENTRIES: &[NavigationEntry] = &[
    entry("dashboard", "Dashboard", Some(Capability::Dashboard), false, "/"),
    entry("select-institute", "Select Institute", Some(Capability::InstituteDirectory), true, "/select-institute"),
    entry("organizations", "Organizations", Some(Capability::OrganizationDirectory), true, "/organizations"),
    entry("system-payments", "Payment", Some(Capability::OwnPayments), true, "/system-payments"),
    entry("users", "Users", Some(Capability::ViewUsers), false, "/users"),
    entry("students", "Students", Some(Capability::ViewStudents), false, "/students"),
    entry("teachers", "Teachers", Some(Capability::ViewTeachers), false, "/teachers"),
    entry("parents", "Parents", Some(Capability::ViewParents), false, "/parents"),
    entry("parent-children", "My Children", Some(Capability::ViewChildren), false, "/parent-children"),
    entry("grades", "Grades", Some(Capability::ViewGrades), false, "/grades"),
    entry("classes", "Classes", Some(Capability::ViewClasses), false, "/classes"),
    entry("subjects", "Subjects", Some(Capability::ViewSubjects), false, "/subjects"),
    entry("attendance", "Attendance", Some(Capability::ViewAttendance), false, "/attendance"),
    entry("attendance-marking", "Mark Attendance", Some(Capability::MarkAttendance), false, "/attendance-marking"),
    entry("qr-attendance", "QR Attendance", Some(Capability::MarkAttendance), false, "/qr-attendance"),
    entry("lectures", "Lectures", Some(Capability::ViewLectures), false, "/lectures"),
    entry("homework", "Homework", Some(Capability::ViewHomework), false, "/homework"),
    entry("exams", "Exams", Some(Capability::ViewExams), false, "/exams"),
    entry("results", "Results", Some(Capability::ViewResults), false, "/results"),
    entry("institute-details", "Institute Details", Some(Capability::ViewInstituteDetails), false, "/institute-details"),
    entry("gallery", "Gallery", Some(Capability::ViewGallery), false, "/gallery"),
    entry("profile", "Profile", Some(Capability::OwnProfile), true, "/profile"),
    entry("appearance", "Appearance", None, true, "/appearance"),
];

// Older links that still resolve to a current page.
const PATH_ALIASES: &[(&str, &str)] = &[
    ("/dashboard", "dashboard"),
    ("/institutes", "select-institute"),
];

const LANDING_PAGES: &[&str] = &["dashboard", "select-institute"];

/// `(entry key, capability)` pairs for the startup coverage check.
pub fn capability_references(
    entries: &'static [NavigationEntry],
) -> impl Iterator<Item = (&'static str, Capability)> {
    entries
        .iter()
        .filter_map(|e| e.capability.map(|c| (e.key, c)))
}

pub fn find_entry(entries: &'static [NavigationEntry], key: &str) -> Option<&'static NavigationEntry> {
    entries.iter().find(|e| e.key == key)
}

/// `/` is the dashboard; other paths are matched on the route table, then on
/// aliases, then as a bare key with the leading slash removed.
pub fn page_from_path(entries: &'static [NavigationEntry], path: &str) -> Option<&'static NavigationEntry> {
    let path = match path.trim_end_matches('/') {
        "" => "/",
        p => p,
    };
    if let Some(e) = entries.iter().find(|e| e.route == path) {
        return Some(e);
    }
    if let Some((_, key)) = PATH_ALIASES.iter().find(|(p, _)| *p == path) {
        return find_entry(entries, key);
    }
    find_entry(entries, path.trim_start_matches('/'))
}

pub struct NavigationComposer<'a> {
    resolver: AccessResolver<'a>,
    entries: &'static [NavigationEntry],
}

impl<'a> NavigationComposer<'a> {
    pub fn new(resolver: AccessResolver<'a>, entries: &'static [NavigationEntry]) -> Self {
        Self { resolver, entries }
    }

    fn admits(&self, entry: &NavigationEntry) -> bool {
        if !self.resolver.session().is_authenticated() {
            return false;
        }
        if let Some(cap) = entry.capability {
            if !self.resolver.can_access(cap) {
                return false;
            }
        }
        self.resolver.has_root_scope() || entry.visible_when_no_scope
    }

    pub fn visible_entries(&self) -> Vec<&'static NavigationEntry> {
        self.entries.iter().filter(|e| self.admits(e)).collect()
    }

    pub fn is_selectable(&self, entry: &NavigationEntry) -> bool {
        self.admits(entry)
    }

    /// Why `entry` cannot be entered, if it cannot.
    pub fn check(&self, entry: &NavigationEntry) -> Result<(), NavError> {
        let session = self.resolver.session();
        let Some(role) = session.role() else {
            return Err(NavError::Unauthenticated);
        };
        if let Some(cap) = entry.capability {
            if !self.resolver.matrix().has_permission(role, cap) {
                return Err(NavError::NotPermitted(entry.key.to_string()));
            }
            if let Some(level) = self.resolver.requires_scope(cap) {
                if !session.scope().is_set(level) {
                    return Err(NavError::ScopeRequired {
                        page: entry.key.to_string(),
                        level,
                    });
                }
            }
        }
        if !self.admits(entry) {
            return Err(NavError::ScopeRequired {
                page: entry.key.to_string(),
                level: crate::access::resolver::scope_root(role),
            });
        }
        Ok(())
    }

    /// Accepts a page key or a route path.
    pub fn resolve(&self, target: &str) -> Result<&'static NavigationEntry, NavError> {
        let found = if target.starts_with('/') {
            page_from_path(self.entries, target)
        } else {
            find_entry(self.entries, target)
        };
        let entry = found.ok_or_else(|| NavError::UnknownPage(target.to_string()))?;
        self.check(entry)?;
        Ok(entry)
    }

    pub fn landing(&self) -> Option<&'static NavigationEntry> {
        LANDING_PAGES
            .iter()
            .filter_map(|k| find_entry(self.entries, k))
            .find(|e| self.admits(e))
            .or_else(|| self.visible_entries().into_iter().next())
    }
}

/// Tracks the page the host is showing.
#[derive(Debug, Default)]
pub struct Navigator {
    current: Option<&'static str>,
}

impl Navigator {
    pub fn current(&self) -> Option<&'static str> {
        self.current
    }

    /// A blocked transition leaves the current page unchanged.
    pub fn navigate(
        &mut self,
        composer: &NavigationComposer<'_>,
        target: &str,
    ) -> Result<&'static NavigationEntry, NavError> {
        let entry = composer.resolve(target)?;
        tracing::debug!(page = entry.key, "navigated");
        self.current = Some(entry.key);
        Ok(entry)
    }

    /// Called after identity or scope changes. Moves off a page that is no
    /// longer selectable; returns the new page when it moved.
    pub fn reconcile(&mut self, composer: &NavigationComposer<'_>) -> Option<&'static str> {
        let still_valid = self
            .current
            .and_then(|k| find_entry(composer.entries, k))
            .map(|e| composer.is_selectable(e))
            .unwrap_or(false);
        if still_valid {
            return None;
        }
        let next = composer.landing().map(|e| e.key);
        if next != self.current {
            tracing::debug!(from = ?self.current, to = ?next, "current page reset");
            self.current = next;
            return next;
        }
        None
    }
}
