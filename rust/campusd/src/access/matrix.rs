//! Role/capability grant table.
//!
//! Lookups are pure and fail closed: a capability without a row, or a token
//! that names no known role or capability, is granted to nobody.
use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Deserialize;

use super::capability::Role::{
    AttendanceMarker as Marker, InstituteAdmin as Admin, OrganizationManager as OrgManager,
    Parent, Student, Teacher,
};
use super::capability::{Capability, Role};
use crate::error::ConfigurationError;

pub const BUILTIN_MATRIX_VERSION: u32 = 1;

const EVERYONE: &[Role] = &[Student, Parent, Teacher, Admin, OrgManager, Marker];

const BUILTIN_GRANTS: &[(Capability, &[Role])] = &[
    (Capability::Dashboard, EVERYONE),
    (Capability::OwnProfile, EVERYONE),
    (Capability::OwnPayments, &[Student, Parent, Teacher, Admin]),
    (Capability::InstituteDirectory, EVERYONE),
    (Capability::OrganizationDirectory, EVERYONE),
    (Capability::ViewUsers, &[Admin, OrgManager]),
    (Capability::ViewStudents, &[Teacher, Admin, Marker]),
    (Capability::ViewTeachers, &[Teacher, Admin]),
    (Capability::ViewParents, &[Teacher, Admin]),
    (Capability::ViewGrades, &[Student, Teacher, Admin]),
    (Capability::ViewClasses, &[Student, Teacher, Admin]),
    (Capability::ViewSubjects, &[Student, Teacher, Admin]),
    (Capability::ViewAttendance, &[Student, Parent, Teacher, Admin, Marker]),
    (Capability::MarkAttendance, &[Teacher, Admin, Marker]),
    (Capability::ViewLectures, &[Student, Teacher, Admin, OrgManager]),
    (Capability::ViewHomework, &[Student, Parent, Teacher, Admin]),
    (Capability::ViewExams, &[Student, Parent, Teacher, Admin]),
    (Capability::ViewResults, &[Student, Parent, Teacher, Admin]),
    (Capability::ViewInstituteDetails, &[Student, Parent, Teacher, Admin, OrgManager]),
    (Capability::ViewGallery, &[Student, Parent, Teacher, Admin, OrgManager]),
    (Capability::ViewChildren, &[Parent]),
];

#[derive(Debug, Deserialize)]
struct MatrixFile {
    version: u32,
    #[serde(default)]
    grants: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct PermissionMatrix {
    version: u32,
    rows: HashMap<Capability, HashSet<Role>>,
}

impl PermissionMatrix {
    pub fn builtin() -> Self {
        let rows = BUILTIN_GRANTS
            .iter()
            .map(|(cap, roles)| (*cap, roles.iter().copied().collect()))
            .collect();
        Self {
            version: BUILTIN_MATRIX_VERSION,
            rows,
        }
    }

    /// Parse a replacement table:
    ///
    /// ```toml
    /// version = 2
    /// [grants]
    /// dashboard = ["Student", "Teacher"]
    /// ```
    ///
    /// Capabilities missing from the file get no row at all; whether that is
    /// acceptable is decided by [`PermissionMatrix::ensure_covers`].
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigurationError> {
        let file: MatrixFile =
            toml::from_str(raw).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        let mut rows = HashMap::new();
        for (cap_raw, role_names) in file.grants {
            let cap: Capability = cap_raw
                .parse()
                .map_err(|_| ConfigurationError::UnknownCapability(cap_raw.clone()))?;
            let mut roles = HashSet::new();
            for name in role_names {
                let role: Role = name
                    .parse()
                    .map_err(|_| ConfigurationError::UnknownRole(name.clone()))?;
                roles.insert(role);
            }
            rows.insert(cap, roles);
        }
        Ok(Self {
            version: file.version,
            rows,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn has_row(&self, capability: Capability) -> bool {
        self.rows.contains_key(&capability)
    }

    pub fn has_permission(&self, role: Role, capability: Capability) -> bool {
        self.rows
            .get(&capability)
            .map(|roles| roles.contains(&role))
            .unwrap_or(false)
    }

    /// String-level lookup for callers holding raw tokens.
    pub fn has_permission_token(&self, role: &str, capability: &str) -> bool {
        match (role.parse::<Role>(), capability.parse::<Capability>()) {
            (Ok(role), Ok(capability)) => self.has_permission(role, capability),
            _ => false,
        }
    }

    pub fn granted(&self, role: Role) -> Vec<Capability> {
        let mut caps: Vec<Capability> = self
            .rows
            .iter()
            .filter(|(_, roles)| roles.contains(&role))
            .map(|(cap, _)| *cap)
            .collect();
        caps.sort();
        caps
    }

    /// Every `(entry key, capability)` pair must have a row.
    pub fn ensure_covers<'a, I>(&self, references: I) -> Result<(), ConfigurationError>
    where
        I: IntoIterator<Item = (&'a str, Capability)>,
    {
        for (entry, capability) in references {
            if !self.has_row(capability) {
                return Err(ConfigurationError::MissingCapability {
                    entry: entry.to_string(),
                    capability: capability.as_str().to_string(),
                });
            }
        }
        Ok(())
    }
}
