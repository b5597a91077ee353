use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Student,
    Parent,
    Teacher,
    InstituteAdmin,
    OrganizationManager,
    AttendanceMarker,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Student,
        Role::Parent,
        Role::Teacher,
        Role::InstituteAdmin,
        Role::OrganizationManager,
        Role::AttendanceMarker,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "Student",
            Role::Parent => "Parent",
            Role::Teacher => "Teacher",
            Role::InstituteAdmin => "InstituteAdmin",
            Role::OrganizationManager => "OrganizationManager",
            Role::AttendanceMarker => "AttendanceMarker",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("{:?} is not a valid role", s))
    }
}

/// Atomic permission token. The set is closed; tokens that do not parse are
/// treated as granted to nobody.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    Dashboard,
    OwnProfile,
    OwnPayments,
    InstituteDirectory,
    OrganizationDirectory,
    ViewUsers,
    ViewStudents,
    ViewTeachers,
    ViewParents,
    ViewGrades,
    ViewClasses,
    ViewSubjects,
    ViewAttendance,
    MarkAttendance,
    ViewLectures,
    ViewHomework,
    ViewExams,
    ViewResults,
    ViewInstituteDetails,
    ViewGallery,
    ViewChildren,
}

impl Capability {
    pub const ALL: [Capability; 21] = [
        Capability::Dashboard,
        Capability::OwnProfile,
        Capability::OwnPayments,
        Capability::InstituteDirectory,
        Capability::OrganizationDirectory,
        Capability::ViewUsers,
        Capability::ViewStudents,
        Capability::ViewTeachers,
        Capability::ViewParents,
        Capability::ViewGrades,
        Capability::ViewClasses,
        Capability::ViewSubjects,
        Capability::ViewAttendance,
        Capability::MarkAttendance,
        Capability::ViewLectures,
        Capability::ViewHomework,
        Capability::ViewExams,
        Capability::ViewResults,
        Capability::ViewInstituteDetails,
        Capability::ViewGallery,
        Capability::ViewChildren,
    ];

    /// Capabilities usable before any institute or organization is chosen.
    pub const SCOPE_FREE: [Capability; 5] = [
        Capability::Dashboard,
        Capability::OwnProfile,
        Capability::OwnPayments,
        Capability::InstituteDirectory,
        Capability::OrganizationDirectory,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Dashboard => "dashboard",
            Capability::OwnProfile => "own-profile",
            Capability::OwnPayments => "own-payments",
            Capability::InstituteDirectory => "institute-directory",
            Capability::OrganizationDirectory => "organization-directory",
            Capability::ViewUsers => "view-users",
            Capability::ViewStudents => "view-students",
            Capability::ViewTeachers => "view-teachers",
            Capability::ViewParents => "view-parents",
            Capability::ViewGrades => "view-grades",
            Capability::ViewClasses => "view-classes",
            Capability::ViewSubjects => "view-subjects",
            Capability::ViewAttendance => "view-attendance",
            Capability::MarkAttendance => "mark-attendance",
            Capability::ViewLectures => "view-lectures",
            Capability::ViewHomework => "view-homework",
            Capability::ViewExams => "view-exams",
            Capability::ViewResults => "view-results",
            Capability::ViewInstituteDetails => "view-institute-details",
            Capability::ViewGallery => "view-gallery",
            Capability::ViewChildren => "view-children",
        }
    }

    pub fn is_scope_free(self) -> bool {
        Self::SCOPE_FREE.contains(&self)
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Capability {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str() == value)
            .ok_or(())
    }
}

impl Serialize for Capability {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Capability {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse()
            .map_err(|_| serde::de::Error::custom(format!("unknown capability: {raw}")))
    }
}
