//! Account Models
//! Mission: Define user records, role profiles and the auth wire types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User roles for RBAC
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
    Parent,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
            Role::Parent => "parent",
            Role::Staff => "staff",
        }
    }

    /// "Teacher", "Student", ... as shown to people
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Teacher => "Teacher",
            Role::Student => "Student",
            Role::Parent => "Parent",
            Role::Staff => "Staff",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            "parent" => Ok(Role::Parent),
            "staff" => Ok(Role::Staff),
            _ => Err(format!("{:?} is not a valid role", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Child {
    pub name: String,
    pub grade: String,
}

impl Default for Child {
    fn default() -> Self {
        Self {
            name: "Child".to_string(),
            grade: "Grade 10".to_string(),
        }
    }
}

/// Role-specific fields, keyed by the `role` tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Profile {
    Admin,
    Teacher {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        designation: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subject: Option<String>,
    },
    Student {
        #[serde(default, rename = "rollNumber", skip_serializing_if = "Option::is_none")]
        roll_number: Option<String>,
        #[serde(default, rename = "className", skip_serializing_if = "Option::is_none")]
        class_name: Option<String>,
    },
    Parent {
        #[serde(default)]
        children: Vec<Child>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        relationship: Option<String>,
    },
    Staff {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        designation: Option<String>,
    },
}

impl Profile {
    pub fn role(&self) -> Role {
        match self {
            Profile::Admin => Role::Admin,
            Profile::Teacher { .. } => Role::Teacher,
            Profile::Student { .. } => Role::Student,
            Profile::Parent { .. } => Role::Parent,
            Profile::Staff { .. } => Role::Staff,
        }
    }

    /// Fill defaults a freshly registered account should carry.
    pub(crate) fn normalized(self) -> Self {
        match self {
            Profile::Parent {
                children,
                relationship,
            } if children.is_empty() => Profile::Parent {
                children: vec![Child::default()],
                relationship,
            },
            other => other,
        }
    }
}

/// Stored user account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// bcrypt hash; only ever serialized to storage, see `PublicUser`
    #[serde(rename = "password")]
    pub password_hash: String,
    pub is_first_login: bool,
    pub created_at: DateTime<Utc>,
    pub status: UserStatus,
    #[serde(flatten)]
    pub profile: Profile,
}

impl User {
    pub fn role(&self) -> Role {
        self.profile.role()
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub fn email_matches(&self, email: &str) -> bool {
        self.email.trim().eq_ignore_ascii_case(email.trim())
    }
}

/// User response (sanitized)
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub is_first_login: bool,
    pub created_at: DateTime<Utc>,
    pub status: UserStatus,
    #[serde(flatten)]
    pub profile: Profile,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            is_first_login: user.is_first_login,
            created_at: user.created_at,
            status: user.status,
            profile: user.profile.clone(),
        }
    }
}

impl PublicUser {
    pub fn role(&self) -> Role {
        self.profile.role()
    }
}

/// Fields for registering any account.
///
/// Without a `password` one is generated and delivered to the new user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(flatten)]
    pub profile: Profile,
}

/// Admin self-registration body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminRegistration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub password: String,
}

/// Partial profile update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileEdit {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Replaces the role-specific fields; must keep the same role
    pub profile: Option<Profile>,
}

/// JWT Claims payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: String, // user id
    pub email: String,
    pub role: Role,
    pub iat: usize,
    pub exp: usize,
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub expires_in: usize, // seconds until expiration
    pub user: PublicUser,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    /// Optional; when present it must name the caller
    #[serde(default)]
    pub user_id: Option<String>,
    pub current_password: String,
    pub new_password: String,
}
