//! Role-based authorization.
//!
//! Roles and account types are closed sets. [`capabilities`] is the single
//! place that maps them to what a caller may do; handlers ask the resulting
//! [`Capabilities`] instead of comparing role names.

use core::{fmt, str::FromStr};

use crate::Error;

/// A user's role within their tenant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Role {
    SuperAdmin,
    Admin,
    Manager,
    Technician,
    #[default]
    User,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Technician => "technician",
            Self::User => "user",
        }
    }

    /// Parses a role, treating anything unrecognised as [`Role::User`].
    pub fn parse_lenient(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "super_admin" | "superadmin" => Ok(Self::SuperAdmin),
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "technician" | "tech" => Ok(Self::Technician),
            "user" | "end_user" => Ok(Self::User),
            _ => Err(Error::InvalidInput {
                reason: format!("unknown role `{raw}`"),
            }),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the tenant is a company with many users or a single person.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AccountType {
    #[default]
    Organisation,
    Individual,
}

impl AccountType {
    /// Parses an account type, treating anything unrecognised as
    /// [`AccountType::Organisation`].
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "individual" | "personal" => Self::Individual,
            _ => Self::Organisation,
        }
    }
}

/// One thing a caller may be allowed to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Capability {
    ConfigureTagFormats,
    GenerateTags,
    CreateAssets,
    ViewAssets,
    ManageUsers,
    ViewCompliance,
    ViewMonitoring,
    ManageTenants,
}

impl Capability {
    pub const ALL: [Self; 8] = [
        Self::ConfigureTagFormats,
        Self::GenerateTags,
        Self::CreateAssets,
        Self::ViewAssets,
        Self::ManageUsers,
        Self::ViewCompliance,
        Self::ViewMonitoring,
        Self::ManageTenants,
    ];

    const fn bit(self) -> u16 {
        1 << self as u16
    }
}

/// A set of [`Capability`] values.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Capabilities(u16);

impl Capabilities {
    pub const NONE: Self = Self(0);

    pub const fn of(capabilities: &[Capability]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < capabilities.len() {
            bits |= capabilities[i].bit();
            i += 1;
        }
        Self(bits)
    }

    pub const fn all() -> Self {
        Self::of(&Capability::ALL)
    }

    pub const fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    pub const fn without(self, capability: Capability) -> Self {
        Self(self.0 & !capability.bit())
    }

    pub const fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

const MANAGER: Capabilities = Capabilities::of(&[
    Capability::GenerateTags,
    Capability::CreateAssets,
    Capability::ViewAssets,
    Capability::ViewCompliance,
    Capability::ViewMonitoring,
]);

const TECHNICIAN: Capabilities = Capabilities::of(&[
    Capability::GenerateTags,
    Capability::CreateAssets,
    Capability::ViewAssets,
    Capability::ViewMonitoring,
]);

const USER: Capabilities = Capabilities::of(&[Capability::ViewAssets]);

/// Resolves what a caller with `role` in an `account_type` tenant may do.
///
/// An individual account is its own administrator, but has no other users or
/// tenants to manage.
pub const fn capabilities(role: Role, account_type: AccountType) -> Capabilities {
    let admin = Capabilities::all().without(Capability::ManageTenants);
    match (role, account_type) {
        (Role::SuperAdmin, _) => Capabilities::all(),
        (_, AccountType::Individual) => admin.without(Capability::ManageUsers),
        (Role::Admin, AccountType::Organisation) => admin,
        (Role::Manager, AccountType::Organisation) => MANAGER,
        (Role::Technician, AccountType::Organisation) => TECHNICIAN,
        (Role::User, AccountType::Organisation) => USER,
    }
}

/// Application pages gated by capability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Page {
    Dashboard,
    Tickets,
    Assets,
    NewAsset,
    TagFormats,
    Compliance,
    Monitoring,
    Users,
    Tenants,
}

impl Page {
    pub const ALL: [Self; 9] = [
        Self::Dashboard,
        Self::Tickets,
        Self::Assets,
        Self::NewAsset,
        Self::TagFormats,
        Self::Compliance,
        Self::Monitoring,
        Self::Users,
        Self::Tenants,
    ];

    /// The capability the page requires; `None` means any signed-in user.
    pub const fn required(self) -> Option<Capability> {
        match self {
            Self::Dashboard | Self::Tickets => None,
            Self::Assets => Some(Capability::ViewAssets),
            Self::NewAsset => Some(Capability::CreateAssets),
            Self::TagFormats => Some(Capability::ConfigureTagFormats),
            Self::Compliance => Some(Capability::ViewCompliance),
            Self::Monitoring => Some(Capability::ViewMonitoring),
            Self::Users => Some(Capability::ManageUsers),
            Self::Tenants => Some(Capability::ManageTenants),
        }
    }
}

impl Capabilities {
    pub const fn can_access(self, page: Page) -> bool {
        match page.required() {
            Some(capability) => self.contains(capability),
            None => true,
        }
    }
}
