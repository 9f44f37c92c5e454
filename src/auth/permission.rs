//! Permission catalog and evaluation.
//!
//! Modules and actions are closed enums; the database stores their string
//! forms. Built-in roles are derived from the catalog by rule rather than
//! listed by hand, so new catalog entries flow into them automatically.

use std::fmt;
use std::str::FromStr;

use crate::db::Permission;

/// Functional area of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Module {
    Customers,
    Products,
    Orders,
    Invoices,
    Deliveries,
    Reports,
    Settings,
    Security,
}

impl Module {
    pub const ALL: [Module; 8] = [
        Module::Customers,
        Module::Products,
        Module::Orders,
        Module::Invoices,
        Module::Deliveries,
        Module::Reports,
        Module::Settings,
        Module::Security,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Customers => "customers",
            Module::Products => "products",
            Module::Orders => "orders",
            Module::Invoices => "invoices",
            Module::Deliveries => "deliveries",
            Module::Reports => "reports",
            Module::Settings => "settings",
            Module::Security => "security",
        }
    }
}

/// Verb applied to a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
    Approve,
    Export,
    ManageUsers,
    ManageRoles,
    ViewAudit,
}

impl Action {
    pub const ALL: [Action; 9] = [
        Action::View,
        Action::Create,
        Action::Edit,
        Action::Delete,
        Action::Approve,
        Action::Export,
        Action::ManageUsers,
        Action::ManageRoles,
        Action::ViewAudit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
            Action::Approve => "approve",
            Action::Export => "export",
            Action::ManageUsers => "manage_users",
            Action::ManageRoles => "manage_roles",
            Action::ViewAudit => "view_audit",
        }
    }
}

macro_rules! str_enum_impls {
    ($ty:ident, $what:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $ty::ALL
                    .into_iter()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| format!(concat!("unknown ", $what, ": {}"), s))
            }
        }
    };
}

str_enum_impls!(Module, "module");
str_enum_impls!(Action, "action");

/// A catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionDef {
    pub module: Module,
    pub action: Action,
    pub description: &'static str,
}

const fn def(module: Module, action: Action, description: &'static str) -> PermissionDef {
    PermissionDef {
        module,
        action,
        description,
    }
}

/// Every permission the application knows about.
pub const CATALOG: &[PermissionDef] = &[
    def(Module::Customers, Action::View, "View customers"),
    def(Module::Customers, Action::Create, "Create customers"),
    def(Module::Customers, Action::Edit, "Edit customers"),
    def(Module::Customers, Action::Delete, "Delete customers"),
    def(Module::Customers, Action::Export, "Export customers"),
    def(Module::Products, Action::View, "View products"),
    def(Module::Products, Action::Create, "Create products"),
    def(Module::Products, Action::Edit, "Edit products"),
    def(Module::Products, Action::Delete, "Delete products"),
    def(Module::Orders, Action::View, "View orders"),
    def(Module::Orders, Action::Create, "Create orders"),
    def(Module::Orders, Action::Edit, "Edit orders"),
    def(Module::Orders, Action::Delete, "Delete orders"),
    def(Module::Orders, Action::Approve, "Approve orders"),
    def(Module::Invoices, Action::View, "View invoices"),
    def(Module::Invoices, Action::Create, "Create invoices"),
    def(Module::Invoices, Action::Edit, "Edit invoices"),
    def(Module::Invoices, Action::Delete, "Delete invoices"),
    def(Module::Invoices, Action::Approve, "Approve invoices"),
    def(Module::Invoices, Action::Export, "Export invoices"),
    def(Module::Deliveries, Action::View, "View deliveries"),
    def(Module::Deliveries, Action::Create, "Create deliveries"),
    def(Module::Deliveries, Action::Edit, "Edit deliveries"),
    def(Module::Deliveries, Action::Delete, "Delete deliveries"),
    def(Module::Reports, Action::View, "View reports"),
    def(Module::Reports, Action::Export, "Export reports"),
    def(Module::Settings, Action::View, "View settings"),
    def(Module::Settings, Action::Edit, "Edit settings"),
    def(Module::Security, Action::ManageUsers, "Manage user accounts"),
    def(Module::Security, Action::ManageRoles, "Manage roles and permissions"),
    def(Module::Security, Action::ViewAudit, "View the audit log"),
];

/// Built-in roles seeded at bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemRole {
    Administrator,
    Manager,
    Staff,
}

impl SystemRole {
    pub const ALL: [SystemRole; 3] = [
        SystemRole::Administrator,
        SystemRole::Manager,
        SystemRole::Staff,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SystemRole::Administrator => "Administrator",
            SystemRole::Manager => "Manager",
            SystemRole::Staff => "Staff",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SystemRole::Administrator => "Full access to every module",
            SystemRole::Manager => "All business operations except deletion and security",
            SystemRole::Staff => "View, create and edit business records",
        }
    }

    /// Derivation rule: whether this role holds `permission`.
    pub fn includes(&self, permission: &Permission) -> bool {
        let security = permission.module == Module::Security.as_str();
        match self {
            SystemRole::Administrator => true,
            SystemRole::Manager => !security && permission.action != Action::Delete.as_str(),
            SystemRole::Staff => {
                !security
                    && [Action::View, Action::Create, Action::Edit]
                        .iter()
                        .any(|a| permission.action == a.as_str())
            }
        }
    }

    /// Select this role's permissions out of the full catalog.
    pub fn derive(&self, catalog: &[Permission]) -> Vec<Permission> {
        catalog
            .iter()
            .filter(|p| self.includes(p))
            .cloned()
            .collect()
    }
}

/// Decide `(module, action, resource?)` against a permission snapshot.
///
/// True iff some permission has equal module and action, and either carries
/// no resource qualifier or the same one. No wildcards, no inheritance.
pub fn has_permission(
    snapshot: &[Permission],
    module: &str,
    action: &str,
    resource: Option<&str>,
) -> bool {
    snapshot.iter().any(|p| p.grants(module, action, resource))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn stored_catalog() -> Vec<Permission> {
        CATALOG
            .iter()
            .enumerate()
            .map(|(i, d)| Permission {
                id: i as i64 + 1,
                module: d.module.to_string(),
                action: d.action.to_string(),
                resource: None,
                description: d.description.to_string(),
            })
            .collect()
    }

    fn keys(perms: &[Permission]) -> HashSet<(String, String)> {
        perms
            .iter()
            .map(|p| (p.module.clone(), p.action.clone()))
            .collect()
    }

    #[test]
    fn test_enum_string_round_trip() {
        for m in Module::ALL {
            assert_eq!(m.as_str().parse::<Module>().unwrap(), m);
        }
        for a in Action::ALL {
            assert_eq!(a.to_string().parse::<Action>().unwrap(), a);
        }
        assert!("warehouse".parse::<Module>().is_err());
        assert_eq!(Action::ManageUsers.as_str(), "manage_users");
    }

    #[test]
    fn test_catalog_has_unique_pairs() {
        let pairs: HashSet<_> = CATALOG.iter().map(|d| (d.module, d.action)).collect();
        assert_eq!(pairs.len(), CATALOG.len());
    }

    #[test]
    fn test_manager_is_admin_minus_security_minus_delete() {
        let all = stored_catalog();
        let expected: HashSet<_> = keys(&all)
            .into_iter()
            .filter(|(m, a)| m != "security" && a != "delete")
            .collect();
        assert_eq!(keys(&SystemRole::Manager.derive(&all)), expected);
    }

    #[test]
    fn test_staff_is_view_create_edit_outside_security() {
        let all = stored_catalog();
        let expected: HashSet<_> = keys(&all)
            .into_iter()
            .filter(|(m, a)| m != "security" && ["view", "create", "edit"].contains(&a.as_str()))
            .collect();
        let staff = SystemRole::Staff.derive(&all);
        assert_eq!(keys(&staff), expected);
        assert!(staff.iter().all(|p| p.action != "approve" && p.action != "export"));
    }

    #[test]
    fn test_administrator_has_everything() {
        let all = stored_catalog();
        assert_eq!(SystemRole::Administrator.derive(&all), all);
    }

    #[test]
    fn test_has_permission() {
        let staff = SystemRole::Staff.derive(&stored_catalog());
        assert!(has_permission(&staff, "customers", "view", None));
        assert!(has_permission(&staff, "customers", "view", Some("balances")));
        assert!(!has_permission(&staff, "security", "manage_users", None));
        assert!(!has_permission(&staff, "customers", "delete", None));
        assert!(!has_permission(&[], "customers", "view", None));
    }
}
