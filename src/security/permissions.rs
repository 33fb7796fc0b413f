//! Static role -> (resource, action) capability table.
//!
//! # Design Decisions
//! - Table is data baked into the binary: no runtime map building, no mutation
//! - Absence from the table means denied (fail closed)
//! - Unrecognized role/resource/action strings are denied, never defaulted up

use serde::{Deserialize, Serialize};

/// Actor role, ordered roughly by privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    Anonymous,
    User,
    ShopAdmin,
    Admin,
}

impl Role {
    /// Parse from the wire/config representation. Unknown strings yield None;
    /// callers decide whether that means anonymous (rate tiers) or denied
    /// (permission checks).
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "ANONYMOUS" => Some(Role::Anonymous),
            "USER" => Some(Role::User),
            "SHOP_ADMIN" => Some(Role::ShopAdmin),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Anonymous => "ANONYMOUS",
            Role::User => "USER",
            Role::ShopAdmin => "SHOP_ADMIN",
            Role::Admin => "ADMIN",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource kinds the platform exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    User,
    Shop,
    Post,
    Message,
    Reservation,
    Review,
    Notification,
}

impl ResourceType {
    pub fn parse(s: &str) -> Option<ResourceType> {
        match s {
            "USER" => Some(ResourceType::User),
            "SHOP" => Some(ResourceType::Shop),
            "POST" => Some(ResourceType::Post),
            "MESSAGE" => Some(ResourceType::Message),
            "RESERVATION" => Some(ResourceType::Reservation),
            "REVIEW" => Some(ResourceType::Review),
            "NOTIFICATION" => Some(ResourceType::Notification),
            _ => None,
        }
    }
}

/// Actions a role may hold on a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    Share,
    Execute,
}

impl Action {
    pub fn parse(s: &str) -> Option<Action> {
        match s {
            "READ" => Some(Action::Read),
            "CREATE" => Some(Action::Create),
            "UPDATE" => Some(Action::Update),
            "DELETE" => Some(Action::Delete),
            "SHARE" => Some(Action::Share),
            "EXECUTE" => Some(Action::Execute),
            _ => None,
        }
    }
}

const ALL_RESOURCES: [ResourceType; 7] = [
    ResourceType::User,
    ResourceType::Shop,
    ResourceType::Post,
    ResourceType::Message,
    ResourceType::Reservation,
    ResourceType::Review,
    ResourceType::Notification,
];

const CRUD: [Action; 4] = [Action::Read, Action::Create, Action::Update, Action::Delete];

const SHOP_ADMIN_CAPS: [(ResourceType, Action); 7] = [
    (ResourceType::Shop, Action::Read),
    (ResourceType::Shop, Action::Update),
    (ResourceType::Post, Action::Create),
    (ResourceType::Post, Action::Update),
    (ResourceType::Post, Action::Delete),
    (ResourceType::Reservation, Action::Read),
    (ResourceType::Reservation, Action::Update),
];

const USER_CAPS: [(ResourceType, Action); 8] = [
    (ResourceType::User, Action::Read),
    (ResourceType::User, Action::Update),
    (ResourceType::Post, Action::Read),
    (ResourceType::Post, Action::Create),
    (ResourceType::Message, Action::Create),
    (ResourceType::Message, Action::Read),
    (ResourceType::Reservation, Action::Create),
    (ResourceType::Review, Action::Create),
];

const ANONYMOUS_CAPS: [(ResourceType, Action); 3] = [
    (ResourceType::Shop, Action::Read),
    (ResourceType::Post, Action::Read),
    (ResourceType::Review, Action::Read),
];

/// The capability set held by a role.
///
/// ADMIN is the superset: every resource type crossed with CRUD. The other
/// roles carry explicit, additive lists.
pub fn capabilities(role: Role) -> &'static [(ResourceType, Action)] {
    // Admin covers all resources x CRUD; materialized once so the return type
    // stays a plain slice.
    static ADMIN_CAPS: std::sync::OnceLock<Vec<(ResourceType, Action)>> = std::sync::OnceLock::new();

    match role {
        Role::Admin => ADMIN_CAPS.get_or_init(|| {
            ALL_RESOURCES
                .iter()
                .flat_map(|r| CRUD.iter().map(move |a| (*r, *a)))
                .collect()
        }),
        Role::ShopAdmin => &SHOP_ADMIN_CAPS,
        Role::User => &USER_CAPS,
        Role::Anonymous => &ANONYMOUS_CAPS,
    }
}

/// True iff the (role, resource, action) triple is present in the table.
pub fn is_action_allowed(role: Role, resource: ResourceType, action: Action) -> bool {
    capabilities(role).contains(&(resource, action))
}

/// String-level lookup for callers holding wire representations.
/// Any unrecognized role, resource, or action name is denied.
pub fn is_action_allowed_str(role: &str, resource: &str, action: &str) -> bool {
    match (Role::parse(role), ResourceType::parse(resource), Action::parse(action)) {
        (Some(r), Some(res), Some(act)) => is_action_allowed(r, res, act),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_is_superset() {
        for r in ALL_RESOURCES {
            for a in CRUD {
                assert!(is_action_allowed(Role::Admin, r, a), "{:?}/{:?}", r, a);
            }
        }
    }

    #[test]
    fn test_shop_admin_caps() {
        assert!(is_action_allowed(Role::ShopAdmin, ResourceType::Shop, Action::Update));
        assert!(is_action_allowed(Role::ShopAdmin, ResourceType::Post, Action::Delete));
        assert!(is_action_allowed(Role::ShopAdmin, ResourceType::Reservation, Action::Read));
        // Not granted: deleting shops or touching users
        assert!(!is_action_allowed(Role::ShopAdmin, ResourceType::Shop, Action::Delete));
        assert!(!is_action_allowed(Role::ShopAdmin, ResourceType::User, Action::Read));
    }

    #[test]
    fn test_user_caps() {
        assert!(is_action_allowed(Role::User, ResourceType::User, Action::Update));
        assert!(is_action_allowed(Role::User, ResourceType::Message, Action::Create));
        assert!(is_action_allowed(Role::User, ResourceType::Review, Action::Create));
        assert!(!is_action_allowed(Role::User, ResourceType::Shop, Action::Update));
        assert!(!is_action_allowed(Role::User, ResourceType::User, Action::Delete));
        // Notifications are not in USER's row at all
        assert!(!is_action_allowed(Role::User, ResourceType::Notification, Action::Read));
    }

    #[test]
    fn test_anonymous_read_only() {
        assert!(is_action_allowed(Role::Anonymous, ResourceType::Shop, Action::Read));
        assert!(is_action_allowed(Role::Anonymous, ResourceType::Post, Action::Read));
        assert!(is_action_allowed(Role::Anonymous, ResourceType::Review, Action::Read));
        // USER read is explicitly denied for anonymous callers
        assert!(!is_action_allowed(Role::Anonymous, ResourceType::User, Action::Read));
        assert!(!is_action_allowed(Role::Anonymous, ResourceType::Post, Action::Create));
    }

    #[test]
    fn test_absent_triples_denied() {
        assert!(!is_action_allowed(Role::User, ResourceType::Notification, Action::Delete));
        assert!(!is_action_allowed(Role::ShopAdmin, ResourceType::Message, Action::Share));
    }

    #[test]
    fn test_string_lookup_fails_closed() {
        assert!(is_action_allowed_str("ADMIN", "USER", "DELETE"));
        assert!(!is_action_allowed_str("SUPERUSER", "USER", "DELETE"));
        assert!(!is_action_allowed_str("USER", "WIDGET", "READ"));
        assert!(!is_action_allowed_str("USER", "POST", "FROBNICATE"));
        assert!(!is_action_allowed_str("", "", ""));
    }

    #[test]
    fn test_role_parse_roundtrip() {
        for role in [Role::Anonymous, Role::User, Role::ShopAdmin, Role::Admin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("admin"), None); // Case-sensitive on purpose
    }
}
