use crate::catalog::{QueryCatalog, QueryDefinition};

/// Tag that makes a query visible to every role.
pub const WILDCARD_ROLE: &str = "all";

/// Roles the built-in catalog is written for.
pub const KNOWN_ROLES: [&str; 5] = ["patient", "caregiver", "medical_staff", "admin", WILDCARD_ROLE];

/// Queries of `catalog` visible to `role`, in registration order.
///
/// An unknown role is not an error: it simply sees only untagged and
/// wildcard-tagged queries, which is usually nothing.
pub fn visible_to<'a>(role: &str, catalog: &'a QueryCatalog) -> Vec<&'a QueryDefinition> {
    catalog.all().iter().filter(|def| is_visible(def, role)).collect()
}

/// Whether `role` is one the built-in catalog tags queries with.
pub fn is_known_role(role: &str) -> bool {
    KNOWN_ROLES.iter().any(|known| known.eq_ignore_ascii_case(role))
}

pub fn is_visible(definition: &QueryDefinition, role: &str) -> bool {
    definition.roles.is_empty()
        || definition
            .roles
            .iter()
            .any(|tag| tag.eq_ignore_ascii_case(WILDCARD_ROLE) || tag.eq_ignore_ascii_case(role))
}
