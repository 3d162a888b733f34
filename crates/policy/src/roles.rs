//! Principal to role resolution.

use crate::Principal;
use arc_swap::ArcSwap;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Role that matches every principal in rule tables.
pub const ANY_ROLE: &str = "*";

type RoleMap = HashMap<String, BTreeSet<String>>;

/// Read-mostly cache of the roles each principal holds.
///
/// Lookups load the current immutable map without locking. Updates build a
/// new map and swap it in, so a decision in flight always sees one consistent
/// snapshot.
#[derive(Debug, Default)]
pub struct RoleDirectory {
    map: ArcSwap<RoleMap>,
}

impl RoleDirectory {
    pub fn new<I, R>(assignments: I) -> Self
    where
        I: IntoIterator<Item = (String, R)>,
        R: IntoIterator<Item = String>,
    {
        Self {
            map: ArcSwap::from_pointee(Self::build(assignments)),
        }
    }

    fn build<I, R>(assignments: I) -> RoleMap
    where
        I: IntoIterator<Item = (String, R)>,
        R: IntoIterator<Item = String>,
    {
        assignments
            .into_iter()
            .map(|(principal, roles)| (principal, roles.into_iter().collect()))
            .collect()
    }

    /// Whether `principal` holds any of `roles`. `*` matches everyone.
    pub fn holds_any(&self, principal: &Principal, roles: &[String]) -> bool {
        if roles.iter().any(|r| r == ANY_ROLE) {
            return true;
        }
        let map = self.map.load();
        map.get(principal.as_str())
            .is_some_and(|held| roles.iter().any(|r| held.contains(r)))
    }

    /// Roles currently held by `principal`.
    pub fn roles_of(&self, principal: &Principal) -> BTreeSet<String> {
        self.map
            .load()
            .get(principal.as_str())
            .cloned()
            .unwrap_or_default()
    }

    /// Publish a complete new set of assignments.
    pub fn replace<I, R>(&self, assignments: I)
    where
        I: IntoIterator<Item = (String, R)>,
        R: IntoIterator<Item = String>,
    {
        self.map.store(Arc::new(Self::build(assignments)));
    }

    /// Add one role to one principal.
    pub fn grant(&self, principal: &Principal, role: &str) {
        self.map.rcu(|current| {
            let mut next = RoleMap::clone(current);
            next.entry(principal.as_str().to_string())
                .or_default()
                .insert(role.to_string());
            next
        });
    }

    /// Remove one role from one principal.
    pub fn revoke(&self, principal: &Principal, role: &str) {
        self.map.rcu(|current| {
            let mut next = RoleMap::clone(current);
            if let Some(held) = next.get_mut(principal.as_str()) {
                held.remove(role);
            }
            next
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn directory() -> RoleDirectory {
        RoleDirectory::new([
            ("alice".to_string(), vec!["reader".to_string()]),
            ("bob".to_string(), vec!["reader".to_string(), "steward".to_string()]),
        ])
    }

    #[test]
    fn holds_any_matches_roles_and_wildcard() {
        let roles = directory();
        let alice = Principal::from("alice");
        let nobody = Principal::from("nobody");

        assert!(roles.holds_any(&alice, &["reader".into()]));
        assert!(!roles.holds_any(&alice, &["steward".into()]));
        assert!(roles.holds_any(&nobody, &[ANY_ROLE.into()]));
        assert!(!roles.holds_any(&nobody, &["reader".into()]));
    }

    #[test]
    fn grant_and_revoke_publish_new_snapshots() {
        let roles = directory();
        let alice = Principal::from("alice");

        roles.grant(&alice, "steward");
        assert!(roles.holds_any(&alice, &["steward".into()]));

        roles.revoke(&alice, "steward");
        assert_eq!(roles.roles_of(&alice), BTreeSet::from(["reader".to_string()]));
    }

    #[test]
    fn replace_swaps_whole_map() {
        let roles = directory();
        roles.replace([("carol".to_string(), vec!["admin".to_string()])]);

        assert!(roles.roles_of(&Principal::from("alice")).is_empty());
        assert!(roles.holds_any(&Principal::from("carol"), &["admin".into()]));
    }

    #[test]
    fn concurrent_readers_see_consistent_snapshots() {
        let roles = Arc::new(directory());
        let bob = Principal::from("bob");

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let roles = Arc::clone(&roles);
                let bob = bob.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        assert!(roles.holds_any(&bob, &["reader".into()]));
                    }
                })
            })
            .collect();

        for i in 0..100 {
            roles.grant(&bob, &format!("role-{i}"));
        }
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(roles.roles_of(&bob).len(), 102);
    }
}
