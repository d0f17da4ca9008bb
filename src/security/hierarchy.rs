//! Maps a caller to the set of user ids whose records they may see.

use std::collections::BTreeSet;
use uuid::Uuid;

use crate::core::error::CrmResult;
use crate::core::shared::enums::Role;
use crate::security::auth_api::CallerContext;

/// Upward reporting column on a user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportingLink {
    Manager,
    SrManager,
    Director,
}

impl ReportingLink {
    /// Links held by users sitting below a holder of this link.
    pub fn lower_links(&self) -> &'static [ReportingLink] {
        match self {
            Self::Manager => &[],
            Self::SrManager => &[Self::Manager],
            Self::Director => &[Self::SrManager, Self::Manager],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    SelfOnly,
    Reports(ReportingLink),
    Everyone,
}

const ROLE_SCOPES: [(Role, ScopeKind); 6] = [
    (Role::Agent, ScopeKind::SelfOnly),
    (Role::Manager, ScopeKind::Reports(ReportingLink::Manager)),
    (Role::SrManager, ScopeKind::Reports(ReportingLink::SrManager)),
    (Role::Director, ScopeKind::Reports(ReportingLink::Director)),
    (Role::Cco, ScopeKind::Everyone),
    (Role::Admin, ScopeKind::Everyone),
];

/// Roles missing from the table fall back to `SelfOnly`.
pub fn scope_kind(role: Role) -> ScopeKind {
    ROLE_SCOPES
        .iter()
        .find(|(r, _)| *r == role)
        .map(|(_, kind)| *kind)
        .unwrap_or(ScopeKind::SelfOnly)
}

/// Scoping predicate: "owner id is in this set", or no restriction at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Everyone,
    Owners(BTreeSet<Uuid>),
}

impl Scope {
    pub fn only(user_id: Uuid) -> Self {
        Self::Owners(BTreeSet::from([user_id]))
    }

    pub fn contains(&self, user_id: Uuid) -> bool {
        match self {
            Self::Everyone => true,
            Self::Owners(ids) => ids.contains(&user_id),
        }
    }

    /// `None` means unrestricted.
    pub fn owner_ids(&self) -> Option<Vec<Uuid>> {
        match self {
            Self::Everyone => None,
            Self::Owners(ids) => Some(ids.iter().copied().collect()),
        }
    }
}

/// Lookup of reporting edges between users.
pub trait UserDirectory {
    /// Ids of users whose `link` column points at any of `superiors`.
    fn reporting_to(&mut self, link: ReportingLink, superiors: &[Uuid]) -> CrmResult<Vec<Uuid>>;
}

pub fn resolve_scope<D>(directory: &mut D, caller: &CallerContext) -> CrmResult<Scope>
where
    D: UserDirectory + ?Sized,
{
    let link = match scope_kind(caller.role) {
        ScopeKind::Everyone => return Ok(Scope::Everyone),
        ScopeKind::SelfOnly => return Ok(Scope::only(caller.user_id)),
        ScopeKind::Reports(link) => link,
    };

    let mut owners = BTreeSet::from([caller.user_id]);
    let mut frontier = directory.reporting_to(link, &[caller.user_id])?;

    // Follow lower links too, so a report whose own upward columns skip the
    // caller is still reached through their direct superior.
    while !frontier.is_empty() {
        let fresh: Vec<Uuid> = frontier
            .into_iter()
            .filter(|id| owners.insert(*id))
            .collect();
        if fresh.is_empty() {
            break;
        }
        frontier = Vec::new();
        for lower in link.lower_links() {
            frontier.extend(directory.reporting_to(*lower, &fresh)?);
        }
    }

    Ok(Scope::Owners(owners))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn covers(outer: &Scope, inner: &Scope) -> bool {
        match (outer, inner) {
            (Scope::Everyone, _) => true,
            (Scope::Owners(_), Scope::Everyone) => false,
            (Scope::Owners(mine), Scope::Owners(theirs)) => theirs.is_subset(mine),
        }
    }

    #[derive(Default)]
    struct MemoryDirectory {
        links: HashMap<Uuid, [Option<Uuid>; 3]>,
        calls: usize,
    }

    impl MemoryDirectory {
        fn add(&mut self, manager: Option<Uuid>, sr: Option<Uuid>, director: Option<Uuid>) -> Uuid {
            let id = Uuid::new_v4();
            self.links.insert(id, [manager, sr, director]);
            id
        }
    }

    impl UserDirectory for MemoryDirectory {
        fn reporting_to(&mut self, link: ReportingLink, superiors: &[Uuid]) -> CrmResult<Vec<Uuid>> {
            self.calls += 1;
            let slot = match link {
                ReportingLink::Manager => 0,
                ReportingLink::SrManager => 1,
                ReportingLink::Director => 2,
            };
            Ok(self
                .links
                .iter()
                .filter(|(_, links)| links[slot].is_some_and(|s| superiors.contains(&s)))
                .map(|(id, _)| *id)
                .collect())
        }
    }

    struct Org {
        dir: MemoryDirectory,
        director: Uuid,
        sr: Uuid,
        manager_a: Uuid,
        manager_b: Uuid,
        agent_a: Uuid,
        agent_b: Uuid,
        outsider: Uuid,
    }

    fn org() -> Org {
        let mut dir = MemoryDirectory::default();
        let director = dir.add(None, None, None);
        let sr = dir.add(None, None, Some(director));
        let manager_a = dir.add(None, Some(sr), Some(director));
        let manager_b = dir.add(None, Some(sr), Some(director));
        let agent_a = dir.add(Some(manager_a), Some(sr), Some(director));
        // Only the direct manager link is populated here.
        let agent_b = dir.add(Some(manager_b), None, None);
        let outsider = dir.add(None, None, None);
        Org {
            dir,
            director,
            sr,
            manager_a,
            manager_b,
            agent_a,
            agent_b,
            outsider,
        }
    }

    #[test]
    fn test_role_table_is_total() {
        assert_eq!(scope_kind(Role::Agent), ScopeKind::SelfOnly);
        assert_eq!(scope_kind(Role::Cco), ScopeKind::Everyone);
        assert_eq!(scope_kind(Role::Admin), ScopeKind::Everyone);
        assert_eq!(scope_kind(Role::Unrecognized), ScopeKind::SelfOnly);
        assert_eq!(
            scope_kind(Role::SrManager),
            ScopeKind::Reports(ReportingLink::SrManager)
        );
    }

    #[test]
    fn test_agent_and_unknown_are_self_only() {
        let mut o = org();
        let agent = CallerContext::new(o.agent_a, Role::Agent);
        assert_eq!(resolve_scope(&mut o.dir, &agent).unwrap(), Scope::only(o.agent_a));

        let unknown = CallerContext::new(o.director, Role::Unrecognized);
        assert_eq!(resolve_scope(&mut o.dir, &unknown).unwrap(), Scope::only(o.director));
        assert_eq!(o.dir.calls, 0);
    }

    #[test]
    fn test_top_roles_see_everyone() {
        let mut o = org();
        for role in [Role::Cco, Role::Admin] {
            let caller = CallerContext::new(Uuid::new_v4(), role);
            assert_eq!(resolve_scope(&mut o.dir, &caller).unwrap(), Scope::Everyone);
        }
    }

    #[test]
    fn test_manager_sees_direct_reports() {
        let mut o = org();
        let caller = CallerContext::new(o.manager_a, Role::Manager);
        let scope = resolve_scope(&mut o.dir, &caller).unwrap();
        assert!(scope.contains(o.manager_a));
        assert!(scope.contains(o.agent_a));
        assert!(!scope.contains(o.agent_b));
        assert!(!scope.contains(o.sr));
    }

    #[test]
    fn test_director_covers_every_manager_in_chain() {
        let mut o = org();
        let director = resolve_scope(&mut o.dir, &CallerContext::new(o.director, Role::Director)).unwrap();
        for manager in [o.manager_a, o.manager_b] {
            let scope = resolve_scope(&mut o.dir, &CallerContext::new(manager, Role::Manager)).unwrap();
            assert!(covers(&director, &scope));
        }
        assert!(director.contains(o.agent_b));
        assert!(!director.contains(o.outsider));
    }

    #[test]
    fn test_sr_manager_reaches_agents_transitively() {
        let mut o = org();
        let scope = resolve_scope(&mut o.dir, &CallerContext::new(o.sr, Role::SrManager)).unwrap();
        assert!(scope.contains(o.agent_a));
        assert!(scope.contains(o.agent_b));
        assert!(!scope.contains(o.director));
    }

    #[test]
    fn test_scope_covers() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let both = Scope::Owners(BTreeSet::from([a, b]));
        assert!(covers(&Scope::Everyone, &both));
        assert!(covers(&both, &Scope::only(a)));
        assert!(!covers(&Scope::only(a), &both));
        assert!(!covers(&both, &Scope::Everyone));
        assert_eq!(Scope::Everyone.owner_ids(), None);
    }
}
