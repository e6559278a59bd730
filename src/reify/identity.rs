//! Variable identity resolution.
//!
//! Every store creates a fresh variable, so one source-level variable is split into several
//! [`Variable`](crate::ast::Variable)s. Where control paths merge, the variables reaching the
//! same slot are unified into a group; resolution then gives every group one identifier and
//! every remaining variable its own.
//!
//! Groups are kept representative-first: the first member carries the most general type of the
//! group, and all members take over that type during resolution.

use rustc_hash::FxHashMap;

use crate::{
    ast::{VarId, VarTable},
    model::ClassOracle,
    reify::ids::IdAllocator,
};

/// Union of variables that stand for the same source-level variable.
#[derive(Debug, Default)]
pub struct IdentityResolver {
    groups: Vec<Vec<VarId>>,
    group_of: FxHashMap<VarId, usize>,
}

impl IdentityResolver {
    /// Creates a resolver without any groups.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of groups with more than one member.
    #[must_use]
    pub fn merged_groups(&self) -> usize {
        self.groups.iter().filter(|g| g.len() > 1).count()
    }

    /// Records that `a` and `b` are the same variable.
    ///
    /// Variables that already carry an identifier are frozen; merging into them is a no-op.
    pub fn merge(&mut self, vars: &VarTable, classes: &dyn ClassOracle, a: VarId, b: VarId) {
        if a == b || vars[a].ident().is_some() || vars[b].ident().is_some() {
            return;
        }

        let group_a = self.group(a);
        let group_b = self.group(b);
        if group_a == group_b {
            return;
        }

        let rep_a = &vars[self.groups[group_a][0]].ty;
        let rep_b = &vars[self.groups[group_b][0]].ty;
        let (keep, absorb) = if rep_a != rep_b && classes.is_assignable(rep_a, rep_b) {
            (group_b, group_a)
        } else {
            (group_a, group_b)
        };

        let absorbed = std::mem::take(&mut self.groups[absorb]);
        for member in &absorbed {
            self.group_of.insert(*member, keep);
        }
        self.groups[keep].extend(absorbed);
    }

    /// Assigns identifiers: one per group, then one per remaining unidentified variable.
    ///
    /// Temporaries are not identified. Members of a group take the type of the group's
    /// representative.
    pub fn resolve(self, vars: &mut VarTable, idents: &mut IdAllocator) {
        for group in self.groups.into_iter().filter(|g| !g.is_empty()) {
            let representative = group[0];
            let ty = vars[representative].ty.clone();
            let ident = group
                .iter()
                .find_map(|member| vars[*member].ident())
                .unwrap_or_else(|| idents.next_id());
            for member in group {
                let var = &mut vars[member];
                var.set_ident(ident);
                var.ty = ty.clone();
            }
        }

        let unidentified: Vec<VarId> = vars
            .iter()
            .filter(|(_, v)| !v.is_temp() && v.ident().is_none())
            .map(|(id, _)| id)
            .collect();
        for id in unidentified {
            vars[id].set_ident(idents.next_id());
        }
    }

    fn group(&mut self, var: VarId) -> usize {
        if let Some(group) = self.group_of.get(&var) {
            return *group;
        }
        let group = self.groups.len();
        self.groups.push(vec![var]);
        self.group_of.insert(var, group);
        group
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{VarKind, Variable},
        model::{ClassPath, JType},
    };

    fn local(vars: &mut VarTable, ty: JType) -> VarId {
        vars.push(Variable::new(VarKind::Local { slot: 1 }, ty))
    }

    #[test]
    fn merged_variables_share_identifier() {
        let classes = ClassPath::new();
        let mut vars = VarTable::new();
        let a = local(&mut vars, JType::Int);
        let b = local(&mut vars, JType::Int);
        let c = local(&mut vars, JType::Int);
        let d = local(&mut vars, JType::Int);

        let mut resolver = IdentityResolver::new();
        resolver.merge(&vars, &classes, a, b);
        resolver.merge(&vars, &classes, c, b);
        assert_eq!(resolver.merged_groups(), 1);
        resolver.resolve(&mut vars, &mut IdAllocator::new());

        assert_eq!(vars[a].ident(), vars[b].ident());
        assert_eq!(vars[a].ident(), vars[c].ident());
        assert_ne!(vars[a].ident(), vars[d].ident());
    }

    #[test]
    fn representative_has_most_general_type() {
        let classes = ClassPath::new();
        let mut vars = VarTable::new();
        let null = local(&mut vars, JType::Null);
        let string = local(&mut vars, JType::object("java/lang/String"));

        let mut resolver = IdentityResolver::new();
        resolver.merge(&vars, &classes, null, string);
        resolver.resolve(&mut vars, &mut IdAllocator::new());

        assert_eq!(vars[null].ty, JType::object("java/lang/String"));
    }

    #[test]
    fn identified_variables_are_frozen() {
        let classes = ClassPath::new();
        let mut vars = VarTable::new();
        let a = local(&mut vars, JType::Int);
        let b = local(&mut vars, JType::Int);
        vars[a].set_ident(7);

        let mut resolver = IdentityResolver::new();
        resolver.merge(&vars, &classes, a, b);
        resolver.resolve(&mut vars, &mut IdAllocator::starting_at(8));

        assert_eq!(vars[a].ident(), Some(7));
        assert_eq!(vars[b].ident(), Some(8));
    }

    #[test]
    fn temporaries_stay_unidentified() {
        let mut vars = VarTable::new();
        let temp = vars.push(Variable::new(VarKind::Temp { suffix: 0 }, JType::Int));
        IdentityResolver::new().resolve(&mut vars, &mut IdAllocator::new());
        assert_eq!(vars[temp].ident(), None);
    }
}
