use std::collections::{HashMap, HashSet};

use num_bigint::BigUint;

use crate::reference::Ref;
use crate::store::Store;
use crate::types::{Lit, Var};

impl Store {
    /// Returns one satisfying assignment of `f`, if any exists.
    ///
    /// The assignment lists the variables on one path to `true`, preferring
    /// the `high` branch; variables off the path are unconstrained.
    pub fn any_sat(&self, f: Ref) -> Option<Vec<Lit>> {
        if f.is_zero() {
            return None;
        }

        let mut path = Vec::new();
        let mut current = f;

        while !current.is_one() {
            let node = self.node(current);
            if !node.high.is_zero() {
                path.push(node.variable.pos());
                current = node.high;
            } else {
                path.push(node.variable.neg());
                current = node.low;
            }
        }

        Some(path)
    }

    /// Every path from `f` to `true`, as a list of partial assignments.
    pub fn all_sat(&self, f: Ref) -> Vec<Vec<Lit>> {
        let mut result = Vec::new();
        let mut path = Vec::new();
        self.all_sat_rec(f, &mut path, &mut result);
        result
    }

    fn all_sat_rec(&self, f: Ref, path: &mut Vec<Lit>, result: &mut Vec<Vec<Lit>>) {
        if f.is_zero() {
            return;
        }
        if f.is_one() {
            result.push(path.clone());
            return;
        }
        let node = self.node(f);
        path.push(node.variable.neg());
        self.all_sat_rec(node.low, path, result);
        path.pop();
        path.push(node.variable.pos());
        self.all_sat_rec(node.high, path, result);
        path.pop();
    }

    /// Number of assignments to the variables `0..num_vars` satisfying `f`.
    ///
    /// If `f` depends on a variable outside that range, the range is widened
    /// to cover it.
    pub fn sat_count(&self, f: Ref, num_vars: u32) -> BigUint {
        let num_vars = match self.support(f).last() {
            Some(v) => num_vars.max(v.index() + 1),
            None => num_vars,
        };
        let mut cache = HashMap::new();
        let count = self._sat_count(f, num_vars, &mut cache);
        count << self.level(f, num_vars)
    }

    fn level(&self, f: Ref, num_vars: u32) -> u32 {
        if f.is_terminal() {
            num_vars
        } else {
            self.variable(f).index()
        }
    }

    /// Count over the variables from `f`'s level down to `num_vars`.
    fn _sat_count(&self, f: Ref, num_vars: u32, cache: &mut HashMap<Ref, BigUint>) -> BigUint {
        if f.is_zero() {
            return BigUint::ZERO;
        } else if f.is_one() {
            return BigUint::from(1u32);
        }

        if let Some(count) = cache.get(&f) {
            return count.clone();
        }

        let node = self.node(f);
        let v = node.variable.index();
        let count_low = self._sat_count(node.low, num_vars, cache);
        let count_high = self._sat_count(node.high, num_vars, cache);
        let skip_low = self.level(node.low, num_vars) - v - 1;
        let skip_high = self.level(node.high, num_vars) - v - 1;
        let count = (count_low << skip_low) + (count_high << skip_high);

        cache.insert(f, count.clone());
        count
    }

    /// Number of distinct paths from `f` to `true`.
    pub fn path_count(&self, f: Ref) -> BigUint {
        let mut cache = HashMap::new();
        self._path_count(f, &mut cache)
    }

    fn _path_count(&self, f: Ref, cache: &mut HashMap<Ref, BigUint>) -> BigUint {
        if f.is_zero() {
            return BigUint::ZERO;
        } else if f.is_one() {
            return BigUint::from(1u32);
        }
        if let Some(count) = cache.get(&f) {
            return count.clone();
        }
        let node = self.node(f);
        let count = self._path_count(node.low, cache) + self._path_count(node.high, cache);
        cache.insert(f, count.clone());
        count
    }

    /// Every non-terminal node reachable from `f`.
    pub fn descendants(&self, f: Ref) -> HashSet<Ref> {
        let mut visited = HashSet::new();
        let mut stack = vec![f];
        while let Some(id) = stack.pop() {
            if id.is_terminal() || !visited.insert(id) {
                continue;
            }
            let node = self.node(id);
            stack.push(node.low);
            stack.push(node.high);
        }
        visited
    }

    /// Number of non-terminal nodes in `f`.
    pub fn node_count(&self, f: Ref) -> usize {
        self.descendants(f).len()
    }

    /// Number of nodes of `f` labelled with each variable.
    ///
    /// The result has at least `num_vars` entries.
    pub fn var_profile(&self, f: Ref, num_vars: u32) -> Vec<usize> {
        let mut profile = vec![0; num_vars as usize];
        for id in self.descendants(f) {
            let v = self.variable(id).index() as usize;
            if v >= profile.len() {
                profile.resize(v + 1, 0);
            }
            profile[v] += 1;
        }
        profile
    }

    /// Variables `f` depends on, in order.
    pub fn support(&self, f: Ref) -> Vec<Var> {
        let mut vars: Vec<Var> = self
            .descendants(f)
            .into_iter()
            .map(|id| self.variable(id))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        vars.sort_unstable();
        vars
    }
}
