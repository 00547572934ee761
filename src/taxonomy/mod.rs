//! A hierarchy (DAG) of named categories, tracking ancestor and descendant
//! closures incrementally (spec §4.5).

use crate::core::error::{Error, ErrorKind, Result};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

pub type Modified = BTreeSet<String>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub parents: BTreeSet<String>,
    pub children: BTreeSet<String>,
    pub ancestors: BTreeSet<String>,
    pub descendants: BTreeSet<String>,
}

impl Category {
    fn new(name: impl Into<String>) -> Self {
        Category { name: name.into(), ..Default::default() }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CategoryHierarchy {
    categories: BTreeMap<String, Category>,
}

impl CategoryHierarchy {
    pub fn new() -> Self {
        CategoryHierarchy::default()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&Category> {
        self.categories.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Category)> {
        self.categories.iter()
    }

    /// Insert `name` if missing. Recorded in `modified` only if it was
    /// actually new.
    pub fn add(&mut self, name: &str, modified: &mut Modified) {
        if !self.categories.contains_key(name) {
            self.categories.insert(name.to_string(), Category::new(name));
            modified.insert(name.to_string());
        }
    }

    fn ensure(&mut self, name: &str) {
        self.categories
            .entry(name.to_string())
            .or_insert_with(|| Category::new(name));
    }

    /// Recompute `cat_name`'s descendant closure by BFS over `children`.
    fn recalc_descendants(&mut self, cat_name: &str, modified: &mut Modified) {
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<String> = self
            .categories
            .get(cat_name)
            .map(|c| c.children.iter().cloned().collect())
            .unwrap_or_default();
        while let Some(next) = queue.pop_front() {
            if seen.insert(next.clone()) {
                if let Some(c) = self.categories.get(&next) {
                    for child in &c.children {
                        queue.push_back(child.clone());
                    }
                }
            }
        }
        if let Some(c) = self.categories.get_mut(cat_name) {
            if c.descendants != seen {
                c.descendants = seen;
                modified.insert(cat_name.to_string());
            }
        }
    }

    /// Recompute `cat_name`'s ancestor closure by BFS over `parents`.
    fn recalc_ancestors(&mut self, cat_name: &str, modified: &mut Modified) {
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<String> = self
            .categories
            .get(cat_name)
            .map(|c| c.parents.iter().cloned().collect())
            .unwrap_or_default();
        while let Some(next) = queue.pop_front() {
            if seen.insert(next.clone()) {
                if let Some(c) = self.categories.get(&next) {
                    for parent in &c.parents {
                        queue.push_back(parent.clone());
                    }
                }
            }
        }
        if let Some(c) = self.categories.get_mut(cat_name) {
            if c.ancestors != seen {
                c.ancestors = seen;
                modified.insert(cat_name.to_string());
            }
        }
    }

    /// Add a `parent` edge to `child`, recomputing closures incrementally.
    pub fn add_parent(&mut self, child: &str, parent: &str, modified: &mut Modified) -> Result<()> {
        if child == parent {
            return Err(Error::new(ErrorKind::InvalidValue, "a category cannot be its own parent"));
        }
        if self
            .categories
            .get(child)
            .map(|c| c.descendants.contains(parent))
            .unwrap_or(false)
        {
            return Err(Error::new(
                ErrorKind::InvalidValue,
                format!("adding {parent} as a parent of {child} would introduce a cycle"),
            ));
        }

        self.add(child, modified);
        self.add(parent, modified);

        let already_linked = self.categories[child].parents.contains(parent);
        if already_linked {
            return Ok(());
        }

        self.categories.get_mut(child).unwrap().parents.insert(parent.to_string());
        self.categories.get_mut(parent).unwrap().children.insert(child.to_string());
        modified.insert(child.to_string());
        modified.insert(parent.to_string());

        // Propagate ancestors upward from child, descendants downward from parent.
        let affected_descendants: Vec<String> = {
            let mut v = vec![child.to_string()];
            v.extend(self.categories[child].descendants.iter().cloned());
            v
        };
        for name in &affected_descendants {
            self.recalc_ancestors(name, modified);
        }
        let affected_ancestors: Vec<String> = {
            let mut v = vec![parent.to_string()];
            v.extend(self.categories[parent].ancestors.iter().cloned());
            v
        };
        for name in &affected_ancestors {
            self.recalc_descendants(name, modified);
        }
        Ok(())
    }

    /// Drop just the parent/child edge, recomputing affected closures.
    pub fn remove_parent(&mut self, child: &str, parent: &str, modified: &mut Modified) {
        let had_edge = self
            .categories
            .get_mut(child)
            .map(|c| c.parents.remove(parent))
            .unwrap_or(false);
        if !had_edge {
            return;
        }
        if let Some(p) = self.categories.get_mut(parent) {
            p.children.remove(child);
        }
        modified.insert(child.to_string());
        modified.insert(parent.to_string());

        let descendants_of_child: Vec<String> = {
            let mut v = vec![child.to_string()];
            v.extend(self.categories[child].descendants.iter().cloned());
            v
        };
        for name in &descendants_of_child {
            self.recalc_ancestors(name, modified);
        }
        let ancestors_of_parent: Vec<String> = {
            let mut v = vec![parent.to_string()];
            v.extend(self.categories[parent].ancestors.iter().cloned());
            v
        };
        for name in &ancestors_of_parent {
            self.recalc_descendants(name, modified);
        }
    }

    /// Drop the node and all its edges, recomputing affected closures.
    pub fn remove(&mut self, name: &str, modified: &mut Modified) {
        let Some(cat) = self.categories.remove(name) else { return };
        modified.insert(name.to_string());

        for parent in &cat.parents {
            if let Some(p) = self.categories.get_mut(parent) {
                p.children.remove(name);
            }
        }
        for child in &cat.children {
            if let Some(c) = self.categories.get_mut(child) {
                c.parents.remove(name);
            }
        }

        let former_ancestors: Vec<String> = cat.ancestors.iter().cloned().collect();
        for ancestor in &former_ancestors {
            self.recalc_descendants(ancestor, modified);
        }
        let former_descendants: Vec<String> = cat.descendants.iter().cloned().collect();
        for descendant in &former_descendants {
            self.recalc_ancestors(descendant, modified);
        }
    }

    pub fn to_json(&self) -> Value {
        let mut obj = serde_json::Map::new();
        for (name, cat) in &self.categories {
            obj.insert(name.clone(), Value::from(cat.parents.iter().cloned().collect::<Vec<_>>()));
        }
        Value::Object(obj)
    }

    /// Load from JSON (category name -> array of direct parents). Closures
    /// are always recomputed, never trusted from the input.
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::new(ErrorKind::InvalidValue, "taxonomy JSON must be an object"))?;
        let mut hierarchy = CategoryHierarchy::new();
        let mut modified = Modified::new();
        for name in obj.keys() {
            hierarchy.add(name, &mut modified);
        }
        for (name, parents) in obj {
            let parents = parents
                .as_array()
                .ok_or_else(|| Error::new(ErrorKind::InvalidValue, "category parent list must be an array"))?;
            for parent in parents {
                let parent = parent.as_str().ok_or_else(|| {
                    Error::new(ErrorKind::InvalidValue, "category parent name must be a string")
                })?;
                hierarchy.ensure(parent);
                hierarchy.add_parent(name, parent, &mut modified)?;
            }
        }
        Ok(hierarchy)
    }
}
