//! Lowered declarations
//!
//! A [`LoweredTree`] holds the declarations that belong to one source file,
//! keyed by mangled name. On-demand specializations are generated into a
//! separate tree per owning file and merged in once every file is lowered.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::node::{LoweredNode, PlaceholderMap};
use super::types::{LoweredType, PlaceholderId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoweredField {
    pub name: String,
    pub ty: LoweredType,
}

/// A named struct type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoweredStruct {
    pub name: String,
    pub fields: Vec<LoweredField>,
}

impl LoweredStruct {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, ty: LoweredType) -> Self {
        self.fields.push(LoweredField {
            name: name.into(),
            ty,
        });
        self
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// Symbol visibility of a function or global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Linkage {
    Internal,
    External,
    /// Declared here, defined outside the program
    Foreign,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoweredFunction {
    pub name: String,
    pub params: Vec<(String, LoweredType)>,
    pub ret: LoweredType,
    /// `None` for foreign declarations
    pub body: Option<LoweredNode>,
    pub linkage: Linkage,
}

impl LoweredFunction {
    pub fn ty(&self) -> LoweredType {
        LoweredType::function(
            self.params.iter().map(|(_, ty)| ty.clone()).collect(),
            self.ret.clone(),
        )
    }

    /// Declaration of a runtime function.
    pub fn foreign(name: impl Into<String>, params: Vec<LoweredType>, ret: LoweredType) -> Self {
        Self {
            name: name.into(),
            params: params
                .into_iter()
                .enumerate()
                .map(|(i, ty)| (format!("p{}", i), ty))
                .collect(),
            ret,
            body: None,
            linkage: Linkage::Foreign,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoweredGlobal {
    pub name: String,
    pub ty: LoweredType,
    /// Constant initializer; `None` for foreign globals
    pub initializer: Option<LoweredNode>,
    pub is_constant: bool,
    pub linkage: Linkage,
}

/// Lowered declarations of one source file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoweredTree {
    pub file: String,
    pub structs: BTreeMap<String, LoweredStruct>,
    pub functions: BTreeMap<String, LoweredFunction>,
    pub globals: BTreeMap<String, LoweredGlobal>,
}

impl LoweredTree {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            ..Self::default()
        }
    }

    pub fn add_struct(&mut self, s: LoweredStruct) {
        self.structs.entry(s.name.clone()).or_insert(s);
    }

    pub fn add_function(&mut self, f: LoweredFunction) {
        self.functions.entry(f.name.clone()).or_insert(f);
    }

    pub fn add_global(&mut self, g: LoweredGlobal) {
        self.globals.entry(g.name.clone()).or_insert(g);
    }

    pub fn is_empty(&self) -> bool {
        self.structs.is_empty() && self.functions.is_empty() && self.globals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.structs.len() + self.functions.len() + self.globals.len()
    }

    /// Add every declaration of `other`; existing declarations win.
    pub fn merge(&mut self, other: LoweredTree) {
        for (_, s) in other.structs {
            self.add_struct(s);
        }
        for (_, f) in other.functions {
            self.add_function(f);
        }
        for (_, g) in other.globals {
            self.add_global(g);
        }
    }

    /// Substitute resolved vtable slots everywhere in the tree.
    pub fn replace_placeholders(&mut self, map: &PlaceholderMap) {
        for s in self.structs.values_mut() {
            for field in &mut s.fields {
                field.ty.replace_placeholders(&map.types);
            }
        }
        for g in self.globals.values_mut() {
            if let Some(init) = &mut g.initializer {
                init.replace_placeholders(map);
            }
        }
        for f in self.functions.values_mut() {
            if let Some(body) = &mut f.body {
                body.replace_placeholders(map);
            }
        }
    }

    /// First placeholder left anywhere in the tree.
    pub fn placeholder(&self) -> Option<PlaceholderId> {
        self.structs
            .values()
            .flat_map(|s| s.fields.iter())
            .find_map(|f| f.ty.placeholder())
            .or_else(|| {
                self.globals
                    .values()
                    .filter_map(|g| g.initializer.as_ref())
                    .find_map(LoweredNode::placeholder)
            })
            .or_else(|| {
                self.functions
                    .values()
                    .filter_map(|f| f.body.as_ref())
                    .find_map(LoweredNode::placeholder)
            })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Output of lowering a whole compilation: one tree per source file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoweredProgram {
    pub files: Vec<LoweredTree>,
}

impl LoweredProgram {
    pub fn function(&self, name: &str) -> Option<&LoweredFunction> {
        self.files.iter().find_map(|f| f.functions.get(name))
    }

    pub fn structure(&self, name: &str) -> Option<&LoweredStruct> {
        self.files.iter().find_map(|f| f.structs.get(name))
    }

    pub fn global(&self, name: &str) -> Option<&LoweredGlobal> {
        self.files.iter().find_map(|f| f.globals.get(name))
    }

    /// Number of files declaring a struct named `name`.
    pub fn struct_count(&self, name: &str) -> usize {
        self.files.iter().filter(|f| f.structs.contains_key(name)).count()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(name: &str, ret: LoweredType) -> LoweredFunction {
        LoweredFunction {
            name: name.to_string(),
            params: Vec::new(),
            ret,
            body: None,
            linkage: Linkage::Internal,
        }
    }

    #[test]
    fn test_merge_keeps_existing() {
        let mut tree = LoweredTree::new("a.cv");
        tree.add_function(function("f", LoweredType::I32));

        let mut other = LoweredTree::new("a.cv");
        other.add_function(function("f", LoweredType::BOOL));
        other.add_struct(LoweredStruct::new("S").with_field("x", LoweredType::I32));
        tree.merge(other);

        assert_eq!(tree.functions["f"].ret, LoweredType::I32);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.structs["S"].field_index("x"), Some(0));
    }

    #[test]
    fn test_placeholder_in_struct_field() {
        let mut tree = LoweredTree::new("a.cv");
        tree.add_struct(
            LoweredStruct::new("vt").with_field("f", LoweredType::Pending(PlaceholderId(2))),
        );
        assert_eq!(tree.placeholder(), Some(PlaceholderId(2)));

        let mut map = PlaceholderMap::default();
        map.insert(PlaceholderId(2), LoweredNode::bool(true), LoweredType::BOOL);
        tree.replace_placeholders(&map);
        assert_eq!(tree.placeholder(), None);
    }

    #[test]
    fn test_json_output() {
        let mut tree = LoweredTree::new("a.cv");
        tree.add_function(function("f", LoweredType::Void));
        let json = tree.to_json().unwrap();
        assert!(json.contains("\"file\": \"a.cv\""));
        let back: LoweredTree = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tree);
    }
}
