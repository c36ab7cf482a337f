//! Lowered expression and statement nodes
//!
//! The lowered IR is a tree of [`LoweredNode`]s. Values that live in memory
//! are reached through address nodes (`Global`, `FieldPtr`) and read with
//! `Load`; locals are plain values that a `Store` rebinds.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::types::{LoweredType, PlaceholderId};
use crate::parser::ast::{BinaryOp, UnaryOp};
use crate::parser::types::PrimitiveKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LoweredLiteral {
    Int(i128),
    Float(f64),
    Bool(bool),
}

/// Conversion performed by a `Cast` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CastKind {
    SignExtend,
    ZeroExtend,
    Truncate,
    /// Reinterpretation without a change of bits
    Bitcast,
    SignedToFloat,
    UnsignedToFloat,
    FloatToSigned,
    FloatToUnsigned,
    FloatExtend,
    FloatTruncate,
}

impl CastKind {
    /// Conversion between two primitives; `None` when no conversion is needed.
    pub fn between(from: PrimitiveKind, to: PrimitiveKind) -> Option<CastKind> {
        if from == to {
            return None;
        }
        let (fw, tw) = (from.bit_width(), to.bit_width());
        let kind = match (from.is_float(), to.is_float()) {
            (true, true) if fw < tw => CastKind::FloatExtend,
            (true, true) => CastKind::FloatTruncate,
            (false, true) if from.is_signed_integer() => CastKind::SignedToFloat,
            (false, true) => CastKind::UnsignedToFloat,
            (true, false) if to.is_signed_integer() => CastKind::FloatToSigned,
            (true, false) => CastKind::FloatToUnsigned,
            (false, false) if fw < tw && from.is_signed_integer() => CastKind::SignExtend,
            (false, false) if fw < tw => CastKind::ZeroExtend,
            (false, false) if fw > tw => CastKind::Truncate,
            (false, false) => CastKind::Bitcast,
        };
        Some(kind)
    }
}

/// Field selector of a `FieldPtr`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldIndex {
    Index(u32),
    /// Runtime structs are addressed by field name
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LoweredNode {
    Literal {
        value: LoweredLiteral,
        ty: LoweredType,
    },
    Local {
        name: String,
        ty: LoweredType,
    },
    /// Address of a global; `ty` is the type stored there
    Global {
        name: String,
        ty: LoweredType,
    },
    FunctionRef {
        name: String,
        ty: LoweredType,
    },
    Load {
        address: Box<LoweredNode>,
        ty: LoweredType,
    },
    Store {
        target: Box<LoweredNode>,
        value: Box<LoweredNode>,
    },
    /// Address of a field; `ty` is the field type
    FieldPtr {
        base: Box<LoweredNode>,
        structure: String,
        index: FieldIndex,
        ty: LoweredType,
    },
    ExtractValue {
        aggregate: Box<LoweredNode>,
        index: u32,
        ty: LoweredType,
    },
    Aggregate {
        fields: Vec<LoweredNode>,
        ty: LoweredType,
    },
    Unary {
        op: UnaryOp,
        operand: Box<LoweredNode>,
        ty: LoweredType,
    },
    Binary {
        op: BinaryOp,
        left: Box<LoweredNode>,
        right: Box<LoweredNode>,
        ty: LoweredType,
    },
    Call {
        callee: Box<LoweredNode>,
        args: Vec<LoweredNode>,
        ty: LoweredType,
    },
    Cast {
        kind: CastKind,
        value: Box<LoweredNode>,
        ty: LoweredType,
    },
    /// Size in bytes of a type, as `u64`
    SizeOf {
        of: LoweredType,
    },
    Zero(LoweredType),
    Let {
        name: String,
        ty: LoweredType,
        value: Box<LoweredNode>,
    },
    Block {
        stmts: Vec<LoweredNode>,
        value: Option<Box<LoweredNode>>,
    },
    If {
        condition: Box<LoweredNode>,
        then_branch: Box<LoweredNode>,
        else_branch: Option<Box<LoweredNode>>,
    },
    While {
        condition: Box<LoweredNode>,
        body: Box<LoweredNode>,
    },
    Return(Option<Box<LoweredNode>>),
    /// Vtable slot waiting for a generic specialization
    PendingSlot(PlaceholderId),
}

/// Resolutions produced by the vtable fix-up pass.
#[derive(Debug, Default)]
pub struct PlaceholderMap {
    pub nodes: FxHashMap<PlaceholderId, LoweredNode>,
    pub types: FxHashMap<PlaceholderId, LoweredType>,
}

impl PlaceholderMap {
    pub fn insert(&mut self, id: PlaceholderId, node: LoweredNode, ty: LoweredType) {
        self.nodes.insert(id, node);
        self.types.insert(id, ty);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl LoweredNode {
    pub fn literal(value: LoweredLiteral, ty: LoweredType) -> Self {
        LoweredNode::Literal { value, ty }
    }

    pub fn bool(value: bool) -> Self {
        LoweredNode::Literal {
            value: LoweredLiteral::Bool(value),
            ty: LoweredType::BOOL,
        }
    }

    pub fn local(name: impl Into<String>, ty: LoweredType) -> Self {
        LoweredNode::Local {
            name: name.into(),
            ty,
        }
    }

    pub fn global(name: impl Into<String>, ty: LoweredType) -> Self {
        LoweredNode::Global {
            name: name.into(),
            ty,
        }
    }

    pub fn function_ref(name: impl Into<String>, ty: LoweredType) -> Self {
        LoweredNode::FunctionRef {
            name: name.into(),
            ty,
        }
    }

    pub fn load(address: LoweredNode, ty: LoweredType) -> Self {
        LoweredNode::Load {
            address: Box::new(address),
            ty,
        }
    }

    pub fn store(target: LoweredNode, value: LoweredNode) -> Self {
        LoweredNode::Store {
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    pub fn field_ptr(
        base: LoweredNode,
        structure: impl Into<String>,
        index: FieldIndex,
        ty: LoweredType,
    ) -> Self {
        LoweredNode::FieldPtr {
            base: Box::new(base),
            structure: structure.into(),
            index,
            ty,
        }
    }

    pub fn extract(aggregate: LoweredNode, index: u32, ty: LoweredType) -> Self {
        LoweredNode::ExtractValue {
            aggregate: Box::new(aggregate),
            index,
            ty,
        }
    }

    pub fn call(callee: LoweredNode, args: Vec<LoweredNode>) -> Self {
        let ty = callee
            .ty()
            .return_type()
            .cloned()
            .unwrap_or(LoweredType::Void);
        LoweredNode::Call {
            callee: Box::new(callee),
            args,
            ty,
        }
    }

    pub fn cast(kind: CastKind, value: LoweredNode, ty: LoweredType) -> Self {
        LoweredNode::Cast {
            kind,
            value: Box::new(value),
            ty,
        }
    }

    /// Bitcast unless `value` already has type `ty`.
    pub fn bitcast(value: LoweredNode, ty: LoweredType) -> Self {
        if value.ty() == ty {
            value
        } else {
            LoweredNode::cast(CastKind::Bitcast, value, ty)
        }
    }

    pub fn let_(name: impl Into<String>, ty: LoweredType, value: LoweredNode) -> Self {
        LoweredNode::Let {
            name: name.into(),
            ty,
            value: Box::new(value),
        }
    }

    pub fn block(stmts: Vec<LoweredNode>, value: Option<LoweredNode>) -> Self {
        LoweredNode::Block {
            stmts,
            value: value.map(Box::new),
        }
    }

    /// Type of the value the node produces.
    pub fn ty(&self) -> LoweredType {
        match self {
            LoweredNode::Literal { ty, .. }
            | LoweredNode::Local { ty, .. }
            | LoweredNode::FunctionRef { ty, .. }
            | LoweredNode::Load { ty, .. }
            | LoweredNode::ExtractValue { ty, .. }
            | LoweredNode::Aggregate { ty, .. }
            | LoweredNode::Unary { ty, .. }
            | LoweredNode::Binary { ty, .. }
            | LoweredNode::Call { ty, .. }
            | LoweredNode::Cast { ty, .. }
            | LoweredNode::Zero(ty) => ty.clone(),
            LoweredNode::Global { ty, .. } | LoweredNode::FieldPtr { ty, .. } => {
                LoweredType::Pointer(Box::new(ty.clone()))
            }
            LoweredNode::SizeOf { .. } => LoweredType::U64,
            LoweredNode::Block { value, .. } => {
                value.as_ref().map_or(LoweredType::Void, |v| v.ty())
            }
            LoweredNode::PendingSlot(id) => LoweredType::Pending(*id),
            LoweredNode::Store { .. }
            | LoweredNode::Let { .. }
            | LoweredNode::If { .. }
            | LoweredNode::While { .. }
            | LoweredNode::Return(_) => LoweredType::Void,
        }
    }

    /// Direct children, in evaluation order.
    pub fn children(&self) -> Vec<&LoweredNode> {
        match self {
            LoweredNode::Literal { .. }
            | LoweredNode::Local { .. }
            | LoweredNode::Global { .. }
            | LoweredNode::FunctionRef { .. }
            | LoweredNode::SizeOf { .. }
            | LoweredNode::Zero(_)
            | LoweredNode::PendingSlot(_) => Vec::new(),
            LoweredNode::Load { address: inner, .. }
            | LoweredNode::FieldPtr { base: inner, .. }
            | LoweredNode::ExtractValue {
                aggregate: inner, ..
            }
            | LoweredNode::Unary { operand: inner, .. }
            | LoweredNode::Cast { value: inner, .. }
            | LoweredNode::Let { value: inner, .. } => vec![inner.as_ref()],
            LoweredNode::Store { target, value } => vec![target.as_ref(), value.as_ref()],
            LoweredNode::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            LoweredNode::Aggregate { fields, .. } => fields.iter().collect(),
            LoweredNode::Call { callee, args, .. } => {
                std::iter::once(callee.as_ref()).chain(args.iter()).collect()
            }
            LoweredNode::Block { stmts, value } => {
                stmts.iter().chain(value.as_deref()).collect()
            }
            LoweredNode::If {
                condition,
                then_branch,
                else_branch,
            } => std::iter::once(condition.as_ref())
                .chain(std::iter::once(then_branch.as_ref()))
                .chain(else_branch.as_deref())
                .collect(),
            LoweredNode::While { condition, body } => vec![condition.as_ref(), body.as_ref()],
            LoweredNode::Return(value) => value.as_deref().into_iter().collect(),
        }
    }

    fn children_mut(&mut self) -> Vec<&mut LoweredNode> {
        match self {
            LoweredNode::Literal { .. }
            | LoweredNode::Local { .. }
            | LoweredNode::Global { .. }
            | LoweredNode::FunctionRef { .. }
            | LoweredNode::SizeOf { .. }
            | LoweredNode::Zero(_)
            | LoweredNode::PendingSlot(_) => Vec::new(),
            LoweredNode::Load { address: inner, .. }
            | LoweredNode::FieldPtr { base: inner, .. }
            | LoweredNode::ExtractValue {
                aggregate: inner, ..
            }
            | LoweredNode::Unary { operand: inner, .. }
            | LoweredNode::Cast { value: inner, .. }
            | LoweredNode::Let { value: inner, .. } => vec![inner.as_mut()],
            LoweredNode::Store { target, value } => vec![target.as_mut(), value.as_mut()],
            LoweredNode::Binary { left, right, .. } => vec![left.as_mut(), right.as_mut()],
            LoweredNode::Aggregate { fields, .. } => fields.iter_mut().collect(),
            LoweredNode::Call { callee, args, .. } => std::iter::once(callee.as_mut())
                .chain(args.iter_mut())
                .collect(),
            LoweredNode::Block { stmts, value } => {
                stmts.iter_mut().chain(value.as_deref_mut()).collect()
            }
            LoweredNode::If {
                condition,
                then_branch,
                else_branch,
            } => std::iter::once(condition.as_mut())
                .chain(std::iter::once(then_branch.as_mut()))
                .chain(else_branch.as_deref_mut())
                .collect(),
            LoweredNode::While { condition, body } => vec![condition.as_mut(), body.as_mut()],
            LoweredNode::Return(value) => value.as_deref_mut().into_iter().collect(),
        }
    }

    /// Visit the node and all of its descendants, pre-order.
    pub fn walk<'n>(&'n self, f: &mut dyn FnMut(&'n LoweredNode)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// First placeholder left in the subtree.
    pub fn placeholder(&self) -> Option<PlaceholderId> {
        let mut found = None;
        self.walk(&mut |node| {
            if found.is_some() {
                return;
            }
            found = match node {
                LoweredNode::PendingSlot(id) => Some(*id),
                LoweredNode::Aggregate { ty, .. } | LoweredNode::Load { ty, .. } => ty.placeholder(),
                _ => None,
            };
        });
        found
    }

    /// Substitute resolved slots for their placeholders.
    pub fn replace_placeholders(&mut self, map: &PlaceholderMap) {
        if let LoweredNode::PendingSlot(id) = *self {
            if let Some(node) = map.nodes.get(&id) {
                *self = node.clone();
            }
            return;
        }
        match self {
            LoweredNode::Aggregate { ty, .. } | LoweredNode::Load { ty, .. } => {
                ty.replace_placeholders(&map.types)
            }
            _ => {}
        }
        for child in self.children_mut() {
            child.replace_placeholders(map);
        }
    }

    /// Names of every function referenced in the subtree.
    pub fn referenced_functions(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.walk(&mut |node| {
            if let LoweredNode::FunctionRef { name, .. } = node {
                names.push(name.as_str());
            }
        });
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_between_primitives() {
        use PrimitiveKind::*;
        assert_eq!(CastKind::between(I8, I64), Some(CastKind::SignExtend));
        assert_eq!(CastKind::between(U8, I32), Some(CastKind::ZeroExtend));
        assert_eq!(CastKind::between(I64, U8), Some(CastKind::Truncate));
        assert_eq!(CastKind::between(I32, U32), Some(CastKind::Bitcast));
        assert_eq!(CastKind::between(U16, F32), Some(CastKind::UnsignedToFloat));
        assert_eq!(CastKind::between(F64, I16), Some(CastKind::FloatToSigned));
        assert_eq!(CastKind::between(F32, F64), Some(CastKind::FloatExtend));
        assert_eq!(CastKind::between(F64, F32), Some(CastKind::FloatTruncate));
        assert_eq!(CastKind::between(I32, I32), None);
    }

    #[test]
    fn test_node_types() {
        let global = LoweredNode::global("app.count", LoweredType::I32);
        assert_eq!(global.ty(), LoweredType::Pointer(Box::new(LoweredType::I32)));
        let load = LoweredNode::load(global, LoweredType::I32);
        assert_eq!(load.ty(), LoweredType::I32);

        let callee = LoweredNode::function_ref(
            "f",
            LoweredType::function(vec![LoweredType::I32], LoweredType::BOOL),
        );
        let call = LoweredNode::call(callee, vec![load]);
        assert_eq!(call.ty(), LoweredType::BOOL);
        assert_eq!(call.referenced_functions(), vec!["f"]);
    }

    #[test]
    fn test_replace_pending_slot() {
        let mut node = LoweredNode::Aggregate {
            fields: vec![LoweredNode::PendingSlot(PlaceholderId(1))],
            ty: LoweredType::Struct("vt".to_string()),
        };
        assert_eq!(node.placeholder(), Some(PlaceholderId(1)));

        let mut map = PlaceholderMap::default();
        let fn_ty = LoweredType::function(vec![LoweredType::opaque()], LoweredType::I32);
        map.insert(
            PlaceholderId(1),
            LoweredNode::function_ref("Box[i32]::Get", fn_ty.clone()),
            fn_ty,
        );
        node.replace_placeholders(&map);
        assert_eq!(node.placeholder(), None);
        assert_eq!(node.referenced_functions(), vec!["Box[i32]::Get"]);
    }
}
