//! Pretty-printing for the lowered IR
//!
//! Provides human-readable output for debugging lowered trees.

use std::fmt::{self, Write};

use super::module::{Linkage, LoweredFunction, LoweredGlobal, LoweredProgram, LoweredStruct, LoweredTree};
use super::node::{FieldIndex, LoweredLiteral, LoweredNode};

/// Trait for pretty-printing lowered IR constructs
pub trait PrettyPrint {
    fn pretty_print(&self) -> String;
}

impl PrettyPrint for LoweredProgram {
    fn pretty_print(&self) -> String {
        let mut output = String::new();
        for file in &self.files {
            output.push_str(&file.pretty_print());
        }
        output
    }
}

impl PrettyPrint for LoweredTree {
    fn pretty_print(&self) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "; file {}", self.file);
        for s in self.structs.values() {
            output.push_str(&s.pretty_print());
        }
        for g in self.globals.values() {
            output.push_str(&g.pretty_print());
        }
        for f in self.functions.values() {
            output.push_str(&f.pretty_print());
        }
        output
    }
}

impl PrettyPrint for LoweredStruct {
    fn pretty_print(&self) -> String {
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|f| format!("{}: {}", f.name, f.ty))
            .collect();
        format!("struct %{} {{ {} }}\n", self.name, fields.join(", "))
    }
}

impl PrettyPrint for LoweredGlobal {
    fn pretty_print(&self) -> String {
        let keyword = if self.is_constant { "const" } else { "global" };
        let mut output = format!("{}{} @{}: {}", linkage_prefix(self.linkage), keyword, self.name, self.ty);
        if let Some(init) = &self.initializer {
            output.push_str(" = ");
            let mut printer = Printer::new(1);
            let _ = printer.node(init);
            output.push_str(printer.output.trim_start());
        }
        output.push('\n');
        output
    }
}

impl PrettyPrint for LoweredFunction {
    fn pretty_print(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|(name, ty)| format!("{} {}", name, ty))
            .collect();
        let mut output = format!(
            "{}fn @{}({}) {}",
            linkage_prefix(self.linkage),
            self.name,
            params.join(", "),
            self.ret
        );
        match &self.body {
            Some(body) => {
                output.push(' ');
                let mut printer = Printer::new(0);
                let _ = printer.node(body);
                output.push_str(&printer.output);
                output.push('\n');
            }
            None => output.push_str(";\n"),
        }
        output
    }
}

impl PrettyPrint for LoweredNode {
    fn pretty_print(&self) -> String {
        let mut printer = Printer::new(0);
        let _ = printer.node(self);
        printer.output
    }
}

fn linkage_prefix(linkage: Linkage) -> &'static str {
    match linkage {
        Linkage::Internal => "",
        Linkage::External => "export ",
        Linkage::Foreign => "extern ",
    }
}

struct Printer {
    output: String,
    indent: usize,
}

impl Printer {
    fn new(indent: usize) -> Self {
        Self {
            output: String::new(),
            indent,
        }
    }

    fn newline(&mut self) -> fmt::Result {
        self.output.push('\n');
        write!(self.output, "{}", "  ".repeat(self.indent))
    }

    fn list(&mut self, nodes: &[LoweredNode]) -> fmt::Result {
        for (i, node) in nodes.iter().enumerate() {
            if i > 0 {
                self.output.push_str(", ");
            }
            self.node(node)?;
        }
        Ok(())
    }

    fn node(&mut self, node: &LoweredNode) -> fmt::Result {
        match node {
            LoweredNode::Literal { value, ty } => match value {
                LoweredLiteral::Int(v) => write!(self.output, "{} {}", ty, v),
                LoweredLiteral::Float(v) => write!(self.output, "{} {:?}", ty, v),
                LoweredLiteral::Bool(v) => write!(self.output, "{}", v),
            },
            LoweredNode::Local { name, .. } => write!(self.output, "%{}", name),
            LoweredNode::Global { name, .. } => write!(self.output, "@{}", name),
            LoweredNode::FunctionRef { name, .. } => write!(self.output, "&{}", name),
            LoweredNode::Load { address, ty } => {
                write!(self.output, "load {} ", ty)?;
                self.node(address)
            }
            LoweredNode::Store { target, value } => {
                self.output.push_str("store ");
                self.node(target)?;
                self.output.push_str(" <- ");
                self.node(value)
            }
            LoweredNode::FieldPtr {
                base,
                structure,
                index,
                ..
            } => {
                self.output.push_str("fieldptr ");
                self.node(base)?;
                match index {
                    FieldIndex::Index(i) => write!(self.output, " %{}.{}", structure, i),
                    FieldIndex::Name(n) => write!(self.output, " %{}.{}", structure, n),
                }
            }
            LoweredNode::ExtractValue {
                aggregate, index, ..
            } => {
                self.output.push_str("extract ");
                self.node(aggregate)?;
                write!(self.output, ".{}", index)
            }
            LoweredNode::Aggregate { fields, ty } => {
                write!(self.output, "{} {{", ty)?;
                self.indent += 1;
                for field in fields {
                    self.newline()?;
                    self.node(field)?;
                }
                self.indent -= 1;
                self.newline()?;
                self.output.push('}');
                Ok(())
            }
            LoweredNode::Unary { op, operand, .. } => {
                write!(self.output, "{:?} ", op)?;
                self.node(operand)
            }
            LoweredNode::Binary {
                op, left, right, ..
            } => {
                write!(self.output, "{:?}(", op)?;
                self.node(left)?;
                self.output.push_str(", ");
                self.node(right)?;
                self.output.push(')');
                Ok(())
            }
            LoweredNode::Call { callee, args, .. } => {
                self.output.push_str("call ");
                self.node(callee)?;
                self.output.push('(');
                self.list(args)?;
                self.output.push(')');
                Ok(())
            }
            LoweredNode::Cast { kind, value, ty } => {
                write!(self.output, "{:?} ", kind)?;
                self.node(value)?;
                write!(self.output, " to {}", ty)
            }
            LoweredNode::SizeOf { of } => write!(self.output, "sizeof {}", of),
            LoweredNode::Zero(ty) => write!(self.output, "zero {}", ty),
            LoweredNode::Let { name, ty, value } => {
                write!(self.output, "let %{}: {} = ", name, ty)?;
                self.node(value)
            }
            LoweredNode::Block { stmts, value } => {
                self.output.push('{');
                self.indent += 1;
                for stmt in stmts {
                    self.newline()?;
                    self.node(stmt)?;
                }
                if let Some(value) = value {
                    self.newline()?;
                    self.output.push_str("=> ");
                    self.node(value)?;
                }
                self.indent -= 1;
                self.newline()?;
                self.output.push('}');
                Ok(())
            }
            LoweredNode::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.output.push_str("if ");
                self.node(condition)?;
                self.output.push(' ');
                self.node(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.output.push_str(" else ");
                    self.node(else_branch)?;
                }
                Ok(())
            }
            LoweredNode::While { condition, body } => {
                self.output.push_str("while ");
                self.node(condition)?;
                self.output.push(' ');
                self.node(body)
            }
            LoweredNode::Return(value) => {
                self.output.push_str("return");
                if let Some(value) = value {
                    self.output.push(' ');
                    self.node(value)?;
                }
                Ok(())
            }
            LoweredNode::PendingSlot(id) => write!(self.output, "pending{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::LoweredType;

    #[test]
    fn test_function_pretty_print() {
        let f = LoweredFunction {
            name: "app.answer".to_string(),
            params: vec![("x.0".to_string(), LoweredType::I32)],
            ret: LoweredType::I32,
            body: Some(LoweredNode::block(
                vec![LoweredNode::Return(Some(Box::new(LoweredNode::local(
                    "x.0",
                    LoweredType::I32,
                ))))],
                None,
            )),
            linkage: Linkage::External,
        };
        let text = f.pretty_print();
        assert!(text.starts_with("export fn @app.answer(x.0 i32) i32 {"));
        assert!(text.contains("return %x.0"));
    }

    #[test]
    fn test_foreign_declaration() {
        let f = LoweredFunction::foreign("corvid_alloc", vec![LoweredType::U64], LoweredType::opaque());
        assert_eq!(f.pretty_print(), "extern fn @corvid_alloc(p0 u64) ptr;\n");
    }
}
