//! Program-wide lowering state
//!
//! One [`GlobalLoweringContext`] is shared by every per-file lowerer of a
//! compilation. It owns the names of everything generated on demand (struct
//! layouts, generic specializations, vtables), the per-file output of those
//! generations and the backlog of vtable slots still waiting for a generic
//! specialization.
//!
//! Generation is exactly-once per mangled name: [`ensure`] takes the lock of
//! its concern, checks the name, records it and only then runs the
//! generator, all under the lock. The locks are reentrant so a generator can
//! request further generations of the same concern (a generic function
//! calling itself records its name before its body is lowered). Locks are
//! taken in the order function, vtable, struct; vtable generation never
//! generates functions, it leaves placeholders for [`finish`] instead.
//!
//! [`ensure`]: GlobalLoweringContext::ensure
//! [`finish`]: GlobalLoweringContext::finish

use parking_lot::{Mutex, ReentrantMutex};
use rustc_hash::FxHasher;
use std::hash::BuildHasherDefault;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

use dashmap::{DashMap, DashSet};

use super::{NameMangler, TypeArgumentResolver};
use crate::compiler::error::{LowerError, LowerResult};
use crate::compiler::ir::{LoweredNode, LoweredTree, LoweredType, PlaceholderId, PlaceholderMap};
use crate::compiler::layout::LoweredTypeBuilder;
use crate::compiler::options::CompileOptions;
use crate::parser::checker::FileId;
use crate::parser::types::DataType;
use crate::parser::{SymbolId, SymbolTable};

type FxDashSet<K> = DashSet<K, BuildHasherDefault<FxHasher>>;
type FxDashMap<K, V> = DashMap<K, V, BuildHasherDefault<FxHasher>>;

/// What an on-demand generation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Concern {
    Struct,
    Function,
    /// Vtables, type tables and protocol descriptors
    Vtable,
}

/// A vtable slot whose implementation lives in a generic structure that
/// may not be specialized yet.
#[derive(Debug, Clone)]
pub struct PendingSlot {
    pub id: PlaceholderId,
    /// Implementing function
    pub function: SymbolId,
    /// Its owner, written in the owner's own type parameters
    pub owner: DataType,
    /// Bindings that make `owner` concrete
    pub bindings: TypeArgumentResolver,
    /// Vtable holding the slot
    pub vtable: String,
}

/// Generates the function behind a pending slot during [`GlobalLoweringContext::finish`].
pub trait SlotResolver {
    /// The node that fills the slot, and the slot's type.
    fn resolve_slot(
        &self,
        ctx: &GlobalLoweringContext<'_>,
        slot: &PendingSlot,
    ) -> LowerResult<(LoweredNode, LoweredType)>;
}

pub struct GlobalLoweringContext<'a> {
    table: &'a SymbolTable,
    builder: LoweredTypeBuilder<'a>,
    options: CompileOptions,

    structs: FxDashSet<String>,
    functions: FxDashSet<String>,
    vtables: FxDashSet<String>,

    struct_lock: ReentrantMutex<()>,
    function_lock: ReentrantMutex<()>,
    vtable_lock: ReentrantMutex<()>,

    /// Generated declarations, indexed by the file that owns their declaration
    on_demand: Vec<Mutex<LoweredTree>>,
    backlog: Mutex<Vec<PendingSlot>>,
    next_placeholder: AtomicU32,
    /// How many times each name was generated; always 1
    generations: FxDashMap<String, u32>,
}

impl<'a> GlobalLoweringContext<'a> {
    pub fn new(table: &'a SymbolTable, options: CompileOptions) -> Self {
        let on_demand = (0..table.file_count())
            .map(|i| Mutex::new(LoweredTree::new(table.file_scope(FileId(i as u32)).path.clone())))
            .collect();
        Self {
            table,
            builder: LoweredTypeBuilder::new(table),
            options,
            structs: FxDashSet::default(),
            functions: FxDashSet::default(),
            vtables: FxDashSet::default(),
            struct_lock: ReentrantMutex::new(()),
            function_lock: ReentrantMutex::new(()),
            vtable_lock: ReentrantMutex::new(()),
            on_demand,
            backlog: Mutex::new(Vec::new()),
            next_placeholder: AtomicU32::new(0),
            generations: FxDashMap::default(),
        }
    }

    pub fn table(&self) -> &'a SymbolTable {
        self.table
    }

    pub fn builder(&self) -> &LoweredTypeBuilder<'a> {
        &self.builder
    }

    pub fn mangler(&self) -> &NameMangler<'a> {
        self.builder.mangler()
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    fn names(&self, concern: Concern) -> &FxDashSet<String> {
        match concern {
            Concern::Struct => &self.structs,
            Concern::Function => &self.functions,
            Concern::Vtable => &self.vtables,
        }
    }

    fn lock(&self, concern: Concern) -> &ReentrantMutex<()> {
        match concern {
            Concern::Struct => &self.struct_lock,
            Concern::Function => &self.function_lock,
            Concern::Vtable => &self.vtable_lock,
        }
    }

    /// Generate `name` unless it already was, anywhere in the program.
    ///
    /// The generated declarations are recorded against `owner`, the file
    /// declaring the generic source, not the file that asked. Returns
    /// whether this call ran the generator.
    pub fn ensure<F>(&self, concern: Concern, name: &str, owner: FileId, generate: F) -> LowerResult<bool>
    where
        F: FnOnce() -> LowerResult<LoweredTree>,
    {
        let _guard = self.lock(concern).lock();
        if !self.names(concern).insert(name.to_string()) {
            return Ok(false);
        }

        let tree = generate()?;
        *self.generations.entry(name.to_string()).or_insert(0) += 1;
        debug!(name, ?concern, file = owner.0, declarations = tree.len(), "generated on demand");
        self.on_demand[owner.index()].lock().merge(tree);
        Ok(true)
    }

    pub fn is_generated(&self, concern: Concern, name: &str) -> bool {
        self.names(concern).contains(name)
    }

    /// How many times `name` was generated.
    pub fn generation_count(&self, name: &str) -> u32 {
        self.generations.get(name).map_or(0, |count| *count)
    }

    /// Record a vtable slot to fill once its implementation is specialized.
    pub fn defer_slot(
        &self,
        function: SymbolId,
        owner: DataType,
        bindings: TypeArgumentResolver,
        vtable: &str,
    ) -> PlaceholderId {
        let id = PlaceholderId(self.next_placeholder.fetch_add(1, Ordering::Relaxed));
        self.backlog.lock().push(PendingSlot {
            id,
            function,
            owner,
            bindings,
            vtable: vtable.to_string(),
        });
        id
    }

    pub fn pending_slots(&self) -> usize {
        self.backlog.lock().len()
    }

    /// Resolve every pending slot and merge the on-demand output into `files`.
    ///
    /// Runs single-threaded after every file is lowered. Resolving a slot can
    /// generate code that defers new slots, so the backlog is drained until
    /// it stays empty.
    pub fn finish(&self, mut files: Vec<LoweredTree>, resolver: &dyn SlotResolver) -> LowerResult<Vec<LoweredTree>> {
        let mut resolved = PlaceholderMap::default();
        loop {
            let mut batch = std::mem::take(&mut *self.backlog.lock());
            if batch.is_empty() {
                break;
            }
            batch.sort_by_key(|slot| slot.id);
            for slot in &batch {
                let (node, ty) = resolver.resolve_slot(self, slot)?;
                debug!(placeholder = slot.id.0, vtable = %slot.vtable, "resolved vtable slot");
                resolved.insert(slot.id, node, ty);
            }
        }

        for (index, cell) in self.on_demand.iter().enumerate() {
            let mut generated = std::mem::take(&mut *cell.lock());
            if !resolved.is_empty() {
                generated.replace_placeholders(&resolved);
            }
            if let Some(id) = generated.placeholder() {
                return Err(LowerError::UnresolvedPlaceholder(id));
            }
            match files.get_mut(index) {
                Some(file) => file.merge(generated),
                None => files.push(generated),
            }
        }
        debug!(placeholders = resolved.len(), files = files.len(), "lowering finished");
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::{Linkage, LoweredFunction, LoweredStruct};
    use crate::parser::checker::Binder;
    use crate::parser::Parser;
    use std::sync::atomic::AtomicUsize;

    fn table(files: usize) -> SymbolTable {
        let files: Vec<_> = (0..files)
            .map(|i| {
                Parser::new("fn main() {}")
                    .unwrap()
                    .parse(format!("f{}.cv", i))
                    .unwrap()
            })
            .collect();
        Binder::new().bind(&files)
    }

    fn tree_with(name: &str) -> LoweredTree {
        let mut tree = LoweredTree::default();
        tree.add_function(LoweredFunction {
            name: name.to_string(),
            params: Vec::new(),
            ret: LoweredType::Void,
            body: None,
            linkage: Linkage::Internal,
        });
        tree
    }

    struct NoSlots;

    impl SlotResolver for NoSlots {
        fn resolve_slot(
            &self,
            _ctx: &GlobalLoweringContext<'_>,
            slot: &PendingSlot,
        ) -> LowerResult<(LoweredNode, LoweredType)> {
            Err(LowerError::UnresolvedPlaceholder(slot.id))
        }
    }

    #[test]
    fn test_exactly_once_under_threads() {
        let table = table(4);
        let ctx = GlobalLoweringContext::new(&table, CompileOptions::default());
        let calls = AtomicUsize::new(0);

        crossbeam::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|_| {
                    for _ in 0..50 {
                        ctx.ensure(Concern::Function, "Box[i32]::Get", FileId(2), || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok(tree_with("Box[i32]::Get"))
                        })
                        .unwrap();
                    }
                });
            }
        })
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.generation_count("Box[i32]::Get"), 1);

        let files = ctx
            .finish((0..4).map(|i| LoweredTree::new(format!("f{}.cv", i))).collect(), &NoSlots)
            .unwrap();
        assert!(files[2].functions.contains_key("Box[i32]::Get"));
        assert!(files.iter().enumerate().all(|(i, f)| i == 2 || f.functions.is_empty()));
    }

    #[test]
    fn test_recursive_request_sees_recorded_name() {
        let table = table(1);
        let ctx = GlobalLoweringContext::new(&table, CompileOptions::default());
        let generated = ctx
            .ensure(Concern::Function, "f[i32]", FileId(0), || {
                let again = ctx.ensure(Concern::Function, "f[i32]", FileId(0), || {
                    panic!("generated twice")
                })?;
                assert!(!again);
                Ok(tree_with("f[i32]"))
            })
            .unwrap();
        assert!(generated);
        assert!(ctx.is_generated(Concern::Function, "f[i32]"));
        assert!(!ctx.is_generated(Concern::Struct, "f[i32]"));
    }

    #[test]
    fn test_unresolved_placeholder_fails_finish() {
        let table = table(1);
        let ctx = GlobalLoweringContext::new(&table, CompileOptions::default());
        ctx.ensure(Concern::Vtable, "vt", FileId(0), || {
            let mut tree = LoweredTree::default();
            tree.add_struct(
                LoweredStruct::new("vt").with_field("f", LoweredType::Pending(PlaceholderId(9))),
            );
            Ok(tree)
        })
        .unwrap();
        let result = ctx.finish(vec![LoweredTree::new("f0.cv")], &NoSlots);
        assert_eq!(result, Err(LowerError::UnresolvedPlaceholder(PlaceholderId(9))));
    }
}
