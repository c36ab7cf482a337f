//! Compilation driver
//!
//! Orchestrates checking and lowering of a set of Corvid source files:
//!
//! 1. parse every file
//! 2. bind all declarations into one symbol table
//! 3. analyse every file, on worker threads when enabled
//! 4. refuse to lower if any error was reported
//! 5. lower every file on worker threads sharing one [`GlobalLoweringContext`]
//! 6. resolve pending vtable slots and merge on-demand output per file

use std::sync::atomic::{AtomicUsize, Ordering};

use codespan_reporting::files::SimpleFiles;
use tracing::{debug, trace, warn};

use super::error::{CompileError, CompileResult};
use super::ir::{LoweredProgram, LoweredTree};
use super::lower::{Lowerer, SlotGenerator};
use super::monomorphize::GlobalLoweringContext;
use super::options::CompileOptions;
use crate::parser::ast::SourceFile;
use crate::parser::checker::{emit_to_string, Analyser, Binder, Diagnostics, FileId};
use crate::parser::{Parser, SemanticTree, SymbolTable};

/// Output of [`Compilation::check`].
#[derive(Debug)]
struct Checked {
    table: SymbolTable,
    trees: Vec<SemanticTree>,
    diagnostics: Diagnostics,
}

/// A set of source files compiled together
///
/// Sources are added first; `check` analyses them and `lower` produces the
/// lowered program. Adding a source discards earlier results.
#[derive(Debug)]
pub struct Compilation {
    options: CompileOptions,
    /// `(path, text)` in file order
    sources: Vec<(String, String)>,
    state: Option<Checked>,
}

impl Compilation {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            options,
            sources: Vec::new(),
            state: None,
        }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Add a source file; returns its id.
    pub fn add_source(&mut self, path: impl Into<String>, text: impl Into<String>) -> FileId {
        self.state = None;
        self.sources.push((path.into(), text.into()));
        FileId((self.sources.len() - 1) as u32)
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Parse, bind and analyse every source.
    ///
    /// A parse error stops the compilation; semantic errors are collected
    /// and returned for inspection.
    pub fn check(&mut self) -> CompileResult<&Diagnostics> {
        let files = self.parse()?;
        let table = Binder::new().bind(&files);
        debug!(files = files.len(), symbols = table.len(), "bound declarations");

        let workers = self.options.worker_count(files.len());
        let analysed = run_per_file(files.len(), workers, |index| {
            let mut diagnostics = Diagnostics::new();
            let file = FileId(index as u32);
            trace!(file = %files[index].path, "analysing");
            let tree = Analyser::new(&table, file, &mut diagnostics).analyse(&files[index]);
            (tree, diagnostics)
        })?;

        let mut diagnostics = Diagnostics::new();
        let mut trees = Vec::with_capacity(analysed.len());
        for (tree, file_diagnostics) in analysed {
            diagnostics.extend(file_diagnostics);
            trees.push(tree);
        }
        diagnostics.sort();
        debug!(
            files = trees.len(),
            errors = diagnostics.error_count(),
            diagnostics = diagnostics.len(),
            "checked sources"
        );

        let state = self.state.insert(Checked {
            table,
            trees,
            diagnostics,
        });
        Ok(&state.diagnostics)
    }

    fn parse(&self) -> CompileResult<Vec<SourceFile>> {
        self.sources
            .iter()
            .map(|(path, text)| {
                Parser::new(text)
                    .and_then(|parser| parser.parse(path.clone()))
                    .map_err(|errors| CompileError::Parse {
                        path: path.clone(),
                        errors,
                    })
            })
            .collect()
    }

    /// Diagnostics of the last `check`.
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        self.state.as_ref().map(|s| &s.diagnostics)
    }

    pub fn symbol_table(&self) -> Option<&SymbolTable> {
        self.state.as_ref().map(|s| &s.table)
    }

    pub fn semantic_trees(&self) -> &[SemanticTree] {
        self.state.as_ref().map_or(&[], |s| &s.trees)
    }

    /// Render the diagnostics of the last `check` as plain text.
    pub fn render_diagnostics(&self) -> Result<String, codespan_reporting::files::Error> {
        let Some(state) = &self.state else {
            return Ok(String::new());
        };
        let mut files = SimpleFiles::new();
        for (path, text) in &self.sources {
            files.add(path.clone(), text.clone());
        }
        emit_to_string(&files, &state.diagnostics)
    }

    /// Lower the checked program.
    pub fn lower(&self) -> CompileResult<LoweredProgram> {
        let state = self.state.as_ref().ok_or(CompileError::NotChecked)?;
        if state.diagnostics.has_errors() {
            let errors = state.diagnostics.error_count();
            warn!(errors, "lowering refused: program has errors");
            return Err(CompileError::HasErrors(errors));
        }

        let ctx = GlobalLoweringContext::new(&state.table, self.options.clone());
        let workers = self.options.worker_count(state.trees.len());
        let lowered = run_per_file(state.trees.len(), workers, |index| {
            let tree = &state.trees[index];
            Lowerer::new(&ctx, tree.file).lower_file(tree)
        })?;
        let files = lowered.into_iter().collect::<Result<Vec<LoweredTree>, _>>()?;

        debug!(files = files.len(), pending = ctx.pending_slots(), "lowered files");
        let files = ctx.finish(files, &SlotGenerator)?;
        Ok(LoweredProgram { files })
    }
}

/// Run `work` once per file index and return the results in file order.
///
/// With more than one worker, files are handed out through a shared counter
/// to scoped threads.
fn run_per_file<T, F>(count: usize, workers: usize, work: F) -> CompileResult<Vec<T>>
where
    T: Send,
    F: Fn(usize) -> T + Sync,
{
    if workers <= 1 {
        return Ok((0..count).map(&work).collect());
    }

    let next = AtomicUsize::new(0);
    let mut results: Vec<(usize, T)> = crossbeam::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            handles.push(scope.spawn(|_| {
                let mut done = Vec::new();
                loop {
                    let index = next.fetch_add(1, Ordering::Relaxed);
                    if index >= count {
                        break;
                    }
                    done.push((index, work(index)));
                }
                done
            }));
        }

        let mut results = Vec::with_capacity(count);
        for handle in handles {
            results.extend(handle.join().map_err(|_| CompileError::WorkerPanicked)?);
        }
        Ok::<_, CompileError>(results)
    })
    .map_err(|_| CompileError::WorkerPanicked)??;

    results.sort_by_key(|(index, _)| *index);
    Ok(results.into_iter().map(|(_, result)| result).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lower_before_check() {
        let mut compilation = Compilation::new(CompileOptions::sequential());
        compilation.add_source("main.cv", "fn main() {}");
        assert!(matches!(compilation.lower(), Err(CompileError::NotChecked)));
    }

    #[test]
    fn test_parse_error_names_file() {
        let mut compilation = Compilation::new(CompileOptions::sequential());
        compilation.add_source("ok.cv", "fn main() {}");
        compilation.add_source("broken.cv", "fn main( {");
        match compilation.check() {
            Err(CompileError::Parse { path, errors }) => {
                assert_eq!(path, "broken.cv");
                assert!(!errors.is_empty());
            }
            other => panic!("expected a parse error, got {:?}", other.map(|d| d.len())),
        }
    }

    #[test]
    fn test_run_per_file_keeps_order() {
        let squares = run_per_file(50, 4, |i| i * i).unwrap();
        assert_eq!(squares, (0..50).map(|i| i * i).collect::<Vec<_>>());
        assert!(run_per_file(0, 4, |i| i).unwrap().is_empty());
    }

    #[test]
    fn test_add_source_resets_state() {
        let mut compilation = Compilation::new(CompileOptions::sequential());
        compilation.add_source("a.cv", "fn main() {}");
        compilation.check().unwrap();
        assert!(compilation.diagnostics().is_some());
        let id = compilation.add_source("b.cv", "fn helper() {}");
        assert_eq!(id, FileId(1));
        assert!(compilation.diagnostics().is_none());
    }
}
