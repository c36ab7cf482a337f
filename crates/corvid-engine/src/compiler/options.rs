//! Compilation options

use serde::{Deserialize, Serialize};

/// Options for a [`Compilation`](crate::compiler::Compilation)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Worker threads for analysis and lowering
    pub workers: usize,
    /// Process files on worker threads (when false, files run in order on the caller's thread)
    pub parallel: bool,
    /// Runtime function that allocates class instances: `fn(u64) ptr`
    pub allocator: String,
    /// Runtime function that finds a protocol vtable: `fn(instance ptr, descriptor ptr) ptr`
    pub protocol_lookup: String,
    /// Namespace whose `main` function is exported unmangled
    pub entry_namespace: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            parallel: true,
            allocator: "corvid_alloc".to_string(),
            protocol_lookup: "corvid_protocol_vtable".to_string(),
            entry_namespace: String::new(),
        }
    }
}

impl CompileOptions {
    /// Options that lower every file on the calling thread.
    pub fn sequential() -> Self {
        Self {
            workers: 1,
            parallel: false,
            ..Self::default()
        }
    }

    /// Effective number of worker threads.
    pub fn worker_count(&self, files: usize) -> usize {
        if self.parallel {
            self.workers.clamp(1, files.max(1))
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_count() {
        let options = CompileOptions {
            workers: 8,
            ..CompileOptions::default()
        };
        assert_eq!(options.worker_count(3), 3);
        assert_eq!(options.worker_count(0), 1);
        assert_eq!(CompileOptions::sequential().worker_count(10), 1);
    }

    #[test]
    fn test_options_from_partial_json() {
        let options: CompileOptions = serde_json::from_str(r#"{"allocator": "gc_alloc"}"#).unwrap();
        assert_eq!(options.allocator, "gc_alloc");
        assert_eq!(options.protocol_lookup, "corvid_protocol_vtable");
        assert!(options.parallel);
    }
}
