//! Declaration index: which functions a source tree declares.
//!
//! Walks a root directory, parses every `*.rs` file with `syn`, and records
//! one [`DeclaredFunction`] per free function, `impl` method, trait method,
//! and function inside an inline `mod` block. The index is built once per
//! run and handed by value to the edge sources; nothing here is global.
//!
//! Files that fail to parse are logged and skipped; the run continues.

pub mod source;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use syn::ext::IdentExt;
use syn::spanned::Spanned;
use syn::{Block, ImplItem, Item, Signature, TraitItem, Visibility};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::model::{FunctionDetail, KnownNames};
pub use source::{Position, SourceText};

/// Directory names skipped during discovery unless configured otherwise.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &["target", ".git", ".callmap", "node_modules"];

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("source root not found: {0}")]
    MissingRoot(PathBuf),
    #[error("failed to resolve source root {path}: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Options controlling discovery.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Directory names (not paths) that are never descended into.
    pub excluded_dirs: Vec<String>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self { excluded_dirs: DEFAULT_EXCLUDED_DIRS.iter().map(|s| s.to_string()).collect() }
    }
}

/// One source file that parsed successfully.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
}

/// A file that was skipped during indexing, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// One function declaration found in the corpus.
#[derive(Debug, Clone)]
pub struct DeclaredFunction {
    pub name: String,
    pub file: PathBuf,
    /// Position of the name identifier, in analysis-server coordinates.
    pub position: Position,
    pub signature: String,
    pub definition: String,
    /// Body syntax. `None` for required trait methods.
    pub body: Option<Block>,
}

impl DeclaredFunction {
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }
}

/// Everything the edge sources and the assembler need about the corpus.
#[derive(Debug, Clone, Default)]
pub struct DeclarationIndex {
    functions: Vec<DeclaredFunction>,
    sources: Vec<SourceFile>,
    skipped: Vec<SkippedFile>,
    names: KnownNames,
}

impl DeclarationIndex {
    /// Discover and index every Rust file under `root`.
    pub fn build(root: &Path, options: &IndexOptions) -> Result<Self, IndexError> {
        if !root.is_dir() {
            return Err(IndexError::MissingRoot(root.to_path_buf()));
        }
        let root = root
            .canonicalize()
            .map_err(|source| IndexError::Root { path: root.to_path_buf(), source })?;

        let mut index = Self::default();
        let walker = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_excluded(entry, options));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file()
                || entry.path().extension().and_then(|e| e.to_str()) != Some("rs")
            {
                continue;
            }
            match std::fs::read_to_string(entry.path()) {
                Ok(text) => index.add_source(entry.path().to_path_buf(), text),
                Err(err) => {
                    warn!(file = %entry.path().display(), error = %err, "failed to read source");
                    index.skipped.push(SkippedFile {
                        path: entry.path().to_path_buf(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        debug!(
            files = index.sources.len(),
            functions = index.functions.len(),
            skipped = index.skipped.len(),
            "declaration index built"
        );
        Ok(index)
    }

    /// Build an index from in-memory `(path, text)` pairs.
    pub fn from_sources<I, P, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = (P, S)>,
        P: Into<PathBuf>,
        S: Into<String>,
    {
        let mut index = Self::default();
        for (path, text) in sources {
            index.add_source(path.into(), text.into());
        }
        index
    }

    fn add_source(&mut self, path: PathBuf, text: String) {
        let file = match syn::parse_file(&text) {
            Ok(file) => file,
            Err(err) => {
                warn!(file = %path.display(), error = %err, "parse error, skipping file");
                self.skipped.push(SkippedFile { path, reason: err.to_string() });
                return;
            }
        };

        let src = SourceText::new(&text);
        let mut found = Vec::new();
        collect_items(&file.items, &path, &src, &mut found);
        for function in &found {
            if !self.names.insert(function.name.clone()) {
                debug!(name = %function.name, file = %path.display(), "name collision, merging");
            }
        }
        self.functions.extend(found);
        self.sources.push(SourceFile { path, text });
    }

    /// Every declared function name.
    pub fn names(&self) -> &KnownNames {
        &self.names
    }

    /// Signature and definition per name. The last declaration of a name wins.
    pub fn details(&self) -> BTreeMap<String, FunctionDetail> {
        self.functions
            .iter()
            .map(|f| {
                let detail = FunctionDetail {
                    signature: f.signature.clone(),
                    definition: f.definition.clone(),
                };
                (f.name.clone(), detail)
            })
            .collect()
    }

    /// All declarations in discovery order, collisions included.
    pub fn functions(&self) -> &[DeclaredFunction] {
        &self.functions
    }

    /// Source files that parsed, in discovery order.
    pub fn sources(&self) -> &[SourceFile] {
        &self.sources
    }

    pub fn skipped(&self) -> &[SkippedFile] {
        &self.skipped
    }
}

fn is_excluded(entry: &DirEntry, options: &IndexOptions) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || options.excluded_dirs.iter().any(|d| d.as_str() == name)
}

fn collect_items(
    items: &[Item],
    file: &Path,
    src: &SourceText<'_>,
    out: &mut Vec<DeclaredFunction>,
) {
    for item in items {
        match item {
            Item::Fn(func) => {
                out.push(declare(file, src, &func.vis, &func.sig, Some(&func.block)));
            }
            Item::Impl(item_impl) => {
                for impl_item in &item_impl.items {
                    if let ImplItem::Fn(method) = impl_item {
                        out.push(declare(file, src, &method.vis, &method.sig, Some(&method.block)));
                    }
                }
            }
            Item::Trait(item_trait) => {
                for trait_item in &item_trait.items {
                    if let TraitItem::Fn(method) = trait_item {
                        out.push(declare_trait_fn(file, src, method));
                    }
                }
            }
            Item::Mod(item_mod) => {
                if let Some((_, nested)) = &item_mod.content {
                    collect_items(nested, file, src, out);
                }
            }
            _ => {}
        }
    }
}

fn declare(
    file: &Path,
    src: &SourceText<'_>,
    vis: &Visibility,
    sig: &Signature,
    block: Option<&Block>,
) -> DeclaredFunction {
    let sig_span = sig.span();
    let start = match vis {
        Visibility::Inherited => sig_span.start(),
        other => other.span().start(),
    };
    let end = match block {
        Some(block) => block.brace_token.span.close().end(),
        None => sig_span.end(),
    };

    DeclaredFunction {
        name: sig.ident.unraw().to_string(),
        file: file.to_path_buf(),
        position: src.position(sig.ident.span().start()),
        signature: src.slice(sig_span.start(), sig_span.end()).to_string(),
        definition: src.slice(start, end).to_string(),
        body: block.cloned(),
    }
}

fn declare_trait_fn(
    file: &Path,
    src: &SourceText<'_>,
    method: &syn::TraitItemFn,
) -> DeclaredFunction {
    let mut declared =
        declare(file, src, &Visibility::Inherited, &method.sig, method.default.as_ref());
    if let (None, Some(semi)) = (&method.default, &method.semi_token) {
        // Include the trailing `;` of a required method.
        declared.definition = src.slice(method.sig.span().start(), semi.span().end()).to_string();
    }
    declared
}
