//! Lexical call extraction.
//!
//! Walks a function body and records every call whose target name is a
//! declared function. Resolution is by name only: a local closure or an
//! unrelated type's method that shares a declared function's name produces
//! an edge to that function. Calls to undeclared names are dropped.

use std::collections::HashSet;

use syn::ext::IdentExt;
use syn::punctuated::Punctuated;
use syn::visit::{self, Visit};
use syn::{Block, Expr, ExprCall, ExprMethodCall, Ident, Macro, Token};

use crate::index::{DeclarationIndex, DeclaredFunction};
use crate::model::{CallMap, KnownNames};

/// Distinct known callees of one body, in first-occurrence order.
pub fn callees_in_block(block: &Block, known: &KnownNames) -> Vec<String> {
    let mut collector = CallCollector::new(known);
    collector.visit_block(block);
    collector.found
}

/// Lexical edges for every declaration in the index that has a body.
pub fn extract_lexical(index: &DeclarationIndex) -> CallMap {
    extract_lexical_for(index.functions().iter(), index.names())
}

/// Lexical edges for a subset of declarations.
///
/// Declarations sharing a name merge into one caller entry.
pub fn extract_lexical_for<'a, I>(functions: I, known: &KnownNames) -> CallMap
where
    I: IntoIterator<Item = &'a DeclaredFunction>,
{
    let mut calls = CallMap::new();
    for function in functions {
        let Some(body) = &function.body else { continue };
        let callees = callees_in_block(body, known);
        let entry = calls.entry(function.name.clone()).or_default();
        for callee in callees {
            if !entry.contains(&callee) {
                entry.push(callee);
            }
        }
    }
    calls
}

struct CallCollector<'a> {
    known: &'a KnownNames,
    seen: HashSet<String>,
    found: Vec<String>,
}

impl<'a> CallCollector<'a> {
    fn new(known: &'a KnownNames) -> Self {
        Self { known, seen: HashSet::new(), found: Vec::new() }
    }

    fn record(&mut self, ident: &Ident) {
        let name = ident.unraw().to_string();
        if self.known.contains(&name) && self.seen.insert(name.clone()) {
            self.found.push(name);
        }
    }
}

/// Trailing name of a call target: `f`, `a::b::f`, `x.f`, `(f)`.
fn target_ident(func: &Expr) -> Option<&Ident> {
    match func {
        Expr::Path(path) => path.path.segments.last().map(|seg| &seg.ident),
        Expr::Field(field) => match &field.member {
            syn::Member::Named(ident) => Some(ident),
            syn::Member::Unnamed(_) => None,
        },
        Expr::Paren(paren) => target_ident(&paren.expr),
        _ => None,
    }
}

impl<'ast> Visit<'ast> for CallCollector<'_> {
    fn visit_expr_call(&mut self, call: &'ast ExprCall) {
        if let Some(ident) = target_ident(&call.func) {
            self.record(ident);
        }
        visit::visit_expr_call(self, call);
    }

    fn visit_expr_method_call(&mut self, call: &'ast ExprMethodCall) {
        self.record(&call.method);
        visit::visit_expr_method_call(self, call);
    }

    fn visit_macro(&mut self, mac: &'ast Macro) {
        // Only macros whose body reads as `expr, expr, ...` are searched.
        if let Ok(args) = mac.parse_body_with(Punctuated::<Expr, Token![,]>::parse_terminated) {
            for arg in &args {
                self.visit_expr(arg);
            }
        }
    }
}
