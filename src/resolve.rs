//! `$ref` resolution.
//!
//! Every reference ends up pointing into the root's definitions pool (or at
//! the root itself). Targets that are not already definitions are copied in
//! under a derived name: local JSON pointers, `$anchor`s and schemas supplied
//! by a [`SchemaSource`]. A name is reserved with a placeholder before its
//! body is walked, so self-referential structures terminate.
//!
//! A derived name already taken by a different target gets an `@2`, `@3`...
//! suffix, so an external `foo.json` never binds to a local `$defs/foo.json`.
//! Reference loops that never move to a child instance (only `$ref`,
//! combinators, conditionals and `dependentSchemas` on the way) are rejected
//! as [`ReferenceError::Circular`].
//!
//! After [`resolve_refs`] returns, `resolved_ref` is either `#`, a canonical
//! `#/$defs/<name>` that exists in the pool, or (when nothing could supply the
//! target) the reference verbatim; validation reports the latter.
use std::collections::{HashMap, HashSet};
use std::hash::BuildHasher;
use std::path::Path;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::draft::Draft;
use crate::error::{Error, ReferenceError, Result, escape_token, unescape_token};
use crate::ir::{Definition, Items, SchemaNode};
use crate::{lower, structural};

// ————————————————————————————————————————————————————————————————————————————
// SOURCES
// ————————————————————————————————————————————————————————————————————————————

/// Supplies schemas for reference targets the document does not define.
pub trait SchemaSource {
    fn lookup(&self, name: &str) -> Option<SchemaNode>;
}

impl<F> SchemaSource for F
where
    F: Fn(&str) -> Option<SchemaNode>,
{
    fn lookup(&self, name: &str) -> Option<SchemaNode> { self(name) }
}

impl SchemaSource for IndexMap<String, SchemaNode> {
    fn lookup(&self, name: &str) -> Option<SchemaNode> { self.get(name).cloned() }
}

impl<S: BuildHasher> SchemaSource for HashMap<String, SchemaNode, S> {
    fn lookup(&self, name: &str) -> Option<SchemaNode> { self.get(name).cloned() }
}

/// Resolves nothing; every foreign reference stays verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSource;

impl SchemaSource for NoSource {
    fn lookup(&self, _: &str) -> Option<SchemaNode> { None }
}

/// Raw schema documents addressed by name (file name, path or `$id`), with
/// an optional `#/json/pointer` fragment selecting a subschema.
#[derive(Debug, Clone, Default)]
pub struct DocumentSource {
    docs: IndexMap<String, Value>,
    draft: Draft,
}

impl DocumentSource {
    pub fn new(draft: Draft) -> Self {
        Self { docs: IndexMap::new(), draft }
    }

    pub fn insert(&mut self, name: impl Into<String>, doc: Value) {
        if let Some(id) = doc.get("$id").or_else(|| doc.get("id")).and_then(Value::as_str) {
            let id = id.trim_end_matches('#');
            if !id.is_empty() {
                self.docs.insert(id.to_string(), doc.clone());
            }
        }
        self.docs.insert(name.into(), doc);
    }

    /// Register a file under its full path and its bare file name.
    pub fn insert_file(&mut self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path).map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
        let doc: Value = serde_json::from_slice(&bytes)?;
        if let Some(file_name) = path.file_name().and_then(|s| s.to_str()) {
            self.docs.insert(file_name.to_string(), doc.clone());
        }
        self.insert(path.to_string_lossy(), doc);
        Ok(())
    }

    pub fn len(&self) -> usize { self.docs.len() }

    pub fn is_empty(&self) -> bool { self.docs.is_empty() }
}

impl SchemaSource for DocumentSource {
    fn lookup(&self, name: &str) -> Option<SchemaNode> {
        let (doc_name, fragment) = name.split_once('#').unwrap_or((name, ""));
        let doc = self.docs.get(doc_name)?;
        let draft = match structural::check_document(doc, self.draft, false) {
            Ok(d) => d,
            Err(err) => {
                warn!(%name, %err, "referenced document is not a valid schema");
                return None;
            }
        };
        let target = if fragment.is_empty() { Some(doc) } else { doc.pointer(fragment) };
        let target = target?;
        debug!(%name, %draft, "loaded referenced document");
        lower::lower_checked(target, draft)
            .inspect_err(|err| warn!(%name, %err, "referenced subschema could not be lowered"))
            .ok()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// RESOLUTION
// ————————————————————————————————————————————————————————————————————————————

/// Resolve every `$ref` under `root` (definitions included). Idempotent:
/// nodes whose `resolved_ref` is already set are left alone.
pub fn resolve_refs(root: &mut SchemaNode, source: &dyn SchemaSource) -> Result<(), ReferenceError> {
    let pristine = root.clone();
    let pool = std::mem::take(&mut root.defs);
    let bound = pool.keys().map(|name| (Target::Definition(name.clone()), name.clone())).collect();
    let mut resolver = Resolver {
        pristine: &pristine,
        root_id: root.id.clone(),
        source,
        pool,
        bound,
    };

    let names: Vec<String> = resolver.pool.keys().cloned().collect();
    let walked = names
        .iter()
        .try_for_each(|name| resolver.definition(name))
        .and_then(|()| resolver.walk(root));
    root.defs = resolver.pool;
    walked?;

    if let Some((name, _)) = root.defs.iter().find(|(_, d)| matches!(d, Definition::Placeholder)) {
        return Err(ReferenceError::Circular(name.clone()));
    }
    match in_place_cycle(root) {
        Some(reference) => Err(ReferenceError::Circular(reference)),
        None => Ok(()),
    }
}

/// Pool key a reference target is stored under.
pub fn canonical(name: &str) -> String {
    format!("#/$defs/{}", escape_token(name))
}

/// Inverse of [`canonical`]: the pool name, if `reference` has that shape.
pub fn pool_name(reference: &str) -> Option<String> {
    let rest = reference.strip_prefix("#/$defs/")?;
    (!rest.contains('/')).then(|| unescape_token(rest))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Target {
    Root,
    Definition(String),
    Pointer(Vec<String>),
    Anchor(String),
    External(String),
}

impl Target {
    fn parse(reference: &str, root_id: Option<&str>) -> Target {
        let mut local = reference;
        if let Some(id) = root_id.map(|id| id.trim_end_matches('#')).filter(|id| !id.is_empty()) {
            if let Some(rest) = reference.strip_prefix(id) {
                if rest.is_empty() || rest.starts_with('#') {
                    local = rest;
                }
            }
        }
        let Some(fragment) = local.strip_prefix('#').or_else(|| local.is_empty().then_some("")) else {
            return Target::External(reference.to_string());
        };
        if fragment.is_empty() {
            return Target::Root;
        }
        let Some(pointer) = fragment.strip_prefix('/') else {
            return Target::Anchor(fragment.to_string());
        };
        let tokens: Vec<String> = pointer.split('/').map(unescape_token).collect();
        match tokens.as_slice() {
            [defs, name] if defs == "$defs" || defs == "definitions" => Target::Definition(name.clone()),
            _ => Target::Pointer(tokens),
        }
    }

    /// Preferred pool name. Pointers and anchors keep their fragment form.
    fn pool_name(&self) -> String {
        match self {
            Target::Root => String::new(),
            Target::Definition(name) | Target::External(name) => name.clone(),
            Target::Pointer(tokens) => format!("#/{}", tokens.iter().map(|t| escape_token(t)).collect::<Vec<_>>().join("/")),
            Target::Anchor(name) => format!("#{name}"),
        }
    }
}

struct Resolver<'a> {
    pristine: &'a SchemaNode,
    root_id: Option<String>,
    source: &'a dyn SchemaSource,
    pool: IndexMap<String, Definition>,
    /// Which target each pool name was taken for.
    bound: HashMap<Target, String>,
}

impl Resolver<'_> {
    /// Walk one pool entry with its name reserved.
    fn definition(&mut self, name: &str) -> Result<(), ReferenceError> {
        let Some(slot) = self.pool.get_mut(name) else { return Ok(()) };
        let Definition::Schema(mut body) = std::mem::replace(slot, Definition::Placeholder) else {
            return Ok(());
        };
        let walked = self.walk(&mut body);
        self.pool.insert(name.to_string(), Definition::Schema(body));
        walked
    }

    fn walk(&mut self, node: &mut SchemaNode) -> Result<(), ReferenceError> {
        if node.resolved_ref.is_none() {
            if let Some(reference) = node.reference.clone() {
                node.resolved_ref = Some(self.resolve(&reference)?);
            }
        }
        for def in node.defs.values_mut() {
            if let Definition::Schema(body) = def {
                self.walk(body)?;
            }
        }
        for child in node.children_mut() {
            self.walk(child)?;
        }
        Ok(())
    }

    /// The preferred name, suffixed when another target already holds it.
    fn fresh_name(&self, target: &Target) -> String {
        let base = target.pool_name();
        let mut name = base.clone();
        let mut n = 2;
        while self.pool.contains_key(&name) {
            name = format!("{base}@{n}");
            n += 1;
        }
        name
    }

    fn resolve(&mut self, reference: &str) -> Result<String, ReferenceError> {
        let target = Target::parse(reference, self.root_id.as_deref());
        if target == Target::Root {
            return Ok("#".to_string());
        }
        if let Some(name) = self.bound.get(&target) {
            return Ok(canonical(name));
        }
        let name = self.fresh_name(&target);
        self.bound.insert(target.clone(), name.clone());

        self.pool.insert(name.clone(), Definition::Placeholder);
        let (found, foreign) = match &target {
            Target::Pointer(tokens) => (locate(self.pristine, tokens).cloned(), false),
            Target::Anchor(anchor) => (find_anchor(self.pristine, anchor).cloned(), false),
            _ => {
                debug!(%reference, %name, "looking up reference in schema source");
                (self.source.lookup(&target.pool_name()), true)
            }
        };
        let Some(mut node) = found else {
            self.pool.shift_remove(&name);
            self.bound.remove(&target);
            debug!(%reference, "reference left unresolved");
            return Ok(reference.to_string());
        };

        node.is_root = false;
        if foreign {
            // a supplied document brings its own definitions along
            for (def_name, def) in std::mem::take(&mut node.defs) {
                if self.pool.contains_key(&def_name) {
                    debug!(%def_name, "definition already pooled; keeping the existing one");
                    continue;
                }
                self.pool.insert(def_name.clone(), def);
                self.bound.insert(Target::Definition(def_name.clone()), def_name.clone());
                self.definition(&def_name)?;
            }
        }
        self.walk(&mut node)?;
        self.pool.insert(name.clone(), Definition::Schema(node));
        debug!(%reference, %name, "reference resolved");
        Ok(canonical(&name))
    }
}

// ---- in-place cycles ---- //

/// A resolved reference that can reach itself while staying on the same
/// instance value (through `$ref`, combinators, conditionals or
/// `dependentSchemas`) would recurse forever during validation.
fn in_place_cycle(root: &SchemaNode) -> Option<String> {
    let mut edges: HashMap<String, Vec<String>> = HashMap::new();
    edges.insert("#".to_string(), in_place_refs(root));
    for (name, def) in &root.defs {
        if let Definition::Schema(body) = def {
            edges.insert(canonical(name), in_place_refs(body));
        }
    }

    let mut done: HashSet<&str> = HashSet::new();
    let mut keys: Vec<&String> = edges.keys().collect();
    keys.sort();
    for start in keys {
        let mut on_path = Vec::new();
        if let Some(hit) = reaches_back(start, &edges, &mut on_path, &mut done) {
            return Some(hit.to_string());
        }
    }
    None
}

fn reaches_back<'a>(
    at: &'a str,
    edges: &'a HashMap<String, Vec<String>>,
    on_path: &mut Vec<&'a str>,
    done: &mut HashSet<&'a str>,
) -> Option<&'a str> {
    if on_path.contains(&at) {
        return Some(at);
    }
    if done.contains(at) {
        return None;
    }
    on_path.push(at);
    // unresolved references have no outgoing edges
    for next in edges.get(at).into_iter().flatten() {
        if let Some(hit) = reaches_back(next, edges, on_path, done) {
            return Some(hit);
        }
    }
    on_path.pop();
    done.insert(at);
    None
}

/// Resolved references evaluated against the same instance as `node`.
fn in_place_refs(node: &SchemaNode) -> Vec<String> {
    let mut out = Vec::new();
    collect_in_place(node, &mut out);
    out
}

fn collect_in_place(node: &SchemaNode, out: &mut Vec<String>) {
    if let Some(target) = &node.resolved_ref {
        out.push(target.clone());
    }
    for list in [&node.all_of, &node.one_of, &node.any_of].into_iter().flatten() {
        for branch in list {
            collect_in_place(branch, out);
        }
    }
    for single in [&node.not, &node.if_schema, &node.then_schema, &node.else_schema].into_iter().flatten() {
        collect_in_place(single, out);
    }
    if let Some(object) = &node.object {
        for dependent in object.dependent_schemas.values() {
            collect_in_place(dependent, out);
        }
    }
}

/// Follow JSON-pointer tokens through a lowered tree.
fn locate<'a>(node: &'a SchemaNode, tokens: &[String]) -> Option<&'a SchemaNode> {
    let Some((head, rest)) = tokens.split_first() else { return Some(node) };
    let index = |rest: &[String]| rest.first().and_then(|t| t.parse::<usize>().ok());
    let (next, rest): (&SchemaNode, &[String]) = match head.as_str() {
        "$defs" | "definitions" => (node.definition(rest.first()?)?, &rest[1..]),
        "allOf" => (node.all_of.as_ref()?.get(index(rest)?)?, &rest[1..]),
        "oneOf" => (node.one_of.as_ref()?.get(index(rest)?)?, &rest[1..]),
        "anyOf" => (node.any_of.as_ref()?.get(index(rest)?)?, &rest[1..]),
        "not" => (node.not.as_deref()?, rest),
        "if" => (node.if_schema.as_deref()?, rest),
        "then" => (node.then_schema.as_deref()?, rest),
        "else" => (node.else_schema.as_deref()?, rest),
        "items" => match node.array.as_ref()?.items.as_ref()? {
            Items::List(s) => (&**s, rest),
            Items::Tuple(xs) => (xs.get(index(rest)?)?, &rest[1..]),
        },
        "prefixItems" => (node.array.as_ref()?.prefix_items.as_ref()?.get(index(rest)?)?, &rest[1..]),
        "additionalItems" => (node.array.as_ref()?.additional_items.as_deref()?, rest),
        "contains" => (node.array.as_ref()?.contains.as_deref()?, rest),
        "unevaluatedItems" => (node.array.as_ref()?.unevaluated_items.as_deref()?, rest),
        "properties" => (node.object.as_ref()?.properties.get(rest.first()?)?, &rest[1..]),
        "dependentSchemas" | "dependencies" => {
            (node.object.as_ref()?.dependent_schemas.get(rest.first()?)?, &rest[1..])
        }
        "patternProperties" => {
            let key = rest.first()?;
            let (_, s) = node.object.as_ref()?.pattern_properties.iter().find(|(p, _)| p.as_str() == key.as_str())?;
            (s, &rest[1..])
        }
        "additionalProperties" => (node.object.as_ref()?.additional_properties.as_deref()?, rest),
        "unevaluatedProperties" => (node.object.as_ref()?.unevaluated_properties.as_deref()?, rest),
        "propertyNames" => (node.object.as_ref()?.property_names.as_deref()?, rest),
        _ => return None,
    };
    locate(next, rest)
}

fn find_anchor<'a>(node: &'a SchemaNode, anchor: &str) -> Option<&'a SchemaNode> {
    if node.anchor.as_deref() == Some(anchor) {
        return Some(node);
    }
    let defs = node.defs.values().filter_map(|d| match d {
        Definition::Schema(s) => Some(s),
        Definition::Placeholder => None,
    });
    defs.chain(node.children()).find_map(|child| find_anchor(child, anchor))
}
