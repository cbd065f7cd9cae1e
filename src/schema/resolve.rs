//! Name resolution, constraint checking, and finalisation.

use super::{
    Config, DefIndex, Definition, Error, Schema, TypeDesc, TypeKind, put_annotation,
};
use log::debug;
use std::collections::HashSet;

pub(super) fn finalise(schema: &mut Schema, config: &Config) -> Result<(), Error> {
    resolve_names(schema)?;
    check_references(schema, config)?;
    check_super_groups(schema, config)?;
    check_shadowing(schema)?;
    apply_incremental(schema)?;
    schema.finalised = true;
    Ok(())
}

enum Fix {
    TypeDefTarget(usize, DefIndex),
    SuperTarget(usize, DefIndex),
    FieldTarget(usize, usize, DefIndex),
}

fn lookup(schema: &Schema, ns_at: usize, name: &str) -> Result<DefIndex, Error> {
    schema.resolve_name_in(ns_at, name).ok_or_else(|| {
        debug!("cannot resolve reference '{name}'");
        Error::Unresolved {
            name: name.to_owned(),
        }
    })
}

/// Write resolved arena indices into every symbolic reference.
fn resolve_names(schema: &mut Schema) -> Result<(), Error> {
    let mut fixes = Vec::new();

    for (ns_at, ns) in schema.namespaces.iter().enumerate() {
        for &idx in &ns.defs {
            let at = idx.0;
            match schema.def(idx) {
                Definition::TypeDef(t) => {
                    if t.ty.kind == TypeKind::Ref {
                        let name = t.ty.ref_name.as_deref().unwrap_or("");
                        fixes.push(Fix::TypeDefTarget(at, lookup(schema, ns_at, name)?));
                    }
                }
                Definition::Group(g) => {
                    if let Some(sup) = &g.super_name {
                        fixes.push(Fix::SuperTarget(at, lookup(schema, ns_at, sup)?));
                    }
                    for (field_at, field) in g.fields.iter().enumerate() {
                        if field.ty.kind == TypeKind::Ref {
                            let name = field.ty.ref_name.as_deref().unwrap_or("");
                            fixes.push(Fix::FieldTarget(
                                at,
                                field_at,
                                lookup(schema, ns_at, name)?,
                            ));
                        }
                    }
                }
                Definition::Enum(_) => {}
            }
        }
    }

    for fix in fixes {
        match fix {
            Fix::TypeDefTarget(at, target) => {
                if let Definition::TypeDef(t) = &mut schema.defs[at] {
                    t.ty.resolved = Some(target);
                }
            }
            Fix::SuperTarget(at, target) => {
                if let Definition::Group(g) = &mut schema.defs[at] {
                    g.super_def = Some(target);
                }
            }
            Fix::FieldTarget(at, field_at, target) => {
                if let Definition::Group(g) = &mut schema.defs[at] {
                    g.fields[field_at].ty.resolved = Some(target);
                }
            }
        }
    }
    Ok(())
}

/// Walk a reference chain: bounded depth, no cycles, at most one
/// dynamic and one sequence link, dynamic chains must land on a group.
fn check_chain(
    schema: &Schema,
    owner: &str,
    ty: &TypeDesc,
    config: &Config,
) -> Result<(), Error> {
    if ty.kind != TypeKind::Ref {
        return Ok(());
    }

    let err_name = || owner.to_owned();
    let mut dynamic = ty.dynamic;
    let mut sequence = ty.sequence;
    let mut visited: Vec<DefIndex> = Vec::new();
    let mut idx = match ty.resolved {
        Some(idx) => idx,
        None => return Err(Error::Unresolved { name: err_name() }),
    };

    loop {
        match schema.def(idx) {
            Definition::TypeDef(t) if t.ty.kind == TypeKind::Ref => {
                if visited.contains(&idx) {
                    debug!("reference cycle through '{owner}'");
                    return Err(Error::ReferenceCycle { name: err_name() });
                }
                visited.push(idx);
                if visited.len() >= config.ref_chain_depth {
                    return Err(Error::ReferenceDepth { name: err_name() });
                }
                if t.ty.dynamic {
                    if dynamic {
                        return Err(Error::DynamicChain { name: err_name() });
                    }
                    dynamic = true;
                }
                if t.ty.sequence {
                    if sequence {
                        return Err(Error::SequenceOfSequence { name: err_name() });
                    }
                    sequence = true;
                }
                match t.ty.resolved {
                    Some(next) => idx = next,
                    None => return Err(Error::Unresolved { name: err_name() }),
                }
            }
            Definition::TypeDef(t) => {
                if t.ty.sequence && sequence {
                    return Err(Error::SequenceOfSequence { name: err_name() });
                }
                if dynamic {
                    debug!("dynamic reference '{owner}' lands on a non-group");
                    return Err(Error::DynamicChain { name: err_name() });
                }
                return Ok(());
            }
            Definition::Enum(_) => {
                if dynamic {
                    return Err(Error::DynamicChain { name: err_name() });
                }
                return Ok(());
            }
            Definition::Group(_) => return Ok(()),
        }
    }
}

fn check_references(schema: &Schema, config: &Config) -> Result<(), Error> {
    for def in &schema.defs {
        match def {
            Definition::TypeDef(t) => check_chain(schema, &t.name, &t.ty, config)?,
            Definition::Group(g) => {
                for field in &g.fields {
                    let owner = format!("{}.{}", g.name, field.name);
                    check_chain(schema, &owner, &field.ty, config)?;
                }
            }
            Definition::Enum(_) => {}
        }
    }
    Ok(())
}

fn check_super_groups(schema: &Schema, config: &Config) -> Result<(), Error> {
    for (at, def) in schema.defs.iter().enumerate() {
        let Definition::Group(group) = def else {
            continue;
        };
        let Some(sup) = group.super_def else {
            continue;
        };
        let err_group = || group.name.clone();

        // the reference chain to the super group may pass through
        // typedefs but not dynamic or sequence links
        let mut visited: Vec<DefIndex> = Vec::new();
        let mut idx = sup;
        let terminal = loop {
            match schema.def(idx) {
                Definition::TypeDef(t) if t.ty.kind == TypeKind::Ref => {
                    if visited.contains(&idx) {
                        return Err(Error::ReferenceCycle { name: err_group() });
                    }
                    visited.push(idx);
                    if visited.len() >= config.ref_chain_depth {
                        return Err(Error::ReferenceDepth { name: err_group() });
                    }
                    if t.ty.sequence {
                        return Err(Error::SuperGroupSequence { group: err_group() });
                    }
                    if t.ty.dynamic {
                        return Err(Error::SuperGroupDynamic { group: err_group() });
                    }
                    match t.ty.resolved {
                        Some(next) => idx = next,
                        None => return Err(Error::Unresolved { name: err_group() }),
                    }
                }
                Definition::Group(_) => break idx,
                _ => {
                    debug!("super group of '{}' is not a group", group.name);
                    return Err(Error::SuperGroupKind { group: err_group() });
                }
            }
        };

        if terminal == DefIndex(at) {
            return Err(Error::SuperGroupCycle { group: err_group() });
        }

        // the inheritance chain itself: bounded and acyclic
        let mut seen = vec![DefIndex(at)];
        let mut cur = DefIndex(at);
        loop {
            let Definition::Group(g) = schema.def(cur) else {
                break;
            };
            let Some(next_sup) = g.super_def else {
                break;
            };
            let (term, _) = schema.terminal(next_sup);
            if !matches!(schema.def(term), Definition::Group(_)) {
                break;
            }
            if seen.contains(&term) {
                debug!("inheritance cycle through '{}'", group.name);
                return Err(Error::SuperGroupCycle { group: err_group() });
            }
            seen.push(term);
            if seen.len() > config.inheritance_depth {
                return Err(Error::InheritanceDepth { group: err_group() });
            }
            cur = term;
        }
    }
    Ok(())
}

/// No field name declared in a group may match a field name inherited
/// through its super-group chain.
fn check_shadowing(schema: &Schema) -> Result<(), Error> {
    for group in schema.groups() {
        if group.super_group().is_none() {
            continue;
        }
        let mut names = HashSet::new();
        for field in group.fields() {
            if !names.insert(field.name()) {
                debug!(
                    "field '{}' of '{}' shadows an inherited field",
                    field.name(),
                    group.name()
                );
                return Err(Error::ShadowedField {
                    group: group.name().to_owned(),
                    field: field.name().to_owned(),
                });
            }
        }
    }
    Ok(())
}

/// Apply the incremental annotation directives and drop them: an
/// applied directive is indistinguishable from an inline annotation.
fn apply_incremental(schema: &mut Schema) -> Result<(), Error> {
    let pending = std::mem::take(&mut schema.pending);
    for incr in pending {
        let Some(target) = incr.target else {
            if incr.id.is_some() {
                return Err(Error::AnnotationTarget {
                    name: "schema".to_owned(),
                });
            }
            for a in incr.annotes {
                put_annotation(&mut schema.annotes, a.key, a.value);
            }
            continue;
        };

        let idx = lookup(schema, incr.ns, &target)?;
        let bad_target = || Error::AnnotationTarget {
            name: target.clone(),
        };

        match &mut schema.defs[idx.0] {
            Definition::Group(g) => {
                if let Some(component) = &incr.component {
                    let Some(field) = g.fields.iter_mut().find(|f| &f.name == component) else {
                        return Err(Error::AnnotationTarget {
                            name: format!("{target}.{component}"),
                        });
                    };
                    let annotes = if incr.on_type {
                        &mut field.ty.annotes
                    } else {
                        &mut field.annotes
                    };
                    for a in incr.annotes {
                        put_annotation(annotes, a.key, a.value);
                    }
                    if let Some(id) = incr.id {
                        field.id = Some(id);
                    }
                } else if incr.on_type {
                    return Err(bad_target());
                } else {
                    for a in incr.annotes {
                        put_annotation(&mut g.annotes, a.key, a.value);
                    }
                    if let Some(id) = incr.id {
                        g.id = Some(id);
                    }
                }
            }
            Definition::Enum(e) => {
                if incr.on_type || incr.id.is_some() {
                    return Err(bad_target());
                }
                if let Some(component) = &incr.component {
                    let Some(sym) = e.symbols.iter_mut().find(|s| &s.name == component) else {
                        return Err(Error::AnnotationTarget {
                            name: format!("{target}.{component}"),
                        });
                    };
                    for a in incr.annotes {
                        put_annotation(&mut sym.annotes, a.key, a.value);
                    }
                } else {
                    for a in incr.annotes {
                        put_annotation(&mut e.annotes, a.key, a.value);
                    }
                }
            }
            Definition::TypeDef(t) => {
                if incr.component.is_some() || incr.id.is_some() {
                    return Err(bad_target());
                }
                let annotes = if incr.on_type {
                    &mut t.ty.annotes
                } else {
                    &mut t.annotes
                };
                for a in incr.annotes {
                    put_annotation(annotes, a.key, a.value);
                }
            }
        }
    }
    Ok(())
}
