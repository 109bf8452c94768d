/*
 * merge.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Two-way merge of template documents, keeping comments.
 */

//! Comment-preserving document merge.
//!
//! [`merge_documents`] combines a template (`current`) with the document it is
//! based on (`incoming`). The policy for each field comes from a static table
//! keyed by the field's path:
//!
//! | Path | Policy |
//! |---|---|
//! | `minimumLimaVersion`, `vmOpts.qemu.minimumVersion` | higher version wins |
//! | `dns` | `current` list if non-empty, else `incoming` |
//! | `mountTypesUnsupported` | union, `current` first |
//! | `provision`, `probes` | `incoming` entries run first |
//! | `additionalDisks`, `mounts`, `networks` | keyed merge |
//! | any other list | `current` then `incoming` |
//! | anything else | `current` unless null |
//!
//! Mappings merge key by key, keeping `current`'s order and appending keys only
//! `incoming` has. A combined collection, or a value that replaces a null or
//! loses a version comparison, keeps its own comments and fills empty comment
//! slots from the other side. A scalar that simply wins keeps only its own.

use lima_config::Version;
use lima_yaml::{Comments, Document, Mapping, MappingEntry, Node, NodeKind, Sequence};

/// Identity of the entry applied to every other entry of a keyed list.
pub const WILDCARD: &str = "*";

/// How two values at the same path combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Policy {
    Generic,
    VersionMax,
    WinnerTakeAll,
    ConcatUnique,
    Prepend,
    /// Entries are identified by the first of these fields that is set.
    Keyed(&'static [&'static str]),
}

fn policy(path: &str) -> Policy {
    match path {
        "minimumLimaVersion" | "vmOpts.qemu.minimumVersion" => Policy::VersionMax,
        "dns" => Policy::WinnerTakeAll,
        "mountTypesUnsupported" => Policy::ConcatUnique,
        "provision" | "probes" => Policy::Prepend,
        "additionalDisks" => Policy::Keyed(&["name"]),
        "mounts" => Policy::Keyed(&["mountPoint", "location"]),
        "networks" => Policy::Keyed(&["interface"]),
        _ => Policy::Generic,
    }
}

/// Merge `incoming` underneath `current`.
///
/// Document comments follow the same rule as node comments: `current`'s head
/// and foot survive, and `incoming` fills whichever is missing.
pub fn merge_documents(current: Document, incoming: Document) -> Document {
    Document {
        head_comment: current.head_comment.or(incoming.head_comment),
        root: merge(current.root, incoming.root),
        foot_comment: current.foot_comment.or(incoming.foot_comment),
    }
}

/// Merge two root nodes.
pub fn merge(current: Node, incoming: Node) -> Node {
    merge_at(&mut Vec::new(), current, incoming)
}

fn merge_at(path: &mut Vec<String>, current: Node, incoming: Node) -> Node {
    if current.is_null() {
        return survive(incoming, current.comments);
    }
    if incoming.is_null() {
        return survive(current, incoming.comments);
    }

    let policy = policy(&path.join("."));
    match policy {
        Policy::VersionMax => return higher_version(current, incoming),
        Policy::WinnerTakeAll => {
            let empty = current.as_sequence().is_some_and(Sequence::is_empty);
            return if empty {
                survive(incoming, current.comments)
            } else {
                survive(current, incoming.comments)
            };
        }
        _ => {}
    }

    let Node { kind, comments } = current;
    match (kind, incoming.kind) {
        (NodeKind::Mapping(ours), NodeKind::Mapping(theirs)) => Node {
            kind: NodeKind::Mapping(merge_mappings(path, ours, theirs)),
            comments: comments.or(incoming.comments),
        },
        (NodeKind::Sequence(ours), NodeKind::Sequence(theirs)) => Node {
            kind: NodeKind::Sequence(merge_sequences(policy, ours, theirs)),
            comments: comments.or(incoming.comments),
        },
        // Scalars, and values whose types disagree, stay as written.
        (kind, _) => Node { kind, comments },
    }
}

/// `winner` with its empty comment slots filled from the losing side.
fn survive(winner: Node, loser: Comments) -> Node {
    Node {
        comments: winner.comments.or(loser),
        kind: winner.kind,
    }
}

fn higher_version(current: Node, incoming: Node) -> Node {
    let version = |node: &Node| node.as_str().and_then(|text| text.parse::<Version>().ok());
    match (version(&current), version(&incoming)) {
        (Some(ours), Some(theirs)) if theirs > ours => survive(incoming, current.comments),
        // An unparsable `current` is kept so validation reports it.
        _ => survive(current, incoming.comments),
    }
}

fn merge_mappings(path: &mut Vec<String>, current: Mapping, mut incoming: Mapping) -> Mapping {
    let mut merged = Mapping::new(current.style);
    for MappingEntry { key, value } in current.entries {
        let value = match incoming.remove(&key) {
            Some(other) => {
                path.push(key.clone());
                let value = merge_at(path, value, other);
                path.pop();
                value
            }
            None => value,
        };
        merged.entries.push(MappingEntry { key, value });
    }
    merged.entries.extend(incoming.entries);
    merged
}

fn merge_sequences(policy: Policy, current: Sequence, incoming: Sequence) -> Sequence {
    let style = current.style;
    let items = match policy {
        Policy::Prepend => incoming.items.into_iter().chain(current.items).collect(),
        Policy::ConcatUnique => {
            let mut items: Vec<Node> = Vec::new();
            for item in current.items.into_iter().chain(incoming.items) {
                if !items.iter().any(|seen| seen.value_eq(&item)) {
                    items.push(item);
                }
            }
            items
        }
        Policy::Keyed(key_fields) => {
            combine_keyed(key_fields, current.items.into_iter().chain(incoming.items))
        }
        _ => current.items.into_iter().chain(incoming.items).collect(),
    };
    Sequence::new(items, style)
}

/// Fold a keyed list so that each identity appears once.
///
/// A later entry with an identity already present only fills the fields the
/// earlier one left unset. A wildcard entry fills every entry before it and
/// is dropped. Entries without an identity are kept as they are.
fn combine_keyed(key_fields: &[&str], items: impl Iterator<Item = Node>) -> Vec<Node> {
    let mut combined: Vec<Node> = Vec::new();
    for item in items {
        match entry_key(&item, key_fields) {
            Some(key) if key == WILDCARD => {
                for target in &mut combined {
                    fill_fields(target, &item, key_fields);
                }
            }
            Some(key) => {
                let existing = combined
                    .iter()
                    .position(|other| entry_key(other, key_fields).as_deref() == Some(key.as_str()));
                match existing {
                    Some(index) => {
                        let target = &mut combined[index];
                        fill_fields(target, &item, key_fields);
                        target.comments = std::mem::take(&mut target.comments).or(item.comments);
                    }
                    None => combined.push(item),
                }
            }
            None => combined.push(item),
        }
    }
    combined
}

/// The identity of a keyed list entry. A bare string is its own identity.
fn entry_key(item: &Node, key_fields: &[&str]) -> Option<String> {
    match &item.kind {
        NodeKind::Scalar(_) => item.as_str().map(str::to_string),
        NodeKind::Mapping(mapping) => key_fields
            .iter()
            .find_map(|field| mapping.get(field).and_then(Node::as_str))
            .map(str::to_string),
        NodeKind::Sequence(_) => None,
    }
}

/// Copy into `target` every field of `source` that `target` leaves unset.
///
/// Fields named in `skip` are never copied. A bare-string `target` becomes a
/// mapping holding its identity in `skip[0]` before it is filled.
fn fill_fields(target: &mut Node, source: &Node, skip: &[&str]) {
    let Some(fields) = source.as_mapping() else {
        return;
    };
    if !fields.keys().any(|key| !skip.contains(&key)) {
        return;
    }
    if let (Some(name), Some(key_field)) = (target.as_str().map(str::to_string), skip.first()) {
        let mut mapping = Mapping::new(fields.style);
        mapping.insert(*key_field, Node::string(name));
        target.kind = NodeKind::Mapping(mapping);
    }
    if let Some(mapping) = target.as_mapping_mut() {
        fill_mapping(mapping, fields, skip);
    }
}

fn fill_mapping(target: &mut Mapping, source: &Mapping, skip: &[&str]) {
    for (key, value) in source.iter() {
        if skip.contains(&key) {
            continue;
        }
        match target.get_mut(key) {
            None => {
                target.insert(key, value.clone());
            }
            Some(existing) if existing.is_null() => {
                let comments = std::mem::take(&mut existing.comments);
                *existing = survive(value.clone(), comments);
            }
            Some(existing) => {
                if let (Some(nested), Some(other)) = (existing.as_mapping_mut(), value.as_mapping())
                {
                    fill_mapping(nested, other, &[]);
                }
            }
        }
    }
}
