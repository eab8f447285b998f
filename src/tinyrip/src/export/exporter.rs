//! Asset → document rendering and the reverse import
//!
//! Fields are emitted in layout order. Present fields come from the decoded
//! record, stripped ones from the reconstruction overlay. References become
//! `{fileID, fileIndex}` mappings: `fileIndex` 0 for targets in the unit
//! being written, n for the n-th external unit encountered, and
//! `{fileID: 0, fileIndex: 0}` for null, dangling or unexported targets.

use tracing::{debug, warn};

use crate::asset::{Asset, AssetKey, Fields, Reference, Value};
use crate::document::{self, Document, Mapping, Node, Scalar};
use crate::export::unit::ExportableUnit;
use crate::export::{reconstruct, ExportContext};
use crate::policy::{self, LayoutChoice};
use crate::schema::{ClassId, FieldKind, FieldSpec};
use crate::version::{BuildFlags, Version};
use crate::{Error, Result};

/// Render `keys` in order, skipping assets whose siblings disagree unless
/// the project is strict
pub fn export_documents(keys: &[AssetKey], ctx: &mut ExportContext<'_>) -> Result<Vec<Document>> {
    let collection = ctx.collection();
    let mut documents = Vec::with_capacity(keys.len());

    for &key in keys {
        let asset = collection
            .asset(key)
            .ok_or_else(|| Error::AssetNotFound(key.to_string()))?;
        let file_id = ctx
            .unit()
            .and_then(|u| u.export_id_of(key))
            .ok_or_else(|| Error::AssetNotFound(key.to_string()))?;

        match export_asset(asset, ctx) {
            Ok(body) => {
                documents.push(Document {
                    class_id: asset.class.0,
                    file_id,
                    class_name: asset.class.name().to_string(),
                    body,
                });
                ctx.report.exported += 1;
            }
            Err(e) if e.is_asset_local() && !ctx.project().options().strict => {
                warn!("Skipping {} {}: {}", asset.class, key, e);
                ctx.report.add_skipped(key, asset.class, &e);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(documents)
}

/// Render a whole unit as a YAML stream
pub fn write_unit(unit: &dyn ExportableUnit, ctx: &mut ExportContext<'_>) -> Result<String> {
    let documents = unit.export(ctx)?;
    document::write_stream(&documents)
}

/// Render one asset as a document body
pub fn export_asset(asset: &Asset, ctx: &mut ExportContext<'_>) -> Result<Node> {
    if let Some(effective) = asset.layout_fallback {
        ctx.report
            .add_fallback(asset.key, asset.class, asset.version, effective);
    }

    let backfill = reconstruct::backfill(asset, ctx)?;
    let choice = asset.layout();
    let mut mapping = Mapping::new();

    for spec in choice.layout.fields {
        let value = if choice.holds(spec, asset.flags) {
            match asset.fields.get(spec.name) {
                Some(value) => value,
                None => {
                    debug!("{} {} has no {}", asset.class, asset.key, spec.name);
                    continue;
                }
            }
        } else if spec.derived && spec.presence.holds_for_version(choice.effective) {
            backfill.get(spec.name).ok_or(Error::MissingDerivedField {
                class: asset.class,
                field: spec.name,
            })?
        } else {
            continue;
        };
        mapping.insert(spec.name, encode(value, Some(&spec.kind), asset, ctx));
    }

    Ok(Node::Mapping(mapping))
}

fn encode(
    value: &Value,
    kind: Option<&FieldKind>,
    asset: &Asset,
    ctx: &mut ExportContext<'_>,
) -> Node {
    match value {
        Value::Bool(b) => Node::from(*b as i64),
        Value::Int(i) => Node::from(*i),
        Value::UInt(u) => Scalar::UInt(*u).into(),
        // Through the shortest decimal form so 0.1f32 stays 0.1
        Value::Float(f) => Scalar::Float(f.to_string().parse().unwrap_or(*f as f64)).into(),
        Value::String(s) => Node::from(s.as_str()),
        Value::Bytes(bytes) => Node::from(hex::encode(bytes)),
        Value::Guid(guid) => Node::from(hex::encode(guid)),
        Value::Reference(reference) => {
            let script = matches!(kind, Some(FieldKind::ScriptPointer));
            encode_reference(*reference, script, asset, ctx)
        }
        Value::Record(fields) => {
            let specs: &[FieldSpec] = match kind {
                Some(FieldKind::Struct(specs)) => *specs,
                _ => &[],
            };
            let mut mapping = Mapping::new();
            for (name, child) in fields.iter() {
                let child_kind = specs.iter().find(|s| s.name == name).map(|s| &s.kind);
                mapping.insert(name, encode(child, child_kind, asset, ctx));
            }
            Node::Mapping(mapping)
        }
        Value::Sequence(items) => {
            let element = match kind {
                Some(FieldKind::Array(element)) => Some(*element),
                _ => None,
            };
            Node::Sequence(
                items
                    .iter()
                    .map(|item| encode(item, element, asset, ctx))
                    .collect(),
            )
        }
    }
}

fn encode_reference(
    reference: Reference,
    script: bool,
    asset: &Asset,
    ctx: &mut ExportContext<'_>,
) -> Node {
    let pointer = ctx.encode_reference(reference, asset.key.file, asset.key);
    let mut mapping = Mapping::new()
        .with("fileID", pointer.file_id)
        .with("fileIndex", pointer.file_index as i64);

    if script && !reference.is_null() {
        let project = ctx.project();
        if let Some(script) = project
            .resolver()
            .describe(reference, asset.key.file, project.collection())
        {
            mapping.insert("script", script.full_name());
        }
    }
    Node::Mapping(mapping)
}

/// Parse an exported document body back into the fields present for
/// `(class, version, flags)`
///
/// References come back as `(fileIndex, fileID)` pairs of the exported
/// form.
pub fn import_fields(
    node: &Node,
    class: ClassId,
    version: Version,
    flags: BuildFlags,
) -> Result<Fields> {
    let choice = policy::variant_for(class, version);
    let mapping = node
        .as_mapping()
        .ok_or_else(|| Error::Import(format!("{class}: expected a mapping")))?;

    let mut fields = Fields::new();
    for spec in choice.present(flags) {
        let child = mapping
            .get(spec.name)
            .ok_or_else(|| Error::Import(format!("{class}: missing field {}", spec.name)))?;
        fields.insert(spec.name, import_value(child, &spec.kind, spec.name, &choice, flags)?);
    }
    Ok(fields)
}

fn import_value(
    node: &Node,
    kind: &FieldKind,
    name: &str,
    choice: &LayoutChoice,
    flags: BuildFlags,
) -> Result<Value> {
    let bad = |expected: &str| Error::Import(format!("{name}: expected {expected}, got {node:?}"));

    Ok(match kind {
        FieldKind::Bool => Value::Bool(node.as_i64().ok_or_else(|| bad("0 or 1"))? != 0),
        FieldKind::U8 | FieldKind::U16 | FieldKind::U32 => {
            Value::UInt(node.as_u64().ok_or_else(|| bad("unsigned integer"))?)
        }
        FieldKind::I32 | FieldKind::I64 => Value::Int(node.as_i64().ok_or_else(|| bad("integer"))?),
        FieldKind::F32 => Value::Float(node.as_f64().ok_or_else(|| bad("number"))? as f32),
        FieldKind::String => Value::String(node.as_str().ok_or_else(|| bad("string"))?.to_string()),
        FieldKind::Bytes | FieldKind::Remainder => Value::Bytes(decode_hex(node, name)?),
        FieldKind::Guid => {
            let bytes = decode_hex(node, name)?;
            let guid: [u8; 16] = bytes.try_into().map_err(|_| bad("32 hex digits"))?;
            Value::Guid(guid)
        }
        FieldKind::Pointer | FieldKind::ScriptPointer => {
            let file_id = node.get("fileID").and_then(Node::as_i64);
            let file_index = node.get("fileIndex").and_then(Node::as_i64);
            match (file_id, file_index) {
                (Some(path_id), Some(file_index)) => {
                    Value::Reference(Reference::new(file_index as i32, path_id))
                }
                _ => return Err(bad("{fileID, fileIndex}")),
            }
        }
        FieldKind::Struct(specs) => {
            let mut fields = Fields::new();
            for spec in specs.iter().filter(|s| choice.holds(s, flags)) {
                fields.insert(spec.name, import_struct_field(node, spec, choice, flags)?);
            }
            Value::Record(fields)
        }
        FieldKind::Array(element) => {
            let items = node.as_sequence().ok_or_else(|| bad("sequence"))?;
            Value::Sequence(
                items
                    .iter()
                    .map(|item| import_value(item, element, name, choice, flags))
                    .collect::<Result<_>>()?,
            )
        }
    })
}

fn import_struct_field(
    node: &Node,
    spec: &FieldSpec,
    choice: &LayoutChoice,
    flags: BuildFlags,
) -> Result<Value> {
    let child = node
        .get(spec.name)
        .ok_or_else(|| Error::Import(format!("missing struct field {}", spec.name)))?;
    import_value(child, &spec.kind, spec.name, choice, flags)
}

fn decode_hex(node: &Node, name: &str) -> Result<Vec<u8>> {
    let text = node
        .as_str()
        .ok_or_else(|| Error::Import(format!("{name}: expected hex string")))?;
    hex::decode(text).map_err(|e| Error::Import(format!("{name}: {e}")))
}
