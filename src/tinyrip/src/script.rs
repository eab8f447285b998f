//! Script type descriptors for behaviour references

use std::fmt;

use crate::asset::{FileId, Reference, Value};
use crate::collection::FileCollection;
use crate::schema::ClassId;

/// Compiled script class a behaviour points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptType {
    pub name: String,
    pub namespace: String,
    /// Assembly name without its extension
    pub module: String,
}

impl ScriptType {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, module: &str) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            module: strip_assembly_extension(module).to_string(),
        }
    }

    /// `[Module]Namespace.Name`, or `[Module]Name` without a namespace
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            format!("[{}]{}", self.module, self.name)
        } else {
            format!("[{}]{}.{}", self.module, self.namespace, self.name)
        }
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

fn strip_assembly_extension(module: &str) -> &str {
    module
        .strip_suffix(".dll")
        .or_else(|| module.strip_suffix(".DLL"))
        .unwrap_or(module)
}

/// Describes the script a reference points at
pub trait ScriptTypeResolver: Send + Sync {
    fn describe(
        &self,
        reference: Reference,
        from: FileId,
        collection: &FileCollection,
    ) -> Option<ScriptType>;
}

/// Reads the class, namespace and assembly of a `MonoScript` target
#[derive(Debug, Default, Clone, Copy)]
pub struct MonoScriptResolver;

impl ScriptTypeResolver for MonoScriptResolver {
    fn describe(
        &self,
        reference: Reference,
        from: FileId,
        collection: &FileCollection,
    ) -> Option<ScriptType> {
        let script = collection.resolve(reference, from).found()?;
        if script.class != ClassId::MONO_SCRIPT {
            return None;
        }
        let name = script.get("m_ClassName").and_then(Value::as_str)?;
        if name.is_empty() {
            return None;
        }
        let namespace = script
            .get("m_Namespace")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let module = script
            .get("m_AssemblyName")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Some(ScriptType::new(name, namespace, module))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{mono_script_fields, v, FileBuilder, RELEASE};

    #[test]
    fn test_full_name() {
        let t = ScriptType::new("Door", "Game.World", "Assembly-CSharp.dll");
        assert_eq!(t.full_name(), "[Assembly-CSharp]Game.World.Door");

        let t = ScriptType::new("Door", "", "Assembly-CSharp");
        assert_eq!(t.to_string(), "[Assembly-CSharp]Door");
    }

    #[test]
    fn test_mono_script_resolver() {
        let mut c = FileCollection::new();
        let id = c
            .add(
                FileBuilder::new("level0", v("2017.4.1f1"), RELEASE)
                    .asset(
                        5,
                        ClassId::MONO_SCRIPT,
                        mono_script_fields("Door", "Game", "Assembly-CSharp.dll"),
                    )
                    .asset(6, ClassId(4242), Default::default())
                    .build(),
            )
            .unwrap();

        let t = MonoScriptResolver.describe(Reference::local(5), id, &c).unwrap();
        assert_eq!(t.full_name(), "[Assembly-CSharp]Game.Door");

        assert!(MonoScriptResolver.describe(Reference::local(6), id, &c).is_none());
        assert!(MonoScriptResolver.describe(Reference::local(7), id, &c).is_none());
        assert!(MonoScriptResolver.describe(Reference::NULL, id, &c).is_none());
    }
}
