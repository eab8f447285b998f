//! Ordered document tree and YAML stream rendering
//!
//! Exported assets are built as [`Node`] trees whose mappings keep
//! insertion order, then rendered through `serde_yaml`. A unit's documents
//! are written as one stream:
//!
//! ```text
//! %YAML 1.1
//! %TAG !u! tag:unity3d.com,2011:
//! --- !u!363 &36300000
//! OcclusionCullingData:
//!   m_Name: Data
//! ```

use serde_yaml::Value as Yaml;

use crate::{Error, Result};

pub const YAML_HEADER: &str = "%YAML 1.1\n%TAG !u! tag:unity3d.com,2011:\n";

const DOCUMENT_PREFIX: &str = "--- !u!";

/// Leaf value
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
}

/// Mapping that preserves insertion order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mapping(Vec<(String, Node)>);

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, node: impl Into<Node>) {
        self.0.push((key.into(), node.into()));
    }

    pub fn with(mut self, key: impl Into<String>, node: impl Into<Node>) -> Self {
        self.insert(key, node);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Document tree node
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Scalar(Scalar),
    Mapping(Mapping),
    Sequence(Vec<Node>),
}

impl Node {
    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Scalar(Scalar::Int(v)) => Some(*v),
            Self::Scalar(Scalar::UInt(v)) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Scalar(Scalar::UInt(v)) => Some(*v),
            Self::Scalar(Scalar::Int(v)) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Scalar(Scalar::Float(v)) => Some(*v),
            Self::Scalar(Scalar::Int(v)) => Some(*v as f64),
            Self::Scalar(Scalar::UInt(v)) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_mapping().and_then(|m| m.get(key))
    }

    pub fn to_yaml(&self) -> Yaml {
        match self {
            Self::Scalar(Scalar::Int(v)) => Yaml::Number((*v).into()),
            Self::Scalar(Scalar::UInt(v)) => Yaml::Number((*v).into()),
            Self::Scalar(Scalar::Float(v)) => Yaml::Number((*v).into()),
            Self::Scalar(Scalar::String(s)) => Yaml::String(s.clone()),
            Self::Mapping(m) => Yaml::Mapping(
                m.iter()
                    .map(|(k, v)| (Yaml::String(k.to_string()), v.to_yaml()))
                    .collect(),
            ),
            Self::Sequence(items) => Yaml::Sequence(items.iter().map(Node::to_yaml).collect()),
        }
    }

    pub fn from_yaml(value: &Yaml) -> Result<Self> {
        Ok(match value {
            Yaml::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Scalar(Scalar::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Self::Scalar(Scalar::UInt(u))
                } else {
                    Self::Scalar(Scalar::Float(n.as_f64().unwrap_or(f64::NAN)))
                }
            }
            Yaml::String(s) => Self::Scalar(Scalar::String(s.clone())),
            // Empty strings can come back as null from hand-edited files
            Yaml::Null => Self::Scalar(Scalar::String(String::new())),
            Yaml::Bool(b) => Self::Scalar(Scalar::Int(*b as i64)),
            Yaml::Sequence(items) => {
                Self::Sequence(items.iter().map(Self::from_yaml).collect::<Result<_>>()?)
            }
            Yaml::Mapping(map) => {
                let mut mapping = Mapping::new();
                for (k, v) in map {
                    let key = k
                        .as_str()
                        .ok_or_else(|| Error::Import(format!("non-string key {k:?}")))?;
                    mapping.insert(key, Self::from_yaml(v)?);
                }
                Self::Mapping(mapping)
            }
            Yaml::Tagged(tagged) => Self::from_yaml(&tagged.value)?,
        })
    }
}

impl From<Scalar> for Node {
    fn from(s: Scalar) -> Self {
        Self::Scalar(s)
    }
}

impl From<Mapping> for Node {
    fn from(m: Mapping) -> Self {
        Self::Mapping(m)
    }
}

impl From<i64> for Node {
    fn from(v: i64) -> Self {
        Self::Scalar(Scalar::Int(v))
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Self::Scalar(Scalar::String(s.to_string()))
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Self::Scalar(Scalar::String(s))
    }
}

/// One `--- !u!<class> &<fileID>` document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub class_id: i32,
    pub file_id: i64,
    pub class_name: String,
    pub body: Node,
}

/// Render documents as a YAML stream
pub fn write_stream(documents: &[Document]) -> Result<String> {
    let mut out = String::from(YAML_HEADER);
    for doc in documents {
        out.push_str(&format!("{DOCUMENT_PREFIX}{} &{}\n", doc.class_id, doc.file_id));
        let root = Mapping::new().with(doc.class_name.clone(), doc.body.clone());
        out.push_str(&serde_yaml::to_string(&Node::Mapping(root).to_yaml())?);
    }
    Ok(out)
}

/// Parse a stream produced by [`write_stream`]
pub fn parse_stream(text: &str) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    let mut current: Option<(i32, i64, String)> = None;

    let mut flush = |current: Option<(i32, i64, String)>| -> Result<()> {
        let Some((class_id, file_id, body)) = current else {
            return Ok(());
        };
        let value: Yaml = serde_yaml::from_str(&body)?;
        let node = Node::from_yaml(&value)?;
        let root = node
            .as_mapping()
            .filter(|m| m.len() == 1)
            .ok_or_else(|| Error::Import(format!("document &{file_id} has no single root key")))?;
        let (class_name, body) = root
            .iter()
            .next()
            .ok_or_else(|| Error::Import(format!("document &{file_id} is empty")))?;
        documents.push(Document {
            class_id,
            file_id,
            class_name: class_name.to_string(),
            body: body.clone(),
        });
        Ok(())
    };

    for line in text.lines() {
        if let Some(header) = line.strip_prefix(DOCUMENT_PREFIX) {
            flush(current.take())?;
            let (class, anchor) = header
                .split_once(" &")
                .ok_or_else(|| Error::Import(format!("bad document header {line:?}")))?;
            let class_id = class
                .trim()
                .parse()
                .map_err(|_| Error::Import(format!("bad class id in {line:?}")))?;
            let file_id = anchor
                .trim()
                .parse()
                .map_err(|_| Error::Import(format!("bad file id in {line:?}")))?;
            current = Some((class_id, file_id, String::new()));
        } else if line.starts_with('%') {
            continue;
        } else if let Some((_, _, body)) = current.as_mut() {
            body.push_str(line);
            body.push('\n');
        }
    }
    flush(current.take())?;

    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Node {
        Node::Mapping(
            Mapping::new()
                .with("m_Name", "Data")
                .with("m_Flag", 1i64)
                .with("m_Hash", "0123abcd")
                .with(
                    "m_Ref",
                    Mapping::new().with("fileID", 36300000i64).with("fileIndex", 0i64),
                )
                .with("m_Scale", Scalar::Float(0.25))
                .with("m_Big", Scalar::UInt(u64::MAX))
                .with("m_List", Node::Sequence(vec![Node::from(-3i64), Node::from("x")])),
        )
    }

    #[test]
    fn test_mapping_keeps_order() {
        let node = sample();
        let keys: Vec<_> = node.as_mapping().unwrap().keys().collect();
        assert_eq!(keys, vec!["m_Name", "m_Flag", "m_Hash", "m_Ref", "m_Scale", "m_Big", "m_List"]);

        let yaml = serde_yaml::to_string(&node.to_yaml()).unwrap();
        let name = yaml.find("m_Name").unwrap();
        let list = yaml.find("m_List").unwrap();
        assert!(name < list);
    }

    #[test]
    fn test_yaml_round_trip() {
        let node = sample();
        let yaml = serde_yaml::to_string(&node.to_yaml()).unwrap();
        let back = Node::from_yaml(&serde_yaml::from_str(&yaml).unwrap()).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_stream_round_trip() {
        let docs = vec![
            Document {
                class_id: 363,
                file_id: 36300000,
                class_name: "OcclusionCullingData".into(),
                body: sample(),
            },
            Document {
                class_id: 23,
                file_id: 2300000000000042,
                class_name: "MeshRenderer".into(),
                body: Node::Mapping(Mapping::new().with("m_Enabled", 1i64)),
            },
        ];
        let text = write_stream(&docs).unwrap();
        let expected = concat!(
            "%YAML 1.1\n%TAG !u! tag:unity3d.com,2011:\n",
            "--- !u!363 &36300000\nOcclusionCullingData:\n",
        );
        assert!(text.starts_with(expected));
        assert!(text.contains("--- !u!23 &2300000000000042\n"));

        assert_eq!(parse_stream(&text).unwrap(), docs);
    }

    #[test]
    fn test_parse_stream_rejects_bad_header() {
        assert!(parse_stream("--- !u!abc &1\nX: {}\n").is_err());
    }
}
