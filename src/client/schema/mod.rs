//! Schema (spaces and indexes) cache types.

use std::{collections::HashMap, fmt};

use rmpv::Value;
use tracing::debug;

use crate::{
    client::ExecutorExt,
    errors::{DecodingError, Error},
    utils::value_to_map,
    Result,
};

/// Id of the primary index in space.
pub const PRIMARY_INDEX_ID: u32 = 0;

/// Space, addressed either by id or by name.
///
/// Ids go to the wire as is; names are resolved through the schema cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpaceRef {
    Name(String),
    Id(u32),
}

impl fmt::Display for SpaceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpaceRef::Name(x) => write!(f, "name '{x}'"),
            SpaceRef::Id(x) => write!(f, "id '{x}'"),
        }
    }
}

impl From<&str> for SpaceRef {
    fn from(value: &str) -> Self {
        Self::Name(value.to_owned())
    }
}

impl From<String> for SpaceRef {
    fn from(value: String) -> Self {
        Self::Name(value)
    }
}

impl From<u32> for SpaceRef {
    fn from(value: u32) -> Self {
        Self::Id(value)
    }
}

/// Index, addressed either by id or by name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexRef {
    Name(String),
    Id(u32),
}

impl fmt::Display for IndexRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexRef::Name(x) => write!(f, "name '{x}'"),
            IndexRef::Id(x) => write!(f, "id '{x}'"),
        }
    }
}

impl From<&str> for IndexRef {
    fn from(value: &str) -> Self {
        Self::Name(value.to_owned())
    }
}

impl From<String> for IndexRef {
    fn from(value: String) -> Self {
        Self::Name(value)
    }
}

impl From<u32> for IndexRef {
    fn from(value: u32) -> Self {
        Self::Id(value)
    }
}

/// Id and indexes of a single space.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpaceSchema {
    id: u32,
    indexes: HashMap<String, u32>,
}

impl SpaceSchema {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            indexes: HashMap::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn insert_index(&mut self, name: impl Into<String>, index_id: u32) {
        let _ = self.indexes.insert(name.into(), index_id);
    }

    pub fn index_id(&self, name: &str) -> Option<u32> {
        self.indexes.get(name).copied()
    }

    pub fn indexes(&self) -> impl Iterator<Item = (&str, u32)> {
        self.indexes.iter().map(|(name, id)| (name.as_str(), *id))
    }
}

/// Mapping from space names to their ids and indexes.
///
/// Filled by [`parse_schema`](crate::Connection::parse_schema), or seeded
/// manually through [`set_schema`](crate::Connection::set_schema) when
/// the connected user is not allowed to query it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Schema {
    spaces: HashMap<String, SpaceSchema>,
}

impl Schema {
    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }

    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    pub fn insert_space(&mut self, name: impl Into<String>, space: SpaceSchema) {
        let _ = self.spaces.insert(name.into(), space);
    }

    pub fn space(&self, name: &str) -> Option<&SpaceSchema> {
        self.spaces.get(name)
    }

    /// Resolve a space reference into its id.
    ///
    /// A name lookup on an empty schema fails with
    /// [`Error::SchemaNotLoaded`]; ids always pass through.
    pub fn space_id(&self, space: &SpaceRef) -> Result<u32> {
        match space {
            SpaceRef::Id(x) => Ok(*x),
            SpaceRef::Name(name) => {
                if self.spaces.is_empty() {
                    return Err(Error::SchemaNotLoaded);
                }
                self.spaces
                    .get(name)
                    .map(|x| x.id)
                    .ok_or_else(|| Error::UnknownSpace(space.to_string()))
            }
        }
    }

    /// Resolve an index reference into its id within a space.
    pub fn index_id(&self, space: &SpaceRef, index: &IndexRef) -> Result<u32> {
        let index_name = match index {
            IndexRef::Id(x) => return Ok(*x),
            IndexRef::Name(x) => x,
        };
        if self.spaces.is_empty() {
            return Err(Error::SchemaNotLoaded);
        }
        let space_schema = match space {
            SpaceRef::Name(name) => self.spaces.get(name),
            SpaceRef::Id(id) => self.spaces.values().find(|x| x.id == *id),
        }
        .ok_or_else(|| Error::UnknownSpace(space.to_string()))?;
        space_schema
            .index_id(index_name)
            .ok_or_else(|| Error::UnknownIndex {
                space: space.to_string(),
                index: index_name.clone(),
            })
    }
}

/// Load the schema from the server.
///
/// Lists spaces with `return box.space`, then queries the id and indexes
/// of every space. Server-side errors (e.g. the user is not allowed to
/// evaluate expressions) surface unchanged.
pub(crate) async fn load<E: ExecutorExt>(executor: &E) -> Result<Schema> {
    let spaces = executor.eval("return box.space", ()).await?.data()?;
    let names = space_names(spaces)?;

    let mut schema = Schema::default();
    for name in names {
        let id: u32 = executor
            .eval(format!("return box.space.{name}.id"), ())
            .await?
            .decode_first()?;
        let indexes = executor
            .eval(format!("return box.space.{name}.index"), ())
            .await?
            .data()?;
        let mut space = SpaceSchema::new(id);
        for (index_name, index_id) in index_ids(indexes)? {
            space.insert_index(index_name, index_id);
        }
        schema.insert_space(name, space);
    }
    Ok(schema)
}

/// Extract space names from the `return box.space` response data.
///
/// `box.space` maps every space both by name and by id; only names which
/// are valid Lua identifiers are kept, since they are substituted into
/// the follow-up queries.
fn space_names(data: Value) -> Result<Vec<String>, DecodingError> {
    let map = first_return_value(data).and_then(value_to_map)?;
    let mut names = Vec::with_capacity(map.len());
    for (key, _) in map {
        let Value::String(name) = key else { continue };
        let Some(name) = name.into_str() else { continue };
        if is_lua_identifier(&name) {
            names.push(name);
        } else {
            debug!("skipping space with non-identifier name '{}'", name);
        }
    }
    Ok(names)
}

/// Extract `(name, id)` pairs from the `return box.space.<name>.index`
/// response data. Numeric keys duplicate the named ones and are skipped.
fn index_ids(data: Value) -> Result<Vec<(String, u32)>, DecodingError> {
    let map = first_return_value(data).and_then(value_to_map)?;
    let mut indexes = Vec::with_capacity(map.len());
    for (key, value) in map {
        let Value::String(name) = key else { continue };
        let Some(name) = name.into_str() else { continue };
        let index = value_to_map(value).map_err(|err| err.in_other("index description"))?;
        let mut id = None;
        for (k, v) in index {
            if matches!(&k, Value::String(x) if x.as_str() == Some("id")) {
                id = v.as_u64();
                break;
            }
        }
        let id = id.ok_or_else(|| DecodingError::missing_key("id").in_other("index description"))?;
        indexes.push((name, id as u32));
    }
    Ok(indexes)
}

fn first_return_value(data: Value) -> Result<Value, DecodingError> {
    match data {
        Value::Array(x) => x
            .into_iter()
            .next()
            .ok_or_else(|| DecodingError::invalid_tuple_length(1, 0)),
        rest => Err(DecodingError::type_mismatch("array", rest.to_string())),
    }
}

fn is_lua_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|x| x.is_ascii_alphanumeric() || x == '_')
}
