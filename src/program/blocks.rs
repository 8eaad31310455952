//! Serialized block tree handed over by the visual editor.
//!
//! The tree is a list of top-level stacks. Each stack is a chain of blocks
//! linked through `next`; a block's `fields` hold either plain values
//! (numbers, text) or nested blocks plugged into its sockets.
//!
//! ```json
//! {"stacks": [
//!   {"type": "data_colors",
//!    "next": {"type": "dplyr_filter",
//!             "fields": {"Column": {
//!                 "type": "variable_compare",
//!                 "fields": {"OP": "NEQ",
//!                            "A": {"type": "variable_column", "fields": {"TEXT": "red"}},
//!                            "B": {"type": "variable_number", "fields": {"NUM": 0}}}}}}}
//! ]}
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Whole workspace as serialized by the editor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockTree {
    /// Top-level stacks in document order.
    #[serde(default)]
    pub stacks: Vec<Block>,
}

impl BlockTree {
    /// Parses a tree from JSON text.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Builds a tree where each inner vector becomes one stack, chained
    /// top to bottom.
    pub fn from_stacks<I>(stacks: I) -> Self
    where
        I: IntoIterator<Item = Vec<Block>>,
    {
        Self {
            stacks: stacks.into_iter().filter_map(chain).collect(),
        }
    }

    /// Serializes the tree to pretty JSON.
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// One block of the editor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Editor-assigned identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Block type, e.g. `dplyr_filter`. Empty when the editor left it out;
    /// the compiler rejects such blocks.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Field and socket values keyed by field name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, FieldValue>,
    /// Next block in the same stack.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<Box<Block>>,
}

impl Block {
    /// Creates a block of the given type with no fields.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: kind.into(),
            fields: BTreeMap::new(),
            next: None,
        }
    }

    /// Sets the block identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets a field value.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Shorthand for a `variable_column` block.
    pub fn column(name: &str) -> Self {
        Block::new("variable_column").field("TEXT", name)
    }

    /// Shorthand for a `variable_number` block.
    pub fn number(value: impl Into<serde_json::Number>) -> Self {
        Block::new("variable_number").field("NUM", FieldValue::Number(value.into()))
    }

    /// Shorthand for a fractional `variable_number` block. Non-finite values
    /// are kept as text so the compiler rejects them.
    pub fn float(value: f64) -> Self {
        let num = match serde_json::Number::from_f64(value) {
            Some(n) => FieldValue::Number(n),
            None => FieldValue::Text(value.to_string()),
        };
        Block::new("variable_number").field("NUM", num)
    }

    /// Shorthand for a `variable_text` block.
    pub fn text(value: &str) -> Self {
        Block::new("variable_text").field("TEXT", value)
    }

    /// Iterates the stack starting at this block.
    pub fn stack(&self) -> StackIter<'_> {
        StackIter { next: Some(self) }
    }
}

/// Iterator over the blocks of one stack.
pub struct StackIter<'a> {
    next: Option<&'a Block>,
}

impl<'a> Iterator for StackIter<'a> {
    type Item = &'a Block;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.next.as_deref();
        Some(current)
    }
}

/// Value bound to a block field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Numeric field.
    Number(serde_json::Number),
    /// Text field (names, operator codes).
    Text(String),
    /// Single nested block.
    Block(Box<Block>),
    /// Several nested blocks, e.g. the columns of a select.
    Blocks(Vec<Block>),
    /// Anything else (`null`, booleans, ...). Never valid; kept so the
    /// compiler can report it against the owning block.
    Other(serde_json::Value),
}

impl FieldValue {
    /// Short description used in compile errors.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Number(_) => "number",
            FieldValue::Text(_) => "text",
            FieldValue::Block(_) => "block",
            FieldValue::Blocks(_) => "block list",
            FieldValue::Other(serde_json::Value::Null) => "null",
            FieldValue::Other(serde_json::Value::Bool(_)) => "boolean",
            FieldValue::Other(_) => "unsupported value",
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Block> for FieldValue {
    fn from(value: Block) -> Self {
        FieldValue::Block(Box::new(value))
    }
}

impl From<Vec<Block>> for FieldValue {
    fn from(value: Vec<Block>) -> Self {
        FieldValue::Blocks(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value.into())
    }
}

fn chain(blocks: Vec<Block>) -> Option<Block> {
    let mut iter = blocks.into_iter().rev();
    let mut head = iter.next()?;
    for mut block in iter {
        block.next = Some(Box::new(head));
        head = block;
    }
    Some(head)
}
