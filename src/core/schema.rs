//! Field descriptors for binding configuration keys onto a struct.
//!
//! A bound type describes its fields once, in [`Bind::bind`], by handing the
//! [`Schema`] a name, a tag and an accessor for each field. The schema turns
//! that into a flat list of [`FieldDescriptor`]s with dotted key segments,
//! which [`Bundle`](crate::core::Bundle) resolves and keeps up to date.
//!
//! Tags follow the `"name,watch"` grammar: the first element overrides the
//! key segment (an empty one derives it from the field name by lower-casing
//! the first character) and a `watch` element marks the field as live.

use std::fmt;
use std::sync::Arc;

/// Value type of a bound leaf field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Resolved with `get_bool`.
    Bool,
    /// Resolved with `get_string`.
    String,
    /// Resolved with `get_int`.
    Int,
    /// Resolved with `get_float`.
    Float,
    /// A type the binder cannot fill; skipped with a warning.
    Unsupported(&'static str),
}

/// A resolved value on its way into a leaf field.
#[derive(Debug, Clone, PartialEq)]
pub enum LeafValue {
    /// Boolean value.
    Bool(bool),
    /// String value.
    String(String),
    /// Integer value, before narrowing to the field's width.
    Int(i64),
    /// Floating-point value.
    Float(f64),
}

/// A field type the binder can assign.
pub trait Leaf: Sized + Send + Sync + 'static {
    /// How values for this type are resolved.
    const KIND: FieldKind;

    /// Convert a resolved value, or `None` if it does not fit this type.
    fn from_leaf(value: LeafValue) -> Option<Self>;
}

impl Leaf for bool {
    const KIND: FieldKind = FieldKind::Bool;

    fn from_leaf(value: LeafValue) -> Option<Self> {
        match value {
            LeafValue::Bool(b) => Some(b),
            _ => None,
        }
    }
}

impl Leaf for String {
    const KIND: FieldKind = FieldKind::String;

    fn from_leaf(value: LeafValue) -> Option<Self> {
        match value {
            LeafValue::String(s) => Some(s),
            _ => None,
        }
    }
}

macro_rules! int_leaf {
    ($($ty:ty),*) => {
        $(
            impl Leaf for $ty {
                const KIND: FieldKind = FieldKind::Int;

                fn from_leaf(value: LeafValue) -> Option<Self> {
                    match value {
                        LeafValue::Int(n) => <$ty>::try_from(n).ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

int_leaf!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl Leaf for f64 {
    const KIND: FieldKind = FieldKind::Float;

    fn from_leaf(value: LeafValue) -> Option<Self> {
        match value {
            LeafValue::Float(f) => Some(f),
            _ => None,
        }
    }
}

impl Leaf for f32 {
    const KIND: FieldKind = FieldKind::Float;

    fn from_leaf(value: LeafValue) -> Option<Self> {
        match value {
            LeafValue::Float(f) => Some(f as f32),
            _ => None,
        }
    }
}

/// A struct that can be populated from configuration.
///
/// # Examples
///
/// ```rust
/// use tiered_config::core::{Bind, Schema};
///
/// #[derive(Debug, Default, Clone)]
/// struct Address {
///     ip: String,
///     port: u16,
/// }
///
/// impl Bind for Address {
///     fn bind(schema: &mut Schema<Self>) {
///         schema
///             .field("IP", "ip", |a: &mut Address| &mut a.ip)
///             .field("Port", ",watch", |a: &mut Address| &mut a.port);
///     }
/// }
///
/// #[derive(Debug, Default, Clone)]
/// struct ServerConfig {
///     protocol: String,
///     address: Address,
/// }
///
/// impl Bind for ServerConfig {
///     fn bind(schema: &mut Schema<Self>) {
///         schema
///             .field("Protocol", "", |c: &mut ServerConfig| &mut c.protocol)
///             .nested("Address", "", |c: &mut ServerConfig| &mut c.address);
///     }
/// }
///
/// let schema = Schema::<ServerConfig>::of();
/// let keys: Vec<String> = schema.fields().iter().map(|f| f.key("server")).collect();
/// assert_eq!(keys, ["server.protocol", "server.address.ip", "server.address.port"]);
/// ```
pub trait Bind: Default + Clone + Send + Sync + 'static {
    /// Describe the fields of `Self`.
    fn bind(schema: &mut Schema<Self>);
}

type Assign<T> = Arc<dyn Fn(&mut T, LeafValue) -> bool + Send + Sync>;

/// One bindable leaf of `T`.
pub struct FieldDescriptor<T> {
    segments: Vec<String>,
    kind: FieldKind,
    watch: bool,
    assign: Option<Assign<T>>,
}

impl<T> FieldDescriptor<T> {
    /// Full dotted key under `prefix`.
    pub fn key(&self, prefix: &str) -> String {
        let path = self.segments.join(".");
        if prefix.is_empty() {
            path
        } else {
            format!("{}.{}", prefix, path)
        }
    }

    /// Value type of the field.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Whether the field should follow live changes.
    pub fn is_watched(&self) -> bool {
        self.watch
    }

    /// Write `value` into the field of `target`.
    ///
    /// Returns `false` if the field is unsupported or the value does not fit
    /// its type (for example an integer outside a `u8`'s range).
    pub fn apply(&self, target: &mut T, value: LeafValue) -> bool {
        match &self.assign {
            Some(assign) => assign(target, value),
            None => false,
        }
    }
}

impl<T> Clone for FieldDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            segments: self.segments.clone(),
            kind: self.kind,
            watch: self.watch,
            assign: self.assign.clone(),
        }
    }
}

impl<T> fmt::Debug for FieldDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("segments", &self.segments)
            .field("kind", &self.kind)
            .field("watch", &self.watch)
            .finish()
    }
}

/// Flattened field list of a bound type.
pub struct Schema<T> {
    fields: Vec<FieldDescriptor<T>>,
}

impl<T> Default for Schema<T> {
    fn default() -> Self {
        Self { fields: Vec::new() }
    }
}

impl<T: 'static> Schema<T> {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// The schema `T` describes for itself.
    pub fn of() -> Self
    where
        T: Bind,
    {
        let mut schema = Self::new();
        T::bind(&mut schema);
        schema
    }

    /// The leaves in declaration order, nested structs depth-first.
    pub fn fields(&self) -> &[FieldDescriptor<T>] {
        &self.fields
    }

    /// Declare a leaf field.
    pub fn field<V: Leaf>(&mut self, name: &str, tag: &str, lens: fn(&mut T) -> &mut V) -> &mut Self {
        let (segment, watch) = parse_tag(name, tag);
        let assign: Assign<T> = Arc::new(move |target: &mut T, value: LeafValue| {
            match V::from_leaf(value) {
                Some(v) => {
                    *lens(target) = v;
                    true
                }
                None => false,
            }
        });

        self.fields.push(FieldDescriptor {
            segments: vec![segment],
            kind: V::KIND,
            watch,
            assign: Some(assign),
        });
        self
    }

    /// Declare a nested struct; its leaves get this field's key as a prefix.
    ///
    /// A `watch` marker on the nested field itself has no effect; mark the
    /// leaves instead.
    pub fn nested<U: Bind>(&mut self, name: &str, tag: &str, lens: fn(&mut T) -> &mut U) -> &mut Self {
        let (segment, _) = parse_tag(name, tag);

        for inner in Schema::<U>::of().fields {
            let assign = inner.assign.map(|assign| -> Assign<T> {
                Arc::new(move |target: &mut T, value: LeafValue| assign(lens(target), value))
            });

            let mut segments = Vec::with_capacity(inner.segments.len() + 1);
            segments.push(segment.clone());
            segments.extend(inner.segments);

            self.fields.push(FieldDescriptor {
                segments,
                kind: inner.kind,
                watch: inner.watch,
                assign,
            });
        }
        self
    }

    /// Declare a field the binder cannot fill, such as a list or a map.
    ///
    /// The field keeps its default value and a warning is logged when the
    /// struct is bound.
    pub fn unsupported(&mut self, name: &str, tag: &str, type_name: &'static str) -> &mut Self {
        let (segment, watch) = parse_tag(name, tag);
        self.fields.push(FieldDescriptor {
            segments: vec![segment],
            kind: FieldKind::Unsupported(type_name),
            watch,
            assign: None,
        });
        self
    }
}

/// Split a `"name,watch"` tag into the key segment and the live flag.
fn parse_tag(field_name: &str, tag: &str) -> (String, bool) {
    let mut parts = tag.split(',');
    let segment = match parts.next().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => lower_first(field_name),
    };
    let watch = parts.any(|option| option.trim() == "watch");
    (segment, watch)
}

fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
