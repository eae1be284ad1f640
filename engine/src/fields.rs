//! Field descriptors.
//!
//! A [`FieldSet`] lists every persisted field of a document type as a name
//! plus an accessor pair. The merge engine walks it to compare and copy
//! fields generically. Sets are built once per type, normally through the
//! [`document_fields!`](crate::document_fields) macro, which also checks the
//! set against the type's serialized form.

use crate::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

type SameFn<D> = Box<dyn Fn(&D, &D) -> bool + Send + Sync>;
type AssignFn<D> = Box<dyn Fn(&mut D, &D) + Send + Sync>;

/// A single persisted field of document type `D`.
pub struct Field<D> {
    name: &'static str,
    same: SameFn<D>,
    assign: AssignFn<D>,
}

impl<D: 'static> Field<D> {
    /// Describe a field through a getter and a mutable getter.
    ///
    /// Values compare with `PartialEq`, so `Option` fields treat two `None`s
    /// as equal and `None` vs `Some` as different, and nested values compare
    /// structurally rather than by identity.
    pub fn new<T>(name: &'static str, get: fn(&D) -> &T, get_mut: fn(&mut D) -> &mut T) -> Self
    where
        T: PartialEq + Clone + 'static,
    {
        Self {
            name,
            same: Box::new(move |a: &D, b: &D| get(a) == get(b)),
            assign: Box::new(move |dst: &mut D, src: &D| *get_mut(dst) = get(src).clone()),
        }
    }
}

impl<D> Field<D> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the field holds equal values in `a` and `b`.
    pub fn same(&self, a: &D, b: &D) -> bool {
        (self.same)(a, b)
    }

    /// Overwrite the field in `dst` with a copy of its value in `src`.
    pub fn assign(&self, dst: &mut D, src: &D) {
        (self.assign)(dst, src)
    }
}

impl<D> fmt::Debug for Field<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field").field("name", &self.name).finish()
    }
}

/// The complete list of persisted fields of a document type.
pub struct FieldSet<D> {
    fields: Vec<Field<D>>,
}

impl<D: 'static> FieldSet<D> {
    /// Create an empty field set.
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Builder-style method to add a field.
    pub fn field<T>(
        mut self,
        name: &'static str,
        get: fn(&D) -> &T,
        get_mut: fn(&mut D) -> &mut T,
    ) -> Self
    where
        T: PartialEq + Clone + 'static,
    {
        self.push(Field::new(name, get, get_mut));
        self
    }

    /// Add a field.
    pub fn push(&mut self, field: Field<D>) -> &mut Self {
        self.fields.push(field);
        self
    }
}

impl<D> FieldSet<D> {
    pub fn iter(&self) -> impl Iterator<Item = &Field<D>> {
        self.fields.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(Field::name)
    }

    pub fn get(&self, name: &str) -> Option<&Field<D>> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Names of the fields whose values differ between `a` and `b`.
    pub fn diff(&self, a: &D, b: &D) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| !f.same(a, b))
            .map(Field::name)
            .collect()
    }
}

impl<D: Serialize + Default> FieldSet<D> {
    /// Check that no persisted member of `D` is missing from the set.
    ///
    /// Serializes `D::default()` and counts its members other than `_id` and
    /// `_rev`. An unlisted field would never be merged, so a set with fewer
    /// fields than that count is rejected. Members skipped while empty are
    /// not counted.
    pub fn validate(&self) -> Result<()> {
        let document = std::any::type_name::<D>();
        let persisted = match serde_json::to_value(D::default())? {
            Value::Object(members) => members
                .keys()
                .filter(|name| !matches!(name.as_str(), "_id" | "_rev"))
                .count(),
            _ => {
                return Err(Error::InvalidDocument(format!(
                    "{} does not serialize to an object",
                    document
                )));
            }
        };

        if persisted > self.len() {
            return Err(Error::IncompleteFields {
                document,
                listed: self.len(),
                persisted,
            });
        }
        Ok(())
    }
}

impl<D: 'static> Default for FieldSet<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> fmt::Debug for FieldSet<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Implement [`Document::field_set`](crate::Document::field_set) for a type.
///
/// Lists the persisted fields by name; the set is built on first use and
/// cached for the life of the process. Private fields may be listed since the
/// macro expands inside the implementing module.
///
/// # Panics
///
/// On first use, if the type persists more members than are listed (see
/// [`FieldSet::validate`]).
///
/// ```rust,ignore
/// impl Document for Car {
///     // ...
///     document_fields!(Car { make, model, horse_powers });
/// }
/// ```
#[macro_export]
macro_rules! document_fields {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        fn field_set() -> &'static $crate::FieldSet<Self> {
            static FIELDS: ::std::sync::OnceLock<$crate::FieldSet<$ty>> =
                ::std::sync::OnceLock::new();
            FIELDS.get_or_init(|| {
                let fields = $crate::FieldSet::<$ty>::new()
                    $(.field(stringify!($field), |d| &d.$field, |d| &mut d.$field))*;
                if let Err(e) = fields.validate() {
                    panic!("{}", e);
                }
                fields
            })
        }
    };
}
