//! Declarative JSON field-descriptor runtime.
//!
//! Mirrors the source's `JsonStructure`/`JsonField` (`snakecord/utils.py`):
//! a record type declares, once, a list of fields each carrying an
//! external key, an optional unmarshal/marshal transform, a default, and
//! an omit-empty flag. Unmarshalling iterates the descriptors and applies
//! defaults on a missing or invalid entry; marshalling is the inverse.
//!
//! Rust has no runtime subclassing to mirror the source's
//! `__init_subclass__` descriptor union, so composition across a base
//! record happens at the call site: a derived record's
//! [`Described::own_descriptors`] literally includes the base's field
//! list alongside its own (see `shardkit-rest`'s request bodies and this
//! module's tests for worked examples).

use serde_json::Value;

/// One field's transform pair plus metadata, parameterized over the
/// owning record type `S`.
pub struct FieldDescriptor<S> {
    /// The external JSON key.
    pub key: &'static str,
    /// Applies `data[key]` onto `target`. Returns `false` to signal
    /// "missing or invalid", which triggers `apply_default` instead.
    pub unmarshal: fn(target: &mut S, value: &Value) -> bool,
    /// Resets the field to its default value.
    pub apply_default: fn(target: &mut S),
    /// Reads the field back out for serialization. `None` always omits
    /// the key, regardless of `omit_empty`.
    pub marshal: fn(source: &S) -> Option<Value>,
    /// Also omit the key when `marshal` returns `Some(Value::Null)`.
    pub omit_empty: bool,
}

/// A record type that declares its field descriptors once.
pub trait Described: Sized + Default {
    /// This type's descriptor set, including any composed-in base fields.
    fn own_descriptors() -> &'static [FieldDescriptor<Self>];

    /// Unmarshal a JSON document, applying each descriptor's transform and
    /// falling back to its default on a missing or invalid entry.
    fn unmarshal(data: &Value) -> Self {
        let mut target = Self::default();
        let empty = serde_json::Map::new();
        let object = data.as_object().unwrap_or(&empty);
        for descriptor in Self::own_descriptors() {
            match object.get(descriptor.key) {
                Some(value) if (descriptor.unmarshal)(&mut target, value) => {}
                _ => (descriptor.apply_default)(&mut target),
            }
        }
        target
    }

    /// Marshal `self` back into a JSON object, honouring `omit_empty`.
    fn marshal(&self) -> Value {
        let mut map = serde_json::Map::new();
        for descriptor in Self::own_descriptors() {
            let Some(value) = (descriptor.marshal)(self) else {
                continue;
            };
            if descriptor.omit_empty && value.is_null() {
                continue;
            }
            map.insert(descriptor.key.to_owned(), value);
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Worked example grounded on `lib/guild.py`'s `RoleTags`/`Role`: a
    // nested record (`tags`) composed into its owner via `JsonField(struct=...)`.

    #[derive(Debug, Default, Clone, PartialEq)]
    struct RoleTags {
        bot_id: Option<String>,
        premium_subscriber: bool,
    }

    impl Described for RoleTags {
        fn own_descriptors() -> &'static [FieldDescriptor<Self>] {
            &[
                FieldDescriptor {
                    key: "bot_id",
                    unmarshal: |t, v| {
                        t.bot_id = v.as_str().map(str::to_owned);
                        t.bot_id.is_some()
                    },
                    apply_default: |t| t.bot_id = None,
                    marshal: |t| t.bot_id.clone().map(Value::String),
                    omit_empty: true,
                },
                FieldDescriptor {
                    key: "premium_subscriber",
                    unmarshal: |t, v| {
                        v.as_bool().map(|b| t.premium_subscriber = b).is_some()
                    },
                    apply_default: |t| t.premium_subscriber = false,
                    marshal: |t| Some(Value::Bool(t.premium_subscriber)),
                    omit_empty: false,
                },
            ]
        }
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Role {
        name: String,
        hoist: bool,
        position: i64,
        tags: RoleTags,
    }

    impl Described for Role {
        fn own_descriptors() -> &'static [FieldDescriptor<Self>] {
            &[
                FieldDescriptor {
                    key: "name",
                    unmarshal: |t, v| {
                        v.as_str().map(|s| t.name = s.to_owned()).is_some()
                    },
                    apply_default: |t| t.name = String::new(),
                    marshal: |t| Some(Value::String(t.name.clone())),
                    omit_empty: false,
                },
                FieldDescriptor {
                    key: "hoist",
                    unmarshal: |t, v| v.as_bool().map(|b| t.hoist = b).is_some(),
                    apply_default: |t| t.hoist = false,
                    marshal: |t| Some(Value::Bool(t.hoist)),
                    omit_empty: false,
                },
                FieldDescriptor {
                    key: "position",
                    unmarshal: |t, v| v.as_i64().map(|n| t.position = n).is_some(),
                    apply_default: |t| t.position = 0,
                    marshal: |t| Some(Value::Number(t.position.into())),
                    omit_empty: false,
                },
                FieldDescriptor {
                    key: "tags",
                    unmarshal: |t, v| {
                        t.tags = RoleTags::unmarshal(v);
                        true
                    },
                    apply_default: |t| t.tags = RoleTags::default(),
                    marshal: |t| Some(RoleTags::marshal(&t.tags)),
                    omit_empty: false,
                },
            ]
        }
    }

    #[test]
    fn unmarshal_applies_transforms_and_nested_struct() {
        let json: Value = serde_json::from_str(
            r#"{"name": "Moderator", "hoist": true, "position": 3,
                "tags": {"premium_subscriber": true}}"#,
        )
        .unwrap();
        let role = Role::unmarshal(&json);
        assert_eq!(role.name, "Moderator");
        assert!(role.hoist);
        assert_eq!(role.position, 3);
        assert_eq!(role.tags.bot_id, None);
        assert!(role.tags.premium_subscriber);
    }

    #[test]
    fn unmarshal_applies_defaults_on_missing_or_invalid_fields() {
        let json: Value = serde_json::from_str(r#"{"name": "Everyone", "position": "oops"}"#).unwrap();
        let role = Role::unmarshal(&json);
        assert_eq!(role.name, "Everyone");
        assert!(!role.hoist);
        assert_eq!(role.position, 0);
        assert_eq!(role.tags, RoleTags::default());
    }

    #[test]
    fn marshal_honours_omit_empty() {
        let role = Role {
            name: "Admin".to_owned(),
            hoist: false,
            position: 1,
            tags: RoleTags {
                bot_id: None,
                premium_subscriber: false,
            },
        };
        let marshalled = role.marshal();
        let tags = marshalled.get("tags").unwrap();
        assert!(tags.get("bot_id").is_none(), "omit_empty should drop a None bot_id");
        assert_eq!(tags.get("premium_subscriber"), Some(&Value::Bool(false)));
    }

    #[test]
    fn marshal_round_trips_through_unmarshal() {
        let role = Role {
            name: "Mod".to_owned(),
            hoist: true,
            position: 5,
            tags: RoleTags {
                bot_id: Some("123".to_owned()),
                premium_subscriber: false,
            },
        };
        let json = role.marshal();
        let reparsed = Role::unmarshal(&json);
        assert_eq!(role, reparsed);
    }
}
