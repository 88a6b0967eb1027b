//! Prototype decoding
//!
//! A prototype is the declarative, ordered description of which component
//! types and resources compose an instance. On disk it is a RON document:
//!
//! ```text
//! (
//!     components: [
//!         (component_type: "phys", resource: "ship.pc"),
//!         (component_type: "sprite", resource: "ship.img"),
//!     ],
//! )
//! ```
//!
//! The runtime treats prototypes as just another resource: register
//! [`decode`] with the resource loader under the prototype extension and
//! `Collection::spawn` takes it from there.

use std::any::Any;

use serde::{Deserialize, Serialize};

/// One (component type, resource) pair of a prototype
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrototypeComponent {
    /// Registered component type name.
    pub component_type: String,
    /// Resource identifier handed to the loader.
    pub resource: String,
}

/// Ordered description of an instance's components
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prototype {
    /// Component pairs in creation order.
    pub components: Vec<PrototypeComponent>,
}

impl Prototype {
    /// Decode a prototype from RON text.
    ///
    /// # Errors
    ///
    /// Returns the RON parse error message on malformed input.
    pub fn from_ron(text: &str) -> Result<Self, String> {
        ron::from_str(text).map_err(|e| e.to_string())
    }
}

/// Resource decoder for prototypes, for registration with a loader.
///
/// # Errors
///
/// Reports malformed UTF-8 or RON as a decode failure string.
pub fn decode(bytes: &[u8]) -> Result<Box<dyn Any>, String> {
    let text = std::str::from_utf8(bytes).map_err(|e| e.to_string())?;
    Prototype::from_ron(text).map(|p| Box::new(p) as Box<dyn Any>)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_components_in_order() {
        let proto = Prototype::from_ron(
            r#"(
                components: [
                    (component_type: "phys", resource: "ship.pc"),
                    (component_type: "sprite", resource: "ship.img"),
                ],
            )"#,
        )
        .unwrap();
        assert_eq!(proto.components.len(), 2);
        assert_eq!(proto.components[0].component_type, "phys");
        assert_eq!(proto.components[1].resource, "ship.img");
    }

    #[test]
    fn empty_component_list_is_valid() {
        let proto = Prototype::from_ron("(components: [])").unwrap();
        assert!(proto.components.is_empty());
    }

    #[test]
    fn malformed_ron_is_a_decode_error() {
        assert!(Prototype::from_ron("(components: [").is_err());
        assert!(decode(b"not ron at all").is_err());
    }

    #[test]
    fn decoder_produces_a_downcastable_prototype() {
        let boxed = decode(b"(components: [(component_type: \"a\", resource: \"x.a\")])").unwrap();
        let proto = boxed.downcast_ref::<Prototype>().unwrap();
        assert_eq!(proto.components[0].component_type, "a");
    }
}
