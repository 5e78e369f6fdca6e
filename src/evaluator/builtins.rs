//! Installs the Language's built-in nominal types into the program
//! root's type table. Run once per `Session`, before any source is
//! compiled, so every module's `find_type_up` walk reaches these
//! without any special-casing in the scope manager (SPEC_FULL.md §4.4,
//! §4.10).

use crate::config::SessionConfig;
use crate::element::builder::ElementBuilder;
use crate::element::ElementId;
use crate::scope::ScopeManager;

const SIGNED_INTEGERS: &[(&str, u32)] = &[("i8", 1), ("i16", 2), ("i32", 4), ("i64", 8)];
const UNSIGNED_INTEGERS: &[(&str, u32)] = &[("u8", 1), ("u16", 2), ("u32", 4), ("u64", 8)];
const FLOATS: &[(&str, u32)] = &[("f32", 32), ("f64", 64)];

/// Installs `i8..i64`, `u8..u64`, `f32`/`f64`, `bool`, `string`, `any`
/// and `namespace` into `root`'s type table. `string`/`any` are sized
/// off `config.pointer_width` since they carry a pointer internally.
pub fn install(builder: &ElementBuilder, scope: &mut ScopeManager, root: ElementId, config: &SessionConfig) {
    let pointer_width = config.pointer_width.bytes();

    for (name, bytes) in SIGNED_INTEGERS {
        let bits = bytes * 8;
        let max = (1i128 << (bits - 1)) - 1;
        let min = -(1i128 << (bits - 1));
        let id = builder.make_numeric_type(scope.store_mut(), root, *name, *bytes, min, max, true);
        bind_type(builder, scope, root, *name, id);
    }

    for (name, bytes) in UNSIGNED_INTEGERS {
        let bits = bytes * 8;
        let max = if bits >= 127 { i128::MAX } else { (1i128 << bits) - 1 };
        let id = builder.make_numeric_type(scope.store_mut(), root, *name, *bytes, 0, max, false);
        bind_type(builder, scope, root, *name, id);
    }

    for (name, bits) in FLOATS {
        let id = builder.make_float_type(scope.store_mut(), root, *name, *bits);
        bind_type(builder, scope, root, *name, id);
    }

    let bool_id = builder.make_bool_type(scope.store_mut(), root);
    bind_type(builder, scope, root, "bool", bool_id);

    let string_id = builder.make_string_type(scope.store_mut(), root, pointer_width);
    bind_type(builder, scope, root, "string", string_id);

    let any_id = builder.make_any_type(scope.store_mut(), root, pointer_width);
    bind_type(builder, scope, root, "any", any_id);

    let namespace_id = builder.make_namespace_type(scope.store_mut(), root);
    bind_type(builder, scope, root, "namespace", namespace_id);
}

/// Registers a builtin both in the root's type table (for `: name`
/// annotations and cast/transmute headers, which resolve through
/// `find_type`) and as a constant, self-typed identifier (for `name`
/// referenced bare in value position, e.g. `MyInt := alias i32;`) — see
/// DESIGN.md "builtin types are nameable as values".
fn bind_type(builder: &ElementBuilder, scope: &mut ScopeManager, root: ElementId, name: &str, type_id: ElementId) {
    scope.insert_type(root, name, type_id);

    let ident_id = builder.make_identifier(scope.store_mut(), root, name, None);
    if let Some(element) = scope.store_mut().get_mut(ident_id) {
        if let crate::element::ElementPayload::Identifier { type_id: slot, is_constant, .. } = &mut element.payload {
            *slot = Some(type_id);
            *is_constant = true;
        }
    }
    scope.insert_identifier(root, name, ident_id);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::element::{Element, ElementPayload};

    fn make_root(scope: &mut ScopeManager) -> ElementId {
        let id = scope.store_mut().alloc_id();
        scope.store_mut().put(Element {
            id,
            parent_id: None,
            location: None,
            attributes: Vec::new(),
            payload: ElementPayload::Block {
                blocks: Vec::new(),
                statements: Vec::new(),
                comments: Vec::new(),
                imports: Vec::new(),
                attributes: Vec::new(),
                types: Default::default(),
                identifiers: Default::default(),
            },
        });
        id
    }

    #[test]
    fn installs_default_integer_type() {
        let mut scope = ScopeManager::new();
        let root = make_root(&mut scope);
        let builder = ElementBuilder::new();
        let config = SessionConfig::default();
        install(&builder, &mut scope, root, &config);

        let ty = scope.find_type_up(root, &config.default_integer_type);
        assert!(ty.is_some());
    }

    #[test]
    fn sizes_string_and_any_off_pointer_width() {
        use crate::element::ElementPayload::Type;

        let mut scope = ScopeManager::new();
        let root = make_root(&mut scope);
        let builder = ElementBuilder::new();
        let config = SessionConfig::default();
        install(&builder, &mut scope, root, &config);

        let string_id = scope.find_type_up(root, "string").unwrap();
        let Type(data) = &scope.store().get(string_id).unwrap().payload else { panic!("not a type") };
        assert_eq!(data.size_in_bytes, 8);
    }
}
