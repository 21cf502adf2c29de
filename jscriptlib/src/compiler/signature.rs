use std::collections::HashMap;

use crate::bytecode::Value;
use crate::types::{TypeInfo, VOID_POINTEE};

/// Namespace whose calls the VM routes to the graphics capability.
pub const NATIVE_NAMESPACE: &str = "Gfx";
pub const NATIVE_PREFIX: &str = "Gfx.";

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionParam {
    pub name: String,
    pub ty: TypeInfo,
    pub default: Option<Value>,
}

impl FunctionParam {
    pub fn required(name: &str, ty: TypeInfo) -> Self {
        Self {
            name: name.to_string(),
            ty,
            default: None,
        }
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub name: String,
    pub params: Vec<FunctionParam>,
    /// `None` for void functions.
    pub return_type: Option<TypeInfo>,
}

impl FunctionSignature {
    pub fn is_void(&self) -> bool {
        self.return_type.is_none()
    }

    pub fn param(&self, name: &str) -> Option<&FunctionParam> {
        self.params.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignatureTable {
    signatures: HashMap<String, FunctionSignature>,
}

impl SignatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table preloaded with the `Gfx` natives.
    pub fn with_natives() -> Self {
        let mut table = Self::new();
        table.register_natives();
        table
    }

    /// Returns `false` and keeps the existing entry when the name is taken.
    pub fn register(&mut self, signature: FunctionSignature) -> bool {
        if self.signatures.contains_key(&signature.name) {
            return false;
        }
        self.signatures.insert(signature.name.clone(), signature);
        true
    }

    pub fn get(&self, name: &str) -> Option<&FunctionSignature> {
        self.signatures.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.signatures.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    fn register_natives(&mut self) {
        let native = |name: &str, params: Vec<FunctionParam>, return_type: Option<TypeInfo>| {
            FunctionSignature {
                name: format!("{NATIVE_PREFIX}{name}"),
                params,
                return_type,
            }
        };
        let float = |name: &str| FunctionParam::required(name, TypeInfo::Float);
        let void_ptr = || Some(TypeInfo::Pointer(VOID_POINTEE.to_string()));

        self.register(native(
            "Init",
            vec![
                FunctionParam::required("width", TypeInfo::Int),
                FunctionParam::required("height", TypeInfo::Int),
                FunctionParam::required("title", TypeInfo::Str),
            ],
            None,
        ));
        self.register(native(
            "DrawRect",
            ["x", "y", "w", "h", "r", "g", "b"]
                .into_iter()
                .map(float)
                .collect(),
            None,
        ));
        self.register(native("RunLoop", Vec::new(), None));
        self.register(native("GetLayer", Vec::new(), void_ptr()));
        self.register(native("GetDevice", Vec::new(), void_ptr()));
    }
}
