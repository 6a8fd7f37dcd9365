use serde::Serialize;

use crate::errors::{ScriptError, ScriptResult};

use super::{DeferredHandler, Handler, OpcodeDefinition, SyncHandler};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Any,
    Null,
    Boolean,
    Number,
    String,
    List,
    Object,
    /// Closure or opcode name.
    Callable,
    Capability,
}

/// Editor slot hint for rendering a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    Call,
    Infix,
    Prefix,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ValueType,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpcodeMeta {
    pub name: String,
    pub label: String,
    pub category: String,
    pub description: String,
    pub params: Vec<ParamMeta>,
    pub returns: ValueType,
    /// The last parameter may repeat.
    pub variadic: bool,
    pub gas_cost: u64,
    pub deferred: bool,
    pub layout: Layout,
}

impl OpcodeMeta {
    pub fn new(name: &str) -> Self {
        let category = name.split_once('.').map_or("core", |(prefix, _)| prefix);
        Self {
            name: name.to_string(),
            label: name.to_string(),
            category: category.to_string(),
            description: String::new(),
            params: Vec::new(),
            returns: ValueType::Any,
            variadic: false,
            gas_cost: 1,
            deferred: false,
            layout: Layout::Call,
        }
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn param(mut self, name: &str, ty: ValueType) -> Self {
        self.params.push(ParamMeta {
            name: name.to_string(),
            ty,
            optional: false,
        });
        self
    }

    pub fn optional(mut self, name: &str, ty: ValueType) -> Self {
        self.params.push(ParamMeta {
            name: name.to_string(),
            ty,
            optional: true,
        });
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn returns(mut self, ty: ValueType) -> Self {
        self.returns = ty;
        self
    }

    pub fn gas(mut self, cost: u64) -> Self {
        self.gas_cost = cost;
        self
    }

    pub fn layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn sync(self, handler: SyncHandler) -> OpcodeDefinition {
        OpcodeDefinition {
            meta: self,
            handler: Handler::Sync(handler),
        }
    }

    pub fn deferred(mut self, handler: DeferredHandler) -> OpcodeDefinition {
        self.deferred = true;
        OpcodeDefinition {
            meta: self,
            handler: Handler::Deferred(handler),
        }
    }

    pub fn min_args(&self) -> usize {
        self.params.iter().filter(|param| !param.optional).count()
    }

    pub fn max_args(&self) -> Option<usize> {
        (!self.variadic).then_some(self.params.len())
    }

    pub fn check_arity(&self, count: usize) -> ScriptResult<()> {
        let min = self.min_args();
        match self.max_args() {
            Some(max) if count < min || count > max => {
                let expected = if min == max {
                    format!("{min}")
                } else {
                    format!("{min} to {max}")
                };
                Err(ScriptError::type_mismatch(format!(
                    "'{}' expects {expected} argument(s), got {count}",
                    self.name
                )))
            }
            None if count < min => Err(ScriptError::type_mismatch(format!(
                "'{}' expects at least {min} argument(s), got {count}",
                self.name
            ))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_defaults_to_name_prefix() {
        assert_eq!(OpcodeMeta::new("list.push").category, "list");
        assert_eq!(OpcodeMeta::new("+").category, "core");
    }

    #[test]
    fn arity_follows_params() {
        let meta = OpcodeMeta::new("obj.get")
            .param("object", ValueType::Object)
            .param("key", ValueType::String)
            .optional("default", ValueType::Any);
        assert!(meta.check_arity(2).is_ok());
        assert!(meta.check_arity(3).is_ok());
        assert_eq!(meta.check_arity(1).unwrap_err().code_str(), "E104");
        assert!(meta.check_arity(4).is_err());

        let variadic = OpcodeMeta::new("+")
            .param("a", ValueType::Number)
            .param("b", ValueType::Number)
            .variadic();
        assert!(variadic.check_arity(5).is_ok());
        assert!(variadic.check_arity(1).is_err());
    }
}
