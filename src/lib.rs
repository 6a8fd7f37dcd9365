pub mod ast;
pub mod capability;
pub mod compiler;
pub mod config;
pub mod context;
pub mod engine;
pub mod errors;
pub mod interpreter;
pub mod library;
pub mod opcodes;
pub mod prototype;
pub mod store;
pub mod syntax;
pub mod value;

pub use compiler::{CompiledProgram, Compiler};
pub use config::{ConfigError, EngineConfig, ExecutionMode};
pub use context::{CollectingSink, GasMeter, Notification, NotificationSink, NullSink, ScriptContext};
pub use engine::Engine;
pub use errors::{ErrorCode, ScriptError, ScriptResult};
pub use interpreter::Interpreter;
pub use opcodes::{OpcodeMeta, OpcodeRegistry};
pub use store::{Capability, Entity, EntityId, EntityStore, MemoryStore, StoreError};
pub use syntax::{ParseError, decompile, transpile};
pub use value::Value;
