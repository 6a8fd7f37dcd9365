//=====================================================
// File: library/fs.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Capability-scoped filesystem opcodes
// Objective: Read, list, stat and write host files under the root an
//            fs.read / fs.write capability names, without blocking the
//            invocation's task
//=====================================================

use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tokio::fs;

use crate::context::{LocalFuture, ScriptContext};
use crate::errors::{ScriptError, ScriptResult};
use crate::opcodes::{DeferredHandler, OpcodeMeta, OpcodeRegistry, RegistryError, ValueType};
use crate::value::Value;

use super::{capability_arg, string_arg};

pub(super) fn install(registry: &mut OpcodeRegistry) -> Result<(), RegistryError> {
    let readers: [(&str, &str, &str, ValueType, DeferredHandler); 4] = [
        ("fs.read", "Read File", "File contents as text.", ValueType::String, op_read),
        ("fs.list", "List Directory", "Sorted entry names of a directory.", ValueType::List, op_list),
        ("fs.stat", "Stat", "Size, kind and modification time.", ValueType::Object, op_stat),
        ("fs.exists", "Exists", "Whether the path exists.", ValueType::Boolean, op_exists),
    ];
    for (name, label, description, returns, handler) in readers {
        registry.register(
            OpcodeMeta::new(name)
                .label(label)
                .describe(description)
                .param("cap", ValueType::Capability)
                .param("path", ValueType::String)
                .returns(returns)
                .gas(10)
                .deferred(handler),
        )?;
    }
    registry.register(
        OpcodeMeta::new("fs.write")
            .label("Write File")
            .describe("Replace a file's contents with text.")
            .param("cap", ValueType::Capability)
            .param("path", ValueType::String)
            .param("content", ValueType::String)
            .returns(ValueType::Null)
            .gas(10)
            .deferred(op_write),
    )?;
    Ok(())
}

fn io_error(op: &str, path: &Path, err: io::Error) -> ScriptError {
    ScriptError::runtime(format!("{op}: {}: {err}", path.display()))
}

fn op_read(_ctx: &mut ScriptContext, args: Vec<Value>) -> LocalFuture<'_, ScriptResult<Value>> {
    Box::pin(run_read(args))
}

async fn run_read(args: Vec<Value>) -> ScriptResult<Value> {
    let capability = capability_arg("fs.read", &args[0])?;
    let path = capability
        .confine(capability.authorize_fs_read(string_arg("fs.read", &args[1])?)?)
        .await?;
    let text = fs::read_to_string(&path)
        .await
        .map_err(|err| io_error("fs.read", &path, err))?;
    Ok(Value::String(text))
}

fn op_list(_ctx: &mut ScriptContext, args: Vec<Value>) -> LocalFuture<'_, ScriptResult<Value>> {
    Box::pin(run_list(args))
}

async fn run_list(args: Vec<Value>) -> ScriptResult<Value> {
    let capability = capability_arg("fs.list", &args[0])?;
    let path = capability
        .confine(capability.authorize_fs_read(string_arg("fs.list", &args[1])?)?)
        .await?;
    let mut entries = fs::read_dir(&path)
        .await
        .map_err(|err| io_error("fs.list", &path, err))?;
    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|err| io_error("fs.list", &path, err))?
    {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(Value::list(names.into_iter().map(Value::from).collect()))
}

fn op_stat(_ctx: &mut ScriptContext, args: Vec<Value>) -> LocalFuture<'_, ScriptResult<Value>> {
    Box::pin(run_stat(args))
}

async fn run_stat(args: Vec<Value>) -> ScriptResult<Value> {
    let capability = capability_arg("fs.stat", &args[0])?;
    let path = capability
        .confine(capability.authorize_fs_read(string_arg("fs.stat", &args[1])?)?)
        .await?;
    let meta = fs::metadata(&path)
        .await
        .map_err(|err| io_error("fs.stat", &path, err))?;
    let modified = meta
        .modified()
        .ok()
        .map_or(Value::Null, |time| Value::from(DateTime::<Utc>::from(time).to_rfc3339()));
    let mut stat = IndexMap::new();
    stat.insert("size".to_string(), Value::from(meta.len()));
    stat.insert("is_dir".to_string(), Value::Bool(meta.is_dir()));
    stat.insert("is_file".to_string(), Value::Bool(meta.is_file()));
    stat.insert("modified".to_string(), modified);
    Ok(Value::object(stat))
}

fn op_exists(_ctx: &mut ScriptContext, args: Vec<Value>) -> LocalFuture<'_, ScriptResult<Value>> {
    Box::pin(run_exists(args))
}

async fn run_exists(args: Vec<Value>) -> ScriptResult<Value> {
    let capability = capability_arg("fs.exists", &args[0])?;
    let path = capability
        .confine(capability.authorize_fs_read(string_arg("fs.exists", &args[1])?)?)
        .await?;
    let exists = fs::try_exists(&path)
        .await
        .map_err(|err| io_error("fs.exists", &path, err))?;
    Ok(Value::Bool(exists))
}

fn op_write(_ctx: &mut ScriptContext, args: Vec<Value>) -> LocalFuture<'_, ScriptResult<Value>> {
    Box::pin(run_write(args))
}

async fn run_write(args: Vec<Value>) -> ScriptResult<Value> {
    let capability = capability_arg("fs.write", &args[0])?;
    let path = capability
        .confine(capability.authorize_fs_write(string_arg("fs.write", &args[1])?)?)
        .await?;
    let content = string_arg("fs.write", &args[2])?;
    fs::write(&path, content)
        .await
        .map_err(|err| io_error("fs.write", &path, err))?;
    Ok(Value::Null)
}
