//=====================================================
// File: capability/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Capability lookup and typed capability handles
// Objective: Find tokens held by an acting entity and expose exactly the
//            operations each capability type grants
//=====================================================

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde_json::{Value as JsonValue, json};
use tokio::fs;

use crate::errors::{ScriptError, ScriptResult};
use crate::store::{Capability, EntityId, EntityStore, Props};

pub const ENTITY_CONTROL: &str = "entity.control";
pub const SYS_CREATE: &str = "sys.create";
pub const SYS_MINT: &str = "sys.mint";
pub const FS_READ: &str = "fs.read";
pub const FS_WRITE: &str = "fs.write";

const WILDCARD: &str = "*";

//==================================================
// Section 1.0 - Handles
//==================================================

#[derive(Debug, Clone, PartialEq)]
pub enum TargetScope {
    Any,
    Entity(EntityId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathScope {
    Any,
    Root(PathBuf),
}

/// Operations a capability grants, fixed when the handle is resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityKind {
    /// `update`, `set_prototype` on the scoped target.
    EntityControl(TargetScope),
    /// `create`.
    SysCreate,
    /// `mint` of capability types under `namespace`.
    SysMint { namespace: String },
    /// `read`, `list`, `stat`, `exists` under the scoped root.
    FsRead(PathScope),
    /// `write` under the scoped root.
    FsWrite(PathScope),
    /// Unknown type: inspectable, grants nothing.
    Inert,
}

#[derive(Debug, Clone)]
pub struct CapabilityHandle {
    record: Capability,
    kind: CapabilityKind,
}

impl CapabilityHandle {
    pub fn from_record(record: Capability) -> Self {
        let kind = match record.cap_type.as_str() {
            ENTITY_CONTROL => CapabilityKind::EntityControl(target_scope(&record.params)),
            SYS_CREATE => CapabilityKind::SysCreate,
            SYS_MINT => CapabilityKind::SysMint {
                namespace: if is_wildcard(&record.params) {
                    WILDCARD.to_string()
                } else {
                    record
                        .params
                        .get("namespace")
                        .and_then(JsonValue::as_str)
                        .unwrap_or_default()
                        .to_string()
                },
            },
            FS_READ => CapabilityKind::FsRead(path_scope(&record.params)),
            FS_WRITE => CapabilityKind::FsWrite(path_scope(&record.params)),
            _ => CapabilityKind::Inert,
        };
        Self { record, kind }
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn owner(&self) -> EntityId {
        self.record.owner_id
    }

    pub fn cap_type(&self) -> &str {
        &self.record.cap_type
    }

    pub fn params(&self) -> &Props {
        &self.record.params
    }

    pub fn kind(&self) -> &CapabilityKind {
        &self.kind
    }

    /// Read-only wire view; it cannot be turned back into a handle.
    pub fn view(&self) -> JsonValue {
        json!({
            "id": self.record.id,
            "owner_id": self.record.owner_id,
            "type": self.record.cap_type,
            "params": self.record.params,
        })
    }

    pub fn authorize_entity_control(&self, target: EntityId) -> ScriptResult<()> {
        match &self.kind {
            CapabilityKind::EntityControl(TargetScope::Any) => Ok(()),
            CapabilityKind::EntityControl(TargetScope::Entity(id)) if *id == target => Ok(()),
            CapabilityKind::EntityControl(_) => Err(ScriptError::denied(format!(
                "{} does not cover entity {target}",
                self.id()
            ))),
            _ => Err(self.wrong_type(ENTITY_CONTROL)),
        }
    }

    pub fn authorize_create(&self) -> ScriptResult<()> {
        match self.kind {
            CapabilityKind::SysCreate => Ok(()),
            _ => Err(self.wrong_type(SYS_CREATE)),
        }
    }

    pub fn authorize_mint(&self, cap_type: &str) -> ScriptResult<()> {
        match &self.kind {
            CapabilityKind::SysMint { namespace }
                if namespace == WILDCARD || in_namespace(cap_type, namespace) =>
            {
                Ok(())
            }
            CapabilityKind::SysMint { namespace } => Err(ScriptError::denied(format!(
                "mint namespace '{namespace}' does not cover '{cap_type}'"
            ))),
            _ => Err(self.wrong_type(SYS_MINT)),
        }
    }

    /// Check a read against the scoped root and return the normalized path.
    pub fn authorize_fs_read(&self, path: &str) -> ScriptResult<PathBuf> {
        match &self.kind {
            CapabilityKind::FsRead(scope) => authorize_path(scope, path),
            _ => Err(self.wrong_type(FS_READ)),
        }
    }

    pub fn authorize_fs_write(&self, path: &str) -> ScriptResult<PathBuf> {
        match &self.kind {
            CapabilityKind::FsWrite(scope) => authorize_path(scope, path),
            _ => Err(self.wrong_type(FS_WRITE)),
        }
    }

    /// Resolve symlinks in an authorized path and check it still lies
    /// under the scoped root. Returns the resolved path.
    pub async fn confine(&self, path: PathBuf) -> ScriptResult<PathBuf> {
        let root = match &self.kind {
            CapabilityKind::FsRead(PathScope::Root(root))
            | CapabilityKind::FsWrite(PathScope::Root(root)) => root,
            _ => return Ok(path),
        };
        let real_root = resolve_existing(root).await?;
        let real = resolve_existing(&path).await?;
        if real.starts_with(&real_root) {
            Ok(real)
        } else {
            Err(ScriptError::denied(format!(
                "path '{}' resolves outside '{}'",
                path.display(),
                root.display()
            )))
        }
    }

    fn wrong_type(&self, expected: &str) -> ScriptError {
        ScriptError::denied(format!(
            "{expected} required, got {} capability {}",
            self.cap_type(),
            self.id()
        ))
    }
}

/// `fs` covers `fs` and `fs.read`, never `fsx`.
fn in_namespace(cap_type: &str, namespace: &str) -> bool {
    !namespace.is_empty()
        && cap_type
            .strip_prefix(namespace)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}

fn is_wildcard(params: &Props) -> bool {
    params.get(WILDCARD).and_then(JsonValue::as_bool) == Some(true)
}

fn target_scope(params: &Props) -> TargetScope {
    if is_wildcard(params) {
        return TargetScope::Any;
    }
    // A target-less, non-wildcard grant matches no entity.
    match params.get("target_id").and_then(JsonValue::as_f64) {
        Some(id) if id >= 0.0 && id.fract() == 0.0 => TargetScope::Entity(id as EntityId),
        _ => TargetScope::Entity(0),
    }
}

fn path_scope(params: &Props) -> PathScope {
    if is_wildcard(params) {
        return PathScope::Any;
    }
    match params.get("path").and_then(JsonValue::as_str) {
        Some(root) => PathScope::Root(normalize(Path::new(root)).unwrap_or_default()),
        None => PathScope::Root(PathBuf::new()),
    }
}

/// Lexically normalize, refusing any `..` component.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => return None,
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    Some(out)
}

fn authorize_path(scope: &PathScope, requested: &str) -> ScriptResult<PathBuf> {
    let path = normalize(Path::new(requested))
        .ok_or_else(|| ScriptError::denied(format!("path '{requested}' escapes its root")))?;
    match scope {
        PathScope::Any => Ok(path),
        PathScope::Root(root) if !root.as_os_str().is_empty() && path.starts_with(root) => Ok(path),
        PathScope::Root(root) => Err(ScriptError::denied(format!(
            "path '{requested}' is outside '{}'",
            root.display()
        ))),
    }
}

/// The deepest existing ancestor of `path` resolved through symlinks,
/// with the not-yet-existing remainder appended.
async fn resolve_existing(path: &Path) -> ScriptResult<PathBuf> {
    let absolute = std::path::absolute(path)
        .map_err(|err| ScriptError::runtime(format!("{}: {err}", path.display())))?;
    let mut existing = absolute.as_path();
    let mut rest = Vec::new();
    loop {
        match fs::canonicalize(existing).await {
            Ok(real) => return Ok(rest.iter().rev().fold(real, |acc, part| acc.join(part))),
            // Present but unresolvable: a dangling link could point anywhere.
            Err(_) if fs::symlink_metadata(existing).await.is_ok() => {
                return Err(ScriptError::denied(format!(
                    "'{}' is an unresolvable link",
                    existing.display()
                )));
            }
            Err(_) => {}
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name);
                existing = parent;
            }
            _ => return Ok(absolute.clone()),
        }
    }
}

//==================================================
// Section 2.0 - Resolver
//==================================================

#[derive(Clone)]
pub struct CapabilityResolver {
    store: Arc<dyn EntityStore>,
}

impl CapabilityResolver {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Find a capability of `cap_type` held by `acting` whose filter covers
    /// `filter`. A target-specific match wins over a wildcard one.
    pub fn get_capability(
        &self,
        acting: EntityId,
        cap_type: &str,
        filter: &Props,
    ) -> ScriptResult<Option<CapabilityHandle>> {
        let mut wildcard = None;
        for capability in self.store.get_capabilities(acting)? {
            if capability.cap_type != cap_type {
                continue;
            }
            if is_wildcard(&capability.params) {
                wildcard.get_or_insert(capability);
            } else if filter_matches(&capability.params, filter) {
                return Ok(Some(CapabilityHandle::from_record(capability)));
            }
        }
        Ok(wildcard.map(CapabilityHandle::from_record))
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }
}

/// Every key in `query` must be present in `stored` with an equal value.
fn filter_matches(stored: &Props, query: &Props) -> bool {
    query.iter().all(|(key, expected)| {
        stored
            .get(key)
            .is_some_and(|actual| json_equal(actual, expected))
    })
}

/// JSON equality treating `5` and `5.0` as the same number.
pub(crate) fn json_equal(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => x.as_f64() == y.as_f64(),
        (JsonValue::Array(x), JsonValue::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| json_equal(a, b))
        }
        (JsonValue::Object(x), JsonValue::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(key, value)| y.get(key).is_some_and(|other| json_equal(value, other)))
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn props(value: JsonValue) -> Props {
        value.as_object().cloned().unwrap_or_default()
    }

    fn resolver_with(caps: &[(&str, JsonValue)]) -> (CapabilityResolver, EntityId) {
        let store = Arc::new(MemoryStore::new());
        let owner = store.create_entity(Props::new(), None).unwrap();
        for (cap_type, params) in caps {
            store
                .create_capability(owner, cap_type, props(params.clone()))
                .unwrap();
        }
        (CapabilityResolver::new(store), owner)
    }

    #[test]
    fn target_specific_beats_wildcard() {
        let (resolver, owner) = resolver_with(&[
            (ENTITY_CONTROL, json!({"*": true})),
            (ENTITY_CONTROL, json!({"target_id": 7})),
        ]);
        let handle = resolver
            .get_capability(owner, ENTITY_CONTROL, &props(json!({"target_id": 7.0})))
            .unwrap()
            .expect("capability");
        assert_eq!(handle.kind(), &CapabilityKind::EntityControl(TargetScope::Entity(7)));
    }

    #[test]
    fn wildcard_covers_unlisted_targets() {
        let (resolver, owner) = resolver_with(&[(ENTITY_CONTROL, json!({"*": true}))]);
        let handle = resolver
            .get_capability(owner, ENTITY_CONTROL, &props(json!({"target_id": 3})))
            .unwrap()
            .expect("wildcard");
        assert!(handle.authorize_entity_control(99).is_ok());
    }

    #[test]
    fn mismatched_filter_finds_nothing() {
        let (resolver, owner) = resolver_with(&[(FS_READ, json!({"path": "/srv"}))]);
        let found = resolver
            .get_capability(owner, FS_READ, &props(json!({"path": "/etc"})))
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn fs_scope_refuses_escape() {
        let (resolver, owner) = resolver_with(&[(FS_WRITE, json!({"path": "/srv/data"}))]);
        let handle = resolver
            .get_capability(owner, FS_WRITE, &Props::new())
            .unwrap()
            .expect("handle");
        assert!(handle.authorize_fs_write("/srv/data/notes.txt").is_ok());
        assert!(handle.authorize_fs_write("/srv/data/../secrets").is_err());
        assert!(handle.authorize_fs_write("/srv/other").is_err());
        assert!(handle.authorize_fs_read("/srv/data/notes.txt").is_err());
    }

    #[test]
    fn mint_namespace_stops_at_a_dot() {
        let (resolver, owner) = resolver_with(&[(SYS_MINT, json!({"namespace": "fs"}))]);
        let handle = resolver
            .get_capability(owner, SYS_MINT, &Props::new())
            .unwrap()
            .expect("handle");
        assert!(handle.authorize_mint("fs").is_ok());
        assert!(handle.authorize_mint("fs.read").is_ok());
        assert!(handle.authorize_mint("fsx.anything").is_err());
        assert!(handle.authorize_mint("fsread").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn confine_follows_links_out_of_the_root() {
        let granted = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), granted.path().join("link")).unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("missing"),
            granted.path().join("dangling"),
        )
        .unwrap();
        let root = granted.path().to_string_lossy().into_owned();
        let (resolver, owner) = resolver_with(&[(FS_WRITE, json!({"path": root}))]);
        let handle = resolver
            .get_capability(owner, FS_WRITE, &Props::new())
            .unwrap()
            .expect("handle");

        let inside = handle
            .authorize_fs_write(&format!("{root}/new/file.txt"))
            .unwrap();
        assert!(handle.confine(inside).await.is_ok());
        for escaping in ["link/x.txt", "dangling"] {
            let path = handle
                .authorize_fs_write(&format!("{root}/{escaping}"))
                .unwrap();
            let err = handle.confine(path).await.unwrap_err();
            assert_eq!(err.code_str(), "E201");
        }
    }
}
