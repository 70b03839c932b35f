//! In-memory remote used by the engine, catalog and coordinator tests.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use futures_util::stream::{self, BoxStream, StreamExt};
use thiserror::Error;

use super::remote::{
    BINARY_MIME_TYPE, ListRequest, NewObject, RemoteFileEntry, RemotePage, RemoteStorage,
};

#[derive(Debug, Error)]
#[error("fake remote: {0}")]
pub struct FakeError(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCall {
    List { page_token: Option<String> },
    CreateFolder { name: String },
    CreateObject { sync_key: String },
    Update { id: String },
    Download { id: String },
}

#[derive(Debug, Clone)]
pub struct FakeObject {
    pub id: String,
    pub name: String,
    pub parent_id: String,
    pub sync_key: Option<String>,
    pub mime_type: String,
    pub modified_ms: i64,
    pub content: Vec<u8>,
    /// Overrides the checksum the listing reports; `None` means "computed".
    pub checksum: Option<Option<String>>,
    /// Overrides the size the listing reports.
    pub declared_size: Option<u64>,
}

#[derive(Default)]
struct FakeState {
    next_id: u64,
    objects: BTreeMap<String, FakeObject>,
    calls: Vec<FakeCall>,
    page_size: usize,
    fail_list_call: Option<usize>,
    list_calls: usize,
    failing_keys: HashSet<String>,
    failing_folder_lookups: HashSet<String>,
}

pub struct FakeRemote {
    state: Mutex<FakeState>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::with_page_size(100)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Mutex::new(FakeState {
                page_size: page_size.max(1),
                ..FakeState::default()
            }),
        }
    }

    pub fn add_folder(&self, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = next_id(&mut state, "folder");
        state.objects.insert(
            id.clone(),
            FakeObject {
                id: id.clone(),
                name: name.to_string(),
                parent_id: savesync_core::APP_DATA_SPACE.to_string(),
                sync_key: None,
                mime_type: savesync_core::FOLDER_MIME_TYPE.to_string(),
                modified_ms: 0,
                content: Vec::new(),
                checksum: None,
                declared_size: None,
            },
        );
        id
    }

    pub fn add_object(
        &self,
        folder: &str,
        sync_key: &str,
        content: &[u8],
        modified_ms: i64,
    ) -> String {
        let name = sync_key.rsplit('/').next().unwrap_or(sync_key).to_string();
        self.insert(FakeObject {
            id: String::new(),
            name,
            parent_id: folder.to_string(),
            sync_key: Some(sync_key.to_string()),
            mime_type: BINARY_MIME_TYPE.to_string(),
            modified_ms,
            content: content.to_vec(),
            checksum: None,
            declared_size: None,
        })
    }

    pub fn insert(&self, mut object: FakeObject) -> String {
        let mut state = self.state.lock().unwrap();
        let id = next_id(&mut state, "obj");
        object.id = id.clone();
        state.objects.insert(id.clone(), object);
        id
    }

    pub fn object(&self, id: &str) -> Option<FakeObject> {
        self.state.lock().unwrap().objects.get(id).cloned()
    }

    pub fn object_by_key(&self, folder: &str, sync_key: &str) -> Option<FakeObject> {
        self.state
            .lock()
            .unwrap()
            .objects
            .values()
            .find(|o| o.parent_id == folder && o.sync_key.as_deref() == Some(sync_key))
            .cloned()
    }

    pub fn folders_named(&self, name: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .objects
            .values()
            .filter(|o| o.mime_type == savesync_core::FOLDER_MIME_TYPE && o.name == name)
            .count()
    }

    pub fn fail_list_call(&self, call_number: usize) {
        self.state.lock().unwrap().fail_list_call = Some(call_number);
    }

    /// Makes the lookup of the folder called `name` fail.
    pub fn fail_folder_lookup(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_folder_lookups
            .insert(name.to_string());
    }

    /// Makes every transfer touching `sync_key` fail.
    pub fn fail_transfers_for(&self, sync_key: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_keys
            .insert(sync_key.to_string());
    }

    pub fn count_calls(&self, predicate: impl Fn(&FakeCall) -> bool) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| predicate(c))
            .count()
    }

    pub fn transfer_calls(&self) -> usize {
        self.count_calls(|c| {
            matches!(
                c,
                FakeCall::CreateObject { .. } | FakeCall::Update { .. } | FakeCall::Download { .. }
            )
        })
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }
}

impl Default for FakeRemote {
    fn default() -> Self {
        Self::new()
    }
}

fn next_id(state: &mut FakeState, prefix: &str) -> String {
    state.next_id += 1;
    format!("{prefix}-{}", state.next_id)
}

fn quoted_value(query: &str, prefix: &str) -> Option<String> {
    let rest = query.strip_prefix(prefix)?;
    let mut out = String::new();
    let mut chars = rest.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push(chars.next()?),
            '\'' => return Some(out),
            other => out.push(other),
        }
    }
    None
}

fn entry_for(object: &FakeObject) -> RemoteFileEntry {
    RemoteFileEntry {
        id: object.id.clone(),
        name: object.name.clone(),
        sync_key: object.sync_key.clone(),
        modified_ms: object.modified_ms,
        size: object
            .declared_size
            .unwrap_or(object.content.len() as u64),
        checksum: object
            .checksum
            .clone()
            .unwrap_or_else(|| Some(format!("{:x}", md5::compute(&object.content)))),
        parent_id: Some(object.parent_id.clone()),
    }
}

impl RemoteStorage for FakeRemote {
    type Error = FakeError;

    async fn list(&self, request: &ListRequest) -> Result<RemotePage, FakeError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(FakeCall::List {
            page_token: request.page_token.clone(),
        });
        state.list_calls += 1;
        if state.fail_list_call == Some(state.list_calls) {
            return Err(FakeError("list failed".into()));
        }

        let matching: Vec<&FakeObject> =
            if let Some(folder) = quoted_value(&request.query, "'") {
                state
                    .objects
                    .values()
                    .filter(|o| o.parent_id == folder && o.mime_type == BINARY_MIME_TYPE)
                    .collect()
            } else if let Some(name) = quoted_value(&request.query, "name = '") {
                if state.failing_folder_lookups.contains(&name) {
                    return Err(FakeError("folder lookup failed".into()));
                }
                state
                    .objects
                    .values()
                    .filter(|o| o.name == name && o.mime_type == savesync_core::FOLDER_MIME_TYPE)
                    .collect()
            } else {
                return Err(FakeError(format!("unsupported query: {}", request.query)));
            };

        let offset: usize = request
            .page_token
            .as_deref()
            .map(|token| token.parse().unwrap())
            .unwrap_or(0);
        let end = (offset + state.page_size).min(matching.len());
        let files = matching[offset.min(end)..end].iter().map(|o| entry_for(o)).collect();
        let next_page_token = (end < matching.len()).then(|| end.to_string());
        Ok(RemotePage {
            files,
            next_page_token,
        })
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<String, FakeError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(FakeCall::CreateFolder {
            name: name.to_string(),
        });
        let id = next_id(&mut state, "folder");
        state.objects.insert(
            id.clone(),
            FakeObject {
                id: id.clone(),
                name: name.to_string(),
                parent_id: parent_id.to_string(),
                sync_key: None,
                mime_type: savesync_core::FOLDER_MIME_TYPE.to_string(),
                modified_ms: 0,
                content: Vec::new(),
                checksum: None,
                declared_size: None,
            },
        );
        Ok(id)
    }

    async fn create_object(&self, object: &NewObject, source: &Path) -> Result<String, FakeError> {
        let content = std::fs::read(source).map_err(|err| FakeError(err.to_string()))?;
        let mut state = self.state.lock().unwrap();
        state.calls.push(FakeCall::CreateObject {
            sync_key: object.sync_key.clone(),
        });
        if state.failing_keys.contains(&object.sync_key) {
            return Err(FakeError(format!("upload of {} failed", object.sync_key)));
        }
        let id = next_id(&mut state, "obj");
        state.objects.insert(
            id.clone(),
            FakeObject {
                id: id.clone(),
                name: object.name.clone(),
                parent_id: object.parent_id.clone(),
                sync_key: Some(object.sync_key.clone()),
                mime_type: object.mime_type.clone(),
                modified_ms: object.modified_ms,
                content,
                checksum: None,
                declared_size: None,
            },
        );
        Ok(id)
    }

    async fn update_object(
        &self,
        id: &str,
        modified_ms: i64,
        source: &Path,
    ) -> Result<(), FakeError> {
        let content = std::fs::read(source).map_err(|err| FakeError(err.to_string()))?;
        let mut state = self.state.lock().unwrap();
        state.calls.push(FakeCall::Update { id: id.to_string() });
        let failing = state.failing_keys.clone();
        let object = state
            .objects
            .get_mut(id)
            .ok_or_else(|| FakeError(format!("no object {id}")))?;
        if object.sync_key.as_ref().is_some_and(|key| failing.contains(key)) {
            return Err(FakeError(format!("update of {id} failed")));
        }
        object.content = content;
        object.modified_ms = modified_ms;
        object.checksum = None;
        object.declared_size = None;
        Ok(())
    }

    async fn download_object(
        &self,
        id: &str,
    ) -> Result<BoxStream<'static, Result<Vec<u8>, FakeError>>, FakeError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(FakeCall::Download { id: id.to_string() });
        let object = state
            .objects
            .get(id)
            .ok_or_else(|| FakeError(format!("no object {id}")))?;
        if object
            .sync_key
            .as_ref()
            .is_some_and(|key| state.failing_keys.contains(key))
        {
            return Err(FakeError(format!("download of {id} failed")));
        }
        // Split into two chunks so writers see a multi-chunk body.
        let content = object.content.clone();
        let mid = content.len() / 2;
        let chunks = vec![Ok(content[..mid].to_vec()), Ok(content[mid..].to_vec())];
        Ok(stream::iter(chunks).boxed())
    }
}
