use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use mockall::automock;
use reqwest::{
    blocking::{multipart, Response},
    Method,
};
use serde_derive::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::{
    project::{Instance, RemotePath},
    user::UserId,
};

pub const PATH_NOT_FOUND_ERR_CODE: u64 = 1003;
pub const SERVER_UNAVAILABLE_ERR_CODE: u64 = 5003;

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("Connection error")]
    ConnectionError,
    #[error("Timeout error")]
    TimeoutError,
    #[error("Asset server is unavailable")]
    ServerUnavailable,
    #[error("Remote path {0} not found")]
    NotFound(RemotePath),
    #[error("Invalid response: `{0}` (`{1}`)")]
    InvalidResponse(String, Value),
    #[error("Unknown error: `{0}`")]
    Unknown(String),
    #[error("Local file {0} error: {1}")]
    Io(PathBuf, String),
}

impl ClientError {
    fn from_code(error_code: u64, path: &RemotePath) -> Option<ClientError> {
        match error_code {
            PATH_NOT_FOUND_ERR_CODE => Some(ClientError::NotFound(path.clone())),
            SERVER_UNAVAILABLE_ERR_CODE => Some(ClientError::ServerUnavailable),
            _ => None,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(
            self,
            ClientError::ConnectionError | ClientError::TimeoutError | ClientError::ServerUnavailable
        )
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() {
            return Self::ConnectionError;
        }

        if error.is_timeout() {
            return Self::TimeoutError;
        }

        Self::Unknown(error.to_string())
    }
}

/// One node of the remote status tree. A folder node lists its children in
/// `references`; a file node has none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteNode {
    pub path: RemotePath,
    pub exists: bool,
    pub is_directory: bool,
    pub locked: bool,
    pub locked_by: Option<UserId>,
    pub locked_by_display: Option<String>,
    pub size: i64,
    pub deleted: bool,
    pub maximum_version: Option<u32>,
    pub references: BTreeMap<String, RemoteNode>,
}

impl RemoteNode {
    pub fn absent(path: RemotePath) -> Self {
        Self {
            path,
            exists: false,
            is_directory: false,
            locked: false,
            locked_by: None,
            locked_by_display: None,
            size: 0,
            deleted: false,
            maximum_version: None,
            references: BTreeMap::new(),
        }
    }

    /// A file is live when it exists, is not deleted and has content
    pub fn is_live_file(&self) -> bool {
        self.exists && !self.is_directory && !self.deleted && self.size > 0
    }

    pub fn directories(&self) -> impl Iterator<Item = &RemoteNode> {
        self.references
            .values()
            .filter(|node| node.is_directory && !node.deleted)
    }

    pub fn live_files(&self) -> impl Iterator<Item = &RemoteNode> {
        self.references.values().filter(|node| node.is_live_file())
    }
}

/// Reference entry as the asset server serializes it
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ReferenceData {
    #[serde(default)]
    pub is_directory: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub maximum_version_deleted: bool,
    #[serde(default)]
    pub maximum_version: Option<u32>,
    #[serde(default)]
    pub relative_path: Option<String>,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub locked_by: Option<String>,
    #[serde(default, rename = "lockedByDisplay")]
    pub locked_by_display: Option<String>,
    #[serde(default)]
    pub size: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct StatusMeta {
    #[serde(default)]
    pub status: String,
    #[serde(flatten)]
    pub reference: ReferenceData,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct StatusResponse {
    pub meta: StatusMeta,
    #[serde(default)]
    pub data: Option<BTreeMap<String, ReferenceData>>,
}

impl StatusResponse {
    pub fn into_node(self, path: &RemotePath) -> RemoteNode {
        let exists = self.meta.status.to_uppercase() == "OK";
        let mut node = reference_node(path.clone(), &self.meta.reference);
        node.exists = exists;
        if let Some(data) = self.data {
            node.is_directory = true;
            for (raw_name, reference) in data {
                // Server may answer with nested names ("a/b"), only last part is the name
                let name = raw_name
                    .rsplit('/')
                    .next()
                    .unwrap_or(raw_name.as_str())
                    .to_string();
                let child = reference_node(path.join(&name), &reference);
                node.references.insert(name, child);
            }
        }
        node
    }
}

fn reference_node(path: RemotePath, reference: &ReferenceData) -> RemoteNode {
    RemoteNode {
        path,
        exists: true,
        is_directory: reference.is_directory,
        locked: reference.locked,
        locked_by: reference.locked_by.as_deref().map(UserId::from),
        locked_by_display: reference.locked_by_display.clone(),
        size: reference.size,
        deleted: reference.deleted || reference.maximum_version_deleted,
        maximum_version: reference.maximum_version,
        references: BTreeMap::new(),
    }
}

/// Operations the asset server offers to a logged user
#[automock]
pub trait ArtellaClient: Send + Sync {
    fn user(&self) -> UserId;
    fn status(&self, path: &RemotePath) -> Result<RemoteNode, ClientError>;
    /// Take the lock on `path` for current user. The server grants it even
    /// when another user holds it: ownership checks are the caller's job.
    fn lock(&self, path: &RemotePath) -> Result<(), ClientError>;
    fn unlock(&self, path: &RemotePath) -> Result<(), ClientError>;
    /// Write remote file content into `destination`, return written bytes count
    fn download(&self, path: &RemotePath, destination: &Path) -> Result<u64, ClientError>;
    /// Store `source` as a new working version of `path`, return the new version
    fn upload(&self, source: &Path, path: &RemotePath, comment: &str)
        -> Result<u32, ClientError>;
}

/// Asset server client speaking to the server HTTP endpoint
pub struct Artella {
    base_address: String,
    client: reqwest::blocking::Client,
    username: String,
    password: String,
}

impl Artella {
    pub fn new(instance: &Instance, timeout: Option<Duration>) -> Result<Self, ClientError> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            base_address: instance.url(None),
            client: builder.build()?,
            username: instance.username.clone(),
            password: instance.password.clone(),
        })
    }

    fn command_url(&self, command: &str) -> String {
        format!("{}do/{}", self.base_address, command)
    }

    fn file_url(&self, path: &RemotePath) -> String {
        format!("{}files/{}", self.base_address, path)
    }

    fn command(&self, command: &str, path: &RemotePath) -> Result<Response, ClientError> {
        Ok(self
            .client
            .request(Method::POST, self.command_url(command))
            .basic_auth(self.username.clone(), Some(self.password.clone()))
            .json(&json!({ "cms_uri": path.cms_uri() }))
            .send()?)
    }

    fn no_content(&self, response: Response, path: &RemotePath) -> Result<(), ClientError> {
        match response.status().as_u16() {
            200 | 204 => Ok(()),
            _ => Err(self.response_error(response, path)?),
        }
    }

    fn response_error(
        &self,
        response: Response,
        path: &RemotePath,
    ) -> Result<ClientError, ClientError> {
        let status_code = response.status().as_u16();
        if status_code == 503 {
            return Ok(ClientError::ServerUnavailable);
        }

        let content_value = response.json::<Value>()?;
        let error_code = content_value["code"]
            .as_u64()
            .ok_or(ClientError::InvalidResponse(
                "Response code is not an integer".to_string(),
                content_value["code"].clone(),
            ))?;

        if let Some(error) = ClientError::from_code(error_code, path) {
            return Ok(error);
        }

        if let Some(message) = content_value["message"].as_str() {
            return Ok(ClientError::Unknown(message.to_string()));
        }

        Ok(ClientError::Unknown(format!(
            "Unexpected response status {}",
            status_code
        )))
    }
}

impl ArtellaClient for Artella {
    fn user(&self) -> UserId {
        UserId(self.username.clone())
    }

    fn status(&self, path: &RemotePath) -> Result<RemoteNode, ClientError> {
        let response = self.command("status", path)?;
        match response.status().as_u16() {
            200 => Ok(response.json::<StatusResponse>()?.into_node(path)),
            _ => match self.response_error(response, path)? {
                ClientError::NotFound(path) => Ok(RemoteNode::absent(path)),
                error => Err(error),
            },
        }
    }

    fn lock(&self, path: &RemotePath) -> Result<(), ClientError> {
        let response = self.command("lock", path)?;
        self.no_content(response, path)
    }

    fn unlock(&self, path: &RemotePath) -> Result<(), ClientError> {
        let response = self.command("unlock", path)?;
        self.no_content(response, path)
    }

    fn download(&self, path: &RemotePath, destination: &Path) -> Result<u64, ClientError> {
        let mut response = self
            .client
            .request(Method::GET, self.file_url(path))
            .basic_auth(self.username.clone(), Some(self.password.clone()))
            .send()?;
        if response.status().as_u16() != 200 {
            return Err(self.response_error(response, path)?);
        }

        let mut out = fs::File::create(destination).map_err(|error| {
            ClientError::Io(
                destination.to_path_buf(),
                format!("Error when open or create file: {}", error),
            )
        })?;
        io::copy(&mut response, &mut out).map_err(|error| {
            ClientError::Io(
                destination.to_path_buf(),
                format!("Error when fill file: {}", error),
            )
        })
    }

    fn upload(
        &self,
        source: &Path,
        path: &RemotePath,
        comment: &str,
    ) -> Result<u32, ClientError> {
        let form = multipart::Form::new()
            .text("comment", comment.to_string())
            .file("files", source)
            .map_err(|error| {
                ClientError::Io(
                    source.to_path_buf(),
                    format!("Error during preparation of form: {}", error),
                )
            })?;

        let response = self
            .client
            .request(Method::POST, self.file_url(path))
            .basic_auth(self.username.clone(), Some(self.password.clone()))
            .multipart(form)
            .send()?;

        match response.status().as_u16() {
            200 => {
                let value = response.json::<Value>()?;
                let version = value["version"]
                    .as_u64()
                    .ok_or(ClientError::InvalidResponse(
                        "Response version is not an integer".to_string(),
                        value.clone(),
                    ))?;
                Ok(version as u32)
            }
            _ => Err(self.response_error(response, path)?),
        }
    }
}
