use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Gateway method names. They mirror the Sandbox trait 1:1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Method {
    CreateSandbox,
    GetHomeDir,
    CreateSession,
    DeleteSession,
    ExecuteSessionCommand,
    GetSessionCommand,
    GetSessionCommandLogs,
    FileExists,
    CreateFolder,
    DeleteFile,
    UploadFile,
    DownloadFile,
    ListFiles,
    SearchFiles,
    GetPreviewLink,
    ExecuteCommand,
    Dispose,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateSandbox => "createSandbox",
            Self::GetHomeDir => "getHomeDir",
            Self::CreateSession => "createSession",
            Self::DeleteSession => "deleteSession",
            Self::ExecuteSessionCommand => "executeSessionCommand",
            Self::GetSessionCommand => "getSessionCommand",
            Self::GetSessionCommandLogs => "getSessionCommandLogs",
            Self::FileExists => "fileExists",
            Self::CreateFolder => "createFolder",
            Self::DeleteFile => "deleteFile",
            Self::UploadFile => "uploadFile",
            Self::DownloadFile => "downloadFile",
            Self::ListFiles => "listFiles",
            Self::SearchFiles => "searchFiles",
            Self::GetPreviewLink => "getPreviewLink",
            Self::ExecuteCommand => "executeCommand",
            Self::Dispose => "dispose",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of every gateway call. `uuid` identifies this client instance, the
/// gateway keys its sandbox by it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcRequest<'a> {
    pub method: Method,
    pub args: Vec<Value>,
    pub auth_token: Option<&'a str>,
    pub uuid: Uuid,
}
