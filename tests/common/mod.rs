//! Shared test utilities and fixtures
//!
//! Event files are written as newline-delimited JSON, the same shape the
//! build tool produces with `--build_event_json_file`.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use tempfile::TempDir;
use url::Url;

/// Temporary directory acting as workspace and output store.
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn root(&self) -> String {
        self.path().display().to_string()
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    /// `file://` URI of a file in the fixture (which need not exist).
    pub fn uri(&self, name: &str) -> String {
        Url::from_file_path(self.path().join(name))
            .unwrap()
            .to_string()
    }

    pub fn events(&self, lines: &[Value]) -> PathBuf {
        let text: String = lines.iter().map(|line| format!("{line}\n")).collect();
        self.write("events.json", &text)
    }
}

pub fn started(workspace: &str, start_millis: &str) -> Value {
    json!({
        "id": { "started": { "uuid": "0c6f6a10" } },
        "started": {
            "uuid": "0c6f6a10",
            "startTimeMillis": start_millis,
            "command": "build",
            "buildToolVersion": "7.1.0",
            "workspaceDirectory": workspace,
        },
    })
}

pub fn action(label: &str, mnemonic: &str, success: bool, stderr_uri: Option<&str>) -> Value {
    let exit_code = i32::from(!success);
    let mut action = json!({
        "success": success,
        "label": label,
        "type": mnemonic,
        "exitCode": exit_code,
    });
    if let Some(uri) = stderr_uri {
        action["stderr"] = json!({ "name": "stderr", "uri": uri });
    }
    json!({ "id": { "actionCompleted": { "label": label } }, "action": action })
}

pub fn named_set(id: &str, files: &[(&str, &str)]) -> Value {
    let files: Vec<Value> = files
        .iter()
        .map(|(name, uri)| json!({ "name": name, "uri": uri }))
        .collect();
    json!({
        "id": { "namedSet": { "id": id } },
        "namedSetOfFiles": { "files": files },
    })
}

pub fn configured(label: &str, kind: &str) -> Value {
    json!({
        "id": { "targetConfigured": { "label": label } },
        "configured": { "targetKind": kind },
    })
}

pub fn completed(label: &str, success: bool, file_set: &str) -> Value {
    json!({
        "id": { "targetCompleted": { "label": label } },
        "completed": {
            "success": success,
            "outputGroup": [{ "name": "default", "fileSets": [{ "id": file_set }] }],
        },
    })
}

pub fn finished(code: i32, finish_millis: &str) -> Value {
    let name = if code == 0 { "SUCCESS" } else { "BUILD_FAILURE" };
    json!({
        "id": { "buildFinished": {} },
        "finished": {
            "exitCode": { "name": name, "code": code },
            "finishTimeMillis": finish_millis,
        },
    })
}
