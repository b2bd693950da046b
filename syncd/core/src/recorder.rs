// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Append-only request/response recording for offline replay.
//!
//! One line per event: `timestamp|tag|payload`. The file mutex is
//! independent of the API mutex so a rotation request arriving from a
//! signal handler can never deadlock against request processing.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tracing::{error, info};

/// Operation tags of the recording format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordTag {
    Create,
    Remove,
    Set,
    Get,
    GetResponse,
    BulkCreate,
    BulkSet,
    NotifyRequest,
    NotifyResponse,
    Notification,
    Sleep,
    Comment,
}

impl fmt::Display for RecordTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            RecordTag::Create => "c",
            RecordTag::Remove => "r",
            RecordTag::Set => "s",
            RecordTag::Get => "g",
            RecordTag::GetResponse => "G",
            RecordTag::BulkCreate => "C",
            RecordTag::BulkSet => "S",
            RecordTag::NotifyRequest => "a",
            RecordTag::NotifyResponse => "A",
            RecordTag::Notification => "n",
            RecordTag::Sleep => "@",
            RecordTag::Comment => "#",
        };
        f.write_str(tag)
    }
}

pub struct Recorder {
    path: PathBuf,
    file: Mutex<Option<File>>,
    rotate_requested: AtomicBool,
}

impl Recorder {
    pub const FILE_NAME: &'static str = "sairedis.rec";

    /// Create a recorder writing into `dir`. Recording starts disabled when
    /// the file cannot be opened; the daemon keeps running either way.
    pub fn new(dir: &Path) -> Self {
        let path = dir.join(Self::FILE_NAME);
        let recorder = Self {
            file: Mutex::new(open_append(&path)),
            path,
            rotate_requested: AtomicBool::new(false),
        };
        recorder.record(RecordTag::Comment, "recording on");
        info!("started recording: {}", recorder.path.display());
        recorder
    }

    /// Disabled recorder; every record call is a no-op.
    pub fn disabled() -> Self {
        Self {
            path: PathBuf::new(),
            file: Mutex::new(None),
            rotate_requested: AtomicBool::new(false),
        }
    }

    /// Signal-safe: ask for the file to be reopened at the next write, to
    /// cooperate with external log rotation.
    pub fn request_rotate(&self) {
        self.rotate_requested.store(true, Ordering::Release);
    }

    pub fn record(&self, tag: RecordTag, payload: &str) {
        let mut guard = self.file.lock();

        let Some(file) = guard.as_mut() else {
            return;
        };

        if writeln!(file, "{}|{tag}|{payload}", timestamp()).is_err() {
            error!("failed to write recording line");
        }

        if self.rotate_requested.swap(false, Ordering::AcqRel) {
            *guard = open_append(&self.path);
            if let Some(file) = guard.as_mut() {
                let _ = writeln!(
                    file,
                    "{}|{}|logrotate on: {}",
                    timestamp(),
                    RecordTag::Comment,
                    self.path.display()
                );
            }
        }
    }

    /// `field=value|field=value` payload joiner used by the request tags.
    pub fn join_fields(fields: &[(String, String)]) -> String {
        fields
            .iter()
            .map(|(field, value)| format!("{field}={value}"))
            .collect::<Vec<_>>()
            .join("|")
    }
}

fn open_append(path: &Path) -> Option<File> {
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => Some(file),
        Err(err) => {
            error!("failed to open recording file {}: {err}", path.display());
            None
        }
    }
}

fn timestamp() -> String {
    // wall-clock with microsecond precision; the format only needs to be
    // monotonic enough for a human reading the replay
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:06}", now.as_secs(), now.subsec_micros())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_tagged_lines() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(dir.path());

        recorder.record(
            RecordTag::Create,
            &format!(
                "SAI_OBJECT_TYPE_SWITCH:oid:0x1|{}",
                Recorder::join_fields(&[("SAI_SWITCH_ATTR_INIT_SWITCH".into(), "true".into())])
            ),
        );
        recorder.record(RecordTag::NotifyRequest, "INIT_VIEW");

        let content = std::fs::read_to_string(dir.path().join(Recorder::FILE_NAME)).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3); // comment + two records
        assert!(lines[0].contains("|#|recording on"));
        assert!(lines[1].contains("|c|SAI_OBJECT_TYPE_SWITCH:oid:0x1|SAI_SWITCH_ATTR_INIT_SWITCH=true"));
        assert!(lines[2].ends_with("|a|INIT_VIEW"));
    }

    #[test]
    fn rotation_reopens_at_next_write() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(dir.path());
        let path = dir.path().join(Recorder::FILE_NAME);

        recorder.record(RecordTag::Set, "first");
        // simulate logrotate moving the file away
        std::fs::rename(&path, dir.path().join("sairedis.rec.1")).unwrap();
        recorder.request_rotate();
        recorder.record(RecordTag::Set, "second");
        recorder.record(RecordTag::Set, "third");

        let content = std::fs::read_to_string(&path).unwrap();
        // "second" still went to the renamed handle; the fresh file starts
        // with the rotation comment and carries "third"
        assert!(content.contains("|#|logrotate on"));
        assert!(content.contains("|s|third"));
        assert!(!content.contains("|s|second"));
    }

    #[test]
    fn disabled_recorder_is_a_no_op() {
        let recorder = Recorder::disabled();
        recorder.record(RecordTag::Get, "whatever");
        recorder.request_rotate();
    }
}
