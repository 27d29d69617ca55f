//! Upload selection: which files may be sent, and where they go.
//!
//! A [`SelectedFile`] is a handle to a file on disk together with its
//! declared media type. Only media types on the [`ALLOWED_MEDIA_TYPES`]
//! list are accepted by the shell. Zip archives are ingested in bulk via
//! the folder endpoint; every other accepted type goes to the single-file
//! endpoint ([`UploadRoute`]).

use std::path::{Path, PathBuf};

pub const ZIP: &str = "application/zip";

/// Media types the client accepts for upload.
pub const ALLOWED_MEDIA_TYPES: &[&str] = &[
    ZIP,
    "application/pdf",
    "text/markdown",
    "text/plain",
    "application/msword",
    // .docx
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-powerpoint",
    // .pptx
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
];

pub fn is_allowed(media_type: &str) -> bool {
    ALLOWED_MEDIA_TYPES.contains(&media_type)
}

/// A file the user picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    /// Display name, also sent as the multipart file name.
    pub name: String,
    /// Declared media type.
    pub media_type: String,
    /// Location of the content on disk.
    pub path: PathBuf,
}

impl SelectedFile {
    pub fn new(
        name: impl Into<String>,
        media_type: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            path: path.into(),
        }
    }

    /// Build a handle from a path, declaring the media type from the
    /// file extension. Unknown extensions declare
    /// `application/octet-stream`, which is never accepted.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let media_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self::new(name, media_type, path)
    }

    pub fn is_archive(&self) -> bool {
        self.media_type == ZIP
    }

    pub fn route(&self) -> UploadRoute {
        if self.is_archive() {
            UploadRoute::Folder
        } else {
            UploadRoute::File
        }
    }
}

/// Ingest endpoint chosen for an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadRoute {
    /// Single document: `POST /ingest-file`, field `file`.
    File,
    /// Zip archive: `POST /ingest-folder`, field `folder`.
    Folder,
}

impl UploadRoute {
    pub fn path(self) -> &'static str {
        match self {
            UploadRoute::File => "/ingest-file",
            UploadRoute::Folder => "/ingest-folder",
        }
    }

    pub fn field(self) -> &'static str {
        match self {
            UploadRoute::File => "file",
            UploadRoute::Folder => "folder",
        }
    }
}

/// A routed upload handed to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub route: UploadRoute,
    pub file: SelectedFile,
}

impl Upload {
    pub fn new(file: SelectedFile) -> Self {
        Self {
            route: file.route(),
            file,
        }
    }
}
