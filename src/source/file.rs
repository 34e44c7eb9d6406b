//! # File-backed code source.
//!
//! [`CodeFile`] reads one code per line from a file through a buffered async
//! reader. Blank lines are skipped; every other line is decoded with
//! [`parse_line`]. [`FileOpener`] is the matching [`SourceOpener`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

use super::source::{CodeSource, SourceOpener};
use crate::codes::{Code, CodeChannel, parse_line};
use crate::error::{OpenError, ReadError};

/// Code source reading from a file on disk.
#[derive(Debug)]
pub struct CodeFile {
    path: PathBuf,
    channel: CodeChannel,
    lines: Option<Lines<BufReader<File>>>,
    line: u64,
    position: u64,
}

impl CodeFile {
    /// Opens `path` for reading codes on `channel`.
    pub fn open(path: impl AsRef<Path>, channel: CodeChannel) -> Result<Self, OpenError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| OpenError::from_io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            channel,
            lines: Some(BufReader::new(File::from_std(file)).lines()),
            line: 0,
            position: 0,
        })
    }

    /// Physical path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of lines consumed so far.
    pub fn line_number(&self) -> u64 {
        self.line
    }
}

#[async_trait]
impl CodeSource for CodeFile {
    async fn read_code(&mut self) -> Result<Option<Code>, ReadError> {
        loop {
            let Some(lines) = self.lines.as_mut() else {
                return Ok(None);
            };
            let Some(text) = lines.next_line().await? else {
                return Ok(None);
            };

            self.line += 1;
            let offset = self.position;
            self.position += text.len() as u64 + 1;

            match parse_line(&text, self.channel) {
                Ok(Some(mut code)) => {
                    code.file_position = Some(offset);
                    return Ok(Some(code));
                }
                Ok(None) => continue,
                Err(message) => {
                    return Err(ReadError::Parse {
                        line: self.line,
                        message,
                    });
                }
            }
        }
    }

    fn close(&mut self) {
        self.lines = None;
    }

    fn is_closed(&self) -> bool {
        self.lines.is_none()
    }
}

/// Opens [`CodeFile`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileOpener;

impl SourceOpener for FileOpener {
    fn open(&self, path: &Path, channel: CodeChannel) -> Result<Box<dyn CodeSource>, OpenError> {
        Ok(Box::new(CodeFile::open(path, channel)?))
    }
}
