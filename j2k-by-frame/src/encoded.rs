use crate::error::{Error, Result};
use crate::socket::{Socket, SOCKET_TIMEOUT};
use log::debug;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Where a codestream came from. Both kinds own their buffer outright;
/// the tag is kept for logging and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote,
}

/// A compressed J2K codestream for a single frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedData {
    data: Vec<u8>,
    origin: Origin,
}

impl EncodedData {
    pub fn local(data: Vec<u8>) -> Self {
        EncodedData {
            data,
            origin: Origin::Local,
        }
    }

    /// Allocate a zeroed buffer of `size` bytes to be filled from the network.
    pub fn remote(size: usize) -> Self {
        EncodedData {
            data: vec![0; size],
            origin: Origin::Remote,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// Publish this frame as `<dir>/<frame>.j2c`.
    ///
    /// The bytes go to a `.tmp` sibling first and are renamed into place once
    /// complete, so readers of the final path never see a partial file.
    pub fn write_to_file(&self, dir: &Path, frame: usize) -> Result<PathBuf> {
        let tmp = frame_out_path(dir, frame, true);
        let target = frame_out_path(dir, frame, false);

        let write = || -> std::io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(&self.data)?;
            file.sync_all()
        };
        write().map_err(|source| Error::WriteFile {
            path: tmp.clone(),
            source,
        })?;

        fs::rename(&tmp, &target).map_err(|source| Error::WriteFile {
            path: target.clone(),
            source,
        })?;
        debug!("Wrote frame {} ({} bytes) to {}", frame, self.size(), target.display());
        Ok(target)
    }

    /// Send as a NUL-terminated decimal length followed by the raw bytes.
    /// This is the response framing of the remote encode protocol.
    pub fn send(&self, socket: &mut Socket) -> Result<()> {
        let header = format!("{}\0", self.size());
        socket.write(header.as_bytes(), SOCKET_TIMEOUT)?;
        socket.write(&self.data, SOCKET_TIMEOUT)
    }
}

/// Path of the J2K file for `frame` in `dir`, or of its temporary twin.
pub fn frame_out_path(dir: &Path, frame: usize, tmp: bool) -> PathBuf {
    let name = if tmp {
        format!("{:08}.j2c.tmp", frame)
    } else {
        format!("{:08}.j2c", frame)
    };
    dir.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_paths() {
        let dir = Path::new("/films/j2c");
        assert_eq!(
            frame_out_path(dir, 42, false),
            PathBuf::from("/films/j2c/00000042.j2c")
        );
        assert_eq!(
            frame_out_path(dir, 42, true),
            PathBuf::from("/films/j2c/00000042.j2c.tmp")
        );
    }

    #[test]
    fn write_publishes_complete_file_and_removes_temporary() {
        let dir = tempfile::tempdir().unwrap();
        let encoded = EncodedData::local(vec![0xff, 0x4f, 0xff, 0x51, 1, 2, 3]);
        let path = encoded.write_to_file(dir.path(), 7).unwrap();
        assert_eq!(fs::read(&path).unwrap(), encoded.data());
        assert!(!frame_out_path(dir.path(), 7, true).exists());
    }

    #[test]
    fn interrupted_write_leaves_previous_version_intact() {
        let dir = tempfile::tempdir().unwrap();
        EncodedData::local(vec![1; 16])
            .write_to_file(dir.path(), 3)
            .unwrap();

        // A writer that died mid-write leaves only a truncated temporary file
        fs::write(frame_out_path(dir.path(), 3, true), [2; 5]).unwrap();
        assert_eq!(
            fs::read(frame_out_path(dir.path(), 3, false)).unwrap(),
            vec![1; 16]
        );

        EncodedData::local(vec![3; 32])
            .write_to_file(dir.path(), 3)
            .unwrap();
        assert_eq!(
            fs::read(frame_out_path(dir.path(), 3, false)).unwrap(),
            vec![3; 32]
        );
    }

    #[test]
    fn write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = EncodedData::local(vec![1])
            .write_to_file(&missing, 0)
            .unwrap_err();
        assert!(matches!(err, Error::WriteFile { .. }));
        assert!(!frame_out_path(&missing, 0, false).exists());
    }

    #[test]
    fn remote_buffer_is_preallocated() {
        let encoded = EncodedData::remote(1234);
        assert_eq!(encoded.size(), 1234);
        assert_eq!(encoded.origin(), Origin::Remote);
    }
}
