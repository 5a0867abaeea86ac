use std::path::Path;

use id3::frame::{ExtendedText, Picture, PictureType};
use id3::{ErrorKind, Tag, TagLike, Timestamp, Version};

use crate::errors::SyncError;
use crate::sources::{AudioTags, CoverChange, TagCodec, TagUpdate};

/// Description of the TXXX frame holding the JSON record
pub const METADATA_FRAME: &str = "metadata";

#[derive(Debug, Clone, Copy, Default)]
pub struct Id3Codec;

/// Existing tag of `path`, a fresh one when the file has none
fn read_tag(path: &Path) -> Result<Tag, SyncError> {
    match Tag::read_from_path(path) {
        Ok(tag) => Ok(tag),
        Err(e) if matches!(e.kind, ErrorKind::NoTag) => Ok(Tag::new()),
        Err(e) => Err(SyncError::AudioTag(format!("Failed to read ID3 tags of '{}': {e}", path.display()))),
    }
}

impl TagCodec for Id3Codec {
    fn read(&self, path: &Path) -> Result<AudioTags, SyncError> {
        if !path.is_file() {
            return Err(SyncError::AudioTag(format!("Not a file: '{}'", path.display())));
        }
        let tag = read_tag(path)?;
        let metadata = tag
            .extended_texts()
            .find(|t| t.description == METADATA_FRAME)
            .map(|t| t.value.clone());
        let has_cover = tag.pictures().any(|p| p.picture_type == PictureType::CoverFront);

        Ok(AudioTags {
            metadata,
            title: tag.title().map(str::to_string),
            artist: tag.artist().map(str::to_string),
            album: tag.album().map(str::to_string),
            date: tag.date_recorded().map(|d| d.to_string()),
            has_cover,
        })
    }

    fn write(&self, path: &Path, update: &TagUpdate) -> Result<(), SyncError> {
        if update.is_empty() {
            return Ok(());
        }
        let mut tag = read_tag(path)?;

        if let Some(metadata) = &update.metadata {
            tag.remove_extended_text(Some(METADATA_FRAME), None);
            tag.add_frame(ExtendedText {
                description: METADATA_FRAME.to_string(),
                value: metadata.clone(),
            });
        }
        if let Some(title) = &update.title {
            tag.set_title(title);
        }
        if let Some(artist) = &update.artist {
            tag.set_artist(artist);
        }
        if let Some(album) = &update.album {
            tag.set_album(album);
        }
        if let Some(date) = &update.date {
            let ts: Timestamp = date
                .parse()
                .map_err(|_| SyncError::AudioTag(format!("Invalid recording date '{date}'")))?;
            tag.set_date_recorded(ts);
        }
        match &update.cover {
            Some(CoverChange::Set(data)) => {
                tag.remove_picture_by_type(PictureType::CoverFront);
                tag.add_frame(Picture {
                    mime_type: "image/png".to_string(),
                    picture_type: PictureType::CoverFront,
                    description: String::new(),
                    data: data.clone(),
                });
            }
            Some(CoverChange::Remove) => tag.remove_picture_by_type(PictureType::CoverFront),
            None => {}
        }

        tag.write_to_path(path, Version::Id3v24)
            .map_err(|e| SyncError::AudioTag(format!("Failed to write ID3 tags: {e}")))?;
        Ok(())
    }

    fn cover(&self, path: &Path) -> Result<Option<Vec<u8>>, SyncError> {
        let tag = read_tag(path)?;
        let cover = tag
            .pictures()
            .find(|p| p.picture_type == PictureType::CoverFront)
            .map(|p| p.data.clone());
        Ok(cover)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn blank_mp3(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("song.mp3");
        std::fs::write(&path, vec![0u8; 1024]).unwrap();
        path
    }

    #[test]
    fn test_untagged_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let path = blank_mp3(&dir);
        assert_eq!(Id3Codec.read(&path).unwrap(), AudioTags::default());
        assert!(Id3Codec.read(&dir.path().join("missing.mp3")).is_err());
    }

    #[test]
    fn test_write_and_read_frames() {
        let dir = TempDir::new().unwrap();
        let path = blank_mp3(&dir);
        let update = TagUpdate {
            metadata: Some(r#"{"video_id":"abc"}"#.to_string()),
            artist: Some("Artist ~ [a,b]".to_string()),
            album: Some("Public".to_string()),
            date: Some("2024-03-05".to_string()),
            cover: Some(CoverChange::Set(vec![1, 2, 3])),
            ..Default::default()
        };
        Id3Codec.write(&path, &update).unwrap();

        let tags = Id3Codec.read(&path).unwrap();
        assert_eq!(tags.metadata.as_deref(), Some(r#"{"video_id":"abc"}"#));
        assert_eq!(tags.artist.as_deref(), Some("Artist ~ [a,b]"));
        assert_eq!(tags.album.as_deref(), Some("Public"));
        assert_eq!(tags.date.as_deref(), Some("2024-03-05"));
        assert!(tags.has_cover);
        assert_eq!(Id3Codec.cover(&path).unwrap(), Some(vec![1, 2, 3]));

        Id3Codec
            .write(
                &path,
                &TagUpdate {
                    metadata: Some("{}".to_string()),
                    cover: Some(CoverChange::Remove),
                    ..Default::default()
                },
            )
            .unwrap();
        let tags = Id3Codec.read(&path).unwrap();
        assert_eq!(tags.metadata.as_deref(), Some("{}"));
        assert!(!tags.has_cover);
        assert_eq!(tags.artist.as_deref(), Some("Artist ~ [a,b]"));
    }
}
