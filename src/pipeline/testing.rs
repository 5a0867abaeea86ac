//! In-memory collaborators for stage and driver tests

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tempfile::TempDir;

use crate::classifier::Classifier;
use crate::config::Config;
use crate::database::Store;
use crate::errors::SyncError;
use crate::lyrics::LyricsQueryBuilder;
use crate::remix::SongQueryCleaner;
use crate::sources::ffmpeg::removed_duration;
use crate::sources::{
    AudioCutter, AudioTags, CoverChange, Extraction, LyricsSearch, SegmentLookup, Services, TagCodec,
    TagUpdate, ThumbnailSource, VideoSource,
};
use crate::types::VideoRecord;

use super::Context;

pub const FAKE_LYRICS: &str = "[00:10.00]hello\n[00:30.00]world";
pub const FAKE_DURATION: f64 = 200.0;

/// Tags kept in memory per path; the file itself must exist to be read
#[derive(Clone, Default)]
pub struct FakeCodec {
    files: Rc<RefCell<HashMap<PathBuf, (AudioTags, Option<Vec<u8>>)>>>,
    writes: Rc<Cell<u64>>,
}

impl FakeCodec {
    pub fn tags_of(&self, path: &Path) -> AudioTags {
        self.read(path).unwrap_or_default()
    }

    pub fn write_count(&self) -> u64 {
        self.writes.get()
    }
}

impl TagCodec for FakeCodec {
    fn read(&self, path: &Path) -> Result<AudioTags, SyncError> {
        if !path.is_file() {
            return Err(SyncError::AudioTag(format!("no such file '{}'", path.display())));
        }
        let files = self.files.borrow();
        let (tags, cover) = files.get(path).cloned().unwrap_or_default();
        Ok(AudioTags { has_cover: cover.is_some(), ..tags })
    }

    fn write(&self, path: &Path, update: &TagUpdate) -> Result<(), SyncError> {
        let mut files = self.files.borrow_mut();
        let (tags, cover) = files.entry(path.to_path_buf()).or_default();
        macro_rules! take {
            ($($field:ident),*) => {
                $( if let Some(v) = &update.$field { tags.$field = Some(v.clone()); } )*
            };
        }
        take!(metadata, title, artist, album, date);
        match &update.cover {
            Some(CoverChange::Set(bytes)) => *cover = Some(bytes.clone()),
            Some(CoverChange::Remove) => *cover = None,
            None => {}
        }
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn cover(&self, path: &Path) -> Result<Option<Vec<u8>>, SyncError> {
        Ok(self.files.borrow().get(path).and_then(|(_, cover)| cover.clone()))
    }
}

#[derive(Default)]
pub struct FakeVideos {
    extractions: HashMap<String, Extraction>,
    extracts: Cell<usize>,
    downloads: Cell<usize>,
}

impl FakeVideos {
    pub fn extract_calls(&self) -> usize {
        self.extracts.get()
    }

    pub fn download_calls(&self) -> usize {
        self.downloads.get()
    }
}

impl VideoSource for FakeVideos {
    async fn extract(&self, video_id: &str) -> Extraction {
        self.extracts.set(self.extracts.get() + 1);
        self.extractions
            .get(video_id)
            .cloned()
            .unwrap_or_else(|| Extraction::Unknown(format!("no fake extraction for '{video_id}'")))
    }

    async fn download(&self, _video_id: &str, dir: &Path, stem: &str) -> Result<PathBuf, SyncError> {
        self.downloads.set(self.downloads.get() + 1);
        let path = dir.join(format!("{stem}.mp3"));
        std::fs::write(&path, b"audio")?;
        Ok(path)
    }
}

pub struct FakeSegments(pub Vec<(f64, f64)>);

impl SegmentLookup for FakeSegments {
    async fn segments(&self, _video_id: &str, _categories: &[String]) -> Result<Vec<(f64, f64)>, SyncError> {
        Ok(self.0.clone())
    }
}

pub struct FakeLyrics(pub Option<String>);

impl LyricsSearch for FakeLyrics {
    async fn search(&self, _query: &str) -> Result<Option<String>, SyncError> {
        Ok(self.0.clone())
    }
}

pub struct FakeThumbs;

impl ThumbnailSource for FakeThumbs {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, SyncError> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 2, Rgba([255, 0, 0, 255])));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .map_err(|e| SyncError::Image(e.to_string()))?;
        Ok(out)
    }
}

/// Copies the file instead of cutting it
pub struct FakeCutter;

impl AudioCutter for FakeCutter {
    fn duration(&self, _path: &Path) -> Result<f64, SyncError> {
        Ok(FAKE_DURATION)
    }

    fn cut(&self, input: &Path, output: &Path, segments: &[(f64, f64)]) -> Result<f64, SyncError> {
        std::fs::copy(input, output)?;
        Ok(removed_duration(segments))
    }
}

pub type FakeServices = Services<FakeVideos, FakeSegments, FakeLyrics, FakeThumbs>;

/// Store, download directory and config of one test
pub struct TestEnv {
    pub store: Store,
    pub config: Config,
    pub classifier: Classifier,
    pub queries: LyricsQueryBuilder,
    pub cleaner: SongQueryCleaner,
    pub codec: FakeCodec,
    pub dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = Store::open(Some(&dir.path().join("data.db3")), false).unwrap();
        let mut config = Config::default();
        config.paths.download_path = dir.path().to_path_buf();
        Self {
            store,
            config,
            classifier: Classifier::default(),
            queries: LyricsQueryBuilder::default(),
            cleaner: SongQueryCleaner::default(),
            codec: FakeCodec::default(),
            dir,
        }
    }

    pub fn context(&self) -> Context<'_> {
        Context {
            store: &self.store,
            config: &self.config,
            classifier: &self.classifier,
            queries: &self.queries,
            cleaner: &self.cleaner,
            dir: self.dir.path(),
        }
    }
}

/// Collaborators sharing the env's tag codec
pub fn fake_services(env: &TestEnv, extractions: Vec<(&str, Extraction)>) -> FakeServices {
    Services {
        videos: FakeVideos {
            extractions: extractions.into_iter().map(|(id, e)| (id.to_string(), e)).collect(),
            ..Default::default()
        },
        segments: FakeSegments(vec![(10.0, 20.0)]),
        lyrics: FakeLyrics(Some(FAKE_LYRICS.to_string())),
        thumbnails: FakeThumbs,
        cutter: Box::new(FakeCutter),
        codec: Box::new(env.codec.clone()),
    }
}

/// What the extractor reports for a healthy video
pub fn extracted(video_id: &str, title: &str) -> VideoRecord {
    VideoRecord {
        video_id: video_id.to_string(),
        title: Some(title.to_string()),
        thumbnail_url: Some(format!("https://i.ytimg.com/vi/{video_id}/maxresdefault.jpg")),
        channel_id: Some("UC123".to_string()),
        channel_url: Some("https://www.youtube.com/channel/UC123".to_string()),
        uploader: Some("Uploader".to_string()),
        upload_date: Some("20240101".to_string()),
        duration: Some(FAKE_DURATION),
        duration_string: Some("3:20".to_string()),
        ..Default::default()
    }
}
