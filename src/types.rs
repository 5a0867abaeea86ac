pub mod playlist;
pub mod video;

pub use playlist::{ApiEntity, PlaylistEntry};
pub use video::{Column, ColumnKind, Status, VideoPatch, VideoRecord, SEGMENTS_CHECKED_NONE};
