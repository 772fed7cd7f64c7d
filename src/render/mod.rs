//! Render engine — human-facing views over a store: the one-line normal
//! listing and the Markdown export.

pub mod markdown;
pub mod normal;

use crate::item::VideoKind;

pub(crate) fn video_kind_name(vk: VideoKind) -> &'static str {
    vk.name()
}

pub(crate) fn lossy_filename(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
