//! Tag reading for media files.
//!
//! `MetadataExtractor` is the seam the synchronizer consumes; `LoftyExtractor`
//! is the production implementation.

use std::path::Path;

use lofty::{read_from_path, Accessor, ItemKey, PictureType, Tag, TaggedFileExt};

use crate::error::{CatalogError, Result};

pub const UNKNOWN_SONG: &str = "Unknown Song";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_GENRE: &str = "Unknown Genre";

/// Tag bundle for one media file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackTags {
    pub title: String,
    pub contributing_artists: Vec<String>,
    pub album: String,
    pub album_artists: Vec<String>,
    pub genres: Vec<String>,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub year: Option<i32>,
}

impl TrackTags {
    /// Fill empty values with the catalog placeholders and drop blank or
    /// repeated list entries. List entries are trimmed; title and album are not.
    pub fn normalized(mut self) -> Self {
        self.title = or_default(self.title, UNKNOWN_SONG);
        self.album = or_default(self.album, UNKNOWN_ALBUM);
        self.contributing_artists = list_or_default(self.contributing_artists, UNKNOWN_ARTIST);
        self.album_artists = list_or_default(self.album_artists, UNKNOWN_ARTIST);
        self.genres = list_or_default(self.genres, UNKNOWN_GENRE);
        self
    }
}

/// Titles are kept verbatim; only a missing value gets the placeholder.
fn or_default(value: String, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}

fn list_or_default(values: Vec<String>, default: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let value = value.trim();
        if !value.is_empty() && !out.iter().any(|seen| seen == value) {
            out.push(value.to_string());
        }
    }
    if out.is_empty() {
        out.push(default.to_string());
    }
    out
}

/// Reads tags and embedded cover art from media files.
pub trait MetadataExtractor: Send + Sync {
    fn extract_metadata(&self, path: &Path) -> Result<TrackTags>;

    /// The front cover (or first picture) embedded in `path`, if any.
    fn extract_embedded_image(&self, path: &Path) -> Result<Option<Vec<u8>>>;
}

/// Split a multi-valued tag on `&`, `;` and `,`.
pub fn split_tag_values(raw: &str) -> Vec<String> {
    raw.split(['&', ';', ','])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LoftyExtractor;

impl LoftyExtractor {
    fn read_tag(path: &Path) -> Result<Option<Tag>> {
        let tagged_file = read_from_path(path).map_err(|err| CatalogError::Extraction {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        let tag = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag())
            .cloned();
        Ok(tag)
    }
}

impl MetadataExtractor for LoftyExtractor {
    fn extract_metadata(&self, path: &Path) -> Result<TrackTags> {
        let Some(tag) = Self::read_tag(path)? else {
            // A readable file without tags still gets catalogued with placeholders.
            tracing::debug!(path = %path.display(), "no tags present");
            return Ok(TrackTags::default());
        };
        Ok(tags_from(&tag))
    }

    fn extract_embedded_image(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        let Some(tag) = Self::read_tag(path)? else {
            return Ok(None);
        };
        let pictures = tag.pictures();
        let picture = pictures
            .iter()
            .find(|picture| picture.pic_type() == PictureType::CoverFront)
            .or_else(|| pictures.first());
        Ok(picture
            .map(|picture| picture.data().to_vec())
            .filter(|data| !data.is_empty()))
    }
}

fn tags_from(tag: &Tag) -> TrackTags {
    TrackTags {
        title: tag.title().map(|v| v.to_string()).unwrap_or_default(),
        contributing_artists: multi_value(tag, &ItemKey::TrackArtist),
        album: tag.album().map(|v| v.to_string()).unwrap_or_default(),
        album_artists: multi_value(tag, &ItemKey::AlbumArtist),
        genres: multi_value(tag, &ItemKey::Genre),
        track_number: tag
            .track()
            .or_else(|| tag.get_string(&ItemKey::TrackNumber).and_then(parse_u32_tag)),
        disc_number: tag
            .disk()
            .or_else(|| tag.get_string(&ItemKey::DiscNumber).and_then(parse_u32_tag)),
        year: tag
            .year()
            .and_then(|year| i32::try_from(year).ok())
            .or_else(|| tag.get_string(&ItemKey::RecordingDate).and_then(parse_i32_tag)),
    }
}

fn multi_value(tag: &Tag, key: &ItemKey) -> Vec<String> {
    tag.get_strings(key).flat_map(split_tag_values).collect()
}

fn parse_u32_tag(raw: &str) -> Option<u32> {
    raw.split('/')
        .next()
        .and_then(|s| s.trim().parse::<u32>().ok())
}

fn parse_i32_tag(raw: &str) -> Option<i32> {
    raw.split('-')
        .next()
        .and_then(|s| s.trim().parse::<i32>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn split_tag_values_handles_all_separators() {
        assert_eq!(
            split_tag_values("Simon & Garfunkel; Art Garfunkel ,Paul Simon"),
            strings(&["Simon", "Garfunkel", "Art Garfunkel", "Paul Simon"])
        );
        assert_eq!(split_tag_values(" ; , "), Vec::<String>::new());
        assert_eq!(split_tag_values("Solo"), strings(&["Solo"]));
    }

    #[test]
    fn normalized_applies_placeholders() {
        let tags = TrackTags::default().normalized();
        assert_eq!(tags.title, UNKNOWN_SONG);
        assert_eq!(tags.album, UNKNOWN_ALBUM);
        assert_eq!(tags.album_artists, strings(&[UNKNOWN_ARTIST]));
        assert_eq!(tags.contributing_artists, strings(&[UNKNOWN_ARTIST]));
        assert_eq!(tags.genres, strings(&[UNKNOWN_GENRE]));
        assert_eq!(tags.track_number, None);
    }

    #[test]
    fn normalized_trims_and_dedups_lists() {
        let tags = TrackTags {
            title: "X".to_string(),
            album: "Y".to_string(),
            album_artists: strings(&["Z", " Z", ""]),
            genres: strings(&["   "]),
            ..TrackTags::default()
        }
        .normalized();
        assert_eq!(tags.title, "X");
        assert_eq!(tags.album, "Y");
        assert_eq!(tags.album_artists, strings(&["Z"]));
        assert_eq!(tags.genres, strings(&[UNKNOWN_GENRE]));
    }

    #[test]
    fn normalized_keeps_title_and_album_verbatim() {
        let tags = TrackTags {
            title: "  X ".to_string(),
            album: "Y ".to_string(),
            ..TrackTags::default()
        }
        .normalized();
        assert_eq!(tags.title, "  X ");
        assert_eq!(tags.album, "Y ");
    }

    #[test]
    fn numeric_tags_tolerate_totals_and_dates() {
        assert_eq!(parse_u32_tag("3/12"), Some(3));
        assert_eq!(parse_u32_tag("x"), None);
        assert_eq!(parse_i32_tag("1985-06-01"), Some(1985));
    }

    #[test]
    fn lofty_extractor_reports_unreadable_files() {
        let dir = crate::test_support::scratch_dir("tags-junk");
        let path = dir.join("junk.mp3");
        std::fs::write(&path, b"not audio at all").unwrap();

        let err = LoftyExtractor.extract_metadata(&path).unwrap_err();
        assert!(matches!(err, CatalogError::Extraction { .. }));
        assert!(!err.is_fatal());
    }

    /// Eight silent MPEG-1 Layer III frames (128 kbps, 44.1 kHz, 417 bytes each).
    fn silent_mp3() -> Vec<u8> {
        let mut frame = vec![0u8; 417];
        frame[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0x00]);
        frame.repeat(8)
    }

    #[test]
    fn lofty_extractor_reads_written_tags() {
        use lofty::{AudioFile, TagType};

        let dir = crate::test_support::scratch_dir("tags-lofty");
        let path = dir.join("tagged.mp3");
        std::fs::write(&path, silent_mp3()).unwrap();

        let mut tagged_file = read_from_path(&path).unwrap();
        let mut tag = Tag::new(TagType::Id3v2);
        tag.set_title("Night Drive".to_string());
        tag.set_artist("Ann & Bo".to_string());
        tag.insert_text(ItemKey::AlbumArtist, "Zed; Yan".to_string());
        tag.set_album("Roads".to_string());
        tag.set_genre("Rock, Pop".to_string());
        tag.set_track(3);
        tag.set_disk(2);
        tag.insert_text(ItemKey::RecordingDate, "1999-04-01".to_string());
        tagged_file.insert_tag(tag);
        tagged_file.save_to_path(&path).unwrap();

        let tags = LoftyExtractor.extract_metadata(&path).unwrap();
        assert_eq!(tags.title, "Night Drive");
        assert_eq!(tags.album, "Roads");
        assert_eq!(tags.contributing_artists, strings(&["Ann", "Bo"]));
        assert_eq!(tags.album_artists, strings(&["Zed", "Yan"]));
        assert_eq!(tags.genres, strings(&["Rock", "Pop"]));
        assert_eq!(tags.track_number, Some(3));
        assert_eq!(tags.disc_number, Some(2));
        assert_eq!(tags.year, Some(1999));

        assert_eq!(LoftyExtractor.extract_embedded_image(&path).unwrap(), None);
    }

    #[test]
    fn lofty_extractor_reports_missing_files() {
        let dir = crate::test_support::scratch_dir("tags-missing");
        let err = LoftyExtractor
            .extract_embedded_image(&dir.join("gone.flac"))
            .unwrap_err();
        assert!(matches!(err, CatalogError::Extraction { .. }));
    }
}
