//! Tag writing for downloaded audio, backed by `lofty`.
//!
//! Tags are applied to the temporary file before it is renamed into place, so
//! a crash mid-tagging never leaves a finished-looking but untagged file.

use std::fs::{self, File};
use std::path::Path;

use log::warn;
use lofty::config::WriteOptions;
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::prelude::*;
use lofty::tag::{ItemKey, Tag, TagType};

use crate::catalog::{Album, Track};
use crate::error::Error;

/// FLAC metadata blocks carry a 24-bit length; a picture block above this
/// cannot be represented and corrupts the stream.
pub const FLAC_MAX_BLOCK_SIZE: usize = 16_777_215;

/// Audio container the tag set is written into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Flac,
    Id3,
}

impl Container {
    fn tag_type(self) -> TagType {
        match self {
            Container::Flac => TagType::VorbisComments,
            Container::Id3 => TagType::Id3v2,
        }
    }
}

/// The complete set of values to write into one file.
#[derive(Debug, Clone, Default)]
pub struct TagSet {
    pub title: String,
    pub artist: Option<String>,
    pub album: String,
    pub album_artist: Option<String>,
    pub composer: Option<String>,
    pub genre: Option<String>,
    pub date: Option<String>,
    pub year: Option<String>,
    pub copyright: Option<String>,
    pub label: Option<String>,
    pub track_number: u32,
    pub track_total: u32,
    pub disc_number: Option<u32>,
    pub disc_total: Option<u32>,
    pub cover: Option<Vec<u8>>,
}

impl TagSet {
    /// Assembles the tag set for a track within its album context. Disc
    /// numbers are only written for multi-disc releases.
    pub fn for_track(track: &Track, album: &Album, cover: Option<Vec<u8>>) -> Self {
        let multi_disc = album.is_multi_disc() || album.media_count > 1;
        TagSet {
            title: track.display_title(),
            artist: track
                .performer
                .clone()
                .or_else(|| album.artist.clone()),
            album: album.display_title(),
            album_artist: album.artist.clone(),
            composer: track.composer.clone(),
            genre: format_genres(&album.genres),
            date: album.release_date.clone(),
            year: album.release_year(),
            copyright: album.copyright.as_deref().map(format_copyright),
            label: album.label.clone(),
            track_number: track.track_number,
            track_total: album.tracks_count,
            disc_number: multi_disc.then_some(track.media_number),
            disc_total: multi_disc.then_some(album.media_count),
            cover,
        }
    }
}

/// Collapses the service's hierarchical genre list into a flat display string.
///
/// Entries like `Pop/Rock→Rock` expand along both separators; duplicates keep
/// their first occurrence.
pub fn format_genres(genres: &[String]) -> Option<String> {
    let mut seen: Vec<String> = Vec::new();
    for entry in genres {
        for part in entry.split('\u{2192}').flat_map(|segment| segment.split('/')) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if !seen.iter().any(|existing| existing == part) {
                seen.push(part.to_string());
            }
        }
    }
    if seen.is_empty() {
        None
    } else {
        Some(seen.join(", "))
    }
}

/// Replaces ASCII rights markers with the typographic symbols.
pub fn format_copyright(copyright: &str) -> String {
    copyright.replace("(P)", "\u{2117}").replace("(C)", "\u{00a9}")
}

fn cover_mime(data: &[u8]) -> MimeType {
    match image::guess_format(data) {
        Ok(image::ImageFormat::Png) => MimeType::Png,
        Ok(image::ImageFormat::Gif) => MimeType::Gif,
        _ => MimeType::Jpeg,
    }
}

/// Builds the lofty tag for the container.
///
/// A cover exceeding the FLAC block ceiling is skipped with a warning rather
/// than failing the track.
pub fn build_tag(set: &TagSet, container: Container) -> Tag {
    let mut tag = Tag::new(container.tag_type());
    tag.insert_text(ItemKey::TrackTitle, set.title.clone());
    tag.insert_text(ItemKey::AlbumTitle, set.album.clone());
    if let Some(artist) = &set.artist {
        tag.insert_text(ItemKey::TrackArtist, artist.clone());
    }
    if let Some(album_artist) = &set.album_artist {
        tag.insert_text(ItemKey::AlbumArtist, album_artist.clone());
    }
    if let Some(composer) = &set.composer {
        tag.insert_text(ItemKey::Composer, composer.clone());
    }
    if let Some(genre) = &set.genre {
        tag.insert_text(ItemKey::Genre, genre.clone());
    }
    if let Some(copyright) = &set.copyright {
        tag.insert_text(ItemKey::CopyrightMessage, copyright.clone());
    }
    if let Some(label) = &set.label {
        tag.insert_text(ItemKey::Label, label.clone());
    }

    match container {
        Container::Flac => {
            if let Some(date) = &set.date {
                tag.insert_text(ItemKey::RecordingDate, date.clone());
            }
            if let Some(year) = &set.year {
                tag.insert_text(ItemKey::Year, year.clone());
            }
            tag.insert_text(ItemKey::TrackNumber, set.track_number.to_string());
            tag.insert_text(ItemKey::TrackTotal, set.track_total.to_string());
            if let (Some(number), Some(total)) = (set.disc_number, set.disc_total) {
                tag.insert_text(ItemKey::DiscNumber, number.to_string());
                tag.insert_text(ItemKey::DiscTotal, total.to_string());
            }
        }
        Container::Id3 => {
            // ID3v2.3 carries totals inside the number frame as "n/total".
            if let Some(year) = &set.year {
                tag.insert_text(ItemKey::Year, year.clone());
            }
            tag.insert_text(
                ItemKey::TrackNumber,
                format!("{}/{}", set.track_number, set.track_total),
            );
            if let (Some(number), Some(total)) = (set.disc_number, set.disc_total) {
                tag.insert_text(ItemKey::DiscNumber, format!("{number}/{total}"));
            }
        }
    }

    if let Some(cover) = &set.cover {
        if container == Container::Flac && cover.len() > FLAC_MAX_BLOCK_SIZE {
            warn!(
                "Cover art is {} bytes, above the FLAC block ceiling; embedding skipped",
                cover.len()
            );
        } else {
            let picture = Picture::new_unchecked(
                PictureType::CoverFront,
                Some(cover_mime(cover)),
                None,
                cover.clone(),
            );
            tag.push_picture(picture);
        }
    }
    tag
}

/// Writes the tag set into the file at `path` (typically the temp file).
pub fn tag_file(path: &Path, set: &TagSet, container: Container) -> Result<(), Error> {
    let tag = build_tag(set, container);
    let mut file = File::options().read(true).write(true).open(path)?;
    let options = match container {
        Container::Flac => WriteOptions::new(),
        Container::Id3 => WriteOptions::new().use_id3v23(true),
    };
    tag.save_to(&mut file, options)?;
    Ok(())
}

/// Atomically promotes the tagged temp file to its final name.
pub fn finalize(temp_path: &Path, final_path: &Path) -> Result<(), Error> {
    fs::rename(temp_path, final_path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        build_tag, format_copyright, format_genres, Container, TagSet, FLAC_MAX_BLOCK_SIZE,
    };
    use crate::catalog::{Album, Track};
    use lofty::prelude::*;
    use lofty::tag::ItemKey;
    use serde_json::json;

    fn sample_set() -> TagSet {
        TagSet {
            title: "Dreams".to_string(),
            artist: Some("Fleetwood Mac".to_string()),
            album: "Rumours".to_string(),
            album_artist: Some("Fleetwood Mac".to_string()),
            composer: Some("Stevie Nicks".to_string()),
            genre: Some("Pop, Rock".to_string()),
            date: Some("1977-02-04".to_string()),
            year: Some("1977".to_string()),
            copyright: Some("\u{2117} 1977 Warner".to_string()),
            label: Some("Warner".to_string()),
            track_number: 2,
            track_total: 11,
            disc_number: None,
            disc_total: None,
            cover: None,
        }
    }

    #[test]
    fn test_format_genres_splits_and_dedupes() {
        let genres = vec![
            "Pop/Rock".to_string(),
            "Pop/Rock\u{2192}Rock".to_string(),
            "Pop/Rock\u{2192}Rock\u{2192}Classic Rock".to_string(),
        ];
        assert_eq!(
            format_genres(&genres).as_deref(),
            Some("Pop, Rock, Classic Rock")
        );
        assert_eq!(format_genres(&[]), None);
    }

    #[test]
    fn test_format_copyright_symbols() {
        assert_eq!(
            format_copyright("(P) 1977 (C) Warner Records"),
            "\u{2117} 1977 \u{00a9} Warner Records"
        );
    }

    #[test]
    fn test_flac_tag_uses_separate_totals() {
        let tag = build_tag(&sample_set(), Container::Flac);
        assert_eq!(tag.get_string(&ItemKey::TrackNumber), Some("2"));
        assert_eq!(tag.get_string(&ItemKey::TrackTotal), Some("11"));
        assert_eq!(tag.get_string(&ItemKey::RecordingDate), Some("1977-02-04"));
    }

    #[test]
    fn test_id3_tag_packs_totals_into_number() {
        let mut set = sample_set();
        set.disc_number = Some(1);
        set.disc_total = Some(2);
        let tag = build_tag(&set, Container::Id3);
        assert_eq!(tag.get_string(&ItemKey::TrackNumber), Some("2/11"));
        assert_eq!(tag.get_string(&ItemKey::DiscNumber), Some("1/2"));
    }

    #[test]
    fn test_oversized_cover_is_skipped_for_flac() {
        let mut set = sample_set();
        set.cover = Some(vec![0u8; FLAC_MAX_BLOCK_SIZE + 1]);
        let tag = build_tag(&set, Container::Flac);
        assert!(tag.pictures().is_empty());

        set.cover = Some(vec![0u8; FLAC_MAX_BLOCK_SIZE]);
        let tag = build_tag(&set, Container::Flac);
        assert_eq!(tag.pictures().len(), 1);
    }

    #[test]
    fn test_disc_numbers_only_for_multi_disc() {
        let album_value = json!({
            "id": "1", "title": "Rumours", "streamable": true,
            "artist": {"name": "Fleetwood Mac"},
            "tracks_count": 11, "media_count": 1,
            "tracks": {"items": [
                {"id": 1, "title": "Second Hand News", "media_number": 1},
                {"id": 2, "title": "Dreams", "media_number": 1}
            ]}
        });
        let album = Album::from_value(&album_value).expect("album should parse");
        let track_value = json!({"id": 2, "title": "Dreams", "track_number": 2, "media_number": 1});
        let track = Track::from_value(&track_value).expect("track should parse");

        let set = TagSet::for_track(&track, &album, None);
        assert_eq!(set.disc_number, None);
        assert_eq!(set.track_total, 11);
        assert_eq!(set.album_artist.as_deref(), Some("Fleetwood Mac"));
    }
}
