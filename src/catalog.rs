//! Typed catalog entities parsed from the service's JSON payloads.

use serde_json::Value;

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

fn id_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key) {
        Some(Value::String(id)) => Some(id.clone()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    }
}

/// Appends the version qualifier to a title unless the title already carries it.
pub fn full_title(title: &str, version: Option<&str>) -> String {
    match version {
        Some(version) if !title.to_lowercase().contains(&version.to_lowercase()) => {
            format!("{title} ({version})")
        }
        _ => title.to_string(),
    }
}

/// A downloadable track.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub version: Option<String>,
    pub work: Option<String>,
    pub performer: Option<String>,
    pub composer: Option<String>,
    pub track_number: u32,
    pub media_number: u32,
    pub streamable: bool,
    /// Album context, present on `track/get` payloads but not on the track
    /// entries nested inside an album.
    pub album: Option<Box<Album>>,
}

impl Track {
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = id_field(value, "id")?;
        let title = string_field(value, "title")?;
        Some(Track {
            id,
            title,
            version: string_field(value, "version"),
            work: string_field(value, "work"),
            performer: value
                .get("performer")
                .and_then(|performer| string_field(performer, "name")),
            composer: value
                .get("composer")
                .and_then(|composer| string_field(composer, "name")),
            track_number: value
                .get("track_number")
                .and_then(Value::as_u64)
                .unwrap_or(1) as u32,
            media_number: value
                .get("media_number")
                .and_then(Value::as_u64)
                .unwrap_or(1) as u32,
            streamable: value
                .get("streamable")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            album: value.get("album").and_then(Album::from_value).map(Box::new),
        })
    }

    /// Display/tag title: optional work prefix plus version qualifier.
    pub fn display_title(&self) -> String {
        let titled = full_title(&self.title, self.version.as_deref());
        match &self.work {
            Some(work) => format!("{work}: {titled}"),
            None => titled,
        }
    }
}

/// Full album metadata, from `album/get` or the album context of a track.
#[derive(Debug, Clone)]
pub struct Album {
    pub id: String,
    pub title: String,
    pub version: Option<String>,
    pub artist: Option<String>,
    pub genres: Vec<String>,
    pub release_date: Option<String>,
    pub copyright: Option<String>,
    pub label: Option<String>,
    pub tracks_count: u32,
    pub media_count: u32,
    /// Best bit depth the catalog offers for this album.
    pub bit_depth: u32,
    /// Best sampling rate (kHz) the catalog offers for this album.
    pub sampling_rate: f64,
    pub streamable: bool,
    pub cover_url: Option<String>,
    pub booklet_url: Option<String>,
    /// Empty when the album was parsed out of a track payload.
    pub tracks: Vec<Track>,
}

impl Album {
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = id_field(value, "id")?;
        let title = string_field(value, "title")?;
        let genres = value
            .get("genres_list")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(Value::as_str)
                    .map(ToOwned::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        let tracks = value
            .get("tracks")
            .and_then(|tracks| tracks.get("items"))
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Track::from_value).collect())
            .unwrap_or_default();
        Some(Album {
            id,
            title,
            version: string_field(value, "version"),
            artist: value
                .get("artist")
                .and_then(|artist| string_field(artist, "name")),
            genres,
            release_date: string_field(value, "release_date_original")
                .or_else(|| string_field(value, "release_date")),
            copyright: string_field(value, "copyright"),
            label: value
                .get("label")
                .and_then(|label| string_field(label, "name")),
            tracks_count: value
                .get("tracks_count")
                .and_then(Value::as_u64)
                .unwrap_or(1) as u32,
            media_count: value.get("media_count").and_then(Value::as_u64).unwrap_or(1) as u32,
            bit_depth: value
                .get("maximum_bit_depth")
                .and_then(Value::as_u64)
                .unwrap_or(16) as u32,
            sampling_rate: value
                .get("maximum_sampling_rate")
                .and_then(Value::as_f64)
                .unwrap_or(44.1),
            streamable: value
                .get("streamable")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            cover_url: value
                .get("image")
                .and_then(|image| string_field(image, "large")),
            booklet_url: value
                .get("goodies")
                .and_then(Value::as_array)
                .and_then(|goodies| goodies.first())
                .and_then(|goodie| string_field(goodie, "url")),
            tracks,
        })
    }

    pub fn display_title(&self) -> String {
        full_title(&self.title, self.version.as_deref())
    }

    pub fn release_year(&self) -> Option<String> {
        self.release_date
            .as_deref()
            .map(|date| date.chars().take(4).collect())
    }

    /// True when the album's tracks span more than one disc.
    pub fn is_multi_disc(&self) -> bool {
        let mut first_media = None;
        for track in &self.tracks {
            match first_media {
                None => first_media = Some(track.media_number),
                Some(media) if media != track.media_number => return true,
                Some(_) => {}
            }
        }
        false
    }
}

/// Lightweight album entry from an artist/label discography page.
#[derive(Debug, Clone)]
pub struct AlbumSummary {
    pub id: String,
    pub title: String,
    pub version: Option<String>,
    pub artist: Option<String>,
    pub bit_depth: u32,
    pub sampling_rate: f64,
    pub streamable: bool,
}

impl AlbumSummary {
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(AlbumSummary {
            id: id_field(value, "id")?,
            title: string_field(value, "title")?,
            version: string_field(value, "version"),
            artist: value
                .get("artist")
                .and_then(|artist| string_field(artist, "name")),
            bit_depth: value
                .get("maximum_bit_depth")
                .and_then(Value::as_u64)
                .unwrap_or(16) as u32,
            sampling_rate: value
                .get("maximum_sampling_rate")
                .and_then(Value::as_f64)
                .unwrap_or(44.1),
            streamable: value
                .get("streamable")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }
}

/// Result of a signed stream-url request for one track.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub url: Option<String>,
    pub bit_depth: Option<u32>,
    pub sampling_rate: Option<f64>,
    /// Server silently downgraded the requested tier.
    pub restricted: bool,
    /// The offered file is a demo/preview clip.
    pub sample: bool,
}

const RESTRICTION_DOWNGRADE: &str = "FormatRestrictedByFormatAvailability";

impl StreamInfo {
    pub fn from_value(value: &Value) -> Self {
        let restricted = value
            .get("restrictions")
            .and_then(Value::as_array)
            .map(|restrictions| {
                restrictions.iter().any(|restriction| {
                    restriction.get("code").and_then(Value::as_str) == Some(RESTRICTION_DOWNGRADE)
                })
            })
            .unwrap_or(false);
        StreamInfo {
            url: string_field(value, "url"),
            bit_depth: value.get("bit_depth").and_then(Value::as_u64).map(|bits| bits as u32),
            sampling_rate: value.get("sampling_rate").and_then(Value::as_f64),
            restricted,
            sample: value.get("sample").and_then(Value::as_bool).unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{full_title, Album, AlbumSummary, StreamInfo, Track};
    use serde_json::json;

    #[test]
    fn test_full_title_appends_version_once() {
        assert_eq!(full_title("Rumours", Some("Remastered")), "Rumours (Remastered)");
        assert_eq!(
            full_title("Rumours (Remastered)", Some("remastered")),
            "Rumours (Remastered)"
        );
        assert_eq!(full_title("Rumours", None), "Rumours");
    }

    #[test]
    fn test_track_from_value_parses_nested_album() {
        let value = json!({
            "id": 52311,
            "title": "Dreams",
            "track_number": 2,
            "media_number": 1,
            "performer": {"name": "Fleetwood Mac"},
            "album": {
                "id": "0081227971","title": "Rumours","streamable": true,
                "artist": {"name": "Fleetwood Mac"},
                "release_date_original": "1977-02-04",
                "tracks_count": 11,
                "genres_list": ["Pop/Rock", "Pop/Rock\u{2192}Rock"],
                "label": {"name": "Warner"},
                "image": {"large": "https://images.example.com/cover_600.jpg"}
            }
        });
        let track = Track::from_value(&value).expect("track should parse");
        assert_eq!(track.id, "52311");
        assert_eq!(track.track_number, 2);
        let album = track.album.expect("album context should parse");
        assert_eq!(album.artist.as_deref(), Some("Fleetwood Mac"));
        assert_eq!(album.release_year().as_deref(), Some("1977"));
        assert_eq!(album.genres.len(), 2);
    }

    #[test]
    fn test_album_multi_disc_detection() {
        let value = json!({
            "id": "1", "title": "Anthology", "streamable": true,
            "tracks": {"items": [
                {"id": 1, "title": "One", "media_number": 1},
                {"id": 2, "title": "Two", "media_number": 2}
            ]}
        });
        let album = Album::from_value(&value).expect("album should parse");
        assert!(album.is_multi_disc());
    }

    #[test]
    fn test_display_title_with_work_prefix() {
        let value = json!({
            "id": 9, "title": "Allegro", "version": "Live",
            "work": "Symphony No. 5"
        });
        let track = Track::from_value(&value).expect("track should parse");
        assert_eq!(track.display_title(), "Symphony No. 5: Allegro (Live)");
    }

    #[test]
    fn test_stream_info_restriction_code() {
        let value = json!({
            "url": "https://streaming.example.com/file.flac",
            "bit_depth": 16, "sampling_rate": 44.1,
            "restrictions": [{"code": "FormatRestrictedByFormatAvailability"}]
        });
        let info = StreamInfo::from_value(&value);
        assert!(info.restricted);
        assert!(!info.sample);
        assert_eq!(info.bit_depth, Some(16));
    }

    #[test]
    fn test_album_summary_defaults() {
        let value = json!({"id": "a1", "title": "Tusk"});
        let summary = AlbumSummary::from_value(&value).expect("summary should parse");
        assert_eq!(summary.bit_depth, 16);
        assert!(!summary.streamable);
    }
}
