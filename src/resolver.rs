//! Request resolution and the batch orchestrator.
//!
//! Inputs (catalog urls or free-text queries) resolve to albums and tracks;
//! albums fan their tracks out over a bounded worker pool. Item-level errors
//! are logged and skipped so the rest of the batch completes; session-level
//! errors abort the run.

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use log::{error, info, warn};
use serde_json::Value;

use crate::catalog::{Album, AlbumSummary, Track};
use crate::client::{CatalogClient, CollectionKind, SearchKind};
use crate::config::{Config, MP3_FOLDER_TEMPLATE, MP3_TRACK_TEMPLATE};
use crate::download;
use crate::error::Error;
use crate::filter::{filter_discography, FilterOptions};
use crate::naming::{
    cap_path_chars, format_sampling_rate, references_lossless_fields, render_template,
    sanitize_filename, TemplateContext,
};
use crate::quality::{negotiate, Negotiation, QualityTier};
use crate::store::DownloadsDb;
use crate::tagger::{self, Container, TagSet};

/// A resolved download target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadRequest {
    Album(String),
    Track(String),
    Playlist(String),
    Artist(String),
    Label(String),
}

/// Parses a catalog url into a request.
///
/// Accepts the web-player and store url shapes: an optional host and locale
/// prefix, a kind segment (`album`, `track`, `playlist`, `artist`,
/// `interpreter`, `label`), an optional slug, and a trailing id.
pub fn parse_url(input: &str) -> Option<DownloadRequest> {
    let trimmed = input.trim().trim_end_matches('/');
    let path = trimmed
        .split_once("//")
        .map(|(_, rest)| rest)
        .unwrap_or(trimmed);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    for (index, segment) in segments.iter().enumerate() {
        let kind = match *segment {
            "album" => DownloadRequest::Album as fn(String) -> DownloadRequest,
            "track" => DownloadRequest::Track,
            "playlist" => DownloadRequest::Playlist,
            "artist" | "interpreter" => DownloadRequest::Artist,
            "label" => DownloadRequest::Label,
            _ => continue,
        };
        // The id is the trailing segment; a slug may sit in between and a
        // query string or fragment may trail the id.
        let id = *segments.last()?;
        let id = match id.find(['?', '#']) {
            Some(position) => &id[..position],
            None => id,
        };
        if id.is_empty() || index + 1 == segments.len() {
            return None;
        }
        return Some(kind(id.to_string()));
    }
    None
}

/// Per-run tally, merged across workers and requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    fn merge(&mut self, other: RunSummary) {
        self.completed += other.completed;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }

    fn completed_one() -> Self {
        RunSummary {
            completed: 1,
            ..RunSummary::default()
        }
    }

    fn skipped_one() -> Self {
        RunSummary {
            skipped: 1,
            ..RunSummary::default()
        }
    }

    fn failed_one() -> Self {
        RunSummary {
            failed: 1,
            ..RunSummary::default()
        }
    }
}

/// Temp download name. Keyed by the item id, which is unique across the
/// whole run: playlist workers share one flat directory and track numbers
/// repeat across albums, so a number-based name would collide.
fn temp_file_name(track_id: &str) -> String {
    format!(".{track_id}.tmp")
}

/// An album id is recorded only after a run that completed at least one
/// track and failed none, so partial or fully skipped albums are retried
/// next run.
fn should_record_album(summary: &RunSummary, cancelled: bool) -> bool {
    summary.completed > 0 && summary.failed == 0 && !cancelled
}

/// Claims an item id for the current worker; false when another worker in
/// this run already owns it.
fn try_claim(in_flight: &Mutex<HashSet<String>>, id: &str) -> bool {
    in_flight
        .lock()
        .expect("in-flight set lock poisoned")
        .insert(id.to_string())
}

/// Drives a whole batch of download requests against one session.
pub struct Orchestrator<'a> {
    client: &'a CatalogClient,
    config: &'a Config,
    store: Mutex<DownloadsDb>,
    in_flight: Mutex<HashSet<String>>,
    /// Set on session-fatal errors so every worker winds down promptly.
    cancel: AtomicBool,
}

impl<'a> Orchestrator<'a> {
    pub fn new(client: &'a CatalogClient, config: &'a Config) -> Result<Self, Error> {
        let store = DownloadsDb::open(&config.database_path())?;
        Ok(Orchestrator {
            client,
            config,
            store: Mutex::new(store),
            in_flight: Mutex::new(HashSet::new()),
            cancel: AtomicBool::new(false),
        })
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    fn already_downloaded(&self, id: &str) -> Result<bool, Error> {
        self.store
            .lock()
            .expect("store lock poisoned")
            .contains(id)
    }

    fn record_downloaded(&self, id: &str) -> Result<(), Error> {
        self.store.lock().expect("store lock poisoned").add(id)?;
        Ok(())
    }

    /// Resolves and downloads every input url. Unrecognized inputs are
    /// logged and skipped.
    pub fn run(&self, inputs: &[String]) -> Result<RunSummary, Error> {
        let mut summary = RunSummary::default();
        for input in inputs {
            if self.is_cancelled() {
                info!("Cancelled; stopping before remaining inputs");
                break;
            }
            match parse_url(input) {
                Some(request) => summary.merge(self.dispatch(&request)?),
                None => {
                    warn!("Could not understand '{input}', skipping");
                    summary.merge(RunSummary::skipped_one());
                }
            }
        }
        Ok(summary)
    }

    /// Free-text resolution: searches the configured kind and downloads the
    /// first `lucky_limit` results.
    pub fn run_lucky(&self, query: &str) -> Result<RunSummary, Error> {
        let kind = match self.config.download.lucky_kind.as_str() {
            "track" => SearchKind::Track,
            "playlist" => SearchKind::Playlist,
            "artist" => SearchKind::Artist,
            _ => SearchKind::Album,
        };
        let results = self
            .client
            .search(kind, query, self.config.download.lucky_limit)?;
        if results.is_empty() {
            warn!("No results for '{query}'");
            return Ok(RunSummary::skipped_one());
        }
        let mut summary = RunSummary::default();
        for result in results {
            let id = match result.get("id") {
                Some(Value::String(id)) => id.clone(),
                Some(Value::Number(id)) => id.to_string(),
                _ => continue,
            };
            let request = match kind {
                SearchKind::Album => DownloadRequest::Album(id),
                SearchKind::Track => DownloadRequest::Track(id),
                SearchKind::Playlist => DownloadRequest::Playlist(id),
                SearchKind::Artist => DownloadRequest::Artist(id),
            };
            summary.merge(self.dispatch(&request)?);
        }
        Ok(summary)
    }

    fn dispatch(&self, request: &DownloadRequest) -> Result<RunSummary, Error> {
        match request {
            DownloadRequest::Album(id) => self.download_album_by_id(id),
            DownloadRequest::Track(id) => self.download_single_track(id),
            DownloadRequest::Playlist(id) => self.download_playlist(id),
            DownloadRequest::Artist(id) => self.download_collection(CollectionKind::Artist, id),
            DownloadRequest::Label(id) => self.download_collection(CollectionKind::Label, id),
        }
    }

    fn requested_tier(&self) -> Result<QualityTier, Error> {
        QualityTier::from_format_id(self.config.download.quality)
    }

    fn item_failure(&self, what: &str, error: Error) -> Result<RunSummary, Error> {
        if error.is_session_fatal() {
            self.cancel.store(true, Ordering::Relaxed);
            return Err(error);
        }
        error!("{what}: {error}");
        Ok(RunSummary::failed_one())
    }

    fn download_album_by_id(&self, album_id: &str) -> Result<RunSummary, Error> {
        if self.already_downloaded(album_id)? {
            info!("Album {album_id} was already downloaded, skipping");
            return Ok(RunSummary::skipped_one());
        }
        let album = match self.client.get_album(album_id) {
            Ok(album) => album,
            Err(error) => return self.item_failure(&format!("Album {album_id}"), error),
        };
        self.download_album(&album)
    }

    fn download_album(&self, album: &Album) -> Result<RunSummary, Error> {
        let tier = self.requested_tier()?;
        info!(
            "Downloading album: {} ({} tracks, {})",
            album.display_title(),
            album.tracks_count,
            tier.describe()
        );
        if let Some(reason) = self.album_quality_probe(album, tier)? {
            warn!("Skipping album {}: {reason}", album.display_title());
            return Ok(RunSummary::skipped_one());
        }
        let album_dir = self.prepare_album_dir(album, tier)?;
        let cover = self.album_cover(album, &album_dir);
        self.fetch_booklet(album, &album_dir);

        let queue: Mutex<VecDeque<&Track>> = Mutex::new(album.tracks.iter().collect());
        let summary = Mutex::new(RunSummary::default());
        let fatal: Mutex<Option<Error>> = Mutex::new(None);
        let workers = self.config.download.workers.max(1).min(album.tracks.len().max(1));

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    if self.is_cancelled() {
                        break;
                    }
                    let track = match queue.lock().expect("job queue lock poisoned").pop_front() {
                        Some(track) => track,
                        None => break,
                    };
                    let outcome =
                        self.download_track(track, album, &album_dir, tier, cover.as_deref());
                    match outcome {
                        Ok(result) => summary
                            .lock()
                            .expect("summary lock poisoned")
                            .merge(result),
                        Err(error) => {
                            if error.is_session_fatal() {
                                self.cancel.store(true, Ordering::Relaxed);
                                *fatal.lock().expect("fatal slot lock poisoned") = Some(error);
                                break;
                            }
                            error!("Track {}: {error}", track.display_title());
                            summary
                                .lock()
                                .expect("summary lock poisoned")
                                .merge(RunSummary::failed_one());
                        }
                    }
                });
            }
        });

        if let Some(error) = fatal.into_inner().expect("fatal slot lock poisoned") {
            return Err(error);
        }
        let summary = summary.into_inner().expect("summary lock poisoned");
        if should_record_album(&summary, self.is_cancelled()) {
            self.record_downloaded(&album.id)?;
        }
        Ok(summary)
    }

    /// Negotiates the first track's offered stream before any directory or
    /// sibling file is created, so a skipped album leaves nothing on disk.
    fn album_quality_probe(
        &self,
        album: &Album,
        tier: QualityTier,
    ) -> Result<Option<String>, Error> {
        let first = match album.tracks.first() {
            Some(track) => track,
            None => return Ok(None),
        };
        let info = self.client.get_stream_info(&first.id, tier.format_id())?;
        match negotiate(tier, &info, self.config.download.quality_fallback) {
            Negotiation::Skip { reason } => Ok(Some(reason)),
            Negotiation::Proceed { .. } => Ok(None),
        }
    }

    /// Renders, sanitizes, and creates the album folder. Lossy downloads
    /// fall back to the MP3 template when the configured one references
    /// lossless-only fields.
    fn prepare_album_dir(&self, album: &Album, tier: QualityTier) -> Result<PathBuf, Error> {
        let template = &self.config.download.folder_template;
        let template = if !tier.is_lossless() && references_lossless_fields(template) {
            MP3_FOLDER_TEMPLATE
        } else {
            template
        };
        let mut context = TemplateContext::new();
        context
            .set_opt("artist", album.artist.clone())
            .set("album", album.display_title())
            .set_opt("year", album.release_year())
            .set("bit_depth", album.bit_depth.to_string())
            .set("sampling_rate", format_sampling_rate(album.sampling_rate));
        let name = cap_path_chars(sanitize_filename(&render_template(template, &context)));
        let dir = self.config.download.directory.join(name);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Cover bytes for embedding; also writes `cover.jpg` beside the tracks
    /// unless disabled. Cover failures degrade to no-cover instead of
    /// failing the album.
    fn album_cover(&self, album: &Album, album_dir: &Path) -> Option<Vec<u8>> {
        let url = album.cover_url.as_deref()?;
        let url = if self.config.download.cover_original_quality {
            download::original_quality_cover_url(url)
        } else {
            url.to_string()
        };
        if !self.config.download.skip_cover_file {
            if let Err(error) =
                download::fetch_sibling(self.client.agent(), &url, album_dir, "cover.jpg")
            {
                warn!("Could not download cover for {}: {error}", album.display_title());
            }
        }
        if !self.config.download.embed_cover {
            return None;
        }
        match download::fetch_bytes(self.client.agent(), &url) {
            Ok(bytes) => Some(bytes),
            Err(error) => {
                warn!("Could not fetch cover art: {error}");
                None
            }
        }
    }

    fn fetch_booklet(&self, album: &Album, album_dir: &Path) {
        if let Some(url) = album.booklet_url.as_deref() {
            if let Err(error) =
                download::fetch_sibling(self.client.agent(), url, album_dir, "booklet.pdf")
            {
                warn!("Could not download booklet: {error}");
            }
        }
    }

    fn download_track(
        &self,
        track: &Track,
        album: &Album,
        album_dir: &Path,
        tier: QualityTier,
        cover: Option<&[u8]>,
    ) -> Result<RunSummary, Error> {
        if self.already_downloaded(&track.id)? {
            info!("{} was already downloaded, skipping", track.display_title());
            return Ok(RunSummary::skipped_one());
        }
        if !try_claim(&self.in_flight, &track.id) {
            return Ok(RunSummary::skipped_one());
        }

        let track_dir = if album.is_multi_disc() || album.media_count > 1 {
            let disc_dir = album_dir.join(format!("Disc {}", track.media_number));
            fs::create_dir_all(&disc_dir)?;
            disc_dir
        } else {
            album_dir.to_path_buf()
        };

        let info = self.client.get_stream_info(&track.id, tier.format_id())?;
        let (bit_depth, url) = match negotiate(tier, &info, self.config.download.quality_fallback) {
            Negotiation::Skip { reason } => {
                warn!("Skipping {}: {reason}", track.display_title());
                return Ok(RunSummary::skipped_one());
            }
            Negotiation::Proceed { bit_depth, .. } => {
                // negotiate only proceeds when a url was offered
                let url = match info.url.clone() {
                    Some(url) => url,
                    None => {
                        return Err(Error::Response(
                            "stream info accepted without a url".to_string(),
                        ))
                    }
                };
                (bit_depth, url)
            }
        };

        // The achieved stream decides the container: lossy fallbacks report
        // no bit depth.
        let achieved = if bit_depth.is_some() {
            tier
        } else {
            QualityTier::Mp3
        };
        let container = if achieved.is_lossless() {
            Container::Flac
        } else {
            Container::Id3
        };
        let extension = achieved.extension();

        let template = &self.config.download.track_template;
        let template = if !achieved.is_lossless() && references_lossless_fields(template) {
            MP3_TRACK_TEMPLATE
        } else {
            template
        };
        let mut context = TemplateContext::new();
        context
            .set("tracknumber", format!("{:02}", track.track_number))
            .set("tracktitle", track.display_title())
            .set_opt("artist", track.performer.clone().or_else(|| album.artist.clone()));
        let stem = cap_path_chars(sanitize_filename(&render_template(template, &context)));
        let final_path = track_dir.join(format!("{stem}{extension}"));

        if download::skip_if_exists(&final_path) {
            info!("{} already exists, skipping", final_path.display());
            self.record_downloaded(&track.id)?;
            return Ok(RunSummary::skipped_one());
        }

        info!("Downloading: {}", track.display_title());
        let temp_path = track_dir.join(temp_file_name(&track.id));
        download::fetch(self.client.agent(), &url, &temp_path, &mut |_| {})?;

        let tags = TagSet::for_track(track, album, cover.map(<[u8]>::to_vec));
        if let Err(error) = tagger::tag_file(&temp_path, &tags, container) {
            let _ = fs::remove_file(&temp_path);
            return Err(error);
        }
        tagger::finalize(&temp_path, &final_path)?;
        self.record_downloaded(&track.id)?;
        Ok(RunSummary::completed_one())
    }

    fn download_single_track(&self, track_id: &str) -> Result<RunSummary, Error> {
        if self.already_downloaded(track_id)? {
            info!("Track {track_id} was already downloaded, skipping");
            return Ok(RunSummary::skipped_one());
        }
        let track = match self.client.get_track(track_id) {
            Ok(track) => track,
            Err(error) => return self.item_failure(&format!("Track {track_id}"), error),
        };
        let album = match &track.album {
            Some(album) => album.as_ref().clone(),
            None => {
                return self.item_failure(
                    &format!("Track {track_id}"),
                    Error::Response("track payload carries no album context".to_string()),
                )
            }
        };
        let tier = self.requested_tier()?;
        let album_dir = self.prepare_album_dir(&album, tier)?;
        let cover = self.album_cover(&album, &album_dir);
        match self.download_track(&track, &album, &album_dir, tier, cover.as_deref()) {
            Ok(summary) => Ok(summary),
            Err(error) => self.item_failure(&format!("Track {track_id}"), error),
        }
    }

    /// Artist and label discographies: page through the collection, filter,
    /// then download album by album.
    fn download_collection(&self, kind: CollectionKind, id: &str) -> Result<RunSummary, Error> {
        let mut summaries: Vec<AlbumSummary> = Vec::new();
        let mut collection_name = None;
        for page in self.client.collection_pages(kind, id) {
            let page = match page {
                Ok(page) => page,
                Err(error) => return self.item_failure(&format!("Collection {id}"), error),
            };
            if collection_name.is_none() {
                collection_name = page.name.clone();
            }
            summaries.extend(page.items.iter().filter_map(AlbumSummary::from_value));
        }

        let selected: Vec<AlbumSummary> =
            if kind == CollectionKind::Artist && self.config.download.smart_discography {
                let requested_artist = collection_name.clone().unwrap_or_default();
                filter_discography(
                    &summaries,
                    &requested_artist,
                    FilterOptions {
                        favor_space: self.config.download.favor_space_over_quality,
                        skip_extras: self.config.download.skip_extras,
                    },
                )
            } else {
                summaries
                    .into_iter()
                    .filter(|summary| summary.streamable)
                    .collect()
            };
        info!(
            "{}: {} albums selected",
            collection_name.as_deref().unwrap_or(id),
            selected.len()
        );

        let mut summary = RunSummary::default();
        for album in &selected {
            if self.is_cancelled() {
                break;
            }
            summary.merge(self.download_album_by_id(&album.id)?);
        }
        Ok(summary)
    }

    /// Playlists land flat in one folder named after the playlist.
    fn download_playlist(&self, id: &str) -> Result<RunSummary, Error> {
        let mut tracks: Vec<Track> = Vec::new();
        let mut playlist_name = None;
        for page in self.client.collection_pages(CollectionKind::Playlist, id) {
            let page = match page {
                Ok(page) => page,
                Err(error) => return self.item_failure(&format!("Playlist {id}"), error),
            };
            if playlist_name.is_none() {
                playlist_name = page.name.clone();
            }
            tracks.extend(page.items.iter().filter_map(Track::from_value));
        }
        let folder_name = sanitize_filename(
            &playlist_name.unwrap_or_else(|| format!("Playlist {id}")),
        );
        let playlist_dir = self.config.download.directory.join(cap_path_chars(folder_name));
        fs::create_dir_all(&playlist_dir)?;
        info!("Downloading playlist: {} tracks", tracks.len());

        let tier = self.requested_tier()?;
        let queue: Mutex<VecDeque<&Track>> = Mutex::new(tracks.iter().collect());
        let summary = Mutex::new(RunSummary::default());
        let fatal: Mutex<Option<Error>> = Mutex::new(None);
        let workers = self.config.download.workers.max(1).min(tracks.len().max(1));

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    if self.is_cancelled() {
                        break;
                    }
                    let track = match queue.lock().expect("job queue lock poisoned").pop_front() {
                        Some(track) => track,
                        None => break,
                    };
                    let outcome = self.download_playlist_track(track, &playlist_dir, tier);
                    match outcome {
                        Ok(result) => summary
                            .lock()
                            .expect("summary lock poisoned")
                            .merge(result),
                        Err(error) => {
                            if error.is_session_fatal() {
                                self.cancel.store(true, Ordering::Relaxed);
                                *fatal.lock().expect("fatal slot lock poisoned") = Some(error);
                                break;
                            }
                            error!("Track {}: {error}", track.display_title());
                            summary
                                .lock()
                                .expect("summary lock poisoned")
                                .merge(RunSummary::failed_one());
                        }
                    }
                });
            }
        });

        if let Some(error) = fatal.into_inner().expect("fatal slot lock poisoned") {
            return Err(error);
        }
        Ok(summary.into_inner().expect("summary lock poisoned"))
    }

    fn download_playlist_track(
        &self,
        track: &Track,
        playlist_dir: &Path,
        tier: QualityTier,
    ) -> Result<RunSummary, Error> {
        let album = match &track.album {
            Some(album) => album.as_ref().clone(),
            None => match self.client.get_track(&track.id)?.album {
                Some(album) => *album,
                None => {
                    warn!("{} carries no album context, skipping", track.display_title());
                    return Ok(RunSummary::skipped_one());
                }
            },
        };
        let cover = if self.config.download.embed_cover {
            album
                .cover_url
                .as_deref()
                .and_then(|url| download::fetch_bytes(self.client.agent(), url).ok())
        } else {
            None
        };
        self.download_track(track, &album, playlist_dir, tier, cover.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        parse_url, should_record_album, temp_file_name, try_claim, DownloadRequest, RunSummary,
    };
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[test]
    fn test_parse_album_and_track_urls() {
        assert_eq!(
            parse_url("https://www.qobuz.com/fr-fr/album/rumours-fleetwood-mac/0081227971"),
            Some(DownloadRequest::Album("0081227971".to_string()))
        );
        assert_eq!(
            parse_url("https://open.qobuz.com/track/52311"),
            Some(DownloadRequest::Track("52311".to_string()))
        );
    }

    #[test]
    fn test_parse_interpreter_maps_to_artist() {
        assert_eq!(
            parse_url("https://www.qobuz.com/us-en/interpreter/fleetwood-mac/132127"),
            Some(DownloadRequest::Artist("132127".to_string()))
        );
        assert_eq!(
            parse_url("https://www.qobuz.com/us-en/label/warner-records/12345"),
            Some(DownloadRequest::Label("12345".to_string()))
        );
    }

    #[test]
    fn test_parse_playlist_url_with_trailing_slash() {
        assert_eq!(
            parse_url("https://play.qobuz.com/playlist/998877/"),
            Some(DownloadRequest::Playlist("998877".to_string()))
        );
    }

    #[test]
    fn test_garbage_input_is_rejected() {
        assert_eq!(parse_url("not a url"), None);
        assert_eq!(parse_url("https://www.qobuz.com/us-en/album"), None);
        assert_eq!(parse_url(""), None);
        assert_eq!(parse_url("https://www.qobuz.com/track/?utm_source=x"), None);
    }

    #[test]
    fn test_query_string_and_fragment_are_stripped_from_id() {
        assert_eq!(
            parse_url("https://open.qobuz.com/track/52311?utm_source=share"),
            Some(DownloadRequest::Track("52311".to_string()))
        );
        assert_eq!(
            parse_url("https://www.qobuz.com/fr-fr/album/rumours/0081227971#tracklist"),
            Some(DownloadRequest::Album("0081227971".to_string()))
        );
    }

    #[test]
    fn test_temp_names_are_distinct_for_repeated_track_numbers() {
        // Playlist tracks from different albums are routinely both track 01
        // and share one directory; the temp name must not depend on the
        // track number.
        assert_eq!(temp_file_name("52311"), ".52311.tmp");
        assert_ne!(temp_file_name("52311"), temp_file_name("99871"));
    }

    #[test]
    fn test_album_recorded_only_after_real_completions() {
        let completed = RunSummary {
            completed: 5,
            skipped: 2,
            failed: 0,
        };
        assert!(should_record_album(&completed, false));
        assert!(!should_record_album(&completed, true));

        let all_skipped = RunSummary {
            completed: 0,
            skipped: 7,
            failed: 0,
        };
        assert!(!should_record_album(&all_skipped, false));

        let partial = RunSummary {
            completed: 4,
            skipped: 0,
            failed: 1,
        };
        assert!(!should_record_album(&partial, false));
    }

    #[test]
    fn test_try_claim_is_first_wins() {
        let in_flight = Mutex::new(HashSet::new());
        assert!(try_claim(&in_flight, "52311"));
        assert!(!try_claim(&in_flight, "52311"));
        assert!(try_claim(&in_flight, "52312"));
    }

    #[test]
    fn test_try_claim_across_threads_admits_one_winner() {
        let in_flight = Mutex::new(HashSet::new());
        let claims = Mutex::new(0usize);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    if try_claim(&in_flight, "contested") {
                        *claims.lock().expect("claims lock poisoned") += 1;
                    }
                });
            }
        });
        assert_eq!(claims.into_inner().expect("claims lock poisoned"), 1);
    }

    #[test]
    fn test_summary_merge() {
        let mut total = RunSummary::default();
        total.merge(RunSummary {
            completed: 2,
            skipped: 1,
            failed: 0,
        });
        total.merge(RunSummary {
            completed: 0,
            skipped: 0,
            failed: 3,
        });
        assert_eq!(
            total,
            RunSummary {
                completed: 2,
                skipped: 1,
                failed: 3
            }
        );
    }
}
