//! Catalog API client backed by `ureq`.

use std::time::Duration;

use log::debug;
use serde_json::Value;

use crate::catalog::{Album, StreamInfo, Track};
use crate::error::Error;
use crate::session::{Credentials, Session, USER_AGENT};

pub const DEFAULT_BASE_URL: &str = "https://www.qobuz.com/api.json/0.2/";
/// Server page size for paginated collections.
pub const COLLECTION_PAGE_SIZE: u64 = 500;

/// Paginated collection kinds addressable by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Playlist,
    Artist,
    Label,
}

impl CollectionKind {
    fn endpoint(self) -> &'static str {
        match self {
            CollectionKind::Playlist => "playlist/get",
            CollectionKind::Artist => "artist/get",
            CollectionKind::Label => "label/get",
        }
    }

    fn id_param(self) -> &'static str {
        match self {
            CollectionKind::Playlist => "playlist_id",
            CollectionKind::Artist => "artist_id",
            CollectionKind::Label => "label_id",
        }
    }

    /// Key of the embedded collection object (`{"items": [...], "total": n}`).
    fn items_key(self) -> &'static str {
        match self {
            CollectionKind::Playlist => "tracks",
            CollectionKind::Artist | CollectionKind::Label => "albums",
        }
    }

    fn extra_param(self) -> &'static str {
        self.items_key()
    }
}

/// Search result kinds for free-text resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Album,
    Artist,
    Track,
    Playlist,
}

impl SearchKind {
    fn endpoint(self) -> &'static str {
        match self {
            SearchKind::Album => "album/search",
            SearchKind::Artist => "artist/search",
            SearchKind::Track => "track/search",
            SearchKind::Playlist => "playlist/search",
        }
    }

    fn items_key(self) -> &'static str {
        match self {
            SearchKind::Album => "albums",
            SearchKind::Artist => "artists",
            SearchKind::Track => "tracks",
            SearchKind::Playlist => "playlists",
        }
    }
}

/// Authenticated catalog client.
pub struct CatalogClient {
    agent: ureq::Agent,
    base_url: String,
    session: Session,
}

impl CatalogClient {
    /// Builds an agent with explicit timeouts and authenticates a session.
    pub fn connect(
        base_url: &str,
        credentials: &Credentials,
        app_id: &str,
        secret_pool: &[String],
    ) -> Result<Self, Error> {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .timeout_read(Duration::from_secs(30))
            .timeout_write(Duration::from_secs(30))
            .build();
        let session = Session::authenticate(&agent, base_url, credentials, app_id, secret_pool)?;
        Ok(CatalogClient {
            agent,
            base_url: base_url.to_string(),
            session,
        })
    }

    /// The underlying agent, reused for raw byte downloads.
    pub fn agent(&self) -> &ureq::Agent {
        &self.agent
    }

    fn request_json(&self, endpoint: &str, params: &[(String, String)]) -> Result<Value, Error> {
        let mut request = self
            .agent
            .get(&format!("{}{endpoint}", self.base_url))
            .set("User-Agent", USER_AGENT)
            .set("X-App-Id", self.session.app_id())
            .set("X-User-Auth-Token", self.session.user_auth_token());
        for (key, value) in params {
            request = request.query(key, value);
        }
        debug!("GET {endpoint}");
        let response = request.call().map_err(|error| Error::Http(Box::new(error)))?;
        response
            .into_json()
            .map_err(|error| Error::Response(error.to_string()))
    }

    pub fn get_album(&self, album_id: &str) -> Result<Album, Error> {
        let payload = self.request_json(
            "album/get",
            &[("album_id".to_string(), album_id.to_string())],
        )?;
        let album = Album::from_value(&payload)
            .ok_or_else(|| Error::Response(format!("malformed album payload for {album_id}")))?;
        if !album.streamable {
            return Err(Error::NonStreamable(album_id.to_string()));
        }
        Ok(album)
    }

    pub fn get_track(&self, track_id: &str) -> Result<Track, Error> {
        let payload = self.request_json(
            "track/get",
            &[("track_id".to_string(), track_id.to_string())],
        )?;
        let track = Track::from_value(&payload)
            .ok_or_else(|| Error::Response(format!("malformed track payload for {track_id}")))?;
        if !track.streamable {
            return Err(Error::NonStreamable(track_id.to_string()));
        }
        Ok(track)
    }

    /// Signed stream-url request for one track at the given tier.
    pub fn get_stream_info(&self, track_id: &str, format_id: u32) -> Result<StreamInfo, Error> {
        let params = self.session.signed_stream_params(track_id, format_id);
        let payload = self.request_json("track/getFileUrl", &params)?;
        Ok(StreamInfo::from_value(&payload))
    }

    /// Lazy page sequence over a playlist/artist/label collection.
    ///
    /// Restartable only from offset 0; pages are produced on demand until the
    /// server-reported total is exhausted.
    pub fn collection_pages(&self, kind: CollectionKind, id: &str) -> CollectionPages<'_> {
        CollectionPages {
            client: self,
            kind,
            id: id.to_string(),
            offset: 0,
            total: None,
            done: false,
        }
    }

    pub fn search(&self, kind: SearchKind, query: &str, limit: u32) -> Result<Vec<Value>, Error> {
        let payload = self.request_json(
            kind.endpoint(),
            &[
                ("query".to_string(), query.to_string()),
                ("limit".to_string(), limit.to_string()),
            ],
        )?;
        Ok(payload
            .get(kind.items_key())
            .and_then(|collection| collection.get("items"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }
}

/// One page of a paginated collection.
#[derive(Debug, Clone)]
pub struct CollectionPage {
    /// Display name of the owning artist/label/playlist, when reported.
    pub name: Option<String>,
    pub items: Vec<Value>,
    pub total: u64,
}

/// Iterator over collection pages. See [`CatalogClient::collection_pages`].
pub struct CollectionPages<'a> {
    client: &'a CatalogClient,
    kind: CollectionKind,
    id: String,
    offset: u64,
    total: Option<u64>,
    done: bool,
}

/// Offset progression invariant: every page must advance the offset.
fn advance_offset(offset: u64, page_len: usize) -> Result<u64, Error> {
    if page_len == 0 {
        return Err(Error::PaginationStalled { offset });
    }
    Ok(offset + page_len as u64)
}

impl CollectionPages<'_> {
    fn fetch_page(&mut self) -> Result<CollectionPage, Error> {
        let params = vec![
            (self.kind.id_param().to_string(), self.id.clone()),
            ("extra".to_string(), self.kind.extra_param().to_string()),
            ("limit".to_string(), COLLECTION_PAGE_SIZE.to_string()),
            ("offset".to_string(), self.offset.to_string()),
        ];
        let payload = self.client.request_json(self.kind.endpoint(), &params)?;
        let collection = payload.get(self.kind.items_key()).ok_or_else(|| {
            Error::Response(format!(
                "collection payload missing '{}' object",
                self.kind.items_key()
            ))
        })?;
        let items = collection
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let total = collection
            .get("total")
            .and_then(Value::as_u64)
            .or_else(|| {
                let count_key = format!("{}_count", self.kind.items_key());
                payload.get(count_key).and_then(Value::as_u64)
            })
            .unwrap_or(items.len() as u64);
        let name = payload.get("name").and_then(Value::as_str).map(ToOwned::to_owned);

        self.total = Some(total);
        if self.offset + (items.len() as u64) >= total {
            self.done = true;
        } else {
            self.offset = advance_offset(self.offset, items.len())?;
        }
        Ok(CollectionPage { name, items, total })
    }
}

impl Iterator for CollectionPages<'_> {
    type Item = Result<CollectionPage, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.fetch_page() {
            Ok(page) => Some(Ok(page)),
            Err(error) => {
                // A failed page poisons the sequence; restart from offset 0.
                self.done = true;
                Some(Err(error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{advance_offset, CollectionKind, SearchKind};
    use crate::error::Error;

    #[test]
    fn test_advance_offset_strictly_increases() {
        assert_eq!(advance_offset(0, 500).unwrap(), 500);
        assert_eq!(advance_offset(500, 120).unwrap(), 620);
    }

    #[test]
    fn test_empty_page_is_a_protocol_violation() {
        match advance_offset(500, 0) {
            Err(Error::PaginationStalled { offset }) => assert_eq!(offset, 500),
            other => panic!("expected pagination stall, got {other:?}"),
        }
    }

    #[test]
    fn test_collection_kind_wire_names() {
        assert_eq!(CollectionKind::Artist.endpoint(), "artist/get");
        assert_eq!(CollectionKind::Artist.items_key(), "albums");
        assert_eq!(CollectionKind::Playlist.id_param(), "playlist_id");
        assert_eq!(CollectionKind::Playlist.items_key(), "tracks");
        assert_eq!(CollectionKind::Label.id_param(), "label_id");
    }

    #[test]
    fn test_search_kind_wire_names() {
        assert_eq!(SearchKind::Album.endpoint(), "album/search");
        assert_eq!(SearchKind::Track.items_key(), "tracks");
    }
}
