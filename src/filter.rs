//! Discography filtering: collapse an artist's album list to the best
//! edition of each release.

use log::debug;

use crate::catalog::AlbumSummary;

/// Knobs for [`filter_discography`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterOptions {
    /// Prefer the smallest sampling rate at the best bit depth.
    pub favor_space: bool,
    /// Drop deluxe/live/anniversary style editions entirely.
    pub skip_extras: bool,
}

/// Grouping key for editions of the same release: the title up to its first
/// parenthetical or bracketed qualifier, case-folded.
pub fn essence(title: &str) -> String {
    let base = match title.find(['(', '[']) {
        Some(position) => &title[..position],
        None => title,
    };
    base.trim().to_lowercase()
}

fn combined_title(summary: &AlbumSummary) -> String {
    match &summary.version {
        Some(version) => format!("{} {}", summary.title, version),
        None => summary.title.clone(),
    }
    .to_lowercase()
}

/// Matches `Remaster`, `Remastered`, `2011 Remaster`, and similar qualifiers.
pub fn is_remaster(summary: &AlbumSummary) -> bool {
    combined_title(summary).contains("master")
}

const EXTRA_MARKERS: [&str; 6] = [
    "anniversary",
    "deluxe",
    "live",
    "collector",
    "demo",
    "expanded",
];

/// True for bonus editions that `skip_extras` removes.
pub fn is_extra(summary: &AlbumSummary) -> bool {
    let combined = combined_title(summary);
    EXTRA_MARKERS.iter().any(|marker| combined.contains(marker))
}

/// Reduces a full discography to one edition per release.
///
/// Within each essence group: keep the best bit depth, then the best (or,
/// with `favor_space`, smallest) sampling rate at that depth; when any
/// edition in the group is a remaster, non-remasters are dropped. Albums not
/// credited to the requested artist and non-streamable albums never qualify.
/// Ties resolve to the lexicographically lowest id so reruns are stable.
pub fn filter_discography(
    summaries: &[AlbumSummary],
    requested_artist: &str,
    options: FilterOptions,
) -> Vec<AlbumSummary> {
    let mut groups: Vec<(String, Vec<&AlbumSummary>)> = Vec::new();
    for summary in summaries {
        let key = essence(&summary.title);
        match groups.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, members)) => members.push(summary),
            None => groups.push((key, vec![summary])),
        }
    }

    let mut selected = Vec::new();
    for (key, members) in groups {
        let best_bit_depth = match members.iter().map(|member| member.bit_depth).max() {
            Some(depth) => depth,
            None => continue,
        };
        let at_best_depth: Vec<&&AlbumSummary> = members
            .iter()
            .filter(|member| member.bit_depth == best_bit_depth)
            .collect();
        let best_sampling_rate = if options.favor_space {
            at_best_depth
                .iter()
                .map(|member| member.sampling_rate)
                .fold(f64::INFINITY, f64::min)
        } else {
            at_best_depth
                .iter()
                .map(|member| member.sampling_rate)
                .fold(f64::NEG_INFINITY, f64::max)
        };
        let remaster_exists = members.iter().any(|member| is_remaster(member));

        let mut candidates: Vec<&AlbumSummary> = members
            .iter()
            .copied()
            .filter(|member| {
                member.streamable
                    && member.bit_depth == best_bit_depth
                    && member.sampling_rate == best_sampling_rate
                    && member.artist.as_deref() == Some(requested_artist)
                    && (!remaster_exists || is_remaster(member))
                    && !(options.skip_extras && is_extra(member))
            })
            .collect();
        candidates.sort_by(|a, b| a.id.cmp(&b.id));
        match candidates.first() {
            Some(best) => selected.push((*best).clone()),
            None => debug!("No qualifying edition for '{key}'"),
        }
    }
    selected
}
