use itg_remote_protocol::response::ok;
use itg_remote_protocol::{ListQuery, Table, Value, MAX_PAYLOAD_LEN};

use crate::host::{Host, SongInfo};

/// Room kept for the envelope fields around a listing array
const LIST_OVERHEAD: usize = 128;

pub(super) fn list_groups<H: Host + ?Sized>(host: &H, query: &ListQuery) -> Table {
    let needle = query.filter().map(str::to_lowercase);

    let matching: Vec<String> = host
        .song_groups()
        .into_iter()
        .filter(|group| match &needle {
            Some(needle) => group.to_lowercase().contains(needle.as_str()),
            None => true,
        })
        .collect();

    let total = matching.len();
    let groups = fit_to_packet(
        matching.into_iter().take(query.limit()).map(Value::from),
        total,
        "groups",
    );

    let count = groups.len();
    ok().with("groups", groups)
        .with("count", count)
        .with("total", total)
        .with("truncated", count < total)
}

pub(super) fn list_songs<H: Host + ?Sized>(host: &H, query: &ListQuery) -> Table {
    let group = query.filter();
    let matching: Vec<SongInfo> = host
        .songs()
        .into_iter()
        .filter(|song| group.map_or(true, |g| song.group == g))
        .collect();

    let total = matching.len();
    let songs = fit_to_packet(
        matching
            .into_iter()
            .take(query.limit())
            .map(|song| Value::from(song_entry(song))),
        total,
        "songs",
    );

    let count = songs.len();
    ok().with("songs", songs)
        .with("count", count)
        .with("total", total)
        .with("truncated", count < total)
}

/// Takes entries while the encoded array still fits one response packet
fn fit_to_packet(entries: impl Iterator<Item = Value>, total: usize, kind: &str) -> Vec<Value> {
    let budget = MAX_PAYLOAD_LEN - LIST_OVERHEAD;
    let mut used = 2;
    let mut kept = Vec::new();

    for entry in entries {
        // Entry text plus its separating comma
        let len = entry.to_json().map(|text| text.len() + 1).unwrap_or(usize::MAX);
        if len > budget.saturating_sub(used) {
            tracing::debug!(kind, count = kept.len(), total, "Listing cut to fit one packet");
            break;
        }
        used += len;
        kept.push(entry);
    }
    kept
}

fn song_entry(song: SongInfo) -> Table {
    Table::new()
        .with("song_dir", song.song_dir)
        .with("title", song.title)
        .with("group", song.group)
        .with("difficulties", song.difficulties)
}
